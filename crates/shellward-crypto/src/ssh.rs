//! OpenSSH public key parsing and fingerprinting.
//!
//! # Purpose
//! Parse authorized-key style input into a typed SSH public key and compute the
//! legacy MD5 fingerprint (`aa:bb:...`) that existing registrations are keyed by.
use crate::error::{CryptoError, CryptoResult};
use md5::{Digest, Md5};
use ssh_key::PublicKey;
use ssh_key::authorized_keys::Entry;

/// A parsed SSH public key together with its legacy MD5 fingerprint.
#[derive(Debug, Clone)]
pub struct ParsedPublicKey {
    pub key: PublicKey,
    pub fingerprint: String,
}

/// Parse the first valid key of an authorized-keys formatted input.
///
/// Blank lines and `#` comments are skipped, and so is any line that does not
/// parse. Lines may carry an options prefix (`from="...",no-pty ssh-ed25519 ...`).
///
/// # Errors
/// - `CryptoError::InvalidPublicKey` when no line holds a valid key.
pub fn parse_authorized_key(data: &str) -> CryptoResult<ParsedPublicKey> {
    let mut last_error = None;
    for line in data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
    {
        match line.parse::<Entry>() {
            Ok(entry) => {
                let key = entry.public_key().clone();
                let fingerprint = legacy_md5_fingerprint(&key)?;
                return Ok(ParsedPublicKey { key, fingerprint });
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(CryptoError::InvalidPublicKey(match last_error {
        Some(err) => err.to_string(),
        None => "no key material".to_string(),
    }))
}

/// Legacy OpenSSH fingerprint: MD5 over the wire-encoded key blob, rendered as
/// lowercase colon-separated hex pairs.
pub fn legacy_md5_fingerprint(key: &PublicKey) -> CryptoResult<String> {
    let blob = key.to_bytes()?;
    let digest = Md5::digest(&blob);
    let pairs: Vec<String> = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    Ok(pairs.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGE_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHzGDUcD2S2grimHo8jH3zpqK+0Qk8P/1fNfZFY09nci edge";

    #[test]
    fn fingerprint_matches_ssh_keygen_md5() {
        // ssh-keygen -l -E md5 reports the same value for this key.
        let parsed = parse_authorized_key(EDGE_KEY).expect("parse");
        assert_eq!(
            parsed.fingerprint,
            "2b:80:d4:c1:71:75:8f:dc:57:1c:61:93:d0:cb:83:cc"
        );
    }

    #[test]
    fn comment_does_not_change_fingerprint() {
        let a = parse_authorized_key(EDGE_KEY).expect("parse");
        let b = parse_authorized_key(&EDGE_KEY.replace(" edge", " renamed")).expect("parse");
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn skips_leading_comments_and_blank_lines() {
        let input = format!("\n# deploy key\n\n{EDGE_KEY}\n");
        assert!(parse_authorized_key(&input).is_ok());
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        assert!(matches!(
            parse_authorized_key("   \n# only a comment"),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            parse_authorized_key("ssh-ed25519 not-base64"),
            Err(CryptoError::InvalidPublicKey(_))
        ));
        assert!(parse_authorized_key("hello world").is_err());
    }

    #[test]
    fn accepts_options_prefix() {
        let line = format!("from=\"10.0.0.0/8\",no-pty {EDGE_KEY}");
        let parsed = parse_authorized_key(&line).expect("parse with options");
        assert_eq!(
            parsed.fingerprint,
            parse_authorized_key(EDGE_KEY).expect("parse").fingerprint
        );
    }

    #[test]
    fn skips_unparseable_lines_before_a_valid_key() {
        let input = format!("garbage line\nssh-ed25519 not-base64\n{EDGE_KEY}\n");
        let parsed = parse_authorized_key(&input).expect("later line parses");
        assert_eq!(
            parsed.fingerprint,
            "2b:80:d4:c1:71:75:8f:dc:57:1c:61:93:d0:cb:83:cc"
        );
    }
}
