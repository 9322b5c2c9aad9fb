use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid ssh public key: {0}")]
    InvalidPublicKey(String),
    #[error("ssh key encoding: {0}")]
    Ssh(#[from] ssh_key::Error),
    #[error("rsa: {0}")]
    Rsa(#[from] rsa::Error),
    #[error("pkcs1: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            CryptoError::InvalidPublicKey("empty".to_string()),
            CryptoError::Rsa(rsa::Error::Verification),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
