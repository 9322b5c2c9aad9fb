use crate::auth::signing::SigningKeyPaths;
use crate::auth::user::{AdminClaimPolicy, DEFAULT_USER_TOKEN_TTL};
use crate::cache::{DEFAULT_DEDUP_CAPACITY, DEFAULT_DEDUP_TTL, DedupCacheConfig};
use crate::error::StartupError;
use anyhow::Context;
use serde::Deserialize;
use shellward_crypto::DEFAULT_CHALLENGE_KEY_BITS;
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const PRIVATE_KEY: &str = "SHELLWARD_PRIVATE_KEY";
const PUBLIC_KEY: &str = "SHELLWARD_PUBLIC_KEY";
const CACHE_URL: &str = "SHELLWARD_CACHE_URL";
const DEDUP_TTL_SECS: &str = "SHELLWARD_DEDUP_TTL_SECS";
const DEDUP_CAPACITY: &str = "SHELLWARD_DEDUP_CAPACITY";
const USER_TOKEN_TTL_SECS: &str = "SHELLWARD_USER_TOKEN_TTL_SECS";
const TOKEN_SALT: &str = "SHELLWARD_TOKEN_SALT";
const ADMIN_CLAIM: &str = "SHELLWARD_ADMIN_CLAIM";
const CHALLENGE_KEY_BITS: &str = "SHELLWARD_CHALLENGE_KEY_BITS";
const BIND: &str = "SHELLWARD_BIND";
const METRICS_BIND: &str = "SHELLWARD_METRICS_BIND";
const CONFIG_FILE: &str = "SHELLWARD_CONFIG";

const MIN_CHALLENGE_KEY_BITS: usize = 2048;
const MAX_CHALLENGE_KEY_BITS: usize = 16384;
const MAX_USER_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

// Authority configuration sourced from environment variables, optionally
// overridden by a YAML file.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    pub bind_addr: SocketAddr,
    pub signing_keys: SigningKeyPaths,
    pub dedup_cache: DedupCacheConfig,
    pub user_token_ttl: Duration,
    pub token_salt: String,
    pub admin_claim: AdminClaimPolicy,
    pub challenge_key_bits: usize,
    pub metrics_bind: SocketAddr,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AuthorityConfigOverride {
    bind_addr: Option<String>,
    private_key: Option<PathBuf>,
    public_key: Option<PathBuf>,
    cache_url: Option<String>,
    dedup_ttl_secs: Option<u64>,
    dedup_capacity: Option<u64>,
    user_token_ttl_secs: Option<u64>,
    token_salt: Option<String>,
    admin_claim: Option<AdminClaimPolicy>,
    challenge_key_bits: Option<usize>,
    metrics_bind: Option<String>,
}

impl AuthorityConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::resolve(AuthorityConfigOverride::default())
    }

    pub fn from_env_or_yaml() -> Result<Self, StartupError> {
        let file = match std::env::var(CONFIG_FILE) {
            Ok(path) => {
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("read {CONFIG_FILE}: {path}"))?;
                serde_yaml::from_str(&contents).with_context(|| "parse authority config yaml")?
            }
            Err(_) => AuthorityConfigOverride::default(),
        };
        Self::resolve(file)
    }

    fn resolve(file: AuthorityConfigOverride) -> Result<Self, StartupError> {
        let private_key = file
            .private_key
            .or_else(|| env(PRIVATE_KEY).map(PathBuf::from))
            .ok_or(StartupError::MissingSetting(PRIVATE_KEY))?;
        let public_key = file
            .public_key
            .or_else(|| env(PUBLIC_KEY).map(PathBuf::from))
            .ok_or(StartupError::MissingSetting(PUBLIC_KEY))?;

        let cache_url = file
            .cache_url
            .or_else(|| env(CACHE_URL))
            .unwrap_or_else(|| "memory://".to_string());
        let dedup_ttl = match file.dedup_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => env_parse::<u64>(DEDUP_TTL_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEDUP_TTL),
        };
        let dedup_capacity = match file.dedup_capacity {
            Some(capacity) => capacity,
            None => env_parse(DEDUP_CAPACITY)?.unwrap_or(DEFAULT_DEDUP_CAPACITY),
        };
        let user_token_ttl = match file.user_token_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => env_parse::<u64>(USER_TOKEN_TTL_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_USER_TOKEN_TTL),
        };
        let token_salt = file
            .token_salt
            .or_else(|| env(TOKEN_SALT))
            .unwrap_or_default();
        let admin_claim = match file.admin_claim {
            Some(policy) => policy,
            None => match env(ADMIN_CLAIM) {
                Some(value) => value
                    .parse()
                    .map_err(|err: String| anyhow::anyhow!(err))
                    .with_context(|| format!("parse {ADMIN_CLAIM}"))?,
                None => AdminClaimPolicy::default(),
            },
        };
        let challenge_key_bits = match file.challenge_key_bits {
            Some(bits) => bits,
            None => env_parse(CHALLENGE_KEY_BITS)?.unwrap_or(DEFAULT_CHALLENGE_KEY_BITS),
        };
        let bind_addr = file
            .bind_addr
            .or_else(|| env(BIND))
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| format!("parse {BIND}"))?;
        let metrics_bind = file
            .metrics_bind
            .or_else(|| env(METRICS_BIND))
            .unwrap_or_else(|| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| format!("parse {METRICS_BIND}"))?;

        if dedup_capacity == 0 {
            return Err(out_of_range(DEDUP_CAPACITY, "must be at least 1"));
        }
        if user_token_ttl.is_zero() || user_token_ttl > MAX_USER_TOKEN_TTL {
            return Err(out_of_range(
                USER_TOKEN_TTL_SECS,
                format!("must be between 1 and {}", MAX_USER_TOKEN_TTL.as_secs()),
            ));
        }
        if !(MIN_CHALLENGE_KEY_BITS..=MAX_CHALLENGE_KEY_BITS).contains(&challenge_key_bits) {
            return Err(out_of_range(
                CHALLENGE_KEY_BITS,
                format!("must be between {MIN_CHALLENGE_KEY_BITS} and {MAX_CHALLENGE_KEY_BITS}"),
            ));
        }

        Ok(Self {
            bind_addr,
            signing_keys: SigningKeyPaths {
                private_key,
                public_key,
            },
            dedup_cache: DedupCacheConfig {
                url: cache_url,
                ttl: dedup_ttl,
                capacity: dedup_capacity,
            },
            user_token_ttl,
            token_salt,
            admin_claim,
            challenge_key_bits,
            metrics_bind,
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn out_of_range(key: &str, reason: impl std::fmt::Display) -> StartupError {
    StartupError::Config(anyhow::anyhow!("{key} {reason}"))
}

fn env_parse<T>(key: &str) -> Result<Option<T>, StartupError>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env(key) {
        Some(value) => {
            let parsed = value
                .trim()
                .parse::<T>()
                .with_context(|| format!("parse {key}"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    fn clean_env() -> Vec<EnvGuard> {
        [
            PRIVATE_KEY,
            PUBLIC_KEY,
            CACHE_URL,
            DEDUP_TTL_SECS,
            DEDUP_CAPACITY,
            USER_TOKEN_TTL_SECS,
            TOKEN_SALT,
            ADMIN_CLAIM,
            CHALLENGE_KEY_BITS,
            BIND,
            METRICS_BIND,
            CONFIG_FILE,
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_keys_are_set() {
        let _clean = clean_env();
        let _private = EnvGuard::set(PRIVATE_KEY, "/keys/private.pem");
        let _public = EnvGuard::set(PUBLIC_KEY, "/keys/public.pem");

        let config = AuthorityConfig::from_env().expect("config");
        assert_eq!(config.signing_keys.private_key, PathBuf::from("/keys/private.pem"));
        assert_eq!(config.dedup_cache, DedupCacheConfig::default());
        assert_eq!(config.user_token_ttl, Duration::from_secs(259_200));
        assert_eq!(config.admin_claim, AdminClaimPolicy::Unconditional);
        assert_eq!(config.challenge_key_bits, 4096);
        assert_eq!(config.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().expect("addr"));
        assert_eq!(config.metrics_bind, "0.0.0.0:9090".parse::<SocketAddr>().expect("addr"));
        assert!(config.token_salt.is_empty());
    }

    #[test]
    #[serial]
    fn missing_keys_are_startup_errors() {
        let _clean = clean_env();
        assert!(matches!(
            AuthorityConfig::from_env(),
            Err(StartupError::MissingSetting(PRIVATE_KEY))
        ));
        let _private = EnvGuard::set(PRIVATE_KEY, "/keys/private.pem");
        assert!(matches!(
            AuthorityConfig::from_env(),
            Err(StartupError::MissingSetting(PUBLIC_KEY))
        ));
    }

    #[test]
    #[serial]
    fn env_values_are_parsed() {
        let _clean = clean_env();
        let _private = EnvGuard::set(PRIVATE_KEY, "/keys/private.pem");
        let _public = EnvGuard::set(PUBLIC_KEY, "/keys/public.pem");
        let _ttl = EnvGuard::set(DEDUP_TTL_SECS, "5");
        let _policy = EnvGuard::set(ADMIN_CLAIM, "owner-only");
        let _bits = EnvGuard::set(CHALLENGE_KEY_BITS, "2048");
        let _salt = EnvGuard::set(TOKEN_SALT, "pepper");

        let config = AuthorityConfig::from_env().expect("config");
        assert_eq!(config.dedup_cache.ttl, Duration::from_secs(5));
        assert_eq!(config.admin_claim, AdminClaimPolicy::OwnerOnly);
        assert_eq!(config.challenge_key_bits, 2048);
        assert_eq!(config.token_salt, "pepper");

        let _bad = EnvGuard::set(DEDUP_CAPACITY, "lots");
        assert!(matches!(
            AuthorityConfig::from_env(),
            Err(StartupError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn yaml_overrides_env() {
        let _clean = clean_env();
        let _private = EnvGuard::set(PRIVATE_KEY, "/env/private.pem");
        let _cache = EnvGuard::set(CACHE_URL, "memory://env");

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            "public_key: /yaml/public.pem\ncache_url: memory://yaml\nadmin_claim: owner-only\nmetrics_bind: 127.0.0.1:9191"
        )
        .expect("write");
        let path = file.path().to_string_lossy().into_owned();
        let _config = EnvGuard::set(CONFIG_FILE, &path);

        let config = AuthorityConfig::from_env_or_yaml().expect("config");
        assert_eq!(config.signing_keys.private_key, PathBuf::from("/env/private.pem"));
        assert_eq!(config.signing_keys.public_key, PathBuf::from("/yaml/public.pem"));
        assert_eq!(config.dedup_cache.url, "memory://yaml");
        assert_eq!(config.admin_claim, AdminClaimPolicy::OwnerOnly);
        assert_eq!(config.metrics_bind, "127.0.0.1:9191".parse::<SocketAddr>().expect("addr"));
    }

    #[test]
    #[serial]
    fn out_of_range_values_are_rejected_at_startup() {
        let _clean = clean_env();
        let _private = EnvGuard::set(PRIVATE_KEY, "/keys/private.pem");
        let _public = EnvGuard::set(PUBLIC_KEY, "/keys/public.pem");

        for (key, value) in [
            (DEDUP_CAPACITY, "0"),
            (CHALLENGE_KEY_BITS, "512"),
            (CHALLENGE_KEY_BITS, "65536"),
            (USER_TOKEN_TTL_SECS, "0"),
            (USER_TOKEN_TTL_SECS, "18446744073709551615"),
        ] {
            let _bad = EnvGuard::set(key, value);
            let err = AuthorityConfig::from_env().expect_err(value);
            assert!(
                matches!(&err, StartupError::Config(_)) && err.to_string().contains(key),
                "{key}={value}: {err}"
            );
        }
        assert!(AuthorityConfig::from_env().is_ok());
    }

    #[test]
    #[serial]
    fn out_of_range_yaml_values_are_rejected() {
        let _clean = clean_env();
        let _private = EnvGuard::set(PRIVATE_KEY, "/keys/private.pem");
        let _public = EnvGuard::set(PUBLIC_KEY, "/keys/public.pem");

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "dedup_capacity: 0").expect("write");
        let path = file.path().to_string_lossy().into_owned();
        let _config = EnvGuard::set(CONFIG_FILE, &path);

        assert!(matches!(
            AuthorityConfig::from_env_or_yaml(),
            Err(StartupError::Config(_))
        ));
    }

    #[test]
    #[serial]
    fn unreadable_yaml_is_a_config_error() {
        let _clean = clean_env();
        let _config = EnvGuard::set(CONFIG_FILE, "/nonexistent/authority.yaml");
        assert!(matches!(
            AuthorityConfig::from_env_or_yaml(),
            Err(StartupError::Config(_))
        ));
    }
}
