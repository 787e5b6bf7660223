//! Process configuration, read from the environment.

use tracing_subscriber::EnvFilter;
use tricolor_shm::{DEFAULT_NAMESPACE, RingNames};

use crate::error::Error;

/// Environment variable selecting the system-name prefix of a run.
pub const NAMESPACE_ENV: &str = "TRICOLOR_NAMESPACE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Prefix of the shared segment and semaphore names.
    pub namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(namespace) = lookup(NAMESPACE_ENV).filter(|ns| !ns.is_empty()) {
            config.namespace = namespace;
        }
        config
    }

    /// The four system names of this run.
    pub fn names(&self) -> Result<RingNames, Error> {
        Ok(RingNames::new(&self.namespace)?)
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_defaults_when_unset_or_empty() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
        assert_eq!(
            Config::from_lookup(|_| Some(String::new())).namespace,
            DEFAULT_NAMESPACE
        );
    }

    #[test]
    fn namespace_comes_from_env() {
        let config = Config::from_lookup(|key| (key == NAMESPACE_ENV).then(|| "run7".to_owned()));
        assert_eq!(config.namespace, "run7");
        let names = config.names().unwrap();
        assert_eq!(names.shm().to_str().unwrap(), "/run7_shm");
        assert_eq!(names.write().to_str().unwrap(), "/run7_write");
    }

    #[test]
    fn invalid_namespace_is_an_error() {
        let config = Config {
            namespace: "a/b".to_owned(),
        };
        assert!(matches!(config.names(), Err(Error::Shm(_))));
    }
}
