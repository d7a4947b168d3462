//! HTTP server settings loaded through the `config` crate

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Bind address of an HTTP service
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    /// Load settings from `<PREFIX>_HOST` and `<PREFIX>_PORT`
    ///
    /// Missing values fall back to `0.0.0.0` and `default_port`.
    pub fn load(prefix: &str, default_port: u16) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", default_port)?
            .add_source(Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }

    /// Socket address in `host:port` form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_apply_without_environment() {
        unsafe {
            std::env::remove_var("TESTSVC_HOST");
            std::env::remove_var("TESTSVC_PORT");
        }

        let settings = ServerSettings::load("TESTSVC", 3005).unwrap();
        assert_eq!(settings.address(), "0.0.0.0:3005");
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        unsafe {
            std::env::set_var("TESTSVC_HOST", "127.0.0.1");
            std::env::set_var("TESTSVC_PORT", "8088");
        }

        let settings = ServerSettings::load("TESTSVC", 3005).unwrap();
        assert_eq!(
            settings,
            ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8088,
            }
        );

        unsafe {
            std::env::remove_var("TESTSVC_HOST");
            std::env::remove_var("TESTSVC_PORT");
        }
    }
}
