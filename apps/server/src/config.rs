//! Layered configuration: an optional TOML file, then `VAIN__`-prefixed environment
//! overrides (`VAIN__STORE__BACKEND=redb` maps to `store.backend`). Every field has a
//! default, so an empty environment yields a runnable development server.

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_FILE: &str = "vaind";
const ENV_PREFIX: &str = "VAIN";

#[vain_derive::vain_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VainConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Host used for package paths and mailed links instead of the request's `Host`.
    pub host: Option<String>,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Json,
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Minimum spacing between two token resets of one user.
    pub reset_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
    pub dir: Option<PathBuf>,
    pub rotation: String,
}

impl AuthConfig {
    #[must_use]
    pub const fn reset_window(&self) -> Duration {
        Duration::from_secs(self.reset_window_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 4040, host: None, tls: None }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self { cert: PathBuf::from("cert.pem"), key: PathBuf::from("key.pem") }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: Backend::default(), path: PathBuf::from("vain.redb") }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { reset_window_secs: 300 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            dir: None,
            rotation: "daily".to_owned(),
        }
    }
}

/// Loads [`VainConfig`] from `path` (default `vaind.toml`, optional) and the environment.
///
/// # Errors
///
/// Returns [`ConfigError::Config`] when an explicitly named file is missing, or when a
/// value cannot be deserialized into its field.
pub fn load_config(path: Option<&Path>) -> Result<VainConfig, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::new(DEFAULT_FILE, FileFormat::Toml).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let source: Cow<'_, str> =
        path.map_or(Cow::Borrowed(DEFAULT_FILE), |p| p.display().to_string().into());
    info!(file = %source, "Loading config");

    let cfg = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<VainConfig>()
        .context("Failed to deserialize config")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.server.port, 4040);
        assert_eq!(cfg.store.backend, Backend::Redb);
        assert_eq!(cfg.auth.reset_window(), Duration::from_secs(300));
        assert!(cfg.server.tls.is_none());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            port = 8080
            host = "go.example.org"

            [store]
            backend = "json"
            path = "/var/lib/vain/vain.json"

            [auth]
            reset_window_secs = 60
            "#
        )
        .unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host.as_deref(), Some("go.example.org"));
        assert_eq!(cfg.store.backend, Backend::Json);
        assert_eq!(cfg.store.path, PathBuf::from("/var/lib/vain/vain.json"));
        assert_eq!(cfg.auth.reset_window_secs, 60);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/vaind.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to build config"), "{err}");
    }
}
