//! # vaind
//!
//! HTTP front end of the vanity import registry: answers `go get` meta lookups and exposes
//! the publish, unpublish and credential endpoints.
//!
//! ## Example
//! ```no_run
//! use vain_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(4040)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

mod config;
mod error;
mod mail;
mod router;
mod state;

pub use config::{
    AuthConfig, Backend, ConfigError, LogConfig, ServerConfig, StoreConfig, TlsConfig, VainConfig,
    load_config,
};
pub use error::ApiError;
pub use mail::{LogMailer, MailError, Mailer};
pub use router::init as app_router;
pub use state::{AppState, AppStateInner};

use anyhow::{Context, Result};
use axum_server::Handle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use vain_registry::Registry;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: VainConfig,
    mailer: Option<Arc<dyn Mailer>>,
}

impl ServerBuilder {
    pub fn config(mut self, cfg: VainConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    /// Replaces the default [`LogMailer`].
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    async fn open_registry(&self) -> Result<Registry> {
        let store = self.cfg.store.clone();
        info!(backend = ?store.backend, path = %store.path.display(), "Opening registry");

        let registry = tokio::task::spawn_blocking(move || match store.backend {
            Backend::Json => Registry::open_json(&store.path),
            Backend::Redb => Registry::open_redb(&store.path),
            Backend::Memory => Ok(Registry::in_memory()),
        })
        .await
        .context("Registry loader task failed")?
        .context("Failed to open registry")?;
        Ok(registry)
    }

    fn validate_tls_config(&self) -> Result<()> {
        if let Some(tls) = &self.cfg.server.tls {
            if !tls.cert.exists() {
                anyhow::bail!("TLS certificate not found at: {}", tls.cert.display());
            }
            if !tls.key.exists() {
                anyhow::bail!("TLS key not found at: {}", tls.key.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let metadata = tls.key.metadata()?;
                if metadata.permissions().mode() & 0o077 != 0 {
                    warn!(
                        "SECURITY: TLS private key {} has insecure permissions (should be 600)",
                        tls.key.display()
                    );
                }
            }
        }
        Ok(())
    }

    /// Consumes the builder, validates TLS material and loads the registry.
    ///
    /// # Errors
    /// Returns an error if:
    /// * TLS certificate or key files are missing
    /// * The persisted snapshot cannot be read or is inconsistent
    pub async fn build(self) -> Result<Server> {
        self.validate_tls_config()?;

        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(address = %address, "Initializing server");

        let registry = self.open_registry().await?;
        let mailer = self.mailer.unwrap_or_else(|| Arc::new(LogMailer));

        let state = AppState::new(registry, mailer)
            .with_reset_window(self.cfg.auth.reset_window())
            .with_host(self.cfg.server.host.clone())
            .with_tls(self.cfg.server.tls.is_some());

        Ok(Server { cfg: self.cfg, state })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    cfg: VainConfig,
    state: AppState,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Serves until a shutdown signal arrives, then flushes the registry one last time.
    ///
    /// # Errors
    /// Returns an error if the listener cannot bind, TLS setup fails or the final flush
    /// fails.
    pub async fn run(self) -> Result<()> {
        let cfg = self.cfg;
        let address = SocketAddr::new(cfg.server.address, cfg.server.port);
        let registry = self.state.registry.clone();

        info!(address = %address, tls = cfg.server.tls.is_some(), "Starting server");

        let app = router::init(self.state);

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();

        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        if let Some(tls) = &cfg.server.tls {
            info!("Starting HTTPS server on https://{address}");

            let tls_config =
                axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                    .await
                    .context("Failed to load TLS certificates")?;

            axum_server::bind_rustls(address, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        } else {
            info!("Starting HTTP server on http://{address}");

            axum_server::bind(address)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")?;
        }

        tokio::task::spawn_blocking(move || registry.flush())
            .await
            .context("Final flush task failed")?
            .context("Final flush failed")?;

        info!("Server shutdown complete");
        Ok(())
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => {
            res.context("Ctrl+C signal received")?;
        },
        res = terminate => {
            res.context("SIGTERM signal received")?;
        },
    }

    Ok(())
}
