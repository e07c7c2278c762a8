use crate::mail::Mailer;
use axum::extract::FromRef;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use vain_registry::Registry;

#[derive(Debug, Clone)]
pub struct AppStateInner {
    pub registry: Registry,
    pub mailer: Arc<dyn Mailer>,
    pub reset_window: Duration,
    /// Overrides the request's `Host` header when set.
    pub host: Option<String>,
    /// `https` when the listener terminates TLS.
    pub scheme: &'static str,
}

/// Handler state, cheap to clone into every request.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Registry, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                mailer,
                reset_window: Duration::from_secs(300),
                host: None,
                scheme: "http",
            }),
        }
    }

    #[must_use]
    pub fn with_reset_window(self, window: Duration) -> Self {
        self.with(|inner| inner.reset_window = window)
    }

    #[must_use]
    pub fn with_host(self, host: Option<String>) -> Self {
        self.with(|inner| inner.host = host)
    }

    #[must_use]
    pub fn with_tls(self, tls: bool) -> Self {
        self.with(|inner| inner.scheme = if tls { "https" } else { "http" })
    }

    fn with(self, edit: impl FnOnce(&mut AppStateInner)) -> Self {
        let mut inner = Arc::unwrap_or_clone(self.inner);
        edit(&mut inner);
        Self { inner: Arc::new(inner) }
    }
}

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromRef<AppState> for Registry {
    fn from_ref(state: &AppState) -> Self {
        state.inner.registry.clone()
    }
}
