use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use storage::local::LocalProgressStore;
use storage::repository::{ProgressStore, Storage};

use crate::Clock;
use crate::error::{AppServicesError, GatewayError};
use crate::gate::{AlwaysAllow, SessionGate};
use crate::progress::{
    CatalogGateway, HttpGatewayConfig, HttpProgressGateway, ProgressGateway, RemoteProgressStore,
};
use crate::sessions::{ProgressSummaryService, SessionController};

/// Where completed sessions are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    /// One blob on this machine, keyed by topic.
    #[default]
    Local,
    /// Document catalog in the same database, merged in SQL.
    Server,
    /// Quiz server reached over HTTP.
    Http,
}

impl BackendMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Server => "server",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "server" => Ok(Self::Server),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown backend: {other} (expected local, server or http)")),
        }
    }
}

/// Fully resolved backend choice.
#[derive(Debug, Clone)]
pub enum ProgressBackend {
    Local,
    Server,
    Http(HttpGatewayConfig),
}

impl ProgressBackend {
    /// Resolve a mode, reading HTTP settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Gateway` for `Http` without `QUIZ_API_TOKEN`.
    pub fn from_mode(mode: BackendMode) -> Result<Self, AppServicesError> {
        match mode {
            BackendMode::Local => Ok(Self::Local),
            BackendMode::Server => Ok(Self::Server),
            BackendMode::Http => HttpGatewayConfig::from_env()
                .map(Self::Http)
                .ok_or(AppServicesError::Gateway(GatewayError::Disabled)),
        }
    }

    #[must_use]
    pub fn mode(&self) -> BackendMode {
        match self {
            Self::Local => BackendMode::Local,
            Self::Server => BackendMode::Server,
            Self::Http(_) => BackendMode::Http,
        }
    }
}

/// Assembles the progress backend and the services built on it.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    mode: BackendMode,
    storage: Storage,
    progress: Arc<dyn ProgressStore>,
    summaries: Arc<ProgressSummaryService>,
    gate: Arc<dyn SessionGate>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock, backend: ProgressBackend) -> Self {
        let mode = backend.mode();
        let (progress, summaries): (Arc<dyn ProgressStore>, ProgressSummaryService) =
            match backend {
                ProgressBackend::Local => {
                    let store: Arc<dyn ProgressStore> =
                        Arc::new(LocalProgressStore::new(Arc::clone(&storage.blobs)));
                    (Arc::clone(&store), ProgressSummaryService::new(store))
                }
                ProgressBackend::Server => {
                    let gateway: Arc<dyn ProgressGateway> =
                        Arc::new(CatalogGateway::new(Arc::clone(&storage.catalog)));
                    remote(gateway)
                }
                ProgressBackend::Http(config) => {
                    let gateway: Arc<dyn ProgressGateway> =
                        Arc::new(HttpProgressGateway::new(Some(config)));
                    remote(gateway)
                }
            };
        tracing::info!(backend = %mode, "progress backend ready");

        Self {
            clock,
            mode,
            storage,
            progress,
            summaries: Arc::new(summaries),
            gate: Arc::new(AlwaysAllow),
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        backend: ProgressBackend,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(storage, clock, backend))
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn SessionGate>) -> Self {
        self.gate = gate;
        self
    }

    #[must_use]
    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn progress_summaries(&self) -> Arc<ProgressSummaryService> {
        Arc::clone(&self.summaries)
    }

    /// A fresh controller in `Selecting`, wired to the chosen backend.
    #[must_use]
    pub fn controller(&self) -> SessionController {
        SessionController::new(self.clock, Arc::clone(&self.progress))
            .with_gate(Arc::clone(&self.gate))
    }
}

fn remote(gateway: Arc<dyn ProgressGateway>) -> (Arc<dyn ProgressStore>, ProgressSummaryService) {
    let store: Arc<dyn ProgressStore> = Arc::new(RemoteProgressStore::new(Arc::clone(&gateway)));
    (store, ProgressSummaryService::with_catalog(gateway))
}
