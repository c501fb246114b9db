#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod gate;
pub mod progress;
pub mod sessions;

pub use quiz_core::Clock;

pub use app_services::{AppServices, BackendMode, ProgressBackend};
pub use error::{AppServicesError, GatewayError, SessionError};
pub use gate::{AlwaysAllow, SessionGate, SwitchGate};
pub use progress::{
    CatalogGateway, HttpGatewayConfig, HttpProgressGateway, ProgressGateway, RemoteProgressStore,
};
pub use sessions::{
    ActiveSession, AnswerReveal, CompletedSession, ProgressSummaryService, SessionController,
    SessionProgress, SessionStage, TopicProgressItem,
};
