use std::env;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use quiz_core::model::{DocumentId, ProgressAggregate};
use storage::repository::{CatalogEntry, DocumentRecord, SessionReport};

use super::ProgressGateway;
use crate::error::GatewayError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Clone, Debug)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub token: String,
}

impl HttpGatewayConfig {
    /// Read `QUIZ_API_TOKEN` and `QUIZ_API_BASE_URL`. `None` without a token.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let token = env::var("QUIZ_API_TOKEN").ok()?;
        if token.trim().is_empty() {
            return None;
        }
        let base_url = env::var("QUIZ_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Some(Self { base_url, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// Talks to the quiz server's REST API with a bearer token.
#[derive(Clone)]
pub struct HttpProgressGateway {
    client: Client,
    config: Option<HttpGatewayConfig>,
}

impl HttpProgressGateway {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(HttpGatewayConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<HttpGatewayConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn config(&self) -> Result<&HttpGatewayConfig, GatewayError> {
        self.config.as_ref().ok_or(GatewayError::Disabled)
    }
}

#[async_trait]
impl ProgressGateway for HttpProgressGateway {
    async fn save(
        &self,
        document: &DocumentRecord,
        report: &SessionReport,
    ) -> Result<(), GatewayError> {
        let config = self.config()?;
        let payload = SaveProgressRequest {
            pdf_id: document.id.value(),
            pdf_name: &document.name,
            questions_answered: report.questions_answered,
            questions_correct: report.questions_correct,
            score_pct: report.score_percent,
        };

        let response = self
            .client
            .post(config.url("quiz/save-progress"))
            .bearer_auth(&config.token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let body: SaveProgressResponse = response.json().await?;
        if !body.ok {
            return Err(GatewayError::Rejected);
        }
        Ok(())
    }

    async fn catalog(&self) -> Result<Vec<CatalogEntry>, GatewayError> {
        let config = self.config()?;
        let response = self
            .client
            .get(config.url("pdfs/list"))
            .bearer_auth(&config.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::HttpStatus(response.status()));
        }

        let rows: Vec<CatalogRow> = response.json().await?;
        rows.into_iter().map(CatalogRow::into_entry).collect()
    }
}

#[derive(Debug, Serialize)]
struct SaveProgressRequest<'a> {
    pdf_id: u64,
    pdf_name: &'a str,
    questions_answered: u32,
    questions_correct: u32,
    score_pct: u8,
}

#[derive(Debug, Deserialize)]
struct SaveProgressResponse {
    #[serde(default)]
    ok: bool,
}

/// Catalog listing row; progress columns are null for unquizzed documents.
#[derive(Debug, Deserialize)]
struct CatalogRow {
    id: u64,
    name: String,
    total_answered: Option<u64>,
    total_correct: Option<u64>,
    sessions: Option<u32>,
    last_score: Option<u8>,
    last_session: Option<String>,
}

impl CatalogRow {
    fn into_entry(self) -> Result<CatalogEntry, GatewayError> {
        let progress = match self.sessions {
            None => None,
            Some(sessions) => {
                let last_session_at = self
                    .last_session
                    .as_deref()
                    .map(parse_timestamp)
                    .transpose()?;
                let total_answered = self.total_answered.unwrap_or(0);
                Some(ProgressAggregate {
                    total_answered,
                    total_correct: self.total_correct.unwrap_or(0).min(total_answered),
                    session_count: sessions,
                    last_score_percent: self.last_score,
                    last_session_at,
                })
            }
        };
        Ok(CatalogEntry {
            document: DocumentRecord::new(DocumentId::new(self.id), self.name),
            progress,
        })
    }
}

/// RFC 3339, or the bare `YYYY-MM-DD HH:MM:SS` the server stores (UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, GatewayError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| GatewayError::Decode(format!("last_session {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_shapes() {
        let a = parse_timestamp("2023-11-14 22:13:20").unwrap();
        let b = parse_timestamp("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.timestamp(), 1_700_000_000);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(GatewayError::Decode(_))
        ));
    }

    #[test]
    fn null_progress_columns_mean_unquizzed() {
        let row: CatalogRow =
            serde_json::from_str(r#"{"id":3,"name":"Renal","total_answered":null,"sessions":null}"#)
                .unwrap();
        let entry = row.into_entry().unwrap();
        assert_eq!(entry.document.name, "Renal");
        assert!(entry.progress.is_none());
    }

    #[tokio::test]
    async fn disabled_gateway_refuses_calls() {
        let gateway = HttpProgressGateway::new(None);
        assert!(!gateway.enabled());
        assert!(matches!(
            gateway.catalog().await,
            Err(GatewayError::Disabled)
        ));
    }
}
