//! Risk oracle client.
//!
//! The anomaly-scoring service is an opaque collaborator: it receives the
//! attempt context together with the identity's current behavioral-model blob
//! and returns a continuous score plus a possibly-updated blob. The blob is
//! never interpreted here — it is carried verbatim between storage and the
//! oracle.
//!
//! Callers must treat every error from this module as an anomaly (fail-closed);
//! the orchestrator enforces that policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::APP_USER_AGENT;

/// Scores at or above this threshold classify the attempt as anomalous.
pub const ANOMALY_THRESHOLD: f64 = 0.5;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const ENV_SCORE_URL: &str = "GARDISTO_RISK_SCORE_URL";
const ENV_UPDATE_URL: &str = "GARDISTO_RISK_UPDATE_URL";
const ENV_TIMEOUT_SECONDS: &str = "GARDISTO_RISK_TIMEOUT_SECONDS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskVerdict {
    Normal,
    Anomaly,
}

impl RiskVerdict {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= ANOMALY_THRESHOLD {
            Self::Anomaly
        } else {
            Self::Normal
        }
    }
}

/// Supervised-update label sent after a proven outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLabel {
    Normal,
    Anomaly,
}

impl RiskLabel {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Anomaly => "anomaly",
        }
    }
}

/// Verdict plus the behavioral model as it stood after this attempt. The
/// oracle may mutate the model even on a normal verdict.
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub verdict: RiskVerdict,
    pub score: f64,
    pub model: Value,
}

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("invalid risk oracle configuration: {0}")]
    Config(String),

    #[error("risk oracle request failed")]
    Transport(#[from] reqwest::Error),

    #[error("risk oracle returned {0}")]
    Status(StatusCode),

    #[error("risk oracle response missing required fields")]
    MalformedResponse,
}

/// Anomaly-scoring collaborator. `score` classifies an attempt;
/// `request_model_update` feeds back a labeled outcome after the user proved
/// possession of the step-up factor.
#[async_trait]
pub trait RiskOracle: Send + Sync {
    async fn score(
        &self,
        identity: &str,
        context: &Value,
        model: &Value,
    ) -> Result<RiskAssessment, RiskError>;

    async fn request_model_update(
        &self,
        identity: &str,
        context: &Value,
        model: &Value,
        label: RiskLabel,
    ) -> Result<Value, RiskError>;
}

#[derive(Debug, Clone)]
pub struct RiskOracleConfig {
    score_url: Url,
    update_url: Url,
    timeout: Duration,
}

impl RiskOracleConfig {
    #[must_use]
    pub fn new(score_url: Url, update_url: Url) -> Self {
        Self {
            score_url,
            update_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn score_url(&self) -> &Url {
        &self.score_url
    }

    #[must_use]
    pub fn update_url(&self) -> &Url {
        &self.update_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load the oracle endpoints (and optional timeout) from the environment.
    ///
    /// # Errors
    /// Returns an error when a variable is missing or not a valid URL.
    pub fn from_env() -> Result<Self, RiskError> {
        let score_url = env_url(ENV_SCORE_URL)?;
        let update_url = env_url(ENV_UPDATE_URL)?;
        let mut config = Self::new(score_url, update_url);
        if let Ok(seconds) = std::env::var(ENV_TIMEOUT_SECONDS) {
            let seconds: u64 = seconds
                .parse()
                .map_err(|_| RiskError::Config(format!("{ENV_TIMEOUT_SECONDS} must be seconds")))?;
            config = config.with_timeout(Duration::from_secs(seconds));
        }
        Ok(config)
    }
}

fn env_url(key: &str) -> Result<Url, RiskError> {
    let value = std::env::var(key).map_err(|_| RiskError::Config(format!("{key} not defined")))?;
    Url::parse(&value).map_err(|err| RiskError::Config(format!("{key}: {err}")))
}

/// HTTP implementation speaking the oracle's JSON contract.
#[derive(Debug, Clone)]
pub struct HttpRiskOracle {
    client: Client,
    config: RiskOracleConfig,
}

impl HttpRiskOracle {
    /// Build the client once; the request timeout applies to every call.
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be constructed.
    pub fn new(config: RiskOracleConfig) -> Result<Self, RiskError> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl RiskOracle for HttpRiskOracle {
    async fn score(
        &self,
        identity: &str,
        context: &Value,
        model: &Value,
    ) -> Result<RiskAssessment, RiskError> {
        let payload = json!({
            "identity": identity,
            "context": context,
            "model": model,
        });

        debug!("scoring attempt via {}", self.config.score_url());

        let response = self
            .client
            .post(self.config.score_url().clone())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RiskError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        let score = body
            .get("score")
            .and_then(Value::as_f64)
            .ok_or(RiskError::MalformedResponse)?;
        let model = body
            .get("model")
            .cloned()
            .ok_or(RiskError::MalformedResponse)?;

        Ok(RiskAssessment {
            verdict: RiskVerdict::from_score(score),
            score,
            model,
        })
    }

    async fn request_model_update(
        &self,
        identity: &str,
        context: &Value,
        model: &Value,
        label: RiskLabel,
    ) -> Result<Value, RiskError> {
        let payload = json!({
            "identity": identity,
            "context": context,
            "model": model,
            "label": label.as_str(),
        });

        debug!("requesting model update via {}", self.config.update_url());

        let response = self
            .client
            .post(self.config.update_url().clone())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RiskError::Status(response.status()));
        }

        let body: Value = response.json().await?;
        body.get("model")
            .cloned()
            .ok_or(RiskError::MalformedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RiskOracleConfig {
        RiskOracleConfig::new(
            Url::parse("http://oracle.test/predict").expect("score url"),
            Url::parse("http://oracle.test/update").expect("update url"),
        )
    }

    #[test]
    fn verdict_thresholds_at_one_half() {
        assert_eq!(RiskVerdict::from_score(0.0), RiskVerdict::Normal);
        assert_eq!(RiskVerdict::from_score(0.49), RiskVerdict::Normal);
        assert_eq!(RiskVerdict::from_score(0.5), RiskVerdict::Anomaly);
        assert_eq!(RiskVerdict::from_score(0.8), RiskVerdict::Anomaly);
    }

    #[test]
    fn labels_serialize_lowercase() {
        assert_eq!(RiskLabel::Normal.as_str(), "normal");
        assert_eq!(
            serde_json::to_value(RiskLabel::Anomaly).expect("serialize"),
            serde_json::json!("anomaly")
        );
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = config();
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);

        let config = config.with_timeout(Duration::from_secs(1));
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn config_from_env_reads_urls_and_timeout() {
        temp_env::with_vars(
            [
                (ENV_SCORE_URL, Some("http://oracle.test/predict")),
                (ENV_UPDATE_URL, Some("http://oracle.test/update")),
                (ENV_TIMEOUT_SECONDS, Some("9")),
            ],
            || {
                let config = RiskOracleConfig::from_env().expect("config");
                assert_eq!(config.score_url().as_str(), "http://oracle.test/predict");
                assert_eq!(config.update_url().as_str(), "http://oracle.test/update");
                assert_eq!(config.timeout(), Duration::from_secs(9));
            },
        );
    }

    #[test]
    fn config_from_env_requires_urls() {
        temp_env::with_vars(
            [
                (ENV_SCORE_URL, None::<&str>),
                (ENV_UPDATE_URL, Some("http://oracle.test/update")),
            ],
            || {
                assert!(matches!(
                    RiskOracleConfig::from_env(),
                    Err(RiskError::Config(_))
                ));
            },
        );
    }

    #[test]
    fn http_oracle_builds_from_config() {
        assert!(HttpRiskOracle::new(config()).is_ok());
    }
}
