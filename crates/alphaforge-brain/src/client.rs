//! Blocking HTTP client for the remote evaluation platform.

use crate::api::{JobHandle, JobStatus, PollReply, SimulationApi};
use crate::error::BrainError;
use crate::metrics::{AlphaDocument, CorrelationBounds};
use crate::settings::SimulationRequest;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "https://api.worldquantbrain.com";
pub const DEFAULT_COMPETITION: &str = "IQC2025S3";

/// Poll body detail reported when the session cookie has gone stale.
const STALE_CREDENTIALS_DETAIL: &str = "Incorrect authentication credentials.";

/// Platform login credentials, loaded from a JSON file
/// `{"username": ..., "password": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self, BrainError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Session-holding client for the evaluation platform.
///
/// The credential exchange yields a session cookie kept in the underlying
/// cookie store; [`SimulationApi::reauthenticate`] repeats the exchange when
/// the platform reports expiry mid-poll.
pub struct BrainClient {
    http: Client,
    base_url: String,
    competition: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct PollBody {
    status: Option<String>,
    alpha: Option<String>,
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoreBody {
    score: Option<Score>,
}

#[derive(Debug, Deserialize)]
struct Score {
    before: f64,
    after: f64,
}

impl BrainClient {
    pub fn new(credentials: Credentials) -> Result<Self, BrainError> {
        Self::with_base_url(credentials, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(credentials: Credentials, base_url: &str) -> Result<Self, BrainError> {
        let http = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            competition: DEFAULT_COMPETITION.to_string(),
            credentials,
        })
    }

    /// Override the competition used for the score-delta endpoint.
    pub fn with_competition(mut self, competition: &str) -> Self {
        self.competition = competition.to_string();
        self
    }

    /// Exchange credentials for a session cookie. Expects HTTP 201.
    pub fn authenticate(&self) -> Result<(), BrainError> {
        let resp = self
            .http
            .post(format!("{}/authentication", self.base_url))
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .map_err(transport)?;
        match resp.status() {
            StatusCode::CREATED => {
                tracing::info!("authenticated with evaluation platform");
                Ok(())
            }
            status => {
                let body = resp.text().unwrap_or_default();
                Err(BrainError::AuthFailed(format!("HTTP {status}: {body}")))
            }
        }
    }

    fn absolute(&self, location: &str) -> String {
        if location.starts_with("http") {
            location.to_string()
        } else {
            format!("{}{}", self.base_url, location)
        }
    }

    fn read_json_body(resp: Response) -> Result<Option<serde_json::Value>, BrainError> {
        let text = resp.text().map_err(transport)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }
}

fn transport(err: reqwest::Error) -> BrainError {
    BrainError::Transport(err.to_string())
}

impl SimulationApi for BrainClient {
    fn reauthenticate(&mut self) -> Result<(), BrainError> {
        self.authenticate()
    }

    fn submit(&mut self, request: &SimulationRequest) -> Result<JobHandle, BrainError> {
        let resp = self
            .http
            .post(format!("{}/simulations", self.base_url))
            .json(request)
            .send()
            .map_err(transport)?;
        match resp.status() {
            StatusCode::CREATED => {
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string())
                    .ok_or(BrainError::MissingHandle)?;
                Ok(JobHandle(self.absolute(&location)))
            }
            StatusCode::UNAUTHORIZED => Err(BrainError::AuthExpired),
            status => {
                let body = resp.text().unwrap_or_default();
                Err(BrainError::SubmitRejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    fn poll(&mut self, handle: &JobHandle) -> Result<PollReply, BrainError> {
        let resp = self.http.get(&handle.0).send().map_err(transport)?;
        let unauthorized = resp.status() == StatusCode::UNAUTHORIZED;
        let text = resp.text().map_err(transport)?;
        if text.trim().is_empty() {
            // Simulation accepted but no progress document yet.
            return Ok(PollReply {
                auth_expired: unauthorized,
                ..PollReply::default()
            });
        }
        let body: PollBody = serde_json::from_str(&text)?;
        let auth_expired =
            unauthorized || body.detail.as_deref() == Some(STALE_CREDENTIALS_DETAIL);
        Ok(PollReply {
            status: body.status.as_deref().map(JobStatus::from_remote),
            alpha_id: body.alpha,
            auth_expired,
        })
    }

    fn fetch_metrics(&mut self, alpha_id: &str) -> Result<AlphaDocument, BrainError> {
        let resp = self
            .http
            .get(format!("{}/alphas/{}", self.base_url, alpha_id))
            .send()
            .map_err(transport)?;
        let text = resp.text().map_err(transport)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn probe_correlation(
        &mut self,
        alpha_id: &str,
    ) -> Result<Option<CorrelationBounds>, BrainError> {
        let resp = self
            .http
            .get(format!(
                "{}/alphas/{}/correlations/self",
                self.base_url, alpha_id
            ))
            .send()
            .map_err(transport)?;
        let Some(body) = Self::read_json_body(resp)? else {
            return Ok(None);
        };
        match (
            body.get("min").and_then(|v| v.as_f64()),
            body.get("max").and_then(|v| v.as_f64()),
        ) {
            (Some(min), Some(max)) => Ok(Some(CorrelationBounds { min, max })),
            _ => Ok(None),
        }
    }

    fn probe_competition_score(&mut self, alpha_id: &str) -> Result<Option<f64>, BrainError> {
        let resp = self
            .http
            .get(format!(
                "{}/competitions/{}/alphas/{}/before-and-after-performance",
                self.base_url, self.competition, alpha_id
            ))
            .send()
            .map_err(transport)?;
        let Some(body) = Self::read_json_body(resp)? else {
            return Ok(None);
        };
        let score: ScoreBody = serde_json::from_value(body)?;
        Ok(score.score.map(|s| s.after - s.before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_credentials_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "quant", "password": "secret"}}"#).unwrap();
        let creds = Credentials::load(file.path()).unwrap();
        assert_eq!(creds.username, "quant");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn missing_credentials_file_is_io_error() {
        let err = Credentials::load(Path::new("/nonexistent/credential.json")).unwrap_err();
        assert!(matches!(err, BrainError::Io(_)));
    }
}
