//! Performance metrics for an evaluated candidate.
//!
//! The platform's alpha document is deserialized defensively: any metric the
//! platform does not supply stays `None`, and a `None` metric ranks as 0.0 in
//! the search strategies, never as an error.

use serde::{Deserialize, Serialize};

/// In-sample check names carried in the alpha document.
const CHECK_CONCENTRATED_WEIGHT: &str = "CONCENTRATED_WEIGHT";
const CHECK_LOW_SUB_UNIVERSE_SHARPE: &str = "LOW_SUB_UNIVERSE_SHARPE";

/// Structured metrics for one evaluated candidate.
///
/// Every entry may be absent: the platform omits metrics for degenerate
/// alphas, and the auxiliary fields (`min_correlation`, `max_correlation`,
/// `score_delta`) are only populated when the sharpe magnitude crosses the
/// materiality threshold and the auxiliary endpoints answer before their
/// timeout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceVector {
    pub expression: Option<String>,
    pub sharpe: Option<f64>,
    pub turnover: Option<f64>,
    pub fitness: Option<f64>,
    pub returns: Option<f64>,
    pub drawdown: Option<f64>,
    pub margin: Option<f64>,
    pub long_count: Option<i64>,
    pub short_count: Option<i64>,
    pub weight_check: Option<String>,
    pub sub_universe_check: Option<String>,
    pub universe: Option<String>,
    pub delay: Option<i64>,
    pub decay: Option<i64>,
    pub neutralization: Option<String>,
    pub truncation: Option<f64>,
    pub min_correlation: Option<f64>,
    pub max_correlation: Option<f64>,
    /// Competition score delta (after minus before).
    pub score_delta: Option<f64>,
    /// Remote alpha id.
    pub alpha_id: Option<String>,
}

/// Alpha document fetched from the platform after a simulation completes.
#[derive(Debug, Clone, Deserialize)]
pub struct AlphaDocument {
    pub id: String,
    #[serde(default)]
    pub settings: EchoedSettings,
    #[serde(rename = "is", default)]
    pub in_sample: InSampleMetrics,
    #[serde(default)]
    pub regular: RegularBlock,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegularBlock {
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EchoedSettings {
    pub universe: Option<String>,
    pub delay: Option<i64>,
    pub decay: Option<i64>,
    pub neutralization: Option<String>,
    pub truncation: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InSampleMetrics {
    pub sharpe: Option<f64>,
    pub turnover: Option<f64>,
    pub fitness: Option<f64>,
    pub returns: Option<f64>,
    pub drawdown: Option<f64>,
    pub margin: Option<f64>,
    #[serde(rename = "longCount")]
    pub long_count: Option<i64>,
    #[serde(rename = "shortCount")]
    pub short_count: Option<i64>,
    #[serde(default)]
    pub checks: Vec<SampleCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleCheck {
    pub name: Option<String>,
    pub result: Option<String>,
}

/// Self-correlation bounds from the correlations endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CorrelationBounds {
    pub min: f64,
    pub max: f64,
}

impl AlphaDocument {
    fn check_result(&self, name: &str) -> Option<String> {
        self.in_sample
            .checks
            .iter()
            .find(|c| c.name.as_deref() == Some(name))
            .and_then(|c| c.result.clone())
    }

    /// Flatten the document into a [`PerformanceVector`].
    pub fn into_vector(self) -> PerformanceVector {
        let weight_check = self.check_result(CHECK_CONCENTRATED_WEIGHT);
        let sub_universe_check = self.check_result(CHECK_LOW_SUB_UNIVERSE_SHARPE);
        PerformanceVector {
            expression: self.regular.code,
            sharpe: self.in_sample.sharpe,
            turnover: self.in_sample.turnover,
            fitness: self.in_sample.fitness,
            returns: self.in_sample.returns,
            drawdown: self.in_sample.drawdown,
            margin: self.in_sample.margin,
            long_count: self.in_sample.long_count,
            short_count: self.in_sample.short_count,
            weight_check,
            sub_universe_check,
            universe: self.settings.universe,
            delay: self.settings.delay,
            decay: self.settings.decay,
            neutralization: self.settings.neutralization,
            truncation: self.settings.truncation,
            min_correlation: None,
            max_correlation: None,
            score_delta: None,
            alpha_id: Some(self.id),
        }
    }
}
