//! Simulation settings passed through to the platform unchanged.

use serde::{Deserialize, Serialize};

/// Opaque platform configuration for one simulation.
///
/// Field names and casing follow the platform wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSettings {
    pub instrument_type: String,
    pub region: String,
    pub universe: String,
    pub delay: u32,
    pub decay: u32,
    pub neutralization: String,
    pub truncation: f64,
    pub pasteurization: String,
    pub unit_handling: String,
    pub nan_handling: String,
    pub language: String,
    pub visualization: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            instrument_type: "EQUITY".to_string(),
            region: "USA".to_string(),
            universe: "TOP3000".to_string(),
            delay: 1,
            decay: 0,
            neutralization: "INDUSTRY".to_string(),
            truncation: 0.05,
            pasteurization: "ON".to_string(),
            unit_handling: "VERIFY".to_string(),
            nan_handling: "ON".to_string(),
            language: "FASTEXPR".to_string(),
            visualization: false,
        }
    }
}

/// One simulation submission: settings plus the candidate expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub settings: SimulationSettings,
    /// Candidate expression text.
    pub regular: String,
}

impl SimulationRequest {
    pub fn regular(expression: &str, settings: SimulationSettings) -> Self {
        Self {
            kind: "REGULAR".to_string(),
            settings,
            regular: expression.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_platform_casing() {
        let req = SimulationRequest::regular("rank(close)", SimulationSettings::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "REGULAR");
        assert_eq!(json["settings"]["instrumentType"], "EQUITY");
        assert_eq!(json["settings"]["unitHandling"], "VERIFY");
        assert_eq!(json["regular"], "rank(close)");
    }
}
