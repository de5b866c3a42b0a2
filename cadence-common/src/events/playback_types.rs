//! Playback-related type definitions
//!
//! Supporting types for engine status and enrichment progress.

use serde::{Deserialize, Serialize};

/// Engine status enumeration
///
/// `Running` means the engine keeps starting entries as sessions finish;
/// `Stopped` means it idles and collects leftover resources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Nothing is started when the current session ends
    #[default]
    Stopped,
    /// Next entry is started when the current session ends
    Running,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::Stopped => write!(f, "stopped"),
            EngineStatus::Running => write!(f, "running"),
        }
    }
}

/// Enrichment stage that produced an item change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum EnrichmentStage {
    /// Container/basic metadata parsed by the primary worker
    Parse,
    /// Tags (and possibly artwork) fetched by the secondary worker
    Fetch,
}

impl std::fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentStage::Parse => write!(f, "Parse"),
            EnrichmentStage::Fetch => write!(f, "Fetch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_status_serialization() {
        let json = serde_json::to_string(&EngineStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let parsed: EngineStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(parsed, EngineStatus::Stopped);
    }

    #[test]
    fn test_engine_status_default_is_stopped() {
        assert_eq!(EngineStatus::default(), EngineStatus::Stopped);
        assert_eq!(EngineStatus::Running.to_string(), "running");
    }
}
