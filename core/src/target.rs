//! Output targets for code generation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A code-generation mode with its own reference-extraction rules.
///
/// The serialized tags (`TSClient`, `TSServer`) are the keys used in the
/// manifest's `apiTypes` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputTarget {
    #[serde(rename = "TSClient")]
    Client,
    #[serde(rename = "TSServer")]
    Server,
}

/// An output-target tag that is not recognised. Fatal for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output target `{0}` (expected TSClient or TSServer)")]
pub struct UnknownOutputTarget(pub String);

impl OutputTarget {
    pub const ALL: [OutputTarget; 2] = [OutputTarget::Client, OutputTarget::Server];

    /// Returns the manifest tag.
    pub fn tag(self) -> &'static str {
        match self {
            OutputTarget::Client => "TSClient",
            OutputTarget::Server => "TSServer",
        }
    }

    /// Whether subscription message payloads are needed by this target.
    pub fn includes_subscriptions(self) -> bool {
        matches!(self, OutputTarget::Server)
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OutputTarget {
    type Err = UnknownOutputTarget;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TSClient" => Ok(OutputTarget::Client),
            "TSServer" => Ok(OutputTarget::Server),
            other => Err(UnknownOutputTarget(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!("TSClient".parse(), Ok(OutputTarget::Client));
        assert_eq!("TSServer".parse(), Ok(OutputTarget::Server));
        assert_eq!(
            "TSWeb".parse::<OutputTarget>(),
            Err(UnknownOutputTarget("TSWeb".to_string()))
        );
    }

    #[test]
    fn test_serde_tags_match_display() {
        for target in OutputTarget::ALL {
            let json = serde_json::to_string(&target).unwrap();
            assert_eq!(json, format!("\"{target}\""));
        }
    }
}
