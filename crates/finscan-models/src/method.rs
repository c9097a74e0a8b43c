//! Analysis method configuration and run status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status of one analysis run, stored verbatim in the `analysis` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisStatus {
    #[serde(rename = "FINISHED")]
    Finished,
    #[serde(rename = "FAILED")]
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Finished => "FINISHED",
            AnalysisStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a detection algorithm, read from the
/// `<algorithm-name>.json` file colocated with the algorithm.
///
/// `name` and `script` are required; any further tuning parameters are
/// kept as-is and round-trip through `params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodConfig {
    pub name: String,
    pub script: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl MethodConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Compact re-serialization, used to normalize the on-disk file
    /// before storing it as the method's parameters.
    pub fn normalized(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
