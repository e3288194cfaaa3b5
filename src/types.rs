use serde::{Deserialize, Serialize};

/// Genomic interval, 0-based half-open. Missing bounds mean "from the start"
/// and "to the last stored position".
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Region {
    pub fn new(reference_name: impl Into<String>, start: Option<u64>, end: Option<u64>) -> Self {
        Self {
            reference_name: reference_name.into(),
            start,
            end,
        }
    }
}

/// How the depths inside one window collapse to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Mean,
    Max,
}

/// Query parameters for GET /coverage/{id}
#[derive(Debug, Deserialize, Default)]
pub struct CoverageQuery {
    #[serde(rename = "referenceName")]
    pub reference_name: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub window: Option<u64>,
    pub aggregate: Option<Aggregate>,
}

/// Result of a windowed range query over a coverage index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowedDepth {
    pub start: u64,
    pub end: u64,
    #[serde(rename = "windowSize")]
    pub window_size: u64,
    pub aggregate: Aggregate,
    pub values: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct CoverageResponse {
    pub coverage: CoverageResponseBody,
}

#[derive(Debug, Serialize)]
pub struct CoverageResponseBody {
    pub id: String,
    #[serde(rename = "referenceName")]
    pub reference_name: String,
    #[serde(flatten)]
    pub windows: WindowedDepth,
}

#[derive(Debug, Serialize)]
pub struct ChromosomesResponse {
    pub id: String,
    #[serde(rename = "chunkSize")]
    pub chunk_size: u64,
    pub chromosomes: Vec<String>,
}

/// Service info response (GA4GH service-info shape)
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub id: String,
    pub name: String,
    pub r#type: ServiceType,
    pub description: Option<String>,
    pub version: String,
    pub datasets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceType {
    pub group: String,
    pub artifact: String,
    pub version: String,
}
