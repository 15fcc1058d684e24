use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "낮음")]
    Low,
    #[serde(rename = "중간")]
    Medium,
    #[serde(rename = "높음")]
    High,
    #[serde(rename = "치명적")]
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "낮음",
            Self::Medium => "중간",
            Self::High => "높음",
            Self::Critical => "치명적",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        match trimmed {
            "낮음" => return Ok(Self::Low),
            "중간" => return Ok(Self::Medium),
            "높음" => return Ok(Self::High),
            "치명적" => return Ok(Self::Critical),
            _ => {}
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "mid" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown risk level '{}'", raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    AtMost,
    AtLeast,
    Unknown(String),
}

impl Direction {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "<=" => Self::AtMost,
            ">=" => Self::AtLeast,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AtMost => "<=",
            Self::AtLeast => ">=",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ─── Table rows ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StoreRecord {
    pub store_id: String,
    pub name: String,
    pub trading_area: String,
    pub industry: String,
    pub region: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cluster_id: Option<u32>,
    pub features: BTreeMap<String, f64>,
}

impl StoreRecord {
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreLocation {
    pub store_id: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetadata {
    pub cluster_id: u32,
    pub cluster_name: String,
    pub summary: String,
    pub closure_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    pub cluster_id: u32,
    pub feature: String,
    pub direction: Direction,
    pub threshold: f64,
    pub risk_level: RiskLevel,
    pub description: String,
    pub feature_korean: String,
}

impl RuleDefinition {
    pub fn display_name(&self) -> &str {
        if self.feature_korean.trim().is_empty() {
            &self.feature
        } else {
            &self.feature_korean
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEntry {
    pub feature: String,
    pub display_name: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisResult {
    pub store_id: String,
    pub risk_score: Option<f64>,
    pub violation_count: Option<u32>,
    pub critical_violation_count: Option<u32>,
    pub sales_prediction: Option<f64>,
    pub event_prediction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGrade {
    pub store_id: String,
    pub year_month: String,
    pub grade: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPrediction {
    #[serde(skip_serializing)]
    pub store_id: String,
    pub horizon: u8,
    pub target_month: String,
    pub predicted_grade: Option<u8>,
    pub predicted_grade_proba: Option<f64>,
    pub p_low56: Option<f64>,
    pub risk_worsen_2plus: Option<f64>,
    pub last_grade: Option<u8>,
}

// ─── Report payload ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub id: String,
    pub name: String,
    pub trading_area: String,
    pub industry: String,
    pub region: String,
    pub cluster: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub closure_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResults {
    pub sales_prediction: Option<f64>,
    pub event_prediction: Option<String>,
    pub survival_probability: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleViolation {
    pub feature: String,
    pub feature_korean: String,
    pub current_value: f64,
    pub threshold: f64,
    pub direction: Direction,
    pub risk_level: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterIndicator {
    pub name: String,
    pub feature: String,
    pub value: f64,
    pub cluster_avg: f64,
    pub unit: String,
    pub higher_is_better: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    Actual,
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub month: String,
    pub sales_grade: Option<u8>,
    #[serde(rename = "type")]
    pub kind: TrendKind,
    pub cluster_rank: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_low56: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_worsen: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatistics {
    pub cluster_closure_rate: f64,
    pub industry_avg_closure_rate: f64,
    pub industry_store_count: usize,
    pub violation_count: u32,
    pub critical_violation_count: u32,
    pub rule_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub range: String,
    pub cluster: usize,
    pub my_store: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreReport {
    pub store_info: StoreInfo,
    pub cluster_id: Option<u32>,
    pub cluster_name: String,
    pub cluster_summary: String,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub model_results: ModelResults,
    pub violations: Vec<RuleViolation>,
    pub cluster_indicators: Vec<ClusterIndicator>,
    pub trend_data: Vec<TrendPoint>,
    pub sales_predictions: Vec<SalesPrediction>,
    pub statistics: ReportStatistics,
    pub distribution: Vec<DistributionBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySuggestion {
    pub summary: String,
    pub strategies: Vec<String>,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: StoreReport,
    pub llm_suggestion: StrategySuggestion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOverview {
    #[serde(flatten)]
    pub metadata: ClusterMetadata,
    pub store_count: usize,
    pub rule_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub detail: String,
    pub code: Option<String>,
}
