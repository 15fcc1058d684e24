use super::TableRows;
use crate::errors::{AppError, AppResult};
use crate::models::{
    ClusterMetadata, DiagnosisResult, Direction, FeatureEntry, MonthlyGrade, RiskLevel, RuleDefinition,
    SalesPrediction, StoreLocation, StoreRecord,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const STORE_FEATURES_FILE: &str = "store_features.csv";
pub const STORE_LOCATIONS_FILE: &str = "store_locations.csv";
pub const DIAGNOSIS_FILE: &str = "store_diagnosis_results.csv";
pub const CLUSTER_METADATA_FILE: &str = "cluster_metadata.csv";
pub const RULES_FILE: &str = "risk_checklist_rules.csv";
pub const FEATURE_DICTIONARY_FILE: &str = "feature_dictionary.csv";
pub const TIMESERIES_FILE: &str = "store_monthly_timeseries.csv";
pub const SALES_PREDICT_FILE: &str = "sales_predict.csv";

const STORE_COLUMNS: &[&str] = &[
    "store_id",
    "store_name",
    "name",
    "trading_area",
    "industry",
    "region",
    "latitude",
    "longitude",
    "cluster_id",
];

pub fn load_rows(data_dir: &Path) -> AppResult<TableRows> {
    let stores_path = data_dir.join(STORE_FEATURES_FILE);
    if !stores_path.exists() {
        return Err(AppError::Data(format!(
            "required table {} not found in {}",
            STORE_FEATURES_FILE,
            data_dir.display()
        )));
    }

    Ok(TableRows {
        stores: parse_stores(&read_table(&stores_path)?)?,
        locations: load_optional(data_dir, STORE_LOCATIONS_FILE, parse_locations)?,
        diagnoses: load_optional(data_dir, DIAGNOSIS_FILE, parse_diagnoses)?,
        clusters: load_optional(data_dir, CLUSTER_METADATA_FILE, parse_clusters)?,
        rules: load_optional(data_dir, RULES_FILE, parse_rules)?,
        features: load_optional(data_dir, FEATURE_DICTIONARY_FILE, parse_feature_dictionary)?,
        timeseries: load_optional(data_dir, TIMESERIES_FILE, parse_timeseries)?,
        predictions: load_optional(data_dir, SALES_PREDICT_FILE, parse_predictions)?,
    })
}

fn load_optional<T>(
    data_dir: &Path,
    file_name: &str,
    parse: fn(&CsvTable) -> AppResult<Vec<T>>,
) -> AppResult<Vec<T>> {
    let path = data_dir.join(file_name);
    if !path.exists() {
        tracing::warn!(table = file_name, "optional table missing; using empty table");
        return Ok(Vec::new());
    }
    let rows = parse(&read_table(&path)?)?;
    tracing::info!(table = file_name, rows = rows.len(), "table loaded");
    Ok(rows)
}

struct CsvTable {
    path: PathBuf,
    headers: HashMap<String, usize>,
    records: Vec<csv::StringRecord>,
}

fn read_table(path: &Path) -> AppResult<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|error| AppError::Data(format!("{}: {}", path.display(), error)))?;

    let headers = reader
        .headers()
        .map_err(|error| AppError::Data(format!("{}: {}", path.display(), error)))?
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim_start_matches('\u{feff}').trim().to_string(), index))
        .collect::<HashMap<_, _>>();

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| AppError::Data(format!("{}: {}", path.display(), error)))?;

    Ok(CsvTable {
        path: path.to_path_buf(),
        headers,
        records,
    })
}

impl CsvTable {
    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn require(&self, columns: &[&str]) -> AppResult<()> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|column| !self.headers.contains_key(*column))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(AppError::Data(format!(
            "{} is missing required column(s): {}",
            self.file_name(),
            missing.join(", ")
        )))
    }

    fn has_column(&self, column: &str) -> bool {
        self.headers.contains_key(column)
    }

    fn rows(&self) -> impl Iterator<Item = CsvRow<'_>> {
        self.records.iter().map(move |record| CsvRow {
            headers: &self.headers,
            record,
        })
    }
}

struct CsvRow<'a> {
    headers: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl<'a> CsvRow<'a> {
    fn line(&self) -> u64 {
        self.record.position().map(|position| position.line()).unwrap_or_default()
    }

    fn text(&self, column: &str) -> Option<&'a str> {
        let index = *self.headers.get(column)?;
        self.record.get(index).filter(|value| !value.is_empty())
    }

    fn owned_text(&self, column: &str) -> String {
        self.text(column).unwrap_or_default().to_string()
    }

    fn number(&self, column: &str) -> Option<f64> {
        self.text(column)?.parse::<f64>().ok()
    }

    fn integer(&self, column: &str) -> Option<u32> {
        whole_number(self.number(column)?)
    }

    // Accepts both `3` and the `C-3` labels written by the clustering export.
    fn cluster_ref(&self, column: &str) -> Option<u32> {
        let raw = self.text(column)?.trim();
        let digits = raw
            .strip_prefix("C-")
            .or_else(|| raw.strip_prefix("c-"))
            .unwrap_or(raw);
        whole_number(digits.parse::<f64>().ok()?)
    }
}

fn whole_number(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}

fn parse_stores(table: &CsvTable) -> AppResult<Vec<StoreRecord>> {
    table.require(&["store_id", "cluster_id"])?;

    let feature_columns: Vec<(&String, &usize)> = table
        .headers
        .iter()
        .filter(|(name, _)| !name.is_empty() && !STORE_COLUMNS.contains(&name.as_str()))
        .collect();

    let mut stores = Vec::with_capacity(table.records.len());
    for row in table.rows() {
        let Some(store_id) = row.text("store_id") else {
            tracing::warn!(line = row.line(), "store row without store_id skipped");
            continue;
        };
        let cluster_id = row.cluster_ref("cluster_id");
        if cluster_id.is_none() {
            tracing::warn!(
                line = row.line(),
                store_id = %store_id,
                raw = row.text("cluster_id").unwrap_or_default(),
                "store row has no usable cluster_id; loaded without a cluster"
            );
        }

        let features = feature_columns
            .iter()
            .filter_map(|(name, index)| {
                let value = row.record.get(**index)?.parse::<f64>().ok()?;
                value.is_finite().then(|| ((*name).clone(), value))
            })
            .collect::<BTreeMap<_, _>>();

        stores.push(StoreRecord {
            store_id: store_id.to_string(),
            name: row
                .text("store_name")
                .or_else(|| row.text("name"))
                .unwrap_or_default()
                .to_string(),
            trading_area: row.owned_text("trading_area"),
            industry: row.owned_text("industry"),
            region: row.owned_text("region"),
            latitude: row.number("latitude").filter(|value| value.is_finite()),
            longitude: row.number("longitude").filter(|value| value.is_finite()),
            cluster_id,
            features,
        });
    }
    tracing::info!(table = STORE_FEATURES_FILE, rows = stores.len(), "table loaded");
    Ok(stores)
}

fn parse_locations(table: &CsvTable) -> AppResult<Vec<StoreLocation>> {
    table.require(&["store_id"])?;
    Ok(table
        .rows()
        .filter_map(|row| {
            Some(StoreLocation {
                store_id: row.text("store_id")?.to_string(),
                address: row.owned_text("address"),
                latitude: row.number("latitude").filter(|value| value.is_finite()),
                longitude: row.number("longitude").filter(|value| value.is_finite()),
            })
        })
        .collect())
}

fn parse_diagnoses(table: &CsvTable) -> AppResult<Vec<DiagnosisResult>> {
    if !table.has_column("store_id") && table.has_column("store_index") {
        return Err(AppError::Data(format!(
            "{} joins on store_index; a store_id column is required",
            table.file_name()
        )));
    }
    table.require(&["store_id"])?;

    Ok(table
        .rows()
        .filter_map(|row| {
            Some(DiagnosisResult {
                store_id: row.text("store_id")?.to_string(),
                risk_score: row.number("risk_score"),
                violation_count: row.integer("violation_count"),
                critical_violation_count: row.integer("critical_violation_count"),
                sales_prediction: row.number("sales_prediction").filter(|value| value.is_finite()),
                event_prediction: row.text("event_prediction").map(ToString::to_string),
            })
        })
        .collect())
}

fn parse_clusters(table: &CsvTable) -> AppResult<Vec<ClusterMetadata>> {
    table.require(&["cluster_id"])?;
    Ok(table
        .rows()
        .filter_map(|row| {
            Some(ClusterMetadata {
                cluster_id: row.cluster_ref("cluster_id")?,
                cluster_name: row.owned_text("cluster_name"),
                summary: row.owned_text("summary"),
                closure_rate: row
                    .number("closure_rate")
                    .filter(|value| value.is_finite())
                    .unwrap_or_default(),
            })
        })
        .collect())
}

fn parse_rules(table: &CsvTable) -> AppResult<Vec<RuleDefinition>> {
    table.require(&["cluster_id", "feature", "direction", "threshold"])?;

    let mut rules = Vec::with_capacity(table.records.len());
    for row in table.rows() {
        let (Some(cluster_id), Some(feature), Some(threshold)) =
            (row.cluster_ref("cluster_id"), row.text("feature"), row.number("threshold"))
        else {
            tracing::warn!(line = row.line(), "incomplete rule row skipped");
            continue;
        };

        let risk_level = match row.text("risk_level").map(str::parse::<RiskLevel>) {
            Some(Ok(level)) => level,
            Some(Err(error)) => {
                tracing::warn!(line = row.line(), feature = %feature, error = %error, "defaulting rule risk level");
                RiskLevel::Medium
            }
            None => RiskLevel::Medium,
        };

        rules.push(RuleDefinition {
            cluster_id,
            feature: feature.to_string(),
            direction: Direction::parse(row.text("direction").unwrap_or_default()),
            threshold,
            risk_level,
            description: row.owned_text("rule_description"),
            feature_korean: row.owned_text("feature_korean"),
        });
    }
    Ok(rules)
}

fn parse_feature_dictionary(table: &CsvTable) -> AppResult<Vec<FeatureEntry>> {
    table.require(&["feature"])?;
    Ok(table
        .rows()
        .filter_map(|row| {
            let feature = row.text("feature")?.to_string();
            Some(FeatureEntry {
                display_name: row
                    .text("display_name")
                    .map(ToString::to_string)
                    .unwrap_or_else(|| feature.clone()),
                unit: row.text("unit").map(ToString::to_string),
                feature,
            })
        })
        .collect())
}

fn parse_timeseries(table: &CsvTable) -> AppResult<Vec<MonthlyGrade>> {
    table.require(&["store_id", "year_month", "grade"])?;

    let mut points = Vec::with_capacity(table.records.len());
    for row in table.rows() {
        let Some(store_id) = row.text("store_id") else {
            continue;
        };
        let Some(year_month) = row.text("year_month").and_then(normalize_month) else {
            tracing::warn!(line = row.line(), store_id = %store_id, "timeseries row with invalid month skipped");
            continue;
        };
        points.push(MonthlyGrade {
            store_id: store_id.to_string(),
            year_month,
            grade: parse_grade(&row, "grade"),
        });
    }
    Ok(points)
}

fn parse_predictions(table: &CsvTable) -> AppResult<Vec<SalesPrediction>> {
    table.require(&["store_id", "horizon", "target_month", "pred_grade"])?;

    let mut predictions = Vec::with_capacity(table.records.len());
    for row in table.rows() {
        let Some(store_id) = row.text("store_id") else {
            continue;
        };
        let Some(horizon) = row.integer("horizon").filter(|horizon| (1..=3).contains(horizon)) else {
            tracing::warn!(line = row.line(), store_id = %store_id, "prediction row with horizon outside 1..=3 skipped");
            continue;
        };
        let Some(target_month) = row.text("target_month").and_then(normalize_month) else {
            tracing::warn!(line = row.line(), store_id = %store_id, "prediction row with invalid target month skipped");
            continue;
        };
        predictions.push(SalesPrediction {
            store_id: store_id.to_string(),
            horizon: horizon as u8,
            target_month,
            predicted_grade: parse_grade(&row, "pred_grade"),
            predicted_grade_proba: row.number("pred_grade_proba").filter(|value| value.is_finite()),
            p_low56: row.number("p_low56").filter(|value| value.is_finite()),
            risk_worsen_2plus: row.number("risk_worsen_2plus").filter(|value| value.is_finite()),
            last_grade: parse_grade(&row, "last_grade"),
        });
    }
    Ok(predictions)
}

fn parse_grade(row: &CsvRow<'_>, column: &str) -> Option<u8> {
    let raw = row.text(column)?;
    match row.integer(column) {
        Some(0) => None,
        Some(grade @ 1..=6) => Some(grade as u8),
        _ => {
            tracing::warn!(line = row.line(), column, value = %raw, "grade outside 1..=6 treated as missing");
            None
        }
    }
}

// YYYY-MM, YYYY-M, YYYYMM and YYYY-MM-DD all map to YYYY-MM.
pub fn normalize_month(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let parsed = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d"))
        .ok()
        .or_else(|| {
            if trimmed.len() == 6 && trimmed.chars().all(|ch| ch.is_ascii_digit()) {
                NaiveDate::parse_from_str(&format!("{}-{}-01", &trimmed[..4], &trimmed[4..]), "%Y-%m-%d").ok()
            } else {
                None
            }
        })?;
    Some(parsed.format("%Y-%m").to_string())
}
