use crate::advisor::StrategyAdvisor;
use crate::analysis::{risk, rules, trend};
use crate::config::{AppSettings, IndicatorSpec};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ClusterIndicator, ClusterMetadata, ClusterOverview, DistributionBucket, ModelResults, ReportResponse,
    ReportStatistics, RiskLevel, RuleViolation, StoreInfo, StoreRecord, StoreReport,
};
use crate::tables::DataTables;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const CLOSURE_RISK_CUTOFF: f64 = 70.0;
pub const MAX_SALES_PREDICTIONS: usize = 3;
const UNCLUSTERED_LABEL: &str = "미분류";

const DISTRIBUTION_BUCKETS: [(f64, f64, &str); 5] = [
    (0.0, 20.0, "0-20"),
    (20.0, 40.0, "20-40"),
    (40.0, 60.0, "40-60"),
    (60.0, 80.0, "60-80"),
    (80.0, 100.0, "80-100"),
];

pub struct ReportService {
    tables: Arc<DataTables>,
    advisor: StrategyAdvisor,
    indicator_limit: usize,
    cluster_indicators: BTreeMap<u32, Vec<IndicatorSpec>>,
}

impl ReportService {
    pub fn new(tables: Arc<DataTables>, advisor: StrategyAdvisor, settings: &AppSettings) -> Self {
        Self {
            tables,
            advisor,
            indicator_limit: settings.indicator_limit.max(1),
            cluster_indicators: settings.cluster_indicators.clone(),
        }
    }

    pub fn tables(&self) -> &DataTables {
        &self.tables
    }

    pub fn advisor(&self) -> &StrategyAdvisor {
        &self.advisor
    }

    pub async fn report(&self, store_id: &str) -> AppResult<ReportResponse> {
        let report = self.assemble(store_id)?;
        let llm_suggestion = self.advisor.suggest(&report).await;
        Ok(ReportResponse {
            report,
            llm_suggestion,
        })
    }

    pub fn assemble(&self, store_id: &str) -> AppResult<StoreReport> {
        let tables = self.tables.as_ref();
        let store = tables
            .store(store_id)
            .ok_or_else(|| AppError::NotFound(format!("Store '{}' not found", store_id)))?;

        let metadata = store.cluster_id.and_then(|cluster_id| tables.cluster(cluster_id));
        if metadata.is_none() {
            tracing::debug!(store_id = %store.store_id, cluster_id = ?store.cluster_id, "no cluster metadata");
        }
        let diagnosis = tables.diagnosis(&store.store_id);
        let location = tables.location(&store.store_id);
        let cluster_rules = store
            .cluster_id
            .map(|cluster_id| tables.rules_for(cluster_id))
            .unwrap_or_default();

        let violations = rules::violations(store, cluster_rules);
        let cluster_indicators = self.indicators(store);
        let trend_data = trend::build_trend(
            &store.store_id,
            tables.monthly_grades(&store.store_id),
            tables.sales_predictions(&store.store_id),
        );
        let sales_predictions: Vec<_> = tables
            .sales_predictions(&store.store_id)
            .iter()
            .take(MAX_SALES_PREDICTIONS)
            .cloned()
            .collect();

        let assessment = risk::classify(diagnosis.and_then(|diagnosis| diagnosis.risk_score));
        let survival_probability = assessment.survival_probability();

        let statistics = ReportStatistics {
            cluster_closure_rate: metadata.map(|metadata| metadata.closure_rate).unwrap_or_default(),
            industry_avg_closure_rate: self.industry_closure_rate(&store.industry),
            industry_store_count: tables.stores_in_industry(&store.industry).count(),
            violation_count: diagnosis
                .and_then(|diagnosis| diagnosis.violation_count)
                .unwrap_or(violations.len() as u32),
            critical_violation_count: diagnosis
                .and_then(|diagnosis| diagnosis.critical_violation_count)
                .unwrap_or_else(|| critical_count(&violations)),
            rule_count: cluster_rules.len(),
        };
        let distribution = self.distribution(
            store.cluster_id,
            diagnosis.map(|_| assessment.score),
        );

        let store_info = StoreInfo {
            id: store.store_id.clone(),
            name: store.name.clone(),
            trading_area: store.trading_area.clone(),
            industry: store.industry.clone(),
            region: store.region.clone(),
            cluster: cluster_label(store.cluster_id, metadata),
            latitude: location.and_then(|location| location.latitude).or(store.latitude),
            longitude: location.and_then(|location| location.longitude).or(store.longitude),
            address: location
                .map(|location| location.address.clone())
                .filter(|address| !address.is_empty()),
            closure_risk: assessment.score,
        };

        tracing::debug!(
            store_id = %store.store_id,
            risk_score = assessment.score,
            violations = violations.len(),
            "report assembled"
        );

        Ok(StoreReport {
            store_info,
            cluster_id: store.cluster_id,
            cluster_name: metadata.map(|metadata| metadata.cluster_name.clone()).unwrap_or_default(),
            cluster_summary: metadata.map(|metadata| metadata.summary.clone()).unwrap_or_default(),
            risk_level: assessment.level,
            risk_score: assessment.score,
            model_results: ModelResults {
                sales_prediction: diagnosis.and_then(|diagnosis| diagnosis.sales_prediction),
                event_prediction: diagnosis.and_then(|diagnosis| diagnosis.event_prediction.clone()),
                survival_probability,
                risk_score: assessment.score,
            },
            violations,
            cluster_indicators,
            trend_data,
            sales_predictions,
            statistics,
            distribution,
        })
    }

    pub fn clusters(&self) -> Vec<ClusterOverview> {
        self.tables
            .clusters()
            .map(|metadata| ClusterOverview {
                metadata: metadata.clone(),
                store_count: self.tables.stores_in_cluster(metadata.cluster_id).count(),
                rule_count: self.tables.rules_for(metadata.cluster_id).len(),
            })
            .collect()
    }

    fn indicators(&self, store: &StoreRecord) -> Vec<ClusterIndicator> {
        let Some(cluster_id) = store.cluster_id else {
            return Vec::new();
        };
        if let Some(specs) = self.cluster_indicators.get(&cluster_id) {
            return rules::indicators_from_specs(store, specs, |feature| {
                self.tables.cluster_feature_mean(cluster_id, feature)
            });
        }

        let mut view = rules::indicators(store, self.tables.rules_for(cluster_id), self.indicator_limit);
        for indicator in &mut view {
            let Some(entry) = self.tables.feature_entry(&indicator.feature) else {
                continue;
            };
            if indicator.name == indicator.feature && !entry.display_name.is_empty() {
                indicator.name = entry.display_name.clone();
            }
            if let Some(unit) = entry.unit.as_ref().filter(|unit| !unit.is_empty()) {
                indicator.unit = unit.clone();
            }
        }
        view
    }

    // Undiagnosed stores count in the denominator but never as at risk.
    fn industry_closure_rate(&self, industry: &str) -> f64 {
        let (at_risk, total) = self
            .tables
            .stores_in_industry(industry)
            .fold((0usize, 0usize), |(at_risk, total), store| {
                let flagged = self
                    .tables
                    .diagnosis(&store.store_id)
                    .is_some_and(|diagnosis| risk::sanitize_score(diagnosis.risk_score) >= CLOSURE_RISK_CUTOFF);
                (at_risk + usize::from(flagged), total + 1)
            });
        if total == 0 {
            return 0.0;
        }
        at_risk as f64 / total as f64 * 100.0
    }

    fn distribution(&self, cluster_id: Option<u32>, store_score: Option<f64>) -> Vec<DistributionBucket> {
        let mut counts = [0usize; DISTRIBUTION_BUCKETS.len()];
        if let Some(cluster_id) = cluster_id {
            for store in self.tables.stores_in_cluster(cluster_id) {
                if let Some(diagnosis) = self.tables.diagnosis(&store.store_id) {
                    counts[bucket_index(risk::sanitize_score(diagnosis.risk_score))] += 1;
                }
            }
        }
        let own = store_score.map(bucket_index);
        DISTRIBUTION_BUCKETS
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(index, ((_, _, label), count))| DistributionBucket {
                range: label.to_string(),
                cluster: count,
                my_store: u8::from(own == Some(index)),
            })
            .collect()
    }
}

fn bucket_index(score: f64) -> usize {
    DISTRIBUTION_BUCKETS
        .iter()
        .position(|(low, high, _)| score >= *low && score < *high)
        .unwrap_or(DISTRIBUTION_BUCKETS.len() - 1)
}

fn critical_count(violations: &[RuleViolation]) -> u32 {
    violations
        .iter()
        .filter(|violation| violation.risk_level >= RiskLevel::High)
        .count() as u32
}

fn cluster_label(cluster_id: Option<u32>, metadata: Option<&ClusterMetadata>) -> String {
    let Some(cluster_id) = cluster_id else {
        return UNCLUSTERED_LABEL.to_string();
    };
    match metadata.filter(|metadata| !metadata.cluster_name.trim().is_empty()) {
        Some(metadata) => format!("{} ({})", cluster_id, metadata.cluster_name),
        None => cluster_id.to_string(),
    }
}
