pub mod loader;

use crate::errors::AppResult;
use crate::models::{
    ClusterMetadata, DiagnosisResult, FeatureEntry, MonthlyGrade, RuleDefinition, SalesPrediction, StoreLocation,
    StoreRecord,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct TableRows {
    pub stores: Vec<StoreRecord>,
    pub locations: Vec<StoreLocation>,
    pub diagnoses: Vec<DiagnosisResult>,
    pub clusters: Vec<ClusterMetadata>,
    pub rules: Vec<RuleDefinition>,
    pub features: Vec<FeatureEntry>,
    pub timeseries: Vec<MonthlyGrade>,
    pub predictions: Vec<SalesPrediction>,
}

#[derive(Debug, Default)]
pub struct DataTables {
    stores: Vec<StoreRecord>,
    store_index: HashMap<String, usize>,
    locations: HashMap<String, StoreLocation>,
    diagnoses: HashMap<String, DiagnosisResult>,
    clusters: BTreeMap<u32, ClusterMetadata>,
    rules: BTreeMap<u32, Vec<RuleDefinition>>,
    features: HashMap<String, FeatureEntry>,
    timeseries: HashMap<String, Vec<MonthlyGrade>>,
    predictions: HashMap<String, Vec<SalesPrediction>>,
}

impl DataTables {
    pub fn load(data_dir: &Path) -> AppResult<Self> {
        let rows = loader::load_rows(data_dir)?;
        let tables = Self::from_rows(rows);
        tracing::info!(
            data_dir = %data_dir.display(),
            stores = tables.store_count(),
            clusters = tables.clusters.len(),
            "data tables ready"
        );
        Ok(tables)
    }

    pub fn from_rows(rows: TableRows) -> Self {
        let mut stores = Vec::with_capacity(rows.stores.len());
        let mut store_index = HashMap::with_capacity(rows.stores.len());
        for store in rows.stores {
            if store_index.contains_key(&store.store_id) {
                tracing::warn!(store_id = %store.store_id, "duplicate store row ignored");
                continue;
            }
            store_index.insert(store.store_id.clone(), stores.len());
            stores.push(store);
        }

        let mut locations = HashMap::new();
        for location in rows.locations {
            locations.entry(location.store_id.clone()).or_insert(location);
        }

        let mut diagnoses = HashMap::new();
        for diagnosis in rows.diagnoses {
            if diagnoses.contains_key(&diagnosis.store_id) {
                tracing::warn!(store_id = %diagnosis.store_id, "duplicate diagnosis row ignored");
                continue;
            }
            diagnoses.insert(diagnosis.store_id.clone(), diagnosis);
        }

        let mut clusters = BTreeMap::new();
        for cluster in rows.clusters {
            clusters.entry(cluster.cluster_id).or_insert(cluster);
        }

        let mut rules: BTreeMap<u32, Vec<RuleDefinition>> = BTreeMap::new();
        for rule in rows.rules {
            rules.entry(rule.cluster_id).or_default().push(rule);
        }

        let mut features = HashMap::new();
        for entry in rows.features {
            features.entry(entry.feature.clone()).or_insert(entry);
        }

        let mut timeseries: HashMap<String, Vec<MonthlyGrade>> = HashMap::new();
        for point in rows.timeseries {
            timeseries.entry(point.store_id.clone()).or_default().push(point);
        }

        let mut predictions: HashMap<String, Vec<SalesPrediction>> = HashMap::new();
        for prediction in rows.predictions {
            let entries = predictions.entry(prediction.store_id.clone()).or_default();
            if entries.iter().any(|existing| existing.horizon == prediction.horizon) {
                tracing::warn!(
                    store_id = %prediction.store_id,
                    horizon = prediction.horizon,
                    "duplicate prediction horizon ignored"
                );
                continue;
            }
            entries.push(prediction);
        }
        for entries in predictions.values_mut() {
            entries.sort_by_key(|prediction| prediction.horizon);
        }

        Self {
            stores,
            store_index,
            locations,
            diagnoses,
            clusters,
            rules,
            features,
            timeseries,
            predictions,
        }
    }

    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    pub fn store(&self, store_id: &str) -> Option<&StoreRecord> {
        self.store_index.get(store_id).map(|index| &self.stores[*index])
    }

    pub fn location(&self, store_id: &str) -> Option<&StoreLocation> {
        self.locations.get(store_id)
    }

    pub fn diagnosis(&self, store_id: &str) -> Option<&DiagnosisResult> {
        self.diagnoses.get(store_id)
    }

    pub fn cluster(&self, cluster_id: u32) -> Option<&ClusterMetadata> {
        self.clusters.get(&cluster_id)
    }

    pub fn clusters(&self) -> impl Iterator<Item = &ClusterMetadata> {
        self.clusters.values()
    }

    pub fn rules_for(&self, cluster_id: u32) -> &[RuleDefinition] {
        self.rules.get(&cluster_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn feature_entry(&self, feature: &str) -> Option<&FeatureEntry> {
        self.features.get(feature)
    }

    pub fn monthly_grades(&self, store_id: &str) -> &[MonthlyGrade] {
        self.timeseries.get(store_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn sales_predictions(&self, store_id: &str) -> &[SalesPrediction] {
        self.predictions.get(store_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn stores_in_cluster(&self, cluster_id: u32) -> impl Iterator<Item = &StoreRecord> {
        self.stores.iter().filter(move |store| store.cluster_id == Some(cluster_id))
    }

    pub fn stores_in_industry<'a>(&'a self, industry: &'a str) -> impl Iterator<Item = &'a StoreRecord> {
        self.stores.iter().filter(move |store| store.industry == industry)
    }

    pub fn cluster_feature_mean(&self, cluster_id: u32, feature: &str) -> Option<f64> {
        let (sum, count) = self
            .stores_in_cluster(cluster_id)
            .filter_map(|store| store.feature(feature))
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}
