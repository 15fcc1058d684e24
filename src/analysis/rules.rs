use crate::config::IndicatorSpec;
use crate::models::{ClusterIndicator, Direction, RuleDefinition, RuleViolation, StoreRecord};

pub const DEFAULT_INDICATOR_LIMIT: usize = 5;

const RATIO_UNIT: &str = "%";
const COUNT_UNIT: &str = "건";
const SCORE_UNIT: &str = "점";

pub fn is_violated(direction: &Direction, value: f64, threshold: f64) -> Option<bool> {
    match direction {
        Direction::AtMost => Some(value <= threshold),
        Direction::AtLeast => Some(value >= threshold),
        Direction::Unknown(_) => None,
    }
}

pub fn violations(store: &StoreRecord, rules: &[RuleDefinition]) -> Vec<RuleViolation> {
    let mut hits = Vec::new();
    for rule in rules {
        let Some(value) = store.feature(&rule.feature) else {
            continue;
        };
        match is_violated(&rule.direction, value, rule.threshold) {
            Some(true) => hits.push(RuleViolation {
                feature: rule.feature.clone(),
                feature_korean: rule.display_name().to_string(),
                current_value: value,
                threshold: rule.threshold,
                direction: rule.direction.clone(),
                risk_level: rule.risk_level,
                description: rule.description.clone(),
            }),
            Some(false) => {}
            None => {
                tracing::warn!(
                    store_id = %store.store_id,
                    cluster_id = rule.cluster_id,
                    feature = %rule.feature,
                    direction = %rule.direction.as_str(),
                    "rule skipped: unknown comparison direction"
                );
            }
        }
    }
    hits
}

pub fn unit_for(feature: &str) -> &'static str {
    let lower = feature.to_ascii_lowercase();
    if lower.contains("ratio") {
        RATIO_UNIT
    } else if lower.contains("count") {
        COUNT_UNIT
    } else {
        SCORE_UNIT
    }
}

pub fn indicators(store: &StoreRecord, rules: &[RuleDefinition], limit: usize) -> Vec<ClusterIndicator> {
    rules
        .iter()
        .take(limit)
        .filter_map(|rule| {
            let value = store.feature(&rule.feature)?;
            Some(ClusterIndicator {
                name: rule.display_name().to_string(),
                feature: rule.feature.clone(),
                value,
                cluster_avg: rule.threshold,
                unit: unit_for(&rule.feature).to_string(),
                higher_is_better: rule.direction == Direction::AtLeast,
            })
        })
        .collect()
}

pub fn indicators_from_specs<F>(store: &StoreRecord, specs: &[IndicatorSpec], cluster_mean: F) -> Vec<ClusterIndicator>
where
    F: Fn(&str) -> Option<f64>,
{
    specs
        .iter()
        .filter_map(|spec| {
            let value = store.feature(&spec.feature)?;
            Some(ClusterIndicator {
                name: spec.display_name.clone(),
                feature: spec.feature.clone(),
                value,
                cluster_avg: cluster_mean(&spec.feature).unwrap_or(value),
                unit: spec.unit.clone(),
                higher_is_better: spec.higher_is_better,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{indicators, indicators_from_specs, unit_for, violations};
    use crate::config::IndicatorSpec;
    use crate::models::{Direction, RiskLevel, RuleDefinition, StoreRecord};
    use std::collections::BTreeMap;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("log buffer")).into_owned()
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn store(features: &[(&str, f64)]) -> StoreRecord {
        StoreRecord {
            store_id: "S1".to_string(),
            name: "S1".to_string(),
            trading_area: String::new(),
            industry: String::new(),
            region: String::new(),
            latitude: None,
            longitude: None,
            cluster_id: Some(0),
            features: features
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn rule(feature: &str, direction: &str, threshold: f64) -> RuleDefinition {
        RuleDefinition {
            cluster_id: 0,
            feature: feature.to_string(),
            direction: Direction::parse(direction),
            threshold,
            risk_level: RiskLevel::High,
            description: format!("{} {} {}", feature, direction, threshold),
            feature_korean: String::new(),
        }
    }

    #[test]
    fn at_most_rule_is_violated_at_or_below_threshold() {
        let store = store(&[("feature_x", 5.0)]);
        let hits = violations(&store, &[rule("feature_x", "<=", 10.0)]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].current_value, 5.0);

        let hits = violations(&store, &[rule("feature_x", ">=", 10.0)]);
        assert!(hits.is_empty());

        let hits = violations(&store, &[rule("feature_x", ">=", 5.0)]);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn absent_features_and_unknown_directions_never_violate() {
        let store = store(&[("a", 1.0)]);
        let rules = vec![rule("missing", "<=", 10.0), rule("a", "==", 1.0), rule("a", "<", 5.0)];
        assert!(violations(&store, &rules).is_empty());
    }

    #[test]
    fn unknown_direction_is_logged_as_anomaly() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(logs.clone())
            .finish();

        let store = store(&[("a", 1.0), ("b", 2.0)]);
        let hits = tracing::subscriber::with_default(subscriber, || {
            violations(&store, &[rule("a", "==", 1.0), rule("b", "<=", 5.0)])
        });

        assert_eq!(hits.len(), 1);
        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("unknown comparison direction"))
            .expect("anomaly warning");
        assert!(line.contains("\"level\":\"WARN\""));
        assert!(line.contains("\"feature\":\"a\""));
        assert!(line.contains("\"direction\":\"==\""));
        assert!(!output.contains("\"feature\":\"b\""));
    }

    #[test]
    fn violations_keep_rule_order() {
        let store = store(&[("a", 1.0), ("b", 9.0), ("c", 3.0)]);
        let rules = vec![
            rule("c", "<=", 3.0),
            rule("a", "<=", 2.0),
            rule("b", ">=", 5.0),
            rule("a", "<=", 2.0),
        ];
        let features: Vec<String> = violations(&store, &rules).into_iter().map(|v| v.feature).collect();
        assert_eq!(features, vec!["c", "a", "b", "a"]);
    }

    #[test]
    fn indicators_take_first_rules_regardless_of_violation() {
        let store = store(&[
            ("delivery_ratio", 42.0),
            ("visit_count", 12.0),
            ("review_score", 3.5),
            ("f4", 1.0),
            ("f5", 1.0),
            ("f6", 1.0),
        ]);
        let rules = vec![
            rule("delivery_ratio", ">=", 50.0),
            rule("visit_count", "<=", 10.0),
            rule("review_score", "<=", 4.0),
            rule("f4", "<=", 0.0),
            rule("f5", "<=", 0.0),
            rule("f6", "<=", 0.0),
        ];
        let view = indicators(&store, &rules, 5);
        assert_eq!(view.len(), 5);
        assert_eq!(view[0].unit, "%");
        assert!(view[0].higher_is_better);
        assert_eq!(view[0].cluster_avg, 50.0);
        assert_eq!(view[1].unit, "건");
        assert!(!view[1].higher_is_better);
        assert_eq!(view[2].unit, "점");
        assert!(view.iter().all(|indicator| indicator.feature != "f6"));
    }

    #[test]
    fn unit_inference_is_case_insensitive() {
        assert_eq!(unit_for("Delivery_RATIO"), "%");
        assert_eq!(unit_for("staff_Count"), "건");
        assert_eq!(unit_for("rating"), "점");
    }

    #[test]
    fn spec_indicators_use_cluster_mean() {
        let store = store(&[("delivery_ratio", 0.4)]);
        let specs = vec![
            IndicatorSpec {
                feature: "delivery_ratio".to_string(),
                display_name: "배달 비중".to_string(),
                unit: "%".to_string(),
                higher_is_better: true,
            },
            IndicatorSpec {
                feature: "absent".to_string(),
                display_name: "없음".to_string(),
                unit: "점".to_string(),
                higher_is_better: false,
            },
        ];
        let view = indicators_from_specs(&store, &specs, |_| Some(0.25));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "배달 비중");
        assert_eq!(view[0].cluster_avg, 0.25);
    }
}
