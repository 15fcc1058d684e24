use crate::models::{MonthlyGrade, SalesPrediction, TrendKind, TrendPoint};

pub const ACTUAL_WINDOW_MONTHS: usize = 6;
const WORST_GRADE: u8 = 6;
const UNKNOWN_RANK: f64 = 0.5;

// grade 1 -> 1.0, grade 6 -> 1/6
pub fn cluster_rank(grade: Option<u8>) -> f64 {
    match grade {
        Some(grade) if (1..=WORST_GRADE).contains(&grade) => f64::from(WORST_GRADE + 1 - grade) / 6.0,
        _ => UNKNOWN_RANK,
    }
}

pub fn recent_actuals<'a>(store_id: &str, actual: &'a [MonthlyGrade]) -> Vec<&'a MonthlyGrade> {
    let mut points: Vec<&MonthlyGrade> = actual.iter().filter(|point| point.store_id == store_id).collect();
    points.sort_by(|left, right| left.year_month.cmp(&right.year_month));
    let skip = points.len().saturating_sub(ACTUAL_WINDOW_MONTHS);
    points.split_off(skip)
}

pub fn build_trend(store_id: &str, actual: &[MonthlyGrade], predicted: &[SalesPrediction]) -> Vec<TrendPoint> {
    let mut trend: Vec<TrendPoint> = recent_actuals(store_id, actual)
        .into_iter()
        .map(|point| TrendPoint {
            month: point.year_month.clone(),
            sales_grade: point.grade,
            kind: TrendKind::Actual,
            cluster_rank: cluster_rank(point.grade),
            p_low56: None,
            risk_worsen: None,
        })
        .collect();

    trend.extend(
        predicted
            .iter()
            .filter(|prediction| prediction.store_id == store_id)
            .map(|prediction| TrendPoint {
                month: prediction.target_month.clone(),
                sales_grade: prediction.predicted_grade,
                kind: TrendKind::Forecast,
                cluster_rank: cluster_rank(prediction.predicted_grade),
                p_low56: prediction.p_low56,
                risk_worsen: prediction.risk_worsen_2plus,
            }),
    );

    trend.sort_by(|left, right| left.month.cmp(&right.month));
    trend
}

#[cfg(test)]
mod tests {
    use super::{build_trend, cluster_rank};
    use crate::models::{MonthlyGrade, SalesPrediction, TrendKind};

    fn actual(month: &str, grade: u8) -> MonthlyGrade {
        MonthlyGrade {
            store_id: "S1".to_string(),
            year_month: month.to_string(),
            grade: Some(grade),
        }
    }

    fn forecast(horizon: u8, month: &str, grade: u8) -> SalesPrediction {
        SalesPrediction {
            store_id: "S1".to_string(),
            horizon,
            target_month: month.to_string(),
            predicted_grade: Some(grade),
            predicted_grade_proba: Some(0.6),
            p_low56: Some(0.2),
            risk_worsen_2plus: Some(0.1),
            last_grade: Some(3),
        }
    }

    #[test]
    fn rank_maps_grades_onto_unit_interval() {
        assert!((cluster_rank(Some(1)) - 1.0).abs() < 1e-9);
        assert!((cluster_rank(Some(6)) - 1.0 / 6.0).abs() < 1e-9);
        assert_eq!(cluster_rank(Some(0)), 0.5);
        assert_eq!(cluster_rank(None), 0.5);
    }

    #[test]
    fn keeps_six_most_recent_actual_months_ascending() {
        let series = vec![
            actual("2024-08", 3),
            actual("2024-01", 1),
            actual("2024-05", 2),
            actual("2024-03", 4),
            actual("2024-02", 5),
            actual("2024-07", 6),
            actual("2024-04", 2),
            actual("2024-06", 3),
        ];
        let trend = build_trend("S1", &series, &[]);
        let months: Vec<&str> = trend.iter().map(|point| point.month.as_str()).collect();
        assert_eq!(months, vec!["2024-03", "2024-04", "2024-05", "2024-06", "2024-07", "2024-08"]);
        assert!(trend.iter().all(|point| point.kind == TrendKind::Actual));
    }

    #[test]
    fn forecasts_follow_actuals_with_probabilities() {
        let series = vec![actual("2024-11", 2), actual("2024-12", 3)];
        let predictions = vec![
            forecast(1, "2025-01", 1),
            forecast(2, "2025-02", 6),
            forecast(3, "2025-03", 4),
        ];
        let trend = build_trend("S1", &series, &predictions);
        assert_eq!(trend.len(), 5);
        assert_eq!(trend[2].kind, TrendKind::Forecast);
        assert!((trend[2].cluster_rank - 1.0).abs() < 1e-9);
        assert!((trend[3].cluster_rank - 1.0 / 6.0).abs() < 1e-9);
        assert_eq!(trend[4].p_low56, Some(0.2));
        assert_eq!(trend[4].risk_worsen, Some(0.1));
        assert_eq!(trend[0].p_low56, None);
    }

    #[test]
    fn shared_month_keeps_actual_first() {
        let trend = build_trend("S1", &[actual("2025-01", 2)], &[forecast(1, "2025-01", 5)]);
        assert_eq!(trend[0].kind, TrendKind::Actual);
        assert_eq!(trend[1].kind, TrendKind::Forecast);
    }

    #[test]
    fn ignores_rows_for_other_stores() {
        let mut other = actual("2024-01", 1);
        other.store_id = "S2".to_string();
        assert!(build_trend("S1", &[other], &[]).is_empty());
    }
}
