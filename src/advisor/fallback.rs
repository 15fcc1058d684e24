use crate::models::{StrategySuggestion, SuggestionSource};

pub const HIGH_RISK_FLOOR: f64 = 70.0;
pub const MEDIUM_RISK_FLOOR: f64 = 40.0;

const HIGH_RISK_SUMMARY: &str = "이 가맹점은 **고위험군**에 속합니다. 즉각적인 개선 조치가 필요합니다.";
const HIGH_RISK_STRATEGIES: [&str; 4] = [
    "🎯 **긴급 차별화 전략**: 경쟁사와 명확히 구분되는 독특한 메뉴나 서비스를 즉시 도입하세요.",
    "📱 **디지털 마케팅 강화**: SNS, 배달앱을 통한 온라인 고객 유입을 최우선으로 확대하세요.",
    "💰 **비용 구조 재검토**: 임대료 재협상, 재고 최적화 등으로 고정비용을 즉시 낮추세요.",
    "📊 **고객 데이터 분석**: 단골 고객의 특성을 파악하고 집중 공략하여 재방문율을 높이세요.",
];

const MEDIUM_RISK_SUMMARY: &str = "이 가맹점은 **중위험군**에 속합니다. 예방적 조치로 위험을 낮출 수 있습니다.";
const MEDIUM_RISK_STRATEGIES: [&str; 4] = [
    "🎯 **차별화 포인트 발굴**: 주변 경쟁점포와 차별화할 수 있는 요소를 찾아 강화하세요.",
    "📱 **온라인 마케팅 확대**: 지역 커뮤니티와 SNS를 활용한 브랜드 인지도를 높이세요.",
    "💰 **수익성 개선**: 인기 메뉴 중심으로 운영 효율화를 진행하세요.",
    "📊 **고객 만족도 관리**: 리뷰 관리와 피드백 수집으로 서비스 품질을 개선하세요.",
];

const LOW_RISK_SUMMARY: &str = "이 가맹점은 **저위험군**에 속합니다. 현재 상태를 유지하고 성장을 준비하세요.";
const LOW_RISK_STRATEGIES: [&str; 4] = [
    "🎯 **브랜드 강화**: 현재의 강점을 더욱 발전시켜 지역 대표 브랜드로 성장하세요.",
    "📱 **고객 충성도 프로그램**: 멤버십, 포인트 제도로 단골 고객을 늘리세요.",
    "💰 **추가 수익원 발굴**: 신메뉴 개발, 제휴 마케팅 등으로 매출을 확대하세요.",
    "📊 **데이터 기반 의사결정**: 판매 데이터 분석으로 전략적 운영을 강화하세요.",
];

pub fn default_strategy(risk_score: f64) -> StrategySuggestion {
    let (summary, strategies) = if risk_score >= HIGH_RISK_FLOOR {
        (HIGH_RISK_SUMMARY, HIGH_RISK_STRATEGIES)
    } else if risk_score >= MEDIUM_RISK_FLOOR {
        (MEDIUM_RISK_SUMMARY, MEDIUM_RISK_STRATEGIES)
    } else {
        (LOW_RISK_SUMMARY, LOW_RISK_STRATEGIES)
    };
    StrategySuggestion {
        summary: summary.to_string(),
        strategies: strategies.iter().map(|strategy| strategy.to_string()).collect(),
        source: SuggestionSource::Fallback,
    }
}
