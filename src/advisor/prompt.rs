use crate::models::StoreReport;
use std::fmt::Write as _;

pub const SYSTEM_PROMPT: &str = "당신은 가맹점 경영 컨설턴트입니다.";
pub const PROMPT_INDICATOR_LIMIT: usize = 5;

const NOT_AVAILABLE: &str = "N/A";

pub fn build_prompt(report: &StoreReport) -> String {
    let info = &report.store_info;
    let model = &report.model_results;
    let cluster_name = if report.cluster_name.is_empty() {
        NOT_AVAILABLE
    } else {
        report.cluster_name.as_str()
    };

    let mut prompt = String::new();
    prompt.push_str("다음 가맹점의 폐업 위험을 분석하고 생존 전략을 제안해주세요.\n\n");
    prompt.push_str("## 가맹점 정보\n");
    let _ = writeln!(prompt, "- 상권: {}", info.trading_area);
    let _ = writeln!(prompt, "- 업종: {}", info.industry);
    let _ = writeln!(prompt, "- 클러스터: {}", cluster_name);
    let _ = writeln!(prompt, "- 폐업 위험도: {:.1}점 ({})", report.risk_score, report.risk_level.as_str());
    let _ = writeln!(
        prompt,
        "- 클러스터 평균 폐업률: {:.1}%",
        report.statistics.cluster_closure_rate
    );

    prompt.push_str("\n## 모델 예측 결과\n");
    let _ = writeln!(
        prompt,
        "- 매출 예측: {:.0}만원",
        model.sales_prediction.unwrap_or(0.0)
    );
    let _ = writeln!(prompt, "- 생존 가능성: {:.1}%", model.survival_probability);
    let _ = writeln!(
        prompt,
        "- 이벤트 예측: {}",
        model.event_prediction.as_deref().unwrap_or(NOT_AVAILABLE)
    );
    if !report.violations.is_empty() {
        let _ = writeln!(prompt, "- 위반 규칙 수: {}건", report.violations.len());
    }

    prompt.push_str("\n## 주요 지표 분석\n");
    if report.cluster_indicators.is_empty() {
        prompt.push_str("- 지표 데이터가 없습니다.\n");
    }
    for indicator in report.cluster_indicators.iter().take(PROMPT_INDICATOR_LIMIT) {
        let _ = writeln!(
            prompt,
            "- {}: {:.1}{} (클러스터 평균: {:.1}{})",
            indicator.name, indicator.value, indicator.unit, indicator.cluster_avg, indicator.unit
        );
    }

    prompt.push_str(
        "\n## 요청사항\n\
         1. 이 가맹점의 전반적인 상황을 1-2문장으로 요약해주세요.\n\
         2. 구체적이고 실행 가능한 생존 전략 4가지를 제안해주세요.\n\
         3. 각 전략은 이모지와 함께 \"**제목**: 설명\" 형식으로 작성해주세요.\n\
         \n## 응답 형식\n\
         summary: (전체 요약)\n\
         strategies:\n\
         - 🎯 **전략1 제목**: 상세 설명\n\
         - 📱 **전략2 제목**: 상세 설명\n\
         - 💰 **전략3 제목**: 상세 설명\n\
         - 📊 **전략4 제목**: 상세 설명\n",
    );
    prompt
}
