use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_SUMMARY: &str = "분석 결과를 기반으로 전략을 제안합니다.";

static REPLY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "strategies": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "required": ["strategies"]
    })
});

static REPLY_VALIDATOR: Lazy<jsonschema::JSONSchema> =
    Lazy::new(|| jsonschema::JSONSchema::compile(&REPLY_SCHEMA).expect("valid reply schema"));

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").expect("valid fenced json regex"));

static NUMBERED_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}[.)]\s+").expect("valid numbered item regex"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StrategyBundle {
    #[serde(default)]
    pub summary: String,
    pub strategies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("reply is empty")]
    Empty,
    #[error("reply contains no strategies")]
    NoStrategies,
    #[error("structured reply did not match schema: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Strategies,
}

pub fn parse_strategy_reply(raw: &str) -> Result<StrategyBundle, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    match extract_json(trimmed) {
        Some(value) => bundle_from_json(value),
        None => parse_text(trimmed),
    }
}

fn extract_json(raw: &str) -> Option<Value> {
    if let Some(value) = FENCED_JSON_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|body| parse_json_object(body.as_str()))
    {
        return Some(value);
    }
    if let Some(value) = parse_json_object(raw) {
        return Some(value);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end]).and_then(parse_json_object)
}

fn parse_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str::<Value>(trimmed).ok().filter(Value::is_object)
}

fn bundle_from_json(value: Value) -> Result<StrategyBundle, ParseError> {
    let errors = schema_errors(&value);
    if !errors.is_empty() {
        return Err(ParseError::Schema(errors.join("; ")));
    }
    let bundle: StrategyBundle =
        serde_json::from_value(value).map_err(|error| ParseError::Schema(error.to_string()))?;
    finish(bundle.summary, bundle.strategies)
}

fn schema_errors(value: &Value) -> Vec<String> {
    REPLY_VALIDATOR
        .validate(value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

fn parse_text(raw: &str) -> Result<StrategyBundle, ParseError> {
    let mut summary = String::new();
    let mut strategies = Vec::new();
    let mut section: Option<Section> = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let header = line
            .trim_start_matches(|ch: char| ch == '#' || ch == '*' || ch.is_whitespace())
            .replace("**", "");
        let header_lower = header.to_lowercase();

        if let Some(rest) = strip_label(&header, &header_lower, &["summary:", "요약:"]) {
            section = Some(Section::Summary);
            if !rest.is_empty() {
                summary = rest.to_string();
            }
            continue;
        }
        if strip_label(&header, &header_lower, &["strategies:", "전략:"]).is_some() {
            section = Some(Section::Strategies);
            continue;
        }

        if let Some(item) = bullet_item(line) {
            if section != Some(Section::Summary) && !item.is_empty() {
                strategies.push(item.to_string());
            }
            continue;
        }

        if section != Some(Section::Strategies) && summary.is_empty() {
            summary = line.to_string();
        }
    }

    finish(summary, strategies)
}

fn strip_label<'a>(header: &'a str, header_lower: &str, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        if header_lower.starts_with(label) {
            header.get(label.len()..).map(str::trim)
        } else {
            None
        }
    })
}

fn bullet_item(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix('-').or_else(|| line.strip_prefix('•')) {
        return Some(rest.trim_start_matches(['-', '•']).trim());
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return Some(rest.trim());
    }
    NUMBERED_ITEM_RE
        .find(line)
        .map(|prefix| line[prefix.end()..].trim())
}

fn finish(summary: String, strategies: Vec<String>) -> Result<StrategyBundle, ParseError> {
    let strategies: Vec<String> = strategies
        .into_iter()
        .map(|strategy| strategy.trim().to_string())
        .filter(|strategy| !strategy.is_empty())
        .collect();
    if strategies.is_empty() {
        return Err(ParseError::NoStrategies);
    }
    let summary = summary.trim();
    Ok(StrategyBundle {
        summary: if summary.is_empty() {
            DEFAULT_SUMMARY.to_string()
        } else {
            summary.to_string()
        },
        strategies,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_strategy_reply, schema_errors, ParseError, DEFAULT_SUMMARY};

    #[test]
    fn parses_sectioned_reply() {
        let reply = "summary: 매출 하락세가 뚜렷합니다.\nstrategies:\n- 🎯 **차별화**: 메뉴 개편\n- 📱 **온라인**: 배달앱 강화\n• 💰 **비용**: 임대료 협상\n";
        let bundle = parse_strategy_reply(reply).expect("parse");
        assert_eq!(bundle.summary, "매출 하락세가 뚜렷합니다.");
        assert_eq!(bundle.strategies.len(), 3);
        assert_eq!(bundle.strategies[0], "🎯 **차별화**: 메뉴 개편");
        assert_eq!(bundle.strategies[2], "💰 **비용**: 임대료 협상");
    }

    #[test]
    fn summary_may_follow_its_header_line() {
        let reply = "## Summary:\n점포 상황이 안정적입니다.\n## Strategies:\n1. 단골 관리\n2) 신메뉴 출시";
        let bundle = parse_strategy_reply(reply).expect("parse");
        assert_eq!(bundle.summary, "점포 상황이 안정적입니다.");
        assert_eq!(bundle.strategies, vec!["단골 관리", "신메뉴 출시"]);
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "다음과 같이 제안합니다.\n```json\n{\"summary\": \"위험\", \"strategies\": [\"a\", \" \", \"b\"]}\n```";
        let bundle = parse_strategy_reply(reply).expect("parse");
        assert_eq!(bundle.summary, "위험");
        assert_eq!(bundle.strategies, vec!["a", "b"]);
    }

    #[test]
    fn parses_bare_embedded_json_without_summary() {
        let reply = "결과: {\"strategies\": [\"only one\"]} 끝";
        let bundle = parse_strategy_reply(reply).expect("parse");
        assert_eq!(bundle.summary, DEFAULT_SUMMARY);
        assert_eq!(bundle.strategies, vec!["only one"]);
    }

    #[test]
    fn free_text_uses_first_line_as_summary() {
        let reply = "전반적으로 위험도가 높습니다.\n* 비용 절감\n- 마케팅 강화";
        let bundle = parse_strategy_reply(reply).expect("parse");
        assert_eq!(bundle.summary, "전반적으로 위험도가 높습니다.");
        assert_eq!(bundle.strategies, vec!["비용 절감", "마케팅 강화"]);
    }

    #[test]
    fn rejects_replies_without_strategies() {
        assert_eq!(parse_strategy_reply("   "), Err(ParseError::Empty));
        assert_eq!(
            parse_strategy_reply("summary: 요약만 있습니다."),
            Err(ParseError::NoStrategies)
        );
        assert!(matches!(
            parse_strategy_reply("{\"summary\": \"x\", \"strategies\": \"not a list\"}"),
            Err(ParseError::Schema(_))
        ));
    }

    #[test]
    fn schema_errors_name_the_offending_item() {
        assert!(schema_errors(&serde_json::json!({ "strategies": ["a"] })).is_empty());

        let errors = schema_errors(&serde_json::json!({ "summary": 3, "strategies": ["a", 7] }));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|error| error.starts_with("/summary: ")));
        assert!(errors.iter().any(|error| error.starts_with("/strategies/1: ")));

        let errors = schema_errors(&serde_json::json!({ "summary": "x" }));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("strategies"));
    }
}
