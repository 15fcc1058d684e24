use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r#"(?i)(api[_-]?key|x-api-key|token|secret|authorization)\s*[:=]\s*["']?(Bearer\s+)?([A-Za-z0-9_\-\.]{6,})["']?"#)
            .expect("valid regex"),
        Regex::new(r"\b(sk-ant-[A-Za-z0-9_\-]{20,})").expect("valid regex"),
        Regex::new(r"\b(sk-[A-Za-z0-9_\-]{20,})").expect("valid regex"),
    ]
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactionResult {
    pub content: String,
    pub redaction_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct Redactor {
    known_secrets: Vec<String>,
}

impl Redactor {
    pub fn new<I, S>(known_secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_secrets: known_secrets
                .into_iter()
                .map(Into::into)
                .filter(|secret| !secret.trim().is_empty())
                .collect(),
        }
    }

    pub fn redact(&self, input: &str) -> RedactionResult {
        if input.is_empty() {
            return RedactionResult {
                content: String::new(),
                redaction_count: 0,
            };
        }

        let mut result = input.to_string();
        let mut redaction_count = 0usize;

        for secret in &self.known_secrets {
            let matches = result.matches(secret.as_str()).count();
            if matches > 0 {
                redaction_count += matches;
                result = result.replace(secret.as_str(), "[REDACTED]");
            }
        }

        for pattern in SECRET_PATTERNS.iter() {
            let matches = pattern.find_iter(&result).count();
            if matches == 0 {
                continue;
            }

            redaction_count += matches;
            result = pattern
                .replace_all(&result, |caps: &regex::Captures<'_>| {
                    if caps.len() > 2 {
                        let key = caps
                            .get(1)
                            .map(|m| m.as_str())
                            .unwrap_or("secret")
                            .to_ascii_lowercase();
                        format!("{}=[REDACTED]", key)
                    } else {
                        "[REDACTED]".to_string()
                    }
                })
                .to_string();
        }

        RedactionResult {
            content: result,
            redaction_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Redactor;

    #[test]
    fn redacts_configured_key_verbatim() {
        let redactor = Redactor::new(["my-plain-key-value"]);
        let result = redactor.redact("request failed for key my-plain-key-value");
        assert_eq!(result.content, "request failed for key [REDACTED]");
        assert_eq!(result.redaction_count, 1);
    }

    #[test]
    fn redacts_named_header_values() {
        let redactor = Redactor::default();
        let result = redactor.redact("x-api-key: abcd1234abcd1234");
        assert!(result.content.contains("x-api-key=[REDACTED]"));
        assert!(!result.content.contains("abcd1234"));
    }

    #[test]
    fn redacts_provider_key_shapes() {
        let redactor = Redactor::default();
        let result = redactor.redact("invalid key sk-ant-REDACTED supplied");
        assert!(!result.content.contains("api03"));
        assert!(result.redaction_count >= 1);
    }

    #[test]
    fn leaves_plain_text_alone() {
        let result = Redactor::default().redact("connection refused");
        assert_eq!(result.content, "connection refused");
        assert_eq!(result.redaction_count, 0);
    }
}
