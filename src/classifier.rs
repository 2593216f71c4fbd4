use crate::config::{Config, NoiseRule};
use crate::report::ReportItem;
use crate::sanitize::sanitize;
use anyhow::Context;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Record under this sanitized type
    Report(String),
    /// Known noise; neither logged nor captured
    Skip,
}

/// Denylist of body-field signatures for bogus reports.
pub struct NoiseFilter {
    rules: Vec<NoiseRule>,
    compiled_patterns: HashMap<String, Regex>,
}

impl NoiseFilter {
    pub fn new(rules: Vec<NoiseRule>) -> anyhow::Result<Self> {
        let mut compiled_patterns = HashMap::new();
        for rule in &rules {
            if let NoiseRule::FieldPattern { field, pattern } = rule {
                let regex = Regex::new(pattern).with_context(|| {
                    format!("Invalid noise filter pattern for field '{field}': {pattern}")
                })?;
                compiled_patterns.insert(pattern.clone(), regex);
            }
        }
        Ok(NoiseFilter {
            rules,
            compiled_patterns,
        })
    }

    pub fn rules(&self) -> &[NoiseRule] {
        &self.rules
    }

    /// First rule matching the report body, if any.
    pub fn matches(&self, body: &Map<String, Value>) -> Option<&NoiseRule> {
        self.rules.iter().find(|rule| {
            let Some(value) = body.get(rule.field()).and_then(Value::as_str) else {
                return false;
            };
            match rule {
                NoiseRule::FieldPrefix { prefixes, .. } => {
                    prefixes.iter().any(|p| value.starts_with(p.as_str()))
                }
                NoiseRule::FieldEquals { value: expected, .. } => value == expected.as_str(),
                NoiseRule::FieldPattern { pattern, .. } => self
                    .compiled_patterns
                    .get(pattern)
                    .is_some_and(|re| re.is_match(value)),
            }
        })
    }
}

pub struct Classifier {
    noise: NoiseFilter,
}

impl Classifier {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Classifier {
            noise: NoiseFilter::new(config.noise_filter.clone())?,
        })
    }

    pub fn noise_filter(&self) -> &NoiseFilter {
        &self.noise
    }

    pub fn classify(&self, item: &ReportItem) -> Classification {
        let report_type = sanitize(&refine_type(item));

        if let Some(rule) = self.noise.matches(&item.body) {
            log::debug!(
                "Dropping {} report matching noise rule on '{}'",
                report_type,
                rule.field()
            );
            return Classification::Skip;
        }

        Classification::Report(report_type)
    }
}

/// Derive the fine-grained type from the declared type and body fields.
/// The result is not sanitized yet.
pub fn refine_type(item: &ReportItem) -> String {
    let declared = item.report_type.as_str();

    let detail = match declared {
        "crash" => item.body_label("reason"),
        "deprecation" | "intervention" => item.body_label("id"),
        "network-error" => item.body_label("type"),
        _ => None,
    };

    match detail {
        Some(detail) => format!("{declared}.{detail}"),
        None => declared.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: Value) -> Classification {
        let classifier = Classifier::new(&Config::default()).unwrap();
        classifier.classify(&ReportItem::from_value(&value).unwrap())
    }

    fn report(t: &str) -> Classification {
        Classification::Report(t.to_string())
    }

    #[test]
    fn test_crash_reason_refinement() {
        assert_eq!(
            classify(json!({"type": "crash", "body": {"reason": "oom"}})),
            report("crash.oom")
        );
        assert_eq!(classify(json!({"type": "crash", "body": {}})), report("crash"));
    }

    #[test]
    fn test_deprecation_and_intervention_refinement() {
        assert_eq!(
            classify(json!({"type": "deprecation", "body": {"id": "xhr-sync"}})),
            report("deprecation.xhr-sync")
        );
        assert_eq!(
            classify(json!({"type": "intervention", "body": {"id": "HeavyAdIntervention"}})),
            report("intervention.HeavyAdIntervention")
        );
    }

    #[test]
    fn test_network_error_refinement() {
        assert_eq!(
            classify(json!({"type": "network-error", "body": {"type": "dns.failed"}})),
            report("network-error.dns.failed")
        );
    }

    #[test]
    fn test_unmatched_type_kept() {
        assert_eq!(classify(json!({"type": "other"})), report("other"));
        assert_eq!(
            classify(json!({"type": "csp-violation", "body": {"reason": "x"}})),
            report("csp-violation")
        );
    }

    #[test]
    fn test_missing_type_defaults_to_unknown() {
        assert_eq!(classify(json!({"body": {"reason": "oom"}})), report("unknown"));
    }

    #[test]
    fn test_unsafe_refinement_collapses_to_unknown() {
        assert_eq!(
            classify(json!({"type": "crash", "body": {"reason": "../../etc/passwd"}})),
            report("unknown")
        );
        assert_eq!(
            classify(json!({"type": "network-error", "body": {"type": "x\nnel,type=y"}})),
            report("unknown")
        );
        assert_eq!(
            classify(json!({"type": "crash", "body": {"reason": {"a": 1}}})),
            report("unknown")
        );
        assert_eq!(classify(json!({"type": "a b"})), report("unknown"));
    }

    #[test]
    fn test_non_string_detail_rendered() {
        assert_eq!(
            classify(json!({"type": "crash", "body": {"reason": 5}})),
            report("crash.5")
        );
    }

    #[test]
    fn test_extension_source_file_skipped() {
        assert_eq!(
            classify(json!({"type": "x", "body": {"sourceFile": "chrome-extension://abc/y.js"}})),
            Classification::Skip
        );
        assert_eq!(
            classify(json!({"type": "x", "body": {"sourceFile": "file:///home/u/a.html"}})),
            Classification::Skip
        );
    }

    #[test]
    fn test_eval_blocked_url_skipped() {
        assert_eq!(
            classify(json!({"type": "x", "body": {"blockedURL": "eval"}})),
            Classification::Skip
        );
        assert_eq!(
            classify(json!({"type": "x", "body": {"blockedURL": "inline"}})),
            report("x")
        );
    }

    #[test]
    fn test_wrong_typed_source_file_ignored() {
        assert_eq!(
            classify(json!({"type": "x", "body": {"sourceFile": 42}})),
            report("x")
        );
        assert_eq!(
            classify(json!({"type": "x", "body": {"sourceFile": "https://example.com/app.js"}})),
            report("x")
        );
    }

    #[test]
    fn test_configured_prefix_and_pattern_rules() {
        let config = Config {
            noise_filter: vec![
                NoiseRule::FieldPrefix {
                    field: "sourceFile".to_string(),
                    prefixes: vec!["https://aggregator.example.net/".to_string()],
                },
                NoiseRule::FieldPattern {
                    field: "documentURL".to_string(),
                    pattern: r"^https?://localhost(:\d+)?/".to_string(),
                },
            ],
        };
        let classifier = Classifier::new(&config).unwrap();
        let item = |v: Value| ReportItem::from_value(&v).unwrap();

        assert_eq!(
            classifier.classify(&item(json!({
                "type": "csp-violation",
                "body": {"sourceFile": "https://aggregator.example.net/t.js"}
            }))),
            Classification::Skip
        );
        assert_eq!(
            classifier.classify(&item(json!({
                "type": "csp-violation",
                "body": {"documentURL": "http://localhost:8080/"}
            }))),
            Classification::Skip
        );
        // Not in this config's denylist.
        assert_eq!(
            classifier.classify(&item(json!({
                "type": "csp-violation",
                "body": {"blockedURL": "eval"}
            }))),
            report("csp-violation")
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config = Config {
            noise_filter: vec![NoiseRule::FieldPattern {
                field: "sourceFile".to_string(),
                pattern: "(unclosed".to_string(),
            }],
        };
        assert!(Classifier::new(&config).is_err());
    }
}
