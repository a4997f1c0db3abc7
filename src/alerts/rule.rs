use crate::types::{ChannelKind, Severity};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use uuid::Uuid;

/// Comparison operator applied between a metric value and a rule threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    /// Anything unrecognized in configuration; always evaluates to false
    #[serde(other)]
    Unknown,
}

impl Comparator {
    /// Parse an operator token; unrecognized tokens become `Unknown`
    pub fn parse(op: &str) -> Self {
        match op {
            ">" => Comparator::GreaterThan,
            "<" => Comparator::LessThan,
            ">=" => Comparator::GreaterOrEqual,
            "<=" => Comparator::LessOrEqual,
            "==" => Comparator::Equal,
            "!=" => Comparator::NotEqual,
            _ => Comparator::Unknown,
        }
    }

    /// Standard comparator semantics; `Unknown` is a no-op false, never an error
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::LessThan => value < threshold,
            Comparator::GreaterOrEqual => value >= threshold,
            Comparator::LessOrEqual => value <= threshold,
            Comparator::Equal => value == threshold,
            Comparator::NotEqual => value != threshold,
            Comparator::Unknown => {
                log::debug!("unknown comparator evaluated against {}", value);
                false
            }
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparator::GreaterThan => ">",
            Comparator::LessThan => "<",
            Comparator::GreaterOrEqual => ">=",
            Comparator::LessOrEqual => "<=",
            Comparator::Equal => "==",
            Comparator::NotEqual => "!=",
            Comparator::Unknown => "?",
        };
        write!(f, "{}", op)
    }
}

/// Declarative alerting rule evaluated against every matching metric sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    /// Metric this rule watches
    pub metric_name: String,
    pub comparator: Comparator,
    pub threshold: f64,
    /// The condition must hold continuously at least this long before firing
    pub sustained_ms: u64,
    pub severity: Severity,
    /// Delivery channels; empty means the engine's defaults
    pub channels: SmallVec<[ChannelKind; 4]>,
    /// Minimum spacing between two alerts from this rule
    pub cooldown_ms: u64,
    pub enabled: bool,
    pub tags: Vec<String>,
}

impl AlertRule {
    /// Create an enabled warning-severity rule that fires immediately,
    /// with a one-minute cooldown
    pub fn new(
        name: impl Into<String>,
        metric_name: impl Into<String>,
        comparator: Comparator,
        threshold: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            metric_name: metric_name.into(),
            comparator,
            threshold,
            sustained_ms: 0,
            severity: Severity::Warning,
            channels: SmallVec::new(),
            cooldown_ms: 60_000,
            enabled: true,
            tags: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_sustained_ms(mut self, sustained_ms: u64) -> Self {
        self.sustained_ms = sustained_ms;
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = ChannelKind>) -> Self {
        self.channels = channels.into_iter().collect();
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = &'static str>) -> Self {
        self.tags = tags.into_iter().map(|t| t.to_string()).collect();
        self
    }
}

/// The stock rule set the engine installs through `install_default_rules`
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new("Slow page loads", "lcp", Comparator::GreaterThan, 4000.0)
            .with_severity(Severity::Critical)
            .with_tags(["web-vitals"]),
        AlertRule::new("Layout instability", "cls", Comparator::GreaterThan, 0.25)
            .with_severity(Severity::Warning)
            .with_tags(["web-vitals"]),
        AlertRule::new(
            "Elevated API error rate",
            "api_error_rate",
            Comparator::GreaterThan,
            5.0,
        )
        .with_severity(Severity::Critical)
        .with_sustained_ms(60_000)
        .with_cooldown_ms(300_000)
        .with_tags(["api"]),
        AlertRule::new(
            "Slow API responses",
            "api_latency",
            Comparator::GreaterThan,
            2000.0,
        )
        .with_severity(Severity::Warning)
        .with_sustained_ms(120_000)
        .with_cooldown_ms(300_000)
        .with_tags(["api"]),
        AlertRule::new(
            "High memory usage",
            "heap_used_percent",
            Comparator::GreaterThan,
            90.0,
        )
        .with_severity(Severity::Critical)
        .with_sustained_ms(300_000)
        .with_cooldown_ms(600_000)
        .with_tags(["runtime"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparator_semantics() {
        assert!(Comparator::GreaterThan.evaluate(5.0, 4.0));
        assert!(!Comparator::GreaterThan.evaluate(4.0, 4.0));
        assert!(Comparator::GreaterOrEqual.evaluate(4.0, 4.0));
        assert!(Comparator::LessThan.evaluate(3.0, 4.0));
        assert!(Comparator::LessOrEqual.evaluate(4.0, 4.0));
        assert!(Comparator::Equal.evaluate(4.0, 4.0));
        assert!(Comparator::NotEqual.evaluate(3.0, 4.0));
    }

    #[test]
    fn test_unknown_comparator_is_false() {
        let op = Comparator::parse("~=");
        assert_eq!(op, Comparator::Unknown);
        assert!(!op.evaluate(100.0, 0.0));
    }

    #[test]
    fn test_comparator_serde_tokens() {
        let op: Comparator = serde_json::from_str("\">=\"").unwrap();
        assert_eq!(op, Comparator::GreaterOrEqual);

        // Unrecognized tokens deserialize to Unknown instead of failing
        let op: Comparator = serde_json::from_str("\"between\"").unwrap();
        assert_eq!(op, Comparator::Unknown);
    }
}
