use crate::{boundary::OverlapCheck, model::DEFAULT_REQUEST_THRESHOLD, rules::RuleConfig};

/// Settings of a [`SerialBox`](crate::SerialBox) instance.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SerialBoxConfig {
    /// Rules run by each generator.
    pub rules: RuleConfig,
    /// How region ranges are checked against their siblings.
    pub overlap_check: OverlapCheck,
    /// `request_threshold` given to pools created without one.
    pub default_request_threshold: u64,
}

impl Default for SerialBoxConfig {
    fn default() -> Self {
        Self {
            rules: RuleConfig::default(),
            overlap_check: OverlapCheck::default(),
            default_request_threshold: DEFAULT_REQUEST_THRESHOLD,
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn deserialize_with_defaults() {
        let config: SerialBoxConfig =
            serde_json::from_str(r#"{ "overlap_check": "interval" }"#).unwrap();
        assert_eq!(config.overlap_check, OverlapCheck::Interval);
        assert_eq!(config.default_request_threshold, 50_000);
        assert_eq!(config.rules, RuleConfig::default());
    }
}
