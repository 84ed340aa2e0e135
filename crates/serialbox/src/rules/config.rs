use std::collections::BTreeMap;

use super::{ActiveRule, RequestThresholdLimitRule, SizeLimitRule};
use crate::generator::SequentialGenerator;

/// Key used when a generator has no entry of its own.
pub const DEFAULT_RULE_KEY: &str = "default";

/// Ordered rule identifiers per generator name.
///
/// A generator with an entry uses it verbatim, even an empty one. A
/// generator without an entry falls back to [`DEFAULT_RULE_KEY`], and to no
/// rules at all if that is missing too.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RuleConfig {
    pub preprocessing: BTreeMap<String, Vec<String>>,
    pub postprocessing: BTreeMap<String, Vec<String>>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        let preprocessing = BTreeMap::from([
            (
                DEFAULT_RULE_KEY.to_owned(),
                vec![
                    ActiveRule::NAME.to_owned(),
                    RequestThresholdLimitRule::NAME.to_owned(),
                ],
            ),
            (
                SequentialGenerator::NAME.to_owned(),
                vec![
                    ActiveRule::NAME.to_owned(),
                    SizeLimitRule::NAME.to_owned(),
                    RequestThresholdLimitRule::NAME.to_owned(),
                ],
            ),
        ]);
        Self {
            preprocessing,
            postprocessing: BTreeMap::new(),
        }
    }
}

impl RuleConfig {
    /// A configuration without any rule.
    pub fn empty() -> Self {
        Self {
            preprocessing: BTreeMap::new(),
            postprocessing: BTreeMap::new(),
        }
    }

    pub fn preprocessing_for(&self, generator: &str) -> &[String] {
        lookup(&self.preprocessing, generator)
    }

    pub fn postprocessing_for(&self, generator: &str) -> &[String] {
        lookup(&self.postprocessing, generator)
    }
}

fn lookup<'a>(rules: &'a BTreeMap<String, Vec<String>>, generator: &str) -> &'a [String] {
    rules
        .get(generator)
        .or_else(|| rules.get(DEFAULT_RULE_KEY))
        .map(Vec::as_slice)
        .unwrap_or_default()
}
