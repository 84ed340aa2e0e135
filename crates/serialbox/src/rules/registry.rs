use std::{collections::BTreeMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{
    ActiveRule, PostRule, PreRule, RequestContext, RequestThresholdLimitRule, RuleConfig,
    SizeLimitRule,
};
use crate::{
    Error, Result,
    discovery::Discovery,
    model::{Pool, Region, Response},
};

/// What rule factories may capture.
#[derive(Clone, Debug)]
pub struct RuleDeps {
    pub discovery: Arc<Discovery>,
}

type PreFactory = Arc<dyn Fn(&RuleDeps) -> Arc<dyn PreRule> + Send + Sync>;
type PostFactory = Arc<dyn Fn(&RuleDeps) -> Arc<dyn PostRule> + Send + Sync>;

/// Maps rule identifiers to rule constructors.
///
/// The default registry knows the built-in pre-processing rules:
/// [`ActiveRule`], [`SizeLimitRule`] and [`RequestThresholdLimitRule`].
/// There are no built-in post-processing rules.
#[derive(Clone)]
pub struct RuleRegistry {
    pre: BTreeMap<String, PreFactory>,
    post: BTreeMap<String, PostFactory>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_pre(ActiveRule::NAME, |_| Arc::new(ActiveRule));
        registry.register_pre(SizeLimitRule::NAME, |deps| {
            Arc::new(SizeLimitRule::new(Arc::clone(&deps.discovery)))
        });
        registry.register_pre(RequestThresholdLimitRule::NAME, |_| {
            Arc::new(RequestThresholdLimitRule)
        });
        registry
    }
}

impl core::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("pre", &self.pre.keys().collect::<Vec<_>>())
            .field("post", &self.post.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self {
            pre: BTreeMap::new(),
            post: BTreeMap::new(),
        }
    }

    /// Registers a pre-processing rule, replacing any rule with the same
    /// identifier.
    pub fn register_pre<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&RuleDeps) -> Arc<dyn PreRule> + Send + Sync + 'static,
    {
        self.pre.insert(identifier.into(), Arc::new(factory));
    }

    /// Registers a post-processing rule, replacing any rule with the same
    /// identifier.
    pub fn register_post<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn(&RuleDeps) -> Arc<dyn PostRule> + Send + Sync + 'static,
    {
        self.post.insert(identifier.into(), Arc::new(factory));
    }

    /// Fails on the first identifier in `config`, under any generator key,
    /// that has no registered rule.
    ///
    /// # Errors
    /// - [`Error::UnknownRule`]
    pub fn check(&self, config: &RuleConfig) -> Result<()> {
        let unknown_pre = config
            .preprocessing
            .values()
            .flatten()
            .find(|id| !self.pre.contains_key(*id));
        let unknown_post = config
            .postprocessing
            .values()
            .flatten()
            .find(|id| !self.post.contains_key(*id));
        match unknown_pre.or(unknown_post) {
            Some(identifier) => Err(Error::UnknownRule {
                identifier: identifier.clone(),
            }),
            None => Ok(()),
        }
    }

    fn build_pre(&self, identifier: &str, deps: &RuleDeps) -> Result<Arc<dyn PreRule>> {
        let factory = self.pre.get(identifier).ok_or_else(|| Error::UnknownRule {
            identifier: identifier.to_owned(),
        })?;
        Ok(factory(deps))
    }

    fn build_post(&self, identifier: &str, deps: &RuleDeps) -> Result<Arc<dyn PostRule>> {
        let factory = self.post.get(identifier).ok_or_else(|| Error::UnknownRule {
            identifier: identifier.to_owned(),
        })?;
        Ok(factory(deps))
    }
}

/// The instantiated rules of one generator, in configured order.
#[derive(Clone, Default)]
pub struct RulePipeline {
    pre: Vec<Arc<dyn PreRule>>,
    post: Vec<Arc<dyn PostRule>>,
}

impl core::fmt::Debug for RulePipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RulePipeline")
            .field("pre", &self.pre_names())
            .field("post", &self.post_names())
            .finish()
    }
}

impl RulePipeline {
    /// Builds the pipeline `config` selects for `generator`.
    ///
    /// # Errors
    /// - [`Error::UnknownRule`] if a selected identifier is not registered.
    pub fn load(
        config: &RuleConfig,
        registry: &RuleRegistry,
        generator: &str,
        deps: &RuleDeps,
    ) -> Result<Self> {
        let pre = config
            .preprocessing_for(generator)
            .iter()
            .map(|id| registry.build_pre(id, deps))
            .collect::<Result<_>>()?;
        let post = config
            .postprocessing_for(generator)
            .iter()
            .map(|id| registry.build_post(id, deps))
            .collect::<Result<_>>()?;
        Ok(Self { pre, post })
    }

    pub fn pre_names(&self) -> Vec<&str> {
        self.pre.iter().map(|r| r.name()).collect()
    }

    pub fn post_names(&self) -> Vec<&str> {
        self.post.iter().map(|r| r.name()).collect()
    }

    /// Runs every pre-processing rule; the first failure is returned.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(size = size)))]
    pub fn run_pre(
        &self,
        ctx: &RequestContext,
        pool: &Pool,
        region: &dyn Region,
        size: u64,
    ) -> Result<()> {
        for rule in &self.pre {
            #[cfg(feature = "tracing")]
            tracing::trace!(rule = rule.name(), "running pre-processing rule");
            rule.execute(ctx, pool, region, size)?;
        }
        Ok(())
    }

    /// Runs every post-processing rule; the first failure is returned.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(size = size)))]
    pub fn run_post(
        &self,
        ctx: &RequestContext,
        response: &mut Response,
        size: u64,
        pool: &Pool,
        region: &dyn Region,
    ) -> Result<()> {
        for rule in &self.post {
            #[cfg(feature = "tracing")]
            tracing::trace!(rule = rule.name(), "running post-processing rule");
            rule.execute(ctx, response, size, pool, region)?;
        }
        Ok(())
    }
}
