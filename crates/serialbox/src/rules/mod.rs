//! The allocation rule pipeline.
//!
//! Pre-processing rules run after the pool and region are resolved and
//! before any number is carved out. Post-processing rules run after the
//! carve-out and before anything is persisted. A failing rule aborts the
//! allocation with no state change.
//!
//! Rules are looked up by identifier in a [`RuleRegistry`] and assembled per
//! generator from a [`RuleConfig`] into a [`RulePipeline`].

mod config;
mod limits;
mod registry;

pub use config::*;
pub use limits::*;
pub use registry::*;

use std::collections::BTreeMap;

use crate::{
    Result,
    model::{Pool, Region, Response},
};

/// Caller information carried through one allocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub remote_host: Option<String>,
    /// Inbound query parameters; forwarded to response rule tasks.
    pub params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(remote_host: impl Into<String>) -> Self {
        Self {
            remote_host: Some(remote_host.into()),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A check run before numbers are carved out.
pub trait PreRule: Send + Sync {
    /// The identifier the rule is registered under.
    fn name(&self) -> &str;

    /// # Errors
    /// Usually an [`Error::Rule`](crate::Error::Rule) describing the
    /// violation.
    fn execute(&self, ctx: &RequestContext, pool: &Pool, region: &dyn Region, size: u64)
    -> Result<()>;
}

/// An action run after numbers are carved out. It sees the region with its
/// cursor already advanced and may adjust the response.
pub trait PostRule: Send + Sync {
    fn name(&self) -> &str;

    fn execute(
        &self,
        ctx: &RequestContext,
        response: &mut Response,
        size: u64,
        pool: &Pool,
        region: &dyn Region,
    ) -> Result<()>;
}
