//! Allocation strategies.
//!
//! A [`Generator`] turns an [`AllocationRequest`] into a persisted
//! [`Response`]. [`SequentialGenerator`] serves
//! [`SequentialRegion`](crate::model::SequentialRegion)s; other region
//! variants bring their own generator through
//! [`SerialBoxBuilder::variant`](crate::SerialBoxBuilder::variant).

mod sequential;

pub use sequential::*;

use crate::{
    Error, Result,
    model::{Pool, Response},
    rules::RequestContext,
    store::Reader,
};

/// One request for serial numbers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllocationRequest {
    /// Machine name of the pool.
    pub pool: String,
    /// How many numbers are wanted; must be positive.
    pub size: u64,
    /// Machine name of a region of `pool` to draw from instead of the
    /// selected one.
    #[cfg_attr(feature = "serde", serde(default))]
    pub region: Option<String>,
}

impl AllocationRequest {
    pub fn new(pool: impl Into<String>, size: u64) -> Self {
        Self {
            pool: pool.into(),
            size,
            region: None,
        }
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// # Errors
    /// - [`Error::InvalidRequest`] if `size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::InvalidRequest {
                reason: "the requested size must be a positive integer".to_owned(),
            });
        }
        Ok(())
    }
}

/// An allocation strategy.
pub trait Generator: Send + Sync {
    /// Name used to select this generator's rules in a
    /// [`RuleConfig`](crate::rules::RuleConfig).
    fn name(&self) -> &str;

    /// Allocates numbers for `request` and persists the outcome.
    ///
    /// # Errors
    /// - `NotFound` if the pool is unknown or inactive, or if an explicit
    ///   region is unknown or belongs to another pool.
    /// - `Exhaustion` if no active region can serve the pool.
    /// - `RuleViolation` if a rule rejects the request. Nothing is persisted.
    /// - [`Error::Rerouted`] if the pool's next region belongs to a variant
    ///   this generator does not serve.
    fn get_response(&self, ctx: &RequestContext, request: &AllocationRequest) -> Result<Response>;
}

/// Loads the active pool named `machine_name`.
///
/// # Errors
/// - [`Error::PoolNotFound`] if the pool does not exist or is inactive.
pub fn active_pool<R: Reader + ?Sized>(store: &R, machine_name: &str) -> Result<Pool> {
    store
        .pool(machine_name)?
        .filter(|pool| pool.active)
        .ok_or_else(|| Error::PoolNotFound {
            machine_name: machine_name.to_owned(),
        })
}
