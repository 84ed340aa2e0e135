use core::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Kind tag of [`SequentialRegion`].
pub const SEQUENTIAL_KIND: &str = "sequential";

/// A shared handle to any region variant.
pub type RegionRef = Arc<dyn Region>;

/// The capability every region variant exposes to discovery and the rule
/// pipeline.
///
/// A region is a bounded sub-range of a pool and the unit of allocation.
/// Only [`SequentialRegion`] ships with this crate; other flavors (list,
/// random) plug in through [`RegionVariant`].
///
/// [`RegionVariant`]: crate::discovery::RegionVariant
pub trait Region: fmt::Debug + Send + Sync {
    /// Stable tag of the region variant, e.g. [`SEQUENTIAL_KIND`].
    fn kind(&self) -> &str;
    fn readable_name(&self) -> &str;
    /// Globally unique key of the region.
    fn machine_name(&self) -> &str;
    /// Machine name of the owning pool.
    fn pool(&self) -> &str;
    fn active(&self) -> bool;
    /// Tie-break for selection; the lowest order wins.
    fn order(&self) -> i64;
    /// How many numbers the region can still issue.
    fn remaining(&self) -> u64;

    /// Downcast used by the sequential generator.
    fn as_sequential(&self) -> Option<&SequentialRegion> {
        None
    }
}

/// A region whose numbers are issued as a contiguous, monotonically
/// advancing counter over the inclusive range `[start, end]`.
///
/// `state` is the next number to issue. It never moves past `end + 1`, which
/// is the exhausted position.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SequentialRegion {
    pub readable_name: String,
    pub machine_name: String,
    pub pool: String,
    pub active: bool,
    pub order: i64,
    pub start: u64,
    pub end: u64,
    pub state: u64,
    /// Bumped by the store on every write; allocation commits only against
    /// the revision it read.
    #[cfg_attr(feature = "serde", serde(default))]
    pub revision: u64,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl SequentialRegion {
    /// Creates an active region at `order` whose cursor sits on `start`.
    pub fn new(
        readable_name: impl Into<String>,
        machine_name: impl Into<String>,
        pool: impl Into<String>,
        order: i64,
        start: u64,
        end: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            readable_name: readable_name.into(),
            machine_name: machine_name.into(),
            pool: pool.into(),
            active: true,
            order,
            start,
            end,
            state: start,
            revision: 0,
            created_date: now,
            modified_date: now,
        }
    }

    #[must_use]
    pub const fn with_state(mut self, state: u64) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub const fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// `end - state + 1`, saturating to zero once the cursor is past `end`.
    pub const fn remaining(&self) -> u64 {
        if self.state > self.end {
            0
        } else {
            (self.end - self.state).saturating_add(1)
        }
    }

    /// Returns `true` if the closed intervals of both regions share a number.
    pub const fn intersects(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Returns `true` if this region's start lies within `other`'s range.
    pub const fn starts_within(&self, other: &Self) -> bool {
        other.start <= self.start && self.start <= other.end
    }

    pub fn into_ref(self) -> RegionRef {
        Arc::new(self)
    }
}

impl Region for SequentialRegion {
    fn kind(&self) -> &str {
        SEQUENTIAL_KIND
    }

    fn readable_name(&self) -> &str {
        &self.readable_name
    }

    fn machine_name(&self) -> &str {
        &self.machine_name
    }

    fn pool(&self) -> &str {
        &self.pool
    }

    fn active(&self) -> bool {
        self.active
    }

    fn order(&self) -> i64 {
        self.order
    }

    fn remaining(&self) -> u64 {
        Self::remaining(self)
    }

    fn as_sequential(&self) -> Option<&SequentialRegion> {
        Some(self)
    }
}

/// Input for creating a [`SequentialRegion`].
///
/// `order` is auto-assigned to one past the highest order in the pool when
/// unset, and `state` defaults to `start`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewSequentialRegion {
    pub readable_name: String,
    pub machine_name: String,
    pub pool: String,
    pub start: u64,
    pub end: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub active: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub order: Option<i64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub state: Option<u64>,
}

impl NewSequentialRegion {
    pub fn new(
        readable_name: impl Into<String>,
        machine_name: impl Into<String>,
        pool: impl Into<String>,
        start: u64,
        end: u64,
    ) -> Self {
        Self {
            readable_name: readable_name.into(),
            machine_name: machine_name.into(),
            pool: pool.into(),
            start,
            end,
            active: None,
            order: None,
            state: None,
        }
    }

    #[must_use]
    pub const fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    #[must_use]
    pub const fn state(mut self, state: u64) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// Partial update of a [`SequentialRegion`]. Identity (machine name and
/// owning pool) is fixed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegionUpdate {
    pub readable_name: Option<String>,
    pub active: Option<bool>,
    pub order: Option<i64>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub state: Option<u64>,
}
