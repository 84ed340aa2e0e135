use chrono::{DateTime, Utc};

/// Default maximum number of serial numbers per request for new pools.
pub const DEFAULT_REQUEST_THRESHOLD: u64 = 50_000;

/// A number pool: one logical allocation target made of one or more regions.
///
/// Pools are never hard-deleted while referenced; deactivating a pool
/// disables all allocation against it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pool {
    /// Unique human-readable label.
    pub readable_name: String,
    /// Unique URL-safe key matching `^[A-Za-z0-9_-]*$`.
    pub machine_name: String,
    pub active: bool,
    /// Maximum numbers per single request. `0` disables the limit.
    pub request_threshold: u64,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

impl Pool {
    /// Creates an active pool with the [`DEFAULT_REQUEST_THRESHOLD`].
    pub fn new(readable_name: impl Into<String>, machine_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            readable_name: readable_name.into(),
            machine_name: machine_name.into(),
            active: true,
            request_threshold: DEFAULT_REQUEST_THRESHOLD,
            created_date: now,
            modified_date: now,
        }
    }

    #[must_use]
    pub const fn with_request_threshold(mut self, request_threshold: u64) -> Self {
        self.request_threshold = request_threshold;
        self
    }

    /// Returns `true` if `size` is above a non-zero request threshold.
    pub const fn exceeds_threshold(&self, size: u64) -> bool {
        self.request_threshold > 0 && size > self.request_threshold
    }
}

/// Input for creating a [`Pool`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewPool {
    pub readable_name: String,
    pub machine_name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub active: Option<bool>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub request_threshold: Option<u64>,
}

impl NewPool {
    pub fn new(readable_name: impl Into<String>, machine_name: impl Into<String>) -> Self {
        Self {
            readable_name: readable_name.into(),
            machine_name: machine_name.into(),
            active: None,
            request_threshold: None,
        }
    }

    #[must_use]
    pub const fn request_threshold(mut self, request_threshold: u64) -> Self {
        self.request_threshold = Some(request_threshold);
        self
    }

    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

/// Partial update of a [`Pool`]. The machine name is the pool's identity and
/// cannot be changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolUpdate {
    pub readable_name: Option<String>,
    pub active: Option<bool>,
    pub request_threshold: Option<u64>,
}
