//! Error types for serial number allocation.
//!
//! Every fallible `serialbox` API returns [`Error`]. Each variant belongs to
//! exactly one [`ErrorKind`], which is what front ends use to decide how a
//! failure is reported (for example, the HTTP status code).
//!
//! ## Error Cases
//! - `NotFound`: an unknown or inactive pool, region, response or response
//!   rule.
//! - `Validation`: malformed names, duplicates, region boundaries and bad
//!   request sizes.
//! - `RuleViolation`: a pre- or post-processing rule rejected the request.
//! - `Exhaustion`: no active region can serve the pool.
//! - `Escalation`: a downstream response rule failed.
//! - `Config`: a rule or region variant identifier that was never
//!   registered.
//! - `Internal`: store or lock failures.

use crate::model::ContentType;

/// A result type defaulting to [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum ErrorKind {
    NotFound,
    Validation,
    RuleViolation,
    Exhaustion,
    Escalation,
    Config,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::RuleViolation => "rule_violation",
            Self::Exhaustion => "exhaustion",
            Self::Escalation => "escalation",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All error variants that `serialbox` can emit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The pool does not exist, or is inactive where an active pool is
    /// required.
    #[error("no active pool with machine name `{machine_name}`")]
    PoolNotFound { machine_name: String },

    /// The region does not exist, or does not belong to the requested pool.
    #[error("no region with machine name `{machine_name}`")]
    RegionNotFound { machine_name: String },

    #[error("no response with id {id}")]
    ResponseNotFound { id: u64 },

    #[error("no response rule for pool `{pool}` and content type `{content_type}`")]
    ResponseRuleNotFound {
        pool: String,
        content_type: ContentType,
    },

    /// A region failed boundary validation.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),

    /// A readable or machine name is empty, too long, or contains characters
    /// outside `[A-Za-z0-9_-]`.
    #[error("invalid {field} `{value}`: {reason}")]
    InvalidName {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A uniqueness constraint would be violated.
    #[error("a {entity} with {field} `{value}` already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The request itself is malformed (e.g. a zero size).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A pre- or post-processing rule rejected the request.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// The pool has no active region left. This is an operational condition,
    /// not a client mistake.
    #[error("no active regions available for pool `{pool}`")]
    NoActiveRegion { pool: String },

    /// The region reached the carve-out with nothing left to issue.
    #[error("region `{region}` has no numbers remaining")]
    RegionExhausted { region: String },

    /// The downstream response rule could not be executed. The task is left
    /// marked as failed.
    #[error("response rule task `{task}` failed: {reason}")]
    Escalation { task: String, reason: String },

    /// The region now first in line for the pool belongs to a variant served
    /// by another generator. [`SerialBox::allocate`](crate::SerialBox::allocate)
    /// resolves the generator again when it sees this.
    #[error("the next region of pool `{pool}` is served by another generator")]
    Rerouted { pool: String },

    /// A rule identifier in the configuration has no registered rule.
    #[error("no rule registered for identifier `{identifier}`")]
    UnknownRule { identifier: String },

    /// A region kind has no registered variant or generator.
    #[error("no region variant registered for kind `{kind}`")]
    UnknownRegionKind { kind: String },

    /// The backing store failed.
    #[error("store error: {context}")]
    Store { context: String },

    /// The operation failed because the lock was **poisoned**.
    ///
    /// This occurs when a thread panics while holding the lock. When the
    /// `parking-lot` feature is enabled, locks do **not** poison, so this
    /// variant is not available.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Returns the taxonomy bucket this error belongs to.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::PoolNotFound { .. }
            | Self::RegionNotFound { .. }
            | Self::ResponseNotFound { .. }
            | Self::ResponseRuleNotFound { .. } => ErrorKind::NotFound,
            Self::Boundary(_)
            | Self::InvalidName { .. }
            | Self::Duplicate { .. }
            | Self::InvalidRequest { .. } => ErrorKind::Validation,
            Self::Rule(_) => ErrorKind::RuleViolation,
            Self::NoActiveRegion { .. } | Self::RegionExhausted { .. } => ErrorKind::Exhaustion,
            Self::Escalation { .. } => ErrorKind::Escalation,
            Self::UnknownRule { .. } | Self::UnknownRegionKind { .. } => ErrorKind::Config,
            Self::Rerouted { .. } | Self::Store { .. } => ErrorKind::Internal,
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

#[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
#[cfg(not(feature = "parking-lot"))]
impl<G> From<std::sync::PoisonError<G>> for Error {
    fn from(_: std::sync::PoisonError<G>) -> Self {
        Self::LockPoisoned
    }
}

/// Failures raised by the region boundary validator.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BoundaryError {
    #[error("the start of the range ({start}) must be less than the end value ({end})")]
    StartNotBeforeEnd { start: u64, end: u64 },

    #[error(
        "region `{region}` has been defined within the start and end values of region `{other}` in pool `{pool}`"
    )]
    Overlap {
        region: String,
        other: String,
        pool: String,
    },

    /// `state` must lie in `[start, end + 1]`; `end + 1` means exhausted.
    #[error("state {state} lies outside the range [{start}, {end}] of region `{region}`")]
    StateOutOfRange {
        region: String,
        state: u64,
        start: u64,
        end: u64,
    },
}

/// Failures raised by processing rules.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum RuleError {
    #[error(
        "the pool or region requested is currently not marked as active. Pool `{pool}`, Region `{region}`"
    )]
    Inactive { pool: String, region: String },

    #[error(
        "the requested size of {size} is greater than the {remaining} numbers remaining within the active regions of pool `{pool}`"
    )]
    SizeLimit {
        pool: String,
        size: u64,
        remaining: u64,
    },

    #[error("the request threshold of {threshold} has been exceeded by the request size of {size}")]
    Threshold { threshold: u64, size: u64 },

    /// Raised by rules registered outside this crate.
    #[error("rule `{rule}` rejected the request: {reason}")]
    Custom { rule: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let not_found = Error::PoolNotFound {
            machine_name: "p".into(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let boundary: Error = BoundaryError::StartNotBeforeEnd { start: 75, end: 50 }.into();
        assert_eq!(boundary.kind(), ErrorKind::Validation);

        let rule: Error = RuleError::Threshold {
            threshold: 100,
            size: 200,
        }
        .into();
        assert_eq!(rule.kind(), ErrorKind::RuleViolation);

        let exhausted = Error::NoActiveRegion { pool: "p".into() };
        assert_eq!(exhausted.kind(), ErrorKind::Exhaustion);
    }

    #[test]
    fn rule_messages_name_the_limit() {
        let err = RuleError::Threshold {
            threshold: 100,
            size: 200,
        };
        assert_eq!(
            err.to_string(),
            "the request threshold of 100 has been exceeded by the request size of 200"
        );
    }
}
