//! Region boundary validation.
//!
//! A region's `[start, end]` range must not collide with any other region of
//! the same pool. Two policies are available:
//!
//! - [`OverlapCheck::StartPoint`] only tests the candidate's `start` against
//!   every sibling range. A candidate that starts before a sibling and ends
//!   inside it passes. This is the historical behavior and the default.
//! - [`OverlapCheck::Interval`] rejects any shared number.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{BoundaryError, model::SequentialRegion};

/// How sibling ranges are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OverlapCheck {
    #[default]
    StartPoint,
    Interval,
}

impl OverlapCheck {
    /// Returns `true` if `candidate` collides with `other` under this policy.
    pub const fn collides(self, candidate: &SequentialRegion, other: &SequentialRegion) -> bool {
        match self {
            Self::StartPoint => candidate.starts_within(other),
            Self::Interval => candidate.intersects(other),
        }
    }
}

/// Validates `region` against the other regions of its pool.
///
/// Checks run in order and the first failure is returned:
/// 1. `start < end`
/// 2. no collision with a sibling, active or not
///
/// `siblings` may contain `region` itself (matched by machine name) and
/// regions of other pools; both are skipped.
///
/// # Errors
/// - [`BoundaryError::StartNotBeforeEnd`] if `start >= end`.
/// - [`BoundaryError::Overlap`] naming the first colliding sibling.
///
/// # Example
/// ```
/// use serialbox::{BoundaryError, OverlapCheck, boundary, model::SequentialRegion};
///
/// let existing = SequentialRegion::new("One", "one", "pool", 1, 1, 100);
/// let candidate = SequentialRegion::new("Two", "two", "pool", 2, 50, 150);
///
/// let err = boundary::validate(&candidate, [&existing], OverlapCheck::StartPoint);
/// assert!(matches!(err, Err(BoundaryError::Overlap { .. })));
/// ```
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(region = %region.machine_name, ?check))
)]
pub fn validate<'a, I>(
    region: &SequentialRegion,
    siblings: I,
    check: OverlapCheck,
) -> Result<(), BoundaryError>
where
    I: IntoIterator<Item = &'a SequentialRegion>,
{
    if region.start >= region.end {
        return Err(BoundaryError::StartNotBeforeEnd {
            start: region.start,
            end: region.end,
        });
    }

    let collision = siblings.into_iter().find(|other| {
        other.pool == region.pool
            && other.machine_name != region.machine_name
            && check.collides(region, other)
    });

    if let Some(other) = collision {
        #[cfg(feature = "tracing")]
        tracing::debug!(other = %other.machine_name, "region boundary collision");
        return Err(BoundaryError::Overlap {
            region: region.machine_name.clone(),
            other: other.machine_name.clone(),
            pool: region.pool.clone(),
        });
    }
    Ok(())
}

/// Validates that the cursor lies in `[start, end + 1]`.
///
/// # Errors
/// - [`BoundaryError::StateOutOfRange`] otherwise.
pub fn validate_state(region: &SequentialRegion) -> Result<(), BoundaryError> {
    let in_range = region.state >= region.start
        && region
            .end
            .checked_add(1)
            .is_none_or(|exhausted| region.state <= exhausted);
    if in_range {
        Ok(())
    } else {
        Err(BoundaryError::StateOutOfRange {
            region: region.machine_name.clone(),
            state: region.state,
            start: region.start,
            end: region.end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(machine_name: &str, start: u64, end: u64) -> SequentialRegion {
        SequentialRegion::new(machine_name, machine_name, "pool", 1, start, end)
    }

    #[test]
    fn start_must_precede_end() {
        let err = validate(&region("r", 75, 50), [], OverlapCheck::StartPoint);
        assert_eq!(err, Err(BoundaryError::StartNotBeforeEnd { start: 75, end: 50 }));

        let err = validate(&region("r", 50, 50), [], OverlapCheck::Interval);
        assert_eq!(err, Err(BoundaryError::StartNotBeforeEnd { start: 50, end: 50 }));
    }

    #[test]
    fn start_inside_sibling_is_rejected() {
        let existing = region("one", 1, 100);
        let err = validate(&region("two", 50, 150), [&existing], OverlapCheck::StartPoint);
        assert_eq!(
            err,
            Err(BoundaryError::Overlap {
                region: "two".into(),
                other: "one".into(),
                pool: "pool".into(),
            })
        );
    }

    #[test]
    fn start_point_check_is_asymmetric() {
        let existing = region("one", 50, 100);
        let candidate = region("two", 10, 60);

        assert!(validate(&candidate, [&existing], OverlapCheck::StartPoint).is_ok());
        assert!(validate(&candidate, [&existing], OverlapCheck::Interval).is_err());
    }

    #[test]
    fn shared_endpoints_collide() {
        let existing = region("one", 1, 100);
        let touching = region("two", 100, 200);
        let adjacent = region("three", 101, 200);

        assert!(validate(&touching, [&existing], OverlapCheck::StartPoint).is_err());
        assert!(validate(&adjacent, [&existing], OverlapCheck::StartPoint).is_ok());
        assert!(validate(&adjacent, [&existing], OverlapCheck::Interval).is_ok());
    }

    #[test]
    fn self_and_other_pools_are_ignored() {
        let stored = region("one", 1, 100);
        let mut updated = stored.clone();
        updated.end = 500;

        let mut foreign = region("foreign", 1, 100);
        foreign.pool = "elsewhere".into();

        assert!(validate(&updated, [&stored, &foreign], OverlapCheck::Interval).is_ok());
    }

    #[test]
    fn inactive_siblings_still_collide() {
        let existing = region("one", 1, 100).with_active(false);
        assert!(validate(&region("two", 10, 20), [&existing], OverlapCheck::StartPoint).is_err());
    }

    #[test]
    fn state_range() {
        let r = region("r", 1, 100);
        assert!(validate_state(&r).is_ok());
        assert!(validate_state(&r.clone().with_state(101)).is_ok());
        assert!(validate_state(&r.clone().with_state(102)).is_err());
        assert!(validate_state(&region("r", 5, 10).with_state(4)).is_err());

        let full = region("r", 0, u64::MAX).with_state(u64::MAX);
        assert!(validate_state(&full).is_ok());
    }
}
