use std::sync::Arc;

use chrono::Utc;
#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{AllocationRequest, Generator, active_pool};
use crate::{
    Error, Result,
    discovery::Discovery,
    model::{Response, ResponseType, SequentialRegion},
    rules::{RequestContext, RulePipeline},
    store::{Reader, StoreExt},
};

/// Issues contiguous blocks from [`SequentialRegion`]s.
///
/// Allocation is optimistic: the region is read, checked by the rule
/// pipeline and carved out without holding any lock. The new region state
/// and the response are then committed in one transaction only if the
/// region's revision is still the one that was read. Otherwise the attempt
/// is discarded and recomputed from fresh state, so concurrent requests are
/// never granted overlapping numbers.
///
/// Only the selected region's revision is compared. Pre-processing rules
/// that read other regions, such as
/// [`SizeLimitRule`](crate::rules::SizeLimitRule) summing `total_remaining`
/// over the pool, may therefore see totals that a concurrent grant from a
/// sibling region has already lowered. Such a request can come back as a
/// partial grant where a serialized run would have failed the size limit.
/// Issued numbers stay unique either way.
///
/// ## See Also
/// - [`carve_out`] for the numeric semantics of one grant.
#[derive(Debug)]
pub struct SequentialGenerator {
    discovery: Arc<Discovery>,
    rules: RulePipeline,
}

enum Attempt {
    Committed(Response),
    Conflict,
}

impl SequentialGenerator {
    /// The key of this generator's rules in a
    /// [`RuleConfig`](crate::rules::RuleConfig).
    pub const NAME: &'static str = "serialbox::SequentialGenerator";

    pub fn new(discovery: Arc<Discovery>, rules: RulePipeline) -> Self {
        Self { discovery, rules }
    }

    pub fn rules(&self) -> &RulePipeline {
        &self.rules
    }

    fn resolve_region(&self, pool: &str, explicit: Option<&str>) -> Result<SequentialRegion> {
        let store = self.discovery.store();
        match explicit {
            Some(machine_name) => store
                .region(machine_name)?
                .filter(|region| region.pool == pool)
                .ok_or_else(|| Error::RegionNotFound {
                    machine_name: machine_name.to_owned(),
                }),
            None => self
                .discovery
                .select_region(pool)?
                .as_sequential()
                .cloned()
                .ok_or_else(|| Error::Rerouted {
                    pool: pool.to_owned(),
                }),
        }
    }

    fn attempt(&self, ctx: &RequestContext, request: &AllocationRequest) -> Result<Attempt> {
        let store = self.discovery.store();
        let pool = active_pool(store.as_ref(), &request.pool)?;
        let region = self.resolve_region(&pool.machine_name, request.region.as_deref())?;

        let mut response = Response::draft(
            ResponseType::Sequential,
            &pool.machine_name,
            &region.machine_name,
            request.size,
            ctx.remote_host.clone(),
        );

        self.rules.run_pre(ctx, &pool, &region, request.size)?;
        let mut next = region.clone();
        carve_out(&mut next, &mut response, request.size)?;
        self.rules
            .run_post(ctx, &mut response, request.size, &pool, &next)?;

        let read_revision = region.revision;
        let committed = store.transaction(|tx| {
            let current = tx.region(&next.machine_name)?;
            if current.is_none_or(|current| current.revision != read_revision) {
                return Ok(None);
            }
            tx.put_region(next)?;
            tx.insert_response(response.clone()).map(Some)
        })?;

        Ok(match committed {
            Some(id) => {
                response.id = Some(id);
                Attempt::Committed(response)
            }
            None => Attempt::Conflict,
        })
    }
}

impl Generator for SequentialGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(pool = %request.pool, size = request.size, region = ?request.region))
    )]
    fn get_response(&self, ctx: &RequestContext, request: &AllocationRequest) -> Result<Response> {
        request.validate()?;
        loop {
            match self.attempt(ctx, request)? {
                Attempt::Committed(response) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        region = %response.region,
                        granted = response.size_granted,
                        fulfilled = response.fulfilled,
                        "allocation committed"
                    );
                    return Ok(response);
                }
                Attempt::Conflict => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("region changed concurrently, retrying");
                    std::thread::yield_now();
                }
            }
        }
    }
}

/// Carves the next block of at most `size` numbers out of `region`.
///
/// - `granted = min(size, remaining)`.
/// - If `size >= remaining` the region is exhausted by this grant: it is
///   marked inactive, and the response is fulfilled only if `size` matched
///   `remaining` exactly.
/// - The response carries `[first]` for a single number, else
///   `[first, last]` with `last = first + granted - 1`.
/// - `state` advances by `granted`.
///
/// # Errors
/// - [`Error::InvalidRequest`] if `size` is zero.
/// - [`Error::RegionExhausted`] if the region has nothing left; neither
///   argument is modified.
///
/// # Example
/// ```
/// use serialbox::{
///     generator::carve_out,
///     model::{Response, ResponseType, SequentialRegion},
/// };
///
/// let mut region = SequentialRegion::new("One", "one", "pool", 1, 1, 100);
/// let mut response = Response::draft(ResponseType::Sequential, "pool", "one", 200, None);
///
/// carve_out(&mut region, &mut response, 200).unwrap();
///
/// assert_eq!(response.numbers(), &[1, 100]);
/// assert_eq!(response.size_granted, 100);
/// assert!(!response.fulfilled);
/// assert!(!region.active);
/// assert_eq!(region.state, 101);
/// ```
pub fn carve_out(region: &mut SequentialRegion, response: &mut Response, size: u64) -> Result<()> {
    if size == 0 {
        return Err(Error::InvalidRequest {
            reason: "the requested size must be a positive integer".to_owned(),
        });
    }
    let remaining = region.remaining();
    if remaining == 0 {
        return Err(Error::RegionExhausted {
            region: region.machine_name.clone(),
        });
    }

    let granted = if size >= remaining {
        region.active = false;
        response.fulfilled = size == remaining;
        #[cfg(feature = "tracing")]
        tracing::info!(
            region = %region.machine_name,
            requested = size,
            granted = remaining,
            "region exhausted"
        );
        remaining
    } else {
        size
    };
    response.size_granted = granted;

    let first = region.state;
    let mut numbers = vec![first];
    if granted > 1 {
        numbers.push(first + (granted - 1));
    }
    response.set_number_list(numbers);

    // `end + 1` is unrepresentable for a region ending at `u64::MAX`.
    region.state = first.saturating_add(granted);
    region.modified_date = Utc::now();
    Ok(())
}
