//! Administration of pools, regions and response rules.
//!
//! Every write validates inside the transaction that performs it, so checks
//! such as region overlap cannot be raced by a concurrent write. Deletes are
//! soft for pools and regions: the record is deactivated and stays
//! available to the response history that names it.

use std::sync::Arc;

use chrono::Utc;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    boundary::{self, OverlapCheck},
    model::{
        ContentType, NewPool, NewResponseRule, NewSequentialRegion, Pool, PoolUpdate, RegionUpdate,
        Response, ResponseRule, SequentialRegion, validate_machine_name, validate_readable_name,
    },
    store::{Reader, RegionFilter, Store, StoreExt},
};

/// Suffix appended to both names of a copied pool and its regions.
pub const COPY_SUFFIX: &str = "_COPY";

/// A pool created by [`Admin::copy_pool`] together with its regions.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolCopy {
    pub pool: Pool,
    pub regions: Vec<SequentialRegion>,
}

/// Validated write access to the store.
pub struct Admin {
    store: Arc<dyn Store>,
    overlap_check: OverlapCheck,
    default_request_threshold: u64,
}

impl core::fmt::Debug for Admin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Admin")
            .field("overlap_check", &self.overlap_check)
            .field("default_request_threshold", &self.default_request_threshold)
            .finish_non_exhaustive()
    }
}

impl Admin {
    pub fn new(
        store: Arc<dyn Store>,
        overlap_check: OverlapCheck,
        default_request_threshold: u64,
    ) -> Self {
        Self {
            store,
            overlap_check,
            default_request_threshold,
        }
    }

    // Pools

    /// # Errors
    /// - [`Error::InvalidName`] for a malformed readable or machine name.
    /// - [`Error::Duplicate`] if either name is taken.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(pool = %new.machine_name)))]
    pub fn create_pool(&self, new: NewPool) -> Result<Pool> {
        validate_readable_name(&new.readable_name)?;
        validate_machine_name(&new.machine_name)?;

        let mut pool = Pool::new(new.readable_name, new.machine_name)
            .with_request_threshold(
                new.request_threshold
                    .unwrap_or(self.default_request_threshold),
            );
        if let Some(active) = new.active {
            pool.active = active;
        }

        self.store.transaction(|tx| {
            ensure_pool_names_free(tx, &pool, true)?;
            tx.put_pool(pool.clone())?;
            Ok(pool)
        })
    }

    /// Applies a partial update. The machine name cannot change.
    ///
    /// # Errors
    /// - [`Error::PoolNotFound`] if the pool does not exist.
    /// - [`Error::InvalidName`] / [`Error::Duplicate`] for a bad readable
    ///   name.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn update_pool(&self, machine_name: &str, update: PoolUpdate) -> Result<Pool> {
        if let Some(readable) = &update.readable_name {
            validate_readable_name(readable)?;
        }
        self.store.transaction(|tx| {
            let mut pool = existing_pool(tx, machine_name)?;
            if let Some(readable_name) = update.readable_name {
                pool.readable_name = readable_name;
            }
            if let Some(active) = update.active {
                pool.active = active;
            }
            if let Some(threshold) = update.request_threshold {
                pool.request_threshold = threshold;
            }
            pool.modified_date = Utc::now();
            ensure_pool_names_free(tx, &pool, false)?;
            tx.put_pool(pool.clone())?;
            Ok(pool)
        })
    }

    /// Deactivates the pool. Its regions and history are kept.
    pub fn delete_pool(&self, machine_name: &str) -> Result<Pool> {
        self.update_pool(
            machine_name,
            PoolUpdate {
                active: Some(false),
                ..PoolUpdate::default()
            },
        )
    }

    /// Returns the pool whether active or not.
    pub fn get_pool(&self, machine_name: &str) -> Result<Pool> {
        existing_pool(self.store.as_ref(), machine_name)
    }

    pub fn list_pools(&self) -> Result<Vec<Pool>> {
        self.store.pools()
    }

    /// Copies a pool and all of its regions in one transaction. Both names
    /// of every copy get the [`COPY_SUFFIX`]; cursor state, order and flags
    /// are preserved.
    ///
    /// # Errors
    /// - [`Error::PoolNotFound`] if the source pool does not exist.
    /// - [`Error::InvalidName`] if a suffixed name is too long.
    /// - [`Error::Duplicate`] if a suffixed name is taken. Nothing is
    ///   written.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn copy_pool(&self, machine_name: &str) -> Result<PoolCopy> {
        self.store.transaction(|tx| {
            let source = existing_pool(tx, machine_name)?;
            let now = Utc::now();

            let mut pool = source.clone();
            pool.readable_name.push_str(COPY_SUFFIX);
            pool.machine_name.push_str(COPY_SUFFIX);
            pool.created_date = now;
            pool.modified_date = now;
            validate_readable_name(&pool.readable_name)?;
            validate_machine_name(&pool.machine_name)?;
            ensure_pool_names_free(tx, &pool, true)?;
            tx.put_pool(pool.clone())?;

            let mut regions = Vec::new();
            for original in tx.regions(&RegionFilter::pool(&source.machine_name))? {
                let mut region = original;
                region.readable_name.push_str(COPY_SUFFIX);
                region.machine_name.push_str(COPY_SUFFIX);
                region.pool.clone_from(&pool.machine_name);
                region.created_date = now;
                region.modified_date = now;
                validate_readable_name(&region.readable_name)?;
                validate_machine_name(&region.machine_name)?;
                ensure_region_names_free(tx, &region, true)?;
                tx.put_region(region.clone())?;
                regions.push(region);
            }

            #[cfg(feature = "tracing")]
            tracing::info!(copy = %pool.machine_name, regions = regions.len(), "pool copied");
            Ok(PoolCopy { pool, regions })
        })
    }

    // Regions

    /// Creates a sequential region.
    ///
    /// `state` defaults to `start`. An unset `order` becomes one past the
    /// highest order in the pool, or `1` for its first region.
    ///
    /// # Errors
    /// - [`Error::InvalidName`] / [`Error::Duplicate`] for bad names.
    /// - [`Error::PoolNotFound`] if the owning pool does not exist.
    /// - [`Error::Boundary`] if the range is invalid or collides with a
    ///   sibling, or `state` is out of range.
    /// - [`Error::Duplicate`] if the explicit order is taken in the pool.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(region = %new.machine_name, pool = %new.pool)))]
    pub fn create_region(&self, new: NewSequentialRegion) -> Result<SequentialRegion> {
        validate_readable_name(&new.readable_name)?;
        validate_machine_name(&new.machine_name)?;
        ensure_representable_end(new.end)?;

        self.store.transaction(|tx| {
            existing_pool(tx, &new.pool)?;
            let siblings = tx.regions(&RegionFilter::pool(&new.pool))?;

            let order = match new.order {
                Some(order) => order,
                None => siblings
                    .iter()
                    .map(|r| r.order)
                    .max()
                    .map_or(1, |max| max.saturating_add(1)),
            };
            let mut region = SequentialRegion::new(
                new.readable_name.clone(),
                new.machine_name.clone(),
                new.pool.clone(),
                order,
                new.start,
                new.end,
            );
            if let Some(state) = new.state {
                region.state = state;
            }
            if let Some(active) = new.active {
                region.active = active;
            }

            ensure_region_names_free(tx, &region, true)?;
            self.validate_region(&region, &siblings)?;
            tx.put_region(region.clone())?;
            Ok(region)
        })
    }

    /// Applies a partial update, re-running every region check.
    ///
    /// # Errors
    /// Same as [`Admin::create_region`], plus [`Error::RegionNotFound`].
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self)))]
    pub fn update_region(
        &self,
        machine_name: &str,
        update: RegionUpdate,
    ) -> Result<SequentialRegion> {
        if let Some(readable) = &update.readable_name {
            validate_readable_name(readable)?;
        }
        if let Some(end) = update.end {
            ensure_representable_end(end)?;
        }

        self.store.transaction(|tx| {
            let mut region = existing_region(tx, machine_name)?;
            if let Some(readable_name) = update.readable_name {
                region.readable_name = readable_name;
            }
            if let Some(active) = update.active {
                region.active = active;
            }
            if let Some(order) = update.order {
                region.order = order;
            }
            if let Some(start) = update.start {
                region.start = start;
            }
            if let Some(end) = update.end {
                region.end = end;
            }
            if let Some(state) = update.state {
                region.state = state;
            }
            region.modified_date = Utc::now();

            ensure_region_names_free(tx, &region, false)?;
            let siblings = tx.regions(&RegionFilter::pool(&region.pool))?;
            self.validate_region(&region, &siblings)?;
            tx.put_region(region.clone())?;
            Ok(region)
        })
    }

    /// Deactivates the region. Its range stays reserved.
    pub fn delete_region(&self, machine_name: &str) -> Result<SequentialRegion> {
        self.update_region(
            machine_name,
            RegionUpdate {
                active: Some(false),
                ..RegionUpdate::default()
            },
        )
    }

    pub fn get_region(&self, machine_name: &str) -> Result<SequentialRegion> {
        existing_region(self.store.as_ref(), machine_name)
    }

    /// Regions ordered by `(order, machine_name)`, optionally of one pool.
    pub fn list_regions(&self, pool: Option<&str>) -> Result<Vec<SequentialRegion>> {
        self.store.regions(&RegionFilter {
            pool,
            active: None,
        })
    }

    fn validate_region(
        &self,
        region: &SequentialRegion,
        siblings: &[SequentialRegion],
    ) -> Result<()> {
        boundary::validate(region, siblings, self.overlap_check)?;
        boundary::validate_state(region)?;

        let order_taken = siblings
            .iter()
            .any(|r| r.machine_name != region.machine_name && r.order == region.order);
        if order_taken {
            return Err(Error::Duplicate {
                entity: "region",
                field: "order",
                value: region.order.to_string(),
            });
        }
        Ok(())
    }

    // Response rules

    /// # Errors
    /// - [`Error::PoolNotFound`] if the pool does not exist.
    /// - [`Error::InvalidName`] if the rule name is blank.
    /// - [`Error::Duplicate`] if the pool already has a rule for the
    ///   content type.
    pub fn create_response_rule(&self, new: NewResponseRule) -> Result<ResponseRule> {
        if new.rule.trim().is_empty() {
            return Err(Error::InvalidName {
                field: "rule",
                value: new.rule,
                reason: "must not be blank",
            });
        }
        self.store.transaction(|tx| {
            existing_pool(tx, &new.pool)?;
            if tx.response_rule(&new.pool, new.content_type)?.is_some() {
                return Err(Error::Duplicate {
                    entity: "response rule",
                    field: "content_type",
                    value: new.content_type.to_string(),
                });
            }
            let rule = ResponseRule::new(new.pool.clone(), new.content_type, new.rule.clone());
            tx.put_response_rule(rule.clone())?;
            Ok(rule)
        })
    }

    /// # Errors
    /// - [`Error::ResponseRuleNotFound`] if no such rule exists.
    pub fn delete_response_rule(&self, pool: &str, content_type: ContentType) -> Result<ResponseRule> {
        self.store.transaction(|tx| {
            tx.delete_response_rule(pool, content_type)?
                .ok_or_else(|| Error::ResponseRuleNotFound {
                    pool: pool.to_owned(),
                    content_type,
                })
        })
    }

    pub fn list_response_rules(&self, pool: Option<&str>) -> Result<Vec<ResponseRule>> {
        self.store.response_rules(pool)
    }

    // Responses

    pub fn get_response(&self, id: u64) -> Result<Response> {
        self.store
            .response(id)?
            .ok_or(Error::ResponseNotFound { id })
    }

    pub fn list_responses(&self, pool: Option<&str>) -> Result<Vec<Response>> {
        self.store.responses(pool)
    }
}

fn existing_pool<R: Reader + ?Sized>(store: &R, machine_name: &str) -> Result<Pool> {
    store
        .pool(machine_name)?
        .ok_or_else(|| Error::PoolNotFound {
            machine_name: machine_name.to_owned(),
        })
}

fn existing_region<R: Reader + ?Sized>(store: &R, machine_name: &str) -> Result<SequentialRegion> {
    store
        .region(machine_name)?
        .ok_or_else(|| Error::RegionNotFound {
            machine_name: machine_name.to_owned(),
        })
}

fn ensure_representable_end(end: u64) -> Result<()> {
    if end == u64::MAX {
        return Err(Error::InvalidRequest {
            reason: format!("a region must end below {}", u64::MAX),
        });
    }
    Ok(())
}

fn ensure_pool_names_free<R: Reader + ?Sized>(tx: &R, pool: &Pool, creating: bool) -> Result<()> {
    if creating && tx.pool(&pool.machine_name)?.is_some() {
        return Err(duplicate("pool", "machine_name", &pool.machine_name));
    }
    let readable_taken = tx.pools()?.iter().any(|other| {
        other.machine_name != pool.machine_name && other.readable_name == pool.readable_name
    });
    if readable_taken {
        return Err(duplicate("pool", "readable_name", &pool.readable_name));
    }
    Ok(())
}

fn ensure_region_names_free<R: Reader + ?Sized>(
    tx: &R,
    region: &SequentialRegion,
    creating: bool,
) -> Result<()> {
    if creating && tx.region(&region.machine_name)?.is_some() {
        return Err(duplicate("region", "machine_name", &region.machine_name));
    }
    let readable_taken = tx
        .regions(&RegionFilter::default())?
        .iter()
        .any(|other| {
            other.machine_name != region.machine_name
                && other.readable_name == region.readable_name
        });
    if readable_taken {
        return Err(duplicate("region", "readable_name", &region.readable_name));
    }
    Ok(())
}

fn duplicate(entity: &'static str, field: &'static str, value: &str) -> Error {
    Error::Duplicate {
        entity,
        field,
        value: value.to_owned(),
    }
}
