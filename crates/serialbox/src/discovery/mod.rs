//! Region discovery: which regions serve a pool, how much they have left,
//! and which one is next in line.
//!
//! Region flavors are registered explicitly in a [`RegionRegistry`]. Every
//! query fans out over the registered [`RegionVariant`]s in registration
//! order.

#[cfg(test)]
mod tests;

use std::{collections::BTreeSet, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    model::{RegionRef, SEQUENTIAL_KIND},
    store::{Reader, RegionFilter, Store},
};

/// One region flavor as seen by discovery.
pub trait RegionVariant: Send + Sync {
    /// The kind tag reported by every region of this variant.
    fn kind(&self) -> &str;

    /// Regions of `pool` ordered by `order` ascending.
    fn list_for_pool(
        &self,
        store: &dyn Store,
        pool: &str,
        only_active: bool,
    ) -> Result<Vec<RegionRef>>;

    /// Looks a region of this variant up by machine name.
    fn lookup(&self, store: &dyn Store, machine_name: &str) -> Result<Option<RegionRef>>;

    /// Numbers left across the active regions of `pool`.
    fn total_remaining_contribution(&self, store: &dyn Store, pool: &str) -> Result<u64> {
        Ok(self
            .list_for_pool(store, pool, true)?
            .iter()
            .fold(0, |acc, r| acc.saturating_add(r.remaining())))
    }

    /// The active region of `pool` with the lowest order that still holds
    /// numbers, if any.
    fn select_candidate(&self, store: &dyn Store, pool: &str) -> Result<Option<RegionRef>> {
        Ok(self
            .list_for_pool(store, pool, true)?
            .into_iter()
            .filter(|r| r.remaining() > 0)
            .min_by_key(|r| r.order()))
    }
}

/// [`SequentialRegion`](crate::model::SequentialRegion)s held by the store.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialVariant;

impl RegionVariant for SequentialVariant {
    fn kind(&self) -> &str {
        SEQUENTIAL_KIND
    }

    fn list_for_pool(
        &self,
        store: &dyn Store,
        pool: &str,
        only_active: bool,
    ) -> Result<Vec<RegionRef>> {
        let mut filter = RegionFilter::pool(pool);
        if only_active {
            filter = filter.active(true);
        }
        Ok(store
            .regions(&filter)?
            .into_iter()
            .map(|r| r.into_ref())
            .collect())
    }

    fn lookup(&self, store: &dyn Store, machine_name: &str) -> Result<Option<RegionRef>> {
        Ok(store.region(machine_name)?.map(|r| r.into_ref()))
    }
}

/// The set of region variants known to the system.
#[derive(Clone)]
pub struct RegionRegistry {
    variants: Vec<Arc<dyn RegionVariant>>,
}

impl Default for RegionRegistry {
    /// A registry holding only [`SequentialVariant`].
    fn default() -> Self {
        Self {
            variants: vec![Arc::new(SequentialVariant)],
        }
    }
}

impl core::fmt::Debug for RegionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.variants.iter().map(|v| v.kind()))
            .finish()
    }
}

impl RegionRegistry {
    /// A registry without any variant.
    pub fn empty() -> Self {
        Self {
            variants: Vec::new(),
        }
    }

    /// Adds a variant after the ones already registered.
    ///
    /// # Errors
    /// - [`Error::Duplicate`] if a variant with the same kind exists.
    pub fn register(&mut self, variant: Arc<dyn RegionVariant>) -> Result<()> {
        if self.get(variant.kind()).is_some() {
            return Err(Error::Duplicate {
                entity: "region variant",
                field: "kind",
                value: variant.kind().to_owned(),
            });
        }
        self.variants.push(variant);
        Ok(())
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn RegionVariant>> {
        self.variants.iter().find(|v| v.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RegionVariant>> {
        self.variants.iter()
    }
}

/// Read-only region queries over a store.
///
/// None of these calls mutate anything; repeating one without an
/// intervening allocation returns the same answer.
pub struct Discovery {
    store: Arc<dyn Store>,
    registry: RegionRegistry,
}

impl core::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Discovery")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Discovery {
    pub fn new(store: Arc<dyn Store>, registry: RegionRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    /// Kind tags of every registered region variant.
    pub fn all_region_types(&self) -> BTreeSet<&str> {
        self.registry.iter().map(|v| v.kind()).collect()
    }

    /// Regions of `pool` across all variants. Each variant's regions are
    /// ordered by `order`; variants follow registration order.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn regions_for_pool(&self, pool: &str, only_active: bool) -> Result<Vec<RegionRef>> {
        let mut regions = Vec::new();
        for variant in self.registry.iter() {
            regions.extend(variant.list_for_pool(self.store.as_ref(), pool, only_active)?);
        }
        Ok(regions)
    }

    /// Sum of `remaining` over the active regions of `pool`, saturating at
    /// `u64::MAX`.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), ret))]
    pub fn total_remaining(&self, pool: &str) -> Result<u64> {
        self.registry.iter().try_fold(0u64, |acc, variant| {
            Ok(acc.saturating_add(variant.total_remaining_contribution(self.store.as_ref(), pool)?))
        })
    }

    /// The active region of `pool` with the minimum order across every
    /// variant. On a tie the earlier registered variant wins.
    ///
    /// # Errors
    /// - [`Error::NoActiveRegion`] if no variant has a candidate.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn select_region(&self, pool: &str) -> Result<RegionRef> {
        let mut selected: Option<RegionRef> = None;
        for variant in self.registry.iter() {
            if let Some(candidate) = variant.select_candidate(self.store.as_ref(), pool)? {
                if selected
                    .as_ref()
                    .is_none_or(|current| candidate.order() < current.order())
                {
                    selected = Some(candidate);
                }
            }
        }

        let region = selected.ok_or_else(|| Error::NoActiveRegion {
            pool: pool.to_owned(),
        })?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            region = region.machine_name(),
            kind = region.kind(),
            order = region.order(),
            remaining = region.remaining(),
            "selected region"
        );
        Ok(region)
    }

    /// Finds a region of any variant by machine name.
    pub fn find_region(&self, machine_name: &str) -> Result<Option<RegionRef>> {
        for variant in self.registry.iter() {
            if let Some(region) = variant.lookup(self.store.as_ref(), machine_name)? {
                return Ok(Some(region));
            }
        }
        Ok(None)
    }
}
