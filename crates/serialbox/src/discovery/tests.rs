use std::sync::Arc;

use super::*;
use crate::{
    model::{Region, SequentialRegion},
    store::{MemoryStore, Reader, StoreExt},
    test_support::{LIST_KIND, ListVariant},
};

fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .transaction(|tx| {
            tx.put_region(SequentialRegion::new("Two", "two", "pool", 2, 101, 200))?;
            tx.put_region(SequentialRegion::new("One", "one", "pool", 1, 1, 100).with_state(51))?;
            tx.put_region(SequentialRegion::new("Off", "off", "pool", 0, 201, 300).with_active(false))?;
            tx.put_region(SequentialRegion::new("Other", "other", "elsewhere", 0, 1, 10))
        })
        .unwrap();
    store
}

fn names(regions: &[RegionRef]) -> Vec<&str> {
    regions.iter().map(|r| r.machine_name()).collect()
}

#[test]
fn regions_for_pool_filters_and_orders() {
    let discovery = Discovery::new(seeded(), RegionRegistry::default());

    let active = discovery.regions_for_pool("pool", true).unwrap();
    assert_eq!(names(&active), ["one", "two"]);

    let all = discovery.regions_for_pool("pool", false).unwrap();
    assert_eq!(names(&all), ["off", "one", "two"]);

    assert!(discovery.regions_for_pool("missing", true).unwrap().is_empty());
}

#[test]
fn total_remaining_counts_active_regions_only() {
    let discovery = Discovery::new(seeded(), RegionRegistry::default());
    assert_eq!(discovery.total_remaining("pool").unwrap(), 50 + 100);
    // Read-only: asking again gives the same answer.
    assert_eq!(discovery.total_remaining("pool").unwrap(), 150);
    assert_eq!(discovery.total_remaining("missing").unwrap(), 0);
}

#[test]
fn select_region_prefers_lowest_order() {
    let discovery = Discovery::new(seeded(), RegionRegistry::default());
    let region = discovery.select_region("pool").unwrap();
    assert_eq!(region.machine_name(), "one");
    assert_eq!(region.as_sequential().map(|r| r.state), Some(51));
}

#[test]
fn select_region_skips_drained_regions() {
    let store = seeded();
    store
        .transaction(|tx| {
            let drained = tx.region("one")?.unwrap().with_state(101);
            tx.put_region(drained)
        })
        .unwrap();
    let discovery = Discovery::new(store, RegionRegistry::default());
    assert_eq!(discovery.select_region("pool").unwrap().machine_name(), "two");
}

#[test]
fn no_active_region() {
    let discovery = Discovery::new(seeded(), RegionRegistry::default());
    assert_eq!(
        discovery.select_region("missing").unwrap_err(),
        Error::NoActiveRegion {
            pool: "missing".into()
        }
    );
}

#[test]
fn variants_are_searched_together() {
    let list = ListVariant::default();
    list.add("listed", "pool", 0, vec![7, 3, 9]);

    let mut registry = RegionRegistry::default();
    registry.register(Arc::new(list)).unwrap();
    let discovery = Discovery::new(seeded(), registry);

    assert_eq!(
        discovery.all_region_types().into_iter().collect::<Vec<_>>(),
        [LIST_KIND, SEQUENTIAL_KIND]
    );
    assert_eq!(discovery.total_remaining("pool").unwrap(), 153);
    let all = discovery.regions_for_pool("pool", true).unwrap();
    assert_eq!(names(&all), ["one", "two", "listed"]);

    let selected = discovery.select_region("pool").unwrap();
    assert_eq!(selected.kind(), LIST_KIND);
    assert!(discovery.find_region("listed").unwrap().is_some());
    assert!(discovery.find_region("two").unwrap().is_some());
    assert!(discovery.find_region("nope").unwrap().is_none());
}

#[test]
fn duplicate_variant_kind_is_rejected() {
    let mut registry = RegionRegistry::default();
    assert!(matches!(
        registry.register(Arc::new(SequentialVariant)),
        Err(Error::Duplicate { .. })
    ));
}
