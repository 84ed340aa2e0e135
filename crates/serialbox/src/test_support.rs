//! Fixtures shared by unit tests: a list-flavored region variant with its
//! generator, and helpers to seed pools and regions.

use std::sync::{Arc, Mutex};

use crate::{
    AllocationRequest, Generator, RequestContext, Result, SerialBox, SerialBoxBuilder,
    discovery::{Discovery, RegionVariant},
    generator::active_pool,
    model::{NewPool, NewSequentialRegion, Region, RegionRef, Response, ResponseType},
    rules::RulePipeline,
    store::Store,
};

pub const LIST_KIND: &str = "list";

/// A region handing out an explicit list of numbers, front first.
#[derive(Clone, Debug)]
pub struct ListRegion {
    pub machine_name: String,
    pub pool: String,
    pub order: i64,
    pub active: bool,
    pub numbers: Vec<u64>,
}

impl Region for ListRegion {
    fn kind(&self) -> &str {
        LIST_KIND
    }

    fn readable_name(&self) -> &str {
        &self.machine_name
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
        self.numbers.len() as u64
    }
}

/// Keeps its regions outside the store.
#[derive(Clone, Debug, Default)]
pub struct ListVariant {
    pub regions: Arc<Mutex<Vec<ListRegion>>>,
}

impl ListVariant {
    pub fn add(&self, machine_name: &str, pool: &str, order: i64, numbers: Vec<u64>) {
        self.regions.lock().unwrap().push(ListRegion {
            machine_name: machine_name.to_owned(),
            pool: pool.to_owned(),
            order,
            active: true,
            numbers,
        });
    }
}

impl RegionVariant for ListVariant {
    fn kind(&self) -> &str {
        LIST_KIND
    }

    fn list_for_pool(
        &self,
        _store: &dyn Store,
        pool: &str,
        only_active: bool,
    ) -> Result<Vec<RegionRef>> {
        let mut regions: Vec<_> = self
            .regions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.pool == pool && (!only_active || r.active))
            .cloned()
            .collect();
        regions.sort_by_key(|r| r.order);
        Ok(regions
            .into_iter()
            .map(|r| Arc::new(r) as RegionRef)
            .collect())
    }

    fn lookup(&self, _store: &dyn Store, machine_name: &str) -> Result<Option<RegionRef>> {
        Ok(self
            .regions
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.machine_name == machine_name)
            .cloned()
            .map(|r| Arc::new(r) as RegionRef))
    }
}

/// Pops numbers off the lowest-order list region. Responses are not
/// persisted.
pub struct ListGenerator {
    pub variant: ListVariant,
    pub discovery: Arc<Discovery>,
    pub rules: RulePipeline,
}

impl ListGenerator {
    pub const NAME: &'static str = "tests::ListGenerator";
}

impl Generator for ListGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn get_response(&self, ctx: &RequestContext, request: &AllocationRequest) -> Result<Response> {
        let pool = active_pool(self.discovery.store().as_ref(), &request.pool)?;
        let mut regions = self.variant.regions.lock().unwrap();
        let region = regions
            .iter_mut()
            .filter(|r| r.pool == pool.machine_name && r.active)
            .min_by_key(|r| r.order)
            .unwrap();
        self.rules.run_pre(ctx, &pool, &*region, request.size)?;

        let take = usize::try_from(request.size)
            .unwrap()
            .min(region.numbers.len());
        let numbers: Vec<u64> = region.numbers.drain(..take).collect();
        let mut response = Response::draft(
            ResponseType::List,
            &pool.machine_name,
            &region.machine_name,
            numbers.len() as u64,
            ctx.remote_host.clone(),
        );
        response.fulfilled = numbers.len() as u64 == request.size;
        response.set_number_list(numbers);
        Ok(response)
    }
}

/// A builder with the list variant registered.
pub fn with_list_variant(builder: SerialBoxBuilder, variant: &ListVariant) -> SerialBoxBuilder {
    let generator_variant = variant.clone();
    builder.variant(Arc::new(variant.clone()), move |deps| {
        Ok(Arc::new(ListGenerator {
            variant: generator_variant,
            discovery: Arc::clone(&deps.discovery),
            rules: deps.pipeline(ListGenerator::NAME)?,
        }) as Arc<dyn Generator>)
    })
}

pub fn add_pool(serialbox: &SerialBox, machine_name: &str, request_threshold: u64) {
    serialbox
        .admin()
        .create_pool(NewPool::new(machine_name, machine_name).request_threshold(request_threshold))
        .unwrap();
}

pub fn add_region(serialbox: &SerialBox, machine_name: &str, pool: &str, start: u64, end: u64) {
    serialbox
        .admin()
        .create_region(NewSequentialRegion::new(
            machine_name,
            machine_name,
            pool,
            start,
            end,
        ))
        .unwrap();
}

/// A default in-memory instance with pool `utpool1` and region `utreg1`
/// covering `[1, 100]`.
pub fn single_region() -> SerialBox {
    let serialbox = SerialBox::in_memory().unwrap();
    add_pool(&serialbox, "utpool1", 0);
    add_region(&serialbox, "utreg1", "utpool1", 1, 100);
    serialbox
}
