//! The persistence contract.
//!
//! Records are addressed by primary key (machine names, response ids, task
//! names) and by simple filter predicates. All writes go through a
//! [`Transaction`] obtained from [`Store::atomic`], which commits every write
//! of the body together or none of them.
//!
//! [`MemoryStore`] is the bundled implementation.

mod memory;

pub use memory::*;

use crate::{
    Error, Result,
    model::{ContentType, Pool, Response, ResponseRule, SequentialRegion, Task},
};

/// Selects sequential regions. Unset fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionFilter<'a> {
    pub pool: Option<&'a str>,
    pub active: Option<bool>,
}

impl<'a> RegionFilter<'a> {
    pub const fn pool(pool: &'a str) -> Self {
        Self {
            pool: Some(pool),
            active: None,
        }
    }

    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn matches(&self, region: &SequentialRegion) -> bool {
        self.pool.is_none_or(|p| region.pool == p)
            && self.active.is_none_or(|a| region.active == a)
    }
}

/// Read access, available both on the store and inside a transaction.
pub trait Reader {
    fn pool(&self, machine_name: &str) -> Result<Option<Pool>>;

    /// Every pool, ordered by machine name.
    fn pools(&self) -> Result<Vec<Pool>>;

    fn region(&self, machine_name: &str) -> Result<Option<SequentialRegion>>;

    /// Matching regions ordered by `(order, machine_name)`.
    fn regions(&self, filter: &RegionFilter<'_>) -> Result<Vec<SequentialRegion>>;

    fn response(&self, id: u64) -> Result<Option<Response>>;

    /// Responses in insertion order, optionally restricted to one pool.
    fn responses(&self, pool: Option<&str>) -> Result<Vec<Response>>;

    fn response_rule(&self, pool: &str, content_type: ContentType) -> Result<Option<ResponseRule>>;

    fn response_rules(&self, pool: Option<&str>) -> Result<Vec<ResponseRule>>;

    fn task(&self, name: &str) -> Result<Option<Task>>;
}

/// Write access scoped to one atomic unit of work.
///
/// Writes are visible to later reads of the same transaction.
pub trait Transaction: Reader {
    /// Inserts or replaces a pool keyed by its machine name.
    fn put_pool(&mut self, pool: Pool) -> Result<()>;

    /// Inserts or replaces a region keyed by its machine name.
    ///
    /// The store owns [`SequentialRegion::revision`]: a new region starts at
    /// `0` and every replacement stores the previous revision plus one.
    fn put_region(&mut self, region: SequentialRegion) -> Result<()>;

    /// Stores a new response and returns its assigned id.
    fn insert_response(&mut self, response: Response) -> Result<u64>;

    /// Replaces an existing response.
    ///
    /// # Errors
    /// - [`Error::ResponseNotFound`] if `response.id` is unset or unknown.
    fn put_response(&mut self, response: Response) -> Result<()>;

    /// Inserts or replaces the rule keyed by `(pool, content_type)`.
    fn put_response_rule(&mut self, rule: ResponseRule) -> Result<()>;

    fn delete_response_rule(
        &mut self,
        pool: &str,
        content_type: ContentType,
    ) -> Result<Option<ResponseRule>>;

    fn put_task(&mut self, task: Task) -> Result<()>;
}

/// A transactional record store.
pub trait Store: Reader + Send + Sync {
    /// Runs `body` as one transaction.
    ///
    /// If `body` returns an error every write it made is discarded and the
    /// error is returned. Transactions are serializable.
    fn atomic(&self, body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>) -> Result<()>;
}

/// Convenience layer over [`Store::atomic`] for bodies that produce a value.
pub trait StoreExt: Store {
    fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T>,
    {
        let mut body = Some(body);
        let mut output = None;
        self.atomic(&mut |tx| {
            let body = body.take().ok_or_else(|| Error::Store {
                context: "transaction body invoked twice".to_owned(),
            })?;
            output = Some(body(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| Error::Store {
            context: "transaction committed without output".to_owned(),
        })
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
