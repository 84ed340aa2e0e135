use std::collections::BTreeMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{Reader, RegionFilter, Store, Transaction};
use crate::{
    Error, Result,
    model::{ContentType, Pool, Response, ResponseRule, SequentialRegion, Task},
    sync::{self, RwLock},
};

#[derive(Debug, Default)]
struct Tables {
    pools: BTreeMap<String, Pool>,
    regions: BTreeMap<String, SequentialRegion>,
    responses: BTreeMap<u64, Response>,
    next_response_id: u64,
    response_rules: BTreeMap<(String, ContentType), ResponseRule>,
    tasks: BTreeMap<String, Task>,
}

impl Reader for Tables {
    fn pool(&self, machine_name: &str) -> Result<Option<Pool>> {
        Ok(self.pools.get(machine_name).cloned())
    }

    fn pools(&self) -> Result<Vec<Pool>> {
        Ok(self.pools.values().cloned().collect())
    }

    fn region(&self, machine_name: &str) -> Result<Option<SequentialRegion>> {
        Ok(self.regions.get(machine_name).cloned())
    }

    fn regions(&self, filter: &RegionFilter<'_>) -> Result<Vec<SequentialRegion>> {
        let mut regions: Vec<_> = self
            .regions
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        regions.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.machine_name.cmp(&b.machine_name))
        });
        Ok(regions)
    }

    fn response(&self, id: u64) -> Result<Option<Response>> {
        Ok(self.responses.get(&id).cloned())
    }

    fn responses(&self, pool: Option<&str>) -> Result<Vec<Response>> {
        Ok(self
            .responses
            .values()
            .filter(|r| pool.is_none_or(|p| r.pool == p))
            .cloned()
            .collect())
    }

    fn response_rule(&self, pool: &str, content_type: ContentType) -> Result<Option<ResponseRule>> {
        Ok(self
            .response_rules
            .get(&(pool.to_owned(), content_type))
            .cloned())
    }

    fn response_rules(&self, pool: Option<&str>) -> Result<Vec<ResponseRule>> {
        Ok(self
            .response_rules
            .values()
            .filter(|r| pool.is_none_or(|p| r.pool == p))
            .cloned()
            .collect())
    }

    fn task(&self, name: &str) -> Result<Option<Task>> {
        Ok(self.tasks.get(name).cloned())
    }
}

/// The previous value of every record a transaction touched.
#[derive(Debug)]
enum Undo {
    Pool(String, Option<Pool>),
    Region(String, Option<SequentialRegion>),
    Response(u64, Option<Response>),
    NextResponseId(u64),
    ResponseRule((String, ContentType), Option<ResponseRule>),
    Task(String, Option<Task>),
}

/// An in-memory [`Store`].
///
/// Transactions take the table write lock for their whole duration, so they
/// are serialized against each other and against readers. Rollback replays
/// an undo log in reverse.
///
/// # Example
/// ```
/// use serialbox::{
///     model::Pool,
///     store::{MemoryStore, Reader, StoreExt},
/// };
///
/// let store = MemoryStore::new();
/// store
///     .transaction(|tx| tx.put_pool(Pool::new("Pool One", "pool-1")))
///     .unwrap();
///
/// assert!(store.pool("pool-1").unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

macro_rules! read_through {
    ($($name:ident($($arg:ident: $ty:ty),*) -> $out:ty;)*) => {
        $(
            fn $name(&self, $($arg: $ty),*) -> Result<$out> {
                sync::read(&self.tables)?.$name($($arg),*)
            }
        )*
    };
}

impl Reader for MemoryStore {
    read_through! {
        pool(machine_name: &str) -> Option<Pool>;
        pools() -> Vec<Pool>;
        region(machine_name: &str) -> Option<SequentialRegion>;
        regions(filter: &RegionFilter<'_>) -> Vec<SequentialRegion>;
        response(id: u64) -> Option<Response>;
        responses(pool: Option<&str>) -> Vec<Response>;
        response_rule(pool: &str, content_type: ContentType) -> Option<ResponseRule>;
        response_rules(pool: Option<&str>) -> Vec<ResponseRule>;
        task(name: &str) -> Option<Task>;
    }
}

impl Store for MemoryStore {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
    fn atomic(&self, body: &mut dyn FnMut(&mut dyn Transaction) -> Result<()>) -> Result<()> {
        let mut tables = sync::write(&self.tables)?;
        let mut tx = MemoryTransaction {
            tables: &mut *tables,
            undo: Vec::new(),
            committed: false,
        };
        body(&mut tx)?;
        tx.committed = true;
        Ok(())
    }
}

struct MemoryTransaction<'a> {
    tables: &'a mut Tables,
    undo: Vec<Undo>,
    committed: bool,
}

impl MemoryTransaction<'_> {
    fn rollback(&mut self) {
        #[cfg(feature = "tracing")]
        if !self.undo.is_empty() {
            tracing::debug!(writes = self.undo.len(), "rolling back transaction");
        }
        while let Some(undo) = self.undo.pop() {
            let tables = &mut *self.tables;
            match undo {
                Undo::Pool(key, prev) => restore(&mut tables.pools, key, prev),
                Undo::Region(key, prev) => restore(&mut tables.regions, key, prev),
                Undo::Response(key, prev) => restore(&mut tables.responses, key, prev),
                Undo::NextResponseId(id) => tables.next_response_id = id,
                Undo::ResponseRule(key, prev) => restore(&mut tables.response_rules, key, prev),
                Undo::Task(key, prev) => restore(&mut tables.tasks, key, prev),
            }
        }
    }
}

fn restore<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, prev: Option<V>) {
    match prev {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl Reader for MemoryTransaction<'_> {
    fn pool(&self, machine_name: &str) -> Result<Option<Pool>> {
        self.tables.pool(machine_name)
    }

    fn pools(&self) -> Result<Vec<Pool>> {
        self.tables.pools()
    }

    fn region(&self, machine_name: &str) -> Result<Option<SequentialRegion>> {
        self.tables.region(machine_name)
    }

    fn regions(&self, filter: &RegionFilter<'_>) -> Result<Vec<SequentialRegion>> {
        self.tables.regions(filter)
    }

    fn response(&self, id: u64) -> Result<Option<Response>> {
        self.tables.response(id)
    }

    fn responses(&self, pool: Option<&str>) -> Result<Vec<Response>> {
        self.tables.responses(pool)
    }

    fn response_rule(&self, pool: &str, content_type: ContentType) -> Result<Option<ResponseRule>> {
        self.tables.response_rule(pool, content_type)
    }

    fn response_rules(&self, pool: Option<&str>) -> Result<Vec<ResponseRule>> {
        self.tables.response_rules(pool)
    }

    fn task(&self, name: &str) -> Result<Option<Task>> {
        self.tables.task(name)
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn put_pool(&mut self, pool: Pool) -> Result<()> {
        let key = pool.machine_name.clone();
        let prev = self.tables.pools.insert(key.clone(), pool);
        self.undo.push(Undo::Pool(key, prev));
        Ok(())
    }

    fn put_region(&mut self, mut region: SequentialRegion) -> Result<()> {
        let key = region.machine_name.clone();
        region.revision = self
            .tables
            .regions
            .get(&key)
            .map_or(0, |prev| prev.revision.wrapping_add(1));
        let prev = self.tables.regions.insert(key.clone(), region);
        self.undo.push(Undo::Region(key, prev));
        Ok(())
    }

    fn insert_response(&mut self, mut response: Response) -> Result<u64> {
        let id = self.tables.next_response_id.wrapping_add(1);
        self.undo
            .push(Undo::NextResponseId(self.tables.next_response_id));
        self.tables.next_response_id = id;
        response.id = Some(id);
        let prev = self.tables.responses.insert(id, response);
        self.undo.push(Undo::Response(id, prev));
        Ok(id)
    }

    fn put_response(&mut self, response: Response) -> Result<()> {
        let id = response
            .id
            .filter(|id| self.tables.responses.contains_key(id))
            .ok_or(Error::ResponseNotFound {
                id: response.id.unwrap_or_default(),
            })?;
        let prev = self.tables.responses.insert(id, response);
        self.undo.push(Undo::Response(id, prev));
        Ok(())
    }

    fn put_response_rule(&mut self, rule: ResponseRule) -> Result<()> {
        let key = (rule.pool.clone(), rule.content_type);
        let prev = self.tables.response_rules.insert(key.clone(), rule);
        self.undo.push(Undo::ResponseRule(key, prev));
        Ok(())
    }

    fn delete_response_rule(
        &mut self,
        pool: &str,
        content_type: ContentType,
    ) -> Result<Option<ResponseRule>> {
        let key = (pool.to_owned(), content_type);
        let prev = self.tables.response_rules.remove(&key);
        if prev.is_some() {
            self.undo.push(Undo::ResponseRule(key, prev.clone()));
        }
        Ok(prev)
    }

    fn put_task(&mut self, task: Task) -> Result<()> {
        let key = task.name.clone();
        let prev = self.tables.tasks.insert(key.clone(), task);
        self.undo.push(Undo::Task(key, prev));
        Ok(())
    }
}
