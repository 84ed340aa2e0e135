//! Response rule escalation.
//!
//! When a [`ResponseRule`] exists for the pool and the content type a
//! client asked for, the plain response is handed to a downstream
//! [`RuleExecutor`] through a persisted [`Task`]. The executor's output
//! becomes the payload. A failure leaves the task marked
//! [`TaskStatus::Error`] and is returned to the caller; the plain numbers
//! are never served in its place.

use std::{collections::BTreeMap, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    generator::AllocationRequest,
    model::{Response, ResponseRule, Task, TaskStatus},
    rules::RequestContext,
    store::{Store, StoreExt},
};

/// Boxed error returned by executors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Value of the `source` task parameter.
pub const TASK_SOURCE: &str = "serialbox";

/// Downstream processing of an allocation.
pub trait RuleExecutor: Send + Sync {
    /// Produces the payload for `response`.
    ///
    /// `rule` is the name configured on the [`ResponseRule`] and `task`
    /// carries the request parameters.
    fn execute(&self, rule: &str, response: &Response, task: &Task) -> Result<String, BoxError>;
}

impl<F> RuleExecutor for F
where
    F: Fn(&str, &Response, &Task) -> Result<String, BoxError> + Send + Sync,
{
    fn execute(&self, rule: &str, response: &Response, task: &Task) -> Result<String, BoxError> {
        self(rule, response, task)
    }
}

/// Executors by rule name.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: BTreeMap<String, Arc<dyn RuleExecutor>>,
}

impl core::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.executors.keys()).finish()
    }
}

impl ExecutorRegistry {
    pub fn register(&mut self, rule: impl Into<String>, executor: Arc<dyn RuleExecutor>) {
        self.executors.insert(rule.into(), executor);
    }

    pub fn get(&self, rule: &str) -> Option<&Arc<dyn RuleExecutor>> {
        self.executors.get(rule)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }
}

/// The final outcome of an allocation made for a content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub response: Response,
    /// Executor output, present when a response rule processed the
    /// response.
    pub payload: Option<String>,
}

impl Allocation {
    pub const fn plain(response: Response) -> Self {
        Self {
            response,
            payload: None,
        }
    }
}

/// Builds the parameter bag of a task.
///
/// Inbound parameters come first; the fixed keys `source`, `pool`, `size`
/// and `region` are written over them.
pub fn task_parameters(
    ctx: &RequestContext,
    request: &AllocationRequest,
) -> BTreeMap<String, String> {
    let mut params = ctx.params.clone();
    params.insert("source".to_owned(), TASK_SOURCE.to_owned());
    params.insert("pool".to_owned(), request.pool.clone());
    params.insert("size".to_owned(), request.size.to_string());
    match &request.region {
        Some(region) => {
            params.insert("region".to_owned(), region.clone());
        }
        None => {
            params.remove("region");
        }
    }
    params
}

/// Runs response rules against committed responses.
pub struct Escalator {
    store: Arc<dyn Store>,
    executors: ExecutorRegistry,
}

impl core::fmt::Debug for Escalator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Escalator")
            .field("executors", &self.executors)
            .finish_non_exhaustive()
    }
}

impl Escalator {
    pub fn new(store: Arc<dyn Store>, executors: ExecutorRegistry) -> Self {
        Self { store, executors }
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Processes `response` with `rule`.
    ///
    /// The task is stored as running before the executor is invoked, so it
    /// is visible even if processing fails.
    ///
    /// # Errors
    /// - [`Error::Escalation`] if no executor is registered for the rule or
    ///   the executor fails. The task is then stored as
    ///   [`TaskStatus::Error`].
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(pool = %rule.pool, rule = %rule.rule, content_type = %rule.content_type))
    )]
    pub fn escalate(
        &self,
        ctx: &RequestContext,
        request: &AllocationRequest,
        rule: &ResponseRule,
        mut response: Response,
    ) -> Result<Allocation> {
        let mut task = Task::new(&rule.rule, task_parameters(ctx, request));
        self.store.transaction(|tx| tx.put_task(task.clone()))?;

        let outcome = match self.executors.get(&rule.rule) {
            Some(executor) => executor
                .execute(&rule.rule, &response, &task)
                .map_err(|e| e.to_string()),
            None => Err(format!("no executor registered for rule `{}`", rule.rule)),
        };

        match outcome {
            Ok(payload) => {
                task.finish(TaskStatus::Finished);
                response.task_name = Some(task.name.clone());
                response.response = Some(payload.clone());
                self.store.transaction(|tx| {
                    tx.put_task(task.clone())?;
                    tx.put_response(response.clone())
                })?;
                #[cfg(feature = "tracing")]
                tracing::info!(task = %task.name, "response rule finished");
                Ok(Allocation {
                    response,
                    payload: Some(payload),
                })
            }
            Err(reason) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(task = %task.name, %reason, "response rule failed");
                task.finish(TaskStatus::Error);
                let name = task.name.clone();
                self.store.transaction(|tx| tx.put_task(task))?;
                Err(Error::Escalation { task: name, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ContentType, ResponseType},
        store::{MemoryStore, Reader},
    };

    fn stored_response(store: &MemoryStore) -> Response {
        let mut response = Response::draft(ResponseType::Sequential, "pool", "region", 3, None);
        response.set_number_list(vec![1, 3]);
        let id = store
            .transaction(|tx| tx.insert_response(response.clone()))
            .unwrap();
        response.id = Some(id);
        response
    }

    fn count_numbers(_: &str, response: &Response, task: &Task) -> Result<String, BoxError> {
        Ok(format!(
            "{}:{}",
            task.parameter("pool").unwrap_or_default(),
            response.expand().len()
        ))
    }

    fn failing(_: &str, _: &Response, _: &Task) -> Result<String, BoxError> {
        Err("downstream unavailable".into())
    }

    #[test]
    fn parameters_prefer_fixed_keys() {
        let ctx = RequestContext::new("10.0.0.1")
            .with_param("format", "csv")
            .with_param("pool", "spoofed")
            .with_param("region", "spoofed");
        let params = task_parameters(&ctx, &AllocationRequest::new("pool", 10));

        assert_eq!(params["source"], "serialbox");
        assert_eq!(params["pool"], "pool");
        assert_eq!(params["size"], "10");
        assert_eq!(params["format"], "csv");
        assert!(!params.contains_key("region"));

        let params = task_parameters(&ctx, &AllocationRequest::new("pool", 10).region("r1"));
        assert_eq!(params["region"], "r1");
    }

    #[test]
    fn successful_executor_finishes_task() {
        let store = Arc::new(MemoryStore::new());
        let response = stored_response(&store);
        let mut executors = ExecutorRegistry::default();
        executors.register("count", Arc::new(count_numbers));
        let escalator = Escalator::new(store.clone(), executors);

        let rule = ResponseRule::new("pool", ContentType::Csv, "count");
        let allocation = escalator
            .escalate(
                &RequestContext::default(),
                &AllocationRequest::new("pool", 3),
                &rule,
                response,
            )
            .unwrap();

        assert_eq!(allocation.payload.as_deref(), Some("pool:3"));
        let task_name = allocation.response.task_name.clone().unwrap();
        let task = store.task(&task_name).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Finished);
        assert_eq!(task.parameter("source"), Some("serialbox"));

        let stored = store.response(allocation.response.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.task_name.as_deref(), Some(task_name.as_str()));
        assert_eq!(stored.response.as_deref(), Some("pool:3"));
    }

    #[test]
    fn failing_executor_marks_task_error() {
        let store = Arc::new(MemoryStore::new());
        let response = stored_response(&store);
        let mut executors = ExecutorRegistry::default();
        executors.register("broken", Arc::new(failing));
        let escalator = Escalator::new(store.clone(), executors);

        let rule = ResponseRule::new("pool", ContentType::Xml, "broken");
        let err = escalator
            .escalate(
                &RequestContext::default(),
                &AllocationRequest::new("pool", 3),
                &rule,
                response.clone(),
            )
            .unwrap_err();

        let Error::Escalation { task, reason } = &err else {
            panic!("expected escalation error, got {err:?}");
        };
        assert_eq!(reason, "downstream unavailable");
        assert_eq!(store.task(task).unwrap().unwrap().status, TaskStatus::Error);

        // The plain response is left untouched.
        let stored = store.response(response.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.task_name, None);
        assert_eq!(stored.response.as_deref(), Some("[1, 3]"));
    }

    #[test]
    fn missing_executor_is_an_escalation_failure() {
        let store = Arc::new(MemoryStore::new());
        let response = stored_response(&store);
        let escalator = Escalator::new(store.clone(), ExecutorRegistry::default());

        let rule = ResponseRule::new("pool", ContentType::Json, "unregistered");
        let err = escalator
            .escalate(
                &RequestContext::default(),
                &AllocationRequest::new("pool", 3),
                &rule,
                response,
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Escalation);
    }
}
