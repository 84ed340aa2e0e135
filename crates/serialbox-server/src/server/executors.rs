//! Response rule executors shipped with the server.

use std::{fmt::Write, sync::Arc};

use serialbox::{
    SerialBoxBuilder,
    escalation::{BoxError, RuleExecutor},
    model::{Response, Task},
};

pub const EXPAND: &str = "expand";

/// Largest block [`Expand`] lists unless configured otherwise.
pub const DEFAULT_EXPAND_LIMIT: u64 = 100_000;

/// Lists every number of the granted block, one per line.
///
/// Blocks larger than `limit` are refused before anything is rendered.
#[derive(Clone, Copy, Debug)]
pub struct Expand {
    pub limit: u64,
}

impl RuleExecutor for Expand {
    fn execute(&self, _rule: &str, response: &Response, _task: &Task) -> Result<String, BoxError> {
        if response.size_granted > self.limit {
            return Err(format!(
                "block of {} numbers exceeds the expand limit of {}",
                response.size_granted, self.limit
            )
            .into());
        }

        let mut numbers = response.expanded();
        let Some(first) = numbers.next() else {
            return Err(format!("response {:?} carries no numbers", response.id).into());
        };
        let mut out = first.to_string();
        for number in numbers {
            write!(out, "\n{number}")?;
        }
        Ok(out)
    }
}

pub fn register(builder: SerialBoxBuilder, expand_limit: u64) -> SerialBoxBuilder {
    builder.executor(EXPAND, Arc::new(Expand { limit: expand_limit }))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use serialbox::{
        AllocationRequest, Error, RequestContext, SerialBox,
        model::{ContentType, NewPool, NewResponseRule, NewSequentialRegion, ResponseType, TaskStatus},
        store::Reader,
    };

    fn expand(response: &Response) -> Result<String, BoxError> {
        let task = Task::new(EXPAND, BTreeMap::new());
        Expand { limit: 10 }.execute(EXPAND, response, &task)
    }

    #[test]
    fn expand_enumerates_the_block() {
        let mut response = Response::draft(ResponseType::Sequential, "pool", "region", 4, None);
        response.set_number_list(vec![7, 10]);
        assert_eq!(expand(&response).unwrap(), "7\n8\n9\n10");

        response.size_granted = 1;
        response.set_number_list(vec![7]);
        assert_eq!(expand(&response).unwrap(), "7");
    }

    #[test]
    fn expand_rejects_empty_response() {
        let response = Response::draft(ResponseType::Sequential, "pool", "region", 4, None);
        assert!(expand(&response).is_err());
    }

    #[test]
    fn expand_refuses_blocks_over_the_limit() {
        let mut response =
            Response::draft(ResponseType::Sequential, "pool", "region", 20_000_000, None);
        response.set_number_list(vec![1, 20_000_000]);
        let err = expand(&response).unwrap_err();
        assert!(err.to_string().contains("expand limit of 10"));
    }

    #[test]
    fn oversized_allocation_fails_the_task() {
        let serialbox = register(SerialBox::builder(), 10).build().unwrap();
        let admin = serialbox.admin();
        admin
            .create_pool(NewPool::new("Unlimited", "unlimited").request_threshold(0))
            .unwrap();
        admin
            .create_region(NewSequentialRegion::new(
                "Huge", "huge", "unlimited", 1, 1_000_000,
            ))
            .unwrap();
        admin
            .create_response_rule(NewResponseRule {
                pool: "unlimited".into(),
                content_type: ContentType::Csv,
                rule: EXPAND.into(),
            })
            .unwrap();

        let request = AllocationRequest::new("unlimited", 11);
        let err = serialbox
            .allocate_for(&RequestContext::default(), &request, ContentType::Csv)
            .unwrap_err();
        let (task, reason) = match err {
            Error::Escalation { task, reason } => (task, reason),
            other => panic!("expected an escalation error, got {other:?}"),
        };
        assert!(reason.contains("expand limit"));
        let task = serialbox.store().task(&task).unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Error);

        let request = AllocationRequest::new("unlimited", 10);
        let allocation = serialbox
            .allocate_for(&RequestContext::default(), &request, ContentType::Csv)
            .unwrap();
        assert_eq!(allocation.payload.unwrap().lines().count(), 10);
    }
}
