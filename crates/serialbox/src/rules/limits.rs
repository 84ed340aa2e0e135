use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{PreRule, RequestContext};
use crate::{
    Result, RuleError,
    discovery::Discovery,
    model::{Pool, Region},
};

/// Rejects requests against an inactive pool or region.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActiveRule;

impl ActiveRule {
    pub const NAME: &'static str = "active";
}

impl PreRule for ActiveRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(
        &self,
        _ctx: &RequestContext,
        pool: &Pool,
        region: &dyn Region,
        _size: u64,
    ) -> Result<()> {
        if pool.active && region.active() {
            return Ok(());
        }
        Err(RuleError::Inactive {
            pool: pool.machine_name.clone(),
            region: region.machine_name().to_owned(),
        }
        .into())
    }
}

/// Rejects requests larger than what every active region of the pool holds
/// together. A request that fits the pool but not the selected region is
/// let through and partially fulfilled.
///
/// The pool total is read without a lock; see
/// [`SequentialGenerator`](crate::generator::SequentialGenerator) for what a
/// concurrent grant from a sibling region does to it.
#[derive(Clone, Debug)]
pub struct SizeLimitRule {
    discovery: Arc<Discovery>,
}

impl SizeLimitRule {
    pub const NAME: &'static str = "size-limit";

    pub fn new(discovery: Arc<Discovery>) -> Self {
        Self { discovery }
    }
}

impl PreRule for SizeLimitRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(pool = %pool.machine_name, size))
    )]
    fn execute(
        &self,
        _ctx: &RequestContext,
        pool: &Pool,
        _region: &dyn Region,
        size: u64,
    ) -> Result<()> {
        let remaining = self.discovery.total_remaining(&pool.machine_name)?;
        if size > remaining {
            return Err(RuleError::SizeLimit {
                pool: pool.machine_name.clone(),
                size,
                remaining,
            }
            .into());
        }
        Ok(())
    }
}

/// Rejects requests above the pool's non-zero `request_threshold`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestThresholdLimitRule;

impl RequestThresholdLimitRule {
    pub const NAME: &'static str = "request-threshold-limit";
}

impl PreRule for RequestThresholdLimitRule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn execute(
        &self,
        _ctx: &RequestContext,
        pool: &Pool,
        _region: &dyn Region,
        size: u64,
    ) -> Result<()> {
        if pool.exceeds_threshold(size) {
            return Err(RuleError::Threshold {
                threshold: pool.request_threshold,
                size,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        discovery::RegionRegistry,
        model::SequentialRegion,
        store::{MemoryStore, StoreExt},
    };

    fn ctx() -> RequestContext {
        RequestContext::new("127.0.0.1")
    }

    #[test]
    fn active_rule_checks_pool_and_region() {
        let pool = Pool::new("Pool", "pool");
        let region = SequentialRegion::new("R", "r", "pool", 1, 1, 10);
        assert!(ActiveRule.execute(&ctx(), &pool, &region, 1).is_ok());

        let inactive_region = region.clone().with_active(false);
        assert_eq!(
            ActiveRule.execute(&ctx(), &pool, &inactive_region, 1),
            Err(Error::Rule(RuleError::Inactive {
                pool: "pool".into(),
                region: "r".into(),
            }))
        );

        let mut inactive_pool = pool;
        inactive_pool.active = false;
        assert!(ActiveRule.execute(&ctx(), &inactive_pool, &region, 1).is_err());
    }

    #[test]
    fn threshold_rule() {
        let pool = Pool::new("Pool", "pool").with_request_threshold(100);
        let region = SequentialRegion::new("R", "r", "pool", 1, 1, 1000);
        assert!(RequestThresholdLimitRule.execute(&ctx(), &pool, &region, 100).is_ok());
        assert_eq!(
            RequestThresholdLimitRule.execute(&ctx(), &pool, &region, 200),
            Err(Error::Rule(RuleError::Threshold {
                threshold: 100,
                size: 200,
            }))
        );
    }

    #[test]
    fn size_limit_spans_every_active_region() {
        let store = Arc::new(MemoryStore::new());
        store
            .transaction(|tx| {
                tx.put_region(SequentialRegion::new("A", "a", "pool", 1, 1, 100))?;
                tx.put_region(SequentialRegion::new("B", "b", "pool", 2, 101, 200))?;
                tx.put_region(SequentialRegion::new("C", "c", "pool", 3, 201, 300).with_active(false))
            })
            .unwrap();
        let discovery = Arc::new(Discovery::new(store, RegionRegistry::default()));
        let rule = SizeLimitRule::new(discovery);

        let pool = Pool::new("Pool", "pool");
        let region = SequentialRegion::new("A", "a", "pool", 1, 1, 100);
        assert!(rule.execute(&ctx(), &pool, &region, 200).is_ok());
        assert_eq!(
            rule.execute(&ctx(), &pool, &region, 201),
            Err(Error::Rule(RuleError::SizeLimit {
                pool: "pool".into(),
                size: 201,
                remaining: 200,
            }))
        );
    }
}
