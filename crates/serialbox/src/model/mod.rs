//! Entities shared by every part of the allocation system.
//!
//! - [`Pool`] - a named allocation target made of regions.
//! - [`Region`] / [`SequentialRegion`] - a bounded numeric range with a
//!   cursor.
//! - [`Response`] - the record of one allocation outcome.
//! - [`ResponseRule`] - a `(pool, content type)` mapping to a downstream
//!   rule.
//! - [`Task`] - the work item handed to a downstream rule.

mod names;
mod pool;
mod region;
mod response;
mod response_rule;
mod task;

pub use names::*;
pub use pool::*;
pub use region::*;
pub use response::*;
pub use response_rule::*;
pub use task::*;
