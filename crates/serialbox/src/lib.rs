#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod admin;
pub mod boundary;
mod config;
pub mod discovery;
mod error;
pub mod escalation;
pub mod generator;
pub mod model;
pub mod rules;
mod service;
pub mod store;
mod sync;
#[cfg(test)]
mod test_support;

pub use crate::admin::{Admin, PoolCopy};
pub use crate::boundary::OverlapCheck;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::escalation::Allocation;
pub use crate::generator::{AllocationRequest, Generator};
pub use crate::rules::RequestContext;
pub use crate::service::*;
