//! HTTP front end of the allocation service.
//!
//! ## Structure
//!
//! - [`config`] - command line and environment settings.
//! - [`handlers`] - request handlers over a shared [`serialbox::SerialBox`].
//! - [`routes`] - the axum router.
//! - [`error`] - mapping of library errors onto HTTP responses.
//! - [`seed`] - startup fixtures.
//! - [`executors`] - response rule executors.
//! - [`telemetry`] - log output, OpenTelemetry tracing and metrics.

pub mod config;
pub mod error;
pub mod executors;
pub mod handlers;
pub mod routes;
pub mod seed;
pub mod telemetry;
