#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub(crate) mod api;
pub mod app;
pub mod cache;
pub mod clients;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod util;
