//! Core domain and application logic for the Telegram channel feed service.
//!
//! This crate is framework-agnostic. Telegram and HTTP live behind ports
//! (traits) and adapter crates; everything here is testable with in-memory fakes.

pub mod config;
pub mod domain;
pub mod errors;
pub mod feed;
pub mod formatting;
pub mod logging;
pub mod ports;
pub mod scan;
pub mod service;
pub mod worker;

#[cfg(test)]
mod testing;

pub use errors::{Error, Result};
