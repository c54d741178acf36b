//! Integration test suite for zend
//!
//! End-to-end tests that drive the release client against a local HTTP
//! server, run full reconciliation cycles against real processes, and run the
//! `zend` binary itself.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: The `zend` binary (`path`, `run --once`, settings errors)
//! - **github_client**: Release lookup and asset download over HTTP
//! - **reconcile**: Full cycles from setup document to running process
//! - **shutdown**: SIGTERM/SIGINT to a running `zend run` stops every app
//!
//! Tests that spawn processes or use POSIX shells only run on Unix.

mod cli;
mod github_client;
#[cfg(unix)]
mod reconcile;
#[cfg(unix)]
mod shutdown;
