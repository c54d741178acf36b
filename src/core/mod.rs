//! Core types and error handling for zend
//!
//! This module holds the error taxonomy shared by every component of the
//! daemon. See [`error`] for the variants and how they propagate.

pub mod error;

pub use error::{ErrorContext, ResolutionFailure, ZenError, user_friendly_error};
