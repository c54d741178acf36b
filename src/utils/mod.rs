//! Utility modules for zend
//!
//! - [`path_validation`] - Safe joining of archive entry paths

pub mod path_validation;

pub use path_validation::{join_entry, validate_no_traversal};
