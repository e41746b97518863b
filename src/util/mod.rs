//! Shared utility types.
//!
//! - [`Error`] / [`Result`] - error handling for the library

mod error;

pub use error::*;
