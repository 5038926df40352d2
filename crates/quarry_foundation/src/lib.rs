//! Core handle and error types for Quarry.
//!
//! This crate provides:
//! - [`Entity`] - Generational entity handles
//! - [`Error`] - Rich error types with context
//! - [`Result`] - Result alias used across every layer

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod entity;
mod error;

pub use entity::Entity;
pub use error::{Error, ErrorContext, ErrorKind, Result};
