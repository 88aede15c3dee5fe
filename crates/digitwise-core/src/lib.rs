//! # digitwise-core
//!
//! Shared primitives for digitwise.
//!
//! This crate provides:
//! - [`Shape`]: channel-first image and batch shapes
//! - [`Error`] / [`Result`]: the single error type used across the workspace
//! - [`bail!`]: early return with a formatted message

pub mod error;
pub mod shape;

pub use error::{Error, Result};
pub use shape::Shape;
