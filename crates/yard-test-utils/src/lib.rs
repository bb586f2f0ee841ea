//! Shared test utilities for the yard workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`yard`]: [`yard::TestYard`], several machines sharing one storage location
//! - [`files`]: small file helpers for content trees

pub mod files;
pub mod yard;

pub use yard::{Instance, TestYard};
