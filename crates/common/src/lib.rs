//! This crate provides the small pieces of shared functionality that the other crates in the
//! workspace build on: deadline-bounded polling with cancellation and directory helpers.

pub mod fs;
pub mod polling;
