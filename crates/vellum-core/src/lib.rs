//! Vellum Core
//!
//! Shared utilities for the Vellum 2D renderer: logging setup, puffin
//! profiling, hash collections and the small amount of 2D math the
//! command pipeline needs.

pub mod alloc;
pub mod geometry;
pub mod logging;
pub mod math;
pub mod profiling;
