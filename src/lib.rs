//! APT Lab Backend Library
//!
//! Exposes the analysis modules for use by binaries and tests.

pub mod analysis;
