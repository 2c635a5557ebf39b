//! Memory-pressure fault injection.
//!
//! Each worker binary drives its own resident memory along one policy's
//! trajectory so that external monitors and reclaim policies can be
//! exercised under reproducible conditions.

pub mod cli;
pub mod constants;
pub mod core;
pub mod native;
pub mod stubs;
