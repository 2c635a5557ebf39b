pub mod arena;
pub mod config;
pub mod domain;
pub mod policies;
pub mod simulation;
pub mod traits;
