pub mod allocator;
pub mod duplicator;
pub mod event_log;
pub mod policy;
