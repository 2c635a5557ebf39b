/// In-process implementations of the core traits for tests and dry runs.
pub mod allocator;
pub mod event_log;
