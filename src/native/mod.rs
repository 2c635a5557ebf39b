/// Native module contains the implementations of core traits that talk to
/// the operating system directly: the process heap, the filesystem and
/// process spawning.
pub mod allocator;
pub mod duplicator;
pub mod event_log;
