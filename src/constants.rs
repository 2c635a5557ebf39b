/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "config.cfg";

/// Event log appended to by every worker.
pub const DEFAULT_LOG_FILE: &str = "process_log.txt";

pub const LOG_FILE_ENV: &str = "MEMSTRESS_LOG_FILE";

/// Set on a duplicated worker so it does not duplicate itself again.
pub const DUPLICATE_ENV: &str = "MEMSTRESS_DUPLICATE";

/// Written across every committed block to force physical page commitment.
pub const FILL_BYTE: u8 = b'A';

pub const KIB: u64 = 1024;

/// Used when the config file does not set `FLUCTUATION_RANGE`.
pub const DEFAULT_FLUCTUATION_RANGE_KB: u64 = 3000;

pub const LOG_TIMESTAMP_FORMAT: &str = "%a %b %d %T %Z %Y";
