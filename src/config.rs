//! Registry limits and defaults.

use crate::error::Error;

/// Maximum number of live targets.
pub const MAX_TARGETS: usize = 64;
/// Path buffer size; a path must be strictly shorter.
pub const MAX_PATH_LEN: usize = 256;
/// Symbol buffer size; a symbol must be strictly shorter.
pub const MAX_SYMBOL_LEN: usize = 128;
/// Longest accepted command line, in bytes.
pub const MAX_LINE_LEN: usize = 512;
/// Largest delay a target may carry (10 seconds).
pub const MAX_DELAY_NS: u64 = 10_000_000_000;
/// Delay applied when a command omits one (1 millisecond).
pub const DEFAULT_DELAY_NS: u64 = 1_000_000;

/// Limits a registry enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub max_targets: usize,
    pub max_path_len: usize,
    pub max_symbol_len: usize,
    pub max_line_len: usize,
    pub max_delay_ns: u64,
    /// Initial value of the runtime-tunable default delay.
    pub default_delay_ns: u64,
}

impl Config {
    /// The compiled-in limits.
    pub const fn new() -> Self {
        Self {
            max_targets: MAX_TARGETS,
            max_path_len: MAX_PATH_LEN,
            max_symbol_len: MAX_SYMBOL_LEN,
            max_line_len: MAX_LINE_LEN,
            max_delay_ns: MAX_DELAY_NS,
            default_delay_ns: DEFAULT_DELAY_NS,
        }
    }

    /// Reject limits no registry could work with.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_targets == 0
            || self.max_path_len < 2
            || self.max_symbol_len < 2
            || self.max_line_len == 0
        {
            return Err(Error::InvalidArgument);
        }
        if self.default_delay_ns > self.max_delay_ns {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
