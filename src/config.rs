//! Boot-time configuration
//!
//! The core count is fixed once, before any fork can happen, and is
//! read-only for everyone afterwards.

use thiserror::Error;

use crate::registry::MAX_CORES;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("core count {} outside 1..={}", .count, MAX_CORES)]
pub struct BadCoreCount {
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    cores: usize,
}

impl Config {
    pub fn new(cores: usize) -> Result<Self, BadCoreCount> {
        if (1..=MAX_CORES).contains(&cores) {
            Ok(Self { cores })
        } else {
            Err(BadCoreCount { count: cores })
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }
}
