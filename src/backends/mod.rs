//! Foreground extraction engines
//!
//! - Command backend: drives an external `imgly-bgremove`-compatible executable

pub mod command;

// Test utilities for extractor-dependent code
#[cfg(test)]
pub mod test_utils;

pub use self::command::CommandExtractor;
