//! Output module for reporting on the harvested data
//!
//! This module handles:
//! - Loading statistics about queues, clues and answers from the store
//! - Printing them for the `--stats` mode

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
