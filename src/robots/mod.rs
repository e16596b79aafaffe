//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Rulings are cached per host for the lifetime of a [`RobotsGate`].

mod cache;
mod gate;
mod parser;

pub use cache::{RobotsRuling, RulingSource};
pub use gate::{RobotsDecision, RobotsGate};
pub use parser::{ParsedRobots, RobotsGroup};
