//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FetchStatus`: the terminal status of a URL in a fetch run
//! - `HostState`: per-host dispatch history used for request spacing

mod fetch_status;
mod host_state;

// Re-export main types
pub use fetch_status::FetchStatus;
pub use host_state::HostState;
