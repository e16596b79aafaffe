//! Pagination discovery
//!
//! # Components
//!
//! - `detect`: next-page signal lookup, pagination style detection and
//!   query-parameter page URL generation
//! - `walker`: the `PaginationWalker` state machine with cycle guard and
//!   page ceiling

mod detect;
mod walker;

pub use detect::{detect_pagination_kind, find_next_page, generate_page_urls, PaginationKind};
pub use walker::{PaginationState, PaginationWalker, StopReason, WalkState};
