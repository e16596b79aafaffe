use crate::extract::Query;
use crate::pagination::find_next_page;
use crate::url::normalize_url;
use std::collections::HashSet;
use url::Url;

/// Walk lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    Active,
    Exhausted,
}

/// Why a walk stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The last page carried no next-page signal
    NoNextPage,
    /// The next page had already been visited
    Cycle,
    /// The page ceiling was reached
    PageLimit,
    /// The current page could not be fetched
    Aborted,
}

/// Mutable walk state
#[derive(Debug, Clone)]
pub struct PaginationState {
    pub current_url: Url,
    pub page_index: usize,
    /// Normalized forms of every URL entered so far
    pub visited: HashSet<String>,
    pub terminal: bool,
}

/// Sequential next-page state machine for a single seed
///
/// The walker does not fetch. The caller fetches [`current_url`], hands the
/// markup to [`advance`], and repeats with the returned URL until `None`.
///
/// [`current_url`]: PaginationWalker::current_url
/// [`advance`]: PaginationWalker::advance
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    state: PaginationState,
    max_pages: usize,
    pages: Vec<Url>,
    stop_reason: Option<StopReason>,
}

impl PaginationWalker {
    /// Starts a walk at `seed`, visiting at most `max_pages` pages
    pub fn new(seed: Url, max_pages: usize) -> Self {
        let mut visited = HashSet::new();
        visited.insert(normalize_url(&seed).to_string());

        Self {
            state: PaginationState {
                current_url: seed,
                page_index: 0,
                visited,
                terminal: false,
            },
            max_pages: max_pages.max(1),
            pages: Vec::new(),
            stop_reason: None,
        }
    }

    pub fn current_url(&self) -> &Url {
        &self.state.current_url
    }

    pub fn page_index(&self) -> usize {
        self.state.page_index
    }

    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn walk_state(&self) -> WalkState {
        if self.state.terminal {
            WalkState::Exhausted
        } else {
            WalkState::Active
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state.terminal
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Pages processed so far, in visitation order
    pub fn pages(&self) -> &[Url] {
        &self.pages
    }

    /// Records the current page and moves to the next one
    ///
    /// `markup` is the content of [`current_url`](Self::current_url).
    /// Returns the next URL to fetch, or None once the walk is exhausted.
    pub fn advance(&mut self, markup: &str, query: &dyn Query) -> Option<Url> {
        if self.state.terminal {
            return None;
        }

        self.pages.push(self.state.current_url.clone());

        let Some(candidate) = find_next_page(
            markup,
            &self.state.current_url,
            self.state.page_index,
            query,
        ) else {
            return self.stop(StopReason::NoNextPage);
        };

        if self.state.visited.contains(normalize_url(&candidate).as_str()) {
            return self.stop(StopReason::Cycle);
        }

        if self.state.page_index + 1 >= self.max_pages {
            return self.stop(StopReason::PageLimit);
        }

        self.state.page_index += 1;
        self.state.visited.insert(normalize_url(&candidate).to_string());
        self.state.current_url = candidate.clone();
        Some(candidate)
    }

    /// Ends the walk because the current page could not be fetched
    pub fn abort(&mut self) {
        if !self.state.terminal {
            self.stop(StopReason::Aborted);
        }
    }

    fn stop(&mut self, reason: StopReason) -> Option<Url> {
        tracing::info!(
            "Pagination from {} stopped after {} page(s): {:?}",
            self.state.current_url,
            self.pages.len(),
            reason
        );
        self.state.terminal = true;
        self.stop_reason = Some(reason);
        None
    }
}
