//! Frontier and visited-set bookkeeping for a single crawl.
//!
//! Every URL admitted to a [`Frontier`] is, from then on, in exactly one of
//! two places: the pending queue or the visited set. A URL is never admitted
//! twice, which is also what breaks cycles in the link graph.

use std::collections::{BTreeSet, HashSet, VecDeque};

use sitecrawl_shared::FrontierOrder;

use crate::normalize::CanonicalUrl;

/// Outcome of [`Frontier::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly scheduled.
    Admitted,
    /// Already pending or visited.
    Duplicate,
    /// Host differs from the crawl hostname.
    OffHost,
}

/// Pending queue plus visited set, pinned to one hostname.
#[derive(Debug)]
pub struct Frontier {
    host: String,
    order: FrontierOrder,
    pending: VecDeque<CanonicalUrl>,
    /// Every URL ever admitted: pending ∪ in-flight ∪ visited.
    admitted: HashSet<CanonicalUrl>,
    visited: BTreeSet<CanonicalUrl>,
}

impl Frontier {
    /// Start a frontier holding only `seed`. The hostname is taken from the
    /// seed and never changes.
    pub fn new(seed: CanonicalUrl, order: FrontierOrder) -> Self {
        let mut frontier = Self {
            host: seed.host().to_string(),
            order,
            pending: VecDeque::new(),
            admitted: HashSet::new(),
            visited: BTreeSet::new(),
        };
        frontier.admit(seed);
        frontier
    }

    /// The crawl hostname.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Schedule `url` if it is on the crawl host and has never been admitted.
    pub fn admit(&mut self, url: CanonicalUrl) -> Admission {
        if url.host() != self.host {
            return Admission::OffHost;
        }
        if self.admitted.contains(&url) {
            return Admission::Duplicate;
        }
        self.admitted.insert(url.clone());
        self.pending.push_back(url);
        Admission::Admitted
    }

    /// Take the next pending URL according to the frontier order.
    pub fn next(&mut self) -> Option<CanonicalUrl> {
        match self.order {
            FrontierOrder::Fifo => self.pending.pop_front(),
            FrontierOrder::Lifo => self.pending.pop_back(),
        }
    }

    /// Record `url` as visited. Returns `false` if it was never admitted or
    /// is already visited.
    pub fn mark_visited(&mut self, url: CanonicalUrl) -> bool {
        if !self.admitted.contains(&url) {
            return false;
        }
        if let Some(pos) = self.pending.iter().position(|p| p == &url) {
            self.pending.remove(pos);
        }
        self.visited.insert(url)
    }

    /// Pop the next URL and mark it visited in one step.
    pub fn advance(&mut self) -> Option<CanonicalUrl> {
        let url = self.next()?;
        self.visited.insert(url.clone());
        Some(url)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url)
    }

    /// No URLs left to hand out.
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Consume the frontier, keeping only the visited set.
    pub fn into_visited(self) -> BTreeSet<CanonicalUrl> {
        self.visited
    }
}
