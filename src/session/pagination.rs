//! Pagination: the active page, always inside `1..=total`.
//!
//! The total starts as the page count declared by the upload and is later
//! overwritten by the count the page renderer discovers once the payload is
//! parsed. The two may disagree (placeholder metadata, a backend that counts
//! differently); the last write wins and the current page is re-clamped, so
//! the viewer can never show an out-of-range page.

use serde::Serialize;

/// Current page and page total. `1 ≤ current ≤ total` holds at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    current: u32,
    total: u32,
}

impl Pagination {
    /// Start on page 1. A declared count of 0 is stored as 1.
    pub fn new(declared_total: u32) -> Self {
        Self {
            current: 1,
            total: declared_total.max(1),
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// `max(1, min(requested, total))`. Accepts any integer.
    pub fn clamp(&self, requested: i64) -> u32 {
        // total ≥ 1, so the result always fits in u32
        requested.clamp(1, i64::from(self.total)) as u32
    }

    /// Overwrite the total and pull the current page back into range.
    pub fn set_total(&mut self, total: u32) {
        self.total = total.max(1);
        self.current = self.clamp(i64::from(self.current));
    }

    /// Move to `clamp(requested)` and return the page actually selected.
    pub fn go_to(&mut self, requested: i64) -> u32 {
        self.current = self.clamp(requested);
        self.current
    }

    pub fn next(&mut self) -> u32 {
        self.go_to(i64::from(self.current) + 1)
    }

    pub fn previous(&mut self) -> u32 {
        self.go_to(i64::from(self.current) - 1)
    }

    pub fn can_go_next(&self) -> bool {
        self.current < self.total
    }

    pub fn can_go_previous(&self) -> bool {
        self.current > 1
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBES: [i64; 11] = [i64::MIN, -100, -1, 0, 1, 2, 4, 5, 6, 1_000, i64::MAX];

    #[test]
    fn clamp_stays_in_range_and_is_idempotent() {
        for total in [1u32, 2, 5, 37] {
            let p = Pagination::new(total);
            for x in PROBES {
                let c = p.clamp(x);
                assert!((1..=total).contains(&c), "clamp({x}) = {c} with total {total}");
                assert_eq!(p.clamp(i64::from(c)), c);
            }
        }
    }

    #[test]
    fn clamp_examples() {
        let p = Pagination::new(5);
        assert_eq!(p.clamp(0), 1);
        assert_eq!(p.clamp(3), 3);
        assert_eq!(p.clamp(9), 5);
    }

    #[test]
    fn zero_declared_pages_becomes_one() {
        let p = Pagination::new(0);
        assert_eq!(p.total(), 1);
        assert_eq!(p.current(), 1);
    }

    #[test]
    fn set_total_reclamps_current() {
        let mut p = Pagination::new(10);
        p.go_to(8);
        p.set_total(3);
        assert_eq!(p.current(), 3);
        assert_eq!(p.total(), 3);

        // growing never moves the current page
        p.set_total(50);
        assert_eq!(p.current(), 3);

        p.set_total(0);
        assert_eq!(p.total(), 1);
        assert_eq!(p.current(), 1);
    }

    #[test]
    fn set_total_then_current_never_exceeds_total() {
        for start in 1..=12 {
            for n in 1..=12 {
                let mut p = Pagination::new(12);
                p.go_to(start);
                p.set_total(n);
                assert!(p.current() <= n);
                assert_eq!(p.clamp(i64::from(p.current())), p.current());
            }
        }
    }

    #[test]
    fn next_and_previous_stop_at_bounds() {
        let mut p = Pagination::new(2);
        assert!(!p.can_go_previous());
        assert_eq!(p.previous(), 1);
        assert_eq!(p.next(), 2);
        assert!(!p.can_go_next());
        assert_eq!(p.next(), 2);
        assert!(p.can_go_previous());
    }
}
