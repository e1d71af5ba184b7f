//! Traversal generation counter (vanilla `validcount`).
//!
//! Every record visited by a traversal carries the last generation that
//! saw it; a record is new iff its stamp differs from the generation the
//! traversal drew at its start.

use std::cell::Cell;

/// Stamp slot for ordinary visits.
pub(crate) const VISIT: usize = 0;
/// Stamp slot for blocking tests, which may run inside a visit.
pub(crate) const BLOCK: usize = 1;

#[derive(Debug, Default)]
pub struct Validcount(Cell<u32>);

impl Validcount {
    /// Advance and return the new generation.
    #[inline]
    pub fn next(&self) -> u32 {
        let g = self.0.get().wrapping_add(1);
        self.0.set(g);
        g
    }

    #[inline]
    pub fn current(&self) -> u32 {
        self.0.get()
    }
}

/// Stamp `slot` with `generation`; `false` if it already carried it.
#[inline(always)]
pub(crate) fn mark(slot: &Cell<u32>, generation: u32) -> bool {
    if slot.get() == generation {
        return false;
    }
    slot.set(generation);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero_and_counts_up() {
        let vc = Validcount::default();
        assert_eq!(vc.current(), 0);
        assert_eq!(vc.next(), 1);
        assert_eq!(vc.next(), 2);
        assert_eq!(vc.current(), 2);
    }

    #[test]
    fn mark_reports_first_visit_only() {
        let vc = Validcount::default();
        let stamp = Cell::new(0);
        let g = vc.next();
        assert!(mark(&stamp, g));
        assert!(!mark(&stamp, g));
        assert!(mark(&stamp, vc.next()));
    }
}
