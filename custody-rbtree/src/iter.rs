//! Iterator adapters over [`CustodyTree`](crate::tree::CustodyTree).
//!
//! Both adapters hold `&mut CustodyTree` rather than `&CustodyTree`: the
//! non-popping walk still flips each visited node's transient traversal bit,
//! and the popping walk mutates the tree outright. The borrow checker
//! therefore enforces, for free, the single-writer discipline that would
//! otherwise just be a documented convention: no other mutating call can
//! run while an iterator is alive.

use custody_core::RangeSpan;

use crate::node::NIL;
use crate::tree::CustodyTree;

/// In-order, non-destructive iterator over a tree's ranges.
pub struct RangeIter<'a> {
    tree: &'a mut CustodyTree,
    cur: u32,
}

impl<'a> RangeIter<'a> {
    pub(crate) fn new(tree: &'a mut CustodyTree, cur: u32) -> Self {
        RangeIter { tree, cur }
    }
}

impl<'a> Iterator for RangeIter<'a> {
    type Item = RangeSpan;

    fn next(&mut self) -> Option<RangeSpan> {
        if self.cur == NIL {
            return None;
        }
        let node = *self.tree.arena.get(self.cur);
        let range = RangeSpan::new(node.value, node.offset);
        self.cur = self.tree.advance(self.cur);
        Some(range)
    }
}

/// In-order iterator that removes each range as it is yielded.
///
/// `rebalance = true` keeps the tree a valid red-black tree between every
/// step, at the usual logarithmic rebalancing cost. `rebalance = false`
/// splices nodes out without rebalancing, which is cheaper but only safe
/// when the drain is run to completion; abandoning it partway leaves the
/// tree's shape invalid.
pub struct Drain<'a> {
    tree: &'a mut CustodyTree,
    cur: u32,
    rebalance: bool,
}

impl<'a> Drain<'a> {
    pub(crate) fn new(tree: &'a mut CustodyTree, cur: u32, rebalance: bool) -> Self {
        Drain {
            tree,
            cur,
            rebalance,
        }
    }
}

impl<'a> Iterator for Drain<'a> {
    type Item = RangeSpan;

    fn next(&mut self) -> Option<RangeSpan> {
        if self.cur == NIL {
            return None;
        }
        let (range, next) = if self.rebalance {
            self.tree.next_pop_rebalance(self.cur)
        } else {
            self.tree.next_pop_no_rebalance(self.cur)
        };
        self.cur = next;
        Some(range)
    }
}
