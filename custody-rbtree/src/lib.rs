//! Range-coalescing red-black tree for bundle custody ID tracking.
//!
//! A [`CustodyTree`] stores a set of `u32` identifiers as maximal runs of
//! consecutive integers, each run held in one red-black tree node as a
//! `(value, offset)` pair covering `[value, value + offset]`. Inserting an
//! id adjacent to an existing run grows it in place instead of allocating a
//! new node; deleting from the interior of a run splits it in two. The tree
//! itself is arena-backed: nodes live in a single, once-allocated `Vec`,
//! linked by `u32` indices rather than pointers, so the whole structure is
//! `no_std` and has no allocator dependency beyond that one reservation.
//!
//! The rebalancing skeleton (rotations, insert/delete fix-up case analysis)
//! is ported from `angzarr-rbtree`, a pointer-based Linux-kernel-ABI
//! red-black tree; see `DESIGN.md` for the full grounding ledger.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod arena;
mod iter;
mod node;
mod tree;

pub use custody_core::{are_consecutive, CreateError, CustodyError, RangeSpan, MAX_CAPACITY};
pub use iter::{Drain, RangeIter};
pub use tree::{CustodyTree, InsertOutcome, NodeHandle};
