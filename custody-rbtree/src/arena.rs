//! Fixed-capacity backing store of [`Node`] cells, with a free-list threaded
//! through the nodes' own `left`/`right` links.
//!
//! The capacity-one-time-allocation shape follows `tnballo-scapegoat`'s
//! `NodeArena` (draw from a free-list, recycle on removal); unlike
//! `scapegoat`'s const-generic, grow-on-push arena, `max_size` here is a
//! runtime argument to `create`, so the whole backing `Vec` is reserved and
//! pre-populated with free slots up front.

use alloc::vec::Vec;

use custody_core::{CreateError, MAX_CAPACITY};

use crate::node::{Color, Node, NIL};

pub(crate) struct Arena {
    nodes: Vec<Node>,
    free_head: u32,
    free_tail: u32,
    size: u32,
}

impl Arena {
    /// Allocate the arena once, chaining every slot onto the free-list in
    /// index order. No further allocation occurs after this call returns.
    pub fn create(max_size: u32) -> Result<Self, CreateError> {
        if max_size == 0 {
            return Err(CreateError::SizeZero);
        }
        if u64::from(max_size) > MAX_CAPACITY {
            return Err(CreateError::ExceededMaxSize);
        }

        let mut nodes: Vec<Node> = Vec::new();
        nodes
            .try_reserve_exact(max_size as usize)
            .map_err(|_| CreateError::MemErr)?;

        for i in 0..max_size {
            let mut n = Node::new(0, 0);
            n.left = if i == 0 { NIL } else { i - 1 };
            n.right = if i + 1 == max_size { NIL } else { i + 1 };
            nodes.push(n);
        }

        Ok(Arena {
            nodes,
            free_head: 0,
            free_tail: max_size - 1,
            size: 0,
        })
    }

    pub fn max_size(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_full(&self) -> bool {
        self.free_tail == NIL
    }

    /// Detach the tail of the free-list, initialize it with `(value,
    /// offset)`, and return its index. `None` if the arena is full.
    pub fn pop(&mut self, value: u32, offset: u32) -> Option<u32> {
        let idx = self.free_tail;
        if idx == NIL {
            return None;
        }

        let prev = self.nodes[idx as usize].left;
        if prev == NIL {
            self.free_head = NIL;
        } else {
            self.nodes[prev as usize].right = NIL;
        }
        self.free_tail = prev;

        let node = &mut self.nodes[idx as usize];
        *node = Node::new(value, offset);
        self.size += 1;
        Some(idx)
    }

    /// Prepend `idx` to the head of the free-list. Resets its links so it
    /// can't be mistaken for an in-tree node.
    pub fn push(&mut self, idx: u32) {
        debug_assert!(
            (idx as usize) < self.nodes.len(),
            "arena index out of range"
        );

        let old_head = self.free_head;
        {
            let node = &mut self.nodes[idx as usize];
            node.parent = NIL;
            node.left = NIL;
            node.right = old_head;
            node.color = Color::Black;
            node.visited = false;
        }
        if old_head == NIL {
            self.free_tail = idx;
        } else {
            self.nodes[old_head as usize].left = idx;
        }
        self.free_head = idx;

        debug_assert!(self.size > 0, "push underflowed live node count");
        self.size -= 1;
    }

    /// Recycle every slot, live or free, without inspecting tree structure.
    /// `clear()` needs every node back on the free-list regardless of shape,
    /// so a full rebuild is equivalent to (and simpler than) walking the
    /// tree and pushing each reachable node individually.
    pub fn reset(&mut self) {
        let max_size = self.nodes.len() as u32;
        for i in 0..max_size {
            let mut n = Node::new(0, 0);
            n.left = if i == 0 { NIL } else { i - 1 };
            n.right = if i + 1 == max_size { NIL } else { i + 1 };
            self.nodes[i as usize] = n;
        }
        self.free_head = 0;
        self.free_tail = max_size - 1;
        self.size = 0;
    }

    pub fn get(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }

    pub fn get_mut(&mut self, idx: u32) -> &mut Node {
        &mut self.nodes[idx as usize]
    }
}
