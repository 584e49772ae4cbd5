//! A binary max-heap of packed monomials.
//!
//! Every heap entry owns a chain of nodes `(i, j)`, the index pairs of all products that
//! are currently known to map to the entry's monomial. Inserting a monomial that is already
//! present extends its chain instead of growing the heap, so that the size of the heap is bounded by the number
//! of distinct monomials.
//!
//! Nodes are addressed by their row `i`: every row has at most one node in the heap at a time.

use super::packed::{self, ExponentLayout, Mask};

const NIL: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct HeapNode {
    i: usize,
    j: usize,
    next: usize,
}

/// Heap of monomials, stored 1-based with a sentinel at index 0.
pub struct MonomialHeap {
    words: usize,
    cmpmask: Mask,
    /// Pairs of an exponent slot and the head of the chain.
    heap: Vec<(usize, usize)>,
    nodes: Vec<HeapNode>,
    pool: Vec<u64>,
    free: Vec<usize>,
    next_loc: usize,
}

impl MonomialHeap {
    /// Create a heap for monomials with the given layout and room for `rows` rows.
    pub fn new(layout: &ExponentLayout, rows: usize) -> MonomialHeap {
        MonomialHeap {
            words: layout.words(),
            cmpmask: layout.cmpmask().into(),
            heap: vec![(0, NIL)],
            nodes: vec![
                HeapNode {
                    i: 0,
                    j: 0,
                    next: NIL
                };
                rows
            ],
            pool: Vec::with_capacity(rows * layout.words()),
            free: Vec::with_capacity(rows),
            next_loc: NIL,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.len() == 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len() - 1
    }

    #[inline]
    fn exp(&self, slot: usize) -> &[u64] {
        &self.pool[slot * self.words..(slot + 1) * self.words]
    }

    #[inline]
    fn gt(&self, a: usize, b: usize) -> bool {
        packed::gt(self.exp(a), self.exp(b), &self.cmpmask)
    }

    /// Get a free exponent slot, allocating one if needed.
    fn scratch_slot(&mut self) -> usize {
        match self.free.last() {
            Some(&s) => s,
            None => {
                let s = self.pool.len() / self.words;
                self.pool.resize(self.pool.len() + self.words, 0);
                self.free.push(s);
                s
            }
        }
    }

    /// The scratch exponent that is used by the next [Self::insert].
    #[inline]
    pub fn candidate(&mut self) -> &mut [u64] {
        let s = self.scratch_slot();
        &mut self.pool[s * self.words..(s + 1) * self.words]
    }

    /// The largest monomial in the heap. The heap must not be empty.
    #[inline]
    pub fn top(&self) -> &[u64] {
        self.exp(self.heap[1].0)
    }

    /// Insert the product `(i, j)` with the monomial written to [Self::candidate].
    ///
    /// If the monomial is found at the top, at the location of the last merge or on the
    /// path to the root, the node is chained to that entry and `false` is returned.
    /// Otherwise the monomial takes a new heap entry and `true` is returned.
    pub fn insert(&mut self, i: usize, j: usize) -> bool {
        let slot = self.scratch_slot();

        if i >= self.nodes.len() {
            self.nodes.resize(
                i + 1,
                HeapNode {
                    i: 0,
                    j: 0,
                    next: NIL,
                },
            );
        }
        self.nodes[i] = HeapNode { i, j, next: NIL };

        let n = self.heap.len();

        if n > 1 && packed::equal(self.exp(slot), self.exp(self.heap[1].0)) {
            self.chain(1, i);
            return false;
        }

        if self.next_loc < n && packed::equal(self.exp(slot), self.exp(self.heap[self.next_loc].0))
        {
            self.chain(self.next_loc, i);
            return false;
        }

        let mut k = n;
        let mut p = k / 2;
        while p >= 1 {
            if !self.gt(slot, self.heap[p].0) {
                break;
            }
            k = p;
            p = k / 2;
        }

        if p >= 1 && packed::equal(self.exp(slot), self.exp(self.heap[p].0)) {
            self.chain(p, i);
            self.next_loc = p;
            return false;
        }

        self.heap.push((slot, NIL));
        let mut m = n;
        while m > k {
            self.heap[m] = self.heap[m / 2];
            m /= 2;
        }
        self.heap[k] = (slot, i);
        self.free.pop();

        true
    }

    #[inline]
    fn chain(&mut self, entry: usize, node: usize) {
        self.nodes[node].next = self.heap[entry].1;
        self.heap[entry].1 = node;
    }

    /// Remove the largest monomial and append the index pairs of its chain to `store`.
    pub fn pop(&mut self, store: &mut Vec<(usize, usize)>) {
        let (slot, mut node) = self.heap[1];
        self.free.push(slot);
        self.next_loc = NIL;

        let s = self.heap.len() - 1;
        let mut i = 1;
        let mut j = 2;
        while j < s {
            if !self.gt(self.heap[j].0, self.heap[j + 1].0) {
                j += 1;
            }
            self.heap[i] = self.heap[j];
            i = j;
            j *= 2;
        }

        let last = self.heap[s];
        j = i / 2;
        while i > 1 && self.gt(last.0, self.heap[j].0) {
            self.heap[i] = self.heap[j];
            i = j;
            j /= 2;
        }
        self.heap[i] = last;
        self.heap.truncate(s);

        while node != NIL {
            let x = self.nodes[node];
            store.push((x.i, x.j));
            node = x.next;
        }
    }
}

/// The scheduling state of a row of products `(i, 0), (i, 1), ...`.
///
/// A row has at most one product in the heap. `scheduled` is one more than the column of
/// the latest inserted product of the row, and `popped` is set when that product was taken
/// out of the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowState {
    scheduled: usize,
    popped: bool,
}

impl Default for RowState {
    fn default() -> Self {
        RowState {
            scheduled: 0,
            popped: true,
        }
    }
}

impl RowState {
    /// Returns `true` if the row is idle and column `j` is its next product.
    #[inline]
    pub fn awaits(&self, j: usize) -> bool {
        self.scheduled == j && self.popped
    }

    /// Returns `true` if the product in column `j` has been taken out of the heap.
    #[inline]
    pub fn processed(&self, j: usize) -> bool {
        self.scheduled > j + 1 || (self.scheduled == j + 1 && self.popped)
    }

    #[inline]
    pub fn popped(&self) -> bool {
        self.popped
    }

    #[inline]
    pub fn schedule(&mut self, j: usize) {
        self.scheduled = j + 1;
        self.popped = false;
    }

    #[inline]
    pub fn pop(&mut self) {
        self.popped = true;
    }
}
