//! A separately-chained hash set with pluggable policies.
//!
//! This module implements [`ChainSet`], a hash set resolving collisions through per-bucket
//! singly-linked chains. It differs from the standard library's set in three ways that matter to
//! foundation code:
//!
//! 1. **Policies are per-instance type parameters.** Placement ([`Spread`]), element destruction
//!    ([`Reap`]) and node allocation ([`Pool`]) are all swappable, and all monomorphized — no
//!    vtable on the hot path.
//! 2. **Iteration is epoch-validated.** A [`Cursor`] holds no borrow of the set. Instead it
//!    carries the *mutation epoch* it was minted under, and compares it against the set's live
//!    epoch on demand. Structural mutation invalidates every outstanding cursor; the cursor's own
//!    `remove` re-tunes itself and keeps going. This costs one word per cursor and avoids any
//!    lifetime entanglement between cursors and the container.
//! 3. **The bucket table is elastic.** Crossing the load threshold grows the table to
//!    `2⌈len/threshold⌉ + 1` buckets and rehashes in place, moving the nodes themselves — node
//!    identity is stable across rehashes.
//!
//! Within a bucket, iteration visits nodes in chain order (reverse insertion order, since
//! insertion prepends); across buckets it is index-ascending. After a rehash, previous bucket
//! positions are meaningless.
//!
//! The set is single-owner and non-reentrant. It never reports errors through its return values;
//! misuse is a programmer error and trips an assertion (see [`check`]).
//!
//! # Examples
//!
//! ```rust
//! use keel::set::ChainSet;
//!
//! let mut primes: ChainSet<u32> = ChainSet::new();
//! assert!(primes.add(2));
//! assert!(primes.add(3));
//! // Double insertion is refused.
//! assert!(!primes.add(3));
//!
//! assert!(primes.contains(&2));
//! assert!(primes.remove(&2));
//! assert!(!primes.contains(&2));
//! ```
//!
//! [`ChainSet`]: struct.ChainSet.html
//! [`Cursor`]: struct.Cursor.html
//! [`Spread`]: policy/trait.Spread.html
//! [`Reap`]: policy/trait.Reap.html
//! [`Pool`]: policy/trait.Pool.html
//! [`check`]: struct.ChainSet.html#method.check

pub mod node;
pub mod policy;

#[cfg(test)]
mod tests;

pub use self::node::{Link, Node};
pub use self::policy::{Chunk, Discard, Heap, Pool, Reap, SeaSpread, Spread};

use std::iter::FromIterator;
use std::{cmp, fmt};

/// The bucket count a lazily-allocated table starts out with, and the floor enforced by
/// [`set_buckets`].
///
/// [`set_buckets`]: struct.ChainSet.html#method.set_buckets
pub const DEFAULT_BUCKETS: usize = 31;

/// The load threshold (`len / buckets`) above which the table grows.
pub const DEFAULT_THRESHOLD: f32 = 0.75;

/// A separately-chained hash set.
///
/// See the [module documentation](index.html) for the full story.
pub struct ChainSet<V, S = SeaSpread, R = Discard, P = Heap> {
    /// The bucket table.
    ///
    /// `None` before the first insertion and after `reset()`; never empty when allocated.
    table: Option<Vec<Link<V>>>,
    /// The number of stored elements.
    len: usize,
    /// The load threshold. Strictly positive.
    threshold: f32,
    /// The bucket count the table will materialize with.
    ///
    /// Only consulted while `table` is `None`.
    initial: usize,
    /// The mutation epoch.
    ///
    /// Bumped on every structural change; cursors compare against it to detect invalidation.
    mutation: u64,
    /// The placement policy.
    spread: S,
    /// The destruction hook.
    reap: R,
    /// The node allocator.
    pool: P,
}

impl<V, S: Default, R: Default, P: Default> ChainSet<V, S, R, P> {
    /// Create an empty set with default policies and defaults for bucket count and threshold.
    ///
    /// The table itself is allocated lazily, on the first insertion.
    pub fn new() -> ChainSet<V, S, R, P> {
        ChainSet::assemble(
            DEFAULT_BUCKETS,
            DEFAULT_THRESHOLD,
            S::default(),
            R::default(),
            P::default(),
        )
    }

    /// Create an empty set which will materialize with `buckets` buckets.
    ///
    /// Unlike [`set_buckets`], construction accepts arbitrary positive counts; the subsystem
    /// floor applies to the setter only.
    ///
    /// [`set_buckets`]: #method.set_buckets
    pub fn with_buckets(buckets: usize) -> ChainSet<V, S, R, P> {
        ChainSet::assemble(
            buckets,
            DEFAULT_THRESHOLD,
            S::default(),
            R::default(),
            P::default(),
        )
    }
}

impl<V, S, R, P> ChainSet<V, S, R, P> {
    /// Create an empty set from explicit parts.
    ///
    /// # Panics
    ///
    /// If `threshold` is not strictly positive.
    pub fn assemble(buckets: usize, threshold: f32, spread: S, reap: R, pool: P) -> ChainSet<V, S, R, P> {
        assert!(threshold > 0.0, "load threshold must be positive");

        ChainSet {
            table: None,
            len: 0,
            threshold: threshold,
            initial: cmp::max(1, buckets),
            mutation: 0,
            spread: spread,
            reap: reap,
            pool: pool,
        }
    }

    /// The number of stored elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the set empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The current bucket count.
    ///
    /// While the table is unallocated this reports the count it will materialize with.
    pub fn buckets(&self) -> usize {
        match self.table {
            Some(ref table) => table.len(),
            None => self.initial,
        }
    }

    /// The current load threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Mint a detached cursor positioned before the first element.
    ///
    /// The cursor borrows nothing; pass the set back into its methods to step it. It is only
    /// meaningful against the set that minted it.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            row: 0,
            at: 0,
            prior: None,
            mutation: self.mutation,
        }
    }

    /// Iterate over the elements.
    ///
    /// The usual borrowing iterator; since it holds the set shared, the set cannot be mutated
    /// for as long as it lives.
    pub fn iter(&self) -> Iter<V, S, R, P> {
        Iter {
            set: self,
            cursor: self.cursor(),
        }
    }

    /// Collect the elements into a vector of length `len()`.
    ///
    /// Ordering matches `iter()`.
    pub fn to_vec(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.iter().cloned().collect()
    }
}

impl<V, S, R: Reap<V>, P: Pool<V>> ChainSet<V, S, R, P> {
    /// Remove and yield some element.
    ///
    /// The element comes from the first non-empty bucket; no other ordering is guaranteed, and
    /// after a rehash previous picks say nothing about future ones. The value is handed to the
    /// caller, so the reap hook does not run.
    ///
    /// Returns `None` iff the set is empty.
    pub fn take(&mut self) -> Option<V> {
        let node = {
            let table = match self.table {
                Some(ref mut table) => table,
                None => return None,
            };

            let mut found = None;
            for link in table.iter_mut() {
                if link.is_some() {
                    let mut node = match link.take() {
                        Some(node) => node,
                        None => unreachable!(),
                    };
                    *link = node.next.take();
                    found = Some(node);
                    break;
                }
            }

            match found {
                Some(node) => node,
                None => return None,
            }
        };

        self.len -= 1;
        self.mutation += 1;

        Some(self.pool.release(node))
    }

    /// Empty every chain, keeping the bucket table.
    ///
    /// When the pool reclaims nodes individually, every value passes through the reap hook; a
    /// pool that sweeps wholesale (see [`Pool::sweep`]) skips both the per-node release and the
    /// reap.
    ///
    /// [`Pool::sweep`]: policy/trait.Pool.html#tymethod.sweep
    pub fn clear(&mut self) {
        if let Some(ref mut table) = self.table {
            if self.pool.sweep() {
                for link in table.iter_mut() {
                    let mut chain = link.take();
                    while let Some(mut node) = chain {
                        chain = node.next.take();
                    }
                }
            } else {
                for link in table.iter_mut() {
                    while let Some(mut node) = link.take() {
                        *link = node.next.take();
                        let value = self.pool.release(node);
                        self.reap.reap(value);
                    }
                }
            }
        }

        self.len = 0;
        self.mutation += 1;
    }

    /// Like [`clear`], then release the bucket table as well.
    ///
    /// The resulting state is indistinguishable from a freshly constructed instance.
    ///
    /// [`clear`]: #method.clear
    pub fn reset(&mut self) {
        self.clear();
        self.table = None;
    }

    /// Unlink the node at chain position `at` of bucket `row`, yielding its value without
    /// reaping. Used by cursor removal.
    fn unhook(&mut self, row: usize, at: usize) -> Option<V> {
        let node = {
            let table = match self.table {
                Some(ref mut table) => table,
                None => return None,
            };
            if row >= table.len() {
                return None;
            }

            let mut link = &mut table[row];
            let mut index = 0;
            loop {
                if link.is_none() {
                    return None;
                }
                if index == at {
                    break;
                }
                match *link {
                    Some(ref mut node) => link = &mut node.next,
                    None => unreachable!(),
                }
                index += 1;
            }

            let mut node = match link.take() {
                Some(node) => node,
                None => unreachable!(),
            };
            *link = node.next.take();
            node
        };

        self.len -= 1;
        self.mutation += 1;

        Some(self.pool.release(node))
    }
}

impl<V: PartialEq, S: Spread<V>, R: Reap<V>, P: Pool<V>> ChainSet<V, S, R, P> {
    /// Insert `value` if no equivalent element is present.
    ///
    /// Returns true on insertion. Average O(1), worst O(len).
    ///
    /// The new node is prepended to its chain. The load check runs only when the target bucket
    /// was occupied before the insertion; crossing the threshold grows the table to
    /// `2⌈len/threshold⌉ + 1` buckets.
    pub fn add(&mut self, value: V) -> bool {
        self.materialize();

        let row;
        let collision;
        {
            let table = match self.table {
                Some(ref table) => table,
                None => unreachable!(),
            };
            row = self.spread.spread(&value, table.len());

            // Refuse the insertion if an equivalent element is chained here already.
            let mut link = &table[row];
            while let Some(ref node) = *link {
                if *node.value() == value {
                    return false;
                }
                link = &node.next;
            }

            collision = table[row].is_some();
        }

        {
            let table = match self.table {
                Some(ref mut table) => table,
                None => unreachable!(),
            };
            let next = table[row].take();
            table[row] = Some(self.pool.acquire(value, next));
        }

        self.len += 1;
        self.mutation += 1;

        if collision {
            self.check_load();
        }

        true
    }

    /// Is an equivalent element present?
    pub fn contains(&self, value: &V) -> bool {
        let table = match self.table {
            Some(ref table) => table,
            None => return false,
        };

        let mut link = &table[self.spread.spread(value, table.len())];
        while let Some(ref node) = *link {
            if node.value() == value {
                return true;
            }
            link = &node.next;
        }

        false
    }

    /// Remove the first equivalent element, preserving chain order.
    ///
    /// The removed value passes through the reap hook. Returns true iff an element was removed;
    /// at most one is (duplicates cannot exist).
    pub fn remove(&mut self, value: &V) -> bool {
        let node = {
            let row = match self.table {
                Some(ref table) => self.spread.spread(value, table.len()),
                None => return false,
            };
            let table = match self.table {
                Some(ref mut table) => table,
                None => unreachable!(),
            };

            // Walk the chain; links are forward-only, so the walk itself is the trail.
            let mut link = &mut table[row];
            loop {
                let hit = match *link {
                    Some(ref node) => node.value() == value,
                    None => return false,
                };
                if hit {
                    break;
                }
                match *link {
                    Some(ref mut node) => link = &mut node.next,
                    None => unreachable!(),
                }
            }

            let mut node = match link.take() {
                Some(node) => node,
                None => unreachable!(),
            };
            *link = node.next.take();
            node
        };

        let value = self.pool.release(node);
        self.reap.reap(value);
        self.len -= 1;
        self.mutation += 1;

        true
    }

    /// Remove `old` and insert `new`.
    ///
    /// The semantics are remove-then-add: if `new` collides with an element other than `old`,
    /// `old` is still removed, the insertion is refused, and the call still returns true. The
    /// return value reports only whether `old` was present. `replace(x, x)` returns false and
    /// leaves the set untouched.
    pub fn replace(&mut self, old: &V, new: V) -> bool {
        if *old == new {
            return false;
        }

        if self.remove(old) {
            self.add(new);
            true
        } else {
            false
        }
    }

    /// Insert every value of an iterator; returns how many were actually inserted.
    pub fn add_all<I>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = V>,
    {
        let mut added = 0;
        for value in values {
            if self.add(value) {
                added += 1;
            }
        }
        added
    }

    /// Remove every value of an iterator; returns how many were actually removed.
    pub fn remove_all<'a, I>(&mut self, values: I) -> usize
    where
        V: 'a,
        I: IntoIterator<Item = &'a V>,
    {
        let mut removed = 0;
        for value in values {
            if self.remove(value) {
                removed += 1;
            }
        }
        removed
    }

    /// Set the bucket count, rehashing if it changes.
    ///
    /// The count is clamped from below to [`DEFAULT_BUCKETS`]. On an unallocated table this
    /// merely records the count to materialize with.
    ///
    /// [`DEFAULT_BUCKETS`]: constant.DEFAULT_BUCKETS.html
    pub fn set_buckets(&mut self, buckets: usize) {
        let buckets = cmp::max(buckets, DEFAULT_BUCKETS);

        let current = match self.table {
            Some(ref table) => table.len(),
            None => {
                self.initial = buckets;
                return;
            }
        };

        if current != buckets {
            self.resize(buckets);
        }
    }

    /// Set the load threshold, rechecking the load (which may grow the table).
    ///
    /// # Panics
    ///
    /// If `threshold` is not strictly positive.
    pub fn set_threshold(&mut self, threshold: f32) {
        assert!(threshold > 0.0, "load threshold must be positive");

        self.threshold = threshold;
        self.check_load();
    }

    /// Assert the structural invariants.
    ///
    /// Intended for tests: every node sits in the bucket its value spreads to, the element count
    /// matches the chains, chains are acyclic, and the threshold is positive. A violation is a
    /// bug in this module (or a misbehaving spread) and panics.
    pub fn check(&self) {
        assert!(self.threshold > 0.0, "load threshold must be positive");

        let table = match self.table {
            Some(ref table) => table,
            None => {
                assert_eq!(self.len, 0, "null table with stored elements");
                return;
            }
        };
        assert!(!table.is_empty(), "allocated table with no buckets");

        let mut total = 0;
        for (row, head) in table.iter().enumerate() {
            let mut link = head;
            while let Some(ref node) = *link {
                assert_eq!(
                    self.spread.spread(node.value(), table.len()),
                    row,
                    "node chained outside its spread bucket"
                );
                total += 1;
                assert!(total <= self.len, "chain cycle or stray node");
                link = &node.next;
            }
        }
        assert_eq!(total, self.len, "element count out of sync with chains");
    }

    /// Allocate the bucket table if it is still null.
    fn materialize(&mut self) {
        if self.table.is_none() {
            self.table = Some((0..self.initial).map(|_| None).collect());
        }
    }

    /// Grow the table if the load threshold is exceeded.
    fn check_load(&mut self) {
        let buckets = match self.table {
            Some(ref table) => table.len(),
            None => return,
        };

        if self.len as f64 / buckets as f64 > self.threshold as f64 {
            let target = 2 * (self.len as f64 / self.threshold as f64).ceil() as usize + 1;
            self.resize(target);
        }
    }

    /// Rehash into a table of `buckets` buckets.
    ///
    /// The nodes themselves move — no reallocation, no reaping, stable node identity.
    fn resize(&mut self, buckets: usize) {
        let old = match self.table.take() {
            Some(table) => table,
            None => return,
        };

        let mut fresh: Vec<Link<V>> = (0..buckets).map(|_| None).collect();
        for head in old {
            let mut link = head;
            while let Some(mut node) = link {
                link = node.next.take();
                let row = self.spread.spread(node.value(), buckets);
                node.next = fresh[row].take();
                fresh[row] = Some(node);
            }
        }

        self.table = Some(fresh);
        self.mutation += 1;
    }
}

impl<V, S: Default, R: Default, P: Default> Default for ChainSet<V, S, R, P> {
    fn default() -> ChainSet<V, S, R, P> {
        ChainSet::new()
    }
}

impl<V: fmt::Debug, S, R, P> fmt::Debug for ChainSet<V, S, R, P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<V: Clone, S: Clone, R: Clone, P: Default + Pool<V>> Clone for ChainSet<V, S, R, P> {
    /// An independent copy with the same bucket count and threshold.
    ///
    /// Elements are cloned with their own `Clone`; the pool starts fresh and the mutation epoch
    /// restarts, so cursors never transfer between a set and its copy.
    fn clone(&self) -> ChainSet<V, S, R, P> {
        let mut pool = P::default();
        let table = match self.table {
            Some(ref table) => Some(
                table
                    .iter()
                    .map(|head| clone_chain(head, &mut pool))
                    .collect(),
            ),
            None => None,
        };

        ChainSet {
            table: table,
            len: self.len,
            threshold: self.threshold,
            initial: self.initial,
            mutation: 0,
            spread: self.spread.clone(),
            reap: self.reap.clone(),
            pool: pool,
        }
    }
}

/// Clone a chain in order through a pool.
fn clone_chain<V: Clone, P: Pool<V>>(head: &Link<V>, pool: &mut P) -> Link<V> {
    let mut values = Vec::new();
    let mut link = head;
    while let Some(ref node) = *link {
        values.push(node.value().clone());
        link = &node.next;
    }

    // Build back-to-front so that prepending preserves the source order.
    let mut chain = None;
    for value in values.into_iter().rev() {
        chain = Some(pool.acquire(value, chain));
    }
    chain
}

impl<V: PartialEq, S: Spread<V>, R: Reap<V>, P: Pool<V>> Extend<V> for ChainSet<V, S, R, P> {
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        self.add_all(iter);
    }
}

impl<V, S, R, P> FromIterator<V> for ChainSet<V, S, R, P>
where
    V: PartialEq,
    S: Spread<V> + Default,
    R: Reap<V> + Default,
    P: Pool<V> + Default,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> ChainSet<V, S, R, P> {
        let mut set = ChainSet::new();
        set.extend(iter);
        set
    }
}

impl<V, S, R, P> Drop for ChainSet<V, S, R, P> {
    fn drop(&mut self) {
        // Break the chains iteratively so deep chains cannot overflow the stack through
        // recursive box drops. Values run their own destructors; the reap hook is a
        // container-initiated-destruction hook and does not apply here.
        if let Some(ref mut table) = self.table {
            for link in table.iter_mut() {
                let mut chain = link.take();
                while let Some(mut node) = chain {
                    chain = node.next.take();
                }
            }
        }
    }
}

/// A detached, epoch-validated cursor over a [`ChainSet`].
///
/// The cursor stores bucket-and-chain positions, not pointers, and holds no borrow: the set is
/// passed back in on every call. Any structural mutation of the set (including rehashes)
/// invalidates the cursor — [`valid`] reports this, and [`next`] yields `None` on a stale
/// cursor. The one exception is the cursor's own [`remove`], which re-tunes the recorded epoch
/// and continues.
///
/// [`ChainSet`]: struct.ChainSet.html
/// [`valid`]: #method.valid
/// [`next`]: #method.next
/// [`remove`]: #method.remove
#[derive(Clone)]
pub struct Cursor {
    /// The bucket being walked.
    row: usize,
    /// The chain position within `row` to yield next.
    at: usize,
    /// The position of the last yielded element, for `remove`.
    prior: Option<(usize, usize)>,
    /// The epoch observed at minting (or re-tuned by `remove`).
    mutation: u64,
}

impl Cursor {
    /// Does the cursor still match the set's mutation epoch?
    ///
    /// This is the sole invalidation mechanism: false here means the set has structurally
    /// changed under the cursor.
    pub fn valid<V, S, R, P>(&self, set: &ChainSet<V, S, R, P>) -> bool {
        set.mutation == self.mutation
    }

    /// Yield the next element, or `None` when exhausted or stale.
    pub fn next<'a, V, S, R, P>(&mut self, set: &'a ChainSet<V, S, R, P>) -> Option<&'a V> {
        if !self.valid(set) {
            return None;
        }
        let table = match set.table {
            Some(ref table) => table,
            None => return None,
        };

        loop {
            if self.row >= table.len() {
                return None;
            }

            let mut link = &table[self.row];
            let mut index = 0;
            loop {
                match *link {
                    Some(ref node) if index == self.at => {
                        self.prior = Some((self.row, self.at));
                        self.at += 1;
                        return Some(node.value());
                    }
                    Some(ref node) => {
                        link = &node.next;
                        index += 1;
                    }
                    None => break,
                }
            }

            self.row += 1;
            self.at = 0;
        }
    }

    /// Remove the element most recently yielded by [`next`].
    ///
    /// The value passes through the reap hook, and the cursor adopts the set's new epoch, so
    /// this self-inflicted mutation does not invalidate it. Returns false if the cursor is
    /// stale, nothing has been yielded, or the element is already gone.
    ///
    /// [`next`]: #method.next
    pub fn remove<V, S, R, P>(&mut self, set: &mut ChainSet<V, S, R, P>) -> bool
    where
        R: Reap<V>,
        P: Pool<V>,
    {
        if !self.valid(set) {
            return false;
        }
        let (row, at) = match self.prior.take() {
            Some(prior) => prior,
            None => return false,
        };

        match set.unhook(row, at) {
            Some(value) => {
                set.reap.reap(value);
                self.mutation = set.mutation;
                // The removed element sat before the cursor in this chain; pull the position
                // back so the walk does not skip its successor.
                if self.row == row && self.at > 0 {
                    self.at -= 1;
                }
                true
            }
            None => false,
        }
    }
}

/// A borrowing iterator over a [`ChainSet`].
///
/// [`ChainSet`]: struct.ChainSet.html
pub struct Iter<'a, V: 'a, S: 'a, R: 'a, P: 'a> {
    /// The set being walked.
    set: &'a ChainSet<V, S, R, P>,
    /// The walking state.
    cursor: Cursor,
}

impl<'a, V, S, R, P> Iterator for Iter<'a, V, S, R, P> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.cursor.next(self.set)
    }
}

impl<'a, V, S, R, P> IntoIterator for &'a ChainSet<V, S, R, P> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V, S, R, P>;

    fn into_iter(self) -> Iter<'a, V, S, R, P> {
        self.iter()
    }
}

/// An owning iterator over a [`ChainSet`].
///
/// Drains the values without reaping — like [`take`], ownership moves to the caller.
///
/// [`ChainSet`]: struct.ChainSet.html
/// [`take`]: struct.ChainSet.html#method.take
pub struct IntoIter<V> {
    /// The remaining buckets.
    table: Vec<Link<V>>,
    /// The chain currently being drained.
    chain: Link<V>,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        loop {
            if let Some(mut node) = self.chain.take() {
                self.chain = node.next.take();
                return Some(match node.vacate() {
                    Some(value) => value,
                    None => unreachable!(),
                });
            }

            match self.table.pop() {
                Some(link) => self.chain = link,
                None => return None,
            }
        }
    }
}

impl<V> Drop for IntoIter<V> {
    fn drop(&mut self) {
        // Drain the remainder node by node; see the set's own `Drop`.
        while let Some(_) = self.next() {}
    }
}

impl<V, S, R, P> IntoIterator for ChainSet<V, S, R, P> {
    type Item = V;
    type IntoIter = IntoIter<V>;

    fn into_iter(mut self) -> IntoIter<V> {
        IntoIter {
            table: self.table.take().unwrap_or_else(Vec::new),
            chain: None,
        }
    }
}
