//! Set policies.
//!
//! Three orthogonal behaviors of the set are factored out as policies, chosen per instance
//! through type parameters:
//!
//! - [`Spread`] places a value in a bucket (the hash policy).
//! - [`Reap`] consumes a value when the *container* destroys it (a destruction hook).
//! - [`Pool`] allocates and reclaims the chain nodes.
//!
//! Each has a stock implementation which the set defaults to, so `ChainSet<V>` works out of the
//! box; custom policies are for callers with placement, teardown, or allocation needs of their
//! own (tests in this crate use a deterministic spread, for example).
//!
//! [`Spread`]: trait.Spread.html
//! [`Reap`]: trait.Reap.html
//! [`Pool`]: trait.Pool.html

use std::hash::{Hash, Hasher};

use seahash::SeaHasher;

use set::node::{Link, Node};

/// A bucket-placement policy.
///
/// Implementations must be deterministic, must return an index in `[0, buckets)`, and must agree
/// with equality: equal values spread to equal buckets for any bucket count.
pub trait Spread<V> {
    /// Map `value` to a bucket index below `buckets`.
    fn spread(&self, value: &V, buckets: usize) -> usize;
}

/// The stock spread: SeaHash over the value's `Hash` implementation, reduced mod the bucket
/// count.
#[derive(Clone, Copy, Default)]
pub struct SeaSpread;

impl<V: Hash> Spread<V> for SeaSpread {
    fn spread(&self, value: &V, buckets: usize) -> usize {
        let mut hasher = SeaHasher::new();
        value.hash(&mut hasher);

        (hasher.finish() % buckets as u64) as usize
    }
}

/// An element-destruction hook.
///
/// The set invokes the reap exactly once per element whose destruction *it* initiates (`remove`,
/// cursor removal, `clear`, `reset`). Elements handed back to the caller (`take`, the owning
/// iterator) are not destroyed and hence not reaped. The hook must not fail.
pub trait Reap<V> {
    /// Consume a value the container is destroying.
    fn reap(&mut self, value: V);
}

/// The stock reap: drop the value and nothing else.
#[derive(Clone, Copy, Default)]
pub struct Discard;

impl<V> Reap<V> for Discard {
    fn reap(&mut self, _value: V) {}
}

/// A node allocation policy.
///
/// The pool is owned by the set and is the only source and sink of chain nodes. Note that the
/// bucket table itself is a plain `Vec`; the pool's scope is nodes only.
pub trait Pool<V> {
    /// Allocate a node holding `value`, linked to `next`.
    fn acquire(&mut self, value: V, next: Link<V>) -> Box<Node<V>>;

    /// Reclaim a node, yielding the value it held.
    ///
    /// The pool owns the allocation from here on; it may free it or park it for reuse.
    fn release(&mut self, node: Box<Node<V>>) -> V;

    /// May outstanding nodes be disposed of wholesale?
    ///
    /// When this returns true, mass teardown (`clear`, `reset`) drops entire chains in one sweep
    /// instead of releasing node by node, and with that skips the per-value reap. When it returns
    /// false, every node goes through [`release`] and every value through the reap.
    ///
    /// [`release`]: #tymethod.release
    fn sweep(&mut self) -> bool;

    /// Advise the pool of the expected allocation pattern.
    ///
    /// A hint, not a command; the stock heap pool ignores it.
    fn config(&mut self, _chunk_size: usize, _chunk_count: usize) {}
}

/// The stock pool: one heap allocation per node, freed on release.
#[derive(Clone, Copy, Default)]
pub struct Heap;

impl<V> Pool<V> for Heap {
    fn acquire(&mut self, value: V, next: Link<V>) -> Box<Node<V>> {
        Box::new(Node::occupied(value, next))
    }

    fn release(&mut self, mut node: Box<Node<V>>) -> V {
        match node.vacate() {
            Some(value) => value,
            None => panic!("released a vacant node"),
        }
    }

    fn sweep(&mut self) -> bool {
        // Nodes must come back one by one, so that each value passes through the reap.
        false
    }
}

/// How many vacant nodes `Chunk` parks when not configured otherwise.
const DEFAULT_RESERVE: usize = 64;

/// A recycling pool.
///
/// Released nodes are vacated and parked on a freelist (up to a bound), and later acquisitions
/// reuse the parked allocations instead of going to the heap. This pays off for sets with heavy
/// remove/add churn.
///
/// Mass teardown is wholesale for this pool ([`sweep`] returns true): on `clear` and `reset` the
/// chains are dropped in bulk, skipping both the freelist and the per-value reap.
///
/// [`sweep`]: trait.Pool.html#tymethod.sweep
pub struct Chunk<V> {
    /// The parked vacant nodes.
    free: Vec<Box<Node<V>>>,
    /// The bound on `free`.
    reserve: usize,
}

impl<V> Default for Chunk<V> {
    fn default() -> Chunk<V> {
        Chunk {
            free: Vec::new(),
            reserve: DEFAULT_RESERVE,
        }
    }
}

impl<V> Pool<V> for Chunk<V> {
    fn acquire(&mut self, value: V, next: Link<V>) -> Box<Node<V>> {
        match self.free.pop() {
            Some(mut node) => {
                node.occupy(value, next);
                node
            }
            None => Box::new(Node::occupied(value, next)),
        }
    }

    fn release(&mut self, mut node: Box<Node<V>>) -> V {
        let value = match node.vacate() {
            Some(value) => value,
            None => panic!("released a vacant node"),
        };

        node.next = None;
        if self.free.len() < self.reserve {
            self.free.push(node);
        }

        value
    }

    fn sweep(&mut self) -> bool {
        true
    }

    /// Interpret the hint as a bound on parked nodes: `chunk_size` nodes per chunk,
    /// `chunk_count` chunks.
    fn config(&mut self, chunk_size: usize, chunk_count: usize) {
        self.reserve = chunk_size.saturating_mul(chunk_count);
        self.free.truncate(self.reserve);
    }
}
