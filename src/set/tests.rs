use std::cell::Cell;
use std::rc::Rc;

use super::*;

/// A spread placing values by their parity, for deterministic collision tests.
struct Parity;

impl Spread<u32> for Parity {
    fn spread(&self, value: &u32, _buckets: usize) -> usize {
        (*value % 2) as usize
    }
}

/// A spread forcing everything into bucket zero.
struct Lump;

impl Spread<u32> for Lump {
    fn spread(&self, _value: &u32, _buckets: usize) -> usize {
        0
    }
}

/// The identity spread, mod the bucket count.
struct Exact;

impl Spread<u32> for Exact {
    fn spread(&self, value: &u32, buckets: usize) -> usize {
        *value as usize % buckets
    }
}

/// A reap which counts its invocations.
struct Tally(Rc<Cell<usize>>);

impl Reap<u32> for Tally {
    fn reap(&mut self, _value: u32) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn insert_find_remove_thousand() {
    let mut set: ChainSet<u32> = ChainSet::new();

    for i in 0..1000 {
        assert!(set.add(i));
    }
    assert_eq!(set.len(), 1000);
    for i in 0..1000 {
        assert!(set.contains(&i));
    }

    for i in 0..1000 {
        if i % 2 == 0 {
            assert!(set.remove(&i));
        }
    }
    assert_eq!(set.len(), 500);
    assert!(set.contains(&1));
    assert!(!set.contains(&2));

    set.check();
}

#[test]
fn double_add() {
    let mut set: ChainSet<u32> = ChainSet::new();

    assert!(set.add(7));
    assert!(!set.add(7));
    assert_eq!(set.len(), 1);
}

#[test]
fn add_remove_contains() {
    let mut set: ChainSet<u32> = ChainSet::new();

    set.add(42);
    assert!(set.remove(&42));
    assert!(!set.contains(&42));
    assert!(!set.remove(&42));
}

#[test]
fn deterministic_resize() {
    // Four buckets, parity placement: the fourth insertion lands in an occupied bucket, the
    // post-insert load check sees 4/4 > 0.75, and the table grows to 2 * ceil(4 / 0.75) + 1.
    let mut set: ChainSet<u32, Parity, Discard, Heap> =
        ChainSet::assemble(4, 0.75, Parity, Discard, Heap);

    assert_eq!(set.buckets(), 4);
    for i in 1..5 {
        assert!(set.add(i));
    }

    assert_eq!(set.buckets(), 13);
    for i in 1..5 {
        assert!(set.contains(&i));
    }
    set.check();
}

#[test]
fn resize_keeps_membership() {
    let mut set: ChainSet<u32> = ChainSet::new();

    for i in 0..100 {
        set.add(i);
    }

    assert!(set.buckets() > DEFAULT_BUCKETS);
    for i in 0..100 {
        assert!(set.contains(&i));
    }
    set.check();
}

#[test]
fn take_drains_all() {
    let mut set: ChainSet<u32> = ChainSet::new();
    for i in 0..50 {
        set.add(i);
    }

    let mut drained = Vec::new();
    while let Some(value) = set.take() {
        drained.push(value);
    }

    assert!(set.is_empty());
    drained.sort();
    assert_eq!(drained, (0..50).collect::<Vec<_>>());
    set.check();
}

#[test]
fn replace_swaps() {
    let mut set: ChainSet<u32> = ChainSet::new();
    set.add(1);
    set.add(2);

    assert!(set.replace(&1, 3));
    assert!(!set.contains(&1));
    assert!(set.contains(&3));

    // Absent old: nothing happens.
    assert!(!set.replace(&9, 10));
    // Identical old and new: refused untouched.
    assert!(!set.replace(&3, 3));
    assert_eq!(set.len(), 2);
}

#[test]
fn replace_collision_quirk() {
    // Remove-then-add: when the replacement already exists, the old element is still removed,
    // the insertion is refused, and the call still reports true.
    let mut set: ChainSet<u32> = ChainSet::new();
    set.add(2);
    set.add(3);

    assert!(set.replace(&2, 3));
    assert_eq!(set.len(), 1);
    assert!(!set.contains(&2));
    assert!(set.contains(&3));
}

#[test]
fn bulk_add_remove() {
    let mut set: ChainSet<u32> = ChainSet::new();

    assert_eq!(set.add_all(0..10), 10);
    assert_eq!(set.add_all(5..15), 5);
    assert_eq!(set.len(), 15);

    let gone = [0u32, 1, 2, 99];
    assert_eq!(set.remove_all(gone.iter()), 3);
    assert_eq!(set.len(), 12);
}

#[test]
fn clear_keeps_table_reset_drops_it() {
    let mut set: ChainSet<u32> = ChainSet::new();
    for i in 0..200 {
        set.add(i);
    }
    let grown = set.buckets();

    set.clear();
    assert!(set.is_empty());
    assert_eq!(set.buckets(), grown);
    assert!(set.add(1));

    set.reset();
    assert!(set.is_empty());
    assert_eq!(set.buckets(), DEFAULT_BUCKETS);
    set.check();
}

#[test]
fn reap_runs_on_remove_and_clear() {
    let reaped = Rc::new(Cell::new(0));
    let mut set: ChainSet<u32, SeaSpread, Tally, Heap> = ChainSet::assemble(
        DEFAULT_BUCKETS,
        DEFAULT_THRESHOLD,
        SeaSpread,
        Tally(reaped.clone()),
        Heap,
    );

    for i in 0..10 {
        set.add(i);
    }
    assert!(set.remove(&3));
    assert_eq!(reaped.get(), 1);

    set.clear();
    assert_eq!(reaped.get(), 10);

    // Ownership transfer is not destruction: take does not reap.
    set.add(5);
    set.take();
    assert_eq!(reaped.get(), 10);
}

#[test]
fn chunk_pool_sweeps_wholesale() {
    let reaped = Rc::new(Cell::new(0));
    let mut set: ChainSet<u32, SeaSpread, Tally, Chunk<u32>> = ChainSet::assemble(
        DEFAULT_BUCKETS,
        DEFAULT_THRESHOLD,
        SeaSpread,
        Tally(reaped.clone()),
        Chunk::default(),
    );

    for i in 0..10 {
        set.add(i);
    }
    // Individual removal still reaps.
    assert!(set.remove(&1));
    assert_eq!(reaped.get(), 1);

    // Mass teardown sweeps wholesale and skips the reap.
    set.clear();
    assert_eq!(reaped.get(), 1);
    assert!(set.is_empty());
}

#[test]
fn chunk_pool_survives_churn() {
    let mut pool = Chunk::default();
    Pool::<u32>::config(&mut pool, 16, 4);
    let mut set: ChainSet<u32, SeaSpread, Discard, Chunk<u32>> =
        ChainSet::assemble(DEFAULT_BUCKETS, DEFAULT_THRESHOLD, SeaSpread, Discard, pool);

    for round in 0..100 {
        for i in 0..32 {
            set.add(round * 32 + i);
        }
        for i in 0..32 {
            assert!(set.remove(&(round * 32 + i)));
        }
    }

    assert!(set.is_empty());
    set.check();
}

#[test]
fn cursor_yields_everything() {
    let mut set: ChainSet<u32> = ChainSet::new();
    for i in 0..20 {
        set.add(i);
    }

    let mut cursor = set.cursor();
    let mut seen = Vec::new();
    while let Some(&value) = cursor.next(&set) {
        seen.push(value);
    }

    seen.sort();
    let mut reference = set.to_vec();
    reference.sort();
    assert_eq!(seen, reference);
    assert_eq!(seen.len(), set.len());
}

#[test]
fn cursor_invalidated_by_external_mutation() {
    let mut set: ChainSet<&'static str> = ChainSet::new();
    set.add("a");
    set.add("b");
    set.add("c");

    let mut cursor = set.cursor();
    assert!(cursor.next(&set).is_some());

    assert!(set.remove(&"b"));
    assert!(!cursor.valid(&set));
    assert!(cursor.next(&set).is_none());
    assert!(!cursor.remove(&mut set));
}

#[test]
fn cursor_remove_self_tunes() {
    let mut set: ChainSet<u32> = ChainSet::new();
    for i in 0..10 {
        set.add(i);
    }

    let mut cursor = set.cursor();
    loop {
        let value = match cursor.next(&set) {
            Some(&value) => value,
            None => break,
        };
        if value % 2 == 0 {
            assert!(cursor.remove(&mut set));
            assert!(cursor.valid(&set));
        }
    }

    assert_eq!(set.len(), 5);
    for i in 0..10 {
        assert_eq!(set.contains(&i), i % 2 == 1);
    }
    set.check();
}

#[test]
fn dup_is_independent() {
    let mut set: ChainSet<u32> = ChainSet::new();
    for i in 0..10 {
        set.add(i);
    }

    let mut copy = set.clone();
    assert_eq!(copy.len(), set.len());
    assert_eq!(copy.buckets(), set.buckets());
    assert_eq!(copy.threshold(), set.threshold());

    set.remove(&3);
    assert!(copy.contains(&3));
    copy.add(100);
    assert!(!set.contains(&100));

    for i in 4..10 {
        assert_eq!(set.contains(&i), copy.contains(&i));
    }
    copy.check();
}

#[test]
fn to_vec_matches_iter() {
    let mut set: ChainSet<u32> = ChainSet::new();
    set.add_all(0..33);

    let mut array = set.to_vec();
    assert_eq!(array.len(), set.len());

    let mut walked: Vec<u32> = set.iter().cloned().collect();
    array.sort();
    walked.sort();
    assert_eq!(array, walked);
}

#[test]
fn from_iter_extend_into_iter() {
    let set: ChainSet<u32> = (0..10).collect();
    assert_eq!(set.len(), 10);

    let mut values: Vec<u32> = set.into_iter().collect();
    values.sort();
    assert_eq!(values, (0..10).collect::<Vec<_>>());
}

#[test]
fn chain_order_within_bucket() {
    // Everything lumps into bucket zero; insertion prepends, removal preserves order.
    let mut set: ChainSet<u32, Lump, Discard, Heap> =
        ChainSet::assemble(4, 100.0, Lump, Discard, Heap);
    set.add(1);
    set.add(2);
    set.add(3);

    let walked: Vec<u32> = set.iter().cloned().collect();
    assert_eq!(walked, vec![3, 2, 1]);

    set.remove(&2);
    let walked: Vec<u32> = set.iter().cloned().collect();
    assert_eq!(walked, vec![3, 1]);
    set.check();
}

#[test]
fn threshold_setter_resizes() {
    let mut set: ChainSet<u32, Exact, Discard, Heap> =
        ChainSet::assemble(16, DEFAULT_THRESHOLD, Exact, Discard, Heap);
    for i in 0..12 {
        set.add(i);
    }
    // Twelve distinct buckets of sixteen: no collision ever fired the load check.
    assert_eq!(set.buckets(), 16);

    set.set_threshold(0.5);
    assert_eq!(set.buckets(), 2 * 24 + 1);
    for i in 0..12 {
        assert!(set.contains(&i));
    }
    set.check();
}

#[test]
fn set_buckets_clamps_and_rehashes() {
    let mut set: ChainSet<u32> = ChainSet::with_buckets(7);
    for i in 0..5 {
        set.add(i);
    }
    assert_eq!(set.buckets(), 7);

    // The setter clamps to the subsystem floor.
    set.set_buckets(2);
    assert_eq!(set.buckets(), DEFAULT_BUCKETS);

    set.set_buckets(64);
    assert_eq!(set.buckets(), 64);
    for i in 0..5 {
        assert!(set.contains(&i));
    }
    set.check();
}

#[test]
fn empty_behaviour() {
    let mut set: ChainSet<u32> = ChainSet::new();

    assert!(set.is_empty());
    assert!(!set.contains(&1));
    assert!(!set.remove(&1));
    assert!(set.take().is_none());
    assert!(set.iter().next().is_none());

    set.clear();
    set.reset();
    set.check();
}

#[test]
fn spam_insert() {
    let mut set: ChainSet<u32> = ChainSet::new();

    for i in 0..10000 {
        assert!(set.add(i));
        assert!(!set.add(i));
    }
    assert_eq!(set.len(), 10000);
    set.check();
}
