//! Priority frontier
//!
//! Entries are ordered by `(key, is_transition, label)`: on equal keys a real
//! edge pops before a level transition, and lower label indices pop first.
//!
//! [`BucketQueue`] exploits the narrow range of road costs: keys fall into
//! fixed-width buckets, the current bucket is scanned for the exact minimum,
//! and keys beyond the last bucket wait in an overflow list that is
//! redistributed once the buckets run dry. Decrease-key is lazy: the new
//! entry is filed and the old one is dropped when met.
//!
//! [`HeapQueue`] is a plain indexed heap for comparison.

use priority_queue::PriorityQueue;
use rustc_hash::{FxBuildHasher, FxHashMap};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

/// Frontiers live inside searches that move between worker threads
pub trait Frontier: Send {
    fn push(&mut self, label: u32, key: f32, transition: bool);

    /// Lower the key of a label already in the frontier
    fn decrease(&mut self, label: u32, key: f32, transition: bool);

    fn pop(&mut self) -> Option<u32>;

    /// Smallest key in the frontier
    fn min_key(&mut self) -> Option<f32>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontierKind {
    #[default]
    Bucket,
    Heap,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    key: f32,
    transition: bool,
    label: u32,
}

impl Entry {
    fn order(&self, other: &Entry) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then(self.transition.cmp(&other.transition))
            .then(self.label.cmp(&other.label))
    }
}

pub struct BucketQueue {
    bucket_size: f32,
    /// Key at the start of bucket 0
    base: f32,
    current: usize,
    buckets: Vec<Vec<Entry>>,
    overflow: Vec<Entry>,
    /// Live entry per label; anything else found in a bucket is stale
    live: FxHashMap<u32, Entry>,
}

impl BucketQueue {
    pub fn new(bucket_size: f32, bucket_count: usize) -> Self {
        let bucket_size = if bucket_size > 0.0 { bucket_size } else { 1.0 };
        Self {
            bucket_size,
            base: 0.0,
            current: 0,
            buckets: vec![Vec::new(); bucket_count.max(1)],
            overflow: Vec::new(),
            live: FxHashMap::default(),
        }
    }

    fn file(&mut self, entry: Entry) {
        let offset = ((entry.key - self.base) / self.bucket_size).floor();
        // Keys below the current bucket go into it; the exact scan still finds them
        let idx = if offset.is_finite() && offset > self.current as f32 {
            offset as usize
        } else if offset.is_finite() || offset < 0.0 {
            self.current
        } else {
            usize::MAX
        };
        match self.buckets.get_mut(idx) {
            Some(bucket) => bucket.push(entry),
            None => self.overflow.push(entry),
        }
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.live.get(&entry.label) == Some(entry)
    }

    /// Moves to the first bucket holding a live entry, refilling from the
    /// overflow list when needed. Returns false when the queue is empty.
    fn advance(&mut self) -> bool {
        loop {
            while self.current < self.buckets.len() {
                let mut bucket = std::mem::take(&mut self.buckets[self.current]);
                bucket.retain(|e| self.is_live(e));
                let found = !bucket.is_empty();
                self.buckets[self.current] = bucket;
                if found {
                    return true;
                }
                self.current += 1;
            }

            let mut pending = std::mem::take(&mut self.overflow);
            pending.retain(|e| self.is_live(e));
            let Some(min) = pending.iter().map(|e| e.key).min_by(|a, b| a.total_cmp(b)) else {
                return false;
            };
            self.base = if min.is_finite() {
                (min / self.bucket_size).floor() * self.bucket_size
            } else {
                min
            };
            self.current = 0;
            if !min.is_finite() {
                // Only infinite keys left; they share the first bucket
                self.buckets[0] = pending;
                return true;
            }
            for entry in pending {
                self.file(entry);
            }
        }
    }

    fn min_position(&self) -> Option<usize> {
        let bucket = &self.buckets[self.current];
        bucket
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.order(b))
            .map(|(i, _)| i)
    }
}

impl Frontier for BucketQueue {
    fn push(&mut self, label: u32, key: f32, transition: bool) {
        let entry = Entry {
            key,
            transition,
            label,
        };
        self.live.insert(label, entry);
        self.file(entry);
    }

    fn decrease(&mut self, label: u32, key: f32, transition: bool) {
        debug_assert!(
            self.live.get(&label).map_or(true, |e| key <= e.key),
            "decrease-key raised the key of label {label}"
        );
        self.push(label, key, transition);
    }

    fn pop(&mut self) -> Option<u32> {
        if !self.advance() {
            return None;
        }
        let pos = self.min_position()?;
        let entry = self.buckets[self.current].swap_remove(pos);
        self.live.remove(&entry.label);
        Some(entry.label)
    }

    fn min_key(&mut self) -> Option<f32> {
        if !self.advance() {
            return None;
        }
        let pos = self.min_position()?;
        Some(self.buckets[self.current][pos].key)
    }

    fn len(&self) -> usize {
        self.live.len()
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.overflow.clear();
        self.live.clear();
        self.base = 0.0;
        self.current = 0;
    }
}

/// Total order over `f32` keys for the heap
#[derive(Debug, Clone, Copy, PartialEq)]
struct SortKey(f32, bool, u32);

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .total_cmp(&other.0)
            .then(self.1.cmp(&other.1))
            .then(self.2.cmp(&other.2))
    }
}

pub struct HeapQueue {
    pq: PriorityQueue<u32, Reverse<SortKey>, FxBuildHasher>,
}

impl HeapQueue {
    pub fn new() -> Self {
        Self {
            pq: PriorityQueue::with_default_hasher(),
        }
    }
}

impl Default for HeapQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Frontier for HeapQueue {
    fn push(&mut self, label: u32, key: f32, transition: bool) {
        self.pq.push(label, Reverse(SortKey(key, transition, label)));
    }

    fn decrease(&mut self, label: u32, key: f32, transition: bool) {
        self.pq
            .push_increase(label, Reverse(SortKey(key, transition, label)));
    }

    fn pop(&mut self) -> Option<u32> {
        self.pq.pop().map(|(label, _)| label)
    }

    fn min_key(&mut self) -> Option<f32> {
        self.pq.peek().map(|(_, Reverse(key))| key.0)
    }

    fn len(&self) -> usize {
        self.pq.len()
    }

    fn clear(&mut self) {
        self.pq.clear();
    }
}

pub fn new_frontier(kind: FrontierKind, bucket_size: f32, bucket_count: usize) -> Box<dyn Frontier> {
    match kind {
        FrontierKind::Bucket => Box::new(BucketQueue::new(bucket_size, bucket_count)),
        FrontierKind::Heap => Box::new(HeapQueue::new()),
    }
}
