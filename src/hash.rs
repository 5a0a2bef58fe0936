//! A fixed-size, separately-chained hash table.
//!
//! This is a from-scratch generic port of NSD's `hash.c`: one
//! contiguous bucket array sized at creation (no automatic growth),
//! each bucket holding its first entry inline and spilling collisions
//! into allocated chain links. The `collisions` counter only increments
//! on a true chain extension, never on a duplicate-key overwrite,
//! exactly as in the source.
//!
//! Unlike `hash.c`, iteration does not live inside the table: `iter()`
//! borrows the table and returns a normal `Iterator`, so concurrent
//! (read-only) iterations never alias a shared cursor. `hash.c`'s
//! caller-supplied `mallocf`/`cmpf`/`hashf` triple is replaced by
//! ordinary Rust generics (`K: Hash + Eq`, `S: BuildHasher`).

use std::hash::{BuildHasher, Hash, RandomState};

use crate::error::{Error, ErrorKind, Result};

struct Node<K, V> {
    key: K,
    value: V,
    next: Option<Box<Node<K, V>>>,
}

enum Bucket<K, V> {
    Empty,
    Head(Node<K, V>),
}

/// A closed hash table with separate chaining, fixed at `size` buckets.
pub struct HashTable<K, V, S = RandomState> {
    buckets: Vec<Bucket<K, V>>,
    size: usize,
    count: usize,
    collisions: usize,
    hasher: S,
}

impl<K, V> HashTable<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Creates a table with `size` buckets. `size == 0` is rejected,
    /// matching `hash_create`'s `EINVAL` behavior.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_hasher(size, RandomState::new())
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(size: usize, hasher: S) -> Result<Self> {
        if size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "hash table size must be non-zero",
            ));
        }
        let mut buckets = Vec::with_capacity(size);
        buckets.resize_with(size, || Bucket::Empty);
        Ok(HashTable {
            buckets,
            size,
            count: 0,
            collisions: 0,
            hasher,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of inserts that had to extend a chain past the bucket
    /// head. Does not count overwrites of an existing key.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    fn bucket_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.size as u64) as usize
    }

    /// Inserts `key`/`value`.
    ///
    /// If the bucket is empty, it is occupied directly. If `key`
    /// already exists: with `overwrite = true` the existing node's key
    /// and value are replaced in place and `true` is returned; with
    /// `overwrite = false` nothing is changed and `false` is returned.
    /// Otherwise a new chain link is appended, `collisions` is bumped,
    /// and `true` is returned.
    ///
    /// Note this corrects the source's latent bug: `hash_insert` in
    /// `hash.c` mutates `node->next` on an overwrite match instead of
    /// the matched node itself. Here the matched node is mutated.
    pub fn insert(&mut self, key: K, value: V, overwrite: bool) -> bool {
        let idx = self.bucket_index(&key);
        match &mut self.buckets[idx] {
            bucket @ Bucket::Empty => {
                *bucket = Bucket::Head(Node {
                    key,
                    value,
                    next: None,
                });
                self.count += 1;
                true
            }
            Bucket::Head(head) => {
                let mut node = head;
                loop {
                    if node.key == key {
                        return if overwrite {
                            node.key = key;
                            node.value = value;
                            true
                        } else {
                            false
                        };
                    }
                    if node.next.is_some() {
                        node = node.next.as_mut().unwrap();
                    } else {
                        break;
                    }
                }
                node.next = Some(Box::new(Node {
                    key,
                    value,
                    next: None,
                }));
                self.count += 1;
                self.collisions += 1;
                true
            }
        }
    }

    /// Walks the bucket chain for `key`'s hash, returning the first
    /// key-equal entry's value.
    pub fn get(&self, key: &K) -> Option<&V> {
        let idx = self.bucket_index(key);
        let mut node = match &self.buckets[idx] {
            Bucket::Empty => return None,
            Bucket::Head(head) => head,
        };
        loop {
            if &node.key == key {
                return Some(&node.value);
            }
            node = node.next.as_deref()?;
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Borrowing iterator over every occupied `(key, value)`, bucket
    /// order ascending then chain order. Visits exactly `len()` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: &self.buckets,
            bucket_idx: 0,
            node: None,
        }
    }

    /// Consumes the table, handing back every key/value pair without
    /// running their `Drop` impls early. The Rust equivalent of
    /// `hash_destroy` called with both free flags turned off.
    pub fn into_inner(self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.count);
        for bucket in self.buckets {
            if let Bucket::Head(head) = bucket {
                let mut node = Some(Box::new(head));
                while let Some(n) = node {
                    let n = *n;
                    out.push((n.key, n.value));
                    node = n.next;
                }
            }
        }
        out
    }
}

impl<K, V, S> std::fmt::Debug for HashTable<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashTable")
            .field("size", &self.size)
            .field("count", &self.count)
            .field("collisions", &self.collisions)
            .finish()
    }
}

pub struct Iter<'a, K, V> {
    buckets: &'a [Bucket<K, V>],
    bucket_idx: usize,
    node: Option<&'a Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(node) = self.node {
            self.node = node.next.as_deref();
            return Some((&node.key, &node.value));
        }
        while self.bucket_idx < self.buckets.len() {
            let idx = self.bucket_idx;
            self.bucket_idx += 1;
            if let Bucket::Head(head) = &self.buckets[idx] {
                self.node = head.next.as_deref();
                return Some((&head.key, &head.value));
            }
        }
        None
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
