use std::cmp::Ordering as CmpOrdering;
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};

use crossbeam::utils::{Backoff, CachePadded};
use tracing::{debug, trace};

use super::node_store::{ArenaStore, HeapStore, NodeStore};
use super::skip_node::SkipNode;
use crate::comparator::{Comparator, NaturalOrder};
use crate::config::{MAX_LEVEL, SkipListConfig, ValueMode};
use crate::data_structures::element::Element;
use crate::data_structures::internal::aux_path::{AuxPath, AuxPathPool};
use crate::error::{Result, SkipListError};
use crate::guard::Guard;
use crate::preemptive_synchronization::{OptimisticLock, VersionTokens};

type NodePtr<K, V> = *mut SkipNode<K, V>;

// =============================================================================
// LAZY SKIP LIST: OPTIMISTIC LOCKING PROTOCOL
// =============================================================================
//
// Level 3:  HEAD ─────────────────────────────────────► 30 ─────────────────► NULL
// Level 2:  HEAD ──────────► 10 ─────────────────────► 30 ─────────────────► NULL
// Level 1:  HEAD ──────────► 10 ──────────► 20 ──────► 30 ─────────────────► NULL
// Level 0:  HEAD ──────────► 10 ──────────► 20 ──────► 30 ──────────► 40 ──► NULL
//
// Every key owns one node; the node owns a value container (one value, an
// insertion-ordered chain or a sorted set). Readers never lock. Writers
// traverse lock-free, lock the nodes they rewire, validate what they saw and
// restart from scratch when validation fails.
//
// NODE STATES (flag word):
//
//   allocated ──mark_inserted──► live ──set_removing──► removing ──unlink──► retired
//                                  ▲                        │
//                                  └──────clear_removing────┘  (values left)
//
// INSERT (key not present):
//   1. Traverse, recording pred/succ per level into an AuxPath
//   2. Lock preds for levels 0..level (same pred on adjacent levels: once)
//   3. Validate each level: pred not removing, succ not removing,
//      pred.next[l] == succ. Failure: unlock all, restart
//   4. Raise `levels` to the node level, then wire node.next[l] = succ and
//      pred.next[l] = node, mark the node inserted, unlock
//
// INSERT (key present):
//   Lock the node, recheck it is not removing and merge the value into its
//   container.
//
// REMOVE:
//   1. Traverse, recording the highest level the key was seen at (found)
//   2. try_lock the node; a node already removing is reported, not retried
//   3. Flag it removing, lock preds for levels 0..=found and validate
//      pred not removing and pred.next[l] == node
//   4. Take values. When none remain, unlink from `found` down to 0 and
//      retire the node through the store; otherwise clear removing
//
// LOCK ORDER:
//   Locks are always taken in descending key order (the node first, then
//   preds from level 0 upwards), so two writers can never wait on each other
//   in a cycle.
//
// READERS:
//   A node is visible when it is inserted, not removing and holds at least
//   one value. Unlinked nodes and value cells stay readable until the guard
//   (or the arena store) destroys them.
//
// =============================================================================

struct Counters {
    len: AtomicI64,
    nodes: AtomicI64,
    indices: AtomicU64,
    levels: AtomicUsize,
}

/// Predecessor locks taken by one write attempt, released on drop.
struct PredecessorLocks<K, V> {
    held: [NodePtr<K, V>; MAX_LEVEL],
    len: usize,
    token: u64,
}

impl<K, V> PredecessorLocks<K, V> {
    fn new(token: u64) -> Self {
        PredecessorLocks {
            held: [ptr::null_mut(); MAX_LEVEL],
            len: 0,
            token,
        }
    }

    /// Lock `pred` unless it is the predecessor locked last.
    ///
    /// # Safety
    /// `pred` must point to a node protected by a pinned read guard.
    unsafe fn acquire(&mut self, pred: NodePtr<K, V>) {
        if self.len > 0 && self.held[self.len - 1] == pred {
            return;
        }
        unsafe { (*pred).lock().lock(self.token) };
        self.held[self.len] = pred;
        self.len += 1;
    }
}

impl<K, V> Drop for PredecessorLocks<K, V> {
    fn drop(&mut self) {
        for &pred in self.held[..self.len].iter().rev() {
            unsafe { (*pred).lock().unlock(self.token) };
        }
    }
}

/// A concurrent ordered map from keys to one or many values.
///
/// Generic over the memory reclamation guard `G` and the node store `S`.
/// `SkipList<K, V, G>` allocates each node on the heap; [`ArenaSkipList`]
/// carves nodes out of a bump arena.
pub struct SkipList<K, V, G: Guard, S: NodeStore = HeapStore> {
    head: NodePtr<K, V>,
    key_cmp: Box<dyn Comparator<K>>,
    value_cmp: Option<Box<dyn Comparator<V>>>,
    config: SkipListConfig,
    tokens: VersionTokens,
    stats: CachePadded<Counters>,
    paths: AuxPathPool<SkipNode<K, V>>,
    store: S,
    guard: G,
}

/// Skip list whose nodes live in a bump arena.
pub type ArenaSkipList<K, V, G> = SkipList<K, V, G, ArenaStore>;

// Safety: nodes are only shared through atomics, node locks and the guard
unsafe impl<K, V, G, S> Send for SkipList<K, V, G, S>
where
    K: Send + Sync,
    V: Send + Sync,
    G: Guard,
    S: NodeStore,
{
}

unsafe impl<K, V, G, S> Sync for SkipList<K, V, G, S>
where
    K: Send + Sync,
    V: Send + Sync,
    G: Guard,
    S: NodeStore,
{
}

impl<K, V, G: Guard, S: NodeStore> SkipList<K, V, G, S>
where
    K: Clone,
    V: Clone,
{
    // =========================================================================
    // Construction
    // =========================================================================

    pub fn new(config: SkipListConfig, key_cmp: impl Comparator<K> + 'static) -> Result<Self> {
        Self::build(config, Box::new(key_cmp), None)
    }

    /// Build a list that also orders values; required for
    /// `ValueMode::DuplicateOrdered`.
    pub fn with_value_order(
        config: SkipListConfig,
        key_cmp: impl Comparator<K> + 'static,
        value_cmp: impl Comparator<V> + 'static,
    ) -> Result<Self> {
        Self::build(config, Box::new(key_cmp), Some(Box::new(value_cmp)))
    }

    fn build(
        config: SkipListConfig,
        key_cmp: Box<dyn Comparator<K>>,
        value_cmp: Option<Box<dyn Comparator<V>>>,
    ) -> Result<Self> {
        config.validate()?;
        if config.value_mode == ValueMode::DuplicateOrdered && value_cmp.is_none() {
            return Err(SkipListError::InvalidConfig(
                "duplicate ordered mode requires a value comparator",
            ));
        }

        let store = S::from_config(&config)?;
        let head = SkipNode::alloc_head(config.max_level, config.lock_backend)?;

        debug!(
            value_mode = ?config.value_mode,
            max_level = config.max_level,
            lock_backend = ?config.lock_backend,
            "skip list created"
        );

        Ok(SkipList {
            head,
            key_cmp,
            value_cmp,
            config,
            tokens: VersionTokens::new(),
            stats: CachePadded::new(Counters {
                len: AtomicI64::new(0),
                nodes: AtomicI64::new(0),
                indices: AtomicU64::new(0),
                levels: AtomicUsize::new(1),
            }),
            paths: AuxPathPool::new(config.path_pool_limit),
            store,
            guard: G::default(),
        })
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    #[inline]
    fn compare(&self, node: &SkipNode<K, V>, key: &K) -> CmpOrdering {
        self.key_cmp.compare(node.key(), key)
    }

    #[inline]
    fn value_order(&self) -> Option<&dyn Comparator<V>> {
        self.value_cmp.as_deref()
    }

    #[inline]
    fn top_level(&self) -> usize {
        self.stats.levels.load(Ordering::Acquire)
    }

    /// Descend from `top` recording pred/succ per level.
    ///
    /// Returns the highest level a node with `key` was seen at, and that
    /// node. With `stop_on_match` the descent ends at the first match and
    /// lower levels of `path` are left untouched.
    fn find_path(
        &self,
        key: &K,
        top: usize,
        path: &mut AuxPath<SkipNode<K, V>>,
        stop_on_match: bool,
    ) -> (Option<usize>, NodePtr<K, V>) {
        let mut found_level = None;
        let mut found = ptr::null_mut();
        let mut pred = self.head;

        for level in (0..top).rev() {
            let mut curr = unsafe { (*pred).next(level) };

            while let Some(node) = unsafe { curr.as_ref() } {
                match self.compare(node, key) {
                    CmpOrdering::Less => {
                        pred = curr;
                        curr = node.next(level);
                    }
                    CmpOrdering::Equal => {
                        if found_level.is_none() {
                            found_level = Some(level);
                            found = curr;
                        }
                        break;
                    }
                    CmpOrdering::Greater => break,
                }
            }

            path.record(level, pred, curr);
            if stop_on_match && found_level.is_some() {
                break;
            }
        }

        (found_level, found)
    }

    /// Lock-free point lookup. Caller holds a pinned read guard.
    fn find_node(&self, key: &K) -> Option<&SkipNode<K, V>> {
        let mut pred = self.head;

        for level in (0..self.top_level()).rev() {
            let mut curr = unsafe { (*pred).next(level) };

            while let Some(node) = unsafe { curr.as_ref() } {
                match self.compare(node, key) {
                    CmpOrdering::Less => {
                        pred = curr;
                        curr = node.next(level);
                    }
                    CmpOrdering::Equal => return Some(node),
                    CmpOrdering::Greater => break,
                }
            }
        }

        None
    }

    /// First node at level 0 that readers may see.
    fn first_visible(&self) -> Option<&SkipNode<K, V>> {
        let mut curr = unsafe { (*self.head).next(0) };
        while let Some(node) = unsafe { curr.as_ref() } {
            if node.is_visible() {
                return Some(node);
            }
            curr = node.next(0);
        }
        None
    }

    #[inline]
    /// The ceiling bounds distinct keys (linked nodes), not stored values.
    fn is_full(&self) -> bool {
        self.stats.nodes.load(Ordering::Acquire) >= self.config.max_elements
    }

    fn require_duplicates(&self) -> Result<()> {
        if self.config.value_mode.allows_duplicates() {
            Ok(())
        } else {
            Err(SkipListError::UnsupportedValueMode(self.config.value_mode))
        }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert `value` under `key`.
    ///
    /// In `Unique` mode an existing value is replaced, unless `if_not_present`
    /// is set, in which case `ReplaceDisabled` is returned and the stored value
    /// is kept. The duplicate modes never replace and ignore `if_not_present`:
    /// `DuplicateList` appends, `DuplicateOrdered` places the value after every
    /// value comparing less or equal.
    ///
    /// Fails with `Full` once the list holds `max_elements` nodes.
    pub fn insert(&self, key: K, value: V, if_not_present: bool) -> Result<()> {
        let _read = G::pin();
        let backoff = Backoff::new();
        let mut path = self.paths.acquire();

        loop {
            if self.is_full() {
                return Err(SkipListError::Full);
            }

            let elements = self.stats.nodes.load(Ordering::Relaxed).max(0) as u64;
            let level = (self.config.level_fn)(self.config.max_level, elements)
                .clamp(1, self.config.max_level);
            let top = self.top_level().max(level);

            let (_, found) = self.find_path(&key, top, &mut path, true);

            if let Some(node) = unsafe { found.as_ref() } {
                // Mid-insert or on its way out: wait for it to settle
                if !node.flags().is_live() {
                    backoff.snooze();
                    continue;
                }

                let token = self.tokens.next_token();
                node.lock().lock(token);
                if node.flags().is_removing() {
                    node.lock().unlock(token);
                    backoff.snooze();
                    continue;
                }

                let stored = unsafe {
                    node.store_value(value, if_not_present, self.value_order(), &self.guard)
                };
                node.lock().unlock(token);

                if stored? {
                    self.stats.len.fetch_add(1, Ordering::AcqRel);
                }
                return Ok(());
            }

            let token = self.tokens.next_token();
            let mut locks = PredecessorLocks::new(token);
            let valid = (0..level).all(|l| {
                let pred = path.pred(l);
                let succ = path.succ(l);
                unsafe {
                    locks.acquire(pred);
                    !(*pred).flags().is_removing()
                        && succ.as_ref().is_none_or(|s| !s.flags().is_removing())
                        && (*pred).next(l) == succ
                }
            });

            if !valid {
                drop(locks);
                trace!(node_level = level, "insert validation failed, restarting");
                backoff.spin();
                continue;
            }

            if self.is_full() {
                return Err(SkipListError::Full);
            }

            // Raise `levels` first so a reader that meets the node can always
            // find it again from the top
            self.stats.levels.fetch_max(level, Ordering::AcqRel);

            let node = SkipNode::alloc_in(
                &self.store,
                key,
                value,
                level,
                self.config.value_mode,
                self.config.lock_backend,
            )?;

            unsafe {
                for l in 0..level {
                    (*node).set_next(l, path.succ(l));
                }
                for l in 0..level {
                    (*path.pred(l)).set_next(l, node);
                }
                (*node).flags().mark_inserted();
            }

            self.stats.len.fetch_add(1, Ordering::AcqRel);
            self.stats.nodes.fetch_add(1, Ordering::AcqRel);
            self.stats.indices.fetch_add(level as u64, Ordering::AcqRel);
            return Ok(());
        }
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Shared remove protocol. `take` runs under the node lock and returns
    /// the values it removed from the node.
    fn remove_values(
        &self,
        key: &K,
        take: &mut dyn FnMut(&SkipNode<K, V>) -> Vec<V>,
    ) -> Result<Vec<V>> {
        let _read = G::pin();
        let backoff = Backoff::new();
        let mut path = self.paths.acquire();

        loop {
            let (found_level, victim) = self.find_path(key, self.top_level(), &mut path, false);
            let Some(found_level) = found_level else {
                return Err(SkipListError::NotFound);
            };

            let node = unsafe { &*victim };
            if !node.flags().is_inserted() {
                return Err(SkipListError::NotFound);
            }

            // Traversal raced with the node's linking and missed its top
            if found_level + 1 != node.level() {
                backoff.snooze();
                continue;
            }

            let token = self.tokens.next_token();
            if !node.lock().try_lock(token) {
                backoff.snooze();
                continue;
            }

            if node.flags().is_removing() {
                node.lock().unlock(token);
                return Err(SkipListError::ConcurrentlyRemoving);
            }
            node.flags().set_removing();

            let mut locks = PredecessorLocks::new(token);
            let valid = (0..=found_level).all(|l| {
                let pred = path.pred(l);
                unsafe {
                    locks.acquire(pred);
                    !(*pred).flags().is_removing() && (*pred).next(l) == victim
                }
            });

            if !valid {
                drop(locks);
                node.flags().clear_removing();
                node.lock().unlock(token);
                trace!(found_level, "remove validation failed, restarting");
                backoff.spin();
                continue;
            }

            let taken = take(node);
            if !taken.is_empty() {
                self.stats.len.fetch_sub(taken.len() as i64, Ordering::AcqRel);
            }

            if node.value_count() > 0 || taken.is_empty() {
                node.flags().clear_removing();
                drop(locks);
                node.lock().unlock(token);

                if taken.is_empty() {
                    return Err(SkipListError::NotFound);
                }
                return Ok(taken);
            }

            for l in (0..=found_level).rev() {
                unsafe { (*path.pred(l)).set_next(l, node.next(l)) };
            }
            self.stats.nodes.fetch_sub(1, Ordering::AcqRel);
            self.stats.indices.fetch_sub(node.level() as u64, Ordering::AcqRel);

            drop(locks);
            node.lock().unlock(token);
            unsafe { self.store.retire(&self.guard, victim, SkipNode::destroy::<S>) };

            return Ok(taken);
        }
    }

    fn into_elements(key: &K, values: Vec<V>) -> Vec<Element<K, V>> {
        values
            .into_iter()
            .map(|value| Element::new(key.clone(), value))
            .collect()
    }

    /// Remove the first value under `key`: the only value in `Unique` mode,
    /// the oldest in `DuplicateList`, the smallest in `DuplicateOrdered`.
    pub fn remove_first(&self, key: &K) -> Result<Element<K, V>> {
        let mut taken = self.remove_values(key, &mut |node| unsafe {
            node.take_first(&self.guard).into_iter().collect()
        })?;

        match taken.pop() {
            Some(value) => Ok(Element::new(key.clone(), value)),
            None => Err(SkipListError::NotFound),
        }
    }

    /// Remove every value under `key`. Duplicate modes only.
    pub fn remove_all(&self, key: &K) -> Result<Vec<Element<K, V>>> {
        self.require_duplicates()?;
        let taken = self.remove_values(key, &mut |node| unsafe {
            node.take_matching(&mut |_| true, &self.guard)
        })?;
        Ok(Self::into_elements(key, taken))
    }

    /// Remove the values under `key` accepted by `matches`. Duplicate modes
    /// only. `NotFound` when no value matched.
    pub fn remove_if_matched<F>(&self, key: &K, mut matches: F) -> Result<Vec<Element<K, V>>>
    where
        F: FnMut(&V) -> bool,
    {
        self.require_duplicates()?;
        let taken = self.remove_values(key, &mut |node| unsafe {
            node.take_matching(&mut matches, &self.guard)
        })?;
        Ok(Self::into_elements(key, taken))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// First value under `key`, in container order.
    pub fn load_first(&self, key: &K) -> Result<Element<K, V>> {
        let _read = G::pin();

        let node = match self.find_node(key) {
            Some(node) if node.flags().is_live() => node,
            _ => return Err(SkipListError::NotFound),
        };

        match unsafe { node.first_value() } {
            Some(value) => Ok(Element::new(node.key().clone(), value)),
            None => Err(SkipListError::ConcurrentReadConflict),
        }
    }

    /// Every value under `key`. Duplicate modes only.
    pub fn load_all(&self, key: &K) -> Result<Vec<Element<K, V>>> {
        self.load_if_matched(key, |_| true)
    }

    /// Values under `key` accepted by `matches`. Duplicate modes only.
    /// `NotFound` when no value matched.
    pub fn load_if_matched<F>(&self, key: &K, mut matches: F) -> Result<Vec<Element<K, V>>>
    where
        F: FnMut(&V) -> bool,
    {
        self.require_duplicates()?;
        let _read = G::pin();

        let node = match self.find_node(key) {
            Some(node) if node.flags().is_live() => node,
            _ => return Err(SkipListError::NotFound),
        };
        if node.value_count() == 0 {
            return Err(SkipListError::ConcurrentReadConflict);
        }

        let mut loaded = Vec::new();
        unsafe {
            node.for_each_value(&mut |value| {
                if matches(value) {
                    loaded.push(Element::new(node.key().clone(), value.clone()));
                }
                true
            });
        }

        if loaded.is_empty() {
            return Err(SkipListError::NotFound);
        }
        Ok(loaded)
    }

    pub fn contains(&self, key: &K) -> bool {
        let _read = G::pin();
        self.find_node(key).is_some_and(|node| node.is_visible())
    }

    /// First value of the smallest key, without removing it.
    pub fn peek_head(&self) -> Option<Element<K, V>> {
        let _read = G::pin();
        let node = self.first_visible()?;
        unsafe { node.first_value() }.map(|value| Element::new(node.key().clone(), value))
    }

    /// Remove the first value of the smallest key.
    ///
    /// `ConcurrentlyRemoving` is surfaced when another remove owned the head
    /// node; callers draining the list may simply call again.
    pub fn pop_head(&self) -> Result<Element<K, V>> {
        loop {
            let key = {
                let _read = G::pin();
                match self.first_visible() {
                    Some(node) => node.key().clone(),
                    None => return Err(SkipListError::Empty),
                }
            };

            match self.remove_first(&key) {
                // The head key was drained by someone else; look again
                Err(SkipListError::NotFound) => continue,
                popped => return popped,
            }
        }
    }

    /// Visit every value in key order.
    ///
    /// The visitor receives `(index, key, value, node_level, node_value_count)`
    /// and returns `false` to stop. Nodes removed while the walk runs may or
    /// may not be visited.
    pub fn foreach<F>(&self, mut visitor: F)
    where
        F: FnMut(usize, &K, &V, usize, usize) -> bool,
    {
        let _read = G::pin();
        let mut index = 0;
        let mut curr = unsafe { (*self.head).next(0) };

        while let Some(node) = unsafe { curr.as_ref() } {
            if node.flags().is_live() {
                let level = node.level();
                let count = node.value_count();
                let keep_going = unsafe {
                    node.for_each_value(&mut |value| {
                        let keep_going = visitor(index, node.key(), value, level, count);
                        index += 1;
                        keep_going
                    })
                };
                if !keep_going {
                    return;
                }
            }
            curr = node.next(0);
        }
    }

    /// Iterate over cloned elements in key order, values in container order.
    pub fn iter(&self) -> Iter<'_, K, V, G, S> {
        Iter {
            _read: G::pin(),
            next: unsafe { (*self.head).next(0) },
            pending: VecDeque::new(),
            _list: PhantomData,
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Number of values stored across all keys.
    pub fn len(&self) -> i64 {
        self.stats.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of linked nodes (distinct keys).
    pub fn node_count(&self) -> i64 {
        self.stats.nodes.load(Ordering::Acquire)
    }

    /// Highest level any node has reached. Never shrinks.
    pub fn levels(&self) -> i32 {
        self.top_level() as i32
    }

    /// Sum of the levels of all linked nodes.
    pub fn index_count(&self) -> u64 {
        self.stats.indices.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &SkipListConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn guard(&self) -> &G {
        &self.guard
    }
}

// =============================================================================
// Convenience constructors for `Ord` types
// =============================================================================

impl<K, V, G: Guard, S: NodeStore> SkipList<K, V, G, S>
where
    K: Ord + Clone,
    V: Clone,
{
    fn expect_built(built: Result<Self>) -> Self {
        match built {
            Ok(list) => list,
            Err(error) => panic!("default skip list configuration rejected: {}", error),
        }
    }

    pub fn unique() -> Self {
        Self::expect_built(Self::new(SkipListConfig::new(ValueMode::Unique), NaturalOrder))
    }

    pub fn duplicate_list() -> Self {
        Self::expect_built(Self::new(
            SkipListConfig::new(ValueMode::DuplicateList),
            NaturalOrder,
        ))
    }
}

impl<K, V, G: Guard, S: NodeStore> SkipList<K, V, G, S>
where
    K: Ord + Clone,
    V: Ord + Clone,
{
    pub fn duplicate_ordered() -> Self {
        Self::expect_built(Self::with_value_order(
            SkipListConfig::new(ValueMode::DuplicateOrdered),
            NaturalOrder,
            NaturalOrder,
        ))
    }
}

impl<K, V, G: Guard, S: NodeStore> Default for SkipList<K, V, G, S>
where
    K: Ord + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::unique()
    }
}

impl<K, V, G: Guard, S: NodeStore> Drop for SkipList<K, V, G, S> {
    fn drop(&mut self) {
        // Every node still linked at level 0 is owned by the list; unlinked
        // ones belong to the guard or the store
        unsafe {
            debug_assert!((*self.head).flags().is_head());
            let mut curr = (*self.head).next(0);
            while !curr.is_null() {
                let next = (*curr).next(0);
                SkipNode::destroy::<S>(curr);
                curr = next;
            }
            SkipNode::destroy::<HeapStore>(self.head);
        }
    }
}

impl<K, V, G: Guard, S: NodeStore> std::fmt::Debug for SkipList<K, V, G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkipList")
            .field("value_mode", &self.config.value_mode)
            .field("len", &self.stats.len.load(Ordering::Relaxed))
            .field("nodes", &self.stats.nodes.load(Ordering::Relaxed))
            .field("levels", &self.stats.levels.load(Ordering::Relaxed))
            .field("idle_paths", &self.paths.idle())
            .finish()
    }
}

// =============================================================================
// Iterator
// =============================================================================

/// Iterator over a skip list, pinned for its whole lifetime.
pub struct Iter<'a, K, V, G: Guard, S: NodeStore> {
    _read: G::ReadGuard,
    next: NodePtr<K, V>,
    pending: VecDeque<Element<K, V>>,
    _list: PhantomData<&'a SkipList<K, V, G, S>>,
}

impl<K, V, G: Guard, S: NodeStore> Iterator for Iter<'_, K, V, G, S>
where
    K: Clone,
    V: Clone,
{
    type Item = Element<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(element) = self.pending.pop_front() {
                return Some(element);
            }

            let node = unsafe { self.next.as_ref() }?;
            self.next = node.next(0);
            if !node.flags().is_live() {
                continue;
            }

            let pending = &mut self.pending;
            unsafe {
                node.for_each_value(&mut |value| {
                    pending.push_back(Element::new(node.key().clone(), value.clone()));
                    true
                });
            }
        }
    }
}

impl<'a, K, V, G: Guard, S: NodeStore> IntoIterator for &'a SkipList<K, V, G, S>
where
    K: Clone,
    V: Clone,
{
    type Item = Element<K, V>;
    type IntoIter = Iter<'a, K, V, G, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
