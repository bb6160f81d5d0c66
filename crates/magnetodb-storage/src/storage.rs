//! In-memory item store for MagnetoDB tables.
//!
//! Items are grouped into partitions by hash key. Each partition keeps its
//! items ordered by range key in a [`BTreeMap`], plus one ordered set per
//! local secondary index holding `(index value, table range key)` pairs.
//!
//! # Architecture
//!
//! ```text
//! DashMap<ScalarValue, Partition>
//!   Partition.items:   BTreeMap<Option<ScalarValue>, StoredItem>
//!   Partition.indexes: Vec<BTreeSet<(ScalarValue, Option<ScalarValue>)>>
//! ```
//!
//! - Writes go through [`TableStorage::mutate`], which holds the partition
//!   entry lock while the caller inspects the current item and decides what
//!   to write. Check-then-write is therefore atomic per key.
//! - Tables without a range key store their single item per partition under
//!   the `None` sort key.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use tracing::debug;

use magnetodb_model::types::Item;
use magnetodb_model::{AttributeValue, ScalarValue};

use crate::error::StorageError;
use crate::schema::{PrimaryKey, TableSchema};

/// Range key of an item within its partition; `None` for hash-only tables.
pub type SortKey = Option<ScalarValue>;

/// Position of an entry in an index ordering.
pub type IndexEntry = (ScalarValue, SortKey);

// ---------------------------------------------------------------------------
// Sort key conditions
// ---------------------------------------------------------------------------

/// Condition on the range key of a query target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    Eq(ScalarValue),
    Lt(ScalarValue),
    Le(ScalarValue),
    Gt(ScalarValue),
    Ge(ScalarValue),
    Between(ScalarValue, ScalarValue),
    BeginsWith(ScalarValue),
}

impl SortKeyCondition {
    /// Range bounds enclosing every matching value.
    #[must_use]
    pub fn bounds(&self) -> (Bound<&ScalarValue>, Bound<&ScalarValue>) {
        match self {
            Self::Eq(v) => (Bound::Included(v), Bound::Included(v)),
            Self::Lt(v) => (Bound::Unbounded, Bound::Excluded(v)),
            Self::Le(v) => (Bound::Unbounded, Bound::Included(v)),
            Self::Gt(v) => (Bound::Excluded(v), Bound::Unbounded),
            Self::Ge(v) => (Bound::Included(v), Bound::Unbounded),
            Self::Between(lo, hi) => (Bound::Included(lo), Bound::Included(hi)),
            Self::BeginsWith(prefix) => (Bound::Included(prefix), Bound::Unbounded),
        }
    }

    /// Whether `value` satisfies the condition.
    #[must_use]
    pub fn matches(&self, value: &ScalarValue) -> bool {
        match self {
            Self::Eq(v) => value == v,
            Self::Lt(v) => value < v,
            Self::Le(v) => value <= v,
            Self::Gt(v) => value > v,
            Self::Ge(v) => value >= v,
            Self::Between(lo, hi) => lo <= value && value <= hi,
            Self::BeginsWith(prefix) => scalar_begins_with(value, prefix),
        }
    }
}

/// Prefix test on strings and binaries; other combinations never match.
#[must_use]
pub fn scalar_begins_with(value: &ScalarValue, prefix: &ScalarValue) -> bool {
    match (value, prefix) {
        (ScalarValue::S(v), ScalarValue::S(p)) => v.starts_with(p.as_str()),
        (ScalarValue::B(v), ScalarValue::B(p)) => v.starts_with(p),
        _ => false,
    }
}

fn is_empty_range(lower: Bound<&ScalarValue>, upper: Bound<&ScalarValue>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo) | Bound::Excluded(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi)) => lo >= hi,
        _ => false,
    }
}

fn some_bound(bound: Bound<&ScalarValue>) -> Bound<SortKey> {
    match bound {
        Bound::Included(v) => Bound::Included(Some(v.clone())),
        Bound::Excluded(v) => Bound::Excluded(Some(v.clone())),
        Bound::Unbounded => Bound::Unbounded,
    }
}

// ---------------------------------------------------------------------------
// Query and scan parameters
// ---------------------------------------------------------------------------

/// Where a paginated query resumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    /// After this table range key.
    Table(SortKey),
    /// After this index entry.
    Index(IndexEntry),
}

/// One query against a single partition.
#[derive(Debug, Clone, Copy)]
pub struct QuerySpec<'a> {
    pub hash: &'a ScalarValue,
    /// Index position in the table schema, `None` for the table itself.
    pub index: Option<usize>,
    pub condition: Option<&'a SortKeyCondition>,
    pub forward: bool,
    pub exclusive_start: Option<&'a StartPosition>,
    /// Page size; `None` is unlimited.
    pub limit: Option<usize>,
}

/// Items of one query page.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Full stored items, in result order.
    pub items: Vec<Item>,
    /// Position of the last returned item when more matches remain.
    pub last_position: Option<(PrimaryKey, Option<ScalarValue>)>,
}

/// One scan request.
#[derive(Debug, Clone, Copy)]
pub struct ScanSpec<'a> {
    pub segment: u32,
    pub total_segments: u32,
    pub exclusive_start: Option<&'a PrimaryKey>,
    /// Bound on visited items; `None` is unlimited.
    pub limit: Option<usize>,
}

/// Items visited by one scan call.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// Key of the last visited item when the limit stopped the scan early.
    pub last_key: Option<PrimaryKey>,
}

/// Segment a hash key belongs to for parallel scans.
#[must_use]
pub fn segment_of(hash: &ScalarValue, total_segments: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    hash.hash(&mut hasher);
    let total = u64::from(total_segments.max(1));
    // The remainder is below `total_segments`, so it fits in u32.
    u32::try_from(hasher.finish() % total).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// What a [`TableStorage::mutate`] closure decided to do with the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Leave the item as it is.
    Keep,
    /// Store this item, replacing any current one.
    Put(Item),
    /// Remove the current item, if any.
    Delete,
}

/// A stored item with its write revision.
#[derive(Debug, Clone)]
pub struct StoredItem {
    pub attributes: Item,
    /// Bumped on every write of this key; starts at 1.
    pub revision: u64,
    size: u64,
}

#[derive(Debug, Default)]
struct Partition {
    items: BTreeMap<SortKey, StoredItem>,
    indexes: Vec<BTreeSet<IndexEntry>>,
}

impl Partition {
    fn index_mut(&mut self, position: usize) -> &mut BTreeSet<IndexEntry> {
        if self.indexes.len() <= position {
            self.indexes.resize_with(position + 1, BTreeSet::new);
        }
        &mut self.indexes[position]
    }
}

#[derive(Debug, Default)]
struct Counters {
    items: AtomicU64,
    bytes: AtomicU64,
}

impl Counters {
    fn add(&self, size: u64) {
        self.items.fetch_add(1, AtomicOrdering::Relaxed);
        self.bytes.fetch_add(size, AtomicOrdering::Relaxed);
    }

    fn remove(&self, size: u64) {
        self.items.fetch_sub(1, AtomicOrdering::Relaxed);
        self.bytes.fetch_sub(size, AtomicOrdering::Relaxed);
    }

    fn load(&self) -> (u64, u64) {
        (
            self.items.load(AtomicOrdering::Relaxed),
            self.bytes.load(AtomicOrdering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// TableStorage
// ---------------------------------------------------------------------------

/// Item storage of one table.
#[derive(Debug)]
pub struct TableStorage {
    data: DashMap<ScalarValue, Partition>,
    schema: Arc<TableSchema>,
    table: Counters,
    indexes: Vec<Counters>,
}

impl TableStorage {
    /// Create an empty store for the given schema.
    #[must_use]
    pub fn new(schema: Arc<TableSchema>) -> Self {
        let indexes = schema.indexes.iter().map(|_| Counters::default()).collect();
        Self {
            data: DashMap::new(),
            schema,
            table: Counters::default(),
            indexes,
        }
    }

    /// The table schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of stored items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.table.load().0
    }

    /// Total size of stored items in bytes.
    #[must_use]
    pub fn total_size_bytes(&self) -> u64 {
        self.table.load().1
    }

    /// Item count and size in bytes of the index at `position`.
    #[must_use]
    pub fn index_stats(&self, position: usize) -> (u64, u64) {
        self.indexes.get(position).map_or((0, 0), Counters::load)
    }

    /// Fetch a copy of the item stored under `key`.
    #[must_use]
    pub fn get_item(&self, key: &PrimaryKey) -> Option<Item> {
        self.data
            .get(&key.hash)
            .and_then(|partition| partition.items.get(&key.range).map(|s| s.attributes.clone()))
    }

    /// Revision of the item stored under `key`.
    #[must_use]
    pub fn revision(&self, key: &PrimaryKey) -> Option<u64> {
        self.data
            .get(&key.hash)
            .and_then(|partition| partition.items.get(&key.range).map(|s| s.revision))
    }

    /// Atomically inspect and change the item under `key`.
    ///
    /// `decide` runs while the partition is locked, receives the current
    /// item (or `None`) and returns the mutation to apply together with a
    /// result for the caller. An error from `decide` leaves the store
    /// untouched.
    ///
    /// # Errors
    /// Returns the error produced by `decide`.
    pub fn mutate<T, F>(&self, key: &PrimaryKey, decide: F) -> Result<T, StorageError>
    where
        F: FnOnce(Option<&Item>) -> Result<(Mutation, T), StorageError>,
    {
        let result = {
            let mut partition = self.data.entry(key.hash.clone()).or_default();
            let current = partition.items.get(&key.range);
            let revision = current.map_or(0, |s| s.revision);
            match decide(current.map(|s| &s.attributes)) {
                Ok((mutation, output)) => {
                    self.apply(&mut partition, key, mutation, revision + 1);
                    Ok(output)
                }
                Err(e) => Err(e),
            }
        };
        self.data.remove_if(&key.hash, |_, p| p.items.is_empty());
        result
    }

    fn apply(&self, partition: &mut Partition, key: &PrimaryKey, mutation: Mutation, revision: u64) {
        let old = match mutation {
            Mutation::Keep => return,
            Mutation::Put(attributes) => {
                let size = calculate_item_size(&attributes);
                self.index_insert(partition, &key.range, &attributes);
                self.table.add(size);
                debug!(size, revision, "stored item");
                partition.items.insert(
                    key.range.clone(),
                    StoredItem {
                        attributes,
                        revision,
                        size,
                    },
                )
            }
            Mutation::Delete => {
                let removed = partition.items.remove(&key.range);
                if removed.is_some() {
                    debug!("deleted item");
                }
                removed
            }
        };

        if let Some(old) = old {
            self.table.remove(old.size);
            self.index_remove(partition, &key.range, &old.attributes);
        }
    }

    fn index_insert(&self, partition: &mut Partition, range: &SortKey, item: &Item) {
        for (position, index) in self.schema.indexes.iter().enumerate() {
            if let Some(value) = item.get(&index.range.name).and_then(AttributeValue::as_scalar) {
                partition
                    .index_mut(position)
                    .insert((value, range.clone()));
                let projected = index.project(item, &self.schema.key_schema);
                self.indexes[position].add(calculate_item_size(&projected));
            }
        }
    }

    /// Remove the index entries of a replaced or deleted item. Entries the
    /// new item re-inserted under the same index value are kept.
    fn index_remove(&self, partition: &mut Partition, range: &SortKey, old: &Item) {
        let current = partition.items.get(range).map(|s| &s.attributes);
        let mut stale = Vec::new();
        for (position, index) in self.schema.indexes.iter().enumerate() {
            let Some(old_value) = old.get(&index.range.name).and_then(AttributeValue::as_scalar)
            else {
                continue;
            };
            let projected = index.project(old, &self.schema.key_schema);
            self.indexes[position].remove(calculate_item_size(&projected));
            let still_indexed = current
                .and_then(|item| item.get(&index.range.name))
                .and_then(AttributeValue::as_scalar)
                .is_some_and(|v| v == old_value);
            if !still_indexed {
                stale.push((position, old_value));
            }
        }
        for (position, value) in stale {
            partition.index_mut(position).remove(&(value, range.clone()));
        }
    }

    // -- Reads --

    /// Read one page of a partition in table or index order.
    #[must_use]
    pub fn query(&self, spec: &QuerySpec<'_>) -> QueryPage {
        let Some(partition) = self.data.get(spec.hash) else {
            return QueryPage::default();
        };
        let cap = spec.limit.map_or(usize::MAX, |l| l.saturating_add(1));

        let mut positions: Vec<(Option<ScalarValue>, SortKey)> = match spec.index {
            None => collect_table_positions(&partition, spec, cap),
            Some(position) => partition
                .indexes
                .get(position)
                .map(|set| collect_index_positions(set, spec, cap))
                .unwrap_or_default(),
        };

        let more = spec.limit.is_some_and(|limit| positions.len() > limit);
        if let (true, Some(limit)) = (more, spec.limit) {
            positions.truncate(limit);
        }

        let items = positions
            .iter()
            .filter_map(|(_, range)| partition.items.get(range))
            .map(|stored| stored.attributes.clone())
            .collect();

        let last_position = if more {
            positions.pop().map(|(index_value, range)| {
                (
                    PrimaryKey {
                        hash: spec.hash.clone(),
                        range,
                    },
                    index_value,
                )
            })
        } else {
            None
        };

        QueryPage {
            items,
            last_position,
        }
    }

    /// Visit the items of one scan segment in hash key, then range key order.
    #[must_use]
    pub fn scan(&self, spec: &ScanSpec<'_>) -> ScanPage {
        let mut hashes: Vec<ScalarValue> = self
            .data
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|hash| segment_of(hash, spec.total_segments) == spec.segment)
            .filter(|hash| spec.exclusive_start.is_none_or(|start| *hash >= start.hash))
            .collect();
        hashes.sort();

        let cap = spec.limit.map_or(usize::MAX, |l| l.saturating_add(1));
        let mut visited: Vec<(PrimaryKey, Item)> = Vec::new();
        'partitions: for hash in hashes {
            let Some(partition) = self.data.get(&hash) else {
                continue;
            };
            for (range, stored) in &partition.items {
                if let Some(start) = spec.exclusive_start {
                    if hash == start.hash && *range <= start.range {
                        continue;
                    }
                }
                if visited.len() >= cap {
                    break 'partitions;
                }
                visited.push((
                    PrimaryKey {
                        hash: hash.clone(),
                        range: range.clone(),
                    },
                    stored.attributes.clone(),
                ));
            }
        }

        let more = spec.limit.is_some_and(|limit| visited.len() > limit);
        if let (true, Some(limit)) = (more, spec.limit) {
            visited.truncate(limit);
        }
        let last_key = if more {
            visited.last().map(|(key, _)| key.clone())
        } else {
            None
        };

        ScanPage {
            items: visited.into_iter().map(|(_, item)| item).collect(),
            last_key,
        }
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.data.clear();
        for counters in std::iter::once(&self.table).chain(self.indexes.iter()) {
            counters.items.store(0, AtomicOrdering::Relaxed);
            counters.bytes.store(0, AtomicOrdering::Relaxed);
        }
    }
}

fn collect_table_positions(
    partition: &Partition,
    spec: &QuerySpec<'_>,
    cap: usize,
) -> Vec<(Option<ScalarValue>, SortKey)> {
    let (lower, upper) = spec
        .condition
        .map_or((Bound::Unbounded, Bound::Unbounded), SortKeyCondition::bounds);
    if is_empty_range(lower, upper) {
        return Vec::new();
    }

    let matches = |range: &&SortKey| match (spec.condition, range) {
        (None, _) => true,
        (Some(condition), Some(value)) => condition.matches(value),
        (Some(_), None) => false,
    };
    let after_start = |range: &&SortKey| match spec.exclusive_start {
        Some(StartPosition::Table(start)) if spec.forward => *range > start,
        Some(StartPosition::Table(start)) => *range < start,
        _ => true,
    };

    let keys = partition
        .items
        .range((some_bound(lower), some_bound(upper)))
        .map(|(range, _)| range);
    let ordered: Box<dyn Iterator<Item = &SortKey> + '_> = if spec.forward {
        Box::new(keys)
    } else {
        Box::new(keys.rev())
    };

    ordered
        .filter(after_start)
        .skip_while(|range| !matches(range))
        .take_while(|range| matches(range))
        .take(cap)
        .map(|range| (None, range.clone()))
        .collect()
}

fn collect_index_positions(
    entries: &BTreeSet<IndexEntry>,
    spec: &QuerySpec<'_>,
    cap: usize,
) -> Vec<(Option<ScalarValue>, SortKey)> {
    let lower = match spec.condition.map(|c| c.bounds().0) {
        Some(Bound::Included(v) | Bound::Excluded(v)) => Bound::Included((v.clone(), None)),
        _ => Bound::Unbounded,
    };
    let matches =
        |entry: &&IndexEntry| spec.condition.is_none_or(|condition| condition.matches(&entry.0));
    let after_start = |entry: &&IndexEntry| match spec.exclusive_start {
        Some(StartPosition::Index(start)) if spec.forward => *entry > start,
        Some(StartPosition::Index(start)) => *entry < start,
        _ => true,
    };

    let range = entries.range((lower, Bound::Unbounded));
    let ordered: Box<dyn Iterator<Item = &IndexEntry> + '_> = if spec.forward {
        Box::new(range)
    } else {
        Box::new(range.rev())
    };

    ordered
        .filter(after_start)
        .skip_while(|entry| !matches(entry))
        .take_while(|entry| matches(entry))
        .take(cap)
        .map(|(value, range)| (Some(value.clone()), range.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Item size calculation
// ---------------------------------------------------------------------------

/// Calculates the size of an item in bytes.
///
/// Each attribute contributes `len(name) + size(value)`:
/// - **S**: UTF-8 length
/// - **N**: `(digits + 1) / 2 + 1`
/// - **B**: byte length
/// - **SS / NS / BS**: sum of member sizes
/// - **typed maps**: `3 + sum(key_size + 1 + value_size)`
#[must_use]
#[allow(clippy::implicit_hasher)]
pub fn calculate_item_size(item: &Item) -> u64 {
    item.iter()
        .map(|(name, value)| name.len() as u64 + calculate_value_size(value))
        .sum()
}

fn calculate_number_size(n: &magnetodb_model::Decimal) -> u64 {
    (n.precision().div_ceil(2) + 1) as u64
}

fn calculate_scalar_size(value: &ScalarValue) -> u64 {
    match value {
        ScalarValue::S(s) => s.len() as u64,
        ScalarValue::N(n) => calculate_number_size(n),
        ScalarValue::B(b) => b.len() as u64,
    }
}

fn calculate_value_size(value: &AttributeValue) -> u64 {
    match value {
        AttributeValue::S(s) => s.len() as u64,
        AttributeValue::N(n) => calculate_number_size(n),
        AttributeValue::B(b) => b.len() as u64,
        AttributeValue::Ss(v) => v.iter().map(|s| s.len() as u64).sum(),
        AttributeValue::Ns(v) => v.iter().map(calculate_number_size).sum(),
        AttributeValue::Bs(v) => v.iter().map(|b| b.len() as u64).sum(),
        AttributeValue::Map(map) => {
            3 + map
                .entries
                .iter()
                .map(|(k, v)| calculate_scalar_size(k) + 1 + calculate_scalar_size(v))
                .sum::<u64>()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
