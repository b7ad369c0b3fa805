//! In-memory reference store
//!
//! Holds series per database and retention policy and answers filtered raw
//! reads the way a real engine would:
//!
//! - unknown database: `StorageError::DatabaseNotFound`
//! - unknown retention policy: no result set
//! - matching series come back in series-key order, tags sorted by key with
//!   `_measurement` and `_field` included
//! - a series with no points in the range yields an entry without a cursor
//!
//! Thread-safe via `std::sync::RwLock`; reads take a snapshot of the matching
//! points so the lock is never held while a result set is drained.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::query::{ReadRequest, TimestampRange, FIELD_TAG_KEY, MEASUREMENT_TAG_KEY};
use crate::storage::cursor::{Cursor, VecCursor};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::eval::PredicateMatcher;
use crate::storage::store::{ResultSet, Store};
use crate::storage::types::{SeriesEntry, Tags};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Retention policy used when a request names none (default: autogen)
    pub default_retention_policy: String,
    /// Maximum points per cursor batch (default: 1000)
    pub batch_size: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            default_retention_policy: "autogen".to_string(),
            batch_size: 1000,
        }
    }
}

/// Typed points of one series, `(timestamp_ns, value)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "points", rename_all = "lowercase")]
pub enum Points {
    Float(Vec<(i64, f64)>),
    Integer(Vec<(i64, i64)>),
    Unsigned(Vec<(i64, u64)>),
    Boolean(Vec<(i64, bool)>),
    String(Vec<(i64, String)>),
}

impl Points {
    pub fn len(&self) -> usize {
        match self {
            Points::Float(p) => p.len(),
            Points::Integer(p) => p.len(),
            Points::Unsigned(p) => p.len(),
            Points::Boolean(p) => p.len(),
            Points::String(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sort(&mut self) {
        match self {
            Points::Float(p) => p.sort_by_key(|(ts, _)| *ts),
            Points::Integer(p) => p.sort_by_key(|(ts, _)| *ts),
            Points::Unsigned(p) => p.sort_by_key(|(ts, _)| *ts),
            Points::Boolean(p) => p.sort_by_key(|(ts, _)| *ts),
            Points::String(p) => p.sort_by_key(|(ts, _)| *ts),
        }
    }

    /// Cursor over the points inside `range`, `None` when there are none
    fn cursor(&self, range: TimestampRange, batch_size: usize) -> Option<Cursor> {
        fn window<T: Clone>(points: &[(i64, T)], range: TimestampRange) -> Vec<(i64, T)> {
            points
                .iter()
                .filter(|(ts, _)| *ts >= range.start && *ts <= range.end)
                .cloned()
                .collect()
        }

        match self {
            Points::Float(p) => {
                let w = window(p, range);
                (!w.is_empty())
                    .then(|| Cursor::Float(Box::new(VecCursor::from_points(w, batch_size))))
            }
            Points::Integer(p) => {
                let w = window(p, range);
                (!w.is_empty())
                    .then(|| Cursor::Integer(Box::new(VecCursor::from_points(w, batch_size))))
            }
            Points::Unsigned(p) => {
                let w = window(p, range);
                (!w.is_empty())
                    .then(|| Cursor::Unsigned(Box::new(VecCursor::from_points(w, batch_size))))
            }
            Points::Boolean(p) => {
                let w = window(p, range);
                (!w.is_empty())
                    .then(|| Cursor::Boolean(Box::new(VecCursor::from_points(w, batch_size))))
            }
            Points::String(p) => {
                let w = window(p, range);
                (!w.is_empty())
                    .then(|| Cursor::String(Box::new(VecCursor::from_points(w, batch_size))))
            }
        }
    }
}

/// One stored series: measurement, field, user tags and points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSeries {
    pub measurement: String,
    pub field: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub points: Points,
}

impl StoredSeries {
    pub fn new(measurement: impl Into<String>, field: impl Into<String>, points: Points) -> Self {
        Self {
            measurement: measurement.into(),
            field: field.into(),
            tags: BTreeMap::new(),
            points,
        }
    }

    /// Builder method: add a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Key the engine orders series by: `measurement,k=v,...` then field
    pub fn series_key(&self) -> String {
        let mut key = self.measurement.clone();
        for (k, v) in &self.tags {
            key.push(',');
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        key.push('#');
        key.push_str(&self.field);
        key
    }

    /// Full tag set including the system tags, sorted by key
    pub fn tag_set(&self) -> Tags {
        Tags::sorted(
            self.tags
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .chain([
                    (MEASUREMENT_TAG_KEY.to_string(), self.measurement.clone()),
                    (FIELD_TAG_KEY.to_string(), self.field.clone()),
                ]),
        )
    }
}

/// Seed file entry: a series plus where it lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSeries {
    pub database: String,
    #[serde(default)]
    pub retention_policy: String,
    #[serde(flatten)]
    pub series: StoredSeries,
}

/// JSON seed file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub series: Vec<SeedSeries>,
}

type RetentionPolicies = BTreeMap<String, BTreeMap<String, StoredSeries>>;

/// Store keeping every series in memory
#[derive(Debug)]
pub struct MemoryStore {
    config: MemoryStoreConfig,
    databases: RwLock<BTreeMap<String, RetentionPolicies>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            config,
            databases: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store and load the seed file at `path`
    pub fn from_seed_file(config: MemoryStoreConfig, path: &Path) -> StorageResult<Self> {
        let store = Self::new(config);
        let count = store.load_seed_file(path)?;
        info!(path = %path.display(), series = count, "Loaded seed file");
        Ok(store)
    }

    pub fn config(&self) -> &MemoryStoreConfig {
        &self.config
    }

    /// Create an empty database. No-op if it exists.
    pub fn create_database(&self, name: &str) -> StorageResult<()> {
        let mut dbs = self.write_lock()?;
        dbs.entry(name.to_string()).or_default();
        Ok(())
    }

    /// Store `series`, creating the database and retention policy as needed.
    /// A series with the same key is replaced.
    pub fn write_series(&self, db: &str, rp: &str, mut series: StoredSeries) -> StorageResult<()> {
        series.points.sort();
        let rp = self.retention_policy(rp).to_string();

        let mut dbs = self.write_lock()?;
        dbs.entry(db.to_string())
            .or_default()
            .entry(rp)
            .or_default()
            .insert(series.series_key(), series);
        Ok(())
    }

    /// Load a JSON seed file, returning the number of series written
    pub fn load_seed_file(&self, path: &Path) -> StorageResult<usize> {
        let content = std::fs::read_to_string(path)?;
        let seed: SeedFile = serde_json::from_str(&content)?;
        self.load_seed(seed)
    }

    pub fn load_seed(&self, seed: SeedFile) -> StorageResult<usize> {
        for db in &seed.databases {
            self.create_database(db)?;
        }
        let count = seed.series.len();
        for entry in seed.series {
            self.write_series(&entry.database, &entry.retention_policy, entry.series)?;
        }
        Ok(count)
    }

    /// Names of all databases
    pub fn databases(&self) -> StorageResult<Vec<String>> {
        Ok(self.read_lock()?.keys().cloned().collect())
    }

    /// Number of series across all databases
    pub fn series_count(&self) -> StorageResult<usize> {
        Ok(self
            .read_lock()?
            .values()
            .flat_map(|rps| rps.values())
            .map(|series| series.len())
            .sum())
    }

    fn retention_policy<'a>(&'a self, rp: &'a str) -> &'a str {
        if rp.is_empty() {
            &self.config.default_retention_policy
        } else {
            rp
        }
    }

    fn read_lock(
        &self,
    ) -> StorageResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, RetentionPolicies>>> {
        self.databases
            .read()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire store lock: {}", e)))
    }

    fn write_lock(
        &self,
    ) -> StorageResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, RetentionPolicies>>> {
        self.databases
            .write()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire store lock: {}", e)))
    }
}

impl Store for MemoryStore {
    fn read_filter(&self, request: &ReadRequest) -> StorageResult<Option<Box<dyn ResultSet>>> {
        let matcher = request
            .predicate
            .as_ref()
            .map(PredicateMatcher::new)
            .transpose()?;

        let dbs = self.read_lock()?;
        let rps = dbs
            .get(&request.source.database)
            .ok_or_else(|| StorageError::DatabaseNotFound(request.source.database.clone()))?;

        let rp = self.retention_policy(&request.source.retention_policy);
        let Some(series) = rps.get(rp) else {
            debug!(db = %request.source.database, rp = %rp, "Retention policy not found");
            return Ok(None);
        };

        let mut entries = VecDeque::new();
        for stored in series.values() {
            let tags = stored.tag_set();
            if let Some(matcher) = &matcher {
                if !matcher.matches(&tags)? {
                    continue;
                }
            }
            let cursor = stored.points.cursor(request.range, self.config.batch_size);
            entries.push_back(SeriesEntry::new(tags, cursor));
        }

        debug!(
            db = %request.source.database,
            rp = %rp,
            series = entries.len(),
            "Executed read filter"
        );
        Ok(Some(Box::new(MemoryResultSet::new(entries))))
    }

    fn ping(&self) -> StorageResult<()> {
        self.read_lock().map(|_| ())
    }
}

/// Result set over a snapshot of matching series
#[derive(Debug)]
pub struct MemoryResultSet {
    entries: VecDeque<SeriesEntry>,
    closed: bool,
}

impl MemoryResultSet {
    pub fn new(entries: VecDeque<SeriesEntry>) -> Self {
        Self {
            entries,
            closed: false,
        }
    }
}

impl ResultSet for MemoryResultSet {
    fn next_series(&mut self) -> Option<SeriesEntry> {
        if self.closed {
            return None;
        }
        self.entries.pop_front()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for entry in self.entries.iter_mut() {
            if let Some(cursor) = entry.cursor.as_mut() {
                cursor.close();
            }
        }
        self.entries.clear();
    }
}
