//! Trace replay against an LRU cache

use std::fmt;
use std::io::BufRead;

use anyhow::{Context, Result};
use lrucache::LruCache;
use serde::Serialize;
use tracing::{debug, warn};

use crate::stats::CacheStats;
use crate::trace::{self, Command};

/// What a single command did to the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Hit { key: String, value: String },
    Miss { key: String },
    Inserted,
    Updated,
    /// New key went in, `key` was evicted to make room
    Evicted { key: String },
    Removed,
    Absent,
}

impl Outcome {
    /// True for the result of a `get`
    pub fn is_lookup(&self) -> bool {
        matches!(self, Outcome::Hit { .. } | Outcome::Miss { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Hit { key, value } => write!(f, "HIT {} {}", key, value),
            Outcome::Miss { key } => write!(f, "MISS {}", key),
            Outcome::Inserted => write!(f, "INSERT"),
            Outcome::Updated => write!(f, "UPDATE"),
            Outcome::Evicted { key } => write!(f, "EVICT {}", key),
            Outcome::Removed => write!(f, "REMOVE"),
            Outcome::Absent => write!(f, "ABSENT"),
        }
    }
}

/// Summary printed after a replay
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub capacity: usize,
    pub operations: u64,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_ratio: f64,
    pub len: usize,
    /// Resident keys, most recently used first
    pub resident: Vec<String>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capacity:   {}", self.capacity)?;
        writeln!(f, "operations: {}", self.operations)?;
        writeln!(
            f,
            "lookups:    {} hits, {} misses, {:.2}% hit ratio",
            self.stats.hits(),
            self.stats.misses(),
            self.hit_ratio * 100.0
        )?;
        writeln!(
            f,
            "writes:     {} inserts, {} updates, {} evictions, {} removals",
            self.stats.inserts(),
            self.stats.updates(),
            self.stats.evictions(),
            self.stats.removals()
        )?;
        write!(
            f,
            "resident:   {} [{}] (most to least recently used)",
            self.len,
            self.resident.join(", ")
        )
    }
}

/// Replays trace commands against a string-keyed cache
pub struct Replayer {
    cache: LruCache<String, String>,
    stats: CacheStats,
    operations: u64,
}

impl Replayer {
    /// Create a replayer over an empty cache
    ///
    /// Fails with `InvalidArgument` when `capacity < 1`.
    pub fn new(capacity: i64) -> lrucache::Result<Self> {
        Ok(Self {
            cache: LruCache::new(capacity)?,
            stats: CacheStats::new(),
            operations: 0,
        })
    }

    /// Apply one command
    ///
    /// A `get` of an absent key is a miss, not an error; only other cache
    /// errors are returned.
    pub fn apply(&mut self, command: Command) -> lrucache::Result<Outcome> {
        self.operations += 1;

        let outcome = match command {
            Command::Put { key, value } => {
                let resident = self.cache.contains(&key);
                match self.cache.push(key, value) {
                    Some(_) if resident => {
                        self.stats.record_update();
                        Outcome::Updated
                    }
                    Some((evicted, _)) => {
                        debug!(key = %evicted, "evicted least recently used entry");
                        self.stats.record_eviction();
                        self.stats.record_insert();
                        Outcome::Evicted { key: evicted }
                    }
                    None => {
                        self.stats.record_insert();
                        Outcome::Inserted
                    }
                }
            }
            Command::Get { key } => match self.cache.get(&key) {
                Ok(value) => {
                    let value = value.clone();
                    self.stats.record_hit();
                    Outcome::Hit { key, value }
                }
                Err(e) if e.is_miss() => {
                    self.stats.record_miss();
                    Outcome::Miss { key }
                }
                Err(e) => return Err(e),
            },
            Command::Del { key } => match self.cache.remove(&key) {
                Some(_) => {
                    self.stats.record_removal();
                    Outcome::Removed
                }
                None => Outcome::Absent,
            },
        };

        Ok(outcome)
    }

    /// Replay every line of a trace
    ///
    /// # Arguments
    /// * `reader` - Trace source
    /// * `skip_invalid` - Log and skip malformed lines, including lines that
    ///   are not valid UTF-8, instead of failing
    /// * `on_outcome` - Called with the outcome of every command
    pub fn replay<R, F>(&mut self, mut reader: R, skip_invalid: bool, mut on_outcome: F) -> Result<()>
    where
        R: BufRead,
        F: FnMut(&Outcome),
    {
        let mut buf = Vec::new();
        let mut line_no = 0;

        loop {
            buf.clear();
            line_no += 1;
            let n = reader
                .read_until(b'\n', &mut buf)
                .with_context(|| format!("failed to read trace line {}", line_no))?;
            if n == 0 {
                return Ok(());
            }

            let parsed = match std::str::from_utf8(&buf) {
                Ok(line) => trace::parse_line(line_no, line),
                Err(_) => Err(trace::ParseError {
                    line: line_no,
                    message: "line is not valid UTF-8".to_string(),
                }),
            };

            let command = match parsed {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) if skip_invalid => {
                    warn!("Skipping malformed {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("invalid trace"),
            };

            debug!(?command, "replaying");
            let outcome = self
                .apply(command)
                .with_context(|| format!("failed to replay trace line {}", line_no))?;
            on_outcome(&outcome);
        }
    }

    /// Get the counters gathered so far
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Snapshot the current state
    pub fn report(&self) -> Report {
        Report {
            capacity: self.cache.capacity(),
            operations: self.operations,
            stats: self.stats,
            hit_ratio: self.stats.hit_ratio(),
            len: self.cache.len(),
            resident: self.cache.iter().map(|(key, _)| key.clone()).collect(),
        }
    }
}
