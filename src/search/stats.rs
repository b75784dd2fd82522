//! Disk-vs-index document counts for `GET /api/stats`.

use crate::ingest::{ScanFilters, scan_documents};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Documents present on disk, grouped by level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiskStats {
    /// Scanned root as displayed path.
    pub root: String,
    /// Number of indexable documents.
    pub total: u64,
    /// Counts per level1 folder.
    pub by_level1: BTreeMap<String, u64>,
    /// Counts per level2 folder name, summed across level1 folders.
    pub by_level2: BTreeMap<String, u64>,
    /// Counts per level2 folder nested under each level1 folder.
    pub by_level1_level2: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Documents present in the index, from terms aggregations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Total hit count reported by the engine.
    pub total: u64,
    /// Bucket counts of `level1`.
    pub by_level1: BTreeMap<String, u64>,
    /// Bucket counts of `level2`.
    pub by_level2: BTreeMap<String, u64>,
}

/// Documents on disk minus documents in the index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsDiff {
    /// Overall difference.
    pub total_missing: i64,
    /// Difference per level1 value.
    pub by_level1_missing: BTreeMap<String, i64>,
    /// Difference per level2 value.
    pub by_level2_missing: BTreeMap<String, i64>,
}

/// Full `GET /api/stats` payload.
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    /// Document root that was scanned.
    pub doc_root: String,
    /// On-disk counts.
    pub disk: DiskStats,
    /// Index counts.
    pub index: IndexStats,
    /// Differences between the two.
    pub diff: StatsDiff,
}

impl StatsReport {
    /// Combine disk and index counts.
    pub fn new(disk: DiskStats, index: IndexStats) -> Self {
        let diff = StatsDiff {
            total_missing: disk.total as i64 - index.total as i64,
            by_level1_missing: diff_maps(&disk.by_level1, &index.by_level1),
            by_level2_missing: diff_maps(&disk.by_level2, &index.by_level2),
        };
        Self {
            doc_root: disk.root.clone(),
            disk,
            index,
            diff,
        }
    }
}

/// Count indexable documents under `root` using the ingester's traversal rules.
pub fn scan_disk_stats(root: &Path) -> DiskStats {
    let mut stats = DiskStats {
        root: root.display().to_string(),
        ..Default::default()
    };
    for file in scan_documents(root, &ScanFilters::default(), 0) {
        stats.total += 1;
        *stats.by_level1.entry(file.level1.clone()).or_default() += 1;
        *stats.by_level2.entry(file.level2.clone()).or_default() += 1;
        *stats
            .by_level1_level2
            .entry(file.level1)
            .or_default()
            .entry(file.level2)
            .or_default() += 1;
    }
    stats
}

/// Read totals and level buckets from an aggregation response.
pub fn parse_index_stats(response: &Value) -> IndexStats {
    let total = match &response["hits"]["total"] {
        Value::Number(number) => number.as_u64().unwrap_or(0),
        object @ Value::Object(_) => object["value"].as_u64().unwrap_or(0),
        _ => 0,
    };
    IndexStats {
        total,
        by_level1: parse_buckets(&response["aggregations"]["by_level1"]),
        by_level2: parse_buckets(&response["aggregations"]["by_level2"]),
    }
}

fn parse_buckets(aggregation: &Value) -> BTreeMap<String, u64> {
    aggregation["buckets"]
        .as_array()
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|bucket| {
                    let key = match &bucket["key"] {
                        Value::String(key) => key.clone(),
                        Value::Null => return None,
                        other => other.to_string(),
                    };
                    Some((key, bucket["doc_count"].as_u64().unwrap_or(0)))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn diff_maps(disk: &BTreeMap<String, u64>, index: &BTreeMap<String, u64>) -> BTreeMap<String, i64> {
    let keys: BTreeSet<&String> = disk.keys().chain(index.keys()).collect();
    keys.into_iter()
        .map(|key| {
            let on_disk = disk.get(key).copied().unwrap_or(0) as i64;
            let indexed = index.get(key).copied().unwrap_or(0) as i64;
            (key.clone(), on_disk - indexed)
        })
        .collect()
}
