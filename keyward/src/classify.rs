//! Ranking, per-type aggregation and remediation advice for big keys.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use keyward_core::{KeyRecord, KeyType, MEBIBYTE};
use serde::{Deserialize, Serialize, Serializer};

/// Sorts records by size, largest first.
///
/// The sort is stable: records of equal size keep their discovery order, so
/// the same input always yields the same ranking.
pub fn classify(mut records: Vec<KeyRecord>) -> Vec<KeyRecord> {
    records.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    records
}

/// Statistics for all big keys of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeAggregate {
    /// Type these statistics describe.
    pub key_type: KeyType,
    /// Number of keys.
    pub count: usize,
    /// Sum of key sizes in bytes.
    pub total_bytes: u64,
    /// Size of the largest key in bytes.
    pub max_bytes: u64,
    /// Records in the order they were added.
    pub members: Vec<KeyRecord>,
}

impl TypeAggregate {
    fn new(key_type: KeyType) -> Self {
        Self {
            key_type,
            count: 0,
            total_bytes: 0,
            max_bytes: 0,
            members: Vec::new(),
        }
    }

    /// Adds one record of this type.
    pub fn push(&mut self, record: &KeyRecord) {
        debug_assert_eq!(record.key_type, self.key_type);
        self.count += 1;
        self.total_bytes += record.size_bytes;
        self.max_bytes = self.max_bytes.max(record.size_bytes);
        self.members.push(record.clone());
    }

    /// Mean key size in bytes, `0.0` when empty.
    pub fn average_bytes(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_bytes as f64 / self.count as f64
        }
    }
}

/// Groups records by type. Types appear in the order first seen.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a KeyRecord>,
) -> IndexMap<KeyType, TypeAggregate> {
    let mut by_type = IndexMap::new();
    for record in records {
        by_type
            .entry(record.key_type)
            .or_insert_with(|| TypeAggregate::new(record.key_type))
            .push(record);
    }
    by_type
}

/// Limits used by [`Recommender`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Keys larger than this are critical.
    pub critical_bytes: u64,
    /// Keys larger than this (and not critical) get a warning.
    pub warning_bytes: u64,
    /// String length above which compression or splitting is advised.
    pub string_length: u64,
    /// List length above which paginated reads are advised.
    pub list_length: u64,
    /// Hash field count above which `HSCAN` is advised.
    pub hash_fields: u64,
    /// Set cardinality above which `SSCAN` is advised.
    pub set_members: u64,
    /// Sorted set cardinality above which `ZSCAN` is advised.
    pub sorted_set_members: u64,
    /// Positive ttl below this is flagged as too short (e.g. "5m").
    #[serde(with = "humantime_serde")]
    pub min_ttl: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical_bytes: MEBIBYTE,
            warning_bytes: 100 * 1024,
            string_length: MEBIBYTE,
            list_length: 10_000,
            hash_fields: 5_000,
            set_members: 5_000,
            sorted_set_members: 5_000,
            min_ttl: Duration::from_secs(300),
        }
    }
}

/// Size tier of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Between the warning and critical thresholds.
    Warning,
    /// Above the critical threshold.
    Critical,
}

/// One remediation hint for a key.
///
/// Renders as a human-readable sentence and serializes as the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    /// Key exceeds a size threshold.
    Size {
        /// Tier reached.
        severity: Severity,
        /// Threshold that was exceeded.
        threshold: u64,
    },
    /// Compress a long string value.
    CompressValue,
    /// Split a long string into several keys.
    SplitValue,
    /// Read long lists with ranged `LRANGE` calls.
    PaginateList,
    /// Split a long list into several lists.
    SplitList,
    /// Enumerate large hashes with `HSCAN`.
    ScanHash,
    /// Partition a large hash into several hashes.
    PartitionHash,
    /// Enumerate large sets with `SSCAN`.
    ScanSet,
    /// Split a large set into several sets.
    SplitSet,
    /// Enumerate large sorted sets with `ZSCAN`.
    ScanSortedSet,
    /// Query sorted sets by score range.
    RangeByScore,
    /// Key never expires.
    NoExpiry,
    /// Ttl is positive but shorter than the minimum.
    ShortTtl {
        /// Remaining ttl in seconds.
        ttl_seconds: u64,
    },
}

impl Advice {
    /// Size tier if this is size advice.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::Size { severity, .. } => Some(*severity),
            _ => None,
        }
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size {
                severity: Severity::Critical,
                threshold,
            } => write!(f, "CRITICAL: key is larger than {}", human_bytes(*threshold)),
            Self::Size {
                severity: Severity::Warning,
                threshold,
            } => write!(f, "WARNING: key is larger than {}", human_bytes(*threshold)),
            Self::CompressValue => f.write_str("Consider compressing the value"),
            Self::SplitValue => f.write_str("Consider splitting the value into smaller keys"),
            Self::PaginateList => f.write_str("Read with paginated LRANGE instead of LRANGE 0 -1"),
            Self::SplitList => f.write_str("Consider splitting into several smaller lists"),
            Self::ScanHash => f.write_str("Use HSCAN instead of HGETALL"),
            Self::PartitionHash => f.write_str("Consider partitioning into several hashes"),
            Self::ScanSet => f.write_str("Use SSCAN instead of SMEMBERS"),
            Self::SplitSet => f.write_str("Consider splitting into several smaller sets"),
            Self::ScanSortedSet => f.write_str("Use ZSCAN instead of ZRANGE 0 -1"),
            Self::RangeByScore => f.write_str("Use ZRANGEBYSCORE for targeted queries"),
            Self::NoExpiry => f.write_str("Set an expiry to avoid unbounded growth"),
            Self::ShortTtl { ttl_seconds } => write!(
                f,
                "TTL of {ttl_seconds}s is very short and may cause expiration overhead"
            ),
        }
    }
}

impl Serialize for Advice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn human_bytes(bytes: u64) -> String {
    if bytes >= MEBIBYTE && bytes % MEBIBYTE == 0 {
        format!("{}MB", bytes / MEBIBYTE)
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{bytes} bytes")
    }
}

/// Produces per-key advice from [`Thresholds`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Recommender {
    thresholds: Thresholds,
}

impl Recommender {
    /// Recommender using `thresholds`.
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Limits in use.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Size tier of `record`, if any.
    pub fn severity(&self, record: &KeyRecord) -> Option<Severity> {
        if record.size_bytes > self.thresholds.critical_bytes {
            Some(Severity::Critical)
        } else if record.size_bytes > self.thresholds.warning_bytes {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    /// Advice for one record: size tier first, then type-specific advice,
    /// then ttl advice. Every rule is checked independently.
    pub fn recommend(&self, record: &KeyRecord) -> Vec<Advice> {
        let t = &self.thresholds;
        let mut advice = Vec::new();

        match self.severity(record) {
            Some(Severity::Critical) => advice.push(Advice::Size {
                severity: Severity::Critical,
                threshold: t.critical_bytes,
            }),
            Some(Severity::Warning) => advice.push(Advice::Size {
                severity: Severity::Warning,
                threshold: t.warning_bytes,
            }),
            None => {}
        }

        let elements = record.element_count;
        let by_type: &[Advice] = match record.key_type {
            KeyType::String if elements > t.string_length => {
                &[Advice::CompressValue, Advice::SplitValue]
            }
            KeyType::List if elements > t.list_length => &[Advice::PaginateList, Advice::SplitList],
            KeyType::Hash if elements > t.hash_fields => &[Advice::ScanHash, Advice::PartitionHash],
            KeyType::Set if elements > t.set_members => &[Advice::ScanSet, Advice::SplitSet],
            KeyType::SortedSet if elements > t.sorted_set_members => {
                &[Advice::ScanSortedSet, Advice::RangeByScore]
            }
            KeyType::String
            | KeyType::List
            | KeyType::Hash
            | KeyType::Set
            | KeyType::SortedSet => &[],
        };
        advice.extend_from_slice(by_type);

        match record.ttl_seconds {
            -1 => advice.push(Advice::NoExpiry),
            ttl if ttl > 0 && (ttl as u64) < t.min_ttl.as_secs() => {
                advice.push(Advice::ShortTtl {
                    ttl_seconds: ttl as u64,
                })
            }
            _ => {}
        }

        advice
    }
}

/// Advice printed once for the whole keyspace when any big key was found.
pub fn general_advice() -> &'static [&'static str] {
    &[
        "Page through big keys instead of reading them whole",
        "Give every key an appropriate TTL",
        "Monitor big keys regularly",
        "Break big keys into smaller structures",
        "Avoid commands that return whole structures (KEYS, HGETALL, SMEMBERS)",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str, key_type: KeyType, size: u64, elements: u64, ttl: i64) -> KeyRecord {
        KeyRecord {
            name: name.to_owned(),
            key_type,
            size_bytes: size,
            element_count: elements,
            ttl_seconds: ttl,
        }
    }

    #[test]
    fn equal_sizes_keep_discovery_order() {
        let records = vec![
            record("a", KeyType::String, 5, 1, -1),
            record("b", KeyType::String, 100, 1, -1),
            record("c", KeyType::String, 5, 1, -1),
            record("d", KeyType::String, 50, 1, -1),
        ];
        let names: Vec<_> = classify(records).into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["b", "d", "a", "c"]);
    }

    #[test]
    fn aggregate_groups_in_first_seen_order() {
        let records = [
            record("h1", KeyType::Hash, 300, 3, -1),
            record("s1", KeyType::String, 100, 100, -1),
            record("h2", KeyType::Hash, 100, 1, -1),
        ];
        let by_type = aggregate(&records);

        let types: Vec<_> = by_type.keys().copied().collect();
        assert_eq!(types, [KeyType::Hash, KeyType::String]);

        let hashes = &by_type[&KeyType::Hash];
        assert_eq!(hashes.count, 2);
        assert_eq!(hashes.total_bytes, 400);
        assert_eq!(hashes.max_bytes, 300);
        assert_eq!(hashes.members, [records[0].clone(), records[2].clone()]);
        assert_eq!(hashes.average_bytes(), 200.0);
    }

    #[test]
    fn large_hash_without_expiry() {
        let advice = Recommender::default().recommend(&record("h", KeyType::Hash, 10, 6000, -1));
        assert_eq!(
            advice,
            [Advice::ScanHash, Advice::PartitionHash, Advice::NoExpiry]
        );
        assert!(advice[0].to_string().contains("HSCAN"));
    }

    #[test]
    fn every_rule_can_fire_at_once() {
        let advice = Recommender::default().recommend(&record(
            "z",
            KeyType::SortedSet,
            2 * MEBIBYTE,
            7000,
            60,
        ));
        assert_eq!(
            advice,
            [
                Advice::Size {
                    severity: Severity::Critical,
                    threshold: MEBIBYTE
                },
                Advice::ScanSortedSet,
                Advice::RangeByScore,
                Advice::ShortTtl { ttl_seconds: 60 },
            ]
        );
    }

    #[test]
    fn warning_tier_and_quiet_keys() {
        let recommender = Recommender::default();
        let warned = recommender.recommend(&record("s", KeyType::String, 200 * 1024, 10, 3600));
        assert_eq!(warned.len(), 1);
        assert_eq!(warned[0].severity(), Some(Severity::Warning));

        let quiet = recommender.recommend(&record("s", KeyType::List, 10, 10_000, 300));
        assert!(quiet.is_empty());

        let expired = recommender.recommend(&record("s", KeyType::Set, 10, 1, -2));
        assert!(expired.is_empty());
    }

    #[test]
    fn advice_serializes_as_text() {
        let json = serde_json::to_string(&[Advice::ScanSet, Advice::NoExpiry]).unwrap();
        assert_eq!(
            json,
            r#"["Use SSCAN instead of SMEMBERS","Set an expiry to avoid unbounded growth"]"#
        );
        assert_eq!(
            Advice::Size {
                severity: Severity::Critical,
                threshold: MEBIBYTE
            }
            .to_string(),
            "CRITICAL: key is larger than 1MB"
        );
    }
}
