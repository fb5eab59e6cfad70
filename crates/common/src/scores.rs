//! Precomputed wallet score table.
//!
//! The artifact is a CSV written by the offline modeling pipeline: a `wallet`
//! column plus one column per attribute. It is read once and never mutated.

use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::lookup::normalize_address;

pub const KEY_COLUMN: &str = "wallet";

/// Columns the artifact must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    KEY_COLUMN,
    "credit_score",
    "net_deposit_usd",
    "repay_borrow_ratio_usd",
    "wallet_age_days",
    "total_tx_count",
    "is_liquidated",
];

#[derive(Debug, Clone, PartialEq)]
pub struct WalletRecord {
    pub credit_score: f64,
    pub net_deposit_usd: f64,
    pub repay_borrow_ratio_usd: f64,
    pub wallet_age_days: i64,
    pub total_tx_count: i64,
    pub is_liquidated: bool,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("score artifact not found at {path}")]
    MissingArtifact { path: String },

    #[error("score artifact at {path} could not be read: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("score artifact at {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
}

impl LoadError {
    pub fn path(&self) -> &str {
        match self {
            Self::MissingArtifact { path }
            | Self::Unreadable { path, .. }
            | Self::Malformed { path, .. } => path,
        }
    }

    /// Text shown on the page in place of the lookup form.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingArtifact { path } => format!(
                "The data file '{path}' was not found. Please run the modeling notebook to generate it."
            ),
            Self::Unreadable { path, reason } | Self::Malformed { path, reason } => format!(
                "The data file '{path}' could not be loaded ({reason}). Please run the modeling notebook to regenerate it."
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    wallet: String,
    credit_score: f64,
    net_deposit_usd: f64,
    repay_borrow_ratio_usd: f64,
    #[serde(deserialize_with = "de_count")]
    wallet_age_days: i64,
    #[serde(deserialize_with = "de_count")]
    total_tx_count: i64,
    #[serde(deserialize_with = "de_flag")]
    is_liquidated: bool,
}

/// Integer column. Dataframe exports sometimes write counts as `12.0`.
fn de_count<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let raw = String::deserialize(d)?;
    let s = raw.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Ok(n);
    }
    match s.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation)]
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(serde::de::Error::custom(format!(
            "expected an integer, got {raw:?}"
        ))),
    }
}

/// 0/1 flag, also accepting `0.0`/`1.0` and `true`/`false`.
fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(d)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" => Ok(true),
        "0" | "0.0" | "false" => Ok(false),
        _ => Err(serde::de::Error::custom(format!(
            "expected a 0/1 flag, got {raw:?}"
        ))),
    }
}

/// Immutable address -> record index. Keys are stored normalized.
#[derive(Debug, Default)]
pub struct ScoreTable {
    rows: HashMap<String, WalletRecord>,
}

impl ScoreTable {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => LoadError::MissingArtifact {
                path: display.clone(),
            },
            _ => LoadError::Unreadable {
                path: display.clone(),
                reason: e.to_string(),
            },
        })?;
        Self::from_csv(file, &display)
    }

    /// Parse a CSV stream. `origin` only labels errors.
    pub fn from_csv<R: io::Read>(rdr: R, origin: &str) -> Result<Self, LoadError> {
        let malformed = |reason: String| LoadError::Malformed {
            path: origin.to_string(),
            reason,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let headers = reader
            .headers()
            .map_err(|e| malformed(e.to_string()))?
            .clone();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .collect();
        if !missing.is_empty() {
            return Err(malformed(format!(
                "missing column(s): {}",
                missing.join(", ")
            )));
        }

        let mut rows = HashMap::new();
        for result in reader.deserialize::<CsvRow>() {
            let row = result.map_err(|e| malformed(e.to_string()))?;
            let key = normalize_address(&row.wallet);
            let record = WalletRecord {
                credit_score: row.credit_score,
                net_deposit_usd: row.net_deposit_usd,
                repay_borrow_ratio_usd: row.repay_borrow_ratio_usd,
                wallet_age_days: row.wallet_age_days,
                total_tx_count: row.total_tx_count,
                is_liquidated: row.is_liquidated,
            };
            if rows.insert(key.clone(), record).is_some() {
                return Err(malformed(format!("duplicate wallet {key}")));
            }
        }

        Ok(Self { rows })
    }

    pub fn from_records(records: impl IntoIterator<Item = (String, WalletRecord)>) -> Self {
        Self {
            rows: records
                .into_iter()
                .map(|(addr, rec)| (normalize_address(&addr), rec))
                .collect(),
        }
    }

    /// Exact match on an already normalized key.
    pub fn get(&self, key: &str) -> Option<&WalletRecord> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read-through cache over the artifact: the first `load` reads the file,
/// every later call returns the same outcome (success or failure) without I/O.
#[derive(Debug)]
pub struct ArtifactCache {
    path: PathBuf,
    cell: OnceLock<Result<Arc<ScoreTable>, LoadError>>,
}

impl ArtifactCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceLock::new(),
        }
    }

    /// Cache that is already populated, for callers that built the table themselves.
    pub fn with_table(path: impl Into<PathBuf>, table: ScoreTable) -> Self {
        Self {
            path: path.into(),
            cell: OnceLock::from(Ok(Arc::new(table))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn load(&self) -> Result<Arc<ScoreTable>, LoadError> {
        self.cell
            .get_or_init(|| {
                let res = ScoreTable::from_path(&self.path).map(Arc::new);
                match &res {
                    Ok(table) => tracing::info!(
                        path = %self.path.display(),
                        rows = table.len(),
                        "score artifact loaded"
                    ),
                    Err(e) => tracing::warn!(error = %e, "score artifact unavailable"),
                }
                res
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "wallet,credit_score,net_deposit_usd,repay_borrow_ratio_usd,wallet_age_days,total_tx_count,is_liquidated";

    fn write_artifact(body: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(body.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn test_loads_rows_keyed_by_wallet() {
        let tmp = write_artifact(&format!(
            "{HEADER}\n0xabc123,87.456,1500.5,0.98,420,37,1\n0xdef456,12.0,-30.25,0.1,3,2,0\n"
        ));
        let table = ScoreTable::from_path(tmp.path()).unwrap();
        assert_eq!(table.len(), 2);

        let rec = table.get("0xabc123").unwrap();
        assert!((rec.credit_score - 87.456).abs() < 1e-9);
        assert!((rec.net_deposit_usd - 1500.5).abs() < 1e-9);
        assert_eq!(rec.wallet_age_days, 420);
        assert_eq!(rec.total_tx_count, 37);
        assert!(rec.is_liquidated);
        assert!(!table.get("0xdef456").unwrap().is_liquidated);
    }

    #[test]
    fn test_keys_are_normalized_at_load() {
        let table = ScoreTable::from_csv(
            format!("{HEADER}\n  0xAbC123 ,50,0,0,1,1,0\n").as_bytes(),
            "inline",
        )
        .unwrap();
        assert!(table.get("0xabc123").is_some());
        assert!(table.get("0xAbC123").is_none());
    }

    #[test]
    fn test_extra_columns_and_reordered_header_are_accepted() {
        let csv = "is_liquidated,wallet,segment,total_tx_count,wallet_age_days,repay_borrow_ratio_usd,net_deposit_usd,credit_score\n\
                   0,0xaaa,whale,10,5,1.5,200,66.6\n";
        let table = ScoreTable::from_csv(csv.as_bytes(), "inline").unwrap();
        let rec = table.get("0xaaa").unwrap();
        assert_eq!(rec.total_tx_count, 10);
        assert!((rec.credit_score - 66.6).abs() < 1e-9);
    }

    #[test]
    fn test_float_encoded_counts_and_flags() {
        let table = ScoreTable::from_csv(
            format!("{HEADER}\n0xaaa,10,0,0,12.0,7.0,1.0\n0xbbb,10,0,0,1,1,False\n").as_bytes(),
            "inline",
        )
        .unwrap();
        let a = table.get("0xaaa").unwrap();
        assert_eq!(a.wallet_age_days, 12);
        assert_eq!(a.total_tx_count, 7);
        assert!(a.is_liquidated);
        assert!(!table.get("0xbbb").unwrap().is_liquidated);
    }

    #[test]
    fn test_missing_file_is_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final_scored_wallets.csv");
        let err = ScoreTable::from_path(&path).unwrap_err();
        assert!(matches!(err, LoadError::MissingArtifact { .. }));
        assert!(err.user_message().contains("final_scored_wallets.csv"));
        assert!(err.user_message().contains("modeling notebook"));
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let err = ScoreTable::from_csv(
            "wallet,credit_score\n0xaaa,10\n".as_bytes(),
            "scores.csv",
        )
        .unwrap_err();
        match &err {
            LoadError::Malformed { path, reason } => {
                assert_eq!(path, "scores.csv");
                assert!(reason.contains("is_liquidated"));
                assert!(reason.contains("net_deposit_usd"));
                assert!(!reason.contains("credit_score"));
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
        assert_eq!(err.path(), "scores.csv");
    }

    #[test]
    fn test_bad_value_is_malformed() {
        let err = ScoreTable::from_csv(
            format!("{HEADER}\n0xaaa,high,0,0,1,1,0\n").as_bytes(),
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));

        let err = ScoreTable::from_csv(
            format!("{HEADER}\n0xaaa,10,0,0,1,1,maybe\n").as_bytes(),
            "inline",
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_duplicate_wallet_after_normalization_is_malformed() {
        let err = ScoreTable::from_csv(
            format!("{HEADER}\n0xAAA,10,0,0,1,1,0\n0xaaa,20,0,0,1,1,0\n").as_bytes(),
            "inline",
        )
        .unwrap_err();
        match err {
            LoadError::Malformed { reason, .. } => assert!(reason.contains("duplicate wallet 0xaaa")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_header_only_artifact_is_empty_table() {
        let table = ScoreTable::from_csv(format!("{HEADER}\n").as_bytes(), "inline").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_cache_reads_storage_once() {
        let tmp = write_artifact(&format!("{HEADER}\n0xabc123,87.456,0,0,1,1,0\n"));
        let path = tmp.path().to_path_buf();
        let cache = ArtifactCache::new(&path);
        assert!(!cache.is_loaded());

        let first = cache.load().unwrap();
        assert!(cache.is_loaded());

        // Removing the artifact must not affect later loads.
        drop(tmp);
        assert!(!path.exists());
        let second = cache.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_cache_memoizes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        let cache = ArtifactCache::new(&path);
        assert!(matches!(cache.load(), Err(LoadError::MissingArtifact { .. })));

        // The artifact appearing mid-run is not picked up.
        std::fs::write(&path, format!("{HEADER}\n0xaaa,1,0,0,1,1,0\n")).unwrap();
        assert!(matches!(cache.load(), Err(LoadError::MissingArtifact { .. })));
    }

    #[test]
    fn test_with_table_is_preloaded() {
        let table = ScoreTable::from_records([(
            "0xAAA".to_string(),
            WalletRecord {
                credit_score: 1.0,
                net_deposit_usd: 0.0,
                repay_borrow_ratio_usd: 0.0,
                wallet_age_days: 1,
                total_tx_count: 1,
                is_liquidated: false,
            },
        )]);
        let cache = ArtifactCache::with_table("unused.csv", table);
        assert!(cache.is_loaded());
        assert!(cache.load().unwrap().get("0xaaa").is_some());
        assert_eq!(cache.path(), Path::new("unused.csv"));
    }
}
