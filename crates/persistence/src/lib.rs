#![deny(warnings)]

//! Storage backend for the analysis layer: an in-memory [`DataStore`]
//! implementation fed from serialized datasets.
//!
//! Firm states are keyed by (firm, year); market, consumer, and economic
//! snapshots by year; analysis records by year with upsert semantics. The
//! core only ever talks to the [`DataStore`] port.

use analysis::{AnalysisRecord, DataStore};
use market_core::{
    validate_consumer, validate_economic, validate_firm_state, validate_market, ConsumerSnapshot,
    EconomicSnapshot, Firm, FirmState, MarketSnapshot, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a dataset.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Underlying file I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON dataset.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed YAML dataset.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The file extension maps to no supported format.
    #[error("unsupported dataset format: {0}")]
    UnsupportedFormat(String),
    /// A record failed domain validation on ingest.
    #[error("invalid data for year {year}: {source}")]
    Invalid {
        /// Year of the offending record.
        year: i32,
        /// The underlying validation failure.
        #[source]
        source: ValidationError,
    },
}

/// One year's worth of raw records in a dataset file. Any of the shared
/// snapshots may be absent; the orchestrator refuses to analyze such years
/// but the store still serves what exists (e.g. for historical series).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    /// The year the records belong to.
    pub year: i32,
    /// Firm states present for this year.
    #[serde(default)]
    pub firms: Vec<FirmState>,
    /// Market snapshot, if recorded.
    #[serde(default)]
    pub market: Option<MarketSnapshot>,
    /// Consumer snapshot, if recorded.
    #[serde(default)]
    pub consumer: Option<ConsumerSnapshot>,
    /// Economic snapshot, if recorded.
    #[serde(default)]
    pub economic: Option<EconomicSnapshot>,
}

/// A full dataset document, as serialized to JSON or YAML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Per-year records, in no particular order.
    pub years: Vec<YearRecord>,
}

/// In-memory [`DataStore`] over ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    firms: BTreeMap<(Firm, i32), FirmState>,
    market: BTreeMap<i32, MarketSnapshot>,
    consumer: BTreeMap<i32, ConsumerSnapshot>,
    economic: BTreeMap<i32, EconomicSnapshot>,
    analyses: BTreeMap<i32, AnalysisRecord>,
}

impl MemoryStore {
    /// Build a store from a dataset, validating every record on the way in.
    /// Later records for the same (firm, year) or year replace earlier ones.
    pub fn from_dataset(dataset: Dataset) -> Result<MemoryStore, PersistError> {
        let mut store = MemoryStore::default();
        for record in dataset.years {
            let year = record.year;
            let invalid = |source| PersistError::Invalid { year, source };
            for state in record.firms {
                validate_firm_state(&state).map_err(invalid)?;
                store.firms.insert((state.firm, year), state);
            }
            if let Some(market) = record.market {
                validate_market(&market).map_err(invalid)?;
                store.market.insert(year, market);
            }
            if let Some(consumer) = record.consumer {
                validate_consumer(&consumer).map_err(invalid)?;
                store.consumer.insert(year, consumer);
            }
            if let Some(economic) = record.economic {
                validate_economic(&economic).map_err(invalid)?;
                store.economic.insert(year, economic);
            }
        }
        tracing::debug!(
            firm_states = store.firms.len(),
            years = store.market.len(),
            "dataset ingested"
        );
        Ok(store)
    }

    /// Load a dataset file, dispatching on the extension (`.json`, `.yaml`,
    /// `.yml`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<MemoryStore, PersistError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let dataset: Dataset = match extension {
            "json" => serde_json::from_str(&text)?,
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            other => return Err(PersistError::UnsupportedFormat(other.to_string())),
        };
        MemoryStore::from_dataset(dataset)
    }
}

impl DataStore for MemoryStore {
    fn firm_state(&self, firm: Firm, year: i32) -> Option<FirmState> {
        self.firms.get(&(firm, year)).cloned()
    }

    fn market(&self, year: i32) -> Option<MarketSnapshot> {
        self.market.get(&year).cloned()
    }

    fn consumer(&self, year: i32) -> Option<ConsumerSnapshot> {
        self.consumer.get(&year).cloned()
    }

    fn economic(&self, year: i32) -> Option<EconomicSnapshot> {
        self.economic.get(&year).cloned()
    }

    fn years(&self) -> Vec<i32> {
        // BTreeMap iteration is already ordered; only dedup across firms.
        let mut years: Vec<i32> = self.firms.keys().map(|(_, year)| *year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    fn analysis(&self, year: i32) -> Option<AnalysisRecord> {
        self.analyses.get(&year).cloned()
    }

    fn upsert_analysis(&mut self, record: AnalysisRecord) {
        self.analyses.insert(record.year, record);
    }
}
