//! Drawing persistence bridge
//!
//! User drawings are kept in a key-value string store under
//! [`DRAWINGS_KEY`] as a JSON object mapping symbol to an array of saved
//! shapes. On chart init the shapes for the active symbol are replayed into
//! the widget, except leftovers of position and order lines from an earlier
//! session, which the reconciliation engine regenerates itself.
//!
//! Restoring is auxiliary: a corrupted entry is reset to an empty array and
//! the failure never reaches the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::OverlayError;
use crate::chart::{ChartAdapter, ChartError};
use crate::trading::same_symbol;

pub const DRAWINGS_KEY: &str = "chart_drawings";

/// Durable key-value string storage
pub trait DrawingStore {
    fn read(&self, key: &str) -> Result<Option<String>, OverlayError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), OverlayError>;
}

impl<S: DrawingStore + ?Sized> DrawingStore for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, OverlayError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), OverlayError> {
        (**self).write(key, value)
    }
}

/// In-process store
#[derive(Debug, Clone, Default)]
pub struct MemoryDrawingStore {
    entries: HashMap<String, String>,
}

impl MemoryDrawingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl DrawingStore for MemoryDrawingStore {
    fn read(&self, key: &str) -> Result<Option<String>, OverlayError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), OverlayError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object file on disk
#[derive(Debug, Clone)]
pub struct FileDrawingStore {
    path: PathBuf,
}

impl FileDrawingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_entries(&self) -> Result<HashMap<String, String>, OverlayError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl DrawingStore for FileDrawingStore {
    fn read(&self, key: &str) -> Result<Option<String>, OverlayError> {
        Ok(self.load_entries()?.remove(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), OverlayError> {
        let mut entries = self.load_entries().unwrap_or_else(|err| {
            warn!("Discarding unreadable store {}: {}", self.path.display(), err);
            HashMap::new()
        });
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapePoint {
    pub time: i64,
    pub price: f64,
}

/// Options of a saved shape: label text plus free-form style keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub style: Map<String, Value>,
}

/// A user-authored drawing as persisted by the free-hand drawing feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedShape {
    pub name: String,
    pub points: Vec<ShapePoint>,
    #[serde(default)]
    pub options: ShapeOptions,
}

impl SavedShape {
    /// Whether this is a leftover position or order line
    pub fn is_position_artifact(&self) -> bool {
        self.options
            .text
            .as_deref()
            .is_some_and(is_position_label)
    }
}

/// True when `text` contains "long" or "short" as a standalone token
pub fn is_position_label(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token.eq_ignore_ascii_case("long") || token.eq_ignore_ascii_case("short"))
}

/// Outcome of one restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub replayed: usize,
    pub suppressed: usize,
    /// The symbol's stored entry was corrupted and has been reset
    pub reset: bool,
}

/// Replay saved drawings for `symbol` into the chart
pub fn restore_drawings<C, S>(chart: &mut C, store: &mut S, symbol: &str) -> RestoreReport
where
    C: ChartAdapter + ?Sized,
    S: DrawingStore + ?Sized,
{
    let mut report = RestoreReport::default();

    let raw = match store.read(DRAWINGS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return report,
        Err(err) => {
            warn!("Skipping drawing restore for {}: {}", symbol, err);
            return report;
        }
    };

    let mut document = match parse_document(&raw) {
        Ok(document) => document,
        Err(err) => {
            warn!("Resetting drawings document: {}", err);
            let mut document = Map::new();
            document.insert(symbol.to_string(), Value::Array(Vec::new()));
            persist_document(store, &document);
            report.reset = true;
            return report;
        }
    };

    let Some(entry_key) = document.keys().find(|k| same_symbol(k, symbol)).cloned() else {
        debug!("No saved drawings for {}", symbol);
        return report;
    };

    if let Err(err) = replay_entry(chart, &document[&entry_key], &mut report) {
        if let OverlayError::Chart {
            source: ChartError::NotReady,
            ..
        } = err
        {
            // Nothing wrong with the stored shapes; keep them for the next init
            warn!("Chart not ready while restoring drawings for {}", entry_key);
            return report;
        }
        warn!("Resetting saved drawings for {}: {}", entry_key, err);
        document.insert(entry_key, Value::Array(Vec::new()));
        persist_document(store, &document);
        report.reset = true;
        return report;
    }

    info!(
        "Restored {} drawings for {} ({} position lines suppressed)",
        report.replayed, symbol, report.suppressed
    );
    report
}

fn parse_document(raw: &str) -> Result<Map<String, Value>, OverlayError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(OverlayError::CorruptDrawings(format!(
            "expected an object, found {}",
            value_kind(&other)
        ))),
    }
}

fn replay_entry<C>(chart: &mut C, entry: &Value, report: &mut RestoreReport) -> Result<(), OverlayError>
where
    C: ChartAdapter + ?Sized,
{
    let shapes: Vec<SavedShape> = serde_json::from_value(entry.clone())?;
    for shape in &shapes {
        if shape.is_position_artifact() {
            report.suppressed += 1;
            continue;
        }
        chart
            .create_multipoint_shape(shape)
            .map_err(|source| OverlayError::Chart { op: "replay", source })?;
        report.replayed += 1;
    }
    Ok(())
}

fn persist_document<S>(store: &mut S, document: &Map<String, Value>)
where
    S: DrawingStore + ?Sized,
{
    let result = serde_json::to_string(document)
        .map_err(OverlayError::from)
        .and_then(|raw| store.write(DRAWINGS_KEY, &raw));
    if let Err(err) = result {
        warn!("Failed to persist reset drawings: {}", err);
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
