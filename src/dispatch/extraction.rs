//! Run-scoped memory: which symbols moved where, and which steps already ran.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::ActionType;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionEntry {
    pub moved_to: Vec<String>,
    /// Names found in the generated targets, not the names the plan declared.
    pub symbols: Vec<String>,
}

/// Source file → where its definitions went. Entries only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractionMap {
    entries: BTreeMap<String, ExtractionEntry>,
}

impl ExtractionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<I>(&mut self, source: &str, target: &str, symbols: I)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.entries.entry(source.to_string()).or_default();
        if !entry.moved_to.iter().any(|t| t == target) {
            entry.moved_to.push(target.to_string());
        }
        for symbol in symbols {
            if !entry.symbols.contains(&symbol) {
                entry.symbols.push(symbol);
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&ExtractionEntry> {
        self.entries.get(source)
    }

    pub fn symbols_for(&self, source: &str) -> &[String] {
        self.entries.get(source).map(|e| e.symbols.as_slice()).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtractionEntry)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub action: ActionType,
    pub file: String,
    pub description: String,
}

/// Append-only log of the steps completed so far in a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TaskHistory {
    records: Vec<TaskRecord>,
}

impl TaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: ActionType, file: &str, description: &str) {
        self.records.push(TaskRecord {
            action,
            file: file.to_string(),
            description: description.to_string(),
        });
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
