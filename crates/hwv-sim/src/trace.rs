//! Per-cycle trace capture

use hwv_ir::BitValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Values seen at one running rising edge
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub cycle: u64,
    pub outputs: IndexMap<String, BitValue>,
    /// Register values going into the edge
    pub registers: IndexMap<String, BitValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimTrace {
    pub snapshots: Vec<Snapshot>,
}

impl SimTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Values of one output across the trace
    pub fn output_history(&self, name: &str) -> Vec<BitValue> {
        self.snapshots
            .iter()
            .filter_map(|s| s.outputs.get(name).cloned())
            .collect()
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self).map_err(std::io::Error::other)
    }
}
