//! Binary definition graph files.
//!
//! A graph file is a `bincode` snapshot of the machines reachable from a set
//! of headword definitions. Files ending in `.gz` are gzip-compressed, which
//! is how the 4lang and Longman graphs are distributed.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use defgraph_core::{DefgraphError, Machine, MachineId, MachineStore, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::source::DefinitionSource;

pub const GRAPH_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFile {
    pub version: u32,
    /// Where the graph came from, e.g. `4lang` or `longman`.
    pub source: String,
    pub machines: Vec<Machine>,
    /// Headword → definition root (index into `machines`).
    pub definitions: BTreeMap<String, MachineId>,
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

impl GraphFile {
    /// Snapshot the part of `store` reachable from `definitions`, renumbering
    /// machines so the file holds nothing else.
    pub fn from_store(
        source: impl Into<String>,
        store: &MachineStore,
        definitions: &BTreeMap<String, MachineId>,
    ) -> Result<Self> {
        let mut order: Vec<MachineId> = Vec::new();
        let mut remap: HashMap<MachineId, MachineId> = HashMap::new();
        for root in definitions.values() {
            for id in store.unique_machines_in_tree(*root)? {
                if !remap.contains_key(&id) {
                    remap.insert(id, MachineId(order.len() as u32));
                    order.push(id);
                }
            }
        }

        let mut machines = Vec::with_capacity(order.len());
        for old in &order {
            let m = store.get(*old)?;
            let partitions = m
                .partitions()
                .iter()
                .map(|part| part.iter().map(|c| remap[c]).collect())
                .collect();
            machines.push(Machine::new(m.printname(), m.control().cloned(), partitions));
        }

        let definitions = definitions
            .iter()
            .map(|(word, root)| (word.clone(), remap[root]))
            .collect();

        Ok(Self {
            version: GRAPH_FORMAT_VERSION,
            source: source.into(),
            machines,
            definitions,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        let reader = BufReader::new(File::open(path)?);
        if is_gzip(path) {
            GzDecoder::new(reader).read_to_end(&mut bytes)?;
        } else {
            let mut reader = reader;
            reader.read_to_end(&mut bytes)?;
        }

        let graph: GraphFile =
            bincode::deserialize(&bytes).map_err(|e| DefgraphError::GraphFormat(e.to_string()))?;
        if graph.version != GRAPH_FORMAT_VERSION {
            return Err(DefgraphError::UnsupportedVersion {
                found: graph.version,
                expected: GRAPH_FORMAT_VERSION,
            });
        }
        let len = graph.machines.len();
        if let Some((word, root)) = graph.definitions.iter().find(|(_, r)| r.index() >= len) {
            return Err(DefgraphError::GraphFormat(format!(
                "definition of '{}' points at machine {} of {}",
                word, root, len
            )));
        }

        tracing::info!(
            "Loaded graph '{}' from {:?}: {} headwords, {} machines",
            graph.source,
            path,
            graph.definitions.len(),
            len
        );
        Ok(graph)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = bincode::serialize(self).map_err(|e| DefgraphError::GraphFormat(e.to_string()))?;
        let writer = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            let mut enc = GzEncoder::new(writer, Compression::default());
            enc.write_all(&bytes)?;
            enc.finish()?.flush()?;
        } else {
            let mut writer = writer;
            writer.write_all(&bytes)?;
            writer.flush()?;
        }
        tracing::debug!("Saved graph '{}' to {:?}", self.source, path);
        Ok(())
    }

    /// Rebuild an arena (with parent links) and the headword map.
    pub fn into_parts(self) -> Result<(MachineStore, BTreeMap<String, MachineId>)> {
        let store = MachineStore::from_machines(self.machines)?;
        Ok((store, self.definitions))
    }
}

impl DefinitionSource for GraphFile {
    fn lookup(&self, word: &str) -> Option<&Machine> {
        self.definitions
            .get(word)
            .and_then(|root| self.machines.get(root.index()))
    }

    fn headwords(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    fn name(&self) -> &str {
        &self.source
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }
}
