//! Machine configuration: which definition graphs to load and how to run
//! spreading activation over them.
//!
//! Two formats are accepted, picked by file extension:
//!
//! ```text
//! # machine.cfg
//! [machine]
//! definitions_binary = data/4lang.bin.gz
//! longman_binary = data/longman.bin.gz
//! constructions = data/constructions.tsv
//!
//! [activation]
//! threshold = 0.5
//! ```
//!
//! or the same keys as TOML in a `.toml` file.

use std::path::{Path, PathBuf};

use defgraph_core::{DefgraphError, Result};
use serde::{Deserialize, Serialize};

/// Logical name of the graph behind `definitions_binary`.
pub const FOURLANG_GRAPH: &str = "4lang";
/// Logical name of the graph behind `longman_binary`.
pub const LONGMAN_GRAPH: &str = "longman";

// ─── Configuration Types ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRef {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationParams {
    /// Share of a headword's definition words that must be active before the
    /// headword itself activates (0.0-1.0). Default 1.0.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Upper bound on spreading activation loop iterations. Default 32.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Longest machine sequence offered to constructions. Default 3.
    #[serde(default = "default_max_sequence_len")]
    pub max_sequence_len: usize,
    /// How deep relation machines are copied when a word is expanded. Default 3.
    #[serde(default = "default_expand_depth")]
    pub expand_depth: usize,
}

fn default_threshold() -> f64 {
    1.0
}
fn default_max_iterations() -> usize {
    32
}
fn default_max_sequence_len() -> usize {
    3
}
fn default_expand_depth() -> usize {
    3
}

impl Default for ActivationParams {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max_iterations: default_max_iterations(),
            max_sequence_len: default_max_sequence_len(),
            expand_depth: default_expand_depth(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Graphs in load order. Earlier graphs win on duplicate headwords.
    pub graphs: Vec<GraphRef>,
    pub constructions: Option<PathBuf>,
    pub activation: ActivationParams,
    /// Words whose machines carry a plugin control named after the word.
    pub plugins: Vec<String>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl MachineConfig {
    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Graph references with paths resolved against the config directory.
    pub fn resolved_graphs(&self) -> Vec<GraphRef> {
        self.graphs
            .iter()
            .map(|g| GraphRef {
                name: g.name.clone(),
                path: self.resolve(&g.path),
            })
            .collect()
    }

    pub fn resolved_constructions(&self) -> Option<PathBuf> {
        self.constructions.as_deref().map(|p| self.resolve(p))
    }

    /// Every configured graph must exist on disk before anything is loaded.
    pub fn validate(&self) -> Result<()> {
        if self.graphs.is_empty() {
            return Err(DefgraphError::Config {
                line: 0,
                message: "no definition graphs configured".to_string(),
            });
        }
        for graph in self.resolved_graphs() {
            if !graph.path.is_file() {
                return Err(DefgraphError::MissingGraph {
                    name: graph.name,
                    path: graph.path,
                });
            }
        }
        if let Some(path) = self.resolved_constructions() {
            if !path.is_file() {
                return Err(DefgraphError::Config {
                    line: 0,
                    message: format!("constructions file {:?} does not exist", path),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.activation.threshold) {
            return Err(DefgraphError::Config {
                line: 0,
                message: format!(
                    "activation threshold {} outside 0.0..=1.0",
                    self.activation.threshold
                ),
            });
        }
        Ok(())
    }

    fn push_graph(&mut self, name: &str, path: &str) {
        if let Some(existing) = self.graphs.iter_mut().find(|g| g.name == name) {
            existing.path = PathBuf::from(path);
        } else {
            self.graphs.push(GraphRef {
                name: name.to_string(),
                path: PathBuf::from(path),
            });
        }
    }
}

// ─── INI Format ──────────────────────────────────────────────────

fn config_err(line: usize, message: impl Into<String>) -> DefgraphError {
    DefgraphError::Config {
        line,
        message: message.into(),
    }
}

fn parse_number<T: std::str::FromStr>(line: usize, key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| config_err(line, format!("'{}' is not a valid value for {}", value, key)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a `machine.cfg` style INI file.
pub fn parse_ini_config(content: &str) -> Result<MachineConfig> {
    let mut config = MachineConfig::default();
    let mut section = String::new();

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| config_err(line_no, "unterminated section header"))?;
            section = name.trim().to_lowercase();
            continue;
        }

        let split_at = line
            .find(|c: char| c == '=' || c == ':')
            .ok_or_else(|| config_err(line_no, format!("expected key = value, got '{}'", line)))?;
        let key = line[..split_at].trim();
        let value = line[split_at + 1..].trim();
        if key.is_empty() {
            return Err(config_err(line_no, "empty key"));
        }

        match (section.as_str(), key) {
            ("machine", "definitions_binary") => config.push_graph(FOURLANG_GRAPH, value),
            ("machine", "longman_binary") => config.push_graph(LONGMAN_GRAPH, value),
            ("machine", "constructions") => config.constructions = Some(PathBuf::from(value)),
            ("machine", "plugins") => config.plugins = split_list(value),
            ("graphs", name) => config.push_graph(name, value),
            ("activation", "threshold") => {
                config.activation.threshold = parse_number(line_no, key, value)?
            }
            ("activation", "max_iterations") => {
                config.activation.max_iterations = parse_number(line_no, key, value)?
            }
            ("activation", "max_sequence_len") => {
                config.activation.max_sequence_len = parse_number(line_no, key, value)?
            }
            ("activation", "expand_depth") => {
                config.activation.expand_depth = parse_number(line_no, key, value)?
            }
            ("", _) => return Err(config_err(line_no, format!("key '{}' outside any section", key))),
            (s, k) => tracing::debug!("ignoring config key {}.{}", s, k),
        }
    }

    Ok(config)
}

// ─── TOML Format ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct TomlMachineSection {
    definitions_binary: Option<String>,
    longman_binary: Option<String>,
    constructions: Option<PathBuf>,
    #[serde(default)]
    plugins: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    machine: TomlMachineSection,
    /// Ordered table (`preserve_order`), so file order is load order.
    #[serde(default)]
    graphs: toml::Table,
    #[serde(default)]
    activation: ActivationParams,
}

pub fn parse_toml_config(content: &str) -> Result<MachineConfig> {
    let raw: TomlConfig = toml::from_str(content).map_err(|e| {
        let line = e
            .span()
            .map(|span| content[..span.start].lines().count().max(1))
            .unwrap_or(0);
        config_err(line, e.message().to_string())
    })?;

    let mut config = MachineConfig {
        constructions: raw.machine.constructions,
        activation: raw.activation,
        plugins: raw.machine.plugins,
        ..Default::default()
    };
    if let Some(path) = &raw.machine.definitions_binary {
        config.push_graph(FOURLANG_GRAPH, path);
    }
    if let Some(path) = &raw.machine.longman_binary {
        config.push_graph(LONGMAN_GRAPH, path);
    }
    for (name, value) in &raw.graphs {
        let path = value
            .as_str()
            .ok_or_else(|| config_err(0, format!("graph '{}' must be a path string", name)))?;
        config.push_graph(name, path);
    }
    Ok(config)
}

/// Load a config file, auto-detecting format by extension.
/// - `.toml` files → parse_toml_config()
/// - everything else → parse_ini_config()
pub fn load_config(path: impl AsRef<Path>) -> Result<MachineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let is_toml = path.extension().map_or(false, |ext| ext == "toml");
    let mut config = if is_toml {
        parse_toml_config(&content)?
    } else {
        parse_ini_config(&content)?
    };
    config.base_dir = path.parent().map(Path::to_path_buf);

    tracing::info!(
        "Loaded config {:?}: {} graph(s)",
        path,
        config.graphs.len()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INI: &str = "
# definition graphs
[machine]
definitions_binary = /data/4lang.bin.gz
longman_binary: /data/longman.bin.gz
plugins = weather, clock

[graphs]
extra = extra.bin

[activation]
threshold = 0.5
max_sequence_len = 2

[elvira]
whatever = 1
";

    #[test]
    fn ini_graphs_in_order() {
        let config = parse_ini_config(INI).unwrap();
        let names: Vec<&str> = config.graphs.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["4lang", "longman", "extra"]);
        assert_eq!(config.graphs[1].path, PathBuf::from("/data/longman.bin.gz"));
        assert_eq!(config.plugins, vec!["weather", "clock"]);
        assert_eq!(config.activation.threshold, 0.5);
        assert_eq!(config.activation.max_sequence_len, 2);
        assert_eq!(config.activation.max_iterations, 32);
    }

    #[test]
    fn ini_bad_number_reports_line() {
        let err = parse_ini_config("[activation]\nthreshold = lots\n").unwrap_err();
        assert!(matches!(err, DefgraphError::Config { line: 2, .. }));
    }

    #[test]
    fn ini_key_without_section() {
        assert!(parse_ini_config("definitions_binary = x\n").is_err());
    }

    #[test]
    fn toml_config() {
        let content = r#"
[machine]
definitions_binary = "4lang.bin"
constructions = "rules.tsv"

[graphs]
longman = "ldoce.bin"

[activation]
threshold = 0.75
"#;
        let config = parse_toml_config(content).unwrap();
        assert_eq!(config.graphs.len(), 2);
        assert_eq!(config.graphs[0].name, FOURLANG_GRAPH);
        assert_eq!(config.graphs[1].path, PathBuf::from("ldoce.bin"));
        assert_eq!(config.constructions, Some(PathBuf::from("rules.tsv")));
        assert_eq!(config.activation.threshold, 0.75);
        assert_eq!(config.activation.expand_depth, 3);
    }

    #[test]
    fn graphs_keep_file_order_in_both_formats() {
        let ini = parse_ini_config("[graphs]\nzeta = a.bin\nalpha = b.bin\n").unwrap();
        let toml = parse_toml_config("[graphs]\nzeta = \"a.bin\"\nalpha = \"b.bin\"\n").unwrap();
        for config in [&ini, &toml] {
            let names: Vec<&str> = config.graphs.iter().map(|g| g.name.as_str()).collect();
            assert_eq!(names, vec!["zeta", "alpha"]);
        }
        assert_eq!(ini.graphs, toml.graphs);
    }

    #[test]
    fn toml_graph_path_must_be_a_string() {
        assert!(parse_toml_config("[graphs]\nzeta = 3\n").is_err());
    }

    #[test]
    fn validate_requires_existing_graphs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("4lang.bin"), b"x").unwrap();
        let cfg_path = dir.path().join("machine.cfg");
        std::fs::write(
            &cfg_path,
            "[machine]\ndefinitions_binary = 4lang.bin\nlongman_binary = longman.bin\n",
        )
        .unwrap();

        let config = load_config(&cfg_path).unwrap();
        match config.validate() {
            Err(DefgraphError::MissingGraph { name, path }) => {
                assert_eq!(name, LONGMAN_GRAPH);
                assert_eq!(path, dir.path().join("longman.bin"));
            }
            other => panic!("expected MissingGraph, got {:?}", other),
        }

        std::fs::write(dir.path().join("longman.bin"), b"x").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_config() {
        assert!(MachineConfig::default().validate().is_err());
    }
}
