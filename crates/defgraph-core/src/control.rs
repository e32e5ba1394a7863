//! Controls attached to machines.
//!
//! A control decides how a machine behaves during matching and activation.
//! `Pos` carries a KR/POS code such as `NOUN<CAS<ACC>>`, `Plugin` marks a
//! machine whose expansion produces a message for an external plugin.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PosControl {
    pub pos: String,
}

impl PosControl {
    pub fn new(pos: impl Into<String>) -> Self {
        Self { pos: pos.into() }
    }

    /// `NOUN<CAS<ACC>>` is a `NOUN`, and is a `NOUN<CAS<ACC>>`, but not a `VERB`.
    pub fn is_a(&self, other: &PosControl) -> bool {
        self.pos.starts_with(&other.pos)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginControl {
    pub plugin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Pos(PosControl),
    Plugin(PluginControl),
}

impl Control {
    pub fn pos(code: impl Into<String>) -> Self {
        Control::Pos(PosControl::new(code))
    }

    pub fn plugin(name: impl Into<String>) -> Self {
        Control::Plugin(PluginControl {
            plugin: name.into(),
        })
    }

    /// The KR/POS code, if this is a POS control.
    pub fn code(&self) -> Option<&str> {
        match self {
            Control::Pos(p) => Some(&p.pos),
            Control::Plugin(_) => None,
        }
    }

    pub fn is_a(&self, other: &PosControl) -> bool {
        match self {
            Control::Pos(p) => p.is_a(other),
            Control::Plugin(_) => false,
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Control::Pos(p) => write!(f, "pos:{}", p.pos),
            Control::Plugin(p) => write!(f, "plugin:{}", p.plugin),
        }
    }
}

/// Message emitted by an expanded machine with a plugin control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMessage {
    pub plugin: String,
    pub word: String,
    /// Printnames of the machine's children after expansion, by partition.
    pub arguments: Vec<Vec<String>>,
}
