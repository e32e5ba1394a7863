pub mod activation;
pub mod avm;
pub mod construction;
pub mod fsa;
pub mod graph;
pub mod lexicon;
pub mod matcher;
pub mod verb;

#[cfg(test)]
pub(crate) mod fixtures;

pub use activation::{ActivationReport, SpreadingActivation};
pub use construction::{
    rule_constructions, Avm, AvmConstruction, AvmSlot, Construction, ConstructionKind,
    RuleConstruction, VerbConstruction,
};
pub use fsa::Fsa;
pub use graph::EdgeGraph;
pub use lexicon::Lexicon;
pub use matcher::Matcher;

use defgraph_core::Result;
use defgraph_parser::MachineConfig;

/// Lexicon and rule constructions for `config`, ready for activation.
pub fn build_activation(config: &MachineConfig) -> Result<SpreadingActivation> {
    let lexicon = Lexicon::from_config(config)?;
    let constructions = match config.resolved_constructions() {
        Some(path) => rule_constructions(&defgraph_parser::load_constructions(path)?)?,
        None => Vec::new(),
    };
    Ok(SpreadingActivation::new(lexicon).with_constructions(constructions))
}
