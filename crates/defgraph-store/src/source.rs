//! Pluggable definition backend trait.
//!
//! Anything that can hand out definition machines by headword implements
//! `DefinitionSource`. Current implementation: `GraphFile`.

use defgraph_core::Machine;

pub trait DefinitionSource {
    /// Root machine of `word`'s definition, if the source defines it.
    fn lookup(&self, word: &str) -> Option<&Machine>;

    fn contains(&self, word: &str) -> bool {
        self.lookup(word).is_some()
    }

    /// Defined headwords, sorted.
    fn headwords(&self) -> Vec<&str>;

    /// Human-readable name of this source (for logging/reports).
    fn name(&self) -> &str;

    /// Number of defined headwords.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
