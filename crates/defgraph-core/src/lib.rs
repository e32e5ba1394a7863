pub mod control;
pub mod error;
pub mod machine;

pub use control::{Control, PluginControl, PluginMessage, PosControl};
pub use error::{DefgraphError, Result};
pub use machine::{Machine, MachineId, MachineStore};

// ─── Printname Prefixes ──────────────────────────────────────────

/// Deep cases (`=AGT`, `=PAT`, ...) mark argument slots in definitions.
pub const DEEP_PRE: char = '=';
/// Attribute-value matrices.
pub const AVM_PRE: char = '#';
/// Encyclopedic entries / named entities.
pub const ENC_PRE: char = '@';
/// Supplementary matchers referenced from verb definitions.
pub const SUPP_PRE: char = '$';

/// Grammatical case expected for a deep case. Unknown deep cases fall back to `NOM`.
pub fn deep_case_to_grammatical_case(deep_case: &str) -> &'static str {
    match deep_case.trim_start_matches(DEEP_PRE) {
        "AGT" => "NOM",
        "PAT" => "ACC",
        "DAT" => "DAT",
        "INS" => "INS",
        "LOC" => "INE",
        _ => "NOM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_case_mapping() {
        assert_eq!(deep_case_to_grammatical_case("=AGT"), "NOM");
        assert_eq!(deep_case_to_grammatical_case("=PAT"), "ACC");
        assert_eq!(deep_case_to_grammatical_case("=LOC"), "INE");
        assert_eq!(deep_case_to_grammatical_case("=FOO"), "NOM");
    }
}
