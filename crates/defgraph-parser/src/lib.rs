pub mod config;
pub mod constructions;

pub use config::{load_config, parse_ini_config, parse_toml_config, ActivationParams, GraphRef, MachineConfig};
pub use constructions::{load_constructions, parse_constructions, ConstructionRule, RuleCommand};

/// A sentence token, written `stem/POS` (the POS part is optional).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub stem: String,
    pub pos: Option<String>,
}

/// Split `dog/NOUN<CAS<ACC>>` into stem and KR/POS code.
pub fn parse_token(raw: &str) -> Option<Token> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (stem, pos) = match raw.split_once('/') {
        Some((s, p)) => (s, Some(p.trim()).filter(|p| !p.is_empty())),
        None => (raw, None),
    };
    if stem.is_empty() {
        return None;
    }
    Some(Token {
        stem: stem.to_lowercase(),
        pos: pos.map(str::to_string),
    })
}

/// Tokenize a whitespace-separated analysed sentence.
pub fn tokenize(text: &str) -> Vec<Token> {
    text.split_whitespace().filter_map(parse_token).collect()
}
