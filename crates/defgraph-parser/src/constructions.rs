//! Construction rules file.
//!
//! One rule per line, three tab-separated columns:
//!
//! ```text
//! name<TAB>pattern pattern ...<TAB>command
//! adj_noun	ADJ NOUN	NOUN[ADJ]
//! det_noun	DET NOUN	NOUN
//! sentence	NOUN VERB NOUN	*
//! ```
//!
//! `A[B]` appends the machine matched by `B` to partition 0 of the machine
//! matched by `A`. A bare pattern keeps only the machine it matched. `*`
//! defers to the verb constructions.

use std::path::Path;

use defgraph_core::{DefgraphError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCommand {
    Append { into: String, what: String },
    Keep { stay: String },
    Verb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionRule {
    pub name: String,
    pub patterns: Vec<String>,
    pub command: RuleCommand,
}

fn rule_err(line: usize, message: impl Into<String>) -> DefgraphError {
    DefgraphError::ConstructionRule {
        line,
        message: message.into(),
    }
}

fn parse_command(line: usize, command: &str, patterns: &[String]) -> Result<RuleCommand> {
    if command == "*" {
        return Ok(RuleCommand::Verb);
    }

    if let Some(open) = command.find('[') {
        let close = command
            .rfind(']')
            .filter(|&c| c > open)
            .ok_or_else(|| rule_err(line, format!("unbalanced brackets in '{}'", command)))?;
        let into = command[..open].trim().to_string();
        let what = command[open + 1..close].trim().to_string();
        for p in [&into, &what] {
            if !patterns.contains(p) {
                return Err(rule_err(line, format!("'{}' is not one of the rule's patterns", p)));
            }
        }
        return Ok(RuleCommand::Append { into, what });
    }

    if patterns.iter().any(|p| p == command) {
        return Ok(RuleCommand::Keep {
            stay: command.to_string(),
        });
    }

    Err(rule_err(line, format!("unknown command '{}'", command)))
}

/// Parse a whole rules file. Empty lines and `#` comments are skipped.
pub fn parse_constructions(content: &str) -> Result<Vec<ConstructionRule>> {
    let mut rules = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cols.len() != 3 {
            return Err(rule_err(
                line_no,
                format!("expected 3 tab-separated columns, got {}", cols.len()),
            ));
        }

        let patterns: Vec<String> = cols[1].split_whitespace().map(str::to_string).collect();
        if patterns.is_empty() {
            return Err(rule_err(line_no, "rule has no patterns"));
        }
        let command = parse_command(line_no, cols[2], &patterns)?;

        rules.push(ConstructionRule {
            name: cols[0].to_string(),
            patterns,
            command,
        });
    }

    Ok(rules)
}

pub fn load_constructions(path: impl AsRef<Path>) -> Result<Vec<ConstructionRule>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let rules = parse_constructions(&content)?;
    tracing::info!("Loaded {} construction rule(s) from {:?}", rules.len(), path.as_ref());
    Ok(rules)
}
