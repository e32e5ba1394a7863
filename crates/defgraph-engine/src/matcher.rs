//! Matchers decide whether a machine fits a slot of a construction.
//!
//! POS patterns are KR codes matched as a prefix of the machine's control
//! code. `@name` placeholders inside a pattern match one code segment and
//! report what they bound, so a construction can require that two machines
//! agree (e.g. `ADJ<NUM<@n>>` and `NOUN<NUM<@n>>`).

use defgraph_core::{Control, DefgraphError, MachineId, MachineStore, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub enum Matcher {
    Any,
    Pos {
        pattern: String,
        regex: Regex,
        /// Variable name for each capture group, in group order.
        variables: Vec<String>,
    },
    Printname { pattern: String, regex: Regex },
    /// Every inner matcher must match; bindings are concatenated.
    All(Vec<Matcher>),
}

fn compile(pattern: &str, source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| DefgraphError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

impl Matcher {
    pub fn pos(pattern: &str) -> Result<Self> {
        let mut source = String::from("^");
        let mut variables = Vec::new();
        let mut rest = pattern;
        while let Some(at) = rest.find('@') {
            source.push_str(&regex::escape(&rest[..at]));
            let after = &rest[at + 1..];
            let end = after
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if end == 0 {
                return Err(DefgraphError::InvalidPattern {
                    pattern: pattern.to_string(),
                    message: "'@' must be followed by a variable name".to_string(),
                });
            }
            source.push_str(&format!("(?P<v{}>[^<>]+)", variables.len()));
            variables.push(after[..end].to_string());
            rest = &after[end..];
        }
        source.push_str(&regex::escape(rest));

        Ok(Matcher::Pos {
            pattern: pattern.to_string(),
            regex: compile(pattern, &source)?,
            variables,
        })
    }

    /// Regular expression over the whole printname.
    pub fn printname(pattern: &str) -> Result<Self> {
        Ok(Matcher::Printname {
            pattern: pattern.to_string(),
            regex: compile(pattern, &format!("^(?:{})$", pattern))?,
        })
    }

    pub fn pattern(&self) -> String {
        match self {
            Matcher::Any => "*".to_string(),
            Matcher::Pos { pattern, .. } | Matcher::Printname { pattern, .. } => pattern.clone(),
            Matcher::All(inner) => inner
                .iter()
                .map(Matcher::pattern)
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    pub fn matches(&self, store: &MachineStore, id: MachineId) -> bool {
        self.bindings(store, id).is_some()
    }

    /// `Some(bindings)` if the machine matches, with one `(variable, value)`
    /// pair per placeholder in the pattern.
    pub fn bindings(&self, store: &MachineStore, id: MachineId) -> Option<Vec<(String, String)>> {
        let machine = store.get(id).ok()?;
        match self {
            Matcher::Any => Some(Vec::new()),
            Matcher::All(inner) => {
                let mut all = Vec::new();
                for m in inner {
                    all.extend(m.bindings(store, id)?);
                }
                Some(all)
            }
            Matcher::Printname { regex, .. } => {
                regex.is_match(machine.printname()).then(Vec::new)
            }
            Matcher::Pos {
                regex, variables, ..
            } => {
                let code = match machine.control() {
                    Some(Control::Pos(p)) => p.pos.as_str(),
                    _ => return None,
                };
                let caps = regex.captures(code)?;
                Some(
                    variables
                        .iter()
                        .enumerate()
                        .filter_map(|(i, var)| {
                            caps.name(&format!("v{}", i))
                                .map(|m| (var.clone(), m.as_str().to_string()))
                        })
                        .collect(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(code: &str) -> (MachineStore, MachineId) {
        let mut store = MachineStore::new();
        let id = store.create("kutya", Some(Control::pos(code)), 1);
        (store, id)
    }

    #[test]
    fn pos_is_prefix_match() {
        let (store, id) = store_with("NOUN<CAS<ACC>>");
        assert!(Matcher::pos("NOUN").unwrap().matches(&store, id));
        assert!(Matcher::pos("NOUN<CAS<ACC>>").unwrap().matches(&store, id));
        assert!(!Matcher::pos("NOUN<CAS<NOM>>").unwrap().matches(&store, id));
        assert!(!Matcher::pos("VERB").unwrap().matches(&store, id));
    }

    #[test]
    fn pos_variables_bind() {
        let (store, id) = store_with("NOUN<NUM<PLUR>><CAS<ACC>>");
        let m = Matcher::pos("NOUN<NUM<@n>>").unwrap();
        assert_eq!(
            m.bindings(&store, id),
            Some(vec![("n".to_string(), "PLUR".to_string())])
        );
    }

    #[test]
    fn pos_needs_pos_control() {
        let mut store = MachineStore::new();
        let bare = store.create("x", None, 1);
        let plugin = store.create("y", Some(Control::plugin("p")), 1);
        let m = Matcher::pos("").unwrap();
        assert!(!m.matches(&store, bare));
        assert!(!m.matches(&store, plugin));
        assert!(Matcher::Any.matches(&store, bare));
    }

    #[test]
    fn printname_is_anchored() {
        let (store, id) = store_with("NOUN");
        assert!(Matcher::printname("kut.a").unwrap().matches(&store, id));
        assert!(!Matcher::printname("kut").unwrap().matches(&store, id));
        assert!(Matcher::printname("(").is_err());
    }

    #[test]
    fn all_requires_every_matcher() {
        let (store, id) = store_with("VERB");
        let both = Matcher::All(vec![
            Matcher::printname("kutya").unwrap(),
            Matcher::pos("VERB").unwrap(),
        ]);
        assert!(both.matches(&store, id));
        assert_eq!(both.pattern(), "kutya&VERB");
        let wrong = Matcher::All(vec![Matcher::printname("macska").unwrap(), Matcher::Any]);
        assert!(!wrong.matches(&store, id));
    }

    #[test]
    fn dangling_at_is_rejected() {
        assert!(Matcher::pos("NOUN<@>").is_err());
    }
}
