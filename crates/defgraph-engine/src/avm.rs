//! Attribute-value matrices and the construction that fills them.
//!
//! An AVM is mirrored in the graph by a `#name` machine with one partition
//! per slot, holding that slot's current value.

use defgraph_core::{MachineId, Result, AVM_PRE};

use crate::construction::{linear_fsa, Construction, ConstructionKind};
use crate::fsa::Fsa;
use crate::lexicon::Lexicon;
use crate::matcher::Matcher;

#[derive(Debug, Clone)]
pub struct AvmSlot {
    pub key: String,
    pub matcher: Matcher,
    pub required: bool,
    pub default: Option<MachineId>,
    value: Option<MachineId>,
}

impl AvmSlot {
    pub fn value(&self) -> Option<MachineId> {
        self.value
    }
}

#[derive(Debug, Clone)]
pub struct Avm {
    name: String,
    slots: Vec<AvmSlot>,
}

impl Avm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
        }
    }

    /// Add a slot; it starts out holding its default.
    pub fn with_slot(
        mut self,
        key: impl Into<String>,
        matcher: Matcher,
        required: bool,
        default: Option<MachineId>,
    ) -> Self {
        self.slots.push(AvmSlot {
            key: key.into(),
            matcher,
            required,
            default,
            value: default,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[AvmSlot] {
        &self.slots
    }

    pub fn get(&self, key: &str) -> Option<MachineId> {
        self.slots.iter().find(|s| s.key == key).and_then(|s| s.value)
    }

    /// All required slots have a value.
    pub fn is_satisfied(&self) -> bool {
        self.slots.iter().all(|s| !s.required || s.value.is_some())
    }
}

pub struct AvmConstruction {
    name: String,
    avm: Avm,
    fsa: Fsa,
    machine: MachineId,
}

impl AvmConstruction {
    /// Creates the `#name` machine for `avm` in the lexicon's store.
    pub fn new(avm: Avm, lexicon: &mut Lexicon) -> Result<Self> {
        let store = lexicon.store_mut();
        let machine = store.create(format!("{}{}", AVM_PRE, avm.name), None, avm.slots.len());
        // one path per slot, each a single step to its own final state
        let mut fsa = Fsa::new();
        let init = fsa.add_state("0", true, false);
        for (i, slot) in avm.slots.iter().enumerate() {
            let s = fsa.add_state((i + 1).to_string(), false, true);
            fsa.add_transition(slot.matcher.clone(), init, s);
        }
        if avm.slots.is_empty() {
            fsa = linear_fsa(&[]);
        }

        let c = Self {
            name: format!("{}Construction", avm.name),
            avm,
            fsa,
            machine,
        };
        c.sync(lexicon)?;
        Ok(c)
    }

    pub fn avm(&self) -> &Avm {
        &self.avm
    }

    pub fn machine(&self) -> MachineId {
        self.machine
    }

    pub fn fsa(&self) -> &Fsa {
        &self.fsa
    }

    /// Make the AVM machine's partitions reflect the slot values.
    fn sync(&self, lexicon: &mut Lexicon) -> Result<()> {
        let store = lexicon.store_mut();
        for (i, slot) in self.avm.slots.iter().enumerate() {
            let current = store
                .get(self.machine)?
                .partitions()
                .get(i)
                .cloned()
                .unwrap_or_default();
            store.remove_all(self.machine, current, Some(i))?;
            if let Some(value) = slot.value {
                store.append(self.machine, value, i)?;
            }
        }
        Ok(())
    }
}

impl Construction for AvmConstruction {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstructionKind {
        ConstructionKind::Avm
    }

    /// Any sequence may feed an AVM; `act` picks out what fits.
    fn check(&self, _lexicon: &Lexicon, _seq: &[MachineId]) -> bool {
        true
    }

    /// Slots take machines their matcher accepts. A slot holding a machine
    /// that no longer matches falls back to its default. The sequence is
    /// replaced by the AVM machine.
    fn act(&mut self, lexicon: &mut Lexicon, seq: &[MachineId]) -> Result<Option<Vec<MachineId>>> {
        for machine in seq {
            for slot in &mut self.avm.slots {
                if slot.matcher.matches(lexicon.store(), *machine) {
                    slot.value = Some(*machine);
                } else if slot.value == Some(*machine) {
                    slot.value = slot.default;
                }
            }
        }
        self.sync(lexicon)?;
        tracing::debug!("{} filled: {:?}", self.name, self.avm.slots.iter().map(|s| s.value).collect::<Vec<_>>());
        Ok(Some(vec![self.machine]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_lexicon;
    use defgraph_core::Control;

    fn weather_avm(lexicon: &mut Lexicon) -> (AvmConstruction, MachineId) {
        let here = lexicon.activate_word("here", Some(Control::pos("ADV")));
        let avm = Avm::new("weather")
            .with_slot("location", Matcher::pos("NOUN<CAS<INE>>").unwrap(), false, Some(here))
            .with_slot("time", Matcher::pos("ADV<TIME>").unwrap(), true, None);
        (AvmConstruction::new(avm, lexicon).unwrap(), here)
    }

    #[test]
    fn creates_avm_machine_with_defaults() {
        let mut lexicon = sample_lexicon(1.0);
        let (c, here) = weather_avm(&mut lexicon);
        let m = lexicon.store().get(c.machine()).unwrap();
        assert_eq!(m.printname(), "#weather");
        assert!(m.avm());
        assert_eq!(m.partitions()[0], vec![here]);
        assert!(m.partitions()[1].is_empty());
        assert_eq!(c.name(), "weatherConstruction");
        assert!(!c.avm().is_satisfied());
    }

    #[test]
    fn act_fills_matching_slots() {
        let mut lexicon = sample_lexicon(1.0);
        let (mut c, _) = weather_avm(&mut lexicon);
        let city = lexicon.activate_word("budapest", Some(Control::pos("NOUN<CAS<INE>>")));
        let today = lexicon.activate_word("today", Some(Control::pos("ADV<TIME>")));

        assert!(c.check(&lexicon, &[city, today]));
        assert_eq!(c.act(&mut lexicon, &[city, today]).unwrap(), Some(vec![c.machine()]));
        assert_eq!(c.avm().get("location"), Some(city));
        assert_eq!(c.avm().get("time"), Some(today));
        assert!(c.avm().is_satisfied());
        assert_eq!(lexicon.store().get(c.machine()).unwrap().partitions()[1], vec![today]);
    }

    #[test]
    fn slot_resets_to_default_when_value_stops_matching() {
        let mut lexicon = sample_lexicon(1.0);
        let (mut c, here) = weather_avm(&mut lexicon);
        let city = lexicon.activate_word("budapest", Some(Control::pos("NOUN<CAS<INE>>")));
        c.act(&mut lexicon, &[city]).unwrap();
        assert_eq!(c.avm().get("location"), Some(city));

        lexicon.store_mut().set_control(city, Some(Control::pos("NOUN<CAS<NOM>>"))).unwrap();
        c.act(&mut lexicon, &[city]).unwrap();
        assert_eq!(c.avm().get("location"), Some(here));
        assert_eq!(lexicon.store().get(c.machine()).unwrap().partitions()[0], vec![here]);
    }

    #[test]
    fn fsa_has_one_path_per_slot() {
        let mut lexicon = sample_lexicon(1.0);
        let (c, _) = weather_avm(&mut lexicon);
        let city = lexicon.activate_word("budapest", Some(Control::pos("NOUN<CAS<INE>>")));
        assert_eq!(c.fsa().transitions().len(), 2);
        assert!(c.fsa().accepts(lexicon.store(), &[city]));
    }
}
