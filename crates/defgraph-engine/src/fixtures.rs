//! Small hand-built lexicon shared by the engine tests.

use defgraph_core::{Control, MachineId};
use defgraph_parser::ActivationParams;

use crate::lexicon::Lexicon;

/// Define `word` as a root whose partition 0 holds one plain machine per entry of `words`.
pub(crate) fn define(lexicon: &mut Lexicon, word: &str, pos: Option<&str>, words: &[&str]) -> MachineId {
    let store = lexicon.store_mut();
    let root = store.create(word, pos.map(Control::pos), 1);
    for w in words {
        let child = store.create(*w, None, 1);
        store.append(root, child, 0).unwrap();
    }
    lexicon.add_definition(word, root);
    root
}

/// Add `rel(left, right)` to partition 0 of `owner`.
pub(crate) fn relate(lexicon: &mut Lexicon, owner: MachineId, rel: &str, left: MachineId, right: &str) {
    let store = lexicon.store_mut();
    let r = store.create(rel, None, 2);
    let right = store.create(right, None, 1);
    store.append(r, left, 0).unwrap();
    store.append(r, right, 1).unwrap();
    store.append(owner, r, 0).unwrap();
}

/// Put a deep case machine into `partition` of `owner`.
pub(crate) fn slot(lexicon: &mut Lexicon, owner: MachineId, deep_case: &str, partition: usize) {
    let store = lexicon.store_mut();
    let case = store.create(deep_case, None, 1);
    store.append(owner, case, partition).unwrap();
}

/// dog, cat: animal, HAS tail / animal: living / tail: part /
/// see: perceive, =AGT, =PAT / bark: sound, =AGT / weather: rain
pub(crate) fn sample_lexicon(threshold: f64) -> Lexicon {
    let mut lexicon = Lexicon::new(ActivationParams {
        threshold,
        ..Default::default()
    });

    let dog = define(&mut lexicon, "dog", Some("NOUN"), &["animal"]);
    relate(&mut lexicon, dog, "HAS", dog, "tail");
    let cat = define(&mut lexicon, "cat", Some("NOUN"), &["animal"]);
    relate(&mut lexicon, cat, "HAS", cat, "tail");
    define(&mut lexicon, "animal", Some("NOUN"), &["living"]);
    define(&mut lexicon, "tail", Some("NOUN"), &["part"]);

    let see = define(&mut lexicon, "see", Some("VERB"), &["perceive"]);
    slot(&mut lexicon, see, "=AGT", 1);
    slot(&mut lexicon, see, "=PAT", 2);
    let bark = define(&mut lexicon, "bark", Some("VERB"), &["sound"]);
    slot(&mut lexicon, bark, "=AGT", 1);

    define(&mut lexicon, "weather", None, &["rain"]);
    lexicon
}
