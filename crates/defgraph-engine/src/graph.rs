//! Flat edge view of a machine graph, for graphviz output.
//!
//! Edges are coloured by the partition they come from: `dog -> animal [0]`,
//! `HAS -> tail [1]`.

use std::collections::{BTreeMap, BTreeSet};

use defgraph_core::{MachineId, MachineStore, Result};

#[derive(Debug, Clone, Default)]
pub struct EdgeGraph {
    machines: BTreeSet<MachineId>,
    edges_by_color: BTreeMap<usize, BTreeSet<(MachineId, MachineId)>>,
}

impl EdgeGraph {
    /// Collect edges reachable from `roots`. `None` traverses everything.
    /// `Some(n)` stops below depth `n`, so `Some(0)` records only the roots'
    /// own edges; zero is a real limit here, not "unlimited".
    pub fn from_machines<I>(store: &MachineStore, roots: I, max_depth: Option<usize>) -> Result<Self>
    where
        I: IntoIterator<Item = MachineId>,
    {
        let mut graph = EdgeGraph::default();
        let mut seen = BTreeSet::new();
        for root in roots {
            graph.edges_recursively(store, root, max_depth, 0, &mut seen)?;
        }
        Ok(graph)
    }

    fn edges_recursively(
        &mut self,
        store: &MachineStore,
        machine: MachineId,
        max_depth: Option<usize>,
        depth: usize,
        seen: &mut BTreeSet<MachineId>,
    ) -> Result<()> {
        if seen.contains(&machine) || max_depth.map_or(false, |max| depth > max) {
            return Ok(());
        }
        tracing::debug!("getting edges for machine {}", machine);
        seen.insert(machine);
        self.machines.insert(machine);
        for (color, part) in store.get(machine)?.partitions().iter().enumerate() {
            for child in part {
                self.add_edge(machine, *child, color);
                self.edges_recursively(store, *child, max_depth, depth + 1, seen)?;
            }
        }
        Ok(())
    }

    fn add_edge(&mut self, from: MachineId, to: MachineId, color: usize) {
        self.machines.insert(from);
        self.machines.insert(to);
        self.edges_by_color.entry(color).or_default().insert((from, to));
    }

    pub fn machines(&self) -> &BTreeSet<MachineId> {
        &self.machines
    }

    pub fn edge_count(&self) -> usize {
        self.edges_by_color.values().map(BTreeSet::len).sum()
    }

    pub fn edges(&self, color: usize) -> impl Iterator<Item = &(MachineId, MachineId)> {
        self.edges_by_color.get(&color).into_iter().flatten()
    }

    pub fn to_dot(&self, store: &MachineStore) -> Result<String> {
        let mut lines = vec![
            "digraph finite_state_machine {".to_string(),
            "\tdpi=100;".to_string(),
        ];
        for machine in &self.machines {
            lines.push(format!(
                "\tnode [shape = circle]; {};",
                store.get(*machine)?.d_printname()
            ));
        }
        for (color, edges) in &self.edges_by_color {
            for (m1, m2) in edges {
                lines.push(format!(
                    "\t{} -> {} [ label = \"{}\" ];",
                    store.get(*m1)?.d_printname(),
                    store.get(*m2)?.d_printname(),
                    color
                ));
            }
        }
        lines.push("}".to_string());
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog_graph() -> (MachineStore, MachineId) {
        let mut store = MachineStore::new();
        let dog = store.create("dog", None, 1);
        let animal = store.create("animal", None, 1);
        let has = store.create("HAS", None, 2);
        let tail = store.create("tail", None, 1);
        store.append(dog, animal, 0).unwrap();
        store.append(dog, has, 0).unwrap();
        store.append(has, dog, 0).unwrap();
        store.append(has, tail, 1).unwrap();
        (store, dog)
    }

    #[test]
    fn collects_coloured_edges() {
        let (store, dog) = dog_graph();
        let graph = EdgeGraph::from_machines(&store, [dog], None).unwrap();
        assert_eq!(graph.machines().len(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.edges(1).count(), 1);
    }

    #[test]
    fn depth_limit_cuts_traversal() {
        let (store, dog) = dog_graph();
        let graph = EdgeGraph::from_machines(&store, [dog], Some(0)).unwrap();
        // dog's own edges are recorded, HAS is not traversed
        assert_eq!(graph.edge_count(), 2);
        assert!(!graph.machines().iter().any(|m| store.printname(*m).unwrap() == "tail"));
    }

    #[test]
    fn dot_output() {
        let (store, dog) = dog_graph();
        let dot = EdgeGraph::from_machines(&store, [dog], None)
            .unwrap()
            .to_dot(&store)
            .unwrap();
        assert!(dot.starts_with("digraph finite_state_machine {"));
        assert!(dot.contains("\tnode [shape = circle]; HAS;"));
        assert!(dot.contains("\tdog -> animal [ label = \"0\" ];"));
        assert!(dot.contains("\tHAS -> tail [ label = \"1\" ];"));
        assert!(dot.ends_with('}'));
    }
}
