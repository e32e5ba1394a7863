//! The machine arena.
//!
//! Machines form a cyclic graph: every machine has ordered partitions of
//! children and knows which `(parent, partition)` slots refer to it. The
//! arena owns all of them; callers hold `MachineId`s.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::control::Control;
use crate::error::{DefgraphError, Result};
use crate::{AVM_PRE, DEEP_PRE, ENC_PRE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MachineId(pub u32);

impl MachineId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    printname: String,
    control: Option<Control>,
    partitions: Vec<Vec<MachineId>>,
    /// Rebuilt from `partitions` whenever a store is reassembled.
    #[serde(skip)]
    parents: BTreeSet<(MachineId, usize)>,
}

impl Machine {
    /// Detached machine. Parent links are filled in by `MachineStore::from_machines`.
    pub fn new(
        printname: impl Into<String>,
        control: Option<Control>,
        partitions: Vec<Vec<MachineId>>,
    ) -> Self {
        Self {
            printname: printname.into(),
            control,
            partitions,
            parents: BTreeSet::new(),
        }
    }

    pub fn printname(&self) -> &str {
        &self.printname
    }

    pub fn control(&self) -> Option<&Control> {
        self.control.as_ref()
    }

    pub fn partitions(&self) -> &[Vec<MachineId>] {
        &self.partitions
    }

    pub fn parents(&self) -> &BTreeSet<(MachineId, usize)> {
        &self.parents
    }

    pub fn unary(&self) -> bool {
        self.partitions.len() == 1
    }

    pub fn binary(&self) -> bool {
        self.partitions.len() >= 2
    }

    pub fn deep_case(&self) -> bool {
        self.printname.starts_with(DEEP_PRE)
    }

    pub fn named_entity(&self) -> bool {
        self.printname.starts_with(ENC_PRE)
    }

    pub fn avm(&self) -> bool {
        self.printname.starts_with(AVM_PRE)
    }

    pub fn fancy(&self) -> bool {
        self.deep_case() || self.avm() || self.named_entity()
    }

    /// Printname usable as a graphviz identifier.
    pub fn d_printname(&self) -> String {
        let mut pn: String = self
            .printname
            .split('/')
            .next()
            .unwrap_or_default()
            .chars()
            .map(|c| if matches!(c, '=' | '@' | '-' | ',') { '_' } else { c })
            .collect();
        if pn == "edge" {
            pn.push('_');
        } else if pn == "$" {
            pn = "_dollars".to_string();
        }
        pn
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.control {
            None => write!(f, "{} (no control)", self.printname),
            Some(c) => write!(f, "{} ({})", self.printname, c),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MachineStore {
    machines: Vec<Machine>,
}

impl MachineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reassemble a store from serialized machines, rebuilding parent links.
    pub fn from_machines(mut machines: Vec<Machine>) -> Result<Self> {
        let len = machines.len();
        let mut links: Vec<(usize, (MachineId, usize))> = Vec::new();
        for (i, m) in machines.iter().enumerate() {
            for (part_i, part) in m.partitions.iter().enumerate() {
                for child in part {
                    if child.index() >= len {
                        return Err(DefgraphError::UnknownMachine(*child));
                    }
                    links.push((child.index(), (MachineId(i as u32), part_i)));
                }
            }
        }
        for m in &mut machines {
            m.parents.clear();
        }
        for (child, link) in links {
            machines[child].parents.insert(link);
        }
        Ok(Self { machines })
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Moves every machine of `other` into this store and returns the id
    /// offset that was added to `other`'s ids.
    pub fn merge(&mut self, other: MachineStore) -> u32 {
        let offset = self.machines.len() as u32;
        let shift = |id: MachineId| MachineId(id.0 + offset);
        for mut m in other.machines {
            for part in &mut m.partitions {
                for child in part.iter_mut() {
                    *child = shift(*child);
                }
            }
            m.parents = m.parents.into_iter().map(|(p, i)| (shift(p), i)).collect();
            self.machines.push(m);
        }
        offset
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn ids(&self) -> impl Iterator<Item = MachineId> + '_ {
        (0..self.machines.len()).map(|i| MachineId(i as u32))
    }

    pub fn get(&self, id: MachineId) -> Result<&Machine> {
        self.machines
            .get(id.index())
            .ok_or(DefgraphError::UnknownMachine(id))
    }

    fn get_mut(&mut self, id: MachineId) -> Result<&mut Machine> {
        self.machines
            .get_mut(id.index())
            .ok_or(DefgraphError::UnknownMachine(id))
    }

    pub fn printname(&self, id: MachineId) -> Result<&str> {
        Ok(self.get(id)?.printname())
    }

    pub fn create(
        &mut self,
        name: impl Into<String>,
        control: Option<Control>,
        part_num: usize,
    ) -> MachineId {
        let id = MachineId(self.machines.len() as u32);
        let machine = Machine {
            printname: name.into(),
            control,
            partitions: vec![Vec::new(); part_num.max(1)],
            parents: BTreeSet::new(),
        };
        tracing::debug!(
            "{} created with {} partitions",
            machine.printname,
            machine.partitions.len()
        );
        self.machines.push(machine);
        id
    }

    pub fn set_control(&mut self, id: MachineId, control: Option<Control>) -> Result<()> {
        self.get_mut(id)?.control = control;
        Ok(())
    }

    /// Adds `child` to `parent`'s partition, growing the partition list if
    /// needed. Appending a machine already in the partition does nothing.
    pub fn append(&mut self, parent: MachineId, child: MachineId, partition: usize) -> Result<()> {
        self.get(child)?;
        let p = self.get_mut(parent)?;
        if p.partitions.len() <= partition {
            p.partitions.resize(partition + 1, Vec::new());
        } else if p.partitions[partition].contains(&child) {
            return Ok(());
        }
        p.partitions[partition].push(child);
        self.get_mut(child)?.parents.insert((parent, partition));
        Ok(())
    }

    pub fn append_all<I>(&mut self, parent: MachineId, children: I, partition: usize) -> Result<()>
    where
        I: IntoIterator<Item = MachineId>,
    {
        for child in children {
            self.append(parent, child, partition)?;
        }
        Ok(())
    }

    /// Removes `child` from one partition, or from every partition holding it
    /// when `partition` is `None`.
    pub fn remove(
        &mut self,
        parent: MachineId,
        child: MachineId,
        partition: Option<usize>,
    ) -> Result<()> {
        self.get(child)?;
        let p = self.get_mut(parent)?;
        let targets: Vec<usize> = match partition {
            Some(i) if i >= p.partitions.len() => {
                return Err(DefgraphError::InvalidPartition {
                    machine: parent,
                    partition: i,
                })
            }
            Some(i) => vec![i],
            None => (0..p.partitions.len()).collect(),
        };
        let mut removed = Vec::new();
        for i in targets {
            let before = p.partitions[i].len();
            p.partitions[i].retain(|m| *m != child);
            if p.partitions[i].len() != before {
                removed.push(i);
            }
        }
        let c = self.get_mut(child)?;
        for i in removed {
            c.parents.remove(&(parent, i));
        }
        Ok(())
    }

    pub fn remove_all<I>(
        &mut self,
        parent: MachineId,
        children: I,
        partition: Option<usize>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = MachineId>,
    {
        for child in children {
            self.remove(parent, child, partition)?;
        }
        Ok(())
    }

    /// Merges `b` into `a`: `a` gains every child of `b`, and every slot that
    /// referred to `b` now refers to `a`.
    pub fn unify(&mut self, a: MachineId, b: MachineId) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let b_machine = self.get(b)?.clone();
        self.get(a)?;
        for (i, part) in b_machine.partitions.iter().enumerate() {
            for m in part {
                self.append(a, *m, i)?;
            }
        }
        for (parent, i) in b_machine.parents {
            self.remove(parent, b, Some(i))?;
            self.append(parent, a, i)?;
        }
        Ok(())
    }

    pub fn children(&self, id: MachineId) -> Result<BTreeSet<MachineId>> {
        Ok(self.get(id)?.partitions.iter().flatten().copied().collect())
    }

    /// Every machine reachable from `id`, including `id` itself.
    pub fn unique_machines_in_tree(&self, id: MachineId) -> Result<BTreeSet<MachineId>> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(m) = stack.pop() {
            if !visited.insert(m) {
                continue;
            }
            for child in self.get(m)?.partitions.iter().flatten() {
                if !visited.contains(child) {
                    stack.push(*child);
                }
            }
        }
        Ok(visited)
    }

    pub fn all_names(&self, id: MachineId) -> Result<BTreeSet<String>> {
        self.unique_machines_in_tree(id)?
            .into_iter()
            .map(|m| Ok(self.get(m)?.to_string()))
            .collect()
    }

    /// Copies the subgraph reachable from `id`. Shared children and cycles
    /// are preserved in the copy.
    pub fn deep_copy(&mut self, id: MachineId) -> Result<MachineId> {
        let reachable = self.unique_machines_in_tree(id)?;
        let mut memo: HashMap<MachineId, MachineId> = HashMap::with_capacity(reachable.len());
        for old in &reachable {
            let m = self.get(*old)?;
            let (name, control, parts) = (m.printname.clone(), m.control.clone(), m.partitions.len());
            let new = self.create(name, control, parts);
            memo.insert(*old, new);
        }
        for old in &reachable {
            let partitions = self.get(*old)?.partitions.clone();
            for (i, part) in partitions.iter().enumerate() {
                for child in part {
                    self.append(memo[old], memo[child], i)?;
                }
            }
        }
        Ok(memo[&id])
    }

    /// Partitions of `id` holding a child called `name`, with that child.
    pub fn find(&self, id: MachineId, name: &str) -> Result<Vec<(usize, MachineId)>> {
        let mut found = Vec::new();
        for (i, part) in self.get(id)?.partitions.iter().enumerate() {
            for child in part {
                if self.get(*child)?.printname == name {
                    found.push((i, *child));
                }
            }
        }
        Ok(found)
    }

    pub fn display(&self, id: MachineId) -> Result<String> {
        Ok(self.get(id)?.to_string())
    }

    /// Multi-line dump of the tree under `id` with ids and parent links.
    pub fn to_debug_str(
        &self,
        id: MachineId,
        max_depth: usize,
        parents_to_display: usize,
    ) -> Result<String> {
        let mut lines = Vec::new();
        let mut stop = BTreeSet::new();
        self.debug_lines(id, 0, max_depth, parents_to_display, &mut lines, &mut stop, "")?;
        Ok(lines.join("\n"))
    }

    #[allow(clippy::too_many_arguments)]
    fn debug_lines(
        &self,
        id: MachineId,
        depth: usize,
        max_depth: usize,
        parents_to_display: usize,
        lines: &mut Vec<String>,
        stop: &mut BTreeSet<MachineId>,
        at_partition: &str,
    ) -> Result<()> {
        let m = self.get(id)?;
        let cut = (depth != 0 && stop.contains(&id)) || depth == max_depth;
        let parents = if cut {
            "...".to_string()
        } else {
            let mut shown = Vec::new();
            for (p, i) in &m.parents {
                shown.push(format!("{}:{}:{}", self.get(*p)?.printname, p, i));
            }
            let mut s = shown
                .iter()
                .take(parents_to_display)
                .cloned()
                .collect::<Vec<_>>()
                .join(",");
            if shown.len() > parents_to_display {
                s.push_str(", ..");
            }
            s
        };
        lines.push(format!(
            "{}{}:{}:{} p[{}]",
            " ".repeat(2 * depth),
            at_partition,
            m.printname,
            id,
            parents
        ));
        if !cut {
            stop.insert(id);
            for (part_i, part) in m.partitions.iter().enumerate() {
                let label = part_i.to_string();
                for child in part {
                    self.debug_lines(
                        *child,
                        depth + 1,
                        max_depth,
                        parents_to_display,
                        lines,
                        stop,
                        &label,
                    )?;
                }
            }
        }
        Ok(())
    }
}
