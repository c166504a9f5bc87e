//! Reference graph backend.
//!
//! A small labelled graph with per-element valence limits. It implements the
//! full [`MolGraph`] capability so the engine, the CLI and the tests can run
//! without an external chemistry toolkit. It knows nothing about aromaticity,
//! charges or hydrogens.
//!
//! Exchange format: atoms separated by `.`, then `|`, then bonds as
//! `i-j:order` separated by `,`. A trailing `!` marks a protected atom or a
//! grouped bond, e.g. `C.C.O!|0-1:1,1-2:2`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rand::Rng;
use rand::seq::SliceRandom;

use super::graph::{
    AtomClass, AtomRef, BondClass, BondRef, Edit, EditError, ExchangeError, MolGraph,
    RecombineError, Site, ValidationError,
};

/// Supported elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Element {
    C,
    N,
    O,
    S,
    F,
}

impl Element {
    pub const ALL: [Element; 5] = [Element::C, Element::N, Element::O, Element::S, Element::F];

    pub fn valence(self) -> u32 {
        match self {
            Element::C => 4,
            Element::N => 3,
            Element::O | Element::S => 2,
            Element::F => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
            Element::S => "S",
            Element::F => "F",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.symbol() == symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub element: Element,
    /// Protected atoms are never edited or used as attachment points.
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bond {
    pub a: usize,
    pub b: usize,
    /// 1, 2 or 3.
    pub order: u32,
    /// Grouped bonds belong to a protected group.
    pub grouped: bool,
}

/// Labelled molecular graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabeledGraph {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl LabeledGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, element: Element) -> usize {
        self.atoms.push(Atom {
            element,
            protected: false,
        });
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, a: usize, b: usize, order: u32) -> usize {
        self.bonds.push(Bond {
            a,
            b,
            order,
            grouped: false,
        });
        self.bonds.len() - 1
    }

    pub fn protect_atom(&mut self, atom: usize) {
        if let Some(a) = self.atoms.get_mut(atom) {
            a.protected = true;
        }
    }

    pub fn group_bond(&mut self, bond: usize) {
        if let Some(b) = self.bonds.get_mut(bond) {
            b.grouped = true;
        }
    }

    pub fn atom(&self, atom: AtomRef) -> Option<&Atom> {
        self.atoms.get(atom.0)
    }

    pub fn bond(&self, bond: BondRef) -> Option<&Bond> {
        self.bonds.get(bond.0)
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Linear chain of single bonds.
    pub fn chain(elements: &[Element]) -> Self {
        let mut graph = Self::new();
        for (i, &element) in elements.iter().enumerate() {
            graph.add_atom(element);
            if i > 0 {
                graph.add_bond(i - 1, i, 1);
            }
        }
        graph
    }

    /// Ring of `n` carbons with the given bond orders repeated around it.
    pub fn carbon_ring(n: usize, orders: &[u32]) -> Self {
        let mut graph = Self::new();
        for _ in 0..n {
            graph.add_atom(Element::C);
        }
        for i in 0..n {
            let order = orders.get(i % orders.len().max(1)).copied().unwrap_or(1);
            graph.add_bond(i, (i + 1) % n, order);
        }
        graph
    }

    pub fn cyclohexane() -> Self {
        Self::carbon_ring(6, &[1])
    }

    /// Kekulé benzene.
    pub fn benzene() -> Self {
        Self::carbon_ring(6, &[1, 2])
    }

    fn used_valence(&self, atom: usize) -> u32 {
        self.bonds
            .iter()
            .filter(|b| b.a == atom || b.b == atom)
            .map(|b| b.order)
            .sum()
    }

    fn free_valence(&self, atom: usize) -> u32 {
        self.atoms[atom]
            .element
            .valence()
            .saturating_sub(self.used_valence(atom))
    }

    fn degree(&self, atom: usize) -> usize {
        self.bonds
            .iter()
            .filter(|b| b.a == atom || b.b == atom)
            .count()
    }

    fn bonded(&self, a: usize, b: usize) -> bool {
        self.bonds
            .iter()
            .any(|bond| (bond.a == a && bond.b == b) || (bond.a == b && bond.b == a))
    }

    /// Neighbour lists as `(atom, bond index)`.
    fn adjacency(&self) -> Vec<Vec<(usize, usize)>> {
        let mut adj = vec![Vec::new(); self.atoms.len()];
        for (i, bond) in self.bonds.iter().enumerate() {
            if bond.a < self.atoms.len() && bond.b < self.atoms.len() {
                adj[bond.a].push((bond.b, i));
                adj[bond.b].push((bond.a, i));
            }
        }
        adj
    }

    /// Atoms reachable from `root` without crossing `skip_bond`.
    fn reachable(&self, root: usize, skip_bond: Option<usize>) -> Vec<bool> {
        let adj = self.adjacency();
        let mut seen = vec![false; self.atoms.len()];
        let mut queue = VecDeque::from([root]);
        seen[root] = true;
        while let Some(atom) = queue.pop_front() {
            for &(next, bond) in &adj[atom] {
                if Some(bond) != skip_bond && !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    fn fragment_count(&self) -> usize {
        let mut seen = vec![false; self.atoms.len()];
        let mut count = 0;
        for start in 0..self.atoms.len() {
            if seen[start] {
                continue;
            }
            count += 1;
            for (i, reached) in self.reachable(start, None).into_iter().enumerate() {
                seen[i] |= reached;
            }
        }
        count
    }

    /// Copy of the atoms marked in `keep`, with the bonds between them.
    /// Returns the graph and the old-to-new index map.
    fn subgraph(&self, keep: &[bool]) -> (Self, Vec<Option<usize>>) {
        let mut map = vec![None; self.atoms.len()];
        let mut graph = Self::new();
        for (i, atom) in self.atoms.iter().enumerate() {
            if keep[i] {
                map[i] = Some(graph.atoms.len());
                graph.atoms.push(atom.clone());
            }
        }
        for bond in &self.bonds {
            if let (Some(a), Some(b)) = (map[bond.a], map[bond.b]) {
                graph.bonds.push(Bond { a, b, ..*bond });
            }
        }
        (graph, map)
    }

    /// Ungrouped bonds outside every ring.
    fn cut_bonds(&self) -> Vec<usize> {
        let ring_bonds: BTreeSet<BondRef> = self.ring_bond_sets().into_iter().flatten().collect();
        self.bonds
            .iter()
            .enumerate()
            .filter(|(i, b)| !b.grouped && !ring_bonds.contains(&BondRef(*i)))
            .map(|(i, _)| i)
            .collect()
    }

    /// Cut a random non-ring bond and keep one side. Returns the fragment and
    /// the index of the atom that lost the bond.
    fn fragment<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Self, usize), RecombineError> {
        let bond = *self
            .cut_bonds()
            .choose(rng)
            .ok_or(RecombineError::NoCutPoint)?;
        let root = if rng.gen_bool(0.5) {
            self.bonds[bond].a
        } else {
            self.bonds[bond].b
        };
        let keep = self.reachable(root, Some(bond));
        let (graph, map) = self.subgraph(&keep);
        let root = map[root].ok_or(RecombineError::NoCutPoint)?;
        Ok((graph, root))
    }

    fn check_atom(&self, atom: AtomRef) -> Result<usize, EditError> {
        if atom.0 < self.atoms.len() {
            Ok(atom.0)
        } else {
            Err(EditError::OutOfRange(atom.0))
        }
    }

    fn check_bond(&self, bond: BondRef) -> Result<usize, EditError> {
        if bond.0 < self.bonds.len() {
            Ok(bond.0)
        } else {
            Err(EditError::OutOfRange(bond.0))
        }
    }

    fn flip_bond<R: Rng + ?Sized>(&mut self, bond: usize, rng: &mut R) -> Result<(), EditError> {
        let Bond { a, b, order, .. } = self.bonds[bond];
        let headroom = self.free_valence(a).min(self.free_valence(b));
        let options: Vec<u32> = (1..=3)
            .filter(|&o| o != order && (o < order || o - order <= headroom))
            .collect();
        let new_order = *options.choose(rng).ok_or(EditError::NoTarget)?;
        self.bonds[bond].order = new_order;
        Ok(())
    }

    fn switch_atom<R: Rng + ?Sized>(&mut self, atom: usize, rng: &mut R) -> Result<(), EditError> {
        let current = self.atoms[atom].element;
        let used = self.used_valence(atom);
        let options: Vec<Element> = Element::ALL
            .into_iter()
            .filter(|&e| e != current && e.valence() >= used)
            .collect();
        self.atoms[atom].element = *options.choose(rng).ok_or(EditError::NoTarget)?;
        Ok(())
    }

    fn add_any_bond<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), EditError> {
        let open: Vec<usize> = (0..self.atoms.len())
            .filter(|&i| !self.atoms[i].protected && self.free_valence(i) > 0)
            .collect();
        let mut pairs = Vec::new();
        for (k, &i) in open.iter().enumerate() {
            for &j in &open[k + 1..] {
                if !self.bonded(i, j) {
                    pairs.push((i, j));
                }
            }
        }
        let &(a, b) = pairs.choose(rng).ok_or(EditError::NoTarget)?;
        self.add_bond(a, b, 1);
        Ok(())
    }

    fn add_atom_at<R: Rng + ?Sized>(&mut self, site: Site, rng: &mut R) -> Result<(), EditError> {
        match site {
            Site::Atom(atom) => {
                let atom = self.check_atom(atom)?;
                if self.free_valence(atom) == 0 {
                    return Err(EditError::NoTarget);
                }
                let element = *Element::ALL.choose(rng).ok_or(EditError::NoTarget)?;
                let new = self.add_atom(element);
                self.add_bond(atom, new, 1);
            }
            Site::Bond(bond) => {
                let bond = self.check_bond(bond)?;
                let options: Vec<Element> = Element::ALL
                    .into_iter()
                    .filter(|e| e.valence() >= 2)
                    .collect();
                let element = *options.choose(rng).ok_or(EditError::NoTarget)?;
                let Bond { a, b, .. } = self.bonds[bond];
                let new = self.add_atom(element);
                self.bonds[bond] = Bond {
                    a,
                    b: new,
                    order: 1,
                    grouped: false,
                };
                self.add_bond(new, b, 1);
            }
        }
        Ok(())
    }

    fn remove_atom(&mut self, atom: usize) {
        self.atoms.remove(atom);
        self.bonds.retain(|b| b.a != atom && b.b != atom);
        for bond in &mut self.bonds {
            if bond.a > atom {
                bond.a -= 1;
            }
            if bond.b > atom {
                bond.b -= 1;
            }
        }
    }

    /// Weisfeiler-Lehman colour refinement, seeded by element and tag.
    fn refined_colors(&self) -> Vec<usize> {
        let adj = self.adjacency();
        let mut colors = rank(self.atoms.iter().map(|a| (a.element, a.protected)).collect());
        let mut classes = count_distinct(&colors);

        for _ in 0..self.atoms.len() {
            let signatures: Vec<_> = (0..self.atoms.len())
                .map(|i| {
                    let mut around: Vec<(u32, bool, usize)> = adj[i]
                        .iter()
                        .map(|&(j, bond)| {
                            (self.bonds[bond].order, self.bonds[bond].grouped, colors[j])
                        })
                        .collect();
                    around.sort_unstable();
                    (colors[i], around)
                })
                .collect();
            let refined = rank(signatures);
            let refined_classes = count_distinct(&refined);
            colors = refined;
            if refined_classes == classes {
                break;
            }
            classes = refined_classes;
        }
        colors
    }
}

/// Map each value to its rank among the distinct values.
fn rank<T: Ord + Clone>(values: Vec<T>) -> Vec<usize> {
    let index: BTreeMap<T, usize> = values
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, v)| (v, i))
        .collect();
    values.iter().map(|v| index[v]).collect()
}

fn count_distinct(colors: &[usize]) -> usize {
    colors.iter().collect::<BTreeSet<_>>().len()
}

impl MolGraph for LabeledGraph {
    fn sanitize(&mut self) -> Result<(), ValidationError> {
        if self.atoms.is_empty() {
            return Err(ValidationError::Empty);
        }

        let mut seen = BTreeSet::new();
        for (i, bond) in self.bonds.iter().enumerate() {
            let in_range = bond.a < self.atoms.len() && bond.b < self.atoms.len();
            let pair = (bond.a.min(bond.b), bond.a.max(bond.b));
            if !in_range || bond.a == bond.b || !(1..=3).contains(&bond.order) || !seen.insert(pair)
            {
                return Err(ValidationError::MalformedBond(i));
            }
        }

        for (i, atom) in self.atoms.iter().enumerate() {
            let used = self.used_valence(i);
            let max = atom.element.valence();
            if used > max {
                return Err(ValidationError::Valence { atom: i, used, max });
            }
        }

        let fragments = self.fragment_count();
        if fragments > 1 {
            return Err(ValidationError::Disconnected(fragments));
        }
        Ok(())
    }

    fn canonical_id(&self) -> String {
        let colors = self.refined_colors();

        let mut atoms: Vec<(usize, String)> = self
            .atoms
            .iter()
            .zip(&colors)
            .map(|(atom, &color)| {
                let tag = if atom.protected { "!" } else { "" };
                (color, format!("{}{}{}", atom.element.symbol(), tag, color))
            })
            .collect();
        atoms.sort();

        let mut bonds: Vec<(usize, usize, u32, bool)> = self
            .bonds
            .iter()
            .map(|b| {
                let (ca, cb) = (colors[b.a], colors[b.b]);
                (ca.min(cb), ca.max(cb), b.order, b.grouped)
            })
            .collect();
        bonds.sort_unstable();

        let atom_part: Vec<String> = atoms.into_iter().map(|(_, s)| s).collect();
        let bond_part: Vec<String> = bonds
            .into_iter()
            .map(|(a, b, order, grouped)| {
                format!("{a}-{b}:{order}{}", if grouped { "!" } else { "" })
            })
            .collect();
        format!("{}|{}", atom_part.join("."), bond_part.join(","))
    }

    fn atoms(&self, class: AtomClass) -> Vec<AtomRef> {
        (0..self.atoms.len())
            .filter(|&i| {
                let atom = &self.atoms[i];
                match class {
                    AtomClass::Any => true,
                    AtomClass::Unprotected => !atom.protected,
                    AtomClass::Changeable => {
                        let used = self.used_valence(i);
                        !atom.protected
                            && Element::ALL
                                .iter()
                                .any(|&e| e != atom.element && e.valence() >= used)
                    }
                    AtomClass::Removable => {
                        !atom.protected && self.atoms.len() > 1 && self.degree(i) == 1
                    }
                }
            })
            .map(AtomRef)
            .collect()
    }

    fn bonds(&self, class: BondClass) -> Vec<BondRef> {
        self.bonds
            .iter()
            .enumerate()
            .filter(|(_, b)| match class {
                BondClass::Any => true,
                BondClass::Ungrouped => !b.grouped,
            })
            .map(|(i, _)| BondRef(i))
            .collect()
    }

    fn ring_bond_sets(&self) -> Vec<BTreeSet<BondRef>> {
        // Fundamental cycles of a BFS spanning forest.
        let adj = self.adjacency();
        let n = self.atoms.len();
        let mut parent: Vec<Option<(usize, usize)>> = vec![None; n];
        let mut depth = vec![usize::MAX; n];
        let mut tree_bond = vec![false; self.bonds.len()];

        for start in 0..n {
            if depth[start] != usize::MAX {
                continue;
            }
            depth[start] = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(atom) = queue.pop_front() {
                for &(next, bond) in &adj[atom] {
                    if depth[next] == usize::MAX {
                        depth[next] = depth[atom] + 1;
                        parent[next] = Some((atom, bond));
                        tree_bond[bond] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        let mut rings = Vec::new();
        for (i, bond) in self.bonds.iter().enumerate() {
            if tree_bond[i] || bond.a >= n || bond.b >= n {
                continue;
            }
            let mut ring = BTreeSet::from([BondRef(i)]);
            let (mut u, mut v) = (bond.a, bond.b);
            while u != v {
                if depth[u] < depth[v] {
                    std::mem::swap(&mut u, &mut v);
                }
                match parent[u] {
                    Some((up, via)) => {
                        ring.insert(BondRef(via));
                        u = up;
                    }
                    None => break,
                }
            }
            rings.push(ring);
        }
        rings
    }

    fn apply_edit<R: Rng + ?Sized>(&mut self, edit: Edit, rng: &mut R) -> Result<(), EditError> {
        match edit {
            Edit::FlipBond(bond) => {
                let bond = self.check_bond(bond)?;
                self.flip_bond(bond, rng)
            }
            Edit::SwitchAtom(atom) => {
                let atom = self.check_atom(atom)?;
                self.switch_atom(atom, rng)
            }
            Edit::AddBond => self.add_any_bond(rng),
            Edit::RemoveBond(bond) => {
                let bond = self.check_bond(bond)?;
                self.bonds.remove(bond);
                Ok(())
            }
            Edit::AddAtom(site) => self.add_atom_at(site, rng),
            Edit::RemoveAtom(atom) => {
                let atom = self.check_atom(atom)?;
                if self.atoms.len() < 2 {
                    return Err(EditError::NoTarget);
                }
                self.remove_atom(atom);
                Ok(())
            }
        }
    }

    fn recombine<R: Rng + ?Sized>(
        &self,
        other: &Self,
        rng: &mut R,
    ) -> Result<Self, RecombineError> {
        let (mut child, left) = self.fragment(rng)?;
        let (right_part, right) = other.fragment(rng)?;

        let offset = child.atoms.len();
        child.atoms.extend(right_part.atoms);
        child.bonds.extend(right_part.bonds.into_iter().map(|b| Bond {
            a: b.a + offset,
            b: b.b + offset,
            ..b
        }));
        child.add_bond(left, right + offset, 1);

        child.sanitize()?;
        Ok(child)
    }

    fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    fn presets() -> Vec<Self> {
        vec![Self::cyclohexane(), Self::benzene()]
    }

    fn to_exchange(&self) -> String {
        let atoms: Vec<String> = self
            .atoms
            .iter()
            .map(|a| format!("{}{}", a.element.symbol(), if a.protected { "!" } else { "" }))
            .collect();
        let bonds: Vec<String> = self
            .bonds
            .iter()
            .map(|b| {
                format!(
                    "{}-{}:{}{}",
                    b.a,
                    b.b,
                    b.order,
                    if b.grouped { "!" } else { "" }
                )
            })
            .collect();
        format!("{}|{}", atoms.join("."), bonds.join(","))
    }

    fn from_exchange(text: &str) -> Result<Self, ExchangeError> {
        let fail = |reason: &str| ExchangeError {
            input: text.to_string(),
            reason: reason.to_string(),
        };
        let (atom_part, bond_part) = text.trim().split_once('|').unwrap_or((text.trim(), ""));

        let mut graph = Self::new();
        for token in atom_part.split('.').filter(|t| !t.is_empty()) {
            let (symbol, protected) = match token.strip_suffix('!') {
                Some(symbol) => (symbol, true),
                None => (token, false),
            };
            let element =
                Element::from_symbol(symbol).ok_or_else(|| fail(&format!("unknown element {symbol}")))?;
            let atom = graph.add_atom(element);
            if protected {
                graph.protect_atom(atom);
            }
        }

        for token in bond_part.split(',').filter(|t| !t.is_empty()) {
            let (body, grouped) = match token.strip_suffix('!') {
                Some(body) => (body, true),
                None => (token, false),
            };
            let (ends, order) = body
                .split_once(':')
                .ok_or_else(|| fail(&format!("bond {token} lacks an order")))?;
            let (a, b) = ends
                .split_once('-')
                .ok_or_else(|| fail(&format!("bond {token} lacks endpoints")))?;
            let parse = |s: &str| {
                s.parse::<usize>()
                    .map_err(|_| fail(&format!("bad index in {token}")))
            };
            let (a, b) = (parse(a)?, parse(b)?);
            let order = order
                .parse::<u32>()
                .map_err(|_| fail(&format!("bad order in {token}")))?;
            if a >= graph.atoms.len() || b >= graph.atoms.len() {
                return Err(fail(&format!("bond {token} references a missing atom")));
            }
            let bond = graph.add_bond(a, b, order);
            if grouped {
                graph.group_bond(bond);
            }
        }

        Ok(graph)
    }
}
