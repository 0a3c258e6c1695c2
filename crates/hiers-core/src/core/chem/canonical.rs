use crate::core::models::ids::AtomId;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use slotmap::SecondaryMap;

/// Graph invariant used to seed the ranking. Field order decides which atoms
/// come first in canonical output, so hydrogens and dummies lead and heavier
/// elements follow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct AtomInvariant {
    atomic_num: u8,
    isotope: u16,
    degree: usize,
    hydrogen_count: u8,
    formal_charge: i8,
    is_aromatic: bool,
    singles: u8,
    doubles: u8,
    triples: u8,
    aromatic_bonds: u8,
    chiral: bool,
}

/// Dense view of a molecule: atoms indexed `0..n` with neighbour lists.
struct DenseGraph {
    atoms: Vec<AtomId>,
    invariants: Vec<AtomInvariant>,
    neighbors: Vec<Vec<(usize, BondOrder)>>,
}

impl DenseGraph {
    fn new(mol: &Molecule, stereo: bool) -> Self {
        let atoms = mol.atom_ids();
        let mut index: SecondaryMap<AtomId, usize> = SecondaryMap::with_capacity(atoms.len());
        for (i, &id) in atoms.iter().enumerate() {
            index.insert(id, i);
        }

        let mut invariants = Vec::with_capacity(atoms.len());
        let mut neighbors = Vec::with_capacity(atoms.len());
        for &id in &atoms {
            let mut list = Vec::new();
            let (mut singles, mut doubles, mut triples, mut aromatic_bonds) = (0u8, 0u8, 0u8, 0u8);
            for &bond_id in mol.bonds_of(id) {
                let Some(bond) = mol.bond(bond_id) else { continue };
                let Some(other) = bond.other(id).and_then(|o| index.get(o).copied()) else {
                    continue;
                };
                match bond.order {
                    BondOrder::Single => singles += 1,
                    BondOrder::Double => doubles += 1,
                    BondOrder::Triple => triples += 1,
                    BondOrder::Aromatic => aromatic_bonds += 1,
                }
                list.push((other, bond.order));
            }
            let atom = mol.atom(id);
            invariants.push(AtomInvariant {
                atomic_num: atom.map_or(0, |a| a.atomic_num),
                isotope: atom.map_or(0, |a| a.isotope),
                degree: list.len(),
                hydrogen_count: atom.map_or(0, |a| a.hydrogen_count),
                formal_charge: atom.map_or(0, |a| a.formal_charge),
                is_aromatic: atom.is_some_and(|a| a.is_aromatic),
                singles,
                doubles,
                triples,
                aromatic_bonds,
                chiral: stereo && atom.is_some_and(|a| a.stereo.is_some()),
            });
            neighbors.push(list);
        }

        Self {
            atoms,
            invariants,
            neighbors,
        }
    }

    fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Refines `ranks` by neighbour ranks until the number of classes stops growing.
    fn refine(&self, ranks: &mut Vec<usize>) {
        let mut classes = count_distinct(ranks);
        loop {
            let keys: Vec<(usize, Vec<(usize, BondOrder)>)> = (0..self.len())
                .map(|i| {
                    let mut around: Vec<(usize, BondOrder)> =
                        self.neighbors[i].iter().map(|&(j, order)| (ranks[j], order)).collect();
                    around.sort_unstable();
                    (ranks[i], around)
                })
                .collect();
            let refined = ranks_from_keys(&keys);
            let refined_classes = count_distinct(&refined);
            *ranks = refined;
            if refined_classes <= classes {
                return;
            }
            classes = refined_classes;
        }
    }

    /// Isomorphism-invariant description of the graph under a ranking, used
    /// to compare tie-breaking choices.
    fn trace(&self, ranks: &[usize]) -> Vec<(usize, &AtomInvariant, Vec<(usize, BondOrder)>)> {
        let mut rows: Vec<_> = (0..self.len())
            .map(|i| {
                let mut around: Vec<(usize, BondOrder)> =
                    self.neighbors[i].iter().map(|&(j, order)| (ranks[j], order)).collect();
                around.sort_unstable();
                (ranks[i], &self.invariants[i], around)
            })
            .collect();
        rows.sort();
        rows
    }

    /// Splits tied classes one at a time, keeping the candidate whose
    /// refined ranking yields the smallest trace.
    fn break_ties(&self, ranks: &mut Vec<usize>) {
        while let Some((rank, tied)) = lowest_tied_class(ranks) {
            let mut best: Option<(Vec<(usize, &AtomInvariant, Vec<(usize, BondOrder)>)>, Vec<usize>)> = None;
            for &candidate in &tied {
                let mut trial = ranks.clone();
                for &other in &tied {
                    if other != candidate {
                        trial[other] = rank + 1;
                    }
                }
                self.refine(&mut trial);
                let trace = self.trace(&trial);
                let better = match &best {
                    Some((best_trace, _)) => trace < *best_trace,
                    None => true,
                };
                if better {
                    best = Some((trace, trial));
                }
            }
            match best {
                Some((_, chosen)) => *ranks = chosen,
                None => return,
            }
        }
    }
}

fn ranks_from_keys<K: Ord>(keys: &[K]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
    let mut ranks = vec![0usize; keys.len()];
    for pos in 0..order.len() {
        let i = order[pos];
        ranks[i] = if pos > 0 && keys[order[pos - 1]] == keys[i] {
            ranks[order[pos - 1]]
        } else {
            pos
        };
    }
    ranks
}

fn count_distinct(ranks: &[usize]) -> usize {
    let mut sorted = ranks.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn lowest_tied_class(ranks: &[usize]) -> Option<(usize, Vec<usize>)> {
    let mut counts = vec![0usize; ranks.len()];
    for &r in ranks {
        counts[r] += 1;
    }
    let rank = counts.iter().position(|&c| c > 1)?;
    let members = (0..ranks.len()).filter(|&i| ranks[i] == rank).collect();
    Some((rank, members))
}

/// Computes a canonical atom ranking: every atom gets a distinct rank and
/// isomorphic molecules receive corresponding ranks regardless of input atom
/// order. With `stereo`, stereocentres are distinguished from otherwise
/// identical atoms.
pub fn canonical_ranks(mol: &Molecule, stereo: bool) -> SecondaryMap<AtomId, usize> {
    let graph = DenseGraph::new(mol, stereo);
    let mut ranks = ranks_from_keys(&graph.invariants);
    graph.refine(&mut ranks);
    graph.break_ties(&mut ranks);

    let mut out = SecondaryMap::with_capacity(graph.len());
    for (i, &id) in graph.atoms.iter().enumerate() {
        out.insert(id, ranks[i]);
    }
    out
}
