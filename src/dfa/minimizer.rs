// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::dfa::{Dfa, State, StateIdx, REJECT};
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

// A partition of the state indices into disjoint parts. Refinement splits
// parts in place: the difference keeps the old part index, the intersection
// gets a fresh one.
struct Partition {
    parts: Vec<Vec<StateIdx>>,
    part_of: Vec<usize>,
}

impl Partition {
    fn new(sets: Vec<Vec<StateIdx>>, num_states: usize) -> Partition {
        let mut part_of = vec![0; num_states];
        for (idx, set) in sets.iter().enumerate() {
            for &s in set {
                part_of[s] = idx;
            }
        }
        Partition {
            parts: sets,
            part_of,
        }
    }

    fn num_parts(&self) -> usize {
        self.parts.len()
    }

    fn part(&self, idx: usize) -> &[StateIdx] {
        &self.parts[idx]
    }

    // Splits every part into its members and non-members of `splitter`. For
    // each part that actually split, calls back with the new (intersection)
    // part's index and size and the old (difference) part's index and size.
    fn refine<F: FnMut(usize, usize, usize, usize)>(
        &mut self,
        splitter: &[StateIdx],
        mut split_callback: F,
    ) {
        let mut marked: HashMap<usize, Vec<StateIdx>> = HashMap::new();
        for &s in splitter {
            marked.entry(self.part_of[s]).or_default().push(s);
        }

        for (part_idx, mut inter) in marked {
            if inter.len() == self.parts[part_idx].len() {
                continue;
            }
            inter.sort_unstable();
            let diff: Vec<StateIdx> = self.parts[part_idx]
                .iter()
                .cloned()
                .filter(|s| inter.binary_search(s).is_err())
                .collect();
            let new_idx = self.parts.len();
            for &s in &inter {
                self.part_of[s] = new_idx;
            }
            let (int_len, diff_len) = (inter.len(), diff.len());
            self.parts[part_idx] = diff;
            self.parts.push(inter);
            split_callback(new_idx, int_len, part_idx, diff_len);
        }
    }
}

pub struct Minimizer {
    partition: Partition,
    distinguishers: HashSet<usize>,
    // The reversed transitions of the dfa.
    rev: Vec<Vec<(u8, StateIdx)>>,
}

impl Minimizer {
    // States start out grouped by acceptance and by which bytes they cover
    // at all; everything finer comes from refinement.
    fn initial_partition(dfa: &Dfa) -> Vec<Vec<StateIdx>> {
        let mut part: HashMap<(bool, [u64; 4]), Vec<StateIdx>> = HashMap::new();
        for (idx, st) in dfa.states.iter().enumerate() {
            let mut covered = [0u64; 4];
            for (b, &tgt) in st.transitions.iter().enumerate() {
                if tgt != REJECT {
                    covered[b / 64] |= 1 << (b % 64);
                }
            }
            part.entry((st.accept, covered)).or_default().push(idx);
        }
        part.into_values().collect()
    }

    // Refine the current partition based on the fact that everything in
    // `splitter` is distinct from everything not in it.
    fn refine(&mut self, splitter: &[StateIdx]) {
        let dists = &mut self.distinguishers;

        self.partition
            .refine(splitter, |int_idx, int_len, diff_idx, diff_len| {
                if dists.contains(&diff_idx) {
                    dists.insert(int_idx);
                } else if int_len <= diff_len {
                    dists.insert(int_idx);
                } else {
                    dists.insert(diff_idx);
                }
            });
    }

    fn next_distinguisher(&mut self) -> Option<usize> {
        let maybe_elt = self.distinguishers.iter().next().cloned();
        if let Some(elt) = maybe_elt {
            self.distinguishers.remove(&elt);
        }
        maybe_elt
    }

    // The preimages of a part, one set per group of bytes leading into it.
    fn get_input_sets(&self, part_idx: usize) -> Vec<Vec<StateIdx>> {
        let inputs: Vec<(u8, StateIdx)> = self
            .partition
            .part(part_idx)
            .iter()
            .flat_map(|s| self.rev[*s].iter().cloned())
            .collect();
        if inputs.is_empty() {
            return Vec::new();
        }

        let mut sets: Vec<Vec<StateIdx>> =
            inputs.into_iter().into_group_map().into_values().collect();
        for set in &mut sets {
            set.sort_unstable();
            set.dedup();
        }
        sets.sort();
        sets.dedup();
        sets
    }

    fn compute_partition(&mut self) {
        while let Some(dist) = self.next_distinguisher() {
            let sets = self.get_input_sets(dist);

            for set in &sets {
                self.refine(set);
            }
        }
    }

    pub fn minimize(dfa: &Dfa) -> Dfa {
        if dfa.num_states() == 0 {
            return Dfa { states: Vec::new() };
        }
        let mut min = Minimizer::new(dfa);

        min.compute_partition();

        // Re-index the states: every part collapses onto a representative.
        let mut old_to_new = vec![0usize; dfa.num_states()];
        let mut states: Vec<State> = Vec::with_capacity(min.partition.num_parts());
        for (new_idx, part) in min.partition.parts.iter().enumerate() {
            let rep = part[0];
            states.push(dfa.states[rep].clone());
            for &s in part {
                old_to_new[s] = new_idx;
            }
        }
        for st in &mut states {
            for t in st.transitions.iter_mut() {
                if *t != REJECT {
                    *t = old_to_new[*t as usize] as u32;
                }
            }
        }

        let mut ret = Dfa { states };
        ret.sort_states(old_to_new[0]);
        ret
    }

    fn new(dfa: &Dfa) -> Minimizer {
        let init = Minimizer::initial_partition(dfa);
        let partition = Partition::new(init, dfa.num_states());

        // We're allowed to leave out one distinguisher, as long as it isn't
        // a set of accepting states. Choose the one with the most states.
        let mut dists: HashSet<usize> = (0..partition.num_parts()).collect();
        let worst = (0..partition.num_parts())
            .filter(|&i| !dfa.states[partition.part(i)[0]].accept)
            .max_by_key(|&i| partition.part(i).len());
        if let Some(worst) = worst {
            dists.remove(&worst);
        }

        let mut rev = vec![Vec::new(); dfa.num_states()];
        for (src, st) in dfa.states.iter().enumerate() {
            for (b, &tgt) in st.transitions.iter().enumerate() {
                if tgt != REJECT {
                    rev[tgt as usize].push((b as u8, src));
                }
            }
        }

        Minimizer {
            partition,
            distinguishers: dists,
            rev,
        }
    }
}
