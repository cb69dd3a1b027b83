// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod minimizer;

use crate::dfa::minimizer::Minimizer;
use crate::error::Error;
use crate::expr::position::{merge_into, set_contains};
use crate::expr::{ExprTree, OpTag, PosKind, PosSet};
use crate::Result;
use log::debug;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

pub type StateIdx = usize;

/// The reject sentinel. Every byte maps it to itself and it never accepts;
/// we keep it out of the state vector and let the table entries carry it.
pub const REJECT: u32 = u32::MAX;

pub const ALPHABET: usize = 256;

#[derive(Clone, PartialEq)]
pub struct State {
    pub(crate) transitions: Box<[u32; ALPHABET]>,
    pub(crate) accept: bool,
}

impl State {
    fn new(accept: bool) -> State {
        State {
            transitions: Box::new([REJECT; ALPHABET]),
            accept,
        }
    }
}

/// A deterministic automaton over the byte alphabet with dense transition
/// tables. State 0 is the initial state.
#[derive(Clone, PartialEq)]
pub struct Dfa {
    pub(crate) states: Vec<State>,
}

impl Dfa {
    /// Runs subset construction over the tree's positions. The tree must
    /// have had `fill_follow` run in the same direction.
    pub fn from_tree(tree: &ExprTree, reverse: bool, max_states: usize) -> Result<Dfa> {
        Determinizer::determinize(tree, reverse, max_states)
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn accept(&self, state: StateIdx) -> bool {
        self.states[state].accept
    }

    /// The successor of `state` under `byte`, or `REJECT`.
    pub fn transition(&self, state: StateIdx, byte: u8) -> u32 {
        self.states[state].transitions[byte as usize]
    }

    /// The single-threaded driver: the reference implementation that the
    /// parallel matcher is checked against.
    pub fn full_match(&self, input: &[u8]) -> bool {
        if self.states.is_empty() {
            return false;
        }
        let mut q = 0u32;
        for &b in input {
            q = self.states[q as usize].transitions[b as usize];
            if q == REJECT {
                return false;
            }
        }
        self.states[q as usize].accept
    }

    /// Returns an equivalent DFA with fewer (or equally many) states.
    ///
    /// Uses Hopcroft's algorithm, then re-sorts the result so that the
    /// initial state is 0 again and construction is deterministic.
    pub fn minimize(&self) -> Dfa {
        let before = self.num_states();
        let dfa = Minimizer::minimize(self);
        debug!("minimized {} states down to {}", before, dfa.num_states());
        dfa
    }

    /// Sorts states in depth-first order from `init`, renumbering `init` to
    /// 0 and pruning unreachable states.
    pub(crate) fn sort_states(&mut self, init: StateIdx) {
        let mut order = Vec::with_capacity(self.states.len());
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![init];
        seen[init] = true;
        while let Some(s) = stack.pop() {
            order.push(s);
            for &t in self.states[s].transitions.iter() {
                if t != REJECT && !seen[t as usize] {
                    seen[t as usize] = true;
                    stack.push(t as usize);
                }
            }
        }

        let mut old_to_new = vec![REJECT; self.states.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            old_to_new[old_idx] = new_idx as u32;
        }
        let mut states: Vec<State> = order.iter().map(|&old| self.states[old].clone()).collect();
        for st in &mut states {
            for t in st.transitions.iter_mut() {
                if *t != REJECT {
                    *t = old_to_new[*t as usize];
                }
            }
        }
        self.states = states;
    }
}

impl Debug for Dfa {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_fmt(format_args!("Dfa ({} states):\n", self.states.len()))?;

        for (st_idx, st) in self.states.iter().enumerate().take(40) {
            f.write_fmt(format_args!(
                "\tState {} (accepting: {:?}):\n",
                st_idx, st.accept
            ))?;

            // Cap it at 5 ranges, since it gets unreadable otherwise.
            let mut printed = 0;
            let mut b = 0usize;
            while b < ALPHABET && printed < 5 {
                let tgt = st.transitions[b];
                let start = b;
                while b < ALPHABET && st.transitions[b] == tgt {
                    b += 1;
                }
                if tgt != REJECT {
                    f.write_fmt(format_args!("\t\t{} -- {} => {}\n", start, b - 1, tgt))?;
                    printed += 1;
                }
            }
            if printed == 5 && b < ALPHABET {
                f.write_str("\t\t...\n")?;
            }
        }
        if self.states.len() > 40 {
            f.write_fmt(format_args!(
                "\t...({} more states)\n",
                self.states.len() - 40
            ))?;
        }
        Ok(())
    }
}

// All the intermediate state needed while turning position sets into DFA
// states.
struct Determinizer<'a> {
    tree: &'a ExprTree,
    dfa: Dfa,
    state_map: HashMap<PosSet, StateIdx>,
    active_states: Vec<PosSet>,
    max_states: usize,
}

impl<'a> Determinizer<'a> {
    fn determinize(tree: &ExprTree, reverse: bool, max_states: usize) -> Result<Dfa> {
        let mut det = Determinizer {
            tree,
            dfa: Dfa { states: Vec::new() },
            state_map: HashMap::new(),
            active_states: Vec::new(),
            max_states,
        };
        det.run(tree.initial_positions(reverse))?;
        debug!(
            "determinized {} positions into {} states",
            tree.positions().len(),
            det.dfa.num_states()
        );
        Ok(det.dfa)
    }

    // Interns a position set. If the set is new, allocates a state for it
    // and queues it for exploration.
    fn add_state(&mut self, set: PosSet) -> Result<StateIdx> {
        if let Some(&idx) = self.state_map.get(&set) {
            return Ok(idx);
        }
        if self.dfa.num_states() >= self.max_states {
            return Err(Error::TooManyStates);
        }
        let accept = set_contains(&set, self.tree.eop());
        self.dfa.states.push(State::new(accept));
        let idx = self.dfa.num_states() - 1;
        self.state_map.insert(set.clone(), idx);
        self.active_states.push(set);
        Ok(idx)
    }

    fn run(&mut self, init: PosSet) -> Result<()> {
        self.add_state(init)?;
        while let Some(set) = self.active_states.pop() {
            let from = self.state_map[&set];
            for byte in 0..ALPHABET {
                let mut next = PosSet::new();
                for &p in &set {
                    let pos = self.tree.position(p);
                    if pos.matches(byte as u8) {
                        merge_into(&mut next, &pos.follow);
                    }
                }
                self.reconcile(&mut next);
                let tgt = if next.is_empty() {
                    REJECT
                } else {
                    self.add_state(next)? as u32
                };
                self.dfa.states[from].transitions[byte] = tgt;
            }
        }
        Ok(())
    }

    // Operator reconciliation. An intersection pair whose halves are both
    // reachable releases its continuation; an XOR pair does so when exactly
    // one half is reachable, and cancels when both are. Pairs are visited in
    // ascending id order and the whole thing is iterated until stable, so a
    // nested pair's verdict can feed an enclosing pair's marker within the
    // same transition.
    fn reconcile(&self, set: &mut PosSet) {
        let pairs = self.tree.pairs();
        if pairs.is_empty() {
            return;
        }
        let mut cancelled = vec![false; pairs.len()];
        let mut expanded = vec![false; pairs.len()];
        loop {
            let mut present = vec![[false; 2]; pairs.len()];
            for &p in set.iter() {
                if let PosKind::Op { pair, side, .. } = self.tree.position(p).kind {
                    present[pair][side] = true;
                }
            }

            let mut changed = false;
            for (idx, pair) in pairs.iter().enumerate() {
                if cancelled[idx] {
                    continue;
                }
                let [a, b] = present[idx];
                match pair.tag {
                    OpTag::Intersection => {
                        if a && b && !expanded[idx] {
                            expanded[idx] = true;
                            let grew = merge_into(set, &self.tree.position(pair.ops[0]).follow);
                            let grew2 = merge_into(set, &self.tree.position(pair.ops[1]).follow);
                            changed |= grew || grew2;
                        }
                    }
                    OpTag::Xor => {
                        if a && b {
                            cancelled[idx] = true;
                            set.retain(|&p| p != pair.ops[0] && p != pair.ops[1]);
                            changed = true;
                        } else if (a || b) && !expanded[idx] {
                            expanded[idx] = true;
                            let op = if a { pair.ops[0] } else { pair.ops[1] };
                            changed |= merge_into(set, &self.tree.position(op).follow);
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }

        // A set holding only one half of an intersection pair is pruned of
        // that half.
        let mut present = vec![[false; 2]; pairs.len()];
        for &p in set.iter() {
            if let PosKind::Op { pair, side, .. } = self.tree.position(p).kind {
                present[pair][side] = true;
            }
        }
        set.retain(|&p| match self.tree.position(p).kind {
            PosKind::Op {
                tag: OpTag::Intersection,
                pair,
                ..
            } => present[pair][0] && present[pair][1],
            _ => true,
        });
    }
}
