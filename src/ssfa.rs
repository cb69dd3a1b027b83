// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The parallel matcher.
//!
//! The input is split into contiguous shards, one per worker. A worker does
//! not know which DFA state the match will be in when its shard begins, so
//! it computes where *every* state ends up: its result is a total function
//! from states to states. Composing the shard functions left to right and
//! applying the composition to the initial state gives the same answer the
//! serial driver would.

use crate::dfa::{Dfa, ALPHABET, REJECT};
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// How often workers poll for cancellation, in bytes.
const CANCEL_CHECK_BYTES: usize = 4096;

/// The outcome of a match. Cancellation is a distinct result, never folded
/// into accept/reject.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchResult {
    Accept,
    Reject,
    Cancelled,
}

impl MatchResult {
    pub fn is_match(self) -> bool {
        self == MatchResult::Accept
    }

    fn from_accept(accept: bool) -> MatchResult {
        if accept {
            MatchResult::Accept
        } else {
            MatchResult::Reject
        }
    }
}

/// A handle for interrupting a running match. Clones share the flag, so one
/// token can be handed to another thread while the match runs.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// A token that trips on its own once `deadline` passes.
    pub fn with_deadline(deadline: Instant) -> CancelToken {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn should_stop(&self) -> bool {
        self.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d)
    }
}

/// The simultaneous-start automaton: the DFA's tables, re-derived so that
/// the reject sentinel is a real row and every shard function is total.
pub struct Ssfa {
    // (dfa states + 1) rows of 256 entries; the last row is the dead row.
    trans: Vec<u32>,
    accept: Vec<bool>,
    rows: usize,
    dead: u32,
    threads: usize,
}

impl Ssfa {
    pub fn from_dfa(dfa: &Dfa, threads: usize) -> Ssfa {
        let n = dfa.num_states();
        let dead = n as u32;
        let rows = n + 1;
        let mut trans = vec![dead; rows * ALPHABET];
        let mut accept = vec![false; rows];
        for s in 0..n {
            accept[s] = dfa.accept(s);
            for b in 0..ALPHABET {
                let t = dfa.transition(s, b as u8);
                trans[s * ALPHABET + b] = if t == REJECT { dead } else { t };
            }
        }
        Ssfa {
            trans,
            accept,
            rows,
            dead,
            threads: threads.max(1),
        }
    }

    pub fn num_states(&self) -> usize {
        self.rows - 1
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn full_match(&self, input: &[u8]) -> MatchResult {
        self.run(input, self.threads, None)
    }

    pub fn full_match_with(&self, input: &[u8], token: &CancelToken) -> MatchResult {
        self.run(input, self.threads, Some(token))
    }

    /// Like `full_match`, but with an explicit shard count. The result does
    /// not depend on the count.
    pub fn full_match_sharded(&self, input: &[u8], shards: usize) -> MatchResult {
        self.run(input, shards, None)
    }

    fn clamp_shards(&self, len: usize, requested: usize) -> usize {
        let hw = thread::available_parallelism().map(usize::from).unwrap_or(1);
        requested.max(1).min(hw.max(1)).min(len.max(1))
    }

    fn run(&self, input: &[u8], shards: usize, token: Option<&CancelToken>) -> MatchResult {
        let k = self.clamp_shards(input.len(), shards);
        if k == 1 || input.is_empty() {
            return self.walk(input, token);
        }

        let chunk = (input.len() + k - 1) / k;
        let num_shards = (input.len() + chunk - 1) / chunk;
        trace!(
            "matching {} bytes in {} shards of <= {} bytes",
            input.len(),
            num_shards,
            chunk
        );

        // Phase 1: every worker owns one slice of the partial-result vector
        // and fills it with its shard's state-to-state function.
        let mut partials = vec![0u32; num_shards * self.rows];
        let aborted = AtomicBool::new(false);
        {
            let aborted = &aborted;
            crossbeam::scope(|scope| {
                for (psi, shard) in partials.chunks_mut(self.rows).zip(input.chunks(chunk)) {
                    scope.spawn(move |_| self.shard_function(shard, psi, token, aborted));
                }
            })
            .unwrap();
        }
        if aborted.load(Ordering::Relaxed) {
            return MatchResult::Cancelled;
        }

        // Phase 2: compose the shard functions left to right.
        let mut q = 0u32;
        for psi in partials.chunks(self.rows) {
            q = psi[q as usize];
        }
        MatchResult::from_accept(self.accept[q as usize])
    }

    // Advances all states simultaneously over one shard. The dead row maps
    // to itself, so rejection is absorbing without any per-byte test.
    fn shard_function(
        &self,
        shard: &[u8],
        psi: &mut [u32],
        token: Option<&CancelToken>,
        aborted: &AtomicBool,
    ) {
        for (s, out) in psi.iter_mut().enumerate() {
            *out = s as u32;
        }
        for (i, &b) in shard.iter().enumerate() {
            if i % CANCEL_CHECK_BYTES == 0 {
                if aborted.load(Ordering::Relaxed) {
                    return;
                }
                if token.map_or(false, CancelToken::should_stop) {
                    aborted.store(true, Ordering::Relaxed);
                    return;
                }
            }
            let row = b as usize;
            for s in psi.iter_mut() {
                *s = self.trans[(*s as usize) * ALPHABET + row];
            }
        }
    }

    // The plain scalar walk, used when a single shard suffices.
    fn walk(&self, input: &[u8], token: Option<&CancelToken>) -> MatchResult {
        let mut q = 0u32;
        for (i, &b) in input.iter().enumerate() {
            if i % CANCEL_CHECK_BYTES == 0 && token.map_or(false, CancelToken::should_stop) {
                return MatchResult::Cancelled;
            }
            q = self.trans[(q as usize) * ALPHABET + b as usize];
            if q == self.dead {
                return MatchResult::Reject;
            }
        }
        MatchResult::from_accept(self.accept[q as usize])
    }
}

impl std::fmt::Debug for Ssfa {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ssfa ({} states + dead row, {} threads)",
            self.num_states(),
            self.threads
        )
    }
}
