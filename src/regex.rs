// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::dfa::Dfa;
use crate::expr::ExprTree;
use crate::parser;
use crate::ssfa::{CancelToken, MatchResult, Ssfa};
use crate::Result;
use log::debug;

pub const DEFAULT_MAX_STATES: usize = 1 << 16;

/// Compilation options.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Shard count for the parallel matcher. Clamped at match time to the
    /// input length and the hardware parallelism.
    pub threads: u32,
    /// Run Hopcroft minimization after subset construction.
    pub minimize: bool,
    /// Build the automaton of the reversed language.
    pub reverse: bool,
    /// Abort compilation once subset construction exceeds this many states.
    pub max_states: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            threads: 2,
            minimize: false,
            reverse: false,
            max_states: DEFAULT_MAX_STATES,
        }
    }
}

/// A compiled whole-input matcher.
#[derive(Debug)]
pub struct Regex {
    dfa: Dfa,
    ssfa: Ssfa,
    min_length: usize,
    max_length: usize,
}

impl Regex {
    /// Creates a new `Regex` from a regular expression string.
    pub fn new(re: &str) -> Result<Regex> {
        Regex::with_options(re, Options::default())
    }

    pub fn with_options(re: &str, opts: Options) -> Result<Regex> {
        Regex::from_tree(parser::parse(re)?, opts)
    }

    /// Compiles a tree built directly against `ExprBuilder`. This is the
    /// entry point for the extended operators, which have no surface syntax.
    pub fn from_tree(mut tree: ExprTree, opts: Options) -> Result<Regex> {
        tree.fill_follow(opts.reverse);
        let mut dfa = Dfa::from_tree(&tree, opts.reverse, opts.max_states)?;
        if opts.minimize {
            dfa = dfa.minimize();
        }
        let ssfa = Ssfa::from_dfa(&dfa, opts.threads.max(1) as usize);
        debug!(
            "compiled {} positions into {} dfa states",
            tree.positions().len(),
            dfa.num_states()
        );
        Ok(Regex {
            dfa,
            ssfa,
            min_length: tree.min_length(),
            max_length: tree.max_length(),
        })
    }

    /// Matches the whole input in parallel.
    pub fn full_match(&self, input: &[u8]) -> MatchResult {
        self.ssfa.full_match(input)
    }

    /// Like `full_match`, but interruptible through `token`.
    pub fn full_match_with(&self, input: &[u8], token: &CancelToken) -> MatchResult {
        self.ssfa.full_match_with(input, token)
    }

    /// Like `full_match`, with an explicit shard count overriding the
    /// compiled-in one.
    pub fn full_match_sharded(&self, input: &[u8], shards: usize) -> MatchResult {
        self.ssfa.full_match_sharded(input, shards)
    }

    /// The single-threaded reference driver.
    pub fn full_match_serial(&self, input: &[u8]) -> MatchResult {
        if self.dfa.full_match(input) {
            MatchResult::Accept
        } else {
            MatchResult::Reject
        }
    }

    pub fn is_match(&self, input: &[u8]) -> bool {
        self.full_match(input).is_match()
    }

    pub fn num_states(&self) -> usize {
        self.dfa.num_states()
    }

    /// Lower bound on the length of any accepted input.
    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Upper bound on the length of any accepted input; `usize::MAX` stands
    /// for unbounded.
    pub fn max_length(&self) -> usize {
        self.max_length
    }
}
