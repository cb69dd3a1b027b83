// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use bit_set::BitSet;
use std::fmt::{self, Debug, Formatter};

/// The index of a position in the tree's arena. Indices are stable: once a
/// leaf has been allocated, its index never changes.
pub type PosIdx = usize;

/// How we represent a set of positions. The two important criteria are:
///
/// - it should be hashable, because position sets are the interning keys of
///   subset construction (this knocks out `HashSet`), and
/// - merging two sets should be cheap, because `follow` sets are built by
///   repeated unioning.
///
/// Therefore we use a sorted `Vec`. (But be careful to keep it sorted!)
pub type PosSet = Vec<PosIdx>;

/// Merges the sorted set `src` into the sorted set `dst`. Returns true if
/// anything was inserted.
pub fn merge_into(dst: &mut PosSet, src: &[PosIdx]) -> bool {
    if src.is_empty() {
        return false;
    }
    let old_len = dst.len();
    dst.extend_from_slice(src);
    dst.sort_unstable();
    dst.dedup();
    dst.len() > old_len
}

pub fn set_contains(set: &[PosIdx], p: PosIdx) -> bool {
    set.binary_search(&p).is_ok()
}

/// The index of an operator pair. Pairs are allocated bottom-up, so a pair
/// nested inside another always has the smaller index.
pub type PairIdx = usize;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpTag {
    Intersection,
    Xor,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pair {
    pub tag: OpTag,
    pub ops: [PosIdx; 2],
}

/// A 256-entry byte class. Classes covering at least half the alphabet are
/// stored flipped with `negative` set.
#[derive(Clone, Eq, PartialEq)]
pub struct ByteClass {
    table: BitSet,
    negative: bool,
}

impl ByteClass {
    pub fn new() -> ByteClass {
        ByteClass {
            table: BitSet::with_capacity(256),
            negative: false,
        }
    }

    pub fn full() -> ByteClass {
        let mut c = ByteClass::new();
        c.insert_range(0, 255);
        c
    }

    pub fn insert(&mut self, b: u8) {
        self.table.insert(b as usize);
    }

    pub fn insert_range(&mut self, lo: u8, hi: u8) {
        for b in lo..=hi {
            self.table.insert(b as usize);
        }
    }

    pub fn matches(&self, b: u8) -> bool {
        self.table.contains(b as usize) != self.negative
    }

    pub fn count(&self) -> usize {
        self.table.len()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    fn flip(&mut self) {
        for b in 0..256 {
            if self.table.contains(b) {
                self.table.remove(b);
            } else {
                self.table.insert(b);
            }
        }
    }

    /// Dense classes are stored as their complement so that the common
    /// "everything but ..." classes stay small.
    pub fn normalize(&mut self) {
        if self.count() >= 128 && !self.negative {
            self.flip();
            self.negative = true;
        }
    }
}

impl Default for ByteClass {
    fn default() -> ByteClass {
        ByteClass::new()
    }
}

impl Debug for ByteClass {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "ByteClass({}{} bytes)",
            if self.negative { "^" } else { "" },
            self.table.len()
        )
    }
}

#[derive(Clone, Debug)]
pub enum PosKind {
    Byte(u8),
    Class(ByteClass),
    Dot { newline: bool },
    BegLine,
    EndLine,
    Eop,
    Op { tag: OpTag, pair: PairIdx, side: usize },
}

impl PosKind {
    pub fn kind_str(&self) -> &'static str {
        match *self {
            PosKind::Byte(_) => "Byte",
            PosKind::Class(_) => "Class",
            PosKind::Dot { .. } => "Dot",
            PosKind::BegLine => "BegLine",
            PosKind::EndLine => "EndLine",
            PosKind::Eop => "Eop",
            PosKind::Op { .. } => "Op",
        }
    }
}

/// One leaf of the annotated expression tree. The `follow` set is wired by
/// `ExprTree::fill_follow` and cleared on every re-wiring.
#[derive(Clone)]
pub struct Position {
    pub kind: PosKind,
    pub follow: PosSet,
    pub non_greedy: bool,
}

impl Position {
    pub fn new(kind: PosKind) -> Position {
        Position {
            kind,
            follow: Vec::new(),
            non_greedy: false,
        }
    }

    /// Whether this position consumes the given input byte. Anchors, the
    /// end-of-pattern sentinel, and operator markers observe the input but
    /// never consume it.
    pub fn matches(&self, b: u8) -> bool {
        match self.kind {
            PosKind::Byte(x) => b == x,
            PosKind::Class(ref c) => c.matches(b),
            PosKind::Dot { newline } => newline || b != b'\n',
            PosKind::BegLine
            | PosKind::EndLine
            | PosKind::Eop
            | PosKind::Op { .. } => false,
        }
    }

    /// A state-expression is any leaf that is not an operator marker.
    pub fn is_state_expr(&self) -> bool {
        !matches!(self.kind, PosKind::Op { .. } | PosKind::Eop)
    }
}

impl Debug for Position {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.kind {
            PosKind::Byte(b) => write!(f, "{:?}", b as char)?,
            PosKind::Class(ref c) => write!(f, "{:?}", c)?,
            PosKind::Dot { newline } => write!(f, ".{}", if newline { "" } else { "-nl" })?,
            PosKind::BegLine => write!(f, "^")?,
            PosKind::EndLine => write!(f, "$")?,
            PosKind::Eop => write!(f, "#")?,
            PosKind::Op { tag, pair, side } => write!(f, "{:?}[{}.{}]", tag, pair, side)?,
        }
        if self.non_greedy {
            write!(f, "?")?;
        }
        write!(f, " -> {:?}", self.follow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_sorted() {
        let mut a = vec![1, 3, 5];
        assert!(merge_into(&mut a, &[2, 3, 7]));
        assert_eq!(a, vec![1, 2, 3, 5, 7]);
        assert!(!merge_into(&mut a, &[2, 5]));
    }

    #[test]
    fn contains_uses_order() {
        assert!(set_contains(&[1, 4, 9], 4));
        assert!(!set_contains(&[1, 4, 9], 5));
        assert!(!set_contains(&[], 5));
    }

    #[test]
    fn full_class_matches_everything() {
        let c = ByteClass::full();
        for b in 0..=255u8 {
            assert!(c.matches(b));
        }
    }

    #[test]
    fn class_normalize_flips_dense() {
        let mut c = ByteClass::new();
        c.insert_range(0, 200);
        assert!(!c.is_negative());
        c.normalize();
        assert!(c.is_negative());
        assert!(c.matches(100));
        assert!(!c.matches(201));
    }

    #[test]
    fn dot_newline_flag() {
        let all = Position::new(PosKind::Dot { newline: true });
        let no_nl = Position::new(PosKind::Dot { newline: false });
        assert!(all.matches(b'\n'));
        assert!(!no_nl.matches(b'\n'));
        assert!(no_nl.matches(b'x'));
    }

    #[test]
    fn anchors_consume_nothing() {
        for b in 0..=255u8 {
            assert!(!Position::new(PosKind::BegLine).matches(b));
            assert!(!Position::new(PosKind::EndLine).matches(b));
            assert!(!Position::new(PosKind::Eop).matches(b));
        }
    }
}
