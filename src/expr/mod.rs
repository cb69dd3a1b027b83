// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The annotated expression tree.
//!
//! Every consuming leaf of the tree owns a *position* in an arena; the tree
//! computes `nullable`, `min_length`, `max_length` and the `first`/`last`
//! position sets bottom-up as it is built, and a separate pass wires the
//! per-position `follow` sets (forwards or reversed). Subset construction
//! runs entirely over the positions; the tree itself is not consulted again
//! after `fill_follow`.

pub mod position;

use crate::error::Error;
use crate::Result;

pub use self::position::{ByteClass, OpTag, Pair, PairIdx, PosIdx, PosKind, PosSet, Position};
use self::position::merge_into;

/// Stand-in for an unbounded length.
pub const INFINITE: usize = usize::MAX;

#[derive(Clone, Debug)]
enum ExprKind {
    Leaf(PosIdx),
    Epsilon,
    Concat(Box<Expr>, Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Qmark(Box<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    Intersection(Box<Expr>, Box<Expr>),
    Xor(Box<Expr>, Box<Expr>),
    Complement {
        lhs: Box<Expr>,
        master: PosIdx,
        slave: PosIdx,
    },
}

/// A node of the expression tree, carrying the shared annotation header.
#[derive(Clone, Debug)]
pub struct Expr {
    kind: ExprKind,
    nullable: bool,
    min_length: usize,
    max_length: usize,
    first: PosSet,
    last: PosSet,
    non_greedy: bool,
}

impl Expr {
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn first(&self) -> &PosSet {
        &self.first
    }

    pub fn last(&self) -> &PosSet {
        &self.last
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            ExprKind::Leaf(_) => "Leaf",
            ExprKind::Epsilon => "Epsilon",
            ExprKind::Concat(..) => "Concat",
            ExprKind::Union(..) => "Union",
            ExprKind::Qmark(..) => "Qmark",
            ExprKind::Star(..) => "Star",
            ExprKind::Plus(..) => "Plus",
            ExprKind::Intersection(..) => "Intersection",
            ExprKind::Xor(..) => "Xor",
            ExprKind::Complement { .. } => "Complement",
        }
    }
}

/// Flags handed over by the parser (or whoever builds the tree).
#[derive(Clone, Copy, Debug)]
pub struct Flags {
    /// Quantifiers default to their non-greedy variant.
    pub non_greedy: bool,
    /// Whether the complement operator may be constructed.
    pub complement: bool,
    /// Whether `.` consumes `\n`.
    pub dot_newline: bool,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags {
            non_greedy: false,
            complement: true,
            dot_newline: true,
        }
    }
}

/// Allocates positions and assembles expression nodes. All combinators go
/// through the builder so that every leaf ends up in the same arena.
pub struct ExprBuilder {
    positions: Vec<Position>,
    pairs: Vec<Pair>,
    flags: Flags,
}

impl ExprBuilder {
    pub fn new() -> ExprBuilder {
        ExprBuilder::with_flags(Flags::default())
    }

    pub fn with_flags(flags: Flags) -> ExprBuilder {
        ExprBuilder {
            positions: Vec::new(),
            pairs: Vec::new(),
            flags,
        }
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    fn add_position(&mut self, kind: PosKind) -> PosIdx {
        self.positions.push(Position::new(kind));
        self.positions.len() - 1
    }

    fn new_pair(&mut self, tag: OpTag) -> (PosIdx, PosIdx) {
        let pair = self.pairs.len();
        let o1 = self.add_position(PosKind::Op { tag, pair, side: 0 });
        let o2 = self.add_position(PosKind::Op { tag, pair, side: 1 });
        self.pairs.push(Pair { tag, ops: [o1, o2] });
        (o1, o2)
    }

    fn consuming_leaf(&mut self, kind: PosKind) -> Expr {
        let idx = self.add_position(kind);
        Expr {
            kind: ExprKind::Leaf(idx),
            nullable: false,
            min_length: 1,
            max_length: 1,
            first: vec![idx],
            last: vec![idx],
            non_greedy: false,
        }
    }

    fn anchor_leaf(&mut self, kind: PosKind) -> Expr {
        let idx = self.add_position(kind);
        Expr {
            kind: ExprKind::Leaf(idx),
            nullable: true,
            min_length: 0,
            max_length: 1,
            first: vec![idx],
            last: vec![idx],
            non_greedy: false,
        }
    }

    // A zero-width leaf wrapping an already-allocated position (operator
    // markers and the end-of-pattern sentinel).
    fn marker_leaf(idx: PosIdx) -> Expr {
        Expr {
            kind: ExprKind::Leaf(idx),
            nullable: false,
            min_length: 0,
            max_length: 0,
            first: vec![idx],
            last: vec![idx],
            non_greedy: false,
        }
    }

    pub fn literal(&mut self, b: u8) -> Expr {
        self.consuming_leaf(PosKind::Byte(b))
    }

    pub fn class(&mut self, c: ByteClass) -> Expr {
        self.consuming_leaf(PosKind::Class(c))
    }

    pub fn dot(&mut self) -> Expr {
        let newline = self.flags.dot_newline;
        self.consuming_leaf(PosKind::Dot { newline })
    }

    /// `.` that always consumes `\n`; used for the `Σ*` arm of complement.
    fn any_byte(&mut self) -> Expr {
        self.consuming_leaf(PosKind::Dot { newline: true })
    }

    pub fn beg_line(&mut self) -> Expr {
        self.anchor_leaf(PosKind::BegLine)
    }

    pub fn end_line(&mut self) -> Expr {
        self.anchor_leaf(PosKind::EndLine)
    }

    pub fn epsilon(&mut self) -> Expr {
        Expr {
            kind: ExprKind::Epsilon,
            nullable: true,
            min_length: 0,
            max_length: 0,
            first: Vec::new(),
            last: Vec::new(),
            non_greedy: false,
        }
    }

    pub fn concat(&mut self, l: Expr, r: Expr) -> Expr {
        let mut first = l.first.clone();
        if l.nullable {
            merge_into(&mut first, &r.first);
        }
        let mut last = r.last.clone();
        if r.nullable {
            merge_into(&mut last, &l.last);
        }
        Expr {
            nullable: l.nullable && r.nullable,
            min_length: l.min_length.saturating_add(r.min_length),
            max_length: l.max_length.saturating_add(r.max_length),
            first,
            last,
            non_greedy: false,
            kind: ExprKind::Concat(Box::new(l), Box::new(r)),
        }
    }

    pub fn union(&mut self, l: Expr, r: Expr) -> Expr {
        let mut first = l.first.clone();
        merge_into(&mut first, &r.first);
        let mut last = l.last.clone();
        merge_into(&mut last, &r.last);
        Expr {
            nullable: l.nullable || r.nullable,
            min_length: l.min_length.min(r.min_length),
            max_length: l.max_length.max(r.max_length),
            first,
            last,
            non_greedy: false,
            kind: ExprKind::Union(Box::new(l), Box::new(r)),
        }
    }

    pub fn qmark(&mut self, e: Expr, greedy: bool) -> Expr {
        Expr {
            nullable: true,
            min_length: 0,
            // Kept as the original engine computes it.
            max_length: e.min_length,
            first: e.first.clone(),
            last: e.last.clone(),
            non_greedy: !greedy,
            kind: ExprKind::Qmark(Box::new(e)),
        }
    }

    pub fn star(&mut self, e: Expr, greedy: bool) -> Expr {
        Expr {
            nullable: true,
            min_length: 0,
            max_length: INFINITE,
            first: e.first.clone(),
            last: e.last.clone(),
            non_greedy: !greedy,
            kind: ExprKind::Star(Box::new(e)),
        }
    }

    pub fn plus(&mut self, e: Expr) -> Expr {
        Expr {
            nullable: e.nullable,
            min_length: e.min_length,
            max_length: INFINITE,
            first: e.first.clone(),
            last: e.last.clone(),
            non_greedy: false,
            kind: ExprKind::Plus(Box::new(e)),
        }
    }

    /// Matches strings in both languages. Each side is terminated by one half
    /// of a fresh operator pair; subset construction only lets the pair's
    /// continuation fire when both halves are reachable at once.
    pub fn intersection(&mut self, l: Expr, r: Expr) -> Expr {
        let nullable = l.nullable && r.nullable;
        let min_length = l.min_length.max(r.min_length);
        let max_length = l.max_length.min(r.max_length);
        let (o1, o2) = self.new_pair(OpTag::Intersection);
        let m1 = Self::marker_leaf(o1);
        let m2 = Self::marker_leaf(o2);
        let lw = self.concat(l, m1);
        let rw = self.concat(r, m2);
        let mut first = lw.first.clone();
        merge_into(&mut first, &rw.first);
        let mut last = lw.last.clone();
        merge_into(&mut last, &rw.last);
        Expr {
            nullable,
            min_length,
            max_length,
            first,
            last,
            non_greedy: false,
            kind: ExprKind::Intersection(Box::new(lw), Box::new(rw)),
        }
    }

    /// Matches strings in exactly one of the two languages.
    pub fn xor(&mut self, l: Expr, r: Expr) -> Expr {
        let nullable = l.nullable != r.nullable;
        let min_length = l.min_length.min(r.min_length);
        let (o1, o2) = self.new_pair(OpTag::Xor);
        let m1 = Self::marker_leaf(o1);
        let m2 = Self::marker_leaf(o2);
        let lw = self.concat(l, m1);
        let rw = self.concat(r, m2);
        let mut first = lw.first.clone();
        merge_into(&mut first, &rw.first);
        let mut last = lw.last.clone();
        merge_into(&mut last, &rw.last);
        Expr {
            nullable,
            min_length,
            max_length: INFINITE,
            first,
            last,
            non_greedy: false,
            kind: ExprKind::Xor(Box::new(lw), Box::new(rw)),
        }
    }

    /// Matches strings not in the language: `XOR(e, Σ*)`. The `Σ*` arm ends
    /// in the slave marker, which is always reachable, so exactly-one
    /// reconciliation leaves the slave live precisely when `e` failed.
    pub fn complement(&mut self, e: Expr) -> Result<Expr> {
        if !self.flags.complement {
            return Err(Error::Unsupported("complement operator"));
        }
        let nullable = !e.nullable;
        let min_length = if e.nullable { INFINITE } else { 0 };
        let (master, slave) = self.new_pair(OpTag::Xor);
        let m = Self::marker_leaf(master);
        let lhs = self.concat(e, m);
        let any = self.any_byte();
        let sigma = self.star(any, true);
        let s = Self::marker_leaf(slave);
        let rhs = self.concat(sigma, s);
        let u = self.union(rhs, lhs);
        let first = u.first.clone();
        let last = u.last.clone();
        Ok(Expr {
            nullable,
            min_length,
            max_length: INFINITE,
            first,
            last,
            non_greedy: false,
            kind: ExprKind::Complement {
                lhs: Box::new(u),
                master,
                slave,
            },
        })
    }

    /// True if `e` is a leaf that `class_union` can fold without changing
    /// the language (anchors fold to `\n`, which is not equivalent here).
    pub fn mergeable_as_class(&self, e: &Expr) -> bool {
        match e.kind {
            ExprKind::Leaf(idx) => matches!(
                self.positions[idx].kind,
                PosKind::Byte(_) | PosKind::Class(_) | PosKind::Dot { .. }
            ),
            _ => false,
        }
    }

    /// Synthesizes a single char class from two existing leaves, as when a
    /// parser folds `a|b` or the arms of a bracket expression.
    pub fn class_union(&mut self, a: Expr, b: Expr) -> Result<Expr> {
        let mut table = ByteClass::new();
        for e in [&a, &b] {
            let idx = match e.kind {
                ExprKind::Leaf(idx) => idx,
                _ => return Err(Error::InvalidExprKind(e.kind_str())),
            };
            match self.positions[idx].kind {
                PosKind::Byte(x) => table.insert(x),
                PosKind::Class(ref c) => {
                    for byte in 0..=255u8 {
                        if c.matches(byte) {
                            table.insert(byte);
                        }
                    }
                }
                PosKind::Dot { newline } => {
                    for byte in 0..=255u8 {
                        if newline || byte != b'\n' {
                            table.insert(byte);
                        }
                    }
                }
                PosKind::BegLine | PosKind::EndLine => table.insert(b'\n'),
                ref k @ (PosKind::Eop | PosKind::Op { .. }) => {
                    return Err(Error::InvalidExprKind(k.kind_str()))
                }
            }
        }
        table.normalize();
        Ok(self.class(table))
    }

    /// Freezes the arena, appends the end-of-pattern sentinel and hands the
    /// whole thing over as an `ExprTree`.
    pub fn finish(mut self, root: Expr) -> Result<ExprTree> {
        if !self.positions.iter().any(Position::is_state_expr) {
            return Err(Error::NoPositions);
        }
        let nullable = root.nullable;
        let min_length = root.min_length;
        let max_length = root.max_length;
        let eop = self.add_position(PosKind::Eop);
        let sentinel = Self::marker_leaf(eop);
        let root = self.concat(root, sentinel);
        Ok(ExprTree {
            positions: self.positions,
            pairs: self.pairs,
            root,
            eop,
            nullable,
            min_length,
            max_length,
        })
    }
}

impl Default for ExprBuilder {
    fn default() -> ExprBuilder {
        ExprBuilder::new()
    }
}

/// A finished expression tree: the position arena plus the root (already
/// terminated by the `Eop` sentinel). The follow sets can be re-wired in
/// either direction, so one tree can feed both a forward and a reversed
/// automaton.
#[derive(Debug)]
pub struct ExprTree {
    positions: Vec<Position>,
    pairs: Vec<Pair>,
    root: Expr,
    eop: PosIdx,
    nullable: bool,
    min_length: usize,
    max_length: usize,
}

impl ExprTree {
    /// (Re-)wires every position's `follow` set. With `reverse` set the
    /// edges point from each position to its predecessors instead, which is
    /// what the reversed automaton is built from.
    pub fn fill_follow(&mut self, reverse: bool) {
        for p in &mut self.positions {
            p.follow.clear();
            p.non_greedy = false;
        }
        fill_expr(&self.root, &mut self.positions, reverse);
        if reverse {
            // Under reversed wiring the sentinel doubles as the
            // begin-of-pattern witness: consuming a `first` position is what
            // completes the reversed match.
            let first = self.root.first.clone();
            for &p in &first {
                if p != self.eop {
                    merge_into(&mut self.positions[p].follow, &[self.eop]);
                }
            }
        }
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, idx: PosIdx) -> &Position {
        &self.positions[idx]
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn eop(&self) -> PosIdx {
        self.eop
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The position set the automaton starts from. Acceptance is uniform in
    /// both directions: a state accepts when it holds the sentinel.
    pub fn initial_positions(&self, reverse: bool) -> PosSet {
        if !reverse {
            self.root.first.clone()
        } else {
            // Under reversed wiring the sentinel's follow set is exactly
            // `last(root)`. The sentinel itself is added back for the
            // empty-input case.
            let mut init = self.positions[self.eop].follow.clone();
            if self.nullable {
                merge_into(&mut init, &[self.eop]);
            }
            init
        }
    }
}

fn connect(arena: &mut [Position], src: &PosSet, dst: &PosSet, reverse: bool) {
    if reverse {
        for &d in dst {
            merge_into(&mut arena[d].follow, src);
        }
    } else {
        for &s in src {
            merge_into(&mut arena[s].follow, dst);
        }
    }
}

fn fill_expr(e: &Expr, arena: &mut Vec<Position>, reverse: bool) {
    match e.kind {
        ExprKind::Leaf(_) | ExprKind::Epsilon => {}
        ExprKind::Concat(ref l, ref r) => {
            connect(arena, &l.last, &r.first, reverse);
            fill_expr(r, arena, reverse);
            fill_expr(l, arena, reverse);
        }
        ExprKind::Union(ref l, ref r)
        | ExprKind::Intersection(ref l, ref r)
        | ExprKind::Xor(ref l, ref r) => {
            fill_expr(r, arena, reverse);
            fill_expr(l, arena, reverse);
        }
        ExprKind::Qmark(ref l) => {
            fill_expr(l, arena, reverse);
            if e.non_greedy {
                non_greedify(arena, &e.last);
            }
        }
        ExprKind::Star(ref l) => {
            connect(arena, &l.last, &l.first, reverse);
            fill_expr(l, arena, reverse);
            if e.non_greedy {
                non_greedify(arena, &e.last);
            }
        }
        ExprKind::Plus(ref l) => {
            connect(arena, &l.last, &l.first, reverse);
            fill_expr(l, arena, reverse);
        }
        ExprKind::Complement {
            ref lhs,
            master,
            slave,
        } => {
            fill_expr(lhs, arena, reverse);
            // The slave marker goes wherever its master would.
            let follow = arena[master].follow.clone();
            arena[slave].follow = follow;
        }
    }
}

// The priority annotation that stands in for non-greedy twin positions: an
// accepting state entered through a flagged position prefers to stop.
fn non_greedify(arena: &mut [Position], last: &PosSet) {
    for &q in last {
        arena[q].non_greedy = true;
    }
}
