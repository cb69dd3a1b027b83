// Copyright 2015-2016 Joe Neeman.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Builds expression trees from pattern strings, using `regex_syntax` in
//! byte mode as the front end. Only the classical operators are reachable
//! from the surface syntax; intersection, XOR and complement are built
//! against `ExprBuilder` directly.

use crate::error::Error;
use crate::expr::{ByteClass, Expr, ExprBuilder, ExprTree, Flags};
use crate::Result;
use regex_syntax::hir::{Class, Hir, HirKind, Look};
use regex_syntax::ParserBuilder;

pub fn parse(pattern: &str) -> Result<ExprTree> {
    parse_with(pattern, Flags::default())
}

pub fn parse_with(pattern: &str, flags: Flags) -> Result<ExprTree> {
    let hir = ParserBuilder::new()
        .utf8(false)
        .unicode(false)
        .build()
        .parse(pattern)?;
    let mut builder = ExprBuilder::with_flags(flags);
    let root = translate(&hir, &mut builder)?;
    builder.finish(root)
}

fn concat_all(parts: Vec<Expr>, b: &mut ExprBuilder) -> Expr {
    let mut iter = parts.into_iter();
    match iter.next() {
        None => b.epsilon(),
        Some(first) => iter.fold(first, |acc, e| b.concat(acc, e)),
    }
}

fn literal_seq(bytes: &[u8], b: &mut ExprBuilder) -> Expr {
    let mut iter = bytes.iter();
    match iter.next() {
        None => b.epsilon(),
        Some(&first) => {
            let first = b.literal(first);
            iter.fold(first, |acc, &byte| {
                let lit = b.literal(byte);
                b.concat(acc, lit)
            })
        }
    }
}

fn translate(hir: &Hir, b: &mut ExprBuilder) -> Result<Expr> {
    match hir.kind() {
        HirKind::Empty => Ok(b.epsilon()),
        HirKind::Literal(lit) => Ok(literal_seq(&lit.0, b)),
        HirKind::Class(Class::Bytes(cls)) => {
            let mut table = ByteClass::new();
            for range in cls.ranges() {
                table.insert_range(range.start(), range.end());
            }
            table.normalize();
            Ok(b.class(table))
        }
        HirKind::Class(Class::Unicode(_)) => {
            Err(Error::Unsupported("class outside the byte alphabet"))
        }
        HirKind::Look(look) => match look {
            Look::Start | Look::StartLF | Look::StartCRLF => Ok(b.beg_line()),
            Look::End | Look::EndLF | Look::EndCRLF => Ok(b.end_line()),
            _ => Err(Error::Unsupported("look-around assertion")),
        },
        HirKind::Repetition(rep) => {
            let greedy = rep.greedy && !b.flags().non_greedy;
            let mut parts = Vec::new();
            for _ in 0..rep.min {
                parts.push(translate(&rep.sub, b)?);
            }
            match rep.max {
                // `{1,}` keeps its Plus shape instead of desugaring to a·a*.
                None if rep.min == 1 => {
                    let inner = parts.pop().expect("one copy was just pushed");
                    parts.push(b.plus(inner));
                }
                None => {
                    let inner = translate(&rep.sub, b)?;
                    parts.push(b.star(inner, greedy));
                }
                Some(max) => {
                    for _ in rep.min..max {
                        let inner = translate(&rep.sub, b)?;
                        parts.push(b.qmark(inner, greedy));
                    }
                }
            }
            Ok(concat_all(parts, b))
        }
        HirKind::Capture(cap) => translate(&cap.sub, b),
        HirKind::Concat(subs) => {
            let mut parts = Vec::with_capacity(subs.len());
            for sub in subs {
                parts.push(translate(sub, b)?);
            }
            Ok(concat_all(parts, b))
        }
        HirKind::Alternation(subs) => {
            let mut iter = subs.iter();
            let first = iter.next().expect("alternation is never empty");
            let mut acc = translate(first, b)?;
            for sub in iter {
                let e = translate(sub, b)?;
                // Single-byte arms fold into one char class.
                acc = if b.mergeable_as_class(&acc) && b.mergeable_as_class(&e) {
                    b.class_union(acc, e)?
                } else {
                    b.union(acc, e)
                };
            }
            Ok(acc)
        }
    }
}
