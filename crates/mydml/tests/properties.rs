//! Property tests for placeholder/argument isomorphism, deferred backfill
//! ordering, build idempotence and string escaping.

use mydml::{
    Argument, Arguments, ArgumentAssembler, Condition, DmlError, DmlResult, SqlQb, StmtPart,
    column, count_placeholders, escape_string, interpolate, qb, render,
};
use proptest::prelude::*;
use std::collections::HashMap;

/// Shape of one WHERE condition.
#[derive(Debug, Clone)]
enum Piece {
    Direct,
    Deferred,
    List(usize),
    Between,
    IsNull,
    Sub { direct: usize, deferred: bool },
}

fn arb_piece() -> BoxedStrategy<Piece> {
    prop_oneof![
        Just(Piece::Direct),
        Just(Piece::Deferred),
        (1usize..5).prop_map(Piece::List),
        Just(Piece::Between),
        Just(Piece::IsNull),
        (0usize..3, any::<bool>()).prop_map(|(direct, deferred)| Piece::Sub { direct, deferred }),
    ]
    .boxed()
}

/// Supplies deferred values by column name.
#[derive(Debug, Default)]
struct Lookup(HashMap<String, i64>);

impl ArgumentAssembler for Lookup {
    fn assemble_arguments(
        &self,
        _part: StmtPart,
        mut args: Arguments,
        columns: &[String],
    ) -> DmlResult<Arguments> {
        for c in columns {
            let v = self
                .0
                .get(c)
                .ok_or_else(|| DmlError::not_supported(format!("no value for {c}")))?;
            args.push(*v);
        }
        Ok(args)
    }
}

/// Conditions whose values, in placeholder order, are 1000, 1001, ...
struct Fixture {
    conds: Vec<Condition>,
    record: Lookup,
    expected: Vec<i64>,
}

fn fixture(pieces: &[Piece]) -> Fixture {
    let mut next = 1000;
    let mut take = || {
        next += 1;
        next - 1
    };
    let mut record = Lookup::default();
    let mut expected = Vec::new();
    let mut conds = Vec::new();

    for (i, piece) in pieces.iter().enumerate() {
        let name = format!("c{i}");
        let cond = match piece {
            Piece::Direct => {
                let v = take();
                expected.push(v);
                column(name).int(v)
            }
            Piece::Deferred => {
                let v = take();
                expected.push(v);
                record.0.insert(name.clone(), v);
                column(name).placeholder()
            }
            Piece::List(n) => {
                let vs: Vec<i64> = (0..*n).map(|_| take()).collect();
                expected.extend(&vs);
                column(name).in_().ints(vs)
            }
            Piece::Between => {
                let (a, b) = (take(), take());
                expected.extend([a, b]);
                column(name).between().ints([a, b])
            }
            Piece::IsNull => column(name).arg(Argument::Null),
            Piece::Sub { direct, deferred } => {
                let mut sub = qb::select("s").select_cols(&["id"]);
                for j in 0..*direct {
                    let v = take();
                    expected.push(v);
                    sub = sub.where_(column(format!("s{i}_{j}")).int(v));
                }
                if *deferred {
                    let v = take();
                    expected.push(v);
                    let key = format!("s{i}_d");
                    record.0.insert(key.clone(), v);
                    sub = sub.where_(column(key).placeholder());
                }
                column(name).in_().sub(sub)
            }
        };
        conds.push(cond);
    }
    Fixture {
        conds,
        record,
        expected,
    }
}

fn as_ints(args: &[Argument]) -> Vec<i64> {
    args.iter()
        .filter_map(|a| match a {
            Argument::Int(v) => Some(*v),
            _ => None,
        })
        .collect()
}

/// Integer literals of at least four digits, in text order.
fn literals(sql: &str) -> Vec<i64> {
    sql.split(|c: char| !c.is_ascii_digit())
        .filter(|t| t.len() >= 4)
        .filter_map(|t| t.parse().ok())
        .collect()
}

fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('\0'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('Z') => out.push('\x1a'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

proptest! {
    #[test]
    fn placeholders_match_bound_values(pieces in prop::collection::vec(arb_piece(), 1..8)) {
        let f = fixture(&pieces);
        let sel = qb::select("t").where_all(f.conds.clone());
        let sql = sel.build_sql().unwrap();
        let args = sel.build_args(Some(&f.record)).unwrap();
        prop_assert_eq!(count_placeholders(&sql), args.flatten().unwrap().len());

        let del = qb::delete("t").where_all(f.conds);
        let sql = del.build_sql().unwrap();
        let args = del.build_args(Some(&f.record)).unwrap();
        prop_assert_eq!(count_placeholders(&sql), args.flatten().unwrap().len());
    }

    #[test]
    fn deferred_values_land_in_placeholder_order(pieces in prop::collection::vec(arb_piece(), 1..8)) {
        let f = fixture(&pieces);
        let upd = qb::update("t").set("flag", 1).where_all(f.conds);
        let sql = upd.build_sql().unwrap();
        let args = upd.build_args(Some(&f.record)).unwrap();
        prop_assert!(!args.has_pending());

        let flat = args.flatten().unwrap();
        prop_assert_eq!(&as_ints(&flat[1..]), &f.expected);

        let rendered = render(&sql, &args).unwrap();
        prop_assert_eq!(literals(&rendered), f.expected);
    }

    #[test]
    fn building_twice_is_identical(pieces in prop::collection::vec(arb_piece(), 1..8)) {
        let f = fixture(&pieces);
        let sel = qb::select("t")
            .where_all(f.conds)
            .order_by("c0")
            .use_build_cache();
        prop_assert_eq!(sel.build_sql().unwrap(), sel.build_sql().unwrap());
        prop_assert_eq!(
            sel.build_args(Some(&f.record)).unwrap(),
            sel.build_args(Some(&f.record)).unwrap()
        );
        prop_assert_eq!(sel.to_sql().unwrap(), sel.to_sql().unwrap());
    }

    #[test]
    fn between_needs_two_values(n in 0usize..6) {
        prop_assume!(n != 2);
        let vs: Vec<i64> = (0..n as i64).collect();
        let res = qb::select("t").where_(column("a").between().ints(vs)).to_sql();
        prop_assert!(res.unwrap_err().is_mismatch());
    }

    #[test]
    fn escaped_strings_round_trip(s in "\\PC*|[\\\\'\"\\x00\\n\\r\\x1a%_]*") {
        let mut lit = String::new();
        escape_string(&mut lit, &s);
        prop_assert_eq!(unescape(&lit), s.clone());

        let sql = interpolate("SELECT ?").str(s).to_sql().unwrap();
        prop_assert_eq!(sql, format!("SELECT {lit}"));
    }
}
