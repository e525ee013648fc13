//! Match compilation: decision trees and coverage analysis.
//!
//! A classic matrix algorithm: normalise rows by decomposing
//! irrefutable structure, pick the leftmost refinable column of the
//! first row, split rows by head constructor, recurse. The output tree
//! drives both the coverage verdict (exhaustive? redundant rows?) and
//! the nested switch the compiler emits.

use crate::ast::Literal;
use crate::core::{Id, Pat};
use crate::eval::code::{Access, AccessStep, Test};
use crate::types::TypeSystem;

/// Decision tree over resolver-level identifiers; the compiler later
/// maps binders to frame slots.
#[derive(Debug, Clone)]
pub enum Tree {
    Leaf {
        arm: usize,
        binds: Vec<(Id, Access)>,
    },
    Fail,
    Test {
        access: Access,
        cases: Vec<(Test, Tree)>,
        default: Box<Tree>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub exhaustive: bool,
    /// Arms no input can ever reach, in arm order.
    pub redundant_arms: Vec<usize>,
}

#[derive(Clone)]
struct Row {
    /// Outstanding refutable constraints, keyed by access path.
    tests: Vec<(Access, Pat)>,
    binds: Vec<(Id, Access)>,
    arm: usize,
}

pub fn compile(pats: &[Pat], ts: &TypeSystem) -> (Tree, Coverage) {
    let mut rows = Vec::with_capacity(pats.len());
    for (arm, pat) in pats.iter().enumerate() {
        let mut row = Row {
            tests: vec![(Access::root(), pat.clone())],
            binds: Vec::new(),
            arm,
        };
        normalize(&mut row);
        rows.push(row);
    }
    let mut builder = Builder {
        ts,
        reachable_fail: false,
    };
    let tree = builder.build(rows);
    let mut used = Vec::new();
    collect_used(&tree, &mut used);
    let redundant_arms = (0..pats.len()).filter(|arm| !used.contains(arm)).collect();
    (
        tree,
        Coverage {
            exhaustive: !builder.reachable_fail,
            redundant_arms,
        },
    )
}

/// Decompose irrefutable structure, leaving only refutable tests.
fn normalize(row: &mut Row) {
    let mut pending = std::mem::take(&mut row.tests);
    while let Some((access, pat)) = pending.pop() {
        match pat {
            Pat::Wildcard(_) => {}
            Pat::Literal {
                value: Literal::Unit,
                ..
            } => {}
            Pat::Id(id) => row.binds.push((id, access)),
            Pat::Layered { id, pat, .. } => {
                row.binds.push((id, access.clone()));
                pending.push((access, *pat));
            }
            Pat::Tuple { items, .. } => {
                for (i, item) in items.into_iter().enumerate() {
                    pending.push((access.then(AccessStep::TupleIdx(i)), item));
                }
            }
            Pat::Record { fields, .. } => {
                for (i, (_, field)) in fields.into_iter().enumerate() {
                    pending.push((access.then(AccessStep::Field(i)), field));
                }
            }
            refutable => row.tests.push((access, refutable)),
        }
    }
}

fn collect_used(tree: &Tree, used: &mut Vec<usize>) {
    match tree {
        Tree::Leaf { arm, .. } => {
            if !used.contains(arm) {
                used.push(*arm);
            }
        }
        Tree::Fail => {}
        Tree::Test { cases, default, .. } => {
            for (_, t) in cases {
                collect_used(t, used);
            }
            collect_used(default, used);
        }
    }
}

struct Builder<'a> {
    ts: &'a TypeSystem,
    reachable_fail: bool,
}

impl Builder<'_> {
    fn build(&mut self, rows: Vec<Row>) -> Tree {
        let Some(first) = rows.first() else {
            self.reachable_fail = true;
            return Tree::Fail;
        };
        let Some((access, _)) = first.tests.first().cloned() else {
            return Tree::Leaf {
                arm: first.arm,
                binds: first.binds.clone(),
            };
        };

        // Head constructors constraining this column, in row order.
        let mut seen: Vec<Test> = Vec::new();
        for row in &rows {
            if let Some((_, pat)) = row.tests.iter().find(|(a, _)| *a == access) {
                let test = head_test(pat);
                if !seen.iter().any(|t| t == &test) {
                    seen.push(test);
                }
            }
        }

        let space = self.space_size(&rows, &access);
        let covered_all = space.map(|n| seen.len() == n).unwrap_or(false);

        let mut cases = Vec::with_capacity(seen.len());
        for test in &seen {
            let specialized: Vec<Row> = rows
                .iter()
                .filter_map(|row| specialize(row, &access, test))
                .collect();
            cases.push((test.clone(), self.build(specialized)));
        }

        let default_rows: Vec<Row> = rows
            .iter()
            .filter(|row| !row.tests.iter().any(|(a, _)| *a == access))
            .cloned()
            .collect();
        let default = if covered_all {
            // Unreachable; no input falls through a complete split.
            Box::new(Tree::Fail)
        } else {
            Box::new(self.build(default_rows))
        };

        Tree::Test {
            access,
            cases,
            default,
        }
    }

    /// Number of head constructors of the column's type, when finite.
    fn space_size(&self, rows: &[Row], access: &Access) -> Option<usize> {
        for row in rows {
            if let Some((_, pat)) = row.tests.iter().find(|(a, _)| a == access) {
                return match pat {
                    Pat::Literal {
                        value: Literal::Bool(_),
                        ..
                    } => Some(2),
                    Pat::Literal { .. } => None,
                    Pat::Nil(_) | Pat::Cons { .. } => Some(2),
                    Pat::Ctor { datatype, .. } => {
                        if datatype == "exn" {
                            None
                        } else {
                            self.ts.lookup_datatype(datatype).map(|d| d.ctors.len())
                        }
                    }
                    _ => None,
                };
            }
        }
        None
    }
}

fn head_test(pat: &Pat) -> Test {
    match pat {
        Pat::Literal { value, .. } => match value {
            Literal::Int(i) => Test::Int(*i),
            Literal::Real(x) => Test::Real(*x),
            Literal::Bool(b) => Test::Bool(*b),
            Literal::Char(c) => Test::Char(*c),
            Literal::String(s) => Test::Str(s.clone()),
            Literal::Unit => Test::Bool(true), // unreachable; unit is irrefutable
        },
        Pat::Ctor { name, ordinal, .. } => Test::Ctor {
            name: name.clone(),
            ordinal: *ordinal,
        },
        Pat::Nil(_) => Test::Nil,
        Pat::Cons { .. } => Test::ConsCell,
        _ => Test::Bool(true), // unreachable; normalize removed these
    }
}

/// Restrict a row to the subspace where `access` has head `test`.
/// `None` drops the row from that branch.
fn specialize(row: &Row, access: &Access, test: &Test) -> Option<Row> {
    let position = row.tests.iter().position(|(a, _)| a == access);
    let Some(position) = position else {
        // The row does not constrain this column; it survives as-is.
        return Some(row.clone());
    };
    let mut out = row.clone();
    let (_, pat) = out.tests.remove(position);
    match (&pat, test) {
        (Pat::Ctor { ordinal, arg, .. }, Test::Ctor { ordinal: o, .. }) if ordinal == o => {
            if let Some(arg) = arg {
                out.tests
                    .push((access.then(AccessStep::CtorArg), (**arg).clone()));
            }
        }
        (Pat::Cons { head, tail, .. }, Test::ConsCell) => {
            out.tests
                .push((access.then(AccessStep::Head), (**head).clone()));
            out.tests
                .push((access.then(AccessStep::Tail), (**tail).clone()));
        }
        (Pat::Nil(_), Test::Nil) => {}
        (Pat::Literal { value, .. }, _) => {
            if &head_test(&Pat::Literal {
                value: value.clone(),
                ty: pat.ty(),
            }) != test
            {
                return None;
            }
        }
        _ => return None,
    }
    normalize(&mut out);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ty::{PrimitiveType, Type, TypeKind};

    fn int_ty() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Int))
    }

    fn bool_ty() -> Type {
        Type::new(TypeKind::Prim(PrimitiveType::Bool))
    }

    fn id(name: &str, ord: usize, ty: Type) -> Pat {
        Pat::Id(Id {
            name: name.to_string(),
            ord,
            ty,
        })
    }

    fn int_lit(i: i64) -> Pat {
        Pat::Literal {
            value: Literal::Int(i),
            ty: int_ty(),
        }
    }

    fn bool_lit(b: bool) -> Pat {
        Pat::Literal {
            value: Literal::Bool(b),
            ty: bool_ty(),
        }
    }

    #[test]
    fn single_var_row_is_exhaustive() {
        let ts = TypeSystem::new();
        let (tree, coverage) = compile(&[id("x", 0, int_ty())], &ts);
        assert!(coverage.exhaustive);
        assert!(coverage.redundant_arms.is_empty());
        assert!(matches!(tree, Tree::Leaf { arm: 0, .. }));
    }

    #[test]
    fn int_literals_without_default_are_nonexhaustive() {
        let ts = TypeSystem::new();
        let (_, coverage) = compile(&[int_lit(0), int_lit(1)], &ts);
        assert!(!coverage.exhaustive);
    }

    #[test]
    fn int_literals_with_catchall_are_exhaustive() {
        let ts = TypeSystem::new();
        let (_, coverage) = compile(&[int_lit(0), id("n", 0, int_ty())], &ts);
        assert!(coverage.exhaustive);
        assert!(coverage.redundant_arms.is_empty());
    }

    #[test]
    fn both_bools_are_exhaustive() {
        let ts = TypeSystem::new();
        let (_, coverage) = compile(&[bool_lit(true), bool_lit(false)], &ts);
        assert!(coverage.exhaustive);
    }

    #[test]
    fn shadowed_row_is_redundant() {
        let ts = TypeSystem::new();
        let (_, coverage) = compile(&[id("x", 0, int_ty()), int_lit(1)], &ts);
        assert_eq!(coverage.redundant_arms, vec![1]);
    }

    #[test]
    fn duplicate_literal_row_is_redundant() {
        let ts = TypeSystem::new();
        let (_, coverage) = compile(&[int_lit(1), int_lit(1), id("x", 0, int_ty())], &ts);
        assert_eq!(coverage.redundant_arms, vec![1]);
    }

    #[test]
    fn option_split_is_exhaustive() {
        let ts = TypeSystem::new();
        let opt_int = Type::new(TypeKind::Data {
            name: "option".to_string(),
            args: vec![int_ty()],
        });
        let none = Pat::Ctor {
            name: "NONE".to_string(),
            ordinal: 0,
            datatype: "option".to_string(),
            arg: None,
            ty: opt_int.clone(),
        };
        let some = Pat::Ctor {
            name: "SOME".to_string(),
            ordinal: 1,
            datatype: "option".to_string(),
            arg: Some(Box::new(id("x", 0, int_ty()))),
            ty: opt_int,
        };
        let (_, coverage) = compile(&[none.clone(), some], &ts);
        assert!(coverage.exhaustive);

        let (_, partial) = compile(&[none], &ts);
        assert!(!partial.exhaustive);
    }

    #[test]
    fn cons_and_nil_cover_lists() {
        let ts = TypeSystem::new();
        let list_int = Type::new(TypeKind::List(int_ty()));
        let nil = Pat::Nil(list_int.clone());
        let cons = Pat::Cons {
            head: Box::new(id("x", 0, int_ty())),
            tail: Box::new(id("xs", 1, list_int.clone())),
            ty: list_int,
        };
        let (_, coverage) = compile(&[nil, cons], &ts);
        assert!(coverage.exhaustive);
    }

    #[test]
    fn tuple_structure_is_decomposed() {
        let ts = TypeSystem::new();
        let pair = Type::new(TypeKind::Tuple(vec![int_ty(), int_ty()]));
        let pat = Pat::Tuple {
            items: vec![int_lit(0), id("y", 0, int_ty())],
            ty: pair.clone(),
        };
        let catchall = Pat::Wildcard(pair);
        let (_, coverage) = compile(&[pat, catchall], &ts);
        assert!(coverage.exhaustive);
        assert!(coverage.redundant_arms.is_empty());
    }
}
