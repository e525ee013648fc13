//! Optimisation driver.
//!
//! Analyse, inline and (when the session is hybrid) relationalize, to
//! a fixed point bounded at ten passes. A pass whose output equals its
//! input ends the loop, so running the pipeline again after
//! convergence is the identity.

pub mod analyzer;
pub mod inliner;
pub mod relational;

use lachs::Span;

use crate::core::visit::Rewriter;
use crate::core::Decl;
use crate::resolve::error::CompileWarning;
use crate::types::TypeSystem;

const MAX_PASSES: usize = 10;

pub fn optimize(
    ts: &mut TypeSystem,
    decl: Decl,
    hybrid: bool,
    pos: &Span,
    warnings: &mut Vec<CompileWarning>,
) -> Decl {
    let top = analyzer::top_binders(&decl);
    let first_analysis = analyzer::analyze(&decl);
    for (key, info) in &first_analysis.map {
        if info.usage == analyzer::Usage::Dead
            && !top.contains(key)
            && !key.0.starts_with('_')
            && !key.0.ends_with('$')
        {
            warnings.push(CompileWarning::UnusedBinding {
                name: key.0.clone(),
                span: pos.clone(),
            });
        }
    }

    let mut current = decl;
    for _ in 0..MAX_PASSES {
        let analysis = analyzer::analyze(&current);
        let mut next = inliner::inline(&analysis, current.clone());
        if hybrid {
            let mut relationalizer = relational::Relationalizer::of(ts);
            next = relationalizer.rewrite_decl(next);
        }
        if next == current {
            break;
        }
        current = next;
    }
    current
}
