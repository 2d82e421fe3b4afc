//! The realizability oracle (§4.5): composes the lexer, the parser-derivative fold, `image`, a
//! user pruner, and `is_nonempty` into the single decision `realizable(prefix, final)`.
//!
//! Grounded in the teacher's top-level `Parser` struct (`src/lib.rs`, the entry point wiring
//! lexer + grammar together) generalized from "produce a concrete syntax tree" to "decide whether
//! any continuation of this prefix can still reach a pruner-surviving tree".

use std::rc::Rc;

use tracing::{info, instrument};

use crate::error::OracleError;
use crate::grammar::{is_nonempty, TreeGrammar};
use crate::lexer::{Lexer, LexerSpec};
use crate::parser::{d, delta, image, Parser};
use crate::rewrite::{RewriteStore, Variable};

/// A user-supplied semantic pruner (§4.5 "Construction", §6 "Pruner interface"): a total,
/// sound-but-not-necessarily-complete function on tree grammars, registered with the rewrite
/// runtime like any other declared `Variable` so its output can itself be cyclic.
pub type Pruner = Rc<dyn Fn(&mut RewriteStore, Rc<TreeGrammar>) -> Rc<TreeGrammar>>;

/// Ties a lexer, an entry parser, and a pruner together behind one `realizable` call (§4.5,
/// §6 "Oracle API"). Owns the `RewriteStore` the whole pipeline shares; `clear()` resets it
/// between logically independent problems (§5).
pub struct Oracle {
    store: RewriteStore,
    lexer: Lexer,
    start: Rc<Parser>,
    pruner: Pruner,
}

impl Oracle {
    /// `start_parser`'s `Variable`s were declared against whatever `RewriteStore` built it (e.g.
    /// `GrammarBuilder::build`) — `store` must be that same store, not a fresh one, or every
    /// lookup through it panics with "does not name a ... equation". Take ownership of it rather
    /// than default-constructing one, so the one store backing the grammar is the one `d`/`delta`/
    /// `image`/the pruner all resolve `Variable`s against for the rest of this oracle's life.
    pub fn new(store: RewriteStore, pruner: Pruner, start_parser: Rc<Parser>, lexer_spec: LexerSpec) -> Self {
        Self {
            store,
            lexer: Lexer::new(lexer_spec),
            start: start_parser,
            pruner,
        }
    }

    /// Drops the rewrite store's equations/cache and the lexer's prefix cache (§5 "Memoization /
    /// cache lifetime"): call between unrelated realizability problems, skip it while growing one
    /// prefix incrementally so derivative variables keep being shared.
    pub fn clear(&mut self) {
        self.store.clear();
        self.lexer.reset();
    }

    /// `realizable(prefix, final)` (§4.5): the oracle's one decision procedure.
    ///
    /// 1. Lex `prefix` — every candidate tokenization if `!final`, only finalized ones if `final`.
    /// 2. Fold each candidate lex through `D` against the entry parser.
    /// 3. `Choice.of` the per-lex residuals; if `final`, reduce by `delta` (nullability).
    /// 4. `image` the residual, apply the pruner, and test `is_nonempty` on the pruned result.
    #[instrument(skip(self), fields(prefix_len = prefix.len(), is_final = r#final))]
    pub fn realizable(&mut self, prefix: &str, r#final: bool) -> bool {
        let lexes = if r#final {
            self.lexer.lex(prefix)
        } else {
            self.lexer.partial_lex(prefix)
        };
        info!(candidate_lexes = lexes.len(), "lexed prefix");

        let residuals = lexes.into_iter().map(|lex| {
            lex.into_iter()
                .fold(self.start.clone(), |p, token| d(&mut self.store, &token, &p))
        });
        let mut residual = Parser::choice(residuals);
        if r#final {
            residual = delta(&mut self.store, &residual);
        }

        let shape = image(&mut self.store, &residual);
        let pruned = (self.pruner)(&mut self.store, shape);
        let result = is_nonempty(&self.store, &pruned);
        info!(realizable = result, "decided");
        result
    }
}

/// An identity pruner (§8 scenario 1, 6): keeps every tree unchanged. The baseline pruner for
/// grammars with no semantic constraint.
pub fn identity_pruner() -> Pruner {
    Rc::new(|_store: &mut RewriteStore, shape: Rc<TreeGrammar>| shape)
}

/// Declares a pruner function as a rewritten `Variable` (§4.1, §6 "Pruner interface"), so a pruner
/// that recurses into an already-declared grammar `Variable` terminates via the same Kildall
/// machinery as grammar nonterminals, rather than by direct recursion.
pub fn declare_pruned(
    store: &mut RewriteStore,
    pruner: &Pruner,
    input: Rc<TreeGrammar>,
) -> Result<Variable, OracleError> {
    let v = store.declare_tree();
    let output = pruner(store, input);
    store.define_tree(v, output)?;
    Ok(v)
}
