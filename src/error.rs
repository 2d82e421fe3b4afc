//! Error taxonomy (§7). Grammar loading fails fast on malformed input (caller data, never a
//! panic); a rewrite-invariant violation is a typed error at the equation-insertion boundary
//! where it can still reasonably propagate; an unknown term variant during a fixpoint step is a
//! programmer error, caught by Rust's exhaustive `match` at compile time wherever the sum type is
//! known locally. `thiserror` generates the `Display`/`std::error::Error` impls; see
//! `SPEC_FULL.md` §1A for why this departs from the teacher's hand-rolled `Display`-only style.

use thiserror::Error;

/// *Malformed grammar* (§7): a grammar loader failure. No partial registration occurs — the
/// store is left exactly as it was before the failed `GrammarBuilder::build` call.
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("production of {nonterminal:?} references permutation index {index} but has only {arity} symbol(s)")]
    PermutationIndexOutOfRange {
        nonterminal: String,
        index: usize,
        arity: usize,
    },
    #[error(
        "production of {nonterminal:?} is transparent (no label) so its permutation must name \
         exactly one symbol, but it names {permutation_len}"
    )]
    TransparentArityMismatch {
        nonterminal: String,
        permutation_len: usize,
    },
    #[error("production of {nonterminal:?} references undefined nonterminal {reference:?}")]
    UndefinedNonterminal {
        nonterminal: String,
        reference: String,
    },
    #[error("production of {nonterminal:?} references unknown token kind {kind:?}")]
    UnknownTokenKind { nonterminal: String, kind: String },
    #[error("invalid regular expression {source:?}: {message}")]
    InvalidPattern { source: String, message: String },
    #[error("a transparent Sequence rearrangement requires exactly one symbol, got none")]
    EmptyTransparentSequence,
}

/// *Rewrite-invariant violation* (§7): a rewritten function's body resolved to a bare `Variable`
/// rather than a concrete term.
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(
        "the equation for {function} resolved to a bare variable reference instead of a term; \
         a rewrite equation body must not itself be a plain reference to another variable"
    )]
    InvalidEquation { function: &'static str },
}

/// The error surface of `Oracle` construction and the grammar loader.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}
