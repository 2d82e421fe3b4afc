//! Parsers (§3 "Parser", §4.3): the derivative-based combinator algebra, and `D`/`delta`/`image`,
//! the three rewritten functions that drive one step of incremental parsing (§4.3, §4.5).
//!
//! Grounded in the teacher's `Union`/`Concat` combinators (`src/lib.rs`) for the shape of the
//! algebra and its smart constructors, generalized to Brzozowski/Might-style derivatives: a
//! `Parser` describes a (possibly infinite, possibly cyclic via `Variable`) set of token
//! sequences, annotated with enough structure (`Rearrangement`, `ConstantParser`) to build the
//! matched tree once a sequence is accepted. `Sequence` is n-ary (`parsed`/`remaining`, §3
//! "Concatenation") rather than a binary combinator, so a single production's rearrangement
//! assembles one flat `Application` over every symbol instead of nesting one per binary step.

use std::rc::Rc;

use indexmap::IndexSet;

use crate::error::GrammarError;
use crate::grammar::TreeGrammar;
use crate::rewrite::{RewriteStore, Variable};
use crate::token::Token;

/// How an accepted `Sequence`'s matched children map onto its `Application` label's argument
/// positions (§3 "Rearrangement", §4.3 "Rearrangement").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rearrangement {
    /// Keep every child's image, in order, under `label`.
    Identity,
    /// Keep only the children at these positions, in this order, under `label`.
    Permute(Rc<[usize]>),
    /// Transparent (`ctor = None`, §4.3): no `Application` is built; the child at this index
    /// becomes the result directly.
    Transparent(usize),
}

/// A parser that accepts only the empty sequence, producing one fixed tree (§3 "epsilon"). Named
/// after the teacher's `ConstantParser` token-independent production.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstantParser {
    pub tree: Rc<TreeGrammar>,
}

/// A parser combinator term (§3 "Parser"). `Rc<Parser>` gives structural sharing without a
/// separate interner (SPEC_FULL.md §9 records this as a deliberate simplification of the spec's
/// suggested `u32`-index representation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parser {
    /// Accepts nothing, ever (∅, I2).
    Fail,
    /// Accepts exactly the empty sequence (§3 "epsilon").
    Epsilon(ConstantParser),
    /// Accepts a single token unifying with this template (§3 "Single").
    Single(Token),
    /// An ordered juxtaposition of symbols (§3 "Concatenation"). `parsed` holds residuals of
    /// already-derived symbols carrying their consumed nullability; `remaining` is the suffix not
    /// yet touched. I3: a `Sequence` is only ever constructed/derived with `parsed ++ remaining`
    /// non-empty; the empty case collapses to `Epsilon`/`Fail` at construction.
    Sequence {
        label: Rc<str>,
        rearrangement: Rearrangement,
        parsed: Vec<Rc<Parser>>,
        remaining: Vec<Rc<Parser>>,
    },
    /// An ordered, deduplicated union of alternatives (I3).
    Choice(IndexSet<Rc<Parser>>),
    /// A reference to a declared grammar nonterminal, resolved through a `RewriteStore`.
    Variable(Variable),
}

impl Parser {
    pub fn fail() -> Rc<Parser> {
        Rc::new(Parser::Fail)
    }

    pub fn epsilon(tree: Rc<TreeGrammar>) -> Rc<Parser> {
        Rc::new(Parser::Epsilon(ConstantParser { tree }))
    }

    pub fn single(token: Token) -> Rc<Parser> {
        Rc::new(Parser::Single(token))
    }

    pub fn variable(v: Variable) -> Rc<Parser> {
        Rc::new(Parser::Variable(v))
    }

    /// Builds a production's `Sequence` (§6): one symbol per grammar-rule position, all yet
    /// unconsumed (`parsed` starts empty). Compacts per I2/I3: any `Fail` symbol collapses the
    /// whole sequence to `Fail`; zero symbols collapses to the label's zero-arity `Application`.
    /// A transparent rearrangement has no `Application` label to fall back on, so it requires at
    /// least one symbol to pass through — `Err(GrammarError::EmptyTransparentSequence)` rather
    /// than a panic, since this is caller-supplied data, not an internal invariant (§7).
    pub fn sequence(
        label: &str,
        rearrangement: Rearrangement,
        symbols: Vec<Rc<Parser>>,
    ) -> Result<Rc<Parser>, GrammarError> {
        if symbols.iter().any(|s| matches!(&**s, Parser::Fail)) {
            return Ok(Parser::fail());
        }
        if symbols.is_empty() {
            return match &rearrangement {
                Rearrangement::Transparent(_) => Err(GrammarError::EmptyTransparentSequence),
                _ => Ok(Parser::epsilon(TreeGrammar::application(label, vec![]))),
            };
        }
        Ok(Rc::new(Parser::Sequence {
            label: Rc::from(label),
            rearrangement,
            parsed: Vec::new(),
            remaining: symbols,
        }))
    }

    /// Reconstructs a `Sequence` from already-split `parsed`/`remaining` vectors, compacting a
    /// `Fail` member or an entirely empty sequence the same way the public constructor does.
    fn rebuild(
        label: &Rc<str>,
        rearrangement: &Rearrangement,
        parsed: Vec<Rc<Parser>>,
        remaining: Vec<Rc<Parser>>,
    ) -> Rc<Parser> {
        if parsed.iter().chain(remaining.iter()).any(|s| matches!(&**s, Parser::Fail)) {
            return Parser::fail();
        }
        if parsed.is_empty() && remaining.is_empty() {
            return Parser::epsilon(TreeGrammar::application(label, vec![]));
        }
        Rc::new(Parser::Sequence {
            label: label.clone(),
            rearrangement: rearrangement.clone(),
            parsed,
            remaining,
        })
    }

    /// Builds a choice, flattening nested choices and dropping `Fail` (I2, I3).
    pub fn choice(alternatives: impl IntoIterator<Item = Rc<Parser>>) -> Rc<Parser> {
        let mut flat = IndexSet::new();
        for alt in alternatives {
            match &*alt {
                Parser::Fail => {}
                Parser::Choice(members) => flat.extend(members.iter().cloned()),
                _ => {
                    flat.insert(alt);
                }
            }
        }
        match flat.len() {
            0 => Parser::fail(),
            1 => flat.into_iter().next().unwrap(),
            _ => Rc::new(Parser::Choice(flat)),
        }
    }
}

pub fn collect_variables(term: &Parser) -> IndexSet<Variable> {
    let mut out = IndexSet::new();
    collect_into(term, &mut out);
    out
}

fn collect_into(term: &Parser, out: &mut IndexSet<Variable>) {
    match term {
        Parser::Fail | Parser::Epsilon(_) | Parser::Single(_) => {}
        Parser::Variable(v) => {
            out.insert(*v);
        }
        Parser::Sequence { parsed, remaining, .. } => {
            for p in parsed.iter().chain(remaining.iter()) {
                collect_into(p, out);
            }
        }
        Parser::Choice(members) => {
            for member in members {
                collect_into(member, out);
            }
        }
    }
}

/// `D(token, p) → Parser` (§4.3): the Brzozowski/Might derivative of `p` with respect to one
/// concrete token step. Memoized on `(token, p)`; a bare `Variable` is handled separately by
/// `d_variable` before anything recurses into its definition (§9 "Cyclic derivatives").
pub fn d(store: &mut RewriteStore, token: &Token, p: &Rc<Parser>) -> Rc<Parser> {
    if let Parser::Variable(v) = &**p {
        return d_variable(store, token, *v);
    }
    if let Some(hit) = store.d_memo_get(&(token.clone(), p.clone())) {
        return hit;
    }
    let result = match &**p {
        Parser::Fail | Parser::Epsilon(_) => Parser::fail(),
        Parser::Single(template) => match template.unify(token) {
            Some(unified) if unified.nonempty() => Parser::single(unified),
            Some(_) | None => Parser::fail(),
        },
        Parser::Sequence {
            label,
            rearrangement,
            parsed,
            remaining,
        } => {
            if remaining.is_empty() {
                // I3: a fully-parsed sequence has nothing left to derive.
                Parser::fail()
            } else {
                let head = &remaining[0];
                let derived_head = d(store, token, head);
                let mut stay_remaining = remaining.clone();
                stay_remaining[0] = derived_head.clone();
                let stay = Parser::rebuild(label, rearrangement, parsed.clone(), stay_remaining);

                // Always try both continuations (no guard on whether `head` was already nullable
                // before this token): consuming `token` may complete `head` in this very step, and
                // `rebuild`'s Fail-absorption drops whichever branch doesn't pan out.
                let witness = delta(store, &derived_head);
                let mut advance_parsed = parsed.clone();
                advance_parsed.push(witness);
                let advance_remaining = remaining[1..].to_vec();
                let advance = Parser::rebuild(label, rearrangement, advance_parsed, advance_remaining);
                Parser::choice([stay, advance])
            }
        }
        Parser::Choice(members) => Parser::choice(members.iter().map(|m| d(store, token, m))),
        Parser::Variable(_) => unreachable!("handled above"),
    };
    store.d_memo_insert((token.clone(), p.clone()), result.clone());
    result
}

/// `D` on a bare grammar `Variable` (§4.1, §4.3): declares a placeholder `Variable` naming
/// "`D(token, v)`" before recursing into `v`'s body, so a production where `v` derives through
/// itself (direct or mutual left recursion, e.g. `E -> E + E`) finds the placeholder already on
/// file and returns a reference to it instead of re-entering this same computation.
fn d_variable(store: &mut RewriteStore, token: &Token, v: Variable) -> Rc<Parser> {
    if let Some(result_var) = store.d_var_memo_get(token, v) {
        return Parser::variable(result_var);
    }
    let placeholder = store.declare_parser();
    store.d_var_memo_insert(token.clone(), v, placeholder);
    let body = store.resolve_parser(v);
    let computed = d(store, token, &body);
    store.define_parser_alias(placeholder, computed.clone());
    // Anything deferred against `placeholder` (§9 "Cyclic derivatives" — a left-recursive
    // production needing `delta(placeholder)` as a witness while `placeholder` was still being
    // assembled) can now be resolved for real.
    if let Some(waiting) = store.take_deferred_delta(placeholder) {
        let resolved = delta(store, &computed);
        store.define_parser_alias(waiting, resolved);
    }
    Parser::variable(placeholder)
}

/// `delta(parser) → Parser` (§4.3): the nullable residue of `parser` — the sub-parser describing
/// "having consumed no further tokens, what (if anything) already counts as accepted?". Like `d`,
/// memoized, with its own `Variable` case handled by `delta_variable`.
pub fn delta(store: &mut RewriteStore, p: &Rc<Parser>) -> Rc<Parser> {
    if let Parser::Variable(v) = &**p {
        return delta_variable(store, *v);
    }
    if let Some(hit) = store.delta_memo_get(p) {
        return hit;
    }
    let result = match &**p {
        Parser::Fail => Parser::fail(),
        Parser::Epsilon(_) => p.clone(),
        Parser::Single(template) => {
            if template.nullable() {
                Parser::epsilon(TreeGrammar::token(template.clone()))
            } else {
                Parser::fail()
            }
        }
        Parser::Sequence { remaining, .. } if remaining.is_empty() => p.clone(),
        Parser::Sequence { .. } => Parser::fail(),
        Parser::Choice(members) => Parser::choice(members.iter().map(|m| delta(store, m))),
        Parser::Variable(_) => unreachable!("handled above"),
    };
    store.delta_memo_insert(p.clone(), result.clone());
    result
}

/// `delta` on a bare grammar `Variable`. Usually resolves `v`'s body immediately, same as
/// `d_variable`; but `v` can itself be a `d_variable` placeholder still under construction
/// (left recursion, `d`'s Sequence case asking for its own in-progress derivative's nullability
/// as a witness) — then there is no body yet, so the result is deferred instead of computed.
fn delta_variable(store: &mut RewriteStore, v: Variable) -> Rc<Parser> {
    if let Some(result_var) = store.delta_var_memo_get(v) {
        return Parser::variable(result_var);
    }
    let placeholder = store.declare_parser();
    store.delta_var_memo_insert(v, placeholder);
    match store.try_resolve_parser(v) {
        Some(body) => {
            let computed = delta(store, &body);
            store.define_parser_alias(placeholder, computed);
        }
        None => {
            // `v` is an enclosing `d_variable` call's own placeholder, still mid-construction
            // (direct/mutual left recursion, §9 "Cyclic derivatives"): its body isn't installed
            // yet, so there is nothing to recurse into here. Defer — `d_variable` resolves this
            // placeholder for real immediately after it installs `v`'s definition.
            store.defer_delta(v, placeholder);
        }
    }
    Parser::variable(placeholder)
}

/// `image(parser) → TreeGrammar` (§4.2, §4.3): maps a parser to the `TreeGrammar` describing every
/// tree it may still produce, whether or not it has finished matching. Memoized, with its own
/// `Variable` case handled by `image_variable`.
pub fn image(store: &mut RewriteStore, p: &Rc<Parser>) -> Rc<TreeGrammar> {
    if let Parser::Variable(v) = &**p {
        return image_variable(store, *v);
    }
    if let Some(hit) = store.image_memo_get(p) {
        return hit;
    }
    let result = match &**p {
        Parser::Fail => TreeGrammar::empty(),
        Parser::Epsilon(constant) => constant.tree.clone(),
        // Matched or not, a `Single` names the token that belongs at this position; image
        // describes every tree the parser may still yield, not only what it has matched so far.
        Parser::Single(template) => TreeGrammar::token(template.clone()),
        Parser::Sequence {
            label,
            rearrangement,
            parsed,
            remaining,
        } => {
            let children: Vec<Rc<TreeGrammar>> = parsed
                .iter()
                .chain(remaining.iter())
                .map(|p| image(store, p))
                .collect();
            match rearrangement {
                Rearrangement::Transparent(i) => children[*i].clone(),
                Rearrangement::Identity => TreeGrammar::application(label, children),
                Rearrangement::Permute(indices) => {
                    let reordered = indices.iter().map(|&i| children[i].clone()).collect();
                    TreeGrammar::application(label, reordered)
                }
            }
        }
        Parser::Choice(members) => TreeGrammar::union(members.iter().map(|m| image(store, m))),
        Parser::Variable(_) => unreachable!("handled above"),
    };
    store.image_memo_insert(p.clone(), result.clone());
    result
}

fn image_variable(store: &mut RewriteStore, v: Variable) -> Rc<TreeGrammar> {
    if let Some(result_var) = store.image_var_memo_get(v) {
        return TreeGrammar::variable(result_var);
    }
    let placeholder = store.declare_tree();
    store.image_var_memo_insert(v, placeholder);
    let body = store.resolve_parser(v);
    let computed = image(store, &body);
    store.define_tree_alias(placeholder, computed);
    TreeGrammar::variable(placeholder)
}

/// `parser_nonempty(parser)` (§4.2, §9 "Monotone analyses"): does `parser` accept at least one
/// token sequence (completed or not)? The parser-algebra counterpart of `grammar::is_nonempty`,
/// sharing the same Kildall worklist solver.
pub fn parser_nonempty(store: &RewriteStore, p: &Parser) -> bool {
    match p {
        Parser::Fail => false,
        Parser::Epsilon(_) => true,
        // A constructed `Single` always still accepts at least its own unconsumed prefix.
        Parser::Single(_) => true,
        Parser::Sequence { parsed, remaining, .. } => parsed
            .iter()
            .chain(remaining.iter())
            .all(|child| parser_nonempty(store, child)),
        Parser::Choice(members) => members.iter().any(|m| parser_nonempty(store, m)),
        Parser::Variable(v) => {
            let results = store.kildall_bool(vec![*v], |current, cache| {
                step_nonempty(store, &store.resolve_parser(current), cache)
            });
            results.get(v).copied().unwrap_or(false)
        }
    }
}

fn step_nonempty(
    store: &RewriteStore,
    term: &Parser,
    cache: &std::collections::HashMap<Variable, bool>,
) -> bool {
    match term {
        Parser::Fail => false,
        Parser::Epsilon(_) => true,
        Parser::Single(_) => true,
        Parser::Sequence { parsed, remaining, .. } => parsed
            .iter()
            .chain(remaining.iter())
            .all(|child| step_nonempty(store, child, cache)),
        Parser::Choice(members) => members.iter().any(|m| step_nonempty(store, m, cache)),
        Parser::Variable(v) => cache.get(v).copied().unwrap_or(false),
    }
}
