//! The rewrite runtime (§4.1): a hash-consed equation store, its dependency graph, and a generic
//! Kildall worklist solver for the boolean least-fixpoint analyses the rest of the crate needs
//! (`is_nonempty`, `parser_nonempty`, §9 "Monotone analyses").
//!
//! `D`, `delta`, and `image` (§4.3) are plain memoized functions over concrete `Parser`/
//! `TreeGrammar` values for everything except a bare `Variable` argument: hitting one of those
//! (a grammar nonterminal feeding back into its own production, directly or through another
//! nonterminal) would otherwise re-enter the same call before it has a result to return. Each
//! function handles its own `Variable` case by declaring a fresh placeholder `Variable` for
//! "the answer for this (function, argument) pair" *before* recursing into the argument's
//! definition, exactly the declare-then-define discipline grammar nonterminals themselves use;
//! a recursive call that lands back on the same pair finds the placeholder already declared and
//! returns a reference to it instead of looping.
//!
//! Left recursion (`E -> E + E`) raises one more wrinkle: `D`'s Sequence case needs `delta` of the
//! very derivative it is still assembling — the single-token witness for "did consuming this token
//! already complete the leading symbol". That `delta_variable` call lands on a placeholder its own
//! enclosing `d_variable` call declared but hasn't defined yet. `delta_variable` can't recurse into
//! a body that doesn't exist, so it defers: it registers its own placeholder against the
//! not-yet-defined variable (`defer_delta`) and returns that, unresolved. Once `d_variable`
//! installs the real definition, it immediately resolves anything deferred against it
//! (`take_deferred_delta`) and installs `delta` of the real body in the placeholder's place. See
//! `DESIGN.md` for the grounding of this split.

use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use indexmap::IndexSet;

use crate::error::RewriteError;
use crate::grammar::TreeGrammar;
use crate::parser::Parser;
use crate::token::Token;

/// A hash-consed index naming the result of a declared grammar nonterminal or pruner (§3
/// "Variable"). Lightweight, `Copy`, compared by index — the `u32`-index recommendation of
/// SPEC_FULL.md §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(u32);

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Clone)]
enum Equation {
    Pending,
    Parser(Rc<Parser>),
    Tree(Rc<TreeGrammar>),
}

/// Process-wide (or per-problem, §5) mutable state: the equation store and dependency graph for
/// declared `Variable`s, plus the memo tables for `D`/`delta`/`image`. `clear()` is the store's
/// `teardown` half of the init/teardown lifecycle contract (§3 "Lifecycles").
#[derive(Default)]
pub struct RewriteStore {
    next_id: u32,
    equations: HashMap<Variable, Equation>,
    deps: HashMap<Variable, IndexSet<Variable>>,
    rev_deps: HashMap<Variable, IndexSet<Variable>>,
    d_memo: HashMap<(Token, Rc<Parser>), Rc<Parser>>,
    delta_memo: HashMap<Rc<Parser>, Rc<Parser>>,
    image_memo: HashMap<Rc<Parser>, Rc<TreeGrammar>>,
    d_var_memo: HashMap<(Token, Variable), Variable>,
    delta_var_memo: HashMap<Variable, Variable>,
    image_var_memo: HashMap<Variable, Variable>,
    deferred_delta: HashMap<Variable, Variable>,
}

impl RewriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every equation, dependency edge, and memo table entry (§5 "Memoization / cache
    /// lifetime"). Call between logically independent realizability problems.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn fresh(&mut self) -> Variable {
        let v = Variable(self.next_id);
        self.next_id += 1;
        v
    }

    /// Allocates a `Variable` for a nonterminal or pruner whose body is not yet known — the
    /// "declare" half of the two-phase discipline used for self-referential/mutually-recursive
    /// definitions (§4.1), mirroring the teacher's `Concat::init()` before `set_symbols()`.
    pub fn declare_parser(&mut self) -> Variable {
        let v = self.fresh();
        self.equations.insert(v, Equation::Pending);
        v
    }

    pub fn declare_tree(&mut self) -> Variable {
        let v = self.fresh();
        self.equations.insert(v, Equation::Pending);
        v
    }

    /// Installs the equation for a previously declared parser variable (I1, I4). Rejects a body
    /// that is itself a bare `Variable` — `InvalidEquation` (§4.1 "Failure", §7).
    pub fn define_parser(&mut self, v: Variable, body: Rc<Parser>) -> Result<(), RewriteError> {
        if matches!(&*body, Parser::Variable(_)) {
            return Err(RewriteError::InvalidEquation {
                function: "grammar nonterminal",
            });
        }
        let deps = crate::parser::collect_variables(&body);
        self.install(v, Equation::Parser(body), deps);
        Ok(())
    }

    pub fn define_tree(&mut self, v: Variable, body: Rc<TreeGrammar>) -> Result<(), RewriteError> {
        if matches!(&*body, TreeGrammar::Variable(_)) {
            return Err(RewriteError::InvalidEquation { function: "pruner" });
        }
        let deps = crate::grammar::collect_variables(&body);
        self.install(v, Equation::Tree(body), deps);
        Ok(())
    }

    fn install(&mut self, v: Variable, eq: Equation, deps: IndexSet<Variable>) {
        for &d in &deps {
            self.rev_deps.entry(d).or_default().insert(v);
        }
        self.deps.insert(v, deps);
        self.equations.insert(v, eq);
        tracing::trace!(variable = %v, "installed rewrite equation");
    }

    pub fn resolve_parser(&self, v: Variable) -> Rc<Parser> {
        match self.equations.get(&v) {
            Some(Equation::Parser(p)) => p.clone(),
            Some(Equation::Pending) => panic!("{v} read before its equation was defined"),
            _ => panic!("{v} does not name a Parser equation"),
        }
    }

    /// Like `resolve_parser`, but returns `None` instead of panicking when `v` is declared but not
    /// yet defined — the enclosing `d_variable` call that declared `v` is still building its body
    /// (§9 "Cyclic derivatives"). Lets `delta_variable` tell "not installed yet" apart from "not a
    /// parser variable at all", which only the latter is still a genuine bug.
    pub(crate) fn try_resolve_parser(&self, v: Variable) -> Option<Rc<Parser>> {
        match self.equations.get(&v) {
            Some(Equation::Parser(p)) => Some(p.clone()),
            Some(Equation::Pending) => None,
            _ => panic!("{v} does not name a Parser equation"),
        }
    }

    pub fn resolve_tree(&self, v: Variable) -> Rc<TreeGrammar> {
        match self.equations.get(&v) {
            Some(Equation::Tree(t)) => t.clone(),
            Some(Equation::Pending) => panic!("{v} read before its equation was defined"),
            _ => panic!("{v} does not name a TreeGrammar equation"),
        }
    }

    pub(crate) fn d_memo_get(&self, key: &(Token, Rc<Parser>)) -> Option<Rc<Parser>> {
        self.d_memo.get(key).cloned()
    }
    pub(crate) fn d_memo_insert(&mut self, key: (Token, Rc<Parser>), value: Rc<Parser>) {
        self.d_memo.insert(key, value);
    }
    pub(crate) fn delta_memo_get(&self, key: &Rc<Parser>) -> Option<Rc<Parser>> {
        self.delta_memo.get(key).cloned()
    }
    pub(crate) fn delta_memo_insert(&mut self, key: Rc<Parser>, value: Rc<Parser>) {
        self.delta_memo.insert(key, value);
    }
    pub(crate) fn image_memo_get(&self, key: &Rc<Parser>) -> Option<Rc<TreeGrammar>> {
        self.image_memo.get(key).cloned()
    }
    pub(crate) fn image_memo_insert(&mut self, key: Rc<Parser>, value: Rc<TreeGrammar>) {
        self.image_memo.insert(key, value);
    }

    pub(crate) fn d_var_memo_get(&self, token: &Token, v: Variable) -> Option<Variable> {
        self.d_var_memo.get(&(token.clone(), v)).copied()
    }
    pub(crate) fn d_var_memo_insert(&mut self, token: Token, v: Variable, result: Variable) {
        self.d_var_memo.insert((token, v), result);
    }
    pub(crate) fn delta_var_memo_get(&self, v: Variable) -> Option<Variable> {
        self.delta_var_memo.get(&v).copied()
    }
    pub(crate) fn delta_var_memo_insert(&mut self, v: Variable, result: Variable) {
        self.delta_var_memo.insert(v, result);
    }
    pub(crate) fn image_var_memo_get(&self, v: Variable) -> Option<Variable> {
        self.image_var_memo.get(&v).copied()
    }
    pub(crate) fn image_var_memo_insert(&mut self, v: Variable, result: Variable) {
        self.image_var_memo.insert(v, result);
    }

    /// Installs an equation whose body may itself be a bare `Variable` — an alias. Used only by
    /// `d`/`delta`/`image`'s own placeholder variables (§4.3, §9): unlike a grammar nonterminal or
    /// pruner, a derivative placeholder legitimately can turn out to equal another one exactly, so
    /// the bare-`Variable`-body rejection `define_parser`/`define_tree` apply to loader input
    /// would be too strict here.
    pub(crate) fn define_parser_alias(&mut self, v: Variable, body: Rc<Parser>) {
        let deps = crate::parser::collect_variables(&body);
        self.install(v, Equation::Parser(body), deps);
    }
    pub(crate) fn define_tree_alias(&mut self, v: Variable, body: Rc<TreeGrammar>) {
        let deps = crate::grammar::collect_variables(&body);
        self.install(v, Equation::Tree(body), deps);
    }

    /// Registers `placeholder` as standing for `delta(v)`, to be resolved for real once `v` itself
    /// becomes defined (§9 "Cyclic derivatives"). At most one registration per `v` is ever live,
    /// since `delta_variable`'s own memo short-circuits a second call on the same `v` before it
    /// would try to register again.
    pub(crate) fn defer_delta(&mut self, v: Variable, placeholder: Variable) {
        self.deferred_delta.insert(v, placeholder);
    }

    /// Takes back the placeholder deferred on `v`, if any, so the caller that just defined `v` can
    /// now compute `delta(v)` for real and install it.
    pub(crate) fn take_deferred_delta(&mut self, v: Variable) -> Option<Variable> {
        self.deferred_delta.remove(&v)
    }

    /// Generic Kildall least-fixpoint solver over the boolean (∨, ⊥ = `false`) lattice — the only
    /// lattice `is_nonempty`/`parser_nonempty` need (§9 "Monotone analyses", §4.1). `step`
    /// recomputes a variable's value given a read-only view of the current cache; it is called
    /// with the variable's own equation's shape already substituted one level by the caller.
    pub(crate) fn kildall_bool(
        &self,
        starts: Vec<Variable>,
        step: impl Fn(Variable, &HashMap<Variable, bool>) -> bool,
    ) -> HashMap<Variable, bool> {
        let mut cache: HashMap<Variable, bool> = HashMap::new();
        let mut worklist: VecDeque<Variable> = VecDeque::new();
        let mut reachable: HashSet<Variable> = HashSet::new();

        let mut frontier = starts;
        while let Some(v) = frontier.pop() {
            if reachable.insert(v) {
                cache.insert(v, false);
                worklist.push_back(v);
                if let Some(ds) = self.deps.get(&v) {
                    frontier.extend(ds.iter().copied());
                }
            }
        }

        while let Some(current) = worklist.pop_front() {
            let old = cache[&current];
            let new = step(current, &cache);
            if new != old {
                cache.insert(current, new);
                if let Some(parents) = self.rev_deps.get(&current) {
                    for &parent in parents {
                        if reachable.contains(&parent) {
                            worklist.push_back(parent);
                        }
                    }
                }
            }
        }
        tracing::trace!(variables_visited = reachable.len(), "kildall fixpoint converged");
        cache
    }
}
