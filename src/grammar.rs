//! Tree grammars (§3 "TreeGrammar", §4.2): the algebra `image` maps a parser shape into, and the
//! domain the pruner operates over. Grounded in the teacher's `Union`/`Concat` symbol algebra
//! (`src/lib.rs`'s `Symbol` trait family), generalized from "concrete syntax tree shape" to the
//! spec's abstract tree-grammar algebra (empty set, a token leaf, a named application of children,
//! a union, and a `Variable` reference standing for a declared pruner or nonterminal).

use std::rc::Rc;

use indexmap::IndexSet;

use crate::rewrite::{RewriteStore, Variable};
use crate::token::Token;

/// A tree grammar term (§3). `Rc<TreeGrammar>` gives cheap structural sharing and sidesteps the
/// need for a separate arena interner (SPEC_FULL.md §9 records this as a deliberate simplification
/// of the spec's suggested `u32`-index representation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TreeGrammar {
    /// The empty language: no tree is described by this term (∅, I2).
    Empty,
    /// A single leaf tree carrying exactly this token.
    Token(Token),
    /// A named application of children — the tree-shaped analogue of a production (§3
    /// "Application"). `label` is the applied nonterminal or operator's name (e.g. `"+"`).
    Application(Rc<str>, Vec<Rc<TreeGrammar>>),
    /// An ordered, deduplicated union of alternative shapes (I3: flattened, no nested `Union`).
    Union(IndexSet<Rc<TreeGrammar>>),
    /// A reference to a declared pruner or nonterminal, resolved through a `RewriteStore`.
    Variable(Variable),
}

impl TreeGrammar {
    pub fn empty() -> Rc<TreeGrammar> {
        Rc::new(TreeGrammar::Empty)
    }

    pub fn token(t: Token) -> Rc<TreeGrammar> {
        Rc::new(TreeGrammar::Token(t))
    }

    pub fn variable(v: Variable) -> Rc<TreeGrammar> {
        Rc::new(TreeGrammar::Variable(v))
    }

    /// Compacts to `Empty` if any child is `Empty` (I2, §4.2): a named application with an
    /// unreachable child describes no tree at all.
    pub fn application(label: &str, children: Vec<Rc<TreeGrammar>>) -> Rc<TreeGrammar> {
        if children.iter().any(|c| matches!(&**c, TreeGrammar::Empty)) {
            return TreeGrammar::empty();
        }
        Rc::new(TreeGrammar::Application(Rc::from(label), children))
    }

    /// Builds a union, flattening nested unions and dropping `Empty` (I2, I3). An empty or
    /// singleton input collapses to `Empty`/the sole member rather than a degenerate `Union`.
    pub fn union(alternatives: impl IntoIterator<Item = Rc<TreeGrammar>>) -> Rc<TreeGrammar> {
        let mut flat = IndexSet::new();
        for alt in alternatives {
            match &*alt {
                TreeGrammar::Empty => {}
                TreeGrammar::Union(members) => flat.extend(members.iter().cloned()),
                _ => {
                    flat.insert(alt);
                }
            }
        }
        match flat.len() {
            0 => TreeGrammar::empty(),
            1 => flat.into_iter().next().unwrap(),
            _ => Rc::new(TreeGrammar::Union(flat)),
        }
    }

    /// True iff this term, resolved through `store`, is union-free, `Empty`-free, and every
    /// token leaf is complete (§4.2): the "one finished tree, no remaining choice" condition
    /// `as_tree` coerces on.
    pub fn is_concrete(&self, store: &RewriteStore) -> bool {
        let mut visiting = IndexSet::new();
        self.is_concrete_inner(store, &mut visiting)
    }

    fn is_concrete_inner(&self, store: &RewriteStore, visiting: &mut IndexSet<Variable>) -> bool {
        match self {
            TreeGrammar::Empty | TreeGrammar::Union(_) => false,
            TreeGrammar::Token(t) => t.is_complete,
            TreeGrammar::Application(_, children) => {
                children.iter().all(|c| c.is_concrete_inner(store, visiting))
            }
            // A `Variable` reached again while already resolving it is a cycle with no `Union`
            // gate anywhere on the path back to itself — it can never bottom out in one finished
            // tree, so it is not concrete (mirrors `is_nonempty`'s fixpoint-bottom default, but
            // here decided by cycle detection rather than a full Kildall solve).
            TreeGrammar::Variable(v) => {
                if !visiting.insert(*v) {
                    return false;
                }
                let result = store.resolve_tree(*v).is_concrete_inner(store, visiting);
                visiting.shift_remove(v);
                result
            }
        }
    }

    /// Partial extraction to a `ConcreteTree` (§4.2 "as_tree"): `Some` only when `is_concrete`.
    /// Lets a pruner inspect an already-finished sub-AST directly instead of matching on
    /// `TreeGrammar`'s own branching shape. A non-concrete term (still a `Union`, still carrying
    /// an incomplete token, a cyclic `Variable` chain, or `Empty`) yields `None` rather than an
    /// error (§7 "Benign pruning holes") — callers that can't yet concretize a sub-AST should pass
    /// the input through unchanged, not treat the miss as a failure.
    pub fn as_tree(&self, store: &RewriteStore) -> Option<ConcreteTree> {
        let mut visiting = IndexSet::new();
        self.as_tree_inner(store, &mut visiting)
    }

    fn as_tree_inner(&self, store: &RewriteStore, visiting: &mut IndexSet<Variable>) -> Option<ConcreteTree> {
        match self {
            TreeGrammar::Empty | TreeGrammar::Union(_) => None,
            TreeGrammar::Token(t) => t.is_complete.then(|| ConcreteTree::Token(t.clone())),
            TreeGrammar::Application(label, children) => {
                let children = children
                    .iter()
                    .map(|c| c.as_tree_inner(store, visiting))
                    .collect::<Option<Vec<_>>>()?;
                Some(ConcreteTree::Application(label.clone(), children))
            }
            TreeGrammar::Variable(v) => {
                if !visiting.insert(*v) {
                    return None;
                }
                let result = store.resolve_tree(*v).as_tree_inner(store, visiting);
                visiting.shift_remove(v);
                result
            }
        }
    }
}

/// A fully concrete, union-free tree (§4.2): the result of successfully coercing a `TreeGrammar`
/// term via `as_tree`. Unlike `TreeGrammar`, this type cannot represent `Empty`, `Union`, or an
/// incomplete token — by construction, every value of this type describes exactly one tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcreteTree {
    Token(Token),
    Application(Rc<str>, Vec<ConcreteTree>),
}

/// Collects the `Variable`s a tree term directly and transitively mentions in its own structure
/// (not following through the store) — used by `RewriteStore::define_tree` to compute dependency
/// edges for the Kildall worklist (§4.1).
pub fn collect_variables(term: &TreeGrammar) -> IndexSet<Variable> {
    let mut out = IndexSet::new();
    collect_into(term, &mut out);
    out
}

fn collect_into(term: &TreeGrammar, out: &mut IndexSet<Variable>) {
    match term {
        TreeGrammar::Empty | TreeGrammar::Token(_) => {}
        TreeGrammar::Variable(v) => {
            out.insert(*v);
        }
        TreeGrammar::Application(_, children) => {
            for child in children {
                collect_into(child, out);
            }
        }
        TreeGrammar::Union(members) => {
            for member in members {
                collect_into(member, out);
            }
        }
    }
}

/// Decides whether a tree grammar describes at least one tree (§4.2 "is_nonempty"), the boolean
/// least-fixpoint analysis used both directly (pruners) and transitively (grammar nonterminals
/// reached from a parser's `image`). `Variable`s are resolved through `store`'s Kildall solver
/// rather than by direct recursion, so mutually recursive or self-referential definitions
/// terminate (scenario 5, §8).
pub fn is_nonempty(store: &RewriteStore, term: &TreeGrammar) -> bool {
    match term {
        TreeGrammar::Empty => false,
        TreeGrammar::Token(_) => true,
        TreeGrammar::Application(_, children) => children.iter().all(|c| is_nonempty(store, c)),
        TreeGrammar::Union(members) => members.iter().any(|m| is_nonempty(store, m)),
        TreeGrammar::Variable(v) => {
            let results = store.kildall_bool(vec![*v], |current, cache| {
                step_nonempty(store, &store.resolve_tree(current), cache)
            });
            results.get(v).copied().unwrap_or(false)
        }
    }
}

/// One Kildall step: like `is_nonempty`, but a nested `Variable` reads from the worklist's current
/// cache (defaulting to `false`, the lattice bottom) instead of recursing, so the whole dependency
/// graph converges together rather than one variable at a time.
fn step_nonempty(
    store: &RewriteStore,
    term: &TreeGrammar,
    cache: &std::collections::HashMap<Variable, bool>,
) -> bool {
    match term {
        TreeGrammar::Empty => false,
        TreeGrammar::Token(_) => true,
        TreeGrammar::Application(_, children) => {
            children.iter().all(|c| step_nonempty(store, c, cache))
        }
        TreeGrammar::Union(members) => members.iter().any(|m| step_nonempty(store, m, cache)),
        TreeGrammar::Variable(v) => cache.get(v).copied().unwrap_or(false),
    }
}
