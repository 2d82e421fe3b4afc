//! A realizability oracle: given a partial input string, decide whether some continuation of it
//! still lexes, parses, and yields at least one abstract syntax tree surviving a user-supplied
//! semantic pruner.
//!
//! # Overview
//!
//! Generation-time grammar checking (e.g. gating a language model's token-by-token output) needs
//! an answer to one question, over and over, on a growing prefix: *can this still become valid?*
//! Re-parsing the whole prefix from scratch on every new character is wasteful, and a plain
//! recursive-descent parser has no notion of "valid so far, pending more input" short of ad hoc
//! lookahead hacks.
//!
//! This crate answers the question directly. Four layers compose into one call,
//! [`Oracle::realizable`]:
//!
//! 1. [`lexer`] — a longest-match incremental lexer that tracks every tokenization of a prefix
//!    still consistent with it, not just one.
//! 2. [`parser`] — a Brzozowski/Might-style derivative parser: consuming a token transforms a
//!    grammar term into the residual grammar for everything after it, with no backtracking.
//! 3. [`grammar`] — a tree-grammar algebra describing (possibly infinite, cyclic) sets of ASTs,
//!    and the `image` projection from a parser onto the trees it may still produce.
//! 4. [`rewrite`] — a hash-consed equation store and Kildall worklist solver making the whole
//!    graph, including self- and mutually-recursive productions and pruners, terminate.
//!
//! # Example
//!
//! Building the arithmetic grammar `E -> INT | E + E` and asking whether a prefix could still be
//! continued into a valid sentence:
//!
//! ```
//! use std::collections::HashMap;
//! use prefix_realizability::grammar_loader::{
//!     build_lexer_spec, AttributeGrammar, GrammarBuilder, ProductionRule, Symbol,
//! };
//! use prefix_realizability::lexer::TokenTemplate;
//! use prefix_realizability::oracle::{identity_pruner, Oracle};
//! use prefix_realizability::rewrite::RewriteStore;
//!
//! let mut tokens = HashMap::new();
//! tokens.insert("int".to_string(), TokenTemplate::new("int", "[0-9]+").unwrap());
//! tokens.insert("plus".to_string(), TokenTemplate::new("plus", r"\+").unwrap());
//!
//! let grammar = AttributeGrammar {
//!     start: "E".to_string(),
//!     rules: vec![(
//!         "E".to_string(),
//!         vec![
//!             ProductionRule::new(None, vec![0], vec![Symbol::Terminal("int".to_string())]),
//!             ProductionRule::new(
//!                 Some("+"),
//!                 vec![0, 1, 2],
//!                 vec![
//!                     Symbol::Nonterminal("E".to_string()),
//!                     Symbol::Terminal("plus".to_string()),
//!                     Symbol::Nonterminal("E".to_string()),
//!                 ],
//!             ),
//!         ],
//!     )],
//! };
//!
//! let mut store = RewriteStore::new();
//! let start = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap();
//! let lexer_spec = build_lexer_spec(&tokens, r"[ \t]+").unwrap();
//! let mut oracle = Oracle::new(store, identity_pruner(), start, lexer_spec);
//!
//! assert!(oracle.realizable("1 + 1 + 1", false));
//! assert!(!oracle.realizable(")", false));
//! ```
//!
//! # License
//! Provided under the MIT license.

pub mod error;
pub mod grammar;
pub mod grammar_loader;
pub mod lexer;
pub mod oracle;
pub mod parser;
pub mod rewrite;
pub mod token;
mod util;

pub use error::{GrammarError, OracleError, RewriteError};
pub use grammar::{ConcreteTree, TreeGrammar};
pub use oracle::Oracle;
pub use parser::Parser;
pub use rewrite::{RewriteStore, Variable};
pub use token::Token;
