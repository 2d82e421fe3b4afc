//! The grammar-loader collaborator (§6 "Grammar declaration"). Out of scope as a surface-syntax
//! parser (§1 "Out of scope": no textual grammar file format is defined here), but the *interface*
//! a loader must target — `AttributeGrammar` in, an entry `Parser` and `LexerSpec` out — is part
//! of the core's contract, so it lives in the crate rather than only in tests.
//!
//! Grounded in the teacher's rule-registration pattern (`src/lib.rs`'s `Concat`/`Union` builders
//! taking already-built child parsers) generalized to the spec's declare-then-define two-phase
//! discipline for mutually recursive nonterminals.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::GrammarError;
use crate::lexer::{LexerSpec, TokenTemplate};
use crate::parser::{Parser, Rearrangement};
use crate::rewrite::{RewriteStore, Variable};

/// A production's right-hand side symbol: either a reference to another nonterminal, or a
/// terminal token kind (§6 "symbols are nonterminal names or terminal (token) kinds").
#[derive(Debug, Clone)]
pub enum Symbol {
    Nonterminal(String),
    Terminal(String),
}

/// `(action, symbols)` (§6): an ordered sequence of symbols, tagged with the constructor name and
/// permutation that `image` will use to assemble the matched children (`None` label ⇒ transparent,
/// §4.3 "Rearrangement").
pub struct ProductionRule {
    pub label: Option<String>,
    pub permutation: Vec<usize>,
    pub symbols: Vec<Symbol>,
}

impl ProductionRule {
    pub fn new(label: Option<&str>, permutation: Vec<usize>, symbols: Vec<Symbol>) -> Self {
        Self {
            label: label.map(str::to_string),
            permutation,
            symbols,
        }
    }
}

/// `(nonterminal, [production])` list (§6 "AttributeGrammar").
pub struct AttributeGrammar {
    pub rules: Vec<(String, Vec<ProductionRule>)>,
    pub start: String,
}

/// Builds a `Parser` term graph and registers every nonterminal with a `RewriteStore` from an
/// `AttributeGrammar` (§6). Fails fast on malformed input with no partial registration (§7):
/// `build` validates every rule before declaring a single `Variable`.
pub struct GrammarBuilder;

impl GrammarBuilder {
    pub fn build(
        store: &mut RewriteStore,
        grammar: &AttributeGrammar,
        tokens: &HashMap<String, TokenTemplate>,
    ) -> Result<Rc<Parser>, GrammarError> {
        for (nonterminal, productions) in &grammar.rules {
            for production in productions {
                let arity = production.symbols.len();
                for &index in &production.permutation {
                    if index >= arity {
                        return Err(GrammarError::PermutationIndexOutOfRange {
                            nonterminal: nonterminal.clone(),
                            index,
                            arity,
                        });
                    }
                }
                if production.label.is_none() && production.permutation.len() != 1 {
                    return Err(GrammarError::TransparentArityMismatch {
                        nonterminal: nonterminal.clone(),
                        permutation_len: production.permutation.len(),
                    });
                }
                for symbol in &production.symbols {
                    match symbol {
                        Symbol::Nonterminal(name) => {
                            if !grammar.rules.iter().any(|(n, _)| n == name) {
                                return Err(GrammarError::UndefinedNonterminal {
                                    nonterminal: nonterminal.clone(),
                                    reference: name.clone(),
                                });
                            }
                        }
                        Symbol::Terminal(kind) => {
                            if !tokens.contains_key(kind) {
                                return Err(GrammarError::UnknownTokenKind {
                                    nonterminal: nonterminal.clone(),
                                    kind: kind.clone(),
                                });
                            }
                        }
                    }
                }
            }
        }
        if !grammar.rules.iter().any(|(n, _)| n == &grammar.start) {
            return Err(GrammarError::UndefinedNonterminal {
                nonterminal: "<start>".to_string(),
                reference: grammar.start.clone(),
            });
        }

        let mut declared: HashMap<&str, Variable> = HashMap::new();
        for (nonterminal, _) in &grammar.rules {
            declared.insert(nonterminal.as_str(), store.declare_parser());
        }

        for (nonterminal, productions) in &grammar.rules {
            let alternatives: Vec<Rc<Parser>> = productions
                .iter()
                .map(|production| build_production(production, &declared, tokens))
                .collect::<Result<_, GrammarError>>()?;
            let body = Parser::choice(alternatives);
            let v = declared[nonterminal.as_str()];
            store
                .define_parser(v, body)
                .expect("a freshly built Choice/Sequence term is never a bare Variable");
        }

        Ok(Parser::variable(declared[grammar.start.as_str()]))
    }
}

fn build_production(
    production: &ProductionRule,
    declared: &HashMap<&str, Variable>,
    tokens: &HashMap<String, TokenTemplate>,
) -> Result<Rc<Parser>, GrammarError> {
    let symbol_parsers: Vec<Rc<Parser>> = production
        .symbols
        .iter()
        .map(|symbol| match symbol {
            Symbol::Nonterminal(name) => Parser::variable(declared[name.as_str()]),
            Symbol::Terminal(kind) => Parser::single(tokens[kind].seed()),
        })
        .collect();

    // `label = None` is the transparent case (§4.3 "Rearrangement"): demands a single-element
    // permutation naming which child passes through untouched. `build`'s validation loop already
    // rejected any production.len() != 1 here, and the accompanying index check already rejected
    // an out-of-range index against an empty `symbols`, so `symbol_parsers` is never empty.
    let rearrangement = match &production.label {
        None => Rearrangement::Transparent(production.permutation[0]),
        Some(_)
            if production.permutation.len() == production.symbols.len()
                && production
                    .permutation
                    .iter()
                    .enumerate()
                    .all(|(i, &p)| i == p) =>
        {
            Rearrangement::Identity
        }
        Some(_) => Rearrangement::Permute(Rc::from(production.permutation.as_slice())),
    };

    let label = production.label.as_deref().unwrap_or("");
    Parser::sequence(label, rearrangement, symbol_parsers)
}

/// Builds the `LexerSpec` half of a grammar's external contract (§6: "a lexer spec: `{(kind,
/// pattern)}` plus an ignore pattern").
pub fn build_lexer_spec(
    tokens: &HashMap<String, TokenTemplate>,
    ignore_pattern: &str,
) -> Result<LexerSpec, GrammarError> {
    let templates = tokens.values().cloned().collect();
    let ignore = TokenTemplate::new("__ignore__", ignore_pattern)?;
    Ok(LexerSpec::new(templates, ignore))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_table() -> HashMap<String, TokenTemplate> {
        let mut map = HashMap::new();
        map.insert("int".to_string(), TokenTemplate::new("int", "[0-9]+").unwrap());
        map.insert("plus".to_string(), TokenTemplate::new("plus", r"\+").unwrap());
        map
    }

    fn arithmetic_grammar() -> AttributeGrammar {
        // E -> INT | E + E
        AttributeGrammar {
            start: "E".to_string(),
            rules: vec![(
                "E".to_string(),
                vec![
                    ProductionRule::new(None, vec![0], vec![Symbol::Terminal("int".to_string())]),
                    ProductionRule::new(
                        Some("+"),
                        vec![0, 1, 2],
                        vec![
                            Symbol::Nonterminal("E".to_string()),
                            Symbol::Terminal("plus".to_string()),
                            Symbol::Nonterminal("E".to_string()),
                        ],
                    ),
                ],
            )],
        }
    }

    #[test]
    fn builds_a_self_recursive_grammar_without_error() {
        let mut store = RewriteStore::new();
        let tokens = token_table();
        let grammar = arithmetic_grammar();
        let start = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap();
        assert!(matches!(&*start, Parser::Variable(_)));
    }

    #[test]
    fn rejects_an_out_of_range_permutation_index() {
        let mut store = RewriteStore::new();
        let tokens = token_table();
        let grammar = AttributeGrammar {
            start: "E".to_string(),
            rules: vec![(
                "E".to_string(),
                vec![ProductionRule::new(
                    None,
                    vec![5],
                    vec![Symbol::Terminal("int".to_string())],
                )],
            )],
        };
        let err = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap_err();
        assert!(matches!(err, GrammarError::PermutationIndexOutOfRange { .. }));
    }

    #[test]
    fn rejects_an_undefined_nonterminal_reference() {
        let mut store = RewriteStore::new();
        let tokens = token_table();
        let grammar = AttributeGrammar {
            start: "E".to_string(),
            rules: vec![(
                "E".to_string(),
                vec![ProductionRule::new(
                    None,
                    vec![0],
                    vec![Symbol::Nonterminal("F".to_string())],
                )],
            )],
        };
        let err = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap_err();
        assert!(matches!(err, GrammarError::UndefinedNonterminal { .. }));
    }

    #[test]
    fn rejects_a_transparent_production_with_more_than_one_permutation_index() {
        let mut store = RewriteStore::new();
        let tokens = token_table();
        let grammar = AttributeGrammar {
            start: "E".to_string(),
            rules: vec![(
                "E".to_string(),
                vec![ProductionRule::new(
                    None,
                    vec![0, 1],
                    vec![Symbol::Terminal("int".to_string()), Symbol::Terminal("int".to_string())],
                )],
            )],
        };
        let err = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap_err();
        assert!(matches!(err, GrammarError::TransparentArityMismatch { .. }));
    }

    #[test]
    fn rejects_an_unknown_token_kind() {
        let mut store = RewriteStore::new();
        let tokens = token_table();
        let grammar = AttributeGrammar {
            start: "E".to_string(),
            rules: vec![(
                "E".to_string(),
                vec![ProductionRule::new(
                    None,
                    vec![0],
                    vec![Symbol::Terminal("frobnicate".to_string())],
                )],
            )],
        };
        let err = GrammarBuilder::build(&mut store, &grammar, &tokens).unwrap_err();
        assert!(matches!(err, GrammarError::UnknownTokenKind { .. }));
    }
}
