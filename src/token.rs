//! Tokens (§3 "Token") and the DFA-backed partial-match engine that powers `nullable`/`nonempty`
//! (§4.4, §9 "Partial regex matching"). Grounded in `plotnik-compiler`'s use of `regex-automata`'s
//! dense DFA for byte-at-a-time incremental matching — a capability the teacher's whole-match,
//! `^`-anchored `regex::bytes::Regex` usage cannot express.

use std::rc::Rc;

use regex_automata::dfa::{dense, Automaton};
use regex_automata::util::primitives::StateID;
use regex_automata::{Anchored, Input};

use crate::error::GrammarError;

/// A token template's compiled pattern: a dense DFA stepped one byte at a time, exposing exactly
/// the two questions the lexer needs (§4.4): "does the accumulated prefix match completely?" and
/// "is the accumulated prefix a proper prefix of some accepted string?".
pub struct CompiledPattern {
    source: String,
    dfa: dense::DFA<Vec<u32>>,
}

impl CompiledPattern {
    pub fn new(source: &str) -> Result<Self, GrammarError> {
        let dfa = dense::DFA::new(source).map_err(|err| GrammarError::InvalidPattern {
            source: source.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            dfa,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn start_state(&self) -> StateID {
        let input = Input::new(b"").anchored(Anchored::Yes);
        self.dfa
            .start_state_forward(&input)
            .expect("anchored forward start state is always defined for a compiled pattern")
    }

    /// Replays `prefix` through the DFA, returning the resulting state, or `None` once the DFA
    /// reaches its dead state (no continuation of `prefix` can ever match `self`).
    fn drive(&self, prefix: &[u8]) -> Option<StateID> {
        let mut state = self.start_state();
        for &byte in prefix {
            state = self.dfa.next_state(state, byte);
            if self.dfa.is_dead_state(state) {
                return None;
            }
        }
        Some(state)
    }

    /// "Does `prefix` match the pattern completely?" (`Token::nullable`).
    pub fn fullmatch(&self, prefix: &[u8]) -> bool {
        match self.drive(prefix) {
            None => false,
            Some(state) => {
                let eoi_state = self.dfa.next_eoi_state(state);
                self.dfa.is_match_state(eoi_state)
            }
        }
    }

    /// "Is `prefix` a prefix of some string the pattern matches?" (`Token::nonempty`).
    pub fn nonempty(&self, prefix: &[u8]) -> bool {
        self.drive(prefix).is_some()
    }
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .finish()
    }
}

/// An opaque tag identifying a terminal (§3). Cheaply clonable; shared across every `Token`
/// instance of the same kind.
pub type TokenKind = Rc<str>;

/// A lexeme: either a terminal template (empty `prefix`, `is_complete = false`) or a token with
/// characters accumulated so far (§3). Structural identity is `(kind, prefix, is_complete)` —
/// `pattern` is a derived/cached artifact of `kind`, not distinguishing data, so it is excluded
/// from `Eq`/`Hash`/`Ord` (two tokens of the same kind always share the same template pattern).
#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub pattern: Rc<CompiledPattern>,
    pub prefix: String,
    pub is_complete: bool,
}

impl Token {
    pub fn new(kind: TokenKind, pattern: Rc<CompiledPattern>) -> Self {
        Self {
            kind,
            pattern,
            prefix: String::new(),
            is_complete: false,
        }
    }

    pub fn extend(&self, ch: char) -> Token {
        let mut prefix = self.prefix.clone();
        prefix.push(ch);
        Token {
            kind: self.kind.clone(),
            pattern: self.pattern.clone(),
            prefix,
            is_complete: false,
        }
    }

    pub fn complete(&self) -> Token {
        let mut t = self.clone();
        t.is_complete = true;
        t
    }

    pub fn nullable(&self) -> bool {
        self.pattern.fullmatch(self.prefix.as_bytes())
    }

    pub fn nonempty(&self) -> bool {
        self.pattern.nonempty(self.prefix.as_bytes())
    }

    /// Unifies a (typically unconsumed) template with an incoming token: defined exactly when
    /// their `kind`s agree, in which case the incoming token's full state is adopted (§4.3 "D").
    pub fn unify(&self, other: &Token) -> Option<Token> {
        if self.kind == other.kind {
            Some(other.clone())
        } else {
            None
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.prefix == other.prefix && self.is_complete == other.is_complete
    }
}
impl Eq for Token {}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.prefix.hash(state);
        self.is_complete.hash(state);
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Token {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.kind.as_ref(), &self.prefix, self.is_complete).cmp(&(
            other.kind.as_ref(),
            &other.prefix,
            other.is_complete,
        ))
    }
}
