//! The incremental maximal-munch lexer (§4.4). Maintains, for a growing prefix, the set of
//! tokenizations still consistent with it — not a single tokenization, since a prefix like `"a p"`
//! with templates `{print, var=[a-z]+}` is ambiguous until more characters (or finalization)
//! arrive (§8 scenario 4).
//!
//! Grounded in the teacher's debug-gated stepwise tracing (`util::Log::log_step`) for the
//! character-at-a-time structure, generalized from the teacher's single committed tokenization to
//! the spec's set-of-continuations `LexerState`.

use std::rc::Rc;

use crate::error::GrammarError;
use crate::token::{CompiledPattern, Token, TokenKind};
use crate::util::{Code, Log};

/// One token template declared by a grammar's lexer spec (§4.4 "Specification input", §6).
#[derive(Clone)]
pub struct TokenTemplate {
    pub kind: TokenKind,
    pub pattern: Rc<CompiledPattern>,
}

impl TokenTemplate {
    pub fn new(kind: &str, regex: &str) -> Result<Self, GrammarError> {
        Ok(Self {
            kind: Rc::from(kind),
            pattern: Rc::new(CompiledPattern::new(regex)?),
        })
    }

    pub(crate) fn seed(&self) -> Token {
        Token::new(self.kind.clone(), self.pattern.clone())
    }
}

/// A lexer spec: every declared token template, plus the distinguished ignore-class template
/// (§4.4 "Ignore class"). `ignore` participates in lexing exactly like any other template; its
/// tokens are filtered out of the final output sequence rather than given special-cased matching.
pub struct LexerSpec {
    pub templates: Vec<TokenTemplate>,
    pub ignore: TokenTemplate,
}

impl LexerSpec {
    pub fn new(templates: Vec<TokenTemplate>, ignore: TokenTemplate) -> Self {
        Self { templates, ignore }
    }

    fn all_templates(&self) -> impl Iterator<Item = &TokenTemplate> {
        self.templates.iter().chain(std::iter::once(&self.ignore))
    }
}

/// One partial tokenization: a sequence of tokens whose last element may still be incomplete
/// (§4.4 "State"). `Vec<Token>` rather than a persistent list — continuations are short-lived,
/// rebuilt wholesale on every `extend`.
pub type Continuation = Vec<Token>;

/// The lexer's working set at a single prefix position: every continuation still consistent with
/// the characters consumed so far (§4.4 "State"). `committed` is always empty in this crate —
/// every continuation is kept relative to the start of the call's prefix, since the oracle
/// re-lexes from the longest cached proper prefix rather than splicing a separately-tracked
/// committed head onto new continuations (§4.4 "Memoization").
#[derive(Clone)]
pub struct LexerState {
    continuations: Vec<Continuation>,
}

impl LexerState {
    fn initial() -> Self {
        Self {
            continuations: vec![Vec::new()],
        }
    }

    /// `extend(ch)` (§4.4 "Step"): for every continuation, either start a fresh token (continuation
    /// empty, or its last token already nullable) or continue the in-progress last token, keeping
    /// every branch that survives.
    fn extend(&self, ch: char, spec: &LexerSpec) -> LexerState {
        let mut next = Vec::new();
        for continuation in &self.continuations {
            match continuation.split_last() {
                None => {
                    for template in spec.all_templates() {
                        let candidate = template.seed().extend(ch);
                        if candidate.nonempty() {
                            next.push(vec![candidate]);
                        }
                    }
                }
                Some((last, prefix)) => {
                    if last.nullable() {
                        for template in spec.all_templates() {
                            let candidate = template.seed().extend(ch);
                            if candidate.nonempty() {
                                let mut c = prefix.to_vec();
                                c.push(last.complete());
                                c.push(candidate);
                                next.push(c);
                            }
                        }
                    }
                    let continued = last.extend(ch);
                    if continued.nonempty() {
                        let mut c = prefix.to_vec();
                        c.push(continued);
                        next.push(c);
                    }
                }
            }
        }
        let mut state = LexerState { continuations: next };
        state.remove_nonmaximal_munch();
        state
    }

    /// Drops a continuation `c` if some other continuation `c'` agrees with it up to some position
    /// `i` but has a strictly longer, nullable token at `i` (§4.4 "Maximal munch"). `O(n^2)` over
    /// the (typically small) continuation set; correctness, not asymptotic elegance, is the goal
    /// here — the set stays bounded by the number of token templates times lex ambiguity depth.
    fn remove_nonmaximal_munch(&mut self) {
        let dominated: Vec<bool> = self
            .continuations
            .iter()
            .enumerate()
            .map(|(i, c)| {
                self.continuations
                    .iter()
                    .enumerate()
                    .any(|(j, other)| i != j && dominates(other, c))
            })
            .collect();
        let mut kept = Vec::new();
        for (continuation, is_dominated) in self.continuations.drain(..).zip(dominated) {
            if !is_dominated {
                kept.push(continuation);
            }
        }
        self.continuations = kept;
    }

    /// `finalize()` (§4.4): keeps only continuations whose last token is nullable, marking it
    /// complete. A continuation with no tokens at all (empty prefix) finalizes to itself.
    fn finalize(&self) -> Vec<Continuation> {
        self.continuations
            .iter()
            .filter_map(|c| match c.split_last() {
                None => Some(Vec::new()),
                Some((last, prefix)) if last.nullable() => {
                    let mut out = prefix.to_vec();
                    out.push(last.complete());
                    Some(out)
                }
                Some(_) => None,
            })
            .collect()
    }

    fn continuations(&self) -> &[Continuation] {
        &self.continuations
    }
}

/// `first_divergence(a, b)`: the first index at which two continuations' tokens differ, used by
/// `dominates` to locate the position maximal munch compares (§4.4 "Maximal munch").
fn first_divergence(a: &[Token], b: &[Token]) -> Option<usize> {
    a.iter().zip(b.iter()).position(|(x, y)| x != y)
}

/// True if `longer` dominates `shorter` under §4.4's maximal-munch rule: they agree up to the
/// point of divergence, and at that point `longer`'s token is both strictly longer-prefixed and
/// nullable.
fn dominates(longer: &[Token], shorter: &[Token]) -> bool {
    match first_divergence(longer, shorter) {
        Some(i) if i < longer.len() && i < shorter.len() => {
            let l = &longer[i];
            let s = &shorter[i];
            l.prefix.len() > s.prefix.len() && l.nullable()
        }
        _ => false,
    }
}

/// Strips ignore-kind tokens from a finalized or partial continuation (§4.4 "Ignore class").
fn remove_ignored(spec: &LexerSpec, continuation: Continuation) -> Continuation {
    continuation
        .into_iter()
        .filter(|t| t.kind != spec.ignore.kind)
        .collect()
}

/// An incremental lexer bound to one `LexerSpec`, memoizing `LexerState` by prefix length so that
/// `state_for` only ever replays the characters past the longest cached proper prefix (§4.4
/// "Memoization").
pub struct Lexer {
    spec: LexerSpec,
    cache: Vec<(String, LexerState)>,
    log: Log<&'static str>,
}

impl Lexer {
    pub fn new(spec: LexerSpec) -> Self {
        Self {
            spec,
            cache: vec![(String::new(), LexerState::initial())],
            log: Log::None,
        }
    }

    pub fn with_log(mut self, log: Log<&'static str>) -> Self {
        self.log = log;
        self
    }

    /// Drops every cached prefix state, keeping only the empty-prefix seed (§5 "Memoization / cache
    /// lifetime": callers working on unrelated prefixes should periodically reset).
    pub fn reset(&mut self) {
        self.cache.truncate(1);
    }

    /// Finds the longest cached proper prefix of `prefix`, then extends character-by-character to
    /// reach it, caching every intermediate state along the way.
    fn state_for(&mut self, prefix: &str) -> LexerState {
        if let Some((_, state)) = self.cache.iter().find(|(p, _)| p == prefix) {
            return state.clone();
        }
        let (start_len, mut state) = self
            .cache
            .iter()
            .filter(|(p, _)| prefix.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .map(|(p, s)| (p.len(), s.clone()))
            .unwrap_or((0, LexerState::initial()));

        let code = Code::new(prefix.as_bytes());
        let mut index = start_len;
        for ch in prefix[start_len..].chars() {
            state = state.extend(ch, &self.spec);
            self.log.log_step(ch, index, state.continuations(), &code);
            index += ch.len_utf8();
            self.cache.push((prefix[..index].to_string(), state.clone()));
        }
        state
    }

    /// `partial_lex(p)` (§4.4): every continuation, ignore-filtered, without requiring the last
    /// token to be nullable.
    pub fn partial_lex(&mut self, prefix: &str) -> Vec<Continuation> {
        let state = self.state_for(prefix);
        state
            .continuations
            .into_iter()
            .map(|c| remove_ignored(&self.spec, c))
            .collect()
    }

    /// `lex(p)` (§4.4): finalized continuations only — every surviving sequence's last token is
    /// nullable and marked complete.
    pub fn lex(&mut self, prefix: &str) -> Vec<Continuation> {
        let state = self.state_for(prefix);
        state
            .finalize()
            .into_iter()
            .map(|c| remove_ignored(&self.spec, c))
            .collect()
    }
}
