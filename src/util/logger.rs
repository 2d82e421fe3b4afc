use std::fmt::{Debug, Display, Formatter};

use crate::token::Token;
use crate::util::Code;

use super::Log;

impl<T: Display> Display for Log<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Log::None => Ok(()),
            Log::Default(s) | Log::Success(s) | Log::Result(s) | Log::Verbose(s) => {
                write!(f, "{}", s)
            }
        }
    }
}

impl<TL: Display> Log<TL> {
    /// Traces one `extend(ch)` step of the lexer: the character consumed and the surviving
    /// continuations' tokens. Gated on `cfg(debug_assertions)`, mirroring the teacher's lexeme
    /// tracing convention; the rewrite runtime and oracle use `tracing` instead (SPEC_FULL.md §1A).
    pub fn log_step(&self, ch: char, index: usize, continuations: &[Vec<Token>], code: &Code) {
        #[cfg(debug_assertions)]
        if self.order() >= Log::Default(()).order() {
            println!(
                "[{}; LexerStep]: '{}' at {} -> {} continuation(s)",
                self,
                ch,
                code.obtain_position(index),
                continuations.len()
            );
            if self.order() >= Log::Verbose(()).order() {
                for c in continuations {
                    println!("    {:?}", c);
                }
            }
        }
        #[cfg(not(debug_assertions))]
        let _ = (ch, index, continuations, code);
    }
}
