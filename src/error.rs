use thiserror::Error;

/// A malformed pattern, flags string or options string.
///
/// This is the only error a caller of the engine ever sees. It is cached
/// together with the source that produced it, so it has to be cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid regular expression: /{pattern}/: {message}")]
pub struct RegexSyntaxError {
    pub pattern: String,
    pub message: String,
    /// Offset (in pattern chars) at which the error was detected.
    pub position: usize,
}

impl RegexSyntaxError {
    pub fn new(pattern: &str, message: impl Into<String>, position: usize) -> Self {
        Self {
            pattern: pattern.to_string(),
            message: message.into(),
            position,
        }
    }
}

/// Everything that can stop the deterministic engine from producing an
/// automaton.
///
/// Only `Syntax` is ever surfaced to callers. The other variants make the
/// engine switch to the backtracking matcher.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] RegexSyntaxError),

    #[error("unsupported construct: {0}")]
    Unsupported(String),

    #[error("DFA state limit exceeded: {states} states (max: {max})")]
    StateExplosion { states: usize, max: usize },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type CompileResult<T> = Result<T, CompileError>;

pub(crate) fn unsupported<T>(what: impl Into<String>) -> CompileResult<T> {
    Err(CompileError::Unsupported(what.into()))
}

pub(crate) fn internal<T>(what: impl Into<String>) -> CompileResult<T> {
    Err(CompileError::Internal(what.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = RegexSyntaxError::new("a(", "unterminated group", 2);
        assert_eq!(
            err.to_string(),
            "Invalid regular expression: /a(/: unterminated group"
        );
    }

    #[test]
    fn syntax_error_converts_into_compile_error() {
        let err: CompileError = RegexSyntaxError::new("*", "nothing to repeat", 0).into();
        assert!(matches!(err, CompileError::Syntax(_)));
        assert!(err.to_string().contains("nothing to repeat"));
    }

    #[test]
    fn state_explosion_display() {
        let err = CompileError::StateExplosion { states: 2401, max: 2400 };
        assert!(err.to_string().contains("2401"));
    }
}
