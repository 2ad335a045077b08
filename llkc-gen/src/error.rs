//! Errors returned by the compiler driver.
//!
//! Problems in the grammar itself are [`Diagnostic`](crate::Diagnostic)s;
//! [`CompileError`] only summarizes them for callers that want a `Result`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The pipeline stopped after a stage that recorded errors.
    #[error("grammar has {errors} error(s); stopped after {stage}")]
    Fatal { errors: usize, stage: Stage },
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Validation,
    Lexer,
    Closure,
    Lookahead,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::Lexer => "lexer construction",
            Stage::Closure => "closure computation",
            Stage::Lookahead => "lookahead resolution",
        };
        f.write_str(name)
    }
}
