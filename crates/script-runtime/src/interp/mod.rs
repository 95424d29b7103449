//! Embedded interpreter for tenant scripts.
//!
//! Scripts are written in a small, statement-oriented subset of JavaScript:
//! declarations, conditionals, loops, `try`/`catch`, and calls into the
//! capability namespaces. The pipeline is lexer, parser, AST, and a
//! tree-walking evaluator driven by an [`ExecutionMonitor`](crate::monitor::ExecutionMonitor).
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::interp;
//!
//! let program = interp::parse("const a = 1;", 64).unwrap();
//! assert_eq!(program.len(), 1);
//!
//! let err = interp::parse("function f() {}", 64).unwrap_err();
//! assert!(err.is_compilation_error());
//! ```

mod ast;
mod eval;
mod lexer;
mod parser;
mod value;

pub use eval::execute;
pub use value::number_to_string;

use tenant_script_core::{Result, SandboxConfig};

/// A parsed script, ready to run any number of times.
///
/// The nesting limit it was parsed with also bounds the arrays and objects
/// it may build at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    ast: ast::Program,
    max_depth: usize,
}

impl Program {
    /// Number of top-level statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ast.body.len()
    }

    /// Returns `true` for a script with no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ast.body.is_empty()
    }

    /// Deepest array/object nesting a run may build.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub(crate) const fn ast(&self) -> &ast::Program {
        &self.ast
    }
}

/// Parses script text, rejecting nesting deeper than `max_depth`.
///
/// `max_depth` is capped at [`SandboxConfig::MAX_DEPTH_CEILING`].
///
/// # Errors
///
/// Returns [`Error::CompilationError`](tenant_script_core::Error::CompilationError)
/// with a line:column position when the text is not a valid script.
pub fn parse(source: &str, max_depth: usize) -> Result<Program> {
    let max_depth = max_depth.min(SandboxConfig::MAX_DEPTH_CEILING);
    parser::parse(source, max_depth).map(|ast| Program { ast, max_depth })
}
