//! Script compilation with vetting and caching.
//!
//! [`ScriptCompiler`] is the single way script text becomes a runnable
//! [`Program`]: it runs the static gate, enforces the size limit, and parses
//! under the nesting limit, caching results by content hash.
//!
//! # Examples
//!
//! ```
//! use tenant_script_runtime::compiler::ScriptCompiler;
//! use tenant_script_core::SandboxConfig;
//!
//! let compiler = ScriptCompiler::new(&SandboxConfig::default());
//! assert!(compiler.compile("const a = 1;").is_ok());
//! assert!(compiler.compile("window.close()").unwrap_err().is_forbidden_global());
//! assert!(compiler.compile("const = ;").unwrap_err().is_compilation_error());
//! ```

use crate::cache::ProgramCache;
use crate::interp::{self, Program};
use crate::security::ScriptPolicy;
use std::sync::Arc;
use std::time::Instant;
use tenant_script_core::{Error, Result, SandboxConfig};

/// Vets, parses and caches scripts.
#[derive(Debug)]
pub struct ScriptCompiler {
    policy: ScriptPolicy,
    cache: ProgramCache,
    max_script_bytes: usize,
    max_depth: usize,
}

impl ScriptCompiler {
    /// Creates a compiler with the limits and deny-list of `config`.
    #[must_use]
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            policy: ScriptPolicy::from_config(config),
            cache: ProgramCache::new(config.cache_capacity),
            max_script_bytes: config.max_script_bytes,
            max_depth: config.max_depth,
        }
    }

    /// The static gate this compiler applies.
    #[must_use]
    pub const fn policy(&self) -> &ScriptPolicy {
        &self.policy
    }

    /// The program cache.
    #[must_use]
    pub const fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Gates, size-checks and parses `script`.
    ///
    /// # Errors
    ///
    /// [`Error::ForbiddenGlobalUsage`] when the gate trips, otherwise
    /// [`Error::CompilationError`] for oversized or malformed scripts.
    pub fn compile(&self, script: &str) -> Result<Arc<Program>> {
        self.policy.check(script)?;

        if script.len() > self.max_script_bytes {
            return Err(Error::CompilationError {
                details: format!(
                    "script is {} bytes, limit is {}",
                    script.len(),
                    self.max_script_bytes
                ),
            });
        }

        let key = ProgramCache::cache_key_for_script(script);
        if let Some(program) = self.cache.get(&key) {
            tracing::debug!("Using cached program: {}", &key.as_str()[..16]);
            return Ok(program);
        }

        let start = Instant::now();
        let program = interp::parse(script, self.max_depth).map_err(|err| {
            tracing::debug!(error = %err, "script failed to compile");
            err
        })?;
        tracing::debug!(
            statements = program.len(),
            elapsed = ?start.elapsed(),
            "script compiled"
        );

        let program = Arc::new(program);
        self.cache.insert(key, Arc::clone(&program));
        Ok(program)
    }
}
