//! Low-Level Compiler Interface
//!
//! Back-ends that turn shader source into byte code plug into the
//! [`ShaderService`](crate::ShaderService) through [`LowLevelCompiler`].
//! The service keeps an ordered list of compilers and dispatches each request
//! to the first one whose [`accepts_model`](LowLevelCompiler::accepts_model)
//! returns `true`.

use kiln_assets::{DependentFileState, Payload, empty_payload};

use crate::res_id::ResId;

/// Output of one low-level compile.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// Byte code on success, `None` if the compiler rejected the source.
    pub byte_code: Option<Payload>,
    /// Diagnostics. May be non-empty on success (warnings).
    pub errors: Payload,
    /// Files the compile read, beyond the main source file.
    pub dependencies: Vec<DependentFileState>,
}

impl CompileOutput {
    #[must_use]
    pub fn success(byte_code: impl Into<Payload>) -> Self {
        Self {
            byte_code: Some(byte_code.into()),
            errors: empty_payload(),
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(errors: &str) -> Self {
        Self {
            byte_code: None,
            errors: Payload::from(errors.as_bytes()),
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: &str) -> Self {
        self.errors = Payload::from(errors.as_bytes());
        self
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<DependentFileState>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.byte_code.is_some()
    }
}

/// A shader compiler back-end.
///
/// Implementations are called from background threads and must not assume
/// any particular thread.
pub trait LowLevelCompiler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Whether this compiler handles the requested (possibly wildcard) model.
    fn accepts_model(&self, shader_model: &str) -> bool;

    /// Resolves a requested model token to the concrete one this compiler
    /// will use, e.g. `ps_*` to `ps_5_0`. Concrete tokens are usually
    /// returned unchanged.
    fn adapt_shader_model(&self, shader_model: &str) -> String;

    /// Compiles `source` for `res_id` with the given defines table.
    ///
    /// `res_id.shader_model` has already been adapted.
    fn do_low_level_compile(&self, source: &[u8], res_id: &ResId, defines: &str) -> CompileOutput;

    /// Human-readable metrics for compiled byte code.
    fn describe_byte_code(&self, byte_code: &[u8]) -> String {
        format!("{} bytes", byte_code.len())
    }
}
