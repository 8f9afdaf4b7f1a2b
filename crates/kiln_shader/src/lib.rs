//! Kiln Shader
//!
//! Asynchronous shader compilation:
//!
//! - [`ShaderService`]: compiler registry, initializer parsing and background
//!   dispatch
//! - [`PendingCompileMarker`]: the shared future of one compile
//! - [`CompiledShaderByteCode`] / [`ShaderProgram`]: caller-facing handles
//! - [`LowLevelCompiler`]: the trait a compiler back-end implements
//!
//! Initializers have the form `path:entry:model`, e.g.
//! `shaders/basic.psh:main:ps_*`. A `!` before the model requests dynamic
//! linkage.

pub mod byte_code;
pub mod compiler;
pub mod defines;
pub mod errors;
pub mod marker;
pub mod program;
pub mod res_id;
pub mod service;
pub mod settings;

pub use byte_code::CompiledShaderByteCode;
pub use compiler::{CompileOutput, LowLevelCompiler};
pub use defines::{DEFINE_SEPARATOR, ShaderDefines};
pub use errors::{Result, ShaderError};
pub use marker::{MarkerWait, PendingCompileMarker};
pub use program::ShaderProgram;
pub use res_id::{
    CompileRequest, DEFAULT_ENTRY_POINT, DEFAULT_SHADER_MODEL, DYNAMIC_LINKAGE_PREFIX, ResId,
    ShaderStage, is_wildcard_model,
};
pub use service::ShaderService;
pub use settings::{DEFAULT_THREAD_NAME, ShaderServiceSettings};
