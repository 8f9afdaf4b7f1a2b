#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Kiln
//!
//! Asynchronous, dependency-tracked shader compilation.
//!
//! Callers ask for a compiled shader by initializer string and immediately get
//! back a handle in the `Pending` state. The compile runs on a background
//! runtime; the handle can be polled without blocking, stalled on, or awaited.
//! Failures become `Invalid` handles carrying error text and are recorded in a
//! shared [`InvalidAssetRegistry`] that tooling can observe.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kiln::prelude::*;
//!
//! let service = Arc::new(ShaderService::new(ShaderServiceSettings::default())?);
//! service.add_compiler(Arc::new(MyHlslCompiler::default()));
//!
//! let ps = CompiledShaderByteCode::new(&service, "shaders/basic.psh:main:ps_*", "LIGHTS=4");
//! if ps.stall_while_pending() == AssetState::Ready {
//!     let code = ps.get_byte_code()?;
//! }
//! ```
//!
//! ## Crates
//!
//! - [`kiln_assets`]: asset state, dependency tokens, invalid asset registry
//! - [`kiln_shader`]: compile service, markers, byte code handles

pub mod assets {
    pub use kiln_assets::*;
}

pub mod shader {
    pub use kiln_shader::*;
}

pub use kiln_assets::{
    AssetState, DepValPtr, DependencyToken, DependencyValidation, DependentFileState,
    FileTimestampValidation, InvalidAssetRecord, InvalidAssetRegistry, Payload,
};
pub use kiln_shader::{
    CompileOutput, CompileRequest, CompiledShaderByteCode, LowLevelCompiler, PendingCompileMarker,
    ResId, ShaderDefines, ShaderError, ShaderProgram, ShaderService, ShaderServiceSettings,
    ShaderStage,
};

pub mod prelude {
    pub use crate::{
        AssetState, CompileOutput, CompiledShaderByteCode, InvalidAssetRegistry, LowLevelCompiler,
        ResId, ShaderDefines, ShaderError, ShaderProgram, ShaderService, ShaderServiceSettings,
        ShaderStage,
    };
}
