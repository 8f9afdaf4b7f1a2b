//! Error Types
//!
//! # Overview
//!
//! [`ShaderError`] covers every failure mode of the compile pipeline:
//! - Initializer parse errors and unknown shader models
//! - Missing compilers for a requested model
//! - Source read failures and background task failures
//! - Contract violations of the strict byte code accessor
//!
//! Inside the pipeline these errors never propagate as panics; they are
//! rendered to text and become the error payload of an Invalid marker.

use kiln_assets::AssetState;
use thiserror::Error;

use crate::res_id::ShaderStage;

#[derive(Error, Debug)]
pub enum ShaderError {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The initializer string could not be parsed.
    #[error("Malformed shader initializer `{initializer}`: {reason}")]
    MalformedInitializer {
        initializer: String,
        reason: String,
    },

    /// The shader model token does not name a known stage.
    #[error("Unknown shader model `{0}`")]
    UnknownShaderModel(String),

    /// No registered compiler accepts the requested shader model.
    #[error("No shader compiler registered for model `{model}` (requested by `{initializer}`)")]
    NoCompiler { initializer: String, model: String },

    // ========================================================================
    // Compile Errors
    // ========================================================================
    /// Reading the shader source failed.
    #[error("Failed to read shader source `{path}`: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A background compile task panicked.
    #[error("Shader compile task failed: {0}")]
    TaskJoin(String),

    /// A background compile task was dropped before it completed.
    #[error("Shader compile task for `{0}` was dropped before completion")]
    TaskAbandoned(String),

    // ========================================================================
    // Access Errors
    // ========================================================================
    /// Strict accessor called before the compile finished.
    #[error("Shader `{0}` is still pending")]
    PendingAsset(String),

    /// Strict accessor called on a failed compile.
    #[error("Shader `{initializer}` is invalid: {errors}")]
    InvalidAsset { initializer: String, errors: String },

    /// A byte code handle was placed in a program slot of another stage.
    #[error("Shader `{initializer}` has stage {found:?}, expected {expected:?}")]
    StageMismatch {
        initializer: String,
        expected: ShaderStage,
        found: ShaderStage,
    },

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// The compile runtime could not be created.
    #[error("Failed to create shader compile runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ShaderError {
    /// The asset state a failed access corresponds to.
    #[must_use]
    pub fn asset_state(&self) -> AssetState {
        match self {
            Self::PendingAsset(_) => AssetState::Pending,
            _ => AssetState::Invalid,
        }
    }
}

impl From<tokio::task::JoinError> for ShaderError {
    fn from(err: tokio::task::JoinError) -> Self {
        ShaderError::TaskJoin(err.to_string())
    }
}

/// Alias for `Result<T, ShaderError>`.
pub type Result<T> = std::result::Result<T, ShaderError>;
