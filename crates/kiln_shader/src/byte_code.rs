//! Compiled Byte Code Handle
//!
//! [`CompiledShaderByteCode`] is the caller-facing wrapper around a
//! [`PendingCompileMarker`]. It adds:
//!
//! - **Payload caching**: the first time `Ready` is observed, the byte code
//!   is copied into the handle and the marker is released
//! - **Two access styles**: [`get_byte_code`](CompiledShaderByteCode::get_byte_code)
//!   is strict and fails unless `Ready`;
//!   [`try_get_byte_code`](CompiledShaderByteCode::try_get_byte_code) never
//!   blocks and reports the current state instead
//! - **Dependency tracking**: a [`DependencyToken`] the owning cache uses to
//!   decide when to discard and rebuild the handle
//!
//! A handle never recompiles by itself. When its dependency token goes stale
//! the owning cache must drop it and create a new one.
//!
//! ```rust,ignore
//! let vs = CompiledShaderByteCode::new(&service, "shaders/basic.vsh:main:vs_*", "");
//! match vs.try_get_byte_code() {
//!     (AssetState::Ready, Some(code)) => upload(&code),
//!     (AssetState::Pending, _) => { /* draw placeholder this frame */ }
//!     (AssetState::Invalid, _) => log::error!("{:?}", vs.errors()),
//!     _ => unreachable!(),
//! }
//! ```

use std::sync::Arc;

use kiln_assets::{
    AssetState, DepValPtr, DependencyToken, Payload, empty_payload, payload_as_text,
};
use parking_lot::Mutex;

use crate::errors::{Result, ShaderError};
use crate::marker::PendingCompileMarker;
use crate::res_id::ShaderStage;
use crate::service::ShaderService;

struct ByteCodeInner {
    state: AssetState,
    shader: Option<Payload>,
    errors: Option<Payload>,
    // Released once a terminal state has been absorbed.
    marker: Option<Arc<PendingCompileMarker>>,
}

pub struct CompiledShaderByteCode {
    initializer: String,
    stage: ShaderStage,
    dynamic_linkage: bool,
    dep_val: DepValPtr,
    inner: Mutex<ByteCodeInner>,
}

impl Default for CompiledShaderByteCode {
    /// A handle with nothing dispatched. It reports `Invalid`.
    fn default() -> Self {
        Self {
            initializer: String::new(),
            stage: ShaderStage::Null,
            dynamic_linkage: false,
            dep_val: DependencyToken::new(),
            inner: Mutex::new(ByteCodeInner {
                state: AssetState::Invalid,
                shader: None,
                errors: None,
                marker: None,
            }),
        }
    }
}

impl std::fmt::Debug for CompiledShaderByteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledShaderByteCode")
            .field("initializer", &self.initializer)
            .field("stage", &self.stage)
            .field("state", &self.inner.lock().state)
            .finish_non_exhaustive()
    }
}

impl CompiledShaderByteCode {
    /// Dispatches a compile of `initializer` immediately.
    #[must_use]
    pub fn new(service: &ShaderService, initializer: &str, defines: &str) -> Self {
        let marker = service.compile_from_file(initializer, defines);
        Self::with_token(marker, service.make_dependency_token())
    }

    /// Dispatches a compile of inline source immediately.
    #[must_use]
    pub fn from_memory(
        service: &ShaderService,
        source: &str,
        entry_point: &str,
        shader_model: &str,
        defines: &str,
    ) -> Self {
        let marker = service.compile_from_memory(source, entry_point, shader_model, defines);
        Self::with_token(marker, service.make_dependency_token())
    }

    /// Adopts an already dispatched marker.
    #[must_use]
    pub fn from_marker(marker: Arc<PendingCompileMarker>) -> Self {
        Self::with_token(marker, DependencyToken::new())
    }

    fn with_token(marker: Arc<PendingCompileMarker>, dep_val: DepValPtr) -> Self {
        let dynamic_linkage = marker
            .request()
            .is_some_and(|request| request.res_id.dynamic_linkage);
        Self {
            initializer: marker.name().to_string(),
            stage: marker.stage(),
            dynamic_linkage,
            dep_val,
            inner: Mutex::new(ByteCodeInner {
                state: AssetState::Pending,
                shader: None,
                errors: None,
                marker: Some(marker),
            }),
        }
    }

    /// Strict accessor for code that has already seen `Ready`.
    ///
    /// Fails with [`ShaderError::PendingAsset`] while the compile is running
    /// (a contract violation by the caller) and with
    /// [`ShaderError::InvalidAsset`] if it failed.
    pub fn get_byte_code(&self) -> Result<Payload> {
        match self.try_get_byte_code() {
            (AssetState::Ready, Some(code)) => Ok(code),
            (AssetState::Pending, _) => Err(ShaderError::PendingAsset(self.initializer.clone())),
            _ => Err(ShaderError::InvalidAsset {
                initializer: self.initializer.clone(),
                errors: self.errors().map(|e| payload_as_text(&e)).unwrap_or_default(),
            }),
        }
    }

    /// Never blocks. Returns the byte code only when `Ready`.
    ///
    /// The first terminal observation copies the marker's result into this
    /// handle and releases the marker.
    pub fn try_get_byte_code(&self) -> (AssetState, Option<Payload>) {
        let mut inner = self.inner.lock();
        match inner.state {
            AssetState::Ready => return (AssetState::Ready, inner.shader.clone()),
            AssetState::Invalid => return (AssetState::Invalid, None),
            AssetState::Pending => {}
        }

        let Some(marker) = inner.marker.clone() else {
            inner.state = AssetState::Invalid;
            return (AssetState::Invalid, None);
        };

        let (state, payload) = marker.try_resolve(&self.dep_val);
        match state {
            AssetState::Pending => (AssetState::Pending, None),
            AssetState::Ready => {
                log::trace!("Shader `{}` byte code cached", self.initializer);
                inner.state = AssetState::Ready;
                inner.shader = Some(payload.clone().unwrap_or_else(empty_payload));
                inner.errors = Some(marker.errors());
                inner.marker = None;
                (AssetState::Ready, inner.shader.clone())
            }
            AssetState::Invalid => {
                inner.state = AssetState::Invalid;
                inner.errors = Some(marker.errors());
                inner.marker = None;
                (AssetState::Invalid, None)
            }
        }
    }

    /// Blocks while the compile is pending, then caches the result.
    pub fn stall_while_pending(&self) -> AssetState {
        // The marker is cloned out so other threads can keep polling while
        // this one waits.
        let marker = self.inner.lock().marker.clone();
        if let Some(marker) = marker {
            marker.stall_while_pending();
        }
        self.try_get_byte_code().0
    }

    /// Async counterpart of [`stall_while_pending`](Self::stall_while_pending).
    pub async fn resolve_async(&self) -> AssetState {
        let marker = self.inner.lock().marker.clone();
        if let Some(marker) = marker {
            marker.wait().await;
        }
        self.try_get_byte_code().0
    }

    /// Cached state if terminal, otherwise the marker's live state.
    #[must_use]
    pub fn get_asset_state(&self) -> AssetState {
        self.try_get_byte_code().0
    }

    /// Compiler diagnostics. `None` while pending or if nothing was dispatched.
    #[must_use]
    pub fn errors(&self) -> Option<Payload> {
        let inner = self.inner.lock();
        match (&inner.errors, &inner.marker) {
            (Some(errors), _) => Some(errors.clone()),
            (None, Some(marker)) if marker.state().is_terminal() => Some(marker.errors()),
            _ => None,
        }
    }

    /// Token the owning cache polls to decide when to rebuild this handle.
    #[inline]
    #[must_use]
    pub fn dependency_validation(&self) -> &DepValPtr {
        &self.dep_val
    }

    #[inline]
    #[must_use]
    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    #[must_use]
    pub fn dynamic_linking_enabled(&self) -> bool {
        self.dynamic_linkage
    }
}
