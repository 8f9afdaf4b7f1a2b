//! Pending Compile Marker
//!
//! One asynchronous compile's future. A marker is created by the
//! [`ShaderService`](crate::ShaderService) at dispatch time and shared (via
//! `Arc`) between the background task that completes it and every caller
//! polling it.
//!
//! # State machine
//!
//! ```text
//! Pending ──► Ready
//!    └──────► Invalid
//! ```
//!
//! Terminal states never revert; a fresh request produces a fresh marker.
//!
//! # Access styles
//!
//! - [`resolve`](PendingCompileMarker::resolve) and
//!   [`stall_while_pending`](PendingCompileMarker::stall_while_pending) block
//!   the calling thread (no timeout)
//! - [`try_resolve`](PendingCompileMarker::try_resolve) never blocks
//! - [`wait`](PendingCompileMarker::wait) returns a future for async callers

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use kiln_assets::{
    AssetState, DependencyToken, DependentFileState, InvalidAssetRegistry, Payload, empty_payload,
    payload_as_text, text_payload,
};
use parking_lot::{Condvar, Mutex};

use crate::compiler::CompileOutput;
use crate::errors::ShaderError;
use crate::res_id::{CompileRequest, ShaderStage};

struct MarkerInner {
    state: AssetState,
    payload: Option<Payload>,
    errors: Payload,
    dependencies: Vec<DependentFileState>,
    wakers: Vec<Waker>,
}

pub struct PendingCompileMarker {
    name: String,
    stage: ShaderStage,
    request: Option<CompileRequest>,
    invalid_assets: Option<Arc<InvalidAssetRegistry>>,
    inner: Mutex<MarkerInner>,
    condvar: Condvar,
}

impl std::fmt::Debug for PendingCompileMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCompileMarker")
            .field("name", &self.name)
            .field("stage", &self.stage)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PendingCompileMarker {
    /// Creates a marker in the `Pending` state for `request`.
    ///
    /// When `invalid_assets` is given, the terminal transition records the
    /// outcome there under the request's normalized initializer.
    #[must_use]
    pub fn new_pending(
        request: CompileRequest,
        invalid_assets: Option<Arc<InvalidAssetRegistry>>,
    ) -> Arc<Self> {
        let name = request.res_id.to_string();
        Self::new_pending_named(name, request, invalid_assets)
    }

    /// Like [`new_pending`](Self::new_pending), but records the outcome under
    /// `name` instead of the request's initializer.
    ///
    /// The service passes the initializer as requested (before model
    /// adaptation), so failures before and after dispatch share one record.
    #[must_use]
    pub fn new_pending_named(
        name: impl Into<String>,
        request: CompileRequest,
        invalid_assets: Option<Arc<InvalidAssetRegistry>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            stage: request.res_id.stage(),
            request: Some(request),
            invalid_assets,
            inner: Mutex::new(MarkerInner {
                state: AssetState::Pending,
                payload: None,
                errors: empty_payload(),
                dependencies: Vec::new(),
                wakers: Vec::new(),
            }),
            condvar: Condvar::new(),
        })
    }

    /// Creates a marker that is already `Invalid`.
    ///
    /// Used for requests that fail before anything is dispatched. The failure
    /// is recorded in `invalid_assets` when one is given.
    #[must_use]
    pub fn new_invalid(
        name: &str,
        stage: ShaderStage,
        error: &ShaderError,
        invalid_assets: Option<Arc<InvalidAssetRegistry>>,
    ) -> Arc<Self> {
        let message = error.to_string();
        if let Some(registry) = &invalid_assets {
            registry.mark_invalid(name, &message);
        }
        log::warn!("Shader `{name}` rejected before dispatch: {message}");

        Arc::new(Self {
            name: name.to_string(),
            stage,
            request: None,
            invalid_assets,
            inner: Mutex::new(MarkerInner {
                state: AssetState::Invalid,
                payload: None,
                errors: text_payload(&message),
                dependencies: Vec::new(),
                wakers: Vec::new(),
            }),
            condvar: Condvar::new(),
        })
    }

    /// Normalized initializer; the key used in the invalid asset registry.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Known from request parsing, so available while still pending.
    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// The dispatched request. `None` for markers rejected before dispatch.
    #[inline]
    #[must_use]
    pub fn request(&self) -> Option<&CompileRequest> {
        self.request.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> AssetState {
        self.inner.lock().state
    }

    /// Non-fatal diagnostics; may be non-empty even when `Ready`.
    #[must_use]
    pub fn errors(&self) -> Payload {
        self.inner.lock().errors.clone()
    }

    /// File dependencies reported so far (complete once terminal).
    #[must_use]
    pub fn dependencies(&self) -> Vec<DependentFileState> {
        self.inner.lock().dependencies.clone()
    }

    /// Blocks until terminal, then returns the byte code (`Ready`) or the
    /// error payload (`Invalid`). The returned state disambiguates the two.
    ///
    /// The compile's file dependencies are registered on `dep_val`.
    pub fn resolve(&self, dep_val: &DependencyToken) -> (AssetState, Payload) {
        let mut inner = self.inner.lock();
        while !inner.state.is_terminal() {
            self.condvar.wait(&mut inner);
        }
        dep_val.register_file_dependencies(&inner.dependencies);

        match inner.state {
            AssetState::Ready => (
                AssetState::Ready,
                inner.payload.clone().unwrap_or_else(empty_payload),
            ),
            state => (state, inner.errors.clone()),
        }
    }

    /// Never blocks. Returns the byte code only when `Ready`.
    ///
    /// Once terminal, the compile's file dependencies are registered on
    /// `dep_val`.
    pub fn try_resolve(&self, dep_val: &DependencyToken) -> (AssetState, Option<Payload>) {
        let inner = self.inner.lock();
        if inner.state.is_terminal() {
            dep_val.register_file_dependencies(&inner.dependencies);
        }
        match inner.state {
            AssetState::Ready => (AssetState::Ready, inner.payload.clone()),
            state => (state, None),
        }
    }

    /// Blocks only while `Pending`.
    pub fn stall_while_pending(&self) -> AssetState {
        let mut inner = self.inner.lock();
        while !inner.state.is_terminal() {
            self.condvar.wait(&mut inner);
        }
        inner.state
    }

    /// Future that resolves to the terminal state.
    #[must_use]
    pub fn wait(self: &Arc<Self>) -> MarkerWait {
        MarkerWait {
            marker: Arc::clone(self),
        }
    }

    /// Publishes the result of a compile.
    ///
    /// Only the first completion takes effect; later ones are ignored. The
    /// invalid asset registry is updated under the marker lock, before the
    /// terminal state becomes visible, so the registry always agrees with the
    /// winning completion and any observer of the terminal state also
    /// observes the registry entry.
    ///
    /// Lock order is marker, then registry. Registry change listeners must
    /// not call back into markers.
    pub fn complete(&self, output: CompileOutput) {
        let succeeded = output.succeeded();
        let state = if succeeded {
            AssetState::Ready
        } else {
            AssetState::Invalid
        };

        let wakers = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                log::warn!("Ignoring second completion of shader `{}`", self.name);
                return;
            }

            if let Some(registry) = &self.invalid_assets {
                if succeeded {
                    registry.mark_valid(&self.name);
                } else {
                    registry.mark_invalid(&self.name, &payload_as_text(&output.errors));
                }
            }

            inner.state = state;
            inner.payload = output.byte_code;
            inner.errors = output.errors;
            inner.dependencies = output.dependencies;
            std::mem::take(&mut inner.wakers)
        };
        log::debug!("Shader `{}` resolved: {state}", self.name);

        self.condvar.notify_all();
        for waker in wakers {
            waker.wake();
        }
    }

    /// Completes the marker as `Invalid` with `error` as its error text.
    pub fn fail(&self, error: &ShaderError) {
        self.complete(CompileOutput::failure(&error.to_string()));
    }
}

/// Future returned by [`PendingCompileMarker::wait`].
#[must_use = "futures do nothing unless polled"]
pub struct MarkerWait {
    marker: Arc<PendingCompileMarker>,
}

impl Future for MarkerWait {
    type Output = AssetState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.marker.inner.lock();
        if inner.state.is_terminal() {
            return Poll::Ready(inner.state);
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Completion guard owned by a background compile task.
///
/// If the task is dropped before completing (runtime shutdown), the marker
/// is failed so that nobody stalls on it forever.
pub(crate) struct MarkerCompletion {
    marker: Option<Arc<PendingCompileMarker>>,
}

impl MarkerCompletion {
    pub(crate) fn new(marker: Arc<PendingCompileMarker>) -> Self {
        Self {
            marker: Some(marker),
        }
    }

    pub(crate) fn complete(mut self, output: CompileOutput) {
        if let Some(marker) = self.marker.take() {
            marker.complete(output);
        }
    }

    pub(crate) fn fail(mut self, error: &ShaderError) {
        if let Some(marker) = self.marker.take() {
            marker.fail(error);
        }
    }
}

impl Drop for MarkerCompletion {
    fn drop(&mut self) {
        if let Some(marker) = self.marker.take() {
            marker.fail(&ShaderError::TaskAbandoned(marker.name().to_string()));
        }
    }
}
