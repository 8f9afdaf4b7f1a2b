//! Shader Service Settings
//!
//! ```rust,ignore
//! use kiln::ShaderServiceSettings;
//!
//! // Shipping build: two compile workers, no invalid-asset bookkeeping.
//! let settings = ShaderServiceSettings::default()
//!     .with_worker_threads(2)
//!     .with_invalid_asset_tracking(false);
//! ```

/// Default name prefix for compile threads.
pub const DEFAULT_THREAD_NAME: &str = "kiln-shader-compile";

/// Configuration for a [`ShaderService`](crate::ShaderService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderServiceSettings {
    /// Worker threads of the owned compile runtime. `None` uses the runtime
    /// default. Ignored when attaching to an existing runtime.
    pub worker_threads: Option<usize>,
    /// Name of compile runtime threads.
    pub thread_name: String,
    /// Record failed compiles in the invalid asset registry.
    pub track_invalid_assets: bool,
}

impl Default for ShaderServiceSettings {
    fn default() -> Self {
        Self {
            worker_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            track_invalid_assets: true,
        }
    }
}

impl ShaderServiceSettings {
    #[must_use]
    pub fn with_worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count.max(1));
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_invalid_asset_tracking(mut self, enabled: bool) -> Self {
        self.track_invalid_assets = enabled;
        self
    }
}
