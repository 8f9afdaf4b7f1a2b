//! Shader Compile Registry
//!
//! [`ShaderService`] owns the registered compiler back-ends, parses
//! initializer strings, dispatches compiles onto a background runtime and
//! hands back a [`PendingCompileMarker`] per request.
//!
//! The service is an explicit object: a bootstrap component constructs it
//! once and shares it (`Arc<ShaderService>`) with every consumer.
//!
//! # Compiler selection
//!
//! Compilers are consulted in registration order; the first one whose
//! [`accepts_model`](LowLevelCompiler::accepts_model) returns `true` for the
//! requested model wins. Overlapping registrations are not detected.
//!
//! # Failure handling
//!
//! No request ever panics or blocks the caller. Parse errors, missing
//! compilers, unreadable sources and compiler rejections all produce an
//! `Invalid` marker carrying descriptive error text; everything except parse
//! errors is also recorded in the [`InvalidAssetRegistry`].

use std::path::Path;
use std::sync::Arc;

use kiln_assets::{
    DependencyToken, DependencyValidation, DependentFileState, FileTimestampValidation,
    InvalidAssetRegistry,
};
use parking_lot::RwLock;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::compiler::{CompileOutput, LowLevelCompiler};
use crate::errors::{Result, ShaderError};
use crate::marker::{MarkerCompletion, PendingCompileMarker};
use crate::res_id::{CompileRequest, ResId, ShaderStage, is_wildcard_model};
use crate::settings::ShaderServiceSettings;

enum RuntimeHost {
    Owned(Runtime),
    Attached(Handle),
}

impl RuntimeHost {
    fn handle(&self) -> &Handle {
        match self {
            Self::Owned(runtime) => runtime.handle(),
            Self::Attached(handle) => handle,
        }
    }
}

enum SourceKind {
    File,
    Memory(Vec<u8>),
}

pub struct ShaderService {
    compilers: RwLock<Vec<Arc<dyn LowLevelCompiler>>>,
    runtime: RuntimeHost,
    invalid_assets: Arc<InvalidAssetRegistry>,
    dependency_validation: Arc<dyn DependencyValidation>,
    settings: ShaderServiceSettings,
}

impl std::fmt::Debug for ShaderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .compilers
            .read()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        f.debug_struct("ShaderService")
            .field("compilers", &names)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ShaderService {
    /// Creates a service with its own multi-threaded compile runtime.
    ///
    /// The owned runtime is shut down when the service is dropped; do not
    /// drop the last reference from inside an async context.
    pub fn new(settings: ShaderServiceSettings) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.thread_name(settings.thread_name.clone()).enable_all();
        if let Some(count) = settings.worker_threads {
            builder.worker_threads(count);
        }
        let runtime = builder.build()?;
        log::info!(
            "Shader service started ({} worker threads)",
            settings
                .worker_threads
                .map_or_else(|| "default".to_string(), |n| n.to_string())
        );
        Ok(Self::with_host(RuntimeHost::Owned(runtime), settings))
    }

    /// Creates a service that dispatches onto an existing runtime.
    #[must_use]
    pub fn with_runtime_handle(handle: Handle, settings: ShaderServiceSettings) -> Self {
        Self::with_host(RuntimeHost::Attached(handle), settings)
    }

    fn with_host(runtime: RuntimeHost, settings: ShaderServiceSettings) -> Self {
        Self {
            compilers: RwLock::new(Vec::new()),
            runtime,
            invalid_assets: Arc::new(InvalidAssetRegistry::new(settings.track_invalid_assets)),
            dependency_validation: Arc::new(FileTimestampValidation),
            settings,
        }
    }

    /// Replaces the dependency validator (default: [`FileTimestampValidation`]).
    #[must_use]
    pub fn with_dependency_validation(mut self, validation: Arc<dyn DependencyValidation>) -> Self {
        self.dependency_validation = validation;
        self
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ShaderServiceSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn invalid_assets(&self) -> &Arc<InvalidAssetRegistry> {
        &self.invalid_assets
    }

    #[inline]
    #[must_use]
    pub fn dependency_validation(&self) -> &Arc<dyn DependencyValidation> {
        &self.dependency_validation
    }

    /// Builds an empty dependency token through the configured validator.
    #[must_use]
    pub fn make_dependency_token(&self) -> Arc<DependencyToken> {
        self.dependency_validation.build(&[])
    }

    /// Whether nothing `token` depends on has changed.
    #[must_use]
    pub fn is_dependency_valid(&self, token: &DependencyToken) -> bool {
        self.dependency_validation.is_valid(token)
    }

    // ========================================================================
    // Compiler Registration
    // ========================================================================

    /// Appends a compiler. Earlier registrations take precedence.
    pub fn add_compiler(&self, compiler: Arc<dyn LowLevelCompiler>) {
        log::debug!("Registered shader compiler `{}`", compiler.name());
        self.compilers.write().push(compiler);
    }

    #[must_use]
    pub fn compiler_count(&self) -> usize {
        self.compilers.read().len()
    }

    /// First registered compiler accepting `shader_model`.
    #[must_use]
    pub fn find_compiler(&self, shader_model: &str) -> Option<Arc<dyn LowLevelCompiler>> {
        self.compilers
            .read()
            .iter()
            .find(|c| c.accepts_model(shader_model))
            .cloned()
    }

    /// Byte code metrics from the compiler that handles `shader_model`.
    #[must_use]
    pub fn describe_byte_code(&self, shader_model: &str, byte_code: &[u8]) -> Option<String> {
        self.find_compiler(shader_model)
            .map(|compiler| compiler.describe_byte_code(byte_code))
    }

    // ========================================================================
    // Request Parsing
    // ========================================================================

    /// Parses `initializer` and adapts its shader model for `compiler`.
    ///
    /// Pure: performs no I/O. Fails if the initializer is malformed or the
    /// adapted model does not name a concrete stage.
    pub fn make_res_id(initializer: &str, compiler: &dyn LowLevelCompiler) -> Result<ResId> {
        let mut res_id = ResId::parse(initializer)?;
        let adapted = compiler.adapt_shader_model(&res_id.shader_model);
        let adapted = adapted.trim_start_matches(crate::res_id::DYNAMIC_LINKAGE_PREFIX);
        if ShaderStage::from_model(adapted) == ShaderStage::Null || is_wildcard_model(adapted) {
            return Err(ShaderError::UnknownShaderModel(adapted.to_string()));
        }
        adapted.clone_into(&mut res_id.shader_model);
        Ok(res_id)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Starts compiling the shader named by `initializer` (`path:entry:model`).
    ///
    /// Never blocks; the returned marker may already be `Invalid`.
    pub fn compile_from_file(&self, initializer: &str, defines: &str) -> Arc<PendingCompileMarker> {
        self.dispatch(initializer, defines, SourceKind::File)
    }

    /// Starts compiling inline source text.
    ///
    /// Only dependencies reported by the compiler are tracked.
    pub fn compile_from_memory(
        &self,
        source: &str,
        entry_point: &str,
        shader_model: &str,
        defines: &str,
    ) -> Arc<PendingCompileMarker> {
        let initializer = ResId::for_memory(source, entry_point, shader_model).to_string();
        self.dispatch(
            &initializer,
            defines,
            SourceKind::Memory(source.as_bytes().to_vec()),
        )
    }

    fn dispatch(&self, initializer: &str, defines: &str, source: SourceKind) -> Arc<PendingCompileMarker> {
        let parsed = match ResId::parse(initializer) {
            Ok(res_id) => res_id,
            Err(err) => {
                return PendingCompileMarker::new_invalid(initializer, ShaderStage::Null, &err, None);
            }
        };

        // Every outcome of this request is recorded under the initializer as
        // requested (defaults filled in, model not adapted), so a later
        // success clears a record left by any earlier failure.
        let name = parsed.to_string();
        let registry = Some(Arc::clone(&self.invalid_assets));

        let Some(compiler) = self.find_compiler(&parsed.shader_model) else {
            let err = ShaderError::NoCompiler {
                initializer: name.clone(),
                model: parsed.shader_model.clone(),
            };
            return PendingCompileMarker::new_invalid(&name, parsed.stage(), &err, registry);
        };

        let res_id = match Self::make_res_id(initializer, compiler.as_ref()) {
            Ok(res_id) => res_id,
            Err(err) => {
                return PendingCompileMarker::new_invalid(&name, parsed.stage(), &err, registry);
            }
        };

        let request = CompileRequest::new(res_id, defines);
        let marker = PendingCompileMarker::new_pending_named(name, request.clone(), registry);
        log::debug!(
            "Dispatching shader `{}` as `{}` to compiler `{}`",
            marker.name(),
            request.res_id,
            compiler.name()
        );

        let completion = MarkerCompletion::new(Arc::clone(&marker));
        self.runtime
            .handle()
            .spawn(run_compile(compiler, request, source, completion));
        marker
    }
}

/// Background half of a dispatch: read the source, compile on the blocking
/// pool, publish the result.
async fn run_compile(
    compiler: Arc<dyn LowLevelCompiler>,
    request: CompileRequest,
    source: SourceKind,
    completion: MarkerCompletion,
) {
    let (bytes, main_file) = match source {
        SourceKind::Memory(bytes) => (bytes, None),
        SourceKind::File => {
            let path = request.res_id.filename.clone();
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let state = capture_file_state(&path).await;
                    (bytes, Some(state))
                }
                Err(source) => {
                    // Depend on the missing file so creating it counts as a change.
                    let state = capture_file_state(&path).await;
                    let error = ShaderError::SourceRead { path, source };
                    completion.complete(
                        CompileOutput::failure(&error.to_string()).with_dependencies(vec![state]),
                    );
                    return;
                }
            }
        }
    };

    let compiled = tokio::task::spawn_blocking(move || {
        compiler.do_low_level_compile(&bytes, &request.res_id, &request.defines)
    })
    .await;

    match compiled {
        Ok(mut output) => {
            if let Some(main_file) = main_file {
                if !output.dependencies.iter().any(|d| d.path == main_file.path) {
                    output.dependencies.insert(0, main_file);
                }
            }
            completion.complete(output);
        }
        Err(err) => completion.fail(&ShaderError::from(err)),
    }
}

async fn capture_file_state(path: impl AsRef<Path>) -> DependentFileState {
    let path = path.as_ref();
    let timestamp = tokio::fs::metadata(path)
        .await
        .and_then(|meta| meta.modified())
        .ok();
    DependentFileState::new(path, timestamp)
}
