//! Shared fixtures for the integration tests: a scripted compiler with
//! injectable latency and a scratch directory for shader sources.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use kiln::{CompileOutput, LowLevelCompiler, ResId, ShaderService, ShaderServiceSettings, ShaderStage};

/// Byte code prefix emitted by [`ScriptedCompiler`].
pub const BYTE_CODE_MAGIC: &[u8] = b"DXBC";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Accepts every model that names a stage. Sources containing `error` are
/// rejected with the trimmed source text as the diagnostic; everything else
/// compiles to `DXBC` followed by the source bytes.
pub struct ScriptedCompiler {
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedCompiler {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn instant() -> Arc<Self> {
        Self::new(Duration::ZERO)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LowLevelCompiler for ScriptedCompiler {
    fn name(&self) -> &str {
        "scripted"
    }

    fn accepts_model(&self, shader_model: &str) -> bool {
        ShaderStage::from_model(shader_model) != ShaderStage::Null
    }

    fn adapt_shader_model(&self, shader_model: &str) -> String {
        shader_model.replace('*', "5_0")
    }

    fn do_low_level_compile(&self, source: &[u8], res_id: &ResId, defines: &str) -> CompileOutput {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("scripted compile #{call}: {res_id} [{defines}]");

        let text = String::from_utf8_lossy(source);
        if text.contains("error") {
            log::debug!("scripted compile #{call} rejected");
            CompileOutput::failure(text.trim())
        } else {
            CompileOutput::success(expected_byte_code(&text))
        }
    }

    fn describe_byte_code(&self, byte_code: &[u8]) -> String {
        format!("scripted: {} bytes", byte_code.len())
    }
}

pub fn expected_byte_code(source: &str) -> Vec<u8> {
    let mut bytes = BYTE_CODE_MAGIC.to_vec();
    bytes.extend_from_slice(source.as_bytes());
    bytes
}

pub fn service_with(compiler: Arc<dyn LowLevelCompiler>) -> Arc<ShaderService> {
    let settings = ShaderServiceSettings::default().with_worker_threads(2);
    let service = ShaderService::new(settings).expect("compile runtime");
    service.add_compiler(compiler);
    Arc::new(service)
}

/// Scratch directory removed on drop. `tag` keeps parallel tests apart.
pub struct ShaderDir {
    root: PathBuf,
}

impl ShaderDir {
    pub fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!("kiln-{tag}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).expect("create scratch dir");
        Self { root }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Writes `contents` to `name` and returns the file's path as a string.
    pub fn write(&self, name: &str, contents: &str) -> String {
        let path = self.path(name);
        fs::write(&path, contents).expect("write shader source");
        path.to_string_lossy().into_owned()
    }

    /// `<dir>/<name>:<entry>:<model>`.
    pub fn initializer(&self, name: &str, entry: &str, model: &str) -> String {
        format!("{}:{entry}:{model}", self.path(name).to_string_lossy())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for ShaderDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}
