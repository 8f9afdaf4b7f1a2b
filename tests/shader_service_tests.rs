//! Shader Service Tests
//!
//! Tests for:
//! - Dispatch: markers start Pending and resolve to Ready / Invalid
//! - Independence of concurrent identical requests
//! - Pre-dispatch failures: malformed initializers, missing compilers
//! - Source handling: missing files, in-memory sources
//! - Model adaptation, dependency tracking and attached runtimes

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use common::{ScriptedCompiler, ShaderDir, expected_byte_code, init_logger, service_with};
use kiln::assets::payload_as_text;
use kiln::{
    AssetState, CompileOutput, DependencyToken, LowLevelCompiler, ResId, ShaderService,
    ShaderServiceSettings, ShaderStage,
};

// ============================================================================
// Dispatch Lifecycle
// ============================================================================

#[test]
fn delayed_compile_is_pending_then_ready() {
    init_logger();
    let dir = ShaderDir::new("delayed-ready");
    dir.write("foo.shader", "float4 main() : SV_Target { return 1; }");
    let compiler = ScriptedCompiler::new(Duration::from_millis(100));
    let service = service_with(compiler.clone());

    let init = dir.initializer("foo.shader", "main", "ps_5_0");
    let marker = service.compile_from_file(&init, "");

    assert_eq!(marker.state(), AssetState::Pending);
    assert_eq!(marker.stage(), ShaderStage::Pixel);

    let (state, payload) = marker.resolve(&DependencyToken::new());
    assert_eq!(state, AssetState::Ready);
    assert_eq!(
        &*payload,
        expected_byte_code("float4 main() : SV_Target { return 1; }").as_slice()
    );
    assert_eq!(compiler.calls(), 1);
    assert!(!service.invalid_assets().has_invalid_assets());
}

#[test]
fn rejected_source_is_invalid_and_recorded() {
    init_logger();
    let dir = ShaderDir::new("rejected");
    dir.write("bad.shader", "syntax error line 4\n");
    let service = service_with(ScriptedCompiler::new(Duration::from_millis(20)));

    let init = dir.initializer("bad.shader", "main", "ps_5_0");
    let marker = service.compile_from_file(&init, "");

    assert_eq!(marker.stall_while_pending(), AssetState::Invalid);
    assert!(payload_as_text(&marker.errors()).contains("syntax error line 4"));

    let records = service.invalid_assets().assets();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, init);
    assert!(records[0].error_string.contains("syntax error line 4"));
}

#[test]
fn identical_requests_get_independent_markers() {
    init_logger();
    let dir = ShaderDir::new("identical");
    dir.write("foo.shader", "body");
    let compiler = ScriptedCompiler::new(Duration::from_millis(30));
    let service = service_with(compiler.clone());

    let init = dir.initializer("foo.shader", "main", "ps_5_0");
    let first = service.compile_from_file(&init, "A=1");
    let second = service.compile_from_file(&init, "A=1");
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.request(), second.request());

    let (_, a) = first.resolve(&DependencyToken::new());
    let (_, b) = second.resolve(&DependencyToken::new());
    assert_eq!(a, b);
    assert_eq!(compiler.calls(), 2);
}

#[test]
fn compile_resolves_within_latency_bound() {
    init_logger();
    let dir = ShaderDir::new("liveness");
    dir.write("foo.shader", "body");
    let latency = Duration::from_millis(50);
    let service = service_with(ScriptedCompiler::new(latency));

    let start = Instant::now();
    let marker = service.compile_from_file(&dir.initializer("foo.shader", "main", "vs_5_0"), "");
    assert!(start.elapsed() < latency, "dispatch must not wait for the compile");

    assert_eq!(marker.stall_while_pending(), AssetState::Ready);
    assert!(start.elapsed() < latency + Duration::from_secs(5));
}

#[test]
fn many_requests_all_resolve() {
    init_logger();
    let dir = ShaderDir::new("many");
    dir.write("good.shader", "ok");
    dir.write("bad.shader", "error here");
    let service = service_with(ScriptedCompiler::new(Duration::from_millis(5)));

    let markers: Vec<_> = (0..32)
        .map(|i| {
            let name = if i % 4 == 0 { "bad.shader" } else { "good.shader" };
            service.compile_from_file(&dir.initializer(name, "main", "ps_5_0"), &format!("I={i}"))
        })
        .collect();

    let states: Vec<_> = markers.iter().map(|m| m.stall_while_pending()).collect();
    assert_eq!(states.iter().filter(|s| **s == AssetState::Invalid).count(), 8);
    assert_eq!(states.iter().filter(|s| **s == AssetState::Ready).count(), 24);
    // One record per distinct name, regardless of how many requests failed.
    assert_eq!(service.invalid_assets().len(), 1);
}

// ============================================================================
// Pre-Dispatch Failures
// ============================================================================

#[test]
fn missing_compiler_is_invalid_and_recorded() {
    init_logger();
    let service = Arc::new(ShaderService::new(ShaderServiceSettings::default()).unwrap());
    assert_eq!(service.compiler_count(), 0);

    let marker = service.compile_from_file("foo.shader:main:ps_5_0", "");

    assert_eq!(marker.state(), AssetState::Invalid);
    assert!(marker.request().is_none());
    assert!(payload_as_text(&marker.errors()).contains("No shader compiler"));

    let records = service.invalid_assets().assets();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "foo.shader:main:ps_5_0");

    // Shorthand initializers are recorded under their normalized form.
    let marker = service.compile_from_file("bar.shader", "");
    assert_eq!(marker.name(), "bar.shader:main:ps_*");
    assert!(service.invalid_assets().assets().iter().any(|r| r.name == "bar.shader:main:ps_*"));
}

#[test]
fn malformed_initializer_is_invalid_but_not_recorded() {
    init_logger();
    let service = service_with(ScriptedCompiler::instant());

    for init in [":main:ps_5_0", "foo.shader:9lives:ps_5_0", "foo.shader:main:ps 5"] {
        let marker = service.compile_from_file(init, "");
        assert_eq!(marker.state(), AssetState::Invalid, "{init}");
        assert_eq!(marker.stage(), ShaderStage::Null);
        assert!(payload_as_text(&marker.errors()).contains("Malformed"));
    }
    assert!(service.invalid_assets().is_empty());
}

#[test]
fn model_without_stage_has_no_compiler() {
    init_logger();
    let service = service_with(ScriptedCompiler::instant());

    // Nothing accepts a model without a stage prefix.
    let marker = service.compile_from_file("foo.shader:main:lib_6_3", "");
    assert_eq!(marker.state(), AssetState::Invalid);
    assert!(payload_as_text(&marker.errors()).contains("No shader compiler"));
    assert_eq!(service.invalid_assets().len(), 1);
}

/// Accepts pixel models but adapts them to a token with no stage.
struct StagelessAdapter;

impl LowLevelCompiler for StagelessAdapter {
    fn name(&self) -> &str {
        "stageless"
    }

    fn accepts_model(&self, shader_model: &str) -> bool {
        shader_model.starts_with("ps_")
    }

    fn adapt_shader_model(&self, _: &str) -> String {
        "lib_6_3".to_string()
    }

    fn do_low_level_compile(&self, _: &[u8], _: &ResId, _: &str) -> CompileOutput {
        CompileOutput::failure("never dispatched")
    }
}

#[test]
fn unknown_model_after_adaptation_is_invalid() {
    init_logger();
    let service = service_with(Arc::new(StagelessAdapter));

    let marker = service.compile_from_file("foo.shader:main:ps_*", "");
    assert_eq!(marker.state(), AssetState::Invalid);
    assert!(marker.request().is_none());
    assert!(payload_as_text(&marker.errors()).contains("Unknown shader model `lib_6_3`"));

    let records = service.invalid_assets().assets();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "foo.shader:main:ps_*");
}

// ============================================================================
// Sources
// ============================================================================

#[test]
fn missing_source_file_is_invalid() {
    init_logger();
    let dir = ShaderDir::new("missing-source");
    let compiler = ScriptedCompiler::instant();
    let service = service_with(compiler.clone());

    let init = dir.initializer("absent.shader", "main", "ps_5_0");
    let marker = service.compile_from_file(&init, "");

    assert_eq!(marker.stall_while_pending(), AssetState::Invalid);
    assert!(payload_as_text(&marker.errors()).contains("Failed to read shader source"));
    assert_eq!(compiler.calls(), 0);

    // Creating the file later must count as a change.
    let deps = marker.dependencies();
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].path, dir.path("absent.shader"));
    assert_eq!(deps[0].timestamp, None);
    assert!(service.invalid_assets().has_invalid_assets());
}

#[test]
fn memory_source_compiles_without_file_dependencies() {
    init_logger();
    let service = service_with(ScriptedCompiler::instant());

    let marker = service.compile_from_memory("void main() {}", "main", "cs_*", "");
    assert!(marker.name().starts_with("<memory-"));
    assert!(marker.name().ends_with(":main:cs_*"));
    assert!(marker.request().unwrap().res_id.to_string().ends_with(":main:cs_5_0"));

    let (state, payload) = marker.resolve(&DependencyToken::new());
    assert_eq!(state, AssetState::Ready);
    assert_eq!(&*payload, expected_byte_code("void main() {}").as_slice());
    assert!(marker.dependencies().is_empty());

    // Identical source maps to the same identity.
    let again = service.compile_from_memory("void main() {}", "main", "cs_*", "");
    assert_eq!(again.name(), marker.name());
}

#[test]
fn wildcard_model_is_adapted_before_dispatch() {
    init_logger();
    let dir = ShaderDir::new("wildcard");
    dir.write("foo.shader", "ok");
    let service = service_with(ScriptedCompiler::instant());

    let marker = service.compile_from_file(&dir.initializer("foo.shader", "main", "!vs_*"), "");
    let request = marker.request().unwrap();
    assert_eq!(request.res_id.shader_model, "vs_5_0");
    assert!(request.res_id.dynamic_linkage);
    assert!(request.res_id.to_string().ends_with(":main:!vs_5_0"));
    // The marker keeps the requested form as its name.
    assert!(marker.name().ends_with(":main:!vs_*"));
    assert_eq!(marker.stall_while_pending(), AssetState::Ready);
}

#[test]
fn normalized_initializer_reparses_to_same_identity() {
    let compiler = ScriptedCompiler::instant();
    for init in ["a.shader", "a.shader:Entry", "a.shader::!ps_*", r"C:\s\a.shader:main:gs_4_0"] {
        let res_id = ShaderService::make_res_id(init, compiler.as_ref()).unwrap();
        assert!(!res_id.has_wildcard_model());
        assert_eq!(ResId::parse(&res_id.to_string()).unwrap(), res_id);
    }
}

// ============================================================================
// Dependencies & Recovery
// ============================================================================

#[test]
fn fixing_source_clears_invalid_record() {
    init_logger();
    let dir = ShaderDir::new("recovery");
    let path = dir.write("foo.shader", "error: missing semicolon");
    let service = service_with(ScriptedCompiler::instant());
    let init = dir.initializer("foo.shader", "main", "ps_5_0");

    let first = service.compile_from_file(&init, "");
    assert_eq!(first.stall_while_pending(), AssetState::Invalid);
    assert_eq!(service.invalid_assets().len(), 1);

    std::fs::write(&path, "fixed").unwrap();
    let second = service.compile_from_file(&init, "");
    assert_eq!(second.stall_while_pending(), AssetState::Ready);
    assert!(service.invalid_assets().is_empty());

    // Terminal markers never revert.
    assert_eq!(first.state(), AssetState::Invalid);
}

#[test]
fn success_clears_record_left_by_missing_compiler() {
    init_logger();
    let dir = ShaderDir::new("late-compiler");
    dir.write("foo.shader", "ok");
    let service = Arc::new(ShaderService::new(ShaderServiceSettings::default()).unwrap());
    let init = dir.initializer("foo.shader", "main", "ps_*");

    let first = service.compile_from_file(&init, "");
    assert_eq!(first.state(), AssetState::Invalid);
    assert_eq!(service.invalid_assets().assets()[0].name, init);

    service.add_compiler(ScriptedCompiler::instant());
    let second = service.compile_from_file(&init, "");
    assert_eq!(second.stall_while_pending(), AssetState::Ready);
    assert!(service.invalid_assets().is_empty());
}

#[test]
fn compile_failure_is_recorded_under_requested_initializer() {
    init_logger();
    let dir = ShaderDir::new("requested-key");
    let path = dir.write("bad.shader", "syntax error line 4");
    let service = service_with(ScriptedCompiler::instant());
    let init = dir.initializer("bad.shader", "main", "ps_*");

    let marker = service.compile_from_file(&init, "");
    assert_eq!(marker.stall_while_pending(), AssetState::Invalid);
    let records = service.invalid_assets().assets();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, init);

    // Shorthand for the same request shares the record.
    std::fs::write(&path, "fixed").unwrap();
    let shorthand = service.compile_from_file(&path, "");
    assert_eq!(shorthand.name(), init);
    assert_eq!(shorthand.stall_while_pending(), AssetState::Ready);
    assert!(service.invalid_assets().is_empty());
}

#[test]
fn touched_source_makes_token_stale() {
    init_logger();
    let dir = ShaderDir::new("stale");
    let path = dir.write("foo.shader", "ok");
    let service = service_with(ScriptedCompiler::instant());

    let marker = service.compile_from_file(&dir.initializer("foo.shader", "main", "ps_5_0"), "");
    let token = service.make_dependency_token();
    let (state, _) = marker.resolve(&token);
    assert_eq!(state, AssetState::Ready);
    assert_eq!(token.files().len(), 1);
    assert!(service.is_dependency_valid(&token));

    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(120))
        .unwrap();
    drop(file);
    assert!(!service.is_dependency_valid(&token));
}

// ============================================================================
// Runtime & Settings
// ============================================================================

#[test]
fn attached_runtime_runs_compiles() {
    init_logger();
    let dir = ShaderDir::new("attached");
    dir.write("foo.shader", "ok");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();

    let service = ShaderService::with_runtime_handle(
        runtime.handle().clone(),
        ShaderServiceSettings::default(),
    );
    service.add_compiler(ScriptedCompiler::instant());

    let marker = service.compile_from_file(&dir.initializer("foo.shader", "main", "ps_5_0"), "");
    assert_eq!(pollster::block_on(marker.wait()), AssetState::Ready);
}

#[test]
fn invalid_tracking_can_be_disabled() {
    init_logger();
    let dir = ShaderDir::new("untracked");
    dir.write("bad.shader", "error");
    let settings = ShaderServiceSettings::default().with_invalid_asset_tracking(false);
    let service = ShaderService::new(settings).unwrap();
    service.add_compiler(ScriptedCompiler::instant());

    let marker = service.compile_from_file(&dir.initializer("bad.shader", "main", "ps_5_0"), "");
    assert_eq!(marker.stall_while_pending(), AssetState::Invalid);
    assert!(!service.invalid_assets().is_active());
    assert!(service.invalid_assets().is_empty());
}

#[test]
fn describe_byte_code_uses_matching_compiler() {
    let service = service_with(ScriptedCompiler::instant());
    assert_eq!(
        service.describe_byte_code("ps_5_0", b"1234").as_deref(),
        Some("scripted: 4 bytes")
    );
    assert_eq!(service.describe_byte_code("lib_6_3", b"1234"), None);
}
