//! Integration tests for reference directives.
//!
//! `#r "<assembly>"` and `//#r "<assembly>"` must be honored identically in
//! both classes and lambdas, and explicit or configured references must reach
//! the compiler ahead of directive references.

use tandem_bridge::{Bridge, BridgeConfig, ErrorKind, FuncOptions, HostValue};
use tandem_test::{
    CountingCompiler, STARTUP_CLASS, SYSTEM_DATA_CLASS_BARE, SYSTEM_DATA_CLASS_COMMENTED,
    SYSTEM_DATA_CLASS_UNREFERENCED, SYSTEM_DATA_LAMBDA_BARE, SYSTEM_DATA_LAMBDA_COMMENTED,
    ScriptCompiler, call_and_wait, script_bridge, source_dir, write_source_file,
};

#[tokio::test]
async fn test_directive_forms_in_classes() {
    let bridge = script_bridge().unwrap();
    for source in [SYSTEM_DATA_CLASS_COMMENTED, SYSTEM_DATA_CLASS_BARE] {
        let func = bridge.func(source).unwrap();
        let result = call_and_wait(&func, "JavaScript").await.unwrap();
        assert_eq!(result, HostValue::from("JavaScript is Real"));
    }
}

#[tokio::test]
async fn test_directive_forms_in_lambdas() {
    let bridge = script_bridge().unwrap();
    for source in [SYSTEM_DATA_LAMBDA_COMMENTED, SYSTEM_DATA_LAMBDA_BARE] {
        let func = bridge.func(source).unwrap();
        let result = call_and_wait(&func, "JavaScript").await.unwrap();
        assert_eq!(result, HostValue::from("JavaScript is Real"));
    }
}

#[tokio::test]
async fn test_directive_in_source_file() {
    let bridge = script_bridge().unwrap();
    let dir = source_dir();
    let path = write_source_file(dir.path(), "data.csx", SYSTEM_DATA_LAMBDA_BARE);
    let func = bridge.func(path.to_string_lossy().into_owned()).unwrap();
    assert_eq!(
        func.invoke("JavaScript").await.unwrap(),
        HostValue::from("JavaScript is Real")
    );
}

#[test]
fn test_missing_reference_fails_compilation() {
    let bridge = script_bridge().unwrap();
    let err = bridge.func(SYSTEM_DATA_CLASS_UNREFERENCED).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::CompilationError));
    assert!(err.to_string().contains("CS0234"), "{err}");
}

#[tokio::test]
async fn test_explicit_reference_replaces_directive() {
    let bridge = script_bridge().unwrap();
    let func = bridge
        .func(FuncOptions::new(SYSTEM_DATA_CLASS_UNREFERENCED).with_reference("System.Data.dll"))
        .unwrap();
    assert_eq!(
        func.invoke("JavaScript").await.unwrap(),
        HostValue::from("JavaScript is Real")
    );
}

#[tokio::test]
async fn test_configured_reference_applies_to_every_function() {
    let mut config = BridgeConfig::default();
    config.compiler.references.push("System.Data.dll".to_owned());
    let bridge = Bridge::builder(ScriptCompiler::new())
        .config(config)
        .build()
        .unwrap();
    let func = bridge.func(SYSTEM_DATA_CLASS_UNREFERENCED).unwrap();
    assert_eq!(
        func.invoke("JavaScript").await.unwrap(),
        HostValue::from("JavaScript is Real")
    );
}

#[test]
fn test_unknown_reference_is_a_compilation_error() {
    let bridge = script_bridge().unwrap();
    let source = format!("#r \"Contoso.Missing.dll\"\n{STARTUP_CLASS}");
    let err = bridge.func(source).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::CompilationError));
    assert_eq!(
        err.to_string(),
        "error CS0006: Metadata file 'Contoso.Missing.dll' could not be found"
    );
}

#[test]
fn test_reference_order_reaches_compiler() {
    let compiler = CountingCompiler::new(ScriptCompiler::new());
    let log = compiler.request_log();
    let bridge = Bridge::builder(compiler)
        .reference("System.dll")
        .build()
        .unwrap();

    let source = "#r \"System.Data.dll\"\n//#r 'System.Data.dll'\npublic class Startup { public object Invoke(object input) { return input; } }";
    bridge
        .func(FuncOptions::new(source).with_reference("System.Core.dll"))
        .unwrap();

    let requests = log.lock().unwrap();
    assert_eq!(
        requests[0].references,
        vec![
            "System.dll",
            "System.Core.dll",
            "System.Data.dll",
            "System.Data.dll"
        ]
    );
    assert!(!requests[0].source.contains("#r"));
}
