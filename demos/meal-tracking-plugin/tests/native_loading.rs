#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

//! Loads this crate's own `cdylib` through the host's native loader.
//!
//! Cargo builds every crate type of the library before running integration
//! tests, so the shared library sits next to this test binary.

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use plugin_runtime_core::{
    ApiModule, ModuleLoader, ModuleRegistry, ModuleState, NativeModuleLoader, PluginLoader,
    PluginManifest,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

fn library_file_name() -> String {
    format!("{DLL_PREFIX}meal_tracking_plugin{DLL_SUFFIX}")
}

/// `target/<profile>/deps/<test>` -> `target/<profile>/deps` or `target/<profile>`
fn built_library() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let file_name = library_file_name();

    let found = [Some(deps), deps.parent()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(&file_name))
        .find(|path| path.is_file())
        .unwrap_or_else(|| panic!("{file_name} not found near {}", deps.display()));
    found
}

fn install_plugin(root: &Path, directory: &str, manifest: Value) {
    let plugin_dir = root.join(directory);
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::copy(built_library(), plugin_dir.join(library_file_name())).unwrap();
    std::fs::write(plugin_dir.join("manifest.json"), manifest.to_string()).unwrap();
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_native_plugin_loads_registers_and_mounts() {
    let root = TempDir::new().unwrap();
    install_plugin(
        root.path(),
        "meals",
        json!({ "name": "meals", "entryPoint": library_file_name(), "version": "0.1.0" }),
    );

    let registry = Arc::new(ModuleRegistry::new());
    let plugins = PluginLoader::new(root.path(), Arc::clone(&registry), Arc::new(NativeModuleLoader::new()));

    let report = plugins.load_all().await.unwrap();
    assert_eq!(report.loaded, vec!["meals"]);
    assert!(report.failed.is_empty(), "{:?}", report.failed);

    let module = registry.get("meals").unwrap();
    assert_eq!(module.name(), "meals");
    assert_eq!(module.version(), env!("CARGO_PKG_VERSION"));
    assert_eq!(module.description(), "Meal tracking for admitted patients");

    let init = registry.initialize_all().await.unwrap();
    assert_eq!(init.initialized, vec!["meals"]);
    assert_eq!(registry.state("meals"), Some(ModuleState::Initialized));

    let app = registry.mount_routes("/api", "v1");
    let (status, body) = get(&app, "/api/v1/meals").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"meal-tracking");

    let (status, body) = get(&app, "/api/meals/menu").await;
    assert_eq!(status, StatusCode::OK);
    let menu: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(menu, json!(["breakfast", "lunch", "dinner"]));

    drop(app);
    assert!(plugins.unload("meals").await);
    assert!(!registry.contains("meals"));
}

#[test]
fn test_native_loader_reads_abi_and_constructor() {
    let manifest = PluginManifest::from_json(r#"{"name": "meals", "entryPoint": "plugin"}"#).unwrap();
    let loaded = NativeModuleLoader::new().load(&manifest, &built_library()).unwrap();

    assert!(loaded.is_native());
    assert_eq!(loaded.module.name(), "meals");
    assert!(loaded.module.router().is_none());
}
