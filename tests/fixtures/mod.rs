//! Shared fixtures for the integration tests
//!
//! - `project/`: a project root with phrase catalogs and an email stylesheet
//! - `overlays/`: TOML overlay files
//! - `broken_overlays/`: an overlay file that fails to parse

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lad_config::{ConfigBuilder, EnvironmentMap};
use tempfile::TempDir;

/// 1x1 transparent PNG
pub const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Project root holding `locales/` and `build/`
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/project")
}

/// Directory of valid overlay files
pub fn overlays_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/overlays")
}

/// Directory holding an unparsable overlay file
pub fn broken_overlays_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/broken_overlays")
}

/// The required variables only
pub fn env() -> EnvironmentMap {
    EnvironmentMap::from_strings([
        ("APP_NAME", "Lad"),
        ("WEB_URL", "https://lad.example.com"),
        ("EMAIL_DEFAULT_FROM", "Lad <noreply@lad.example.com>"),
    ])
}

/// Builder rooted at the fixture project
pub fn builder(environment: &str) -> ConfigBuilder {
    ConfigBuilder::new(env(), environment).root(project_root())
}

/// Copy of the fixture project in a scratch directory, for tests that write
pub fn scratch_project() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    copy_dir(&project_root(), dir.path());
    dir
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("create dir");
    for entry in fs::read_dir(from).expect("read fixture dir") {
        let entry = entry.expect("dir entry");
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }
}

/// Email body with one inline PNG and a button
pub fn html_email() -> String {
    format!(
        r#"<html><head><link rel="stylesheet" href="email.css"></head><body><p>Hello</p><a class="button" href="https://lad.example.com">Open</a><img src="data:image/png;base64,{PIXEL_PNG}" alt="logo"></body></html>"#
    )
}
