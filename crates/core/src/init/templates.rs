//! Embedded template files for `.vitalflow/` initialization.
//!
//! With the `debug-embed` feature the files are compiled in even for debug
//! builds, so the binary never depends on the source tree at runtime.

use rust_embed::RustEmbed;

/// Files from the workspace `templates/` directory.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../templates"]
pub struct TemplateAssets;

/// Template content by path relative to `templates/`, e.g. `agents/risk-assessment.md`.
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// Template paths under `prefix`, sorted.
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect();
    paths.sort();
    paths
}
