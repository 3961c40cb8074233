//! Best-effort debug dumps under `PATCH_ARTIFACTS_DIR`.
//!
//! Layout:
//! - `<dir>/files-map.json`, `<dir>/rules-map.json`, `<dir>/report.json`
//! - `<dir>/units/<file>/<unit>/attempt-<n>.prompt.md` and `.response.md`
//!
//! Nothing here can fail a run: write errors are logged and dropped.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ArtifactSink {
    dir: Option<PathBuf>,
}

impl ArtifactSink {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) {
        let Some(dir) = &self.dir else { return };
        match serde_json::to_vec_pretty(value) {
            Ok(bytes) => write_bytes(&dir.join(name), &bytes),
            Err(e) => warn!("artifacts: failed to serialize {}: {}", name, e),
        }
    }

    pub fn unit_prompt(&self, file: &Path, unit: &str, attempt: u32, text: &str) {
        self.unit_file(file, unit, &format!("attempt-{attempt}.prompt.md"), text);
    }

    pub fn unit_response(&self, file: &Path, unit: &str, attempt: u32, text: &str) {
        self.unit_file(file, unit, &format!("attempt-{attempt}.response.md"), text);
    }

    fn unit_file(&self, file: &Path, unit: &str, name: &str, text: &str) {
        let Some(dir) = &self.dir else { return };
        let path = dir
            .join("units")
            .join(sanitize_for_name(&file.to_string_lossy()))
            .join(sanitize_for_name(unit))
            .join(name);
        write_bytes(&path, text.as_bytes());
    }
}

fn write_bytes(path: &Path, bytes: &[u8]) {
    let result = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, bytes));
    match result {
        Ok(()) => debug!(path = %path.display(), bytes = bytes.len(), "artifacts: written"),
        Err(e) => warn!("artifacts: failed to write {}: {}", path.display(), e),
    }
}

/// Filesystem-safe single segment: separators and odd characters become `_`.
fn sanitize_for_name(s: &str) -> String {
    let out: String = s
        .trim_matches(|c| c == '/' || c == '\\')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() { "-".to_string() } else { out }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_paths_into_one_segment() {
        assert_eq!(sanitize_for_name("/src/app/main.ts"), "src_app_main.ts");
        assert_eq!(sanitize_for_name("chunk 3 [41-160]"), "chunk_3__41-160_");
        assert_eq!(sanitize_for_name("/"), "-");
    }

    #[test]
    fn writes_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ArtifactSink::new(Some(dir.path().to_path_buf()));
        sink.write_json("rules-map.json", &serde_json::json!({"a": 1}));
        sink.unit_prompt(Path::new("src/a.ts"), "window 3-4", 2, "prompt text");
        assert!(dir.path().join("rules-map.json").exists());
        let prompt = dir
            .path()
            .join("units/src_a.ts/window_3-4/attempt-2.prompt.md");
        assert_eq!(fs::read_to_string(prompt).unwrap(), "prompt text");

        let off = ArtifactSink::disabled();
        assert!(!off.is_enabled());
        off.write_json("x.json", &1);
    }
}
