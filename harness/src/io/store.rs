//! Atomic JSON/text/JSONL persistence primitives.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Serialize `value` to pretty-printed JSON with trailing newline, atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_text(path, &buf)
}

/// Atomically write text to disk (temp file + rename).
pub fn write_text(path: &Path, contents: &str) -> Result<()> {
    debug!(path = %path.display(), bytes = contents.len(), "writing file");
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Read text, or `None` when the file does not exist.
pub fn read_text(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(contents))
}

/// Read and deserialize JSON, or `None` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let Some(contents) = read_text(path)? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(value))
}

/// Append one compact JSON line.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(value)
        .with_context(|| format!("serialize line for {}", path.display()))?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))?;
    Ok(())
}

/// Immediate subdirectories of `dir`, sorted by path. Missing `dir` yields none.
pub fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        if entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .is_dir()
        {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn write_json_is_pretty_with_trailing_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/dir/value.json");

        write_json(&path, &json!({"a": 1})).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{\n  \"a\": 1\n}\n");
        assert!(!temp.path().join("nested/dir/value.json.tmp").exists());
    }

    #[test]
    fn read_json_missing_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let value: Option<Value> = read_json(&temp.path().join("missing.json")).expect("read");
        assert!(value.is_none());
    }

    #[test]
    fn append_jsonl_appends_compact_lines() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("t/events.jsonl");

        append_jsonl(&path, &json!({"n": 1})).expect("append 1");
        append_jsonl(&path, &json!({"n": 2})).expect("append 2");
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "{\"n\":1}\n{\"n\":2}\n");
    }

    #[test]
    fn list_dirs_skips_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("b")).expect("mkdir b");
        fs::create_dir_all(temp.path().join("a")).expect("mkdir a");
        fs::write(temp.path().join("file.txt"), "x").expect("write");

        let dirs = list_dirs(temp.path()).expect("list");
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(list_dirs(&temp.path().join("nope")).expect("list").is_empty());
    }
}
