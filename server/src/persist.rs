//! The write directory: saved JSON/text payloads, re-readable as config overrides.
//!
//! Writes are last-one-wins with no locking; a single interactive client is
//! the expected user.

use std::io;
use std::path::{Path, PathBuf};

use poolvr_shared::config::ConfigMap;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("write is disabled, you need to create the write folder {path}")]
    MissingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("invalid file name {0:?}")]
    InvalidName(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} does not hold a JSON object")]
    NotAnObject(PathBuf),
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// What `/write` stores.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Written pretty-printed with keys sorted.
    Json(Value),
    /// Written verbatim.
    Text(String),
}

/// Keep only the last path component of a client-supplied name.
pub fn sanitize_filename(name: &str) -> Result<&str, PersistError> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        return Err(PersistError::InvalidName(name.to_string()));
    }
    Ok(base)
}

/// Recursively order object keys.
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// The sole directory `/write` may store into, resolved to an absolute path.
#[derive(Debug, Clone)]
pub struct WriteDir {
    root: PathBuf,
}

impl WriteDir {
    /// Fails when the directory does not exist. Call at start-up.
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        let root = path
            .canonicalize()
            .map_err(|source| PersistError::MissingDir {
                path: path.to_path_buf(),
                source,
            })?;
        if !root.is_dir() {
            return Err(PersistError::NotADirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, PersistError> {
        Ok(self.root.join(sanitize_filename(name)?))
    }

    /// Store `payload` under the sanitized `name`, replacing any existing file.
    /// Returns the absolute path written.
    pub async fn save(&self, name: &str, payload: &Payload) -> Result<PathBuf, PersistError> {
        let path = self.path_for(name)?;
        let contents = match payload {
            Payload::Json(value) => serde_json::to_string_pretty(&sort_keys(value))?,
            Payload::Text(text) => text.clone(),
        };
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| PersistError::Write {
                path: path.clone(),
                source,
            })?;
        tracing::info!("wrote {}", path.display());
        Ok(path)
    }

    /// Read a saved file back as a configuration override object.
    pub async fn load_overrides(&self, name: &str) -> Result<ConfigMap, PersistError> {
        let path = self.path_for(name)?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PersistError::Read {
                path: path.clone(),
                source,
            })?;
        match serde_json::from_str(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(PersistError::NotAnObject(path)),
            Err(source) => Err(PersistError::Parse { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("a\\b.json").unwrap(), "b.json");
        assert_eq!(sanitize_filename("plain.json").unwrap(), "plain.json");
    }

    #[test]
    fn sanitize_rejects_empty_and_dot_names() {
        for name in ["", "dir/", "..", "../..", "."] {
            assert!(
                matches!(sanitize_filename(name), Err(PersistError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn sort_keys_is_recursive() {
        let sorted = sort_keys(&json!({"b": 1, "a": {"d": [{"z": 0, "y": 1}], "c": 2}}));
        assert_eq!(
            serde_json::to_string(&sorted).unwrap(),
            r#"{"a":{"c":2,"d":[{"y":1,"z":0}]},"b":1}"#
        );
    }

    #[test]
    fn open_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = WriteDir::open(&dir.path().join("saves")).unwrap_err();
        assert!(matches!(err, PersistError::MissingDir { .. }));
    }

    #[test]
    fn open_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("saves");
        std::fs::write(&file, "").unwrap();
        assert!(matches!(
            WriteDir::open(&file),
            Err(PersistError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn save_json_is_pretty_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let write_dir = WriteDir::open(dir.path()).unwrap();
        let path = write_dir
            .save("cfg.json", &Payload::Json(json!({"useShadowMap": true, "gravity": 5})))
            .await
            .unwrap();
        assert!(path.is_absolute());
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "{\n  \"gravity\": 5,\n  \"useShadowMap\": true\n}");
    }

    #[tokio::test]
    async fn save_text_is_verbatim_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let write_dir = WriteDir::open(dir.path()).unwrap();
        write_dir
            .save("notes.txt", &Payload::Text("first".into()))
            .await
            .unwrap();
        let path = write_dir
            .save("notes.txt", &Payload::Text("second\n".into()))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "second\n");
    }

    #[tokio::test]
    async fn traversal_lands_inside_write_dir() {
        let dir = tempfile::tempdir().unwrap();
        let write_dir = WriteDir::open(dir.path()).unwrap();
        let path = write_dir
            .save("../../etc/passwd", &Payload::Text("x".into()))
            .await
            .unwrap();
        assert_eq!(path, write_dir.root().join("passwd"));
    }

    #[tokio::test]
    async fn load_overrides_round_trips_saved_json() {
        let dir = tempfile::tempdir().unwrap();
        let write_dir = WriteDir::open(dir.path()).unwrap();
        write_dir
            .save("cfg.json", &Payload::Json(json!({"gravity": 5})))
            .await
            .unwrap();
        let map = write_dir.load_overrides("cfg.json").await.unwrap();
        assert_eq!(map["gravity"], json!(5));
    }

    #[tokio::test]
    async fn load_overrides_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let write_dir = WriteDir::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("list.json"), "[1, 2]").unwrap();
        std::fs::write(dir.path().join("bad.json"), "{not json").unwrap();

        assert!(matches!(
            write_dir.load_overrides("list.json").await,
            Err(PersistError::NotAnObject(_))
        ));
        assert!(matches!(
            write_dir.load_overrides("bad.json").await,
            Err(PersistError::Parse { .. })
        ));
        assert!(matches!(
            write_dir.load_overrides("absent.json").await,
            Err(PersistError::Read { .. })
        ));
    }
}
