//! Zip archive extraction with per-entry rename, rewrite and filtering

use crate::error::GeneratorError;
use std::io::{Cursor, Read, Seek};
use std::path::{Component, Path};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;
use zip::ZipArchive;

/// In-memory archive; cloning shares the underlying buffer
pub type Archive = ZipArchive<Cursor<Arc<[u8]>>>;

/// `(entry path, raw bytes) -> destination path`
pub type NameReplaceFn = Arc<dyn Fn(&str, &[u8]) -> Result<String, GeneratorError> + Send + Sync>;

/// `(entry path, raw bytes) -> bytes to write`
pub type DataReplaceFn = Arc<dyn Fn(&str, &[u8]) -> Result<Vec<u8>, GeneratorError> + Send + Sync>;

/// `entry path -> keep?`
pub type FilterFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Open a downloaded or local zip held in memory
pub fn open_zip(bytes: impl Into<Arc<[u8]>>) -> Result<Archive, GeneratorError> {
    Ok(ZipArchive::new(Cursor::new(bytes.into()))?)
}

/// Largest up-front buffer reserved from an entry's declared size
const MAX_CAPACITY_HINT: u64 = 1 << 20;

/// The declared size comes from the archive and is not trusted
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_CAPACITY_HINT) as usize
}

/// Extract every file entry of `zip` under `destination`
///
/// Entries rejected by `filter` are skipped. Each kept entry's bytes go through
/// `data_fn` and its path through `name_fn` before being written; parent
/// directories are created on demand. Returns the written paths, relative to
/// `destination`, in archive order.
pub async fn unzip<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    destination: &Path,
    name_fn: Option<&NameReplaceFn>,
    data_fn: Option<&DataReplaceFn>,
    filter: Option<&FilterFn>,
) -> Result<Vec<String>, GeneratorError> {
    let mut written = Vec::new();

    for index in 0..zip.len() {
        let (entry_name, raw) = {
            let mut file = zip.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let entry_name = file.name().to_string();
            if filter.is_some_and(|keep| !keep(&entry_name)) {
                continue;
            }
            let mut raw = Vec::with_capacity(capacity_hint(file.size()));
            file.read_to_end(&mut raw)?;
            (entry_name, raw)
        };

        let data = match data_fn {
            Some(replace) => replace(&entry_name, &raw)?,
            None => raw.clone(),
        };
        let relative = match name_fn {
            Some(replace) => replace(&entry_name, &raw)?,
            None => entry_name.clone(),
        }
        .replace('\\', "/");

        if relative.is_empty() || relative.ends_with('/') {
            debug!(entry = %entry_name, "entry maps to no file, skipping");
            continue;
        }
        if !is_contained(&relative) {
            return Err(GeneratorError::UnsafeEntry { entry: entry_name });
        }

        let target = destination.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &data).await?;
        debug!(path = %relative, bytes = data.len(), "extracted");

        written.push(relative);
    }

    Ok(written)
}

/// Relative path that stays inside its base directory
fn is_contained(relative: &str) -> bool {
    Path::new(relative)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Archive {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default();
            for (name, data) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, options).unwrap();
                } else {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(data).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        open_zip(buffer).unwrap()
    }

    #[tokio::test]
    async fn test_unzip_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let mut zip = build_zip(&[("a/", b""), ("a/x.txt", b"x"), ("b/c/y.txt", b"y")]);

        let written = unzip(&mut zip, dir.path(), None, None, None).await.unwrap();

        assert_eq!(written, vec!["a/x.txt", "b/c/y.txt"]);
        assert_eq!(std::fs::read(dir.path().join("b/c/y.txt")).unwrap(), b"y");
    }

    #[tokio::test]
    async fn test_filter_excludes_entries() {
        let dir = TempDir::new().unwrap();
        let mut zip = build_zip(&[("a/x.txt", b"x"), ("b/y.txt", b"y")]);
        let filter: FilterFn = Arc::new(|path: &str| path.starts_with("a/"));

        let written = unzip(&mut zip, dir.path(), None, None, Some(&filter))
            .await
            .unwrap();

        assert_eq!(written, vec!["a/x.txt"]);
        assert!(dir.path().join("a/x.txt").exists());
        assert!(!dir.path().join("b/y.txt").exists());
    }

    #[tokio::test]
    async fn test_name_and_data_replacement() {
        let dir = TempDir::new().unwrap();
        let mut zip = build_zip(&[("tpl/README.md", b"hello"), ("tpl/logo.png", b"\x89PNG")]);
        let name_fn: NameReplaceFn = Arc::new(|name: &str, _: &[u8]| {
            Ok(name.strip_prefix("tpl/").unwrap_or(name).to_string())
        });
        let data_fn: DataReplaceFn = Arc::new(|name: &str, data: &[u8]| {
            if name.ends_with(".md") {
                Ok(data.to_ascii_uppercase())
            } else {
                Ok(data.to_vec())
            }
        });

        let written = unzip(&mut zip, dir.path(), Some(&name_fn), Some(&data_fn), None)
            .await
            .unwrap();

        assert_eq!(written, vec!["README.md", "logo.png"]);
        assert_eq!(std::fs::read(dir.path().join("README.md")).unwrap(), b"HELLO");
        assert_eq!(std::fs::read(dir.path().join("logo.png")).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_entries_escaping_destination_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut zip = build_zip(&[("ok.txt", b"ok")]);
        let name_fn: NameReplaceFn = Arc::new(|_: &str, _: &[u8]| Ok("../evil.txt".to_string()));

        let result = unzip(&mut zip, dir.path(), Some(&name_fn), None, None).await;

        assert!(matches!(result, Err(GeneratorError::UnsafeEntry { .. })));
    }

    #[tokio::test]
    async fn test_replace_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let mut zip = build_zip(&[("f.tpl", b"{{open")]);
        let data_fn: DataReplaceFn = Arc::new(|_: &str, _: &[u8]| {
            Err(GeneratorError::Render(crate::error::RenderError::UnclosedTag {
                position: 0,
            }))
        });

        let result = unzip(&mut zip, dir.path(), None, Some(&data_fn), None).await;

        assert!(matches!(result, Err(GeneratorError::Render(_))));
    }

    #[test]
    fn test_open_zip_rejects_garbage() {
        assert!(matches!(
            open_zip(b"definitely not a zip".to_vec()),
            Err(GeneratorError::Zip(_))
        ));
    }

    #[test]
    fn test_declared_entry_size_is_capped() {
        assert_eq!(capacity_hint(12), 12);
        assert_eq!(capacity_hint(u64::MAX), MAX_CAPACITY_HINT as usize);
    }
}
