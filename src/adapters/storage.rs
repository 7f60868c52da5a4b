use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

/// Filesystem storage rooted at a base directory. Absolute paths bypass the
/// base so a workflow file can live anywhere.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            Path::new(&self.base_path).join(p)
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().into_owned());

        storage.write_file("sub/image.png", b"bytes").await.unwrap();
        let read = storage.read_file("sub/image.png").await.unwrap();
        assert_eq!(read, b"bytes");
    }

    #[tokio::test]
    async fn test_absolute_path_bypasses_base() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("workflow.json");
        std::fs::write(&file, b"{}").unwrap();

        let storage = LocalStorage::new("./unrelated".to_string());
        let read = storage
            .read_file(file.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(read, b"{}");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_string_lossy().into_owned());
        assert!(storage.read_file("nope.json").await.is_err());
    }
}
