use crate::core::interfaces::FileSystemService;
use crate::utils::{KilnError, Result};
use std::path::Path;
use tokio::fs;

pub struct TokioFileSystemService;

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(|e| io_error(path, e))
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(|e| io_error(path, e))
    }

    async fn write_bytes(&self, path: &Path, content: &[u8]) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            self.create_directory(parent).await?;
        }

        fs::write(path, content).await.map_err(|e| io_error(path, e))
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(|e| io_error(path, e))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

fn io_error(path: &Path, err: std::io::Error) -> KilnError {
    KilnError::Io(std::io::Error::new(
        err.kind(),
        format!("{}: {}", path.display(), err),
    ))
}
