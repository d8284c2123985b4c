//! File Storage - 文件系统批处理存储实现
//!
//! 实现 BatchStoragePort trait

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::application::ports::{BatchStorageError, BatchStoragePort};
use crate::domain::BatchId;

/// 文件命名与目录布局
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// 文件名前缀
    pub filename_prefix: String,
    /// 完整任务文件目录
    pub task_dir: PathBuf,
    /// 批次文件目录
    pub batch_dir: PathBuf,
    /// 输出文件目录
    pub output_dir: PathBuf,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            filename_prefix: "my_file".to_string(),
            task_dir: PathBuf::from("batch_tasks"),
            batch_dir: PathBuf::from("batch_jobs"),
            output_dir: PathBuf::from("batch_outputs"),
        }
    }
}

impl StorageLayout {
    /// 在指定根目录下使用默认子目录名
    pub fn under(root: impl AsRef<Path>, filename_prefix: impl Into<String>) -> Self {
        let root = root.as_ref();
        let defaults = Self::default();
        Self {
            filename_prefix: filename_prefix.into(),
            task_dir: root.join(defaults.task_dir),
            batch_dir: root.join(defaults.batch_dir),
            output_dir: root.join(defaults.output_dir),
        }
    }
}

/// 文件系统批处理存储
pub struct FileBatchStorage {
    layout: StorageLayout,
}

impl FileBatchStorage {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    async fn ensure_parent(path: &Path) -> Result<(), BatchStorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BatchStorageError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}

/// vendor 文件 ID 会进入文件名，替换掉路径分隔符
fn sanitize_file_id(id: &str) -> String {
    id.chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect()
}

#[async_trait]
impl BatchStoragePort for FileBatchStorage {
    fn task_file_path(&self) -> PathBuf {
        self.layout
            .task_dir
            .join(format!("{}_tasks.jsonl", self.layout.filename_prefix))
    }

    fn batch_file_path(&self, batch_id: &BatchId) -> PathBuf {
        self.layout.batch_dir.join(format!(
            "{}_batch_job{}.jsonl",
            self.layout.filename_prefix, batch_id
        ))
    }

    fn output_file_path(&self, output_file_id: &str) -> PathBuf {
        self.layout.output_dir.join(format!(
            "{}_batch_output_{}.json",
            self.layout.filename_prefix,
            sanitize_file_id(output_file_id)
        ))
    }

    async fn write_lines(
        &self,
        path: &Path,
        lines: &[serde_json::Value],
    ) -> Result<usize, BatchStorageError> {
        Self::ensure_parent(path).await?;

        let file = fs::File::create(path)
            .await
            .map_err(|e| BatchStorageError::IoError(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        for line in lines {
            let mut encoded = serde_json::to_string(line)
                .map_err(|e| BatchStorageError::EncodeError(e.to_string()))?;
            encoded.push('\n');
            writer
                .write_all(encoded.as_bytes())
                .await
                .map_err(|e| BatchStorageError::IoError(e.to_string()))?;
        }

        writer
            .flush()
            .await
            .map_err(|e| BatchStorageError::IoError(e.to_string()))?;

        tracing::debug!(path = %path.display(), lines = lines.len(), "JSONL file written");
        Ok(lines.len())
    }

    async fn read_lines(
        &self,
        path: &Path,
    ) -> Result<Vec<serde_json::Value>, BatchStorageError> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BatchStorageError::FileNotFound(path.display().to_string())
            } else {
                BatchStorageError::IoError(e.to_string())
            }
        })?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line).map_err(|e| BatchStorageError::ParseError {
                    line: index + 1,
                    message: e.to_string(),
                })
            })
            .collect()
    }

    async fn save_output(
        &self,
        output_file_id: &str,
        data: &[u8],
    ) -> Result<PathBuf, BatchStorageError> {
        let path = self.output_file_path(output_file_id);
        Self::ensure_parent(&path).await?;

        fs::write(&path, data)
            .await
            .map_err(|e| BatchStorageError::IoError(e.to_string()))?;

        tracing::debug!(path = %path.display(), size = data.len(), "Saved batch output");
        Ok(path)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}
