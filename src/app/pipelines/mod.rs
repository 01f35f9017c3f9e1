pub mod daily_files;
pub mod day_ahead;
pub mod sunlight;

pub use daily_files::DailyFilesPipeline;
pub use day_ahead::DayAheadPipeline;
pub use sunlight::SunlightPipeline;

use crate::core::{OutputTable, Storage};
use crate::utils::error::Result;

/// 將每張表寫成 CSV，回傳寫入位置（逗號分隔）
pub(crate) async fn write_tables<S: Storage>(storage: &S, tables: &[OutputTable]) -> Result<String> {
    let mut locations = Vec::with_capacity(tables.len());

    for table in tables {
        let data = table.to_csv_bytes()?;
        tracing::debug!(
            "Writing {} rows ({} bytes) to {}",
            table.len(),
            data.len(),
            table.file_name
        );
        storage.write_file(&table.file_name, &data).await?;
        locations.push(storage.location(&table.file_name));
    }

    Ok(locations.join(", "))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::Storage;
    use crate::utils::error::{EtlError, Result};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }

        pub async fn get_text(&self, path: &str) -> Option<String> {
            self.get_file(path)
                .await
                .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn list_files(&self, dir: &str, extension: &str) -> Result<Vec<String>> {
            let prefix = format!("{}/", dir.trim_end_matches('/'));
            let suffix = format!(".{}", extension);
            let files = self.files.lock().await;
            let mut names: Vec<String> = files
                .keys()
                .filter(|k| k.starts_with(&prefix) && k.ends_with(&suffix))
                .cloned()
                .collect();
            names.sort();
            Ok(names)
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }

        fn location(&self, path: &str) -> String {
            format!("mock://{}", path)
        }
    }
}
