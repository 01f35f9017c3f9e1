use crate::app::pipelines::write_tables;
use crate::config::DailyFilesConfig;
use crate::core::{OutputTable, Pipeline, Storage, TransformResult};
use crate::domain::model::{DateRange, DownloadedFile};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const PIPELINE_NAME: &str = "daily-files";
const DATE_COLUMN: &str = "date";

/// 逐日下載市場 CSV，最後合併成一個檔案
pub struct DailyFilesPipeline<S: Storage> {
    storage: S,
    config: DailyFilesConfig,
    client: Client,
}

impl<S: Storage> DailyFilesPipeline<S> {
    pub fn new(storage: S, config: DailyFilesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            storage,
            config,
            client,
        })
    }

    pub fn url_for(&self, date: NaiveDate) -> String {
        self.config
            .url_template
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }

    fn raw_file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}/{}.csv",
            self.config.raw_dir.trim_end_matches('/'),
            date.format("%Y-%m-%d")
        )
    }

    /// 下載單日檔案；找不到或網路錯誤回傳 None，寫檔失敗才是錯誤
    pub async fn download_day(&self, date: NaiveDate) -> Result<Option<DownloadedFile>> {
        let url = self.url_for(date);
        tracing::debug!("Requesting {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("✘ Not found: {} ({})", date, e);
                return Ok(None);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("✘ Not found: {} ({})", date, e);
                return Ok(None);
            }
        };

        if status != StatusCode::OK || body.len() <= self.config.min_body_bytes {
            tracing::info!("✘ Not found: {} (HTTP {}, {} bytes)", date, status, body.len());
            return Ok(None);
        }

        let file_name = self.raw_file_name(date);
        self.storage.write_file(&file_name, &body).await?;
        tracing::info!("✔ Downloaded: {}", date);

        Ok(Some(DownloadedFile {
            date: Some(date),
            file_name,
        }))
    }

    async fn existing_files(&self, known: &BTreeSet<String>) -> Result<Vec<DownloadedFile>> {
        let listed = self
            .storage
            .list_files(&self.config.raw_dir, "csv")
            .await?;

        Ok(listed
            .into_iter()
            .filter(|name| !known.contains(name))
            .map(|file_name| DownloadedFile {
                date: file_stem(&file_name)
                    .and_then(|stem| NaiveDate::parse_from_str(&stem, "%Y-%m-%d").ok()),
                file_name,
            })
            .collect())
    }
}

fn file_stem(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

/// ISO-8859-1：每個位元組直接對應同值的 Unicode 字元
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// 解析單日檔案，第一列為欄位名稱，允許列長不一致
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok((headers, rows))
}

/// 欄位取聯集（依首次出現順序），並在每列加上來源檔名的 date 欄
pub fn combine_tables(
    file_name: &str,
    parsed: Vec<(String, Vec<String>, Vec<Vec<String>>)>,
) -> OutputTable {
    let mut columns: Vec<String> = Vec::new();
    for (_, headers, _) in &parsed {
        for header in headers {
            if !columns.contains(header) {
                columns.push(header.clone());
            }
        }
    }
    if !columns.iter().any(|c| c == DATE_COLUMN) {
        columns.push(DATE_COLUMN.to_string());
    }

    let positions: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();
    let date_position = positions[DATE_COLUMN];

    let mut table = OutputTable {
        file_name: file_name.to_string(),
        headers: columns.clone(),
        rows: Vec::new(),
    };

    for (tag, headers, rows) in parsed {
        for row in rows {
            let mut combined = vec![String::new(); columns.len()];
            for (header, cell) in headers.iter().zip(row) {
                if let Some(&position) = positions.get(header.as_str()) {
                    combined[position] = cell;
                }
            }
            combined[date_position] = tag.clone();
            table.push_row(combined);
        }
    }

    table
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for DailyFilesPipeline<S> {
    type Record = DownloadedFile;

    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    async fn extract(&self) -> Result<Vec<DownloadedFile>> {
        let range = DateRange::new(self.config.start_date, self.config.end_date_or_today());
        tracing::info!(
            "📅 Downloading {} day(s): {} -> {}",
            range.len(),
            range.start,
            range.end
        );

        let mut files = Vec::new();
        for date in range.days() {
            if let Some(file) = self.download_day(date).await? {
                files.push(file);
            }
        }
        tracing::info!("✅ {} file(s) downloaded in this run", files.len());

        if self.config.include_existing_files {
            let known: BTreeSet<String> = files.iter().map(|f| f.file_name.clone()).collect();
            let existing = self.existing_files(&known).await?;
            tracing::warn!(
                "Including {} file(s) already present in {}",
                existing.len(),
                self.config.raw_dir
            );
            files.extend(existing);
            files.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        }

        Ok(files)
    }

    async fn transform(&self, data: Vec<DownloadedFile>) -> Result<TransformResult> {
        if data.is_empty() {
            return Err(EtlError::NothingToLoadError {
                pipeline: PIPELINE_NAME.to_string(),
                message: "no valid daily file was downloaded".to_string(),
            });
        }

        let delimiter = self.config.delimiter as u8;
        let mut parsed = Vec::with_capacity(data.len());
        let mut row_count = 0;

        for file in &data {
            let bytes = self.storage.read_file(&file.file_name).await?;
            let (headers, rows) = parse_delimited(&decode_latin1(&bytes), delimiter)?;
            let tag = file
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .or_else(|| file_stem(&file.file_name))
                .unwrap_or_else(|| file.file_name.clone());
            tracing::debug!("{}: {} rows, {} columns", file.file_name, rows.len(), headers.len());
            row_count += rows.len();
            parsed.push((tag, headers, rows));
        }

        let table = combine_tables(&self.config.combined_file, parsed);
        Ok(TransformResult {
            processed_records: row_count,
            tables: vec![table],
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let output = write_tables(&self.storage, &result.tables).await?;
        tracing::info!("📁 Combined file created: {}", output);
        Ok(output)
    }
}
