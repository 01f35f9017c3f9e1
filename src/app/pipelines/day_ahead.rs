use crate::adapters::entsoe::EntsoeClient;
use crate::app::pipelines::write_tables;
use crate::config::DayAheadConfig;
use crate::core::{OutputTable, Pipeline, Storage, TransformResult};
use crate::domain::model::{DailyAverage, PriceRecord, UtcRange};
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Duration;

const PIPELINE_NAME: &str = "day-ahead";

/// 依時間排序並去除重複的時間戳（保留第一筆）
pub fn prepare_hourly(mut records: Vec<PriceRecord>) -> Vec<PriceRecord> {
    records.sort_by_key(|r| r.timestamp);
    records.dedup_by_key(|r| r.timestamp);
    records
}

/// 以 UTC 日期分組取平均
pub fn daily_averages(records: &[PriceRecord]) -> Vec<DailyAverage> {
    let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in records {
        let entry = buckets
            .entry(record.timestamp.date_naive())
            .or_insert((0.0, 0));
        entry.0 += record.price;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(date, (sum, count))| DailyAverage {
            date,
            avg_price: sum / count as f64,
        })
        .collect()
}

/// 分段呼叫統計 API，輸出每小時價格與每日平均
pub struct DayAheadPipeline<S: Storage> {
    storage: S,
    config: DayAheadConfig,
    client: EntsoeClient,
}

impl<S: Storage> DayAheadPipeline<S> {
    pub fn new(storage: S, config: DayAheadConfig) -> Result<Self> {
        let client = EntsoeClient::new(&config)?;
        Ok(Self {
            storage,
            config,
            client,
        })
    }

    pub fn windows(&self) -> Vec<UtcRange> {
        UtcRange::new(self.config.start, self.config.end_or_now())
            .windows(i64::try_from(self.config.window_days).unwrap_or(i64::MAX))
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for DayAheadPipeline<S> {
    type Record = PriceRecord;

    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    async fn extract(&self) -> Result<Vec<PriceRecord>> {
        let windows = self.windows();
        let delay = Duration::from_millis(self.config.window_delay_ms);
        tracing::info!(
            "🪟 {} window(s) of up to {} day(s)",
            windows.len(),
            self.config.window_days
        );

        let mut all_records = Vec::new();
        for window in &windows {
            tracing::info!(
                "Window: {} -> {}",
                window.start.date_naive(),
                window.end.date_naive()
            );

            // 單一視窗失敗只記錄，不中斷
            match self.client.fetch_window(window).await {
                Ok(chunk) => {
                    tracing::info!("  + {} records", chunk.len());
                    all_records.extend(chunk);
                }
                Err(e) => {
                    tracing::warn!("  ! Failed: {}", e);
                }
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(all_records)
    }

    async fn transform(&self, data: Vec<PriceRecord>) -> Result<TransformResult> {
        if data.is_empty() {
            return Err(EtlError::NoRecordsError {
                pipeline: PIPELINE_NAME.to_string(),
            });
        }

        let hourly = prepare_hourly(data);
        let daily = daily_averages(&hourly);

        let mut hourly_table =
            OutputTable::new(&self.config.hourly_file, &["datetime_utc", "price_eur_mwh"]);
        for record in &hourly {
            hourly_table.push_row(vec![
                record.timestamp.to_rfc3339(),
                record.price.to_string(),
            ]);
        }

        let mut daily_table = OutputTable::new(
            &self.config.daily_average_file,
            &["date", "avg_price_eur_mwh"],
        );
        for average in &daily {
            daily_table.push_row(vec![
                average.date.format("%Y-%m-%d").to_string(),
                average.avg_price.to_string(),
            ]);
        }

        Ok(TransformResult {
            processed_records: hourly.len(),
            tables: vec![hourly_table, daily_table],
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let output = write_tables(&self.storage, &result.tables).await?;
        tracing::info!("📁 Created: {}", output);
        Ok(output)
    }
}
