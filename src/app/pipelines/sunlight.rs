use crate::app::pipelines::write_tables;
use crate::config::SunlightConfig;
use crate::core::{OutputTable, Pipeline, SolarCalculator, Storage, TransformResult};
use crate::domain::model::{DateRange, SunlightRecord};
use crate::domain::ports::Coordinates;
use crate::utils::error::{EtlError, Result};
use chrono::NaiveDate;

const PIPELINE_NAME: &str = "sunlight";

/// 日照時間 = 日出之後最早的日落，只看當天與隔天
pub fn daylight_for<C: SolarCalculator + ?Sized>(
    calculator: &C,
    coordinates: Coordinates,
    date: NaiveDate,
) -> Result<SunlightRecord> {
    let today = calculator.sun_times(coordinates, date)?;

    let sunset = if today.sunset > today.sunrise {
        today.sunset
    } else {
        let next_day = date.succ_opt().ok_or_else(|| EtlError::SolarCalculationError {
            date: date.to_string(),
            reason: "date out of range".to_string(),
        })?;
        let tomorrow = calculator.sun_times(coordinates, next_day)?;
        if tomorrow.sunset <= today.sunrise {
            return Err(EtlError::SolarCalculationError {
                date: date.to_string(),
                reason: "no sunset after sunrise within the next day".to_string(),
            });
        }
        tomorrow.sunset
    };

    Ok(SunlightRecord {
        date,
        minutes: (sunset - today.sunrise).num_seconds() as f64 / 60.0,
    })
}

/// 固定座標每日的日照分鐘數
pub struct SunlightPipeline<S: Storage, C: SolarCalculator> {
    storage: S,
    config: SunlightConfig,
    calculator: C,
}

impl<S: Storage, C: SolarCalculator> SunlightPipeline<S, C> {
    pub fn new(storage: S, config: SunlightConfig, calculator: C) -> Self {
        Self {
            storage,
            config,
            calculator,
        }
    }

    fn coordinates(&self) -> Coordinates {
        Coordinates {
            latitude: self.config.latitude,
            longitude: self.config.longitude,
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: SolarCalculator> Pipeline for SunlightPipeline<S, C> {
    type Record = SunlightRecord;

    fn name(&self) -> &str {
        PIPELINE_NAME
    }

    async fn extract(&self) -> Result<Vec<SunlightRecord>> {
        let range = DateRange::new(self.config.start_date, self.config.end_date_or_today());
        let coordinates = self.coordinates();
        tracing::info!(
            "☀️ Computing daylight for ({}, {}) over {} day(s)",
            coordinates.latitude,
            coordinates.longitude,
            range.len()
        );

        let mut records = Vec::with_capacity(range.len());
        for date in range.days() {
            match daylight_for(&self.calculator, coordinates, date) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping {}: {}", date, e),
            }
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<SunlightRecord>) -> Result<TransformResult> {
        let mut table = OutputTable::new(&self.config.output_file, &["date", "sunlight_minutes"]);
        for record in &data {
            table.push_row(vec![
                record.date.format("%Y-%m-%d").to_string(),
                format!("{:.2}", record.minutes),
            ]);
        }

        Ok(TransformResult {
            processed_records: data.len(),
            tables: vec![table],
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        write_tables(&self.storage, &result.tables).await
    }
}
