use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// 以日為單位的日期區間（含頭尾）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            (self.end - self.start).num_days() as usize + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 半開區間 [start, end) 的 UTC 時間範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// 切成固定天數的視窗，最後一個視窗截到 end；步長溢位時整段為一個視窗
    pub fn windows(&self, step_days: i64) -> Vec<UtcRange> {
        let step = TimeDelta::try_days(step_days.max(1));
        let mut windows = Vec::new();
        let mut cursor = self.start;

        while cursor < self.end {
            let window_end = step
                .and_then(|step| cursor.checked_add_signed(step))
                .map_or(self.end, |end| end.min(self.end));
            windows.push(UtcRange::new(cursor, window_end));
            cursor = window_end;
        }

        windows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub avg_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunlightRecord {
    pub date: NaiveDate,
    pub minutes: f64,
}

/// 本次執行中成功下載的單日檔案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub date: Option<NaiveDate>,
    pub file_name: String,
}

/// 一張準備寫成 CSV 的表
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl OutputTable {
    pub fn new(file_name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            file_name: file_name.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv_bytes(&self) -> crate::utils::error::Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::utils::error::EtlError::IoError(e.into_error()))
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub processed_records: usize,
    pub tables: Vec<OutputTable>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_range_days_inclusive() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 12, 30).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        let days: Vec<NaiveDate> = range.days().collect();
        assert_eq!(days.len(), 4);
        assert_eq!(range.len(), 4);
        assert_eq!(days[3], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_date_range_reversed_is_empty() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(range.is_empty());
        assert_eq!(range.days().count(), 0);
    }

    #[test]
    fn test_windows_clip_last_window() {
        let range = UtcRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 5, 12, 0, 0).unwrap(),
        );
        let windows = range.windows(31);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].end, Utc.with_ymd_and_hms(2023, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(windows[1].start, windows[0].end);
        assert_eq!(windows[2].end, range.end);
    }

    #[test]
    fn test_windows_huge_step_is_single_window() {
        let range = UtcRange::new(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2023, 3, 5, 0, 0, 0).unwrap(),
        );

        for step in [i64::MAX, 1_000_000_000] {
            assert_eq!(range.windows(step), vec![range]);
        }
    }

    #[test]
    fn test_windows_empty_when_start_not_before_end() {
        let t = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert!(UtcRange::new(t, t).windows(31).is_empty());
    }

    #[test]
    fn test_output_table_csv() {
        let mut table = OutputTable::new("daily.csv", &["date", "avg_price_eur_mwh"]);
        table.push_row(vec!["2023-01-01".to_string(), "15".to_string()]);

        let csv = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
        assert_eq!(csv, "date,avg_price_eur_mwh\n2023-01-01,15\n");
    }
}
