use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 未在設定檔提供 token 時讀取的環境變數
pub const TOKEN_ENV_VAR: &str = "ENTSOE_TOKEN";

const REDACTED: &str = "***";

/// 單次查詢最多一年
pub const MAX_WINDOW_DAYS: usize = 366;

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtlConfig {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub daily_files: DailyFilesConfig,
    #[serde(default)]
    pub day_ahead: DayAheadConfig,
    #[serde(default)]
    pub sunlight: SunlightConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyFilesConfig {
    /// `{date}` 會被替換成 YYYY-MM-DD
    pub url_template: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub raw_dir: String,
    pub combined_file: String,
    pub delimiter: char,
    pub min_body_bytes: usize,
    pub request_timeout_seconds: u64,
    /// 連同目錄中既有的檔案一起合併（舊行為）
    pub include_existing_files: bool,
}

impl Default for DailyFilesConfig {
    fn default() -> Self {
        Self {
            url_template:
                "https://www.omie.es/sites/default/files/2023-04/Resultados_Mercado_Diario_{date}.csv"
                    .to_string(),
            start_date: default_start_date(),
            end_date: None,
            raw_dir: "omie_raw".to_string(),
            combined_file: "omie_combined.csv".to_string(),
            delimiter: ';',
            min_body_bytes: 100,
            request_timeout_seconds: 30,
            include_existing_files: false,
        }
    }
}

impl DailyFilesConfig {
    pub fn end_date_or_today(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl Validate for DailyFilesConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url_template("daily_files.url_template", &self.url_template, "{date}")?;
        validation::validate_path("daily_files.raw_dir", &self.raw_dir)?;
        validation::validate_csv_file_name("daily_files.combined_file", &self.combined_file)?;
        validation::validate_ordered(
            "daily_files.start_date",
            &self.start_date,
            &self.end_date_or_today(),
        )?;
        if !self.delimiter.is_ascii() {
            return Err(EtlError::InvalidConfigValueError {
                field: "daily_files.delimiter".to_string(),
                value: self.delimiter.to_string(),
                reason: "Delimiter must be a single ASCII character".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DayAheadConfig {
    pub api_url: String,
    pub security_token: Option<String>,
    pub document_type: String,
    pub in_domain: String,
    pub out_domain: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub window_days: usize,
    pub request_timeout_seconds: u64,
    pub window_delay_ms: u64,
    pub hourly_file: String,
    pub daily_average_file: String,
}

impl Default for DayAheadConfig {
    fn default() -> Self {
        Self {
            api_url: "https://web-api.tp.entsoe.eu/api".to_string(),
            security_token: None,
            document_type: "A44".to_string(),
            in_domain: "10YPT-REN------W".to_string(),
            out_domain: "10YPT-REN------W".to_string(),
            start: Utc
                .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: None,
            window_days: 31,
            request_timeout_seconds: 60,
            window_delay_ms: 700,
            hourly_file: "entsoe_day_ahead_hourly.csv".to_string(),
            daily_average_file: "entsoe_day_ahead_dailyavg.csv".to_string(),
        }
    }
}

impl DayAheadConfig {
    /// 未設定結束時間時，取現在並截到整點
    pub fn end_or_now(&self) -> DateTime<Utc> {
        self.end.unwrap_or_else(|| {
            let now = Utc::now();
            now.with_nanosecond(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_minute(0))
                .unwrap_or(now)
        })
    }

    /// 設定檔中的 token 優先；`${VAR}` 未被替換時視為未設定
    pub fn resolved_token(&self) -> Option<String> {
        self.security_token
            .clone()
            .filter(|token| !token.trim().is_empty() && !token.starts_with("${"))
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|token| !token.trim().is_empty())
    }
}

impl Validate for DayAheadConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("day_ahead.api_url", &self.api_url)?;
        let token = self.resolved_token();
        validation::validate_required_field("day_ahead.security_token", &token)?;
        validation::validate_non_empty_string("day_ahead.document_type", &self.document_type)?;
        validation::validate_non_empty_string("day_ahead.in_domain", &self.in_domain)?;
        validation::validate_non_empty_string("day_ahead.out_domain", &self.out_domain)?;
        validation::validate_range("day_ahead.window_days", self.window_days, 1, MAX_WINDOW_DAYS)?;
        validation::validate_ordered("day_ahead.start", &self.start, &self.end_or_now())?;
        validation::validate_csv_file_name("day_ahead.hourly_file", &self.hourly_file)?;
        validation::validate_csv_file_name(
            "day_ahead.daily_average_file",
            &self.daily_average_file,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SunlightConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub output_file: String,
}

impl Default for SunlightConfig {
    fn default() -> Self {
        Self {
            latitude: 39.41,
            longitude: -8.07,
            start_date: default_start_date(),
            end_date: None,
            output_file: "sunlight_perday.csv".to_string(),
        }
    }
}

impl SunlightConfig {
    pub fn end_date_or_today(&self) -> NaiveDate {
        self.end_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl Validate for SunlightConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_range("sunlight.latitude", self.latitude, -90.0, 90.0)?;
        validation::validate_range("sunlight.longitude", self.longitude, -180.0, 180.0)?;
        validation::validate_ordered(
            "sunlight.start_date",
            &self.start_date,
            &self.end_date_or_today(),
        )?;
        validation::validate_csv_file_name("sunlight.output_file", &self.output_file)?;
        Ok(())
    }
}

impl EtlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ENTSOE_TOKEN})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn output_dir(&self) -> &str {
        &self.output.directory
    }

    /// 供顯示用的副本，token 以遮罩取代
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(token) = copy.day_ahead.security_token.as_mut() {
            *token = REDACTED.to_string();
        }
        copy
    }
}

impl Validate for EtlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("output.directory", &self.output.directory)
    }
}
