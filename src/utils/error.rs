use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML parse error: {0}")]
    XmlParseError(#[from] roxmltree::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("401 Unauthorized; Reasons: {reasons}")]
    UnauthorizedError { reasons: String },

    #[error("HTTP {status}: {body}")]
    HttpStatusError { status: u16, body: String },

    #[error("Unexpected document (TimeSeries not found){detail}")]
    UnexpectedDocumentError { detail: String },

    #[error("Solar calculation failed for {date}: {reason}")]
    SolarCalculationError { date: String, reason: String },

    #[error("No records collected by '{pipeline}'. Check token, windows and connectivity.")]
    NoRecordsError { pipeline: String },

    #[error("Nothing to load for '{pipeline}': {message}")]
    NothingToLoadError { pipeline: String, message: String },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Config,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 對應 CLI 的退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 可重試錯誤
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::UnauthorizedError { .. }
            | EtlError::HttpStatusError { .. } => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::XmlParseError(_)
            | EtlError::UnexpectedDocumentError { .. }
            | EtlError::SolarCalculationError { .. }
            | EtlError::NoRecordsError { .. }
            | EtlError::NothingToLoadError { .. } => ErrorCategory::Data,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Config,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::NothingToLoadError { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => ErrorSeverity::Medium,
            EtlError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => "Check network connectivity and try again later",
            EtlError::UnauthorizedError { .. } => {
                "Verify the security token (e.g. export ENTSOE_TOKEN) and that API access is enabled"
            }
            EtlError::HttpStatusError { .. } => {
                "Check the requested period and domain codes; shorter windows may help"
            }
            EtlError::CsvError(_) => "Inspect the downloaded files for an unexpected layout",
            EtlError::IoError(_) => "Check that the output directory exists and is writable",
            EtlError::XmlParseError(_) | EtlError::UnexpectedDocumentError { .. } => {
                "The API returned a document of an unhandled type; inspect the response body"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => "Fix the configuration file and run again",
            EtlError::SolarCalculationError { .. } => {
                "Check the coordinate; polar day or night has no sunrise or sunset"
            }
            EtlError::NoRecordsError { .. } => "Verify token, date windows and connectivity",
            EtlError::NothingToLoadError { .. } => {
                "No source data was available for the requested dates"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System problem: {}", self),
        }
    }
}
