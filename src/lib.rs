pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use adapters::{solar::SunriseCalculator, storage::LocalStorage};
pub use app::pipelines::{DailyFilesPipeline, DayAheadPipeline, SunlightPipeline};
pub use config::EtlConfig;
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
