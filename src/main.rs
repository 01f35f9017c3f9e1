use clap::Parser;
use grid_etl::utils::error::ErrorSeverity;
use grid_etl::utils::{logger, validation::Validate};
use grid_etl::{
    CliConfig, Command, DailyFilesPipeline, DayAheadPipeline, EtlConfig, EtlEngine, EtlError,
    LocalStorage, SunlightPipeline, SunriseCalculator,
};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "grid-etl.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting grid-etl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    if let Some(output_path) = &cli.output_path {
        config.output.directory = output_path.clone();
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let commands = match cli.command {
        Command::All => vec![Command::DailyFiles, Command::DayAhead, Command::Sunlight],
        single => vec![single],
    };

    let mut worst: Option<ErrorSeverity> = None;
    for command in commands {
        match run_command(command, &config, cli.monitor).await {
            Ok(output_path) => {
                println!("✅ {:?} completed successfully!", command);
                println!("📁 Output saved to: {}", output_path);
            }
            Err(e) => {
                report_failure(command, &e);
                worst = worst.max(Some(e.severity()));
            }
        }
    }

    // 根據最嚴重的錯誤決定退出碼
    if let Some(severity) = worst {
        let exit_code = severity.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

/// 預設路徑不存在時使用內建預設值
fn load_config(path: &str) -> grid_etl::Result<EtlConfig> {
    if Path::new(path).exists() {
        tracing::info!("📁 Loading configuration from: {}", path);
        EtlConfig::from_file(path)
    } else if path == DEFAULT_CONFIG_PATH {
        tracing::info!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
        Ok(EtlConfig::default())
    } else {
        Err(EtlError::ConfigError {
            message: format!("configuration file not found: {}", path),
        })
    }
}

async fn run_command(command: Command, config: &EtlConfig, monitor: bool) -> grid_etl::Result<String> {
    let storage = LocalStorage::new(config.output_dir().to_string());

    match command {
        Command::DailyFiles => {
            config.daily_files.validate()?;
            let pipeline = DailyFilesPipeline::new(storage, config.daily_files.clone())?;
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::DayAhead => {
            config.day_ahead.validate()?;
            let pipeline = DayAheadPipeline::new(storage, config.day_ahead.clone())?;
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::Sunlight => {
            config.sunlight.validate()?;
            let pipeline =
                SunlightPipeline::new(storage, config.sunlight.clone(), SunriseCalculator::new());
            EtlEngine::new_with_monitoring(pipeline, monitor).run().await
        }
        Command::All => Err(EtlError::ConfigError {
            message: "'all' expands to individual pipelines before running".to_string(),
        }),
    }
}

fn report_failure(command: Command, e: &EtlError) {
    if e.severity() == ErrorSeverity::Low {
        tracing::warn!("⚠ {:?}: {}", command, e);
        eprintln!("⚠ {}", e.user_friendly_message());
        return;
    }

    tracing::error!(
        "❌ {:?} failed: {} (Category: {:?}, Severity: {:?})",
        command,
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
}
