use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        let name = self.pipeline.name();
        tracing::info!("🚀 Starting pipeline '{}'", name);

        // Extract
        tracing::info!("📥 Extracting data...");
        let raw_data = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", raw_data.len());
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🔧 Transforming data...");
        let transformed = self.pipeline.transform(raw_data).await?;
        tracing::info!(
            "Transformed {} records into {} table(s)",
            transformed.processed_records,
            transformed.tables.len()
        );
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Loading data...");
        let output_path = self.pipeline.load(transformed).await?;
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        tracing::info!("📁 Pipeline '{}' output saved to: {}", name, output_path);
        Ok(output_path)
    }
}
