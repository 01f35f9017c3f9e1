use crate::domain::model::TransformResult;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// 列出目錄下指定副檔名的檔案（相對於存儲根目錄的路徑，已排序）
    fn list_files(
        &self,
        dir: &str,
        extension: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
    /// 給使用者看的完整位置
    fn location(&self, path: &str) -> String;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    type Record: Send;

    fn name(&self) -> &str;
    async fn extract(&self) -> Result<Vec<Self::Record>>;
    async fn transform(&self, data: Vec<Self::Record>) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// 日出日落計算；沒有日出或日落（極晝、極夜）時回傳錯誤
pub trait SolarCalculator: Send + Sync {
    fn sun_times(&self, coordinates: Coordinates, date: NaiveDate) -> Result<SunTimes>;
}
