pub mod etl;

pub use crate::domain::model::{OutputTable, TransformResult};
pub use crate::domain::ports::{Pipeline, SolarCalculator, Storage};
pub use crate::utils::error::Result;
