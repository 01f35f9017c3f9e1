// Adapters layer: concrete implementations for external systems (storage, http, astronomy).

pub mod entsoe;
pub mod solar;
pub mod storage;
