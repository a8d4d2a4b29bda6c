// ─── Settlement core: aggregation + atomic commit ───
pub mod aggregate;
pub mod error;
pub mod query;
pub mod service;
pub mod store;
pub mod types;
