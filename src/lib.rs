// Library exports for binaries and tests

pub mod config;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod loader;
pub mod metrics;
pub mod report;
pub mod retry;
pub mod translation;
