// Application layer - Use cases over the backend port
pub mod alert_sink;
pub mod error;
pub mod evaluator;
pub mod ingest;
pub mod monitor_repository;
pub mod notification;
pub mod report_service;
pub mod threshold_store;
pub mod vat_config;
pub mod vat_registry;

#[cfg(test)]
pub mod memory_repository;
