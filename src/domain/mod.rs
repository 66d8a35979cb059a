// Domain layer - Vats, readings, thresholds and alerts
pub mod alert;
pub mod reading;
pub mod report;
pub mod threshold;
pub mod vat;
