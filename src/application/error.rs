// Service-level errors surfaced to callers
use crate::domain::alert::TransitionError;
use crate::domain::threshold::ThresholdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error(transparent)]
    InvalidThreshold(#[from] ThresholdError),

    #[error("sensor {sensor_id} is already assigned to vat {vat_name}")]
    SensorTaken { sensor_id: String, vat_name: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
