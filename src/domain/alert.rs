// Alert domain model and lifecycle
use crate::domain::reading::Metric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which side of a bound a value crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    PhAlto,
    PhBajo,
    TemperaturaAlta,
    TemperaturaBaja,
    HumedadAlta,
    HumedadBaja,
    NivelAlto,
    NivelBajo,
}

impl AlertType {
    pub fn new(metric: Metric, direction: Direction) -> Self {
        match (metric, direction) {
            (Metric::Ph, Direction::High) => Self::PhAlto,
            (Metric::Ph, Direction::Low) => Self::PhBajo,
            (Metric::Temperatura, Direction::High) => Self::TemperaturaAlta,
            (Metric::Temperatura, Direction::Low) => Self::TemperaturaBaja,
            (Metric::Humedad, Direction::High) => Self::HumedadAlta,
            (Metric::Humedad, Direction::Low) => Self::HumedadBaja,
            (Metric::NivelLiquido, Direction::High) => Self::NivelAlto,
            (Metric::NivelLiquido, Direction::Low) => Self::NivelBajo,
        }
    }

    pub fn metric(&self) -> Metric {
        match self {
            Self::PhAlto | Self::PhBajo => Metric::Ph,
            Self::TemperaturaAlta | Self::TemperaturaBaja => Metric::Temperatura,
            Self::HumedadAlta | Self::HumedadBaja => Metric::Humedad,
            Self::NivelAlto | Self::NivelBajo => Metric::NivelLiquido,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::PhAlto | Self::TemperaturaAlta | Self::HumedadAlta | Self::NivelAlto => {
                Direction::High
            }
            _ => Direction::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhAlto => "ph_alto",
            Self::PhBajo => "ph_bajo",
            Self::TemperaturaAlta => "temperatura_alta",
            Self::TemperaturaBaja => "temperatura_baja",
            Self::HumedadAlta => "humedad_alta",
            Self::HumedadBaja => "humedad_baja",
            Self::NivelAlto => "nivel_alto",
            Self::NivelBajo => "nivel_bajo",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("alert cannot move from {from} to {to}")]
pub struct TransitionError {
    pub from: AlertState,
    pub to: AlertState,
}

/// activa -> leida -> resuelta, with leida optional. Never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Activa,
    Leida,
    Resuelta,
}

impl AlertState {
    const ALL: [AlertState; 3] = [Self::Activa, Self::Leida, Self::Resuelta];

    fn rank(&self) -> u8 {
        match self {
            Self::Activa => 0,
            Self::Leida => 1,
            Self::Resuelta => 2,
        }
    }

    pub fn can_transition_to(&self, next: AlertState) -> bool {
        next.rank() > self.rank()
    }

    /// States an alert may be in for a move to `next` to be allowed
    pub fn predecessors(next: AlertState) -> Vec<AlertState> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    pub fn transition(self, next: AlertState) -> Result<AlertState, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activa => write!(f, "activa"),
            Self::Leida => write!(f, "leida"),
            Self::Resuelta => write!(f, "resuelta"),
        }
    }
}

/// Output of the evaluator, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct AlertCandidate {
    pub alert_type: AlertType,
    pub value: f64,
    pub bound: f64,
}

impl AlertCandidate {
    pub fn new(metric: Metric, direction: Direction, value: f64, bound: f64) -> Self {
        Self {
            alert_type: AlertType::new(metric, direction),
            value,
            bound,
        }
    }

    /// e.g. "pH ALTO en Tina-A: 5 > 4.5"
    pub fn message(&self, vat_name: &str) -> String {
        let metric = self.alert_type.metric();
        let (side, comparator) = match self.alert_type.direction() {
            Direction::High => ("ALTO", '>'),
            Direction::Low => ("BAJO", '<'),
        };
        format!(
            "{} {} en {}: {} {} {}{}",
            metric.label(),
            side,
            vat_name,
            self.value,
            comparator,
            self.bound,
            metric.unit()
        )
    }
}

/// Insert body for the `alertas` table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlert {
    pub tina_id: String,
    pub tipo_alerta: AlertType,
    pub valor_actual: f64,
    pub valor_umbral: f64,
    pub mensaje: String,
    pub lectura_id: Option<String>,
    pub estado: AlertState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub tina_id: String,
    pub tipo_alerta: AlertType,
    pub valor_actual: f64,
    pub valor_umbral: f64,
    pub mensaje: String,
    #[serde(default)]
    pub lectura_id: Option<String>,
    pub estado: AlertState,
    pub created_at: DateTime<Utc>,
}

/// Alert joined with its vat's display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: Alert,
    pub tina_nombre: String,
}
