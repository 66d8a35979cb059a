// Sensor reading domain model
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One ingestion event from a physical sensor. Every metric is independently nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: String,
    pub sensor_id: String,
    pub temperatura: Option<f64>,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub humedad: Option<f64>,
    pub nivel_liquido: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ph => self.ph,
            Metric::Temperatura => self.temperatura,
            Metric::Humedad => self.humedad,
            Metric::NivelLiquido => self.nivel_liquido,
        }
    }

    /// Latest instant at which the backend touched this row
    pub fn last_change(&self) -> DateTime<Utc> {
        match self.updated_at {
            Some(updated) if updated > self.created_at => updated,
            _ => self.created_at,
        }
    }
}

/// Change-feed event carrying the new row image
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingEvent {
    Inserted(Reading),
    Updated(Reading),
}

impl ReadingEvent {
    pub fn reading(&self) -> &Reading {
        match self {
            Self::Inserted(r) | Self::Updated(r) => r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "pH")]
    Ph,
    #[serde(rename = "temperatura")]
    Temperatura,
    #[serde(rename = "humedad")]
    Humedad,
    #[serde(rename = "nivel_liquido")]
    NivelLiquido,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Ph,
        Metric::Temperatura,
        Metric::Humedad,
        Metric::NivelLiquido,
    ];

    /// Column name in the `lectura` table
    pub fn column(&self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Temperatura => "temperatura",
            Self::Humedad => "humedad",
            Self::NivelLiquido => "nivel_liquido",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ph => "pH",
            Self::Temperatura => "Temperatura",
            Self::Humedad => "Humedad",
            Self::NivelLiquido => "Nivel Líquido",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Self::Ph => "",
            Self::Temperatura => "°C",
            Self::Humedad | Self::NivelLiquido => "%",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}
