// Vat (tina) domain model
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name used when an alert or reading points at a vat we do not know
pub const UNKNOWN_VAT_NAME: &str = "Tina desconocida";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vat {
    pub id: String,
    pub nombre: String,
    #[serde(default)]
    pub capacidad: f64,
    #[serde(default)]
    pub estado: VatState,
    #[serde(default)]
    pub tipo_agave: Option<String>,
    #[serde(default)]
    pub sensor_id: Option<String>,
}

impl Vat {
    pub fn holds_sensor(&self, sensor_id: &str) -> bool {
        self.sensor_id.as_deref() == Some(sensor_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VatState {
    #[default]
    #[serde(rename = "Disponible")]
    Available,
    #[serde(rename = "En uso")]
    InUse,
    #[serde(rename = "Mantenimiento")]
    Maintenance,
}

impl fmt::Display for VatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "Disponible"),
            Self::InUse => write!(f, "En uso"),
            Self::Maintenance => write!(f, "Mantenimiento"),
        }
    }
}

/// Linear scan for the vat currently claiming `sensor_id`
pub fn find_by_sensor<'a>(vats: &'a [Vat], sensor_id: &str) -> Option<&'a Vat> {
    vats.iter().find(|v| v.holds_sensor(sensor_id))
}
