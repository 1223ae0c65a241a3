// ── Sensor sample domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EntityId;

/// One ADC sample from a sensor node, with the names the backend joins in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Option<EntityId>,
    pub node_id: EntityId,
    pub node_name: Option<String>,
    pub gateway_id: Option<EntityId>,
    pub gateway_name: Option<String>,
    pub site_id: Option<EntityId>,
    pub site_name: Option<String>,
    pub adc_type: Option<String>,
    pub channel: u32,
    pub raw_value: f64,
    pub converted_value: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SensorReading {
    /// Display value: the calibrated reading when present, else raw.
    pub fn value(&self) -> f64 {
        self.converted_value.unwrap_or(self.raw_value)
    }

    pub fn chart_point(&self) -> ChartPoint {
        ChartPoint {
            timestamp: self.timestamp,
            value: self.value(),
        }
    }
}

/// A point in the live chart series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
}

/// Filters for the initial sensor history load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorQuery {
    pub limit: Option<u32>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub site_id: Option<String>,
    pub gateway_id: Option<String>,
    pub node_id: Option<String>,
    pub adc_type: Option<String>,
    pub channel: Option<u32>,
}
