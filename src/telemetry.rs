//! Production and consumption readings from the gateway's `/production.json`.

use crate::error::{Error, Result};
use crate::gateway::GatewayApi;
use serde_derive::Deserialize;
use tracing::debug;

pub const PRODUCTION_PATH: &str = "/production.json";

/// One poll's worth of telemetry, in watts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub production_watts: f64,
    pub consumption_watts: f64,
}

impl Reading {
    /// Power left over after the house has taken what it needs.
    pub fn available_watts(&self) -> f64 {
        self.production_watts - self.consumption_watts
    }
}

/// An entry of the `production` or `consumption` list, keyed by device type.
///
/// `wNow` is only read from the entry a search selects, so a missing or
/// non-numeric value on any other entry does not spoil the document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceReading {
    #[serde(rename = "inverters")]
    Inverters {
        #[serde(rename = "wNow", default, deserialize_with = "lenient_watts")]
        w_now: Option<f64>,
    },
    /// Integrated energy meter (CT clamps).
    #[serde(rename = "eim")]
    Eim {
        #[serde(rename = "measurementType", default)]
        measurement_type: Option<MeasurementType>,
        #[serde(rename = "wNow", default, deserialize_with = "lenient_watts")]
        w_now: Option<f64>,
    },
    #[serde(other)]
    Other,
}

fn lenient_watts<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = <serde_json::Value as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.as_f64())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeasurementType {
    Production,
    NetConsumption,
    TotalConsumption,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductionDocument {
    pub production: Vec<DeviceReading>,
    pub consumption: Vec<DeviceReading>,
}

impl ProductionDocument {
    /// wNow of the first inverters entry, 0 when there is none or it carries
    /// no number.
    pub fn production_watts(&self) -> f64 {
        self.production
            .iter()
            .find_map(|device| match device {
                DeviceReading::Inverters { w_now } => Some(w_now.unwrap_or_default()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// wNow of the first meter entry measuring net or total consumption,
    /// 0 when there is none.
    pub fn consumption_watts(&self) -> f64 {
        self.consumption
            .iter()
            .find_map(|device| match device {
                DeviceReading::Eim {
                    measurement_type:
                        Some(MeasurementType::NetConsumption | MeasurementType::TotalConsumption),
                    w_now,
                } => Some(w_now.unwrap_or_default()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn reading(&self) -> Reading {
        Reading {
            production_watts: self.production_watts(),
            consumption_watts: self.consumption_watts(),
        }
    }
}

/// Fetches the production document once. Failures are not retried.
pub async fn fetch_reading<A: GatewayApi>(session: &A) -> Result<Reading> {
    let document = session
        .api_call(PRODUCTION_PATH)
        .await
        .map_err(Error::Fetch)?;
    let document: ProductionDocument = serde_json::from_value(document)
        .map_err(|e| Error::Fetch(anyhow::Error::new(e).context("Unexpected production.json")))?;
    let reading = document.reading();
    debug!(
        "Production {}W, consumption {}W",
        reading.production_watts, reading.consumption_watts
    );
    Ok(reading)
}
