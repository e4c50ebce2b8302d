//! `getWeather` tool backed by the Open-Meteo forecast API.

use {
    async_trait::async_trait,
    serde_json::{Value, json},
};

use crate::{ChatTool, params::require_f64, shared_http_client};

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Default)]
pub struct GetWeatherTool;

impl GetWeatherTool {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatTool for GetWeatherTool {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn description(&self) -> &str {
        "Get the current weather at a location"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["latitude", "longitude"],
            "properties": {
                "latitude": { "type": "number" },
                "longitude": { "type": "number" }
            }
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let latitude = require_f64(&params, "latitude")?;
        let longitude = require_f64(&params, "longitude")?;

        let response = shared_http_client()
            .get(FORECAST_URL)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", "temperature_2m".to_string()),
                ("hourly", "temperature_2m".to_string()),
                ("daily", "sunrise,sunset".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_missing_coordinates() {
        let tool = GetWeatherTool::new();
        let err = tool.execute(json!({"latitude": 59.91})).await;
        assert!(err.is_err());
    }

    #[test]
    fn schema_requires_both_coordinates() {
        let schema = GetWeatherTool::new().parameters_schema();
        assert_eq!(schema["required"], json!(["latitude", "longitude"]));
    }
}
