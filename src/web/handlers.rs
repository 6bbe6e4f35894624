use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::history::{self, parse_timezone, HistoryRow};
use crate::sensing::CurrentReading;
use crate::AppState;

use super::pages;

/// Raw `/temp_history` parameters. Everything is optional and unparsed;
/// the range resolver decides what each value means.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub range_h: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub timezone: String,
    pub from_date: String,
    pub to_date: String,
    pub values_count: usize,
    pub values: Vec<HistoryRow>,
}

pub async fn root() -> Redirect {
    Redirect::to("/temp_current")
}

pub async fn temp_current(State(state): State<AppState>) -> Html<String> {
    match state.live.current().await {
        CurrentReading {
            humidity: Some(humidity),
            temperature: Some(temperature),
        } => Html(pages::current(temperature, humidity)),
        _ => Html(pages::no_sensor()),
    }
}

pub async fn temp_api(State(state): State<AppState>) -> Json<CurrentReading> {
    Json(state.live.current().await)
}

pub async fn temp_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Html<String> {
    let response = load_history(&state, &params).await;
    Html(pages::history(&pages::HistoryPage {
        timezone: &response.timezone,
        from_date: &response.from_date,
        to_date: &response.to_date,
        rows: &response.values,
    }))
}

pub async fn temp_history_api(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryResponse> {
    Json(load_history(&state, &params).await)
}

async fn load_history(state: &AppState, params: &HistoryParams) -> HistoryResponse {
    let tz = params
        .timezone
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(parse_timezone)
        .unwrap_or_else(|| state.config.default_tz());

    let window = history::resolve(
        params.from.as_deref(),
        params.to.as_deref(),
        params.range_h.as_deref(),
        tz,
    );
    let values = history::query(&state.db, &window, &state.config.sensor_id).await;

    HistoryResponse {
        timezone: tz.name().to_string(),
        from_date: window.display_from(),
        to_date: window.display_to(),
        values_count: values.len(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::config::Config;
    use crate::db::{Database, Reading};
    use crate::sensing::sensor::testing::{ok, ScriptedSensor};
    use crate::sensing::{LiveCache, SensorReader};

    fn state(script: Vec<anyhow::Result<crate::sensing::SensorSample>>) -> AppState {
        let reader = SensorReader::new(Arc::new(ScriptedSensor::new(script)), 1, Duration::ZERO);
        AppState {
            db: Database::new(":memory:").unwrap(),
            live: Arc::new(LiveCache::new(reader, 5000)),
            config: Arc::new(Config::default()),
        }
    }

    #[tokio::test]
    async fn api_reports_live_values() {
        let state = state(vec![ok(22.5, 48.0)]);

        let Json(current) = temp_api(State(state)).await;

        assert_eq!(current.temperature, Some(22.5));
        assert_eq!(current.humidity, Some(48.0));
    }

    #[tokio::test]
    async fn current_page_falls_back_when_sensor_is_silent() {
        let state = state(Vec::new());

        let Html(body) = temp_current(State(state)).await;

        assert!(body.contains("Sensor unavailable"));
    }

    #[tokio::test]
    async fn history_api_uses_relative_range_and_timezone() {
        let state = state(Vec::new());
        let now = Utc::now();
        for (minutes_ago, temperature) in [(90, 20.04), (30, 20.5), (60 * 30, 18.0)] {
            state
                .db
                .insert_reading(&Reading {
                    timestamp: now - ChronoDuration::minutes(minutes_ago),
                    sensor_id: "1".into(),
                    temperature,
                    humidity: 40.0,
                })
                .await
                .unwrap();
        }

        let params = HistoryParams {
            range_h: Some("3".into()),
            timezone: Some("Asia/Tokyo".into()),
            ..HistoryParams::default()
        };
        let Json(response) = temp_history_api(State(state), Query(params)).await;

        assert_eq!(response.timezone, "Asia/Tokyo");
        assert_eq!(response.values_count, 2);
        assert_eq!(response.values[0].temperature, 20.0);
        assert_eq!(response.values[1].temperature, 20.5);
    }

    #[tokio::test]
    async fn history_defaults_to_configured_timezone() {
        let mut state = state(Vec::new());
        state.config = Arc::new(Config {
            default_timezone: "Europe/Berlin".into(),
            ..Config::default()
        });

        let Json(response) = temp_history_api(State(state), Query(HistoryParams::default())).await;

        assert_eq!(response.timezone, "Europe/Berlin");
        assert!(response.from_date.ends_with("00:00"));
        assert_eq!(response.values_count, 0);
    }

    #[tokio::test]
    async fn history_page_renders_window() {
        let state = state(Vec::new());
        let params = HistoryParams {
            from: Some("2024-01-01 00:00".into()),
            to: Some("2024-01-01 12:00".into()),
            timezone: Some("UTC".into()),
            ..HistoryParams::default()
        };

        let Html(body) = temp_history(State(state), Query(params)).await;

        assert!(body.contains("<strong>2024-01-01 00:00</strong>"));
        assert!(body.contains("<strong>2024-01-01 12:00</strong>"));
        assert!(body.contains("0 records"));
    }
}
