// Integration tests for `WeatherFetcher` using wiremock.

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use weather_monitor_core::{FetchErrorKind, Location, SlotLabel, Source, WeatherFetcher};

// ── Helpers ─────────────────────────────────────────────────────────

const API_KEY: &str = "TEST_KEY";

fn fetcher() -> WeatherFetcher {
    WeatherFetcher::new(API_KEY.into(), Duration::from_secs(2), Duration::from_secs(2))
        .expect("client builds")
}

fn source_for(server: &MockServer) -> Source {
    Source::new("mock", "Mock Weather", format!("{}/data/2.5/", server.uri()), 1)
}

fn location(query: &str) -> Location {
    Location::new(query).expect("valid query")
}

fn entry(temp: f64, description: &str) -> Value {
    json!({
        "main": { "temp": temp, "feels_like": temp, "humidity": 65 },
        "weather": [{ "id": 500, "main": "Rain", "description": description }],
        "wind": { "speed": 4.2 }
    })
}

fn current_body(temp: f64) -> Value {
    let mut body = entry(temp, "clear sky");
    body["name"] = json!("Beijing");
    body["cod"] = json!(200);
    body
}

async fn mount(server: &MockServer, endpoint: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/data/2.5/{endpoint}")))
        .respond_with(response)
        .mount(server)
        .await;
}

// ── Current conditions ──────────────────────────────────────────────

#[tokio::test]
async fn request_pins_metric_units_and_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Beijing"))
        .and(query_param("appid", API_KEY))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body(22.5)))
        .expect(1)
        .mount(&server)
        .await;

    let reading = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .expect("fetch succeeds");

    assert_eq!(reading.temperature_celsius(), 22.5);
    assert_eq!(reading.humidity_pct(), 65.0);
    assert_eq!(reading.wind_speed_mps(), 4.2);
    assert_eq!(reading.description(), "clear sky");
    assert_eq!(reading.slot(), SlotLabel::Current);
}

#[tokio::test]
async fn fahrenheit_looking_value_is_converted() {
    let server = MockServer::start().await;
    mount(&server, "weather", ResponseTemplate::new(200).set_body_json(current_body(98.6))).await;

    let reading = fetcher()
        .current(&location("Phoenix"), &source_for(&server))
        .await
        .expect("fetch succeeds");

    assert!((reading.temperature_celsius() - 37.0).abs() < 0.01);
}

#[tokio::test]
async fn not_found_status() {
    let server = MockServer::start().await;
    mount(
        &server,
        "weather",
        ResponseTemplate::new(404).set_body_json(json!({"cod": "404", "message": "city not found"})),
    )
    .await;

    let err = fetcher()
        .current(&location("Nonexistentcityxyz"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::NotFound);
    assert!(err.to_string().contains("Nonexistentcityxyz"));
}

#[tokio::test]
async fn unauthorized_status() {
    let server = MockServer::start().await;
    mount(&server, "weather", ResponseTemplate::new(401)).await;

    let err = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::AuthFailure);
}

#[tokio::test]
async fn rate_limited_status() {
    let server = MockServer::start().await;
    mount(&server, "weather", ResponseTemplate::new(429)).await;

    let err = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::RateLimited);
}

#[tokio::test]
async fn server_error_status() {
    let server = MockServer::start().await;
    mount(&server, "weather", ResponseTemplate::new(503).set_body_string("maintenance")).await;

    let err = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::ServiceUnavailable);
    assert!(err.to_string().contains("maintenance"));
}

#[tokio::test]
async fn embedded_error_in_success_body() {
    let server = MockServer::start().await;
    mount(
        &server,
        "weather",
        ResponseTemplate::new(200).set_body_json(json!({"cod": 500, "message": "internal error"})),
    )
    .await;

    let err = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn success_with_garbage_body_is_malformed() {
    let server = MockServer::start().await;
    mount(&server, "weather", ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

    let err = fetcher()
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::MalformedResponse);
}

// ── Transport failures ──────────────────────────────────────────────

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    mount(
        &server,
        "weather",
        ResponseTemplate::new(200)
            .set_body_json(current_body(20.0))
            .set_delay(Duration::from_secs(5)),
    )
    .await;

    let fetcher = WeatherFetcher::new(API_KEY.into(), Duration::from_millis(200), Duration::from_millis(200))
        .expect("client builds");

    let err = fetcher
        .current(&location("Beijing"), &source_for(&server))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Timeout);
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let source = Source::new("dead", "Dead", format!("http://127.0.0.1:{port}/"), 1);
    let err = fetcher().current(&location("Beijing"), &source).await.unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::Unreachable);
}

// ── Forecast ────────────────────────────────────────────────────────

#[tokio::test]
async fn forecast_is_capped_by_available_entries() {
    let server = MockServer::start().await;
    let body = json!({
        "cod": "200",
        "message": 0,
        "cnt": 3,
        "list": [entry(10.0, "mist"), entry(12.5, "light rain"), entry(68.0, "haze")]
    });
    mount(&server, "forecast", ResponseTemplate::new(200).set_body_json(body)).await;

    let readings = fetcher()
        .forecast(&location("Beijing"), &source_for(&server), 5)
        .await
        .expect("fetch succeeds");

    assert_eq!(readings.len(), 3);
    assert_eq!(readings[0].slot(), SlotLabel::Forecast(1));
    assert_eq!(readings[2].slot(), SlotLabel::Forecast(3));
    assert_eq!(readings[1].description(), "light rain");
    assert!((readings[2].temperature_celsius() - 20.0).abs() < 0.01);
}

#[tokio::test]
async fn forecast_is_capped_by_requested_count() {
    let server = MockServer::start().await;
    let list: Vec<Value> = (0..8).map(|i| entry(f64::from(i), "clouds")).collect();
    mount(
        &server,
        "forecast",
        ResponseTemplate::new(200).set_body_json(json!({"cod": "200", "list": list})),
    )
    .await;

    let readings = fetcher()
        .forecast(&location("Beijing"), &source_for(&server), 2)
        .await
        .expect("fetch succeeds");

    let temps: Vec<f64> = readings.iter().map(|r| r.temperature_celsius()).collect();
    assert_eq!(temps, [0.0, 1.0]);
}

#[tokio::test]
async fn forecast_errors_use_same_taxonomy() {
    let server = MockServer::start().await;
    mount(&server, "forecast", ResponseTemplate::new(401)).await;

    let err = fetcher()
        .forecast(&location("Beijing"), &source_for(&server), 5)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FetchErrorKind::AuthFailure);
}
