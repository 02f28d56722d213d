//! Integration tests for the characteristics callback endpoint.
//!
//! The endpoint is unauthenticated and called cross-origin by the browser
//! extension that scrapes product cards.

use elizabeth_integration_tests::{FakeArmtek, TestApp};
use elizabeth_server::armtek::tokens;
use reqwest::StatusCode;
use serde_json::{Value, json};

const PATH: &str = "/api/armtek/characteristics";

async fn setup() -> TestApp {
    let upstream = FakeArmtek::start().await.expect("fake upstream");
    TestApp::start(&upstream).await.expect("app")
}

async fn poll(app: &TestApp, token: &str) -> Value {
    app.client
        .get(app.url(PATH))
        .query(&[("token", token)])
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json")
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let app = setup().await;
    assert_eq!(poll(&app, "nope").await, json!({"status": "not_found"}));
}

#[tokio::test]
async fn test_post_then_poll() {
    let app = setup().await;
    let token = tokens::characteristics_token("111");

    let resp = app
        .client
        .post(app.url(PATH))
        .json(&json!({
            "token": token,
            "artid": "111",
            "image_url": "https://cdn.example.com/111.jpg",
            "weight": "0,56 кг",
            "length": "12 см",
            "height": "85 мм",
            "width": 90
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.json::<Value>().await.expect("json"), json!({"status": "ok"}));

    let body = poll(&app, &token).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["artid"], "111");
    assert_eq!(body["weight"], "0,56 кг");
    assert_eq!(body["width"], "90");
    assert_eq!(body["normalized"]["weight_grams"], 560);
    assert_eq!(body["normalized"]["length_mm"], 120);
    assert_eq!(body["normalized"]["height_mm"], 85);
    assert_eq!(body["normalized"]["width_mm"], Value::Null);
}

#[tokio::test]
async fn test_post_without_token_is_invalid() {
    let app = setup().await;

    for payload in [json!({"artid": "111"}), json!({"token": ["a", "b"]}), json!([1, 2])] {
        let resp = app
            .client
            .post(app.url(PATH))
            .json(&payload)
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.json::<Value>().await.expect("json"),
            json!({"status": "error", "message": "Invalid payload"})
        );
    }
}

#[tokio::test]
async fn test_cors_preflight_allows_extension() {
    let upstream = FakeArmtek::start().await.expect("fake upstream");
    let app = TestApp::start_with(&upstream, |config| {
        config.extension_allowed_origin = "chrome-extension://abcdef".to_string();
    })
    .await
    .expect("app");

    let resp = app
        .client
        .request(reqwest::Method::OPTIONS, app.url(PATH))
        .header("Origin", "chrome-extension://abcdef")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .expect("request");

    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("chrome-extension://abcdef")
    );
}
