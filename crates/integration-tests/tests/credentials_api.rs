//! Integration tests for per-user Armtek accounts.

use elizabeth_integration_tests::{
    DEFAULT_LOGIN, DEFAULT_VKORG, FakeArmtek, Reply, TestApp, envelope, search_row,
};
use elizabeth_server::armtek::client::{SEARCH_PATH, USER_INFO_PATH, VKORG_LIST_PATH};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

const PATH: &str = "/api/providers/armtek/credentials";

fn script_profile(upstream: &FakeArmtek) {
    upstream
        .reply(
            VKORG_LIST_PATH,
            Reply::Json(envelope(json!([
                {"VKORG": "4000", "PROGRAM_NAME": "Russia"},
                {"VKORG": "5000", "PROGRAM_NAME": "LP", "DEFAULT": "X"}
            ]))),
        )
        .reply(
            USER_INFO_PATH,
            Reply::Json(envelope(json!({
                "STRUCTURE": [{
                    "KUNAG": "700",
                    "VKORG": "5000",
                    "RG_TAB": [{"KUNNR": "777", "DEFAULT": "X"}],
                    "ZA_TAB": [{"KUNNR": "778", "DEFAULT": "X"}],
                    "DOGOVOR_TAB": [{"VBELN": "C-55", "DEFAULT": "X"}]
                }]
            }))),
        );
}

async fn setup() -> (FakeArmtek, TestApp) {
    let upstream = FakeArmtek::start().await.expect("fake upstream");
    script_profile(&upstream);
    let app = TestApp::start(&upstream).await.expect("app");
    (upstream, app)
}

async fn summary(app: &TestApp, user_id: i32) -> Value {
    app.as_user(Method::GET, PATH, user_id)
        .send()
        .await
        .expect("request")
        .json()
        .await
        .expect("json")
}

#[tokio::test]
async fn test_defaults_are_reported_without_account() {
    let (_upstream, app) = setup().await;

    let body = summary(&app, 3).await;
    assert_eq!(body["login"], DEFAULT_LOGIN);
    assert_eq!(body["source"], "defaults");
    assert_eq!(body["vkorg"], DEFAULT_VKORG);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_no_credentials_is_no_content() {
    let upstream = FakeArmtek::start().await.expect("fake upstream");
    let app = TestApp::start_with(&upstream, |config| config.armtek.default_login = None)
        .await
        .expect("app");

    let resp = app.as_user(Method::GET, PATH, 3).send().await.expect("request");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_save_discovers_context_and_keeps_overrides() {
    let (upstream, app) = setup().await;

    let resp = app
        .as_user(Method::POST, PATH, 3)
        .json(&json!({
            "login": " shop@example.com ",
            "password": "s3cret",
            "kunnr_za": "999"
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("json");
    assert_eq!(body["login"], "shop@example.com");
    assert_eq!(body["source"], "account");
    assert_eq!(body["vkorg"], "5000");
    assert_eq!(body["kunnr_rg"], "777");
    assert_eq!(body["kunnr_za"], "999");
    assert_eq!(body["vbeln"], "C-55");

    // Discovery authenticated as the new account.
    let info = &upstream.requests_to(USER_INFO_PATH)[0];
    assert_eq!(info.form.get("VKORG").map(String::as_str), Some("5000"));
    assert!(
        info.authorization
            .as_deref()
            .is_some_and(|a| a.starts_with("Basic "))
    );

    assert_eq!(summary(&app, 3).await, body);
}

#[tokio::test]
async fn test_searches_use_the_account() {
    let (upstream, app) = setup().await;
    upstream.reply(
        SEARCH_PATH,
        Reply::Json(envelope(json!({
            "ARRAY": [search_row("111", "OC90", "MAHLE", false)]
        }))),
    );

    app.as_user(Method::POST, PATH, 3)
        .json(&json!({"login": "shop@example.com", "password": "s3cret"}))
        .send()
        .await
        .expect("request");

    for user_id in [3, 4] {
        let resp = app
            .as_user(Method::POST, "/api/search", user_id)
            .json(&json!({"query": "OC90"}))
            .send()
            .await
            .expect("request");
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let searches = upstream.requests_to(SEARCH_PATH);
    let login = |i: usize| searches[i].form.get("LOGIN").cloned();
    let vkorg = |i: usize| searches[i].form.get("VKORG").cloned();

    assert_eq!(login(0).as_deref(), Some("shop@example.com"));
    assert_eq!(searches[0].form.get("PASSWORD").map(String::as_str), Some("s3cret"));
    assert_eq!(vkorg(0).as_deref(), Some("5000"));
    assert_eq!(searches[0].form.get("KUNNR_ZA").map(String::as_str), Some("778"));

    // Other users still search with the defaults.
    assert_eq!(login(1).as_deref(), Some(DEFAULT_LOGIN));
    assert_eq!(vkorg(1).as_deref(), Some(DEFAULT_VKORG));
}

#[tokio::test]
async fn test_save_rejects_blank_password() {
    let (upstream, app) = setup().await;

    let resp = app
        .as_user(Method::POST, PATH, 3)
        .json(&json!({"login": "shop@example.com", "password": ""}))
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_delete_falls_back_to_defaults() {
    let (_upstream, app) = setup().await;

    app.as_user(Method::POST, PATH, 3)
        .json(&json!({"login": "shop@example.com", "password": "s3cret"}))
        .send()
        .await
        .expect("request");
    assert_eq!(summary(&app, 3).await["source"], "account");

    let resp = app.as_user(Method::DELETE, PATH, 3).send().await.expect("request");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(summary(&app, 3).await["source"], "defaults");

    // Deleting again is not an error.
    let resp = app.as_user(Method::DELETE, PATH, 3).send().await.expect("request");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
