//! Live-server tests for staff account revocation.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database
//! - `super_admin` credentials in `BAZAAR_TEST_STAFF_LOGIN` / `BAZAAR_TEST_STAFF_PASSWORD`
//! - The API running at `BAZAAR_API_URL`
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use bazaar_integration_tests::{
    api_url, login_staff, session_client, unique_mobile, unique_suffix,
};

const PASSWORD: &str = "correct horse battery";

/// Create an `admin` account and return it with a client logged in as it.
async fn logged_in_admin(super_admin: &Client) -> (Value, Client) {
    let phone = unique_mobile();
    let resp = super_admin
        .post(api_url("/staff"))
        .json(&json!({
            "name": format!("Temp Admin {}", unique_suffix()),
            "role": "admin",
            "phone": phone,
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let user: Value = resp.json().await.unwrap();

    let client = session_client();
    let resp = client
        .post(api_url("/staff/login"))
        .json(&json!({ "email_or_phone": phone, "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(api_url("/staff/check-auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    (user, client)
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_deactivated_staff_lose_their_session() {
    let super_admin = session_client();
    login_staff(&super_admin).await;
    let (user, client) = logged_in_admin(&super_admin).await;

    let resp = super_admin
        .put(api_url(&format!("/staff/{}", user["code"].as_str().unwrap())))
        .json(&json!({ "active_state": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(api_url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let resp = client.get(api_url("/staff/check-auth")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_demoted_staff_become_read_only() {
    let super_admin = session_client();
    login_staff(&super_admin).await;
    let (user, client) = logged_in_admin(&super_admin).await;
    let code = user["code"].as_str().unwrap();

    let resp = super_admin
        .put(api_url(&format!("/staff/{code}")))
        .json(&json!({ "role": "viewer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(api_url("/variables"))
        .json(&json!({ "variable_name": format!("Size {}", unique_suffix()) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    super_admin
        .delete(api_url(&format!("/staff/{code}")))
        .send()
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_deleted_staff_lose_their_session() {
    let super_admin = session_client();
    login_staff(&super_admin).await;
    let (user, client) = logged_in_admin(&super_admin).await;

    let resp = super_admin
        .delete(api_url(&format!("/staff/{}", user["code"].as_str().unwrap())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client.get(api_url("/orders")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
