//! Live-server tests for customer accounts, cart and wishlist.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`bazaar-cli migrate`)
//! - The API running at `BAZAAR_API_URL` (`cargo run -p bazaar-api`)
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use bazaar_integration_tests::{api_url, register_customer, session_client, unique_mobile};

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_register_starts_session() {
    let client = session_client();
    let customer = register_customer(&client).await;

    assert!(customer["code"].as_str().unwrap().starts_with("CUS"));
    assert_eq!(customer["is_login"], true);
    assert!(customer.get("password").is_none());
    assert!(customer.get("password_hash").is_none());

    let resp = client
        .get(api_url("/customers/check-auth"))
        .send()
        .await
        .expect("Failed to check auth");
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["code"], customer["code"]);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_duplicate_email_conflicts() {
    let client = session_client();
    let customer = register_customer(&client).await;

    let resp = session_client()
        .post(api_url("/customers/register"))
        .json(&json!({
            "name": "Second",
            "email": customer["email"],
            "mobile": unique_mobile(),
            "password": "correct horse battery",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_short_password_is_rejected() {
    let resp = session_client()
        .post(api_url("/customers/register"))
        .json(&json!({
            "name": "Short",
            "email": "short-password@example.com",
            "mobile": unique_mobile(),
            "password": "short",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_logout_ends_session() {
    let client = session_client();
    register_customer(&client).await;

    let resp = client
        .post(api_url("/customers/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .get(api_url("/customers/me"))
        .send()
        .await
        .expect("Failed to fetch profile");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_wrong_password_is_unauthorized() {
    let client = session_client();
    let customer = register_customer(&client).await;

    let resp = session_client()
        .post(api_url("/customers/login"))
        .json(&json!({
            "email_or_mobile": customer["email"],
            "password": "not the password",
        }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_profile_update_validates_mobile() {
    let client = session_client();
    register_customer(&client).await;

    let resp = client
        .put(api_url("/customers/me"))
        .json(&json!({ "mobile": "12" }))
        .send()
        .await
        .expect("Failed to update profile");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .put(api_url("/customers/me"))
        .json(&json!({ "addresses": [{ "city": "Pune", "pin": "411001" }] }))
        .send()
        .await
        .expect("Failed to update profile");
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["addresses"][0]["city"], "Pune");
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_new_cart_is_empty() {
    let client = session_client();
    register_customer(&client).await;

    let cart: Value = client
        .get(api_url("/customers/me/cart"))
        .send()
        .await
        .expect("Failed to fetch cart")
        .json()
        .await
        .unwrap();
    assert_eq!(cart["lines"], json!([]));
    assert_eq!(cart["item_count"], 0);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_rejects_unknown_product() {
    let client = session_client();
    register_customer(&client).await;

    let resp = client
        .post(api_url("/customers/me/cart"))
        .json(&json!({ "product_id": "PRD999999" }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
