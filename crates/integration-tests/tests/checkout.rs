//! Live-server tests for checkout, cancellation and coupon handling.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database with at least one active product
//!   whose code is in `BAZAAR_TEST_PRODUCT` and with stock of 2 or more
//! - Staff credentials in `BAZAAR_TEST_STAFF_LOGIN` / `BAZAAR_TEST_STAFF_PASSWORD`
//! - The API running at `BAZAAR_API_URL`
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use bazaar_integration_tests::{
    api_url, login_staff, register_customer, session_client, unique_suffix,
};

fn test_product_code() -> String {
    std::env::var("BAZAAR_TEST_PRODUCT").expect("BAZAAR_TEST_PRODUCT not set")
}

async fn product(client: &Client, code: &str) -> Value {
    client
        .get(api_url(&format!("/products/{code}")))
        .send()
        .await
        .expect("Failed to fetch product")
        .json()
        .await
        .expect("Failed to read product")
}

async fn place_order(client: &Client, product_id: &Value, quantity: i64, coupon: Option<&str>) -> reqwest::Response {
    client
        .post(api_url("/orders"))
        .json(&json!({
            "items": [{ "product_id": product_id, "quantity": quantity }],
            "delivery_location": { "city": "Pune", "pin": "411001" },
            "coupon_code": coupon,
            "payment_mode": "COD",
        }))
        .send()
        .await
        .expect("Failed to place order")
}

#[tokio::test]
#[ignore = "Requires running API server, database and seeded product"]
async fn test_cod_order_decrements_and_cancel_restocks() {
    let code = test_product_code();
    let customer = session_client();
    register_customer(&customer).await;
    let staff = session_client();
    login_staff(&staff).await;

    let before = product(&customer, &code).await;
    let stock_before = before["in_stock"].as_i64().unwrap();

    let resp = place_order(&customer, &before["id"], 1, None).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed: Value = resp.json().await.unwrap();
    assert_eq!(placed["order"]["status"], "ordered");
    assert_eq!(placed["payment"]["status"], "pending");
    assert_eq!(placed["payment"]["mode"], "COD");
    assert_eq!(placed["order"]["items"][0]["unit_price"], before["price"]);

    let after = product(&customer, &code).await;
    assert_eq!(after["in_stock"].as_i64().unwrap(), stock_before - 1);

    let order_code = placed["order"]["code"].as_str().unwrap();
    let resp = staff
        .put(api_url(&format!("/orders/{order_code}")))
        .json(&json!({ "status": "canceled" }))
        .send()
        .await
        .expect("Failed to cancel order");
    assert_eq!(resp.status(), StatusCode::OK);

    let restocked = product(&customer, &code).await;
    assert_eq!(restocked["in_stock"].as_i64().unwrap(), stock_before);

    // Canceled is terminal.
    let resp = staff
        .put(api_url(&format!("/orders/{order_code}")))
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .expect("Failed to update order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server, database and seeded product"]
async fn test_order_over_stock_conflicts() {
    let code = test_product_code();
    let customer = session_client();
    register_customer(&customer).await;

    let current = product(&customer, &code).await;
    let too_many = current["in_stock"].as_i64().unwrap() + 1;

    let resp = place_order(&customer, &current["id"], too_many, None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let unchanged = product(&customer, &code).await;
    assert_eq!(unchanged["in_stock"], current["in_stock"]);
}

#[tokio::test]
#[ignore = "Requires running API server, database and seeded product"]
async fn test_other_customers_cannot_read_order() {
    let code = test_product_code();
    let owner = session_client();
    register_customer(&owner).await;
    let stranger = session_client();
    register_customer(&stranger).await;
    let staff = session_client();
    login_staff(&staff).await;

    let current = product(&owner, &code).await;
    let placed: Value = place_order(&owner, &current["id"], 1, None)
        .await
        .json()
        .await
        .unwrap();
    let order_code = placed["order"]["code"].as_str().unwrap();

    let resp = owner
        .get(api_url(&format!("/orders/{order_code}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = stranger
        .get(api_url(&format!("/orders/{order_code}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // Clean up: deleting an `ordered` order restocks it.
    let resp = staff
        .delete(api_url(&format!("/orders/{order_code}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires running API server, database and seeded product"]
async fn test_coupon_is_single_use_per_customer() {
    let code = test_product_code();
    let staff = session_client();
    login_staff(&staff).await;

    let coupon_name = format!("TEST{}", unique_suffix().to_uppercase());
    let resp = staff
        .post(api_url("/coupons"))
        .json(&json!({
            "coupon_name": coupon_name,
            "discount": "10",
            "minimum_amount": "0",
            "up_to_amount": "100000",
            "start_date": "2020-01-01T00:00:00Z",
            "end_date": "2099-12-31T23:59:59Z",
        }))
        .send()
        .await
        .expect("Failed to create coupon");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let coupon: Value = resp.json().await.unwrap();

    let customer = session_client();
    register_customer(&customer).await;
    let current = product(&customer, &code).await;

    let first = place_order(&customer, &current["id"], 1, Some(&coupon_name)).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let placed: Value = first.json().await.unwrap();
    assert_eq!(placed["order"]["coupon_id"], coupon["id"]);

    let second = place_order(&customer, &current["id"], 1, Some(&coupon_name)).await;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    // Clean up.
    let order_code = placed["order"]["code"].as_str().unwrap();
    staff
        .delete(api_url(&format!("/orders/{order_code}")))
        .send()
        .await
        .unwrap();
    let coupon_code = coupon["code"].as_str().unwrap();
    staff
        .delete(api_url(&format!("/coupons/{coupon_code}")))
        .send()
        .await
        .unwrap();
}
