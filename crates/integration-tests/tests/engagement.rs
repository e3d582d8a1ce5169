//! Integration tests for notifications, support chat and tickets.
//!
//! Run with: cargo test -p bazaar-integration-tests -- --ignored

use bazaar_integration_tests::{
    add_to_cart, admin, checkout_body, create_product, expect_data, expect_error, shopper, url,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn notifications(client: &Client) -> Value {
    let resp = client
        .get(url("/api/notifications"))
        .send()
        .await
        .expect("Failed to list notifications");
    expect_data(resp, StatusCode::OK).await
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_mark_all_read_zeroes_unread_count() {
    let (admin, _) = admin().await;
    let product = create_product(&admin, "9.00", 10).await;

    let (shopper, _) = shopper().await;
    add_to_cart(&shopper, &product["id"], 1).await;
    let resp = shopper
        .post(url("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap();
    expect_data(resp, StatusCode::CREATED).await;

    let before = notifications(&shopper).await;
    assert!(before["unread_count"].as_i64().unwrap() >= 1);

    let resp = shopper
        .post(url("/api/notifications/read-all"))
        .send()
        .await
        .unwrap();
    expect_data(resp, StatusCode::OK).await;

    let after = notifications(&shopper).await;
    assert_eq!(after["unread_count"], json!(0));
    assert!(
        after["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|n| n["is_read"] == json!(true))
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_cannot_touch_someone_elses_notification() {
    let (admin, _) = admin().await;
    let product = create_product(&admin, "9.00", 10).await;

    let (owner, _) = shopper().await;
    add_to_cart(&owner, &product["id"], 1).await;
    let resp = owner
        .post(url("/api/checkout"))
        .json(&checkout_body())
        .send()
        .await
        .unwrap();
    expect_data(resp, StatusCode::CREATED).await;
    let list = notifications(&owner).await;
    let id = &list["items"][0]["id"];

    let (other, _) = shopper().await;
    let resp = other
        .delete(url(&format!("/api/notifications/{id}")))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND).await;
}

// ============================================================================
// Chat
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_chat_poll_returns_only_newer_messages() {
    let (shopper, _) = shopper().await;
    let resp = shopper
        .post(url("/api/chat/conversations"))
        .json(&json!({"subject": "Sizing", "message": "Does the tee run small?"}))
        .send()
        .await
        .unwrap();
    let conversation = expect_data(resp, StatusCode::CREATED).await;
    let messages_url = url(&format!(
        "/api/chat/conversations/{}/messages",
        conversation["id"]
    ));

    let resp = shopper.get(&messages_url).send().await.unwrap();
    let first = expect_data(resp, StatusCode::OK).await;
    assert_eq!(first["messages"].as_array().unwrap().len(), 1);
    let cursor = first["cursor"].clone();

    let (admin, _) = admin().await;
    let resp = admin
        .post(&messages_url)
        .json(&json!({"message": "It runs true to size."}))
        .send()
        .await
        .unwrap();
    let reply = expect_data(resp, StatusCode::CREATED).await;
    assert_eq!(reply["is_staff"], json!(true));

    let resp = shopper
        .get(format!("{messages_url}?after={cursor}"))
        .send()
        .await
        .unwrap();
    let next = expect_data(resp, StatusCode::OK).await;
    let messages = next["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], reply["id"]);
    assert_eq!(next["cursor"], reply["id"]);

    // Nothing new: the cursor stays put
    let resp = shopper
        .get(format!("{messages_url}?after={}", next["cursor"]))
        .send()
        .await
        .unwrap();
    let empty = expect_data(resp, StatusCode::OK).await;
    assert!(empty["messages"].as_array().unwrap().is_empty());
    assert_eq!(empty["cursor"], next["cursor"]);

    // The staff reply produced a notification
    let list = notifications(&shopper).await;
    assert!(
        list["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["kind"] == json!("chat_message"))
    );
}

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_closed_conversation_rejects_messages() {
    let (shopper, _) = shopper().await;
    let resp = shopper
        .post(url("/api/chat/conversations"))
        .json(&json!({"message": "Hello"}))
        .send()
        .await
        .unwrap();
    let conversation = expect_data(resp, StatusCode::CREATED).await;

    let (admin, _) = admin().await;
    let resp = admin
        .post(url(&format!(
            "/api/chat/conversations/{}/close",
            conversation["id"]
        )))
        .send()
        .await
        .unwrap();
    expect_data(resp, StatusCode::OK).await;

    let resp = shopper
        .post(url(&format!(
            "/api/chat/conversations/{}/messages",
            conversation["id"]
        )))
        .json(&json!({"message": "Still there?"}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST).await;
}

// ============================================================================
// Tickets
// ============================================================================

#[tokio::test]
#[ignore = "Requires running server and database"]
async fn test_ticket_thread_and_closed_ticket() {
    let (shopper, _) = shopper().await;
    let resp = shopper
        .post(url("/api/tickets"))
        .json(&json!({"subject": "Damaged parcel", "message": "The box arrived crushed."}))
        .send()
        .await
        .unwrap();
    let ticket = expect_data(resp, StatusCode::CREATED).await;
    assert!(ticket["ticket_number"].as_str().unwrap().starts_with("TKT"));
    assert_eq!(ticket["priority"], json!("medium"));
    let ticket_url = url(&format!("/api/tickets/{}", ticket["id"]));

    let (admin, _) = admin().await;
    let resp = admin
        .post(format!("{ticket_url}/messages"))
        .json(&json!({"message": "Sorry about that, a replacement is on its way."}))
        .send()
        .await
        .unwrap();
    let thread = expect_data(resp, StatusCode::CREATED).await;
    assert_eq!(thread["messages"].as_array().unwrap().len(), 2);

    let resp = admin
        .patch(&ticket_url)
        .json(&json!({"status": "closed"}))
        .send()
        .await
        .unwrap();
    expect_data(resp, StatusCode::OK).await;

    let resp = shopper
        .post(format!("{ticket_url}/messages"))
        .json(&json!({"message": "Thanks!"}))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST).await;

    let list = notifications(&shopper).await;
    assert!(
        list["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["kind"] == json!("ticket_reply"))
    );
}
