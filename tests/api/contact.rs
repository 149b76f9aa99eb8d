use std::sync::Arc;
use std::time::{Duration, Instant};

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{spawn_app, spawn_app_with_mailer, valid_submission, StubMailer};

#[tokio::test]
async fn contact_returns_200_for_a_valid_submission() {
    let mailer = StubMailer::new();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let response = app.post_contact(&valid_submission()).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Message received successfully");
    assert_eq!(body["status"], "sending");
    assert!(body["responseTime"].as_str().unwrap().ends_with("ms"));
    assert_eq!(mailer.wait_for_calls(1, Duration::from_secs(5)).await, 1);
}

#[tokio::test]
async fn contact_responds_before_a_slow_delivery_finishes() {
    let mailer = StubMailer::new().with_delay(Duration::from_secs(5));
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let started_at = Instant::now();
    let response = app.post_contact(&valid_submission()).await;
    let elapsed = started_at.elapsed();

    assert_eq!(response.status().as_u16(), 200);
    assert!(
        elapsed < Duration::from_secs(2),
        "The response took {:?}, it waited for the delivery",
        elapsed
    );
    assert_eq!(mailer.wait_for_calls(1, Duration::from_secs(2)).await, 1);
    assert_eq!(mailer.completed(), 0);
}

#[tokio::test]
async fn contact_returns_200_even_when_delivery_fails() {
    let mailer = StubMailer::new().failing();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let response = app.post_contact(&valid_submission()).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(mailer.wait_for_completed(1, Duration::from_secs(5)).await, 1);

    // The server keeps serving after a failed background delivery.
    let response = app.post_contact(&valid_submission()).await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn contact_returns_400_with_details_in_field_order() {
    let mailer = StubMailer::new();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let response = app
        .post_contact(&serde_json::json!({
            "name": "Jo",
            "email": "not-an-email",
            "subject": "Hi there",
            "message": "Too short",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "error": "Validation failed",
            "details": [
                "Please enter a valid email",
                "Message must be at least 10 characters",
            ],
        })
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mailer.calls(), 0);
}

#[tokio::test]
async fn contact_returns_400_when_data_is_missing_or_invalid() {
    let app = spawn_app_with_mailer(Arc::new(StubMailer::new())).await;
    let test_cases = vec![
        (
            serde_json::json!({
                "email": "a@b.co",
                "subject": "Hi there",
                "message": "Hello world!",
            }),
            "Name is required",
        ),
        (
            serde_json::json!({
                "name": "A1",
                "email": "a@b.co",
                "subject": "Hi there",
                "message": "Hello world!",
            }),
            "Name can only contain letters, spaces, hyphens, and apostrophes",
        ),
        (
            serde_json::json!({
                "name": "Jo",
                "email": null,
                "subject": "Hi there",
                "message": "Hello world!",
            }),
            "Email is required",
        ),
        (
            serde_json::json!({
                "name": "Jo",
                "email": "a@b.co",
                "subject": "   ",
                "message": "Hello world!",
            }),
            "Subject is required",
        ),
        (
            serde_json::json!({
                "name": "Jo",
                "email": "a@b.co",
                "subject": "Hi there",
                "message": "aaaaaaaaaaaa",
            }),
            "Message should contain more varied content",
        ),
    ];

    for (invalid_body, expected_detail) in test_cases {
        let response = app.post_contact(&invalid_body).await;

        assert_eq!(
            response.status().as_u16(),
            400,
            "The API did not fail with 400 Bad Request when the payload was {}.",
            invalid_body
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["details"], serde_json::json!([expected_detail]));
    }
}

#[tokio::test]
async fn contact_returns_500_when_the_mailer_is_not_configured() {
    let mailer = StubMailer::new().unconfigured();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let response = app.post_contact(&valid_submission()).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "error": "Email service not configured" })
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mailer.calls(), 0);
}

#[tokio::test]
async fn validation_runs_before_the_configuration_check() {
    let app = spawn_app_with_mailer(Arc::new(StubMailer::new().unconfigured())).await;

    let response = app
        .post_contact(&serde_json::json!({
            "name": "",
            "email": "a@b.co",
            "subject": "Hi there",
            "message": "Hello world!",
        }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn contact_returns_500_for_an_unparseable_payload() {
    let mailer = StubMailer::new();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    for body in [
        "this is not json",
        r#"{"name": 42, "email": "a@b.co", "subject": "Hi there", "message": "Hello world!"}"#,
        "42",
        r#"["Jo", "a@b.co", "Hi there", "Hello world!"]"#,
    ] {
        let response = app.post_contact_raw(body).await;

        assert_eq!(response.status().as_u16(), 500);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Failed to process request" }));
    }
    assert_eq!(mailer.calls(), 0);
}

#[tokio::test]
async fn an_oversized_message_gets_the_length_violation() {
    let mailer = StubMailer::new();
    let app = spawn_app_with_mailer(Arc::new(mailer.clone())).await;

    let response = app
        .post_contact(&serde_json::json!({
            "name": "Jo",
            "email": "a@b.co",
            "subject": "Hi there",
            "message": "ab ".repeat(100_000),
        }))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({
            "error": "Validation failed",
            "details": ["Message cannot exceed 1000 characters"],
        })
    );
    assert_eq!(mailer.calls(), 0);
}

#[tokio::test]
async fn preflight_allows_cross_origin_posts() {
    let app = spawn_app_with_mailer(Arc::new(StubMailer::new())).await;

    let response = app.preflight_contact().await;

    assert_eq!(response.status().as_u16(), 200);
    let headers = response.headers();
    assert_eq!(headers["Access-Control-Allow-Origin"], "*");
    assert_eq!(headers["Access-Control-Allow-Methods"], "POST, OPTIONS");
    assert_eq!(headers["Access-Control-Allow-Headers"], "Content-Type");
    assert_eq!(response.text().await.unwrap(), "");
}

#[tokio::test]
async fn the_email_api_receives_the_submission_with_reply_to() {
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let response = app.post_contact(&valid_submission()).await;
    assert_eq!(response.status().as_u16(), 200);

    let deadline = Instant::now() + Duration::from_secs(5);
    let requests = loop {
        let requests = app.email_server.received_requests().await.unwrap();
        if !requests.is_empty() || Instant::now() > deadline {
            break requests;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(requests.len(), 1);

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["From"], "relay@example.com");
    assert_eq!(body["To"], "owner@example.com");
    assert_eq!(body["ReplyTo"], "Jo <a@b.co>");
    assert_eq!(body["Subject"], "Portfolio Contact: Hi there");
    assert!(body["TextBody"].as_str().unwrap().contains("Hello world!"));
}

#[tokio::test]
async fn a_failing_email_api_does_not_change_the_response() {
    let app = spawn_app().await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let response = app.post_contact(&valid_submission()).await;
    assert_eq!(response.status().as_u16(), 200);

    let deadline = Instant::now() + Duration::from_secs(5);
    while app.email_server.received_requests().await.unwrap().is_empty()
        && Instant::now() < deadline
    {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
