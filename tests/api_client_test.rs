use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use url::Url;
use xbytechat::api::reports::{MessageLog, MessageLogReport};
use xbytechat::api::{ApiClient, ApiError, ApiRequest, RequestOptions, auth, campaigns, contacts, flows, plans};
use xbytechat::config::ClientSettings;
use xbytechat::notifier::{Notifier, NotifyLevel, RecordingSink};
use xbytechat::report::{ExportFormat, ExportSource, ReportQuery, export_report};
use xbytechat::session::{Session, SessionEvent};

fn client(server: &MockServer) -> (ApiClient, Arc<Session>, Arc<RecordingSink>) {
    let settings = ClientSettings {
        api_url: Url::parse(&format!("{}/api/", server.base_url())).unwrap(),
        ..ClientSettings::default()
    };
    let session = Session::in_memory();
    let sink = RecordingSink::new();
    let notifier = Notifier::new(sink.clone(), Duration::from_millis(2500));
    let api = ApiClient::new(&settings, session.clone(), notifier).unwrap();
    (api, session, sink)
}

#[tokio::test]
async fn test_bearer_token_is_attached_when_logged_in() {
    let server = MockServer::start_async().await;
    let (api, session, _) = client(&server);
    session.set_token("tok-123").unwrap();

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/plan/me")
                .header("Authorization", "Bearer tok-123");
            then.status(200).json_body(json!({
                "success": true,
                "data": { "id": "p1", "name": "Growth", "isActive": true }
            }));
        })
        .await;

    let plan = plans::current_plan(&api).await.unwrap();
    assert_eq!(plan.name, "Growth");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_no_authorization_header_without_token() {
    let server = MockServer::start_async().await;
    let (api, _, _) = client(&server);

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/cta-flow/all-published")
                .header_missing("Authorization");
            then.status(200)
                .json_body(json!([{ "id": "f1", "flowName": "Welcome", "isPublished": true }]));
        })
        .await;

    let list = flows::list_published(&api).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].flow_name, "Welcome");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_shape_mismatch_is_malformed() {
    let server = MockServer::start_async().await;
    let (api, _, _) = client(&server);

    // /plan/me is enveloped; a bare object must not decode.
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/plan/me");
            then.status(200).json_body(json!({ "id": "p1", "name": "Growth" }));
        })
        .await;

    let err = plans::current_plan(&api).await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)), "got {err:?}");
}

#[tokio::test]
async fn test_enveloped_failure_is_rejected_with_server_message() {
    let server = MockServer::start_async().await;
    let (api, _, sink) = client(&server);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/cta-flow/save-visual");
            then.status(200).json_body(json!({
                "success": false,
                "message": "Flow name already exists",
                "data": null
            }));
        })
        .await;

    let flow = xbytechat::flow::Flow::new("Dup");
    let err = flows::save_flow(&api, &flow, false).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            message: "Flow name already exists".into()
        }
    );
    assert_eq!(
        sink.entries(),
        vec![(NotifyLevel::Error, "Flow name already exists".to_string())]
    );
}

#[tokio::test]
async fn test_unauthorized_clears_token_and_toasts_once() {
    let server = MockServer::start_async().await;
    let (api, session, sink) = client(&server);
    session.set_token("expired").unwrap();
    let mut events = session.subscribe();

    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/campaign/get-all-campaigns");
            then.status(401);
        })
        .await;

    let first = campaigns::list_campaigns(&api).await.unwrap_err();
    let second = campaigns::list_campaigns(&api).await.unwrap_err();
    assert_eq!(first, ApiError::Unauthorized);
    assert_eq!(second, ApiError::Unauthorized);
    mock.assert_hits_async(2).await;

    assert!(!session.is_authenticated());
    assert_eq!(sink.count(), 1);
    assert_eq!(sink.entries()[0].0, NotifyLevel::Error);

    // clear_token publishes nothing; the login request does.
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
}

#[tokio::test]
async fn test_unauthorized_with_suppressed_redirect() {
    let server = MockServer::start_async().await;
    let (api, session, _) = client(&server);
    session.set_token("expired").unwrap();
    let mut events = session.subscribe();

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/plan/me");
            then.status(401);
        })
        .await;

    let request = ApiRequest::get("/plan/me").options(RequestOptions::suppress_auth_redirect());
    let err = api.call::<plans::Plan>(request).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    assert!(!session.is_authenticated());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_login_does_not_ask_for_login_again() {
    let server = MockServer::start_async().await;
    let (api, session, _) = client(&server);
    let mut events = session.subscribe();

    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .body_includes("\"email\":\"ops@example.com\"");
            then.status(401).json_body(json!({ "message": "Invalid credentials" }));
        })
        .await;

    let err = auth::login(&api, "ops@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, auth::AuthError::Api(ApiError::Unauthorized)));
    assert!(!session.in_auth_flow());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_login_stores_token() {
    let server = MockServer::start_async().await;
    let (api, session, _) = client(&server);
    let mut events = session.subscribe();

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(200)
                .json_body(json!({ "token": "fresh", "role": "admin", "businessId": "b1" }));
        })
        .await;

    let response = auth::login(&api, "ops@example.com", "secret").await.unwrap();
    assert_eq!(response.role.as_deref(), Some("admin"));
    assert_eq!(session.token().as_deref(), Some("fresh"));
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoggedIn);
}

#[tokio::test]
async fn test_forbidden_does_not_redirect() {
    let server = MockServer::start_async().await;
    let (api, session, sink) = client(&server);
    session.set_token("valid").unwrap();
    let mut events = session.subscribe();

    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/api/contacts/c9");
            then.status(403);
        })
        .await;

    let err = contacts::delete_contact(&api, "c9").await.unwrap_err();
    assert_eq!(err, ApiError::Forbidden);
    assert!(session.is_authenticated());
    assert!(events.try_recv().is_err());
    assert_eq!(sink.entries()[0].0, NotifyLevel::Warning);
}

#[tokio::test]
async fn test_server_error_message_is_extracted() {
    let server = MockServer::start_async().await;
    let (api, _, sink) = client(&server);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/campaign/send-campaign/42");
            then.status(500).json_body(json!({ "error": "Template not approved" }));
        })
        .await;

    let err = campaigns::send_campaign(&api, "42").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 500,
            message: "Template not approved".into()
        }
    );
    assert_eq!(sink.entries()[0].1, "Template not approved");
}

#[tokio::test]
async fn test_network_failure_is_reported() {
    let settings = ClientSettings {
        api_url: Url::parse("http://127.0.0.1:9/api/").unwrap(),
        request_timeout: Duration::from_secs(2),
        ..ClientSettings::default()
    };
    let sink = RecordingSink::new();
    let api = ApiClient::new(
        &settings,
        Session::in_memory(),
        Notifier::new(sink.clone(), Duration::from_millis(2500)),
    )
    .unwrap();

    let err = plans::list_plans(&api).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    assert!(err.is_unavailable());
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn test_contacts_page_sends_query() {
    let server = MockServer::start_async().await;
    let (api, _, _) = client(&server);

    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/contacts")
                .query_param("page", "2")
                .query_param("pageSize", "10")
                .query_param("search", "ali");
            then.status(200).json_body(json!({
                "success": true,
                "data": {
                    "items": [{ "id": "c1", "name": "Alice", "phoneNumber": "+100" }],
                    "totalCount": 11,
                    "page": 2,
                    "pageSize": 10
                }
            }));
        })
        .await;

    let page = contacts::list_contacts(&api, 2, 10, Some("ali")).await.unwrap();
    assert_eq!(page.items[0].name, "Alice");
    assert_eq!(page.total_pages(), 2);
    mock.assert_async().await;
}

fn sample_log() -> MessageLog {
    MessageLog {
        id: "m1".into(),
        recipient_number: "+15550001".into(),
        campaign_name: Some("Spring, promo".into()),
        status: "Failed".into(),
        message_content: None,
        error_message: Some("131026".into()),
        waba_id: None,
        sent_at: None,
    }
}

#[tokio::test]
async fn test_export_falls_back_to_local_csv_when_endpoint_missing() {
    let server = MockServer::start_async().await;
    let (api, _, sink) = client(&server);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/report/message-logs/export/xlsx");
            then.status(404);
        })
        .await;

    let report = MessageLogReport::new(api);
    let request = ReportQuery::default().to_request();
    let file = export_report(&report, &request, ExportFormat::Xlsx, &[sample_log()])
        .await
        .unwrap();

    assert_eq!(file.source, ExportSource::Client);
    assert_eq!(file.format, ExportFormat::Csv);
    assert!(file.file_name.starts_with("message-logs-"));
    assert!(file.file_name.ends_with(".csv"));
    let text = String::from_utf8(file.bytes).unwrap();
    let mut lines = text.split("\r\n");
    let header: Vec<&str> = lines.next().unwrap().split(',').collect();
    for column in ["id", "recipientNumber", "campaignName", "status", "errorMessage"] {
        assert!(header.contains(&column), "missing {column} in {header:?}");
    }
    assert!(lines.next().unwrap().contains("\"Spring, promo\""));
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_export_uses_server_file_when_available() {
    let server = MockServer::start_async().await;
    let (api, _, _) = client(&server);

    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/report/message-logs/export/csv")
                .body_includes("\"status\":\"Failed\"");
            then.status(200).body("id,status\r\nm1,Failed\r\n");
        })
        .await;

    let report = MessageLogReport::new(api);
    let mut query = ReportQuery::default();
    query.set_filter("status", Some("Failed"));
    let file = export_report(&report, &query.to_request(), ExportFormat::Csv, &[sample_log()])
        .await
        .unwrap();

    assert_eq!(file.source, ExportSource::Server);
    assert_eq!(file.bytes, b"id,status\r\nm1,Failed\r\n".to_vec());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_export_server_error_is_not_masked() {
    let server = MockServer::start_async().await;
    let (api, _, _) = client(&server);

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/report/message-logs/export/csv");
            then.status(500).body("boom");
        })
        .await;

    let report = MessageLogReport::new(api);
    let request = ReportQuery::default().to_request();
    let result = export_report(&report, &request, ExportFormat::Csv, &[sample_log()]).await;
    assert!(result.is_err());
}
