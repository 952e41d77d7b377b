use std::sync::Arc;

use chrono::NaiveDate;
use crm_insights::{
    QueryContext, RetrievalError, TieredRetrievalOrchestrator,
    backend::{BackendError, Endpoint, HttpBackend, StatsBackend, StatsQuery},
    models::{
        filter::QueryFilter,
        retrieval::{StatsKind, Tier},
    },
    orchestrator::{AutoConfirm, OrchestratorSettings},
    session::{MemoryTokenStore, TokenStore},
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn query() -> StatsQuery {
    let filter = QueryFilter::new(day(2024, 1, 1), day(2024, 1, 7)).with_users(["8860", "1"]);
    StatsQuery::new(filter.date_range().unwrap(), &filter)
}

#[tokio::test]
async fn sends_bearer_token_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/super-fast"))
        .and(header("authorization", "Bearer secret-token"))
        .and(query_param("start_date", "2024-01-01"))
        .and(query_param("end_date", "2024-01-07"))
        .and(query_param("user_ids", "1,8860"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "cache_completeness": 100,
            "user_stats": [{"user_id": 8860, "calls": 2, "total": 2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Arc::new(MemoryTokenStore::with_token("secret-token"))).unwrap();
    let envelope = backend.fetch(&Endpoint::SuperFast, &query()).await.unwrap();

    assert!(envelope.success);
    assert_eq!(envelope.cache_completeness, Some(100.0));
    assert_eq!(envelope.user_stats.unwrap()[0].user_id.as_str(), "8860");
}

#[tokio::test]
async fn unauthorized_clears_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/main"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("expired"));
    let backend = HttpBackend::new(&server.uri(), tokens.clone()).unwrap();

    let err = backend.fetch(&Endpoint::Main, &query()).await.unwrap_err();
    assert!(matches!(err, BackendError::Unauthorized { status: 401 }));
    assert!(tokens.get().is_none());

    // no token left: fails without a request
    let err = backend.fetch(&Endpoint::Main, &query()).await.unwrap_err();
    assert!(matches!(err, BackendError::MissingToken));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_keep_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/deals/list"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Arc::new(MemoryTokenStore::with_token("t"))).unwrap();
    match backend.fetch(&Endpoint::DealsList, &query()).await {
        Err(BackendError::Http { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Arc::new(MemoryTokenStore::with_token("t"))).unwrap();
    let err = backend.fetch(&Endpoint::Fast, &query()).await.unwrap_err();
    assert!(matches!(
        RetrievalError::from(err),
        RetrievalError::MalformedResponse(_)
    ));
}

#[tokio::test]
async fn ingestion_trigger_and_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/load-progressive"))
        .and(query_param("start_date", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "job_id": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/load-progressive"))
        .and(query_param("job_id", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "completed": false, "progress": 37.4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Arc::new(MemoryTokenStore::with_token("t"))).unwrap();
    let started = backend.start_ingestion(&query()).await.unwrap();
    assert_eq!(started.job_id.as_deref(), Some("42"));

    let status = backend.ingestion_status("42").await.unwrap();
    assert!(!status.completed);
    assert_eq!(status.percent(), Some(37));
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/api/user-activities/8860"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "activities": []})))
        .expect(1)
        .mount(&server)
        .await;

    let base = format!("{}/dashboard/", server.uri());
    let backend = HttpBackend::new(&base, Arc::new(MemoryTokenStore::with_token("t"))).unwrap();
    let range = QueryFilter::new(day(2024, 1, 1), day(2024, 1, 1)).date_range().unwrap();
    let envelope = backend
        .fetch(&Endpoint::UserActivities("8860".into()), &StatsQuery::dates_only(range))
        .await
        .unwrap();
    assert_eq!(envelope.activities.map(|a| a.len()), Some(0));
}

#[tokio::test]
async fn end_to_end_cache_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats/super-fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "cache_completeness": 100,
            "user_stats": [{"user_id": "8860", "calls": 3, "comments": 1, "tasks": 0, "meetings": 0, "total": 4}]
        })))
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token("t"));
    let ctx = QueryContext::new(chrono_tz::Europe::Moscow, Arc::clone(&tokens));
    let orchestrator = TieredRetrievalOrchestrator::new(
        HttpBackend::new(&server.uri(), tokens).unwrap(),
        OrchestratorSettings::default(),
    )
    .with_gate(Arc::new(AutoConfirm(false)));

    let filter = QueryFilter::new(day(2024, 1, 1), day(2024, 1, 1));
    let result = orchestrator.fetch_statistics(&ctx, &filter, StatsKind::Activity).await;

    assert!(result.is_success());
    assert_eq!(result.tier_used, Some(Tier::InstantCache));
    let rollups = result.payload.unwrap().rollups(&ctx, &filter);
    assert_eq!(rollups[0].total, 4);
}

#[tokio::test]
async fn users_fill_the_directory() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .and(header("authorization", "Bearer t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active_users": 1,
            "total_users": 2,
            "users": [
                {"ID": "8860", "NAME": "Ольга", "LAST_NAME": "Безина", "ACTIVE": true},
                {"ID": 17087, "NAME": "Анастасия", "LAST_NAME": "Агапова", "ACTIVE": false}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token("t"));
    let ctx = QueryContext::new(chrono_tz::Europe::Moscow, Arc::clone(&tokens));
    let orchestrator = TieredRetrievalOrchestrator::new(
        HttpBackend::new(&server.uri(), tokens).unwrap(),
        OrchestratorSettings::default(),
    );

    assert_eq!(orchestrator.load_directory(&ctx).await, Ok(2));
    assert_eq!(ctx.directory().display_name(&"17087".into()), "Анастасия Агапова");
}

#[tokio::test]
async fn users_outage_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "Не удалось подключиться к Bitrix24",
            "setup_required": true,
            "active_users": 0,
            "total_users": 0
        })))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&server.uri(), Arc::new(MemoryTokenStore::with_token("t"))).unwrap();
    assert!(matches!(backend.users().await, Err(BackendError::Api(_))));
}
