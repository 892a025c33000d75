//! Integration tests for the folklore archive backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::Authenticator;
use crate::config::{Config, Environment, LogFormat, RateLimitSettings};
use crate::db::{init_database, Repository};
use crate::rate_limit::RateLimiter;
use crate::{create_router, AppState};

const API_KEY: &str = "test-api-key";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
});

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_settings(Some(API_KEY.to_string()), 10).await
    }

    async fn with_settings(api_key: Option<String>, max_requests: u32) -> Self {
        Self::with_proxy_trust(api_key, max_requests, false).await
    }

    async fn with_proxy_trust(
        api_key: Option<String>,
        max_requests: u32,
        trust_proxy_headers: bool,
    ) -> Self {
        Lazy::force(&TRACING);

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Create config
        let config = Config {
            api_key: api_key.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            log_format: LogFormat::Pretty,
            environment: Environment::Production,
            rate_limit: RateLimitSettings {
                max_requests,
                window: Duration::from_secs(60),
                cleanup_interval: Duration::from_secs(300),
            },
            max_body_bytes: 64 * 1024,
            trust_proxy_headers,
        };

        let state = AppState {
            repo: repo.clone(),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            authenticator: Arc::new(Authenticator::new(config.api_key.clone())),
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            repo,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create(&self, payload: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/items"))
            .json(&payload)
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

fn kaidan(title: &str) -> Value {
    json!({
        "type": "KAIDAN",
        "language": "JA",
        "confidence": "PRIMARY",
        "status": "PUBLISHED",
        "title": { "ja": title },
        "body": { "ja": "本文" },
        "motifs": ["ENTITY"]
    })
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_create_item_end_to_end() {
    let fixture = TestFixture::new().await;

    let mut payload = kaidan("テスト");
    payload.as_object_mut().unwrap().remove("status");
    let resp = fixture.create(payload).await;

    assert_eq!(resp.status(), 201);
    assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "9");
    assert!(resp.headers().contains_key("x-ratelimit-reset"));
    assert!(resp.headers().contains_key("x-request-id"));
    assert!(!resp.headers().contains_key("retry-after"));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["id"], "FLK-000001");
    assert!(body["data"]["createdAt"].is_string());

    let stored = fixture.repo.get_item("FLK-000001").await.unwrap().unwrap();
    for token in ["テ", "テス", "テスト"] {
        assert!(stored.search_tokens.contains(token), "missing {token}");
    }

    // Drafts stay out of the public catalog.
    let (status, _) = fixture.get_json("/api/items/FLK-000001").await;
    assert_eq!(status, 404);
    let (_, list) = fixture.get_json("/api/items").await;
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn test_sequential_ids() {
    let fixture = TestFixture::new().await;

    for expected in ["FLK-000001", "FLK-000002", "FLK-000003"] {
        let body: Value = fixture.create(kaidan("猿夢")).await.json().await.unwrap();
        assert_eq!(body["data"]["id"], expected);
    }
}

#[tokio::test]
async fn test_auth_missing_key() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .post(fixture.url("/api/items"))
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    assert!(resp.headers().contains_key("x-ratelimit-remaining"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_key_and_bearer() {
    let fixture = TestFixture::new().await;
    let client = Client::new();

    let resp = client
        .post(fixture.url("/api/items"))
        .header("x-api-key", "wrong-key")
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(fixture.url("/api/items"))
        .bearer_auth(API_KEY)
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn test_unconfigured_key_refuses_ingestion() {
    let fixture = TestFixture::with_settings(None, 10).await;

    let resp = Client::new()
        .post(fixture.url("/api/items"))
        .header("x-api-key", "anything")
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_validation_errors_list_fields() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .create(json!({
            "type": "GHOST_STORY",
            "language": "JA",
            "confidence": "PRIMARY",
            "title": {},
            "body": { "ja": "本文" },
            "motifs": ["ENTITY", "CURSE", "RITUAL", "DREAM"]
        }))
        .await;

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let details = &body["error"]["details"];
    assert!(details["type"].is_string());
    assert!(details["title"].is_string());
    assert!(details["motifs"].is_string());

    // Rejected requests consume no id.
    let created: Value = fixture.create(kaidan("テスト")).await.json().await.unwrap();
    assert_eq!(created["data"]["id"], "FLK-000001");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/items"))
        .header("content-type", "application/json")
        .body("{\"type\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_rate_limit_blocks_after_quota() {
    let fixture = TestFixture::with_settings(Some(API_KEY.to_string()), 2).await;

    for _ in 0..2 {
        let resp = fixture.create(kaidan("テスト")).await;
        assert_eq!(resp.status(), 201);
    }

    let resp = fixture.create(kaidan("テスト")).await;
    assert_eq!(resp.status(), 429);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = resp.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(body["error"]["details"]["retryAfter"], retry_after);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_evade_limit() {
    let fixture = TestFixture::with_settings(Some(API_KEY.to_string()), 2).await;

    let mut created = 0;
    for i in 0..6 {
        let resp = fixture
            .client
            .post(fixture.url("/api/items"))
            .header("x-forwarded-for", format!("10.9.9.{}", i))
            .header("x-real-ip", format!("10.8.8.{}", i))
            .json(&kaidan("テスト"))
            .send()
            .await
            .unwrap();
        if resp.status() == 201 {
            created += 1;
        } else {
            assert_eq!(resp.status(), 429);
        }
    }

    assert_eq!(created, 2);
}

#[tokio::test]
async fn test_trusted_proxy_headers_key_the_window() {
    let fixture = TestFixture::with_proxy_trust(Some(API_KEY.to_string()), 1, true).await;

    let send = |ip: &'static str| {
        fixture
            .client
            .post(fixture.url("/api/items"))
            .header("x-forwarded-for", ip)
            .json(&kaidan("テスト"))
            .send()
    };

    assert_eq!(send("203.0.113.50").await.unwrap().status(), 201);
    assert_eq!(send("203.0.113.50").await.unwrap().status(), 429);
    // Another forwarded client has its own window.
    assert_eq!(send("203.0.113.51").await.unwrap().status(), 201);
}

#[tokio::test]
async fn test_rate_limit_applies_before_auth() {
    let fixture = TestFixture::with_settings(Some(API_KEY.to_string()), 1).await;
    let anonymous = Client::new();

    let resp = anonymous
        .post(fixture.url("/api/items"))
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = anonymous
        .post(fixture.url("/api/items"))
        .json(&kaidan("テスト"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
}

#[tokio::test]
async fn test_query_filters_by_type() {
    let fixture = TestFixture::new().await;

    fixture.create(kaidan("きさらぎ駅")).await;
    fixture.create(kaidan("くねくね")).await;
    let mut legend = kaidan("口裂け女");
    legend["type"] = json!("URBAN_LEGEND");
    fixture.create(legend).await;

    let (status, body) = fixture.get_json("/api/items?type=KAIDAN").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["hasMore"], false);
    for item in body["data"]["items"].as_array().unwrap() {
        assert_eq!(item["type"], "KAIDAN");
    }

    let (_, body) = fixture
        .get_json("/api/items?type=KAIDAN,URBAN_LEGEND&sort=createdAt&order=asc&limit=2")
        .await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["hasMore"], true);
    assert_eq!(body["data"]["items"][0]["id"], "FLK-000001");
}

#[tokio::test]
async fn test_query_text_prefix() {
    let fixture = TestFixture::new().await;

    fixture.create(kaidan("くねくね")).await;
    fixture.create(kaidan("きさらぎ駅")).await;

    let (_, body) = fixture.get_json("/api/items?q=%E3%81%8F%E3%81%AD").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["title"]["ja"], "くねくね");

    let resp = fixture
        .client
        .post(fixture.url("/api/items/query"))
        .json(&json!({ "filters": { "q": "FLK-000002" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], "FLK-000002");
}

#[tokio::test]
async fn test_query_rejects_unknown_literal() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/items?language=FR").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["details"]["language"].is_string());

    let resp = fixture
        .client
        .post(fixture.url("/api/items/query"))
        .json(&json!({ "filters": { "type": ["GHOST"] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_facet_counts() {
    let fixture = TestFixture::new().await;

    let mut a = kaidan("ひとりかくれんぼ");
    a["motifs"] = json!(["RITUAL", "CURSE"]);
    a["firstSeen"] = json!("2000s");
    fixture.create(a).await;
    fixture.create(kaidan("くねくね")).await;
    let mut draft = kaidan("下書き");
    draft["status"] = json!("DRAFT");
    fixture.create(draft).await;

    let (status, body) = fixture.get_json("/api/facets").await;
    assert_eq!(status, 200);
    let data = &body["data"];
    assert_eq!(data["type"]["KAIDAN"], 2);
    assert_eq!(data["language"]["JA"], 2);
    assert_eq!(data["motif"]["RITUAL"], 1);
    assert_eq!(data["motif"]["ENTITY"], 1);
    assert_eq!(data["firstSeen"]["2000s"], 1);

    let (_, body) = fixture.get_json("/api/facets?motif=CURSE").await;
    assert_eq!(body["data"]["type"]["KAIDAN"], 1);
}

#[tokio::test]
async fn test_get_published_item() {
    let fixture = TestFixture::new().await;
    fixture.create(kaidan("猿夢")).await;

    let (status, body) = fixture.get_json("/api/items/FLK-000001").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], "FLK-000001");
    assert_eq!(body["data"]["status"], "PUBLISHED");
    assert_eq!(body["data"]["annotationCount"], 0);

    let (status, body) = fixture.get_json("/api/items/FLK-999999").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_json_query_uses_query_string_vocabulary() {
    let fixture = TestFixture::new().await;

    let mut cursed = kaidan("ひとりかくれんぼ");
    cursed["motifs"] = json!(["CURSE"]);
    cursed["language"] = json!("EN");
    fixture.create(cursed).await;
    fixture.create(kaidan("くねくね")).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/items/query"))
        .json(&json!({ "filters": { "motif": ["CURSE"], "language": ["EN"] } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], "FLK-000001");

    let (_, listed) = fixture.get_json("/api/items?motif=CURSE&language=EN").await;
    assert_eq!(listed["data"]["total"], body["data"]["total"]);
}
