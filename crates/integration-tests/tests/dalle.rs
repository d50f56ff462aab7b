mod harness;

use harness::config::ConfigBuilder;
use harness::mock_openai::MockOpenAi;
use harness::server::TestServer;
use serde_json::json;

#[tokio::test]
async fn generates_requested_images_in_order() {
    let mock = MockOpenAi::start().await.unwrap();
    let config = ConfigBuilder::new().with_dalle_provider(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let (status, json) = server
        .generate(&json!({
            "provider": "dall-e-3",
            "prompt": "A koi pond",
            "n": 3,
            "user_id": "user-42",
        }))
        .await;

    assert_eq!(status, 200);
    assert_eq!(json["status"], "success");
    assert_eq!(json["provider_used"], "dall-e-3");

    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    for (i, image) in data.iter().enumerate() {
        assert_eq!(image["image_url"], format!("https://images.mock-openai.test/img-{i}.png"));
        assert_eq!(image["revised_prompt"], format!("A koi pond, variation {i}"));
        assert_eq!(image["metadata"]["model"], "dall-e-3");
    }

    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn upstream_request_carries_defaults_and_credentials() {
    let mock = MockOpenAi::start().await.unwrap();
    let config = ConfigBuilder::new().with_dalle_provider(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let (status, _) = server
        .generate(&json!({
            "provider": "dall-e-3",
            "prompt": "A koi pond",
            "provider_params": { "quality": "hd" },
        }))
        .await;
    assert_eq!(status, 200);

    let sent = mock.last_request().unwrap();
    assert_eq!(sent["model"], "dall-e-3");
    assert_eq!(sent["n"], 1);
    assert_eq!(sent["size"], "1024x1024");
    assert_eq!(sent["quality"], "hd");
    assert_eq!(sent["style"], "vivid");
    assert_eq!(mock.last_authorization().as_deref(), Some("Bearer test-key"));
}

#[tokio::test]
async fn upstream_rate_limit_keeps_status_and_message() {
    let mock = MockOpenAi::start_failing(429, "Rate limit reached for images").await.unwrap();
    let config = ConfigBuilder::new().with_dalle_provider(&mock.base_url()).build();
    let server = TestServer::start(config).await.unwrap();

    let (status, json) = server
        .generate(&json!({ "provider": "dall-e-3", "prompt": "A koi pond" }))
        .await;

    assert_eq!(status, 429);
    assert_eq!(json["error"]["type"], "upstream_error");
    assert_eq!(
        json["error"]["message"],
        "Error from DALL-E API: Rate limit reached for images"
    );
    assert_eq!(json["error"]["detail"]["error"]["code"], "rate_limit_exceeded");
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // Bind and drop a listener to get a port nobody serves
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ConfigBuilder::new()
        .with_dalle_provider(&format!("http://{addr}/v1"))
        .build();
    let server = TestServer::start(config).await.unwrap();

    let (status, json) = server
        .generate(&json!({ "provider": "dall-e-3", "prompt": "A koi pond" }))
        .await;

    assert_eq!(status, 502);
    assert_eq!(json["error"]["type"], "upstream_error");
}
