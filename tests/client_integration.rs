//! Integration tests against a local wiremock server.
//!
//! Each test mounts the responses the API would send and runs the client
//! end to end, including status mapping and SSE decoding of response bodies.

use deepseek::{Client, CompletionRequest, Cursor, Error, FinishReason, Message, ModelId};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

/// Create a client configured to use the mock server.
fn create_test_client(server: &MockServer) -> Client {
    Client::builder()
        .api_key(API_KEY)
        .base_url(server.uri())
        .build()
        .unwrap()
}

fn sse_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_owned(), "text/event-stream")
}

#[tokio::test]
async fn test_stream_completion() {
    let server = MockServer::start().await;
    let sse = "\
: keep-alive\n\
\n\
data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"model\":\"deepseek-chat\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"},\"finish_reason\":null}]}\n\
\n\
data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n\
\n\
data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\"finish_reason\":\"stop\"}]}\n\
\n\
data: {\"id\":\"c1\",\"choices\":[],\"usage\":{\"prompt_tokens\":4,\"completion_tokens\":2,\"total_tokens\":6}}\n\
\n\
data: [DONE]\n\
\n";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("accept", "text/event-stream"))
        .and(body_partial_json(serde_json::json!({
            "model": "deepseek-chat",
            "stream": true,
            "stream_options": {"include_usage": true}
        })))
        .respond_with(sse_response(sse))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let mut stream = client
        .chat(ModelId::DEEPSEEK_CHAT, vec![Message::user("Hi")])
        .include_usage()
        .stream()
        .await
        .unwrap();

    let mut content = String::new();
    let mut finish = None;
    let mut usage = None;
    while stream.advance().await {
        let chunk = stream.take_current().unwrap();
        if let Some(text) = chunk.text() {
            content.push_str(text);
        }
        finish = chunk.finish_reason().or(finish);
        usage = chunk.usage.or(usage);
    }

    assert!(stream.error().is_none(), "unexpected error: {:?}", stream.error());
    assert_eq!(stream.cursor(), Cursor::Exhausted);
    assert_eq!(content, "Hello world");
    assert_eq!(finish, Some(FinishReason::Stop));
    assert_eq!(usage.unwrap().total_tokens, 6);
    stream.close();
}

#[tokio::test]
async fn test_stream_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response(
            "data: {\"id\":\"c1\",\"choices\":[]}\n\ndata: not-json\n\ndata: [DONE]\n\n",
        ))
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let request = CompletionRequest::new(ModelId::DEEPSEEK_CHAT, vec![Message::user("Hi")]);
    let mut stream = client.create_stream_completion(&request).await.unwrap();

    assert!(stream.advance().await);
    assert!(!stream.advance().await);
    let err = stream.error().unwrap();
    assert!(err.is_decode());
    assert!(err.to_string().contains("not-json"));
}

#[tokio::test]
async fn test_stream_rejected_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(serde_json::json!({
            "error": {"message": "Insufficient Balance", "type": "unknown_error"}
        })))
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let result = client
        .chat("deepseek-chat", vec![Message::user("Hi")])
        .stream()
        .await;

    match result {
        Err(Error::InsufficientBalance(message)) => assert_eq!(message, "Insufficient Balance"),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn test_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "stream": false,
            "max_tokens": 50,
            "messages": [{"role": "user", "content": "Say hello"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "cmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": "deepseek-chat",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        })))
        .mount(&server)
        .await;

    let client = create_test_client(&server);
    let resp = client
        .chat(ModelId::DEEPSEEK_CHAT, vec![Message::user("Say hello")])
        .max_tokens(50)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.text(), Some("Hello!"));
    assert_eq!(resp.usage.prompt_tokens, 3);
    assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn test_status_mapping() {
    let cases = [
        (400, "bad json"),
        (401, "Authentication Fails"),
        (422, "bad temperature"),
        (500, "boom"),
        (503, "overloaded"),
        (418, "teapot"),
    ];

    for (status, message) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_json(serde_json::json!({"error": {"message": message}})),
            )
            .mount(&server)
            .await;

        let err = create_test_client(&server).list_models().await.unwrap_err();
        assert_eq!(err.status(), Some(status));
        assert!(err.to_string().contains(message), "{status}: {err}");
    }
}

#[tokio::test]
async fn test_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/balance"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let err = create_test_client(&server).user_balance().await.unwrap_err();
    match err {
        Error::RateLimited {
            retry_after,
            message,
        } => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)));
            assert_eq!(message, "slow down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_and_get_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "data": [
                {"id": "deepseek-chat", "object": "model", "owned_by": "deepseek"},
                {"id": "deepseek-reasoner", "object": "model", "owned_by": "deepseek"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models/deepseek-chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "deepseek-chat", "object": "model", "owned_by": "deepseek"
        })))
        .mount(&server)
        .await;

    let client = create_test_client(&server);

    let models = client.list_models().await.unwrap();
    let ids: Vec<&str> = models.data.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["deepseek-chat", "deepseek-reasoner"]);

    let model = client.get_model("deepseek-chat").await.unwrap();
    assert_eq!(model.owned_by, "deepseek");
}

#[tokio::test]
async fn test_user_balance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "is_available": true,
            "balance_infos": [{
                "currency": "USD",
                "total_balance": "12.50",
                "granted_balance": "2.50",
                "topped_up_balance": "10.00"
            }]
        })))
        .mount(&server)
        .await;

    let balance = create_test_client(&server).user_balance().await.unwrap();
    assert!(balance.is_available);
    assert_eq!(balance.balance_infos.len(), 1);
    assert_eq!(balance.balance_infos[0].topped_up_balance, "10.00");
}
