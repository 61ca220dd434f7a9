use serde_json::json;
use wiremock::matchers::{any, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use providers::{validate_key, DispatchError, Dispatcher, ImageData, RequestOptions};
use shared::agent_api::ChatMessage;
use shared::ErrorKind;

fn options_for(server: &MockServer) -> RequestOptions {
    RequestOptions {
        base_url: Some(server.uri()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_unsupported_provider_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = Dispatcher::new()
        .send_request("watson", "hello", "key", &options_for(&server), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::UnsupportedProvider(_)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedProvider);
}

#[tokio::test]
async fn test_openai_reply_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "wiggle(2,30)" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 4 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = Dispatcher::new()
        .send_request_detailed("openai", "shake it", "sk-test", &options_for(&server), None)
        .await
        .unwrap();

    assert_eq!(reply.text, "wiggle(2,30)");
    assert_eq!(reply.usage.unwrap().completion_tokens, 4);
}

#[tokio::test]
async fn test_gemini_sends_key_as_header_and_maps_roles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "hi" }] },
                { "role": "model", "parts": [{ "text": "hello" }] },
                { "role": "user", "parts": [{ "text": "again" }] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Sure." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let opts = options_for(&server)
        .with_history(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
    let text = Dispatcher::new()
        .send_request("gemini", "again", "g-key", &opts, None)
        .await
        .unwrap();

    assert_eq!(text, "Sure.");
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_network_error_does_not_leak_key() {
    // Nothing listens on port 1.
    let opts = RequestOptions {
        base_url: Some("http://127.0.0.1:1".into()),
        ..Default::default()
    };
    let err = Dispatcher::new()
        .send_request("gemini", "hi", "SECRET-GEMINI-KEY", &opts, None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(!err.to_string().contains("SECRET-GEMINI-KEY"));
    assert!(!format!("{:?}", err).contains("SECRET-GEMINI-KEY"));

    let err = validate_key("gemini", "SECRET-GEMINI-KEY", Some("http://127.0.0.1:1"))
        .await
        .unwrap_err();
    assert!(!err.to_string().contains("SECRET-GEMINI-KEY"));
}

#[tokio::test]
async fn test_claude_uses_messages_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ant-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({ "system": "Be brief." })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Done." }],
            "usage": { "input_tokens": 3, "output_tokens": 1 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOptions {
        system_prompt: Some("Be brief.".into()),
        ..options_for(&server)
    };
    let text = Dispatcher::new()
        .send_request("anthropic", "go", "ant-key", &opts, None)
        .await
        .unwrap();

    assert_eq!(text, "Done.");
}

#[tokio::test]
async fn test_ollama_needs_no_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "local reply" },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = Dispatcher::new()
        .send_request("local", "hi", "", &options_for(&server), None)
        .await
        .unwrap();

    assert_eq!(text, "local reply");
}

#[tokio::test]
async fn test_ollama_forwards_image() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "what is this", "images": ["iVBO"] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": { "role": "assistant", "content": "a comp" },
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let image = ImageData::new("image/png", vec![0x89, 0x50, 0x4e]);
    let text = Dispatcher::new()
        .send_request("ollama", "what is this", "", &options_for(&server), Some(&image))
        .await
        .unwrap();

    assert_eq!(text, "a comp");
}

#[tokio::test]
async fn test_text_only_providers_reject_images() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let image = ImageData::new("image/png", vec![0x89, 0x50, 0x4e]);
    for provider in ["cohere", "huggingface"] {
        let err = Dispatcher::new()
            .send_request(provider, "hi", "key", &options_for(&server), Some(&image))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Unsupported { .. }));
    }
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer limited"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer wrong"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new();
    let opts = options_for(&server);

    let limited = dispatcher
        .send_request("groq", "hi", "limited", &opts, None)
        .await
        .unwrap_err();
    assert_eq!(limited.kind(), ErrorKind::RateLimited);

    let wrong = dispatcher
        .send_request("together", "hi", "wrong", &opts, None)
        .await
        .unwrap_err();
    assert_eq!(wrong.kind(), ErrorKind::Unauthorized);
    assert!(wrong.to_string().contains("bad key"));

    let broken = dispatcher
        .send_request("openai", "hi", "broken", &opts, None)
        .await
        .unwrap_err();
    assert_eq!(broken.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_empty_reply_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "  " })))
        .mount(&server)
        .await;

    let err = Dispatcher::new()
        .send_request("cohere", "hi", "co-key", &options_for(&server), None)
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::EmptyReply(_)));
}

#[tokio::test]
async fn test_huggingface_list_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/tiny-model"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "generated_text": " ok " }])),
        )
        .mount(&server)
        .await;

    let opts = RequestOptions {
        model: Some("tiny-model".into()),
        ..options_for(&server)
    };
    let text = Dispatcher::new()
        .send_request("hf", "hi", "hf-key", &opts, None)
        .await
        .unwrap();

    assert_eq!(text, "ok");
}

#[tokio::test]
async fn test_validate_key_accepts_and_rejects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer bad"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let uri = server.uri();
    assert!(validate_key("openai", "good", Some(&uri)).await.unwrap());
    assert!(!validate_key("openai", "bad", Some(&uri)).await.unwrap());
    assert!(matches!(
        validate_key("openai", "", Some(&uri)).await,
        Err(DispatchError::MissingApiKey(_))
    ));
}
