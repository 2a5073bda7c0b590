use std::convert::Infallible;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};

use handscript::session::{StreamEvent, spawn_stream};
use handscript::{Error, ErrorKind, ModelBackend, OllamaClient};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn ndjson(lines: Vec<Value>) -> Response {
    let parts: Vec<Result<String, Infallible>> = lines
        .into_iter()
        .map(|line| Ok(format!("{}\n", line)))
        .collect();
    Response::builder()
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(stream::iter(parts)))
        .unwrap()
}

fn chunk(content: &str) -> Value {
    json!({"model": "tiny", "message": {"role": "assistant", "content": content}, "done": false})
}

fn done() -> Value {
    json!({"model": "tiny", "message": {"role": "assistant", "content": ""}, "done": true})
}

#[tokio::test]
async fn lists_models_in_server_order() {
    let app = Router::new().route(
        "/api/tags",
        get(|| async {
            Json(json!({"models": [
                {"name": "qwen2.5:7b", "model": "qwen2.5:7b", "size": 1},
                {"name": "llama3:8b", "model": "llama3:8b", "size": 2}
            ]}))
        }),
    );
    let client = OllamaClient::new(serve(app).await);
    let models = client.list_models().await.unwrap();
    assert_eq!(models, vec!["qwen2.5:7b", "llama3:8b"]);
}

#[tokio::test]
async fn empty_model_list_is_ok() {
    let app = Router::new().route("/api/tags", get(|| async { Json(json!({"models": []})) }));
    let client = OllamaClient::new(serve(app).await);
    assert!(client.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_host_is_a_service_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OllamaClient::with_timeout(format!("http://{}", addr), Duration::from_secs(2));
    let err = client.list_models().await.unwrap_err();
    assert!(matches!(err, Error::ServiceUnavailable { .. }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::Service);
}

#[tokio::test]
async fn streams_chunks_in_order() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], json!(true));
            assert_eq!(body["model"], json!("tiny"));
            let messages = body["messages"].as_array().cloned().unwrap_or_default();
            assert_eq!(messages.last().unwrap()["content"], json!("say hello"));
            ndjson(vec![chunk("He"), chunk("llo"), chunk(" world"), done()])
        }),
    );
    let client = OllamaClient::new(serve(app).await);
    let stream = client.stream_chat("tiny", "say hello").await.unwrap();
    let chunks: Vec<String> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(chunks.concat(), "Hello world");
}

#[tokio::test]
async fn system_prompt_is_sent_first() {
    let app = Router::new().route(
        "/api/chat",
        post(|Json(body): Json<Value>| async move {
            let messages = body["messages"].as_array().cloned().unwrap_or_default();
            let roles: Vec<String> = messages
                .iter()
                .map(|message| message["role"].as_str().unwrap_or_default().to_string())
                .collect();
            ndjson(vec![chunk(&roles.join(",")), done()])
        }),
    );
    let client = OllamaClient::new(serve(app).await).with_system_prompt("be brief");
    let stream = client.stream_chat("tiny", "hi").await.unwrap();
    let chunks: Vec<String> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(chunks.concat(), "system,user");
}

#[tokio::test]
async fn unknown_model_is_reported() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "model \"ghost\" not found, try pulling it first"})),
            )
                .into_response()
        }),
    );
    let client = OllamaClient::new(serve(app).await);
    let err = client.stream_chat("ghost", "hi").await.err().unwrap();
    assert!(matches!(err, Error::ModelNotFound(ref name) if name == "ghost"));
}

#[tokio::test]
async fn server_error_mid_stream_interrupts() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async { ndjson(vec![chunk("partial"), json!({"error": "out of memory"})]) }),
    );
    let client = OllamaClient::new(serve(app).await);
    let items: Vec<_> = client
        .stream_chat("tiny", "hi")
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_deref().unwrap(), "partial");
    assert!(matches!(&items[1], Err(Error::StreamInterrupted(msg)) if msg == "out of memory"));
}

#[tokio::test]
async fn cancelling_stops_delivery() {
    let app = Router::new().route(
        "/api/chat",
        post(|| async {
            let ticks = stream::unfold(0u32, |n| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let line = format!("{}\n", chunk(&format!("{n} ")));
                Some((Ok::<_, Infallible>(line), n + 1))
            });
            Response::builder()
                .header("content-type", "application/x-ndjson")
                .body(Body::from_stream(ticks))
                .unwrap()
        }),
    );
    let client = OllamaClient::new(serve(app).await);
    let mut handle = spawn_stream(client, "tiny", "count forever");

    let first = tokio::time::timeout(Duration::from_secs(5), handle.events.recv())
        .await
        .unwrap();
    assert!(matches!(first, Some(StreamEvent::Chunk(_))));
    handle.cancel();

    let mut after = 0;
    loop {
        match tokio::time::timeout(Duration::from_secs(2), handle.events.recv()).await {
            Ok(Some(_)) => after += 1,
            Ok(None) => break,
            Err(_) => panic!("worker kept the channel open after cancel"),
        }
    }
    assert!(after <= 1, "received {after} events after cancel");
}
