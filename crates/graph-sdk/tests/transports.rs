#![cfg(any(feature = "reqwest-client", feature = "ureq-client"))]

use std::io::Write;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use graph_sdk::{
    AccessToken, GraphApp, GraphClient, GraphHttpClient, GraphRequest, GraphResponse, Params,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const NODE_JSON: &str = r#"{"id":"1","name":"Foo"}"#;

fn gzip(body: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(body.as_bytes())
        .expect("gzip write should succeed");
    encoder.finish().expect("gzip finish should succeed")
}

/// Serves one gzip-encoded reply and hands back the request head it saw.
async fn serve_gzip_once(body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("local listener should bind");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let compressed = gzip(body);

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("client should connect");
        let mut head = Vec::new();
        let mut buffer = [0u8; 1024];
        while !head.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).await.expect("request read");
            if read == 0 {
                break;
            }
            head.extend_from_slice(&buffer[..read]);
        }

        let reply_head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            compressed.len()
        );
        socket
            .write_all(reply_head.as_bytes())
            .await
            .expect("reply head write");
        socket.write_all(&compressed).await.expect("reply body write");
        socket.shutdown().await.expect("socket shutdown");
        String::from_utf8_lossy(&head).to_ascii_lowercase()
    });
    (base, server)
}

async fn assert_gzip_reply_is_decoded(http: Arc<dyn GraphHttpClient>) {
    let (base, server) = serve_gzip_once(NODE_JSON).await;
    let request = GraphRequest::new(
        GraphApp::new("1337", "foo_secret"),
        Some(AccessToken::new("foo_token")),
        "GET",
        "/me",
        Params::new(),
        None,
    )
    .expect("request builds");

    let client = GraphClient::new(Arc::clone(&http), false);
    let mut prepared = client.prepare(&request).expect("request prepares");
    prepared.url = format!("{base}{}", request.url());

    let reply = http.send(prepared).await.expect("local server answers");
    let response = GraphResponse::new(request, reply.status, reply.headers, reply.body)
        .expect("decoded body is valid JSON");
    assert_eq!(response.decoded_body(), &json!({"id": "1", "name": "Foo"}));

    let head = server.await.expect("server task should finish");
    let accept_encoding = head
        .lines()
        .find(|line| line.starts_with("accept-encoding:"))
        .unwrap_or_default()
        .to_string();
    assert!(accept_encoding.contains("gzip"), "request head: {head}");
    assert!(!accept_encoding.contains('*'), "request head: {head}");
}

#[cfg(feature = "reqwest-client")]
#[tokio::test(flavor = "current_thread")]
async fn reqwest_transport_decodes_gzip_replies() {
    assert_gzip_reply_is_decoded(Arc::new(graph_sdk::ReqwestHttpClient::new())).await;
}

#[cfg(feature = "ureq-client")]
#[tokio::test(flavor = "current_thread")]
async fn ureq_transport_decodes_gzip_replies() {
    assert_gzip_reply_is_decoded(Arc::new(graph_sdk::UreqHttpClient::new())).await;
}
