//! Integration tests for the aion library.
//! These tests run the HTTP transport against a scripted server on localhost.

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use futures::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;
    use url::Url;

    use aion::chat::{ChatConfig, ChatSession};
    use aion::stream::{CONNECTION_FAILED_MESSAGE, STREAM_INTERRUPTED_MARKER};
    use aion::{
        ChatRequest, Error, HttpTransport, Message, ProviderSelector, SessionState, Transport,
    };

    enum Reply {
        /// A 200 response sent with chunked transfer encoding.
        Chunked(&'static [&'static [u8]]),
        /// Like `Chunked`, but the connection is closed before the last chunk.
        Truncated(&'static [&'static [u8]]),
        /// A complete response with the given status line and body.
        Full(&'static str, &'static str, &'static str),
    }

    /// Serves one reply per accepted connection and returns the raw requests.
    async fn serve(replies: Vec<Reply>) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let (mut socket, _) = listener.accept().await.unwrap();
                requests.push(read_request(&mut socket).await);
                write_reply(&mut socket, reply).await;
            }
            requests
        });
        (addr, handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    async fn write_reply(socket: &mut TcpStream, reply: Reply) {
        match reply {
            Reply::Chunked(chunks) => {
                write_chunks(socket, chunks).await;
                socket.write_all(b"0\r\n\r\n").await.unwrap();
            }
            Reply::Truncated(chunks) => {
                write_chunks(socket, chunks).await;
            }
            Reply::Full(status, content_type, body) => {
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                socket.write_all(head.as_bytes()).await.unwrap();
                socket.write_all(body.as_bytes()).await.unwrap();
            }
        }
        socket.flush().await.unwrap();
        let _ = socket.shutdown().await;
    }

    async fn write_chunks(socket: &mut TcpStream, chunks: &[&[u8]]) {
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        for chunk in chunks {
            socket
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await
                .unwrap();
            socket.write_all(chunk).await.unwrap();
            socket.write_all(b"\r\n").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn body_of(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    fn session_for(addr: SocketAddr) -> ChatSession {
        let config = ChatConfig::new()
            .with_api_url(format!("http://{addr}"))
            .with_connect_timeout(Duration::from_secs(2));
        ChatSession::new(&config).unwrap()
    }

    #[tokio::test]
    async fn transport_streams_chunked_body() {
        let (addr, server) = serve(vec![Reply::Chunked(&[b"Hel", b"lo, ", b"world"])]).await;
        let transport = HttpTransport::new().unwrap();
        let selector = ProviderSelector::new(Some(&format!("http://{addr}"))).unwrap();
        let params = selector.resolve_request_params();
        let request = ChatRequest::new(vec![Message::user("hi")], &params);

        let mut body = transport.open(&params.endpoint_base, &request).await.unwrap();
        let mut text = Vec::new();
        while let Some(chunk) = body.next().await {
            text.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(text, b"Hello, world");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/v1/chat/message HTTP/1.1\r\n"));
        let payload = body_of(&requests[0]);
        assert_eq!(
            payload,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": "gpt-4o",
                "provider": "openai",
            })
        );
    }

    #[tokio::test]
    async fn transport_reports_error_status() {
        let (addr, _server) = serve(vec![Reply::Full(
            "500 Internal Server Error",
            "text/plain",
            "model unavailable",
        )])
        .await;
        let transport = HttpTransport::new().unwrap();
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let request = ChatRequest {
            messages: vec![Message::user("hi")],
            model: "llama3".to_string(),
            provider: "ollama".to_string(),
        };

        let err = match transport.open(&base, &request).await {
            Ok(_) => panic!("expected a connection failure"),
            Err(err) => err,
        };
        assert!(err.is_connection_failed());
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("model unavailable"));
    }

    #[tokio::test]
    async fn health_check() {
        let (addr, server) = serve(vec![Reply::Full(
            "200 OK",
            "application/json",
            r#"{"status":"ok","service":"AION API"}"#,
        )])
        .await;
        let session = session_for(addr);

        let status = session.health().await.unwrap();
        assert!(status.is_ok());
        assert_eq!(status.service.as_deref(), Some("AION API"));
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /health HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn malformed_health_reply_is_a_serialization_error() {
        let (addr, _server) = serve(vec![Reply::Full(
            "200 OK",
            "application/json",
            "<html>not json</html>",
        )])
        .await;
        let session = session_for(addr);

        let err = session.health().await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }), "got {err:?}");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn session_streams_reply_over_http() {
        let (addr, server) = serve(vec![
            Reply::Chunked(&[b"caf\xc3", b"\xa9 ", b"**ok**"]),
            Reply::Chunked(&[b"second"]),
        ])
        .await;
        let mut session = session_for(addr);

        let report = session.submit("order a coffee").await.unwrap().unwrap();
        assert_eq!(report.state, SessionState::Completed);
        assert_eq!(session.messages()[1], Message::assistant("café **ok**"));

        session.set_provider("local-model").unwrap();
        session.submit("and another").await.unwrap();
        assert_eq!(session.message_count(), 4);

        let requests = server.await.unwrap();
        let second = body_of(&requests[1]);
        assert_eq!(second["provider"], "ollama");
        assert_eq!(second["model"], "llama3");
        assert_eq!(second["messages"].as_array().unwrap().len(), 3);
        assert_eq!(second["messages"][1]["role"], "assistant");
        assert_eq!(second["messages"][1]["content"], "café **ok**");
    }

    #[tokio::test]
    async fn session_records_error_status() {
        let (addr, _server) = serve(vec![Reply::Full(
            "502 Bad Gateway",
            "text/plain",
            "",
        )])
        .await;
        let mut session = session_for(addr);

        let report = session.submit("hello").await.unwrap().unwrap();
        assert_eq!(report.state, SessionState::Failed);
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages()[1].content, CONNECTION_FAILED_MESSAGE);
        assert!(!session.is_streaming());
        assert_eq!(session.stats().failed, 1);
    }

    #[tokio::test]
    async fn session_keeps_partial_reply_when_connection_drops() {
        let (addr, _server) = serve(vec![Reply::Truncated(&[b"ab", b"cd"])]).await;
        let mut session = session_for(addr);

        let report = session.submit("hello").await.unwrap().unwrap();
        assert_eq!(report.state, SessionState::Failed);
        assert!(report.failure.unwrap().is_stream_interrupted());
        let content = &session.messages()[1].content;
        assert!(content.starts_with("abcd"), "got {content:?}");
        assert!(content.ends_with(STREAM_INTERRUPTED_MARKER));
        assert!(!session.is_streaming());
    }
}
