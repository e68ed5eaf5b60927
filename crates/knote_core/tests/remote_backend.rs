use knote_core::{
    AssetBackend, AssetStore, ConnectionState, InitError, ReconnectPolicy, RemoteAssetBackend,
    RemoteStoreConfig, Sleeper, StoreError, TokenSource,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Object server answering a fixed sequence of replies, one per connection.
struct ScriptedServer {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

struct Reply {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: Vec<u8>,
}

impl Reply {
    fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn with_body(status: u16, content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type)],
            body: body.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl ScriptedServer {
    fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for reply in script {
                let (mut stream, _) = listener.accept().unwrap();
                let request = read_request(&mut stream);
                recorded.lock().unwrap().push(request);
                write_reply(&mut stream, &reply);
            }
        });

        Self { port, requests }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| format!("{} {}", request.method, request.path))
            .collect()
    }
}

fn read_request(stream: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before request head");
        buf.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(key, _)| key == "content-length")
        .map(|(_, value)| value.parse::<usize>().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let read = stream.read(&mut chunk).unwrap();
        assert!(read > 0, "connection closed before request body");
        buf.extend_from_slice(&chunk[..read]);
    }

    RecordedRequest {
        method,
        path,
        headers,
        body: buf[header_end..header_end + content_length].to_vec(),
    }
}

fn write_reply(stream: &mut TcpStream, reply: &Reply) {
    let reason = match reply.status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Status",
    };
    let mut head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (key, value) in &reply.headers {
        head.push_str(&format!("{key}: {value}\r\n"));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).unwrap();
    stream.write_all(&reply.body).unwrap();
    stream.flush().unwrap();
}

fn config(port: u16) -> RemoteStoreConfig {
    RemoteStoreConfig {
        host: "127.0.0.1".to_string(),
        port,
        access_key: "minio".to_string(),
        secret_key: "minio123".to_string(),
        ..RemoteStoreConfig::default()
    }
}

struct FixedToken;

impl TokenSource for FixedToken {
    fn next_token(&self) -> String {
        "cat-token".to_string()
    }
}

#[derive(Clone, Default)]
struct CountingSleeper {
    calls: Arc<AtomicUsize>,
}

impl Sleeper for CountingSleeper {
    fn sleep(&self, _duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn existing_bucket_connects_with_a_single_head() {
    let server = ScriptedServer::start(vec![Reply::status(200)]);
    let mut backend = RemoteAssetBackend::new(config(server.port));

    backend.connect().unwrap();

    assert_eq!(server.request_lines(), vec!["HEAD /image-storage"]);
    let head = &server.requests()[0];
    assert_eq!(head.header("host"), Some(format!("127.0.0.1:{}", server.port).as_str()));
    assert!(head.header("x-amz-date").is_some());
    assert!(head
        .header("authorization")
        .unwrap()
        .starts_with("AWS4-HMAC-SHA256 Credential=minio/"));
}

#[test]
fn missing_bucket_is_created_and_objects_round_trip() {
    let server = ScriptedServer::start(vec![
        Reply::status(404),
        Reply::with_body(
            409,
            "application/xml",
            b"<Error><Code>BucketAlreadyOwnedByYou</Code></Error>",
        ),
        Reply::status(200),
        Reply::with_body(200, "image/jpeg", b"\xFF\xD8jpeg"),
    ]);
    let mut store = AssetStore::with_backend(
        RemoteAssetBackend::new(config(server.port)),
        ReconnectPolicy::disabled(),
    )
    .with_token_source(FixedToken);

    store.connect().unwrap();
    assert_eq!(store.state(), ConnectionState::Ready);
    assert_eq!(store.connect_attempts(), 1);

    let asset = store.store(b"\xFF\xD8jpeg", "cat.jpg", "image/jpeg").unwrap();
    assert_eq!(asset.identifier, "cat-token.jpg");
    assert_eq!(store.public_path_for(&asset.identifier), "/img/cat-token.jpg");

    let fetched = store.fetch(&asset.identifier).unwrap();
    assert_eq!(fetched.bytes, b"\xFF\xD8jpeg");
    assert_eq!(fetched.content_type, "image/jpeg");

    assert_eq!(
        server.request_lines(),
        vec![
            "HEAD /image-storage",
            "PUT /image-storage",
            "PUT /image-storage/cat-token.jpg",
            "GET /image-storage/cat-token.jpg",
        ]
    );
    let requests = server.requests();
    assert_eq!(requests[1].header("content-length"), Some("0"));
    assert_eq!(requests[2].header("content-type"), Some("image/jpeg"));
    assert_eq!(requests[2].header("content-length"), Some("6"));
    assert_eq!(requests[2].body, b"\xFF\xD8jpeg");
}

#[test]
fn rejected_bucket_create_is_retried_while_reconnect_enabled() {
    let server = ScriptedServer::start(vec![
        Reply::status(404),
        Reply::status(403),
        Reply::status(200),
    ]);
    let sleeper = CountingSleeper::default();
    let mut store = AssetStore::with_backend(
        RemoteAssetBackend::new(config(server.port)),
        ReconnectPolicy::default(),
    )
    .with_sleeper(sleeper.clone());

    store.connect().unwrap();

    assert_eq!(store.state(), ConnectionState::Ready);
    assert_eq!(store.connect_attempts(), 2);
    assert_eq!(sleeper.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        server.request_lines(),
        vec!["HEAD /image-storage", "PUT /image-storage", "HEAD /image-storage"]
    );
}

#[test]
fn rejected_bucket_create_fails_when_reconnect_disabled() {
    let server = ScriptedServer::start(vec![Reply::status(404), Reply::status(403)]);
    let mut store = AssetStore::with_backend(
        RemoteAssetBackend::new(config(server.port)),
        ReconnectPolicy::disabled(),
    );

    let err = store.connect().unwrap_err();

    assert_eq!(store.state(), ConnectionState::Failed);
    match err {
        InitError::Backend {
            attempts, source, ..
        } => {
            assert_eq!(attempts, 1);
            assert!(matches!(source, StoreError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_object_is_not_found() {
    let server = ScriptedServer::start(vec![Reply::status(200), Reply::status(404)]);
    let mut backend = RemoteAssetBackend::new(config(server.port));
    backend.connect().unwrap();

    let err = backend.get("nope.png").unwrap_err();

    assert!(matches!(err, StoreError::NotFound(id) if id == "nope.png"));
    assert_eq!(
        server.request_lines(),
        vec!["HEAD /image-storage", "GET /image-storage/nope.png"]
    );
}

#[test]
fn rejected_object_put_is_an_io_failure() {
    let server = ScriptedServer::start(vec![Reply::status(200), Reply::status(403)]);
    let mut backend = RemoteAssetBackend::new(config(server.port));
    backend.connect().unwrap();

    let err = backend.put("a.png", b"png", "image/png").unwrap_err();

    assert!(matches!(err, StoreError::IoFailure(_)));
}
