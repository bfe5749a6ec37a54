#![allow(dead_code)]

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use mwt::{
    ActionValue, Error, EventBatch, ExplorerState, FileOverflowStore, Interaction, Notification,
    PackageListener, ResolvedSettings, Result, ServerCredentials, SettingsResolver, StoredBatch,
    Transport, UploaderConfig,
};
use tempfile::TempDir;
use url::Url;

/// The only application token the mock join server accepts.
pub const TEST_APP_TOKEN: &str = "test-app-token";

pub const UNIQUE_KEY: &str = "test interaction";

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// In-process stand-in for the join service.
///
/// Counts every request that reaches it. Accepts batches sent with [`TEST_APP_TOKEN`] or with a
/// `file://` connection string, and rejects everything else as unauthorized.
#[derive(Clone, Default)]
pub struct MockJoinServer {
    state: Arc<Mutex<JoinServerState>>,
}

#[derive(Default)]
struct JoinServerState {
    request_count: usize,
    batches: Vec<EventBatch>,
}

impl MockJoinServer {
    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().request_count
    }

    pub fn batches(&self) -> Vec<EventBatch> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn fragment_count(&self) -> usize {
        self.batches().iter().map(EventBatch::len).sum()
    }
}

impl Transport for MockJoinServer {
    fn send(&self, settings: &ResolvedSettings, batch: &EventBatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.request_count += 1;

        let accepted = match &settings.credentials {
            ServerCredentials::Token(token) => token == TEST_APP_TOKEN,
            ServerCredentials::ConnectionString(connection) => connection.starts_with("file://"),
        };
        if !accepted {
            return Err(Error::Unauthorized);
        }

        state.batches.push(batch.clone());
        Ok(())
    }
}

/// Resolves any token, the way a settings service does for well-formed tokens that the join
/// service may still reject.
pub struct StaticSettingsResolver {
    pub store_connection: String,
}

impl SettingsResolver for StaticSettingsResolver {
    fn resolve(&self, token: &str) -> Result<ResolvedSettings> {
        Ok(ResolvedSettings {
            credentials: ServerCredentials::Token(token.to_owned()),
            store_connection: self.store_connection.clone(),
            experimental_unit_duration: Duration::from_secs(15),
        })
    }
}

/// Collects every notification.
#[derive(Clone, Default)]
pub struct RecordingListener {
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl PackageListener for RecordingListener {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

impl RecordingListener {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn sent_batch_count(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| matches!(n, Notification::PackageSent { .. }))
            .count()
    }

    pub fn sent_record_count(&self) -> usize {
        self.notifications()
            .iter()
            .filter_map(|n| match n {
                Notification::PackageSent { batch } => Some(batch.len()),
                _ => None,
            })
            .sum()
    }

    pub fn failures(&self) -> Vec<Error> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::PackageSendFailed { error, .. } => Some(error),
                _ => None,
            })
            .collect()
    }

    pub fn notified_record_count(&self) -> usize {
        self.notifications().iter().map(|n| n.batch().len()).sum()
    }
}

/// Overflow store location in a temporary directory.
pub struct OverflowDir {
    dir: TempDir,
}

impl OverflowDir {
    pub fn new() -> OverflowDir {
        OverflowDir {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn connection(&self) -> String {
        Url::from_directory_path(self.dir.path().join("overflow"))
            .unwrap()
            .to_string()
    }

    pub fn stored(&self) -> Vec<StoredBatch> {
        FileOverflowStore::read_batches(&self.connection()).unwrap()
    }

    pub fn stored_fragment_count(&self) -> usize {
        self.stored().iter().map(|batch| batch.fragments.len()).sum()
    }
}

/// Everything a scenario needs: mock server, listener and overflow directory.
pub struct Harness {
    pub server: MockJoinServer,
    pub listener: RecordingListener,
    pub overflow: OverflowDir,
}

impl Harness {
    pub fn new() -> Harness {
        init_logger();
        Harness {
            server: MockJoinServer::default(),
            listener: RecordingListener::default(),
            overflow: OverflowDir::new(),
        }
    }

    /// Configuration wired to the mock join server.
    pub fn config(&self) -> UploaderConfig {
        let mut config = UploaderConfig::new("http://join.test");
        config.transport(self.server.clone());
        self.wire(&mut config);
        config
    }

    /// Configuration using the real HTTP transport against `address`.
    pub fn http_config(&self, address: impl Into<String>) -> UploaderConfig {
        let mut config = UploaderConfig::new(address);
        self.wire(&mut config);
        config
    }

    fn wire(&self, config: &mut UploaderConfig) {
        config
            .settings_resolver(StaticSettingsResolver {
                store_connection: self.overflow.connection(),
            })
            .listener(self.listener.clone());
    }
}

pub fn interaction(value: impl Into<ActionValue>) -> Interaction {
    Interaction {
        key: UNIQUE_KEY.to_owned(),
        value: value.into(),
        context: serde_json::json!({"a": 5, "b": "context"}),
        explorer_state: ExplorerState::Probabilities {
            probabilities: vec![0.5, 0.1, 0.1, 0.1, 0.1],
        },
    }
}

/// A request received by [`HttpJoinServer`].
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Minimal HTTP/1.1 server answering every request with a fixed status and body.
pub struct HttpJoinServer {
    pub address: String,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl HttpJoinServer {
    pub fn start(status_line: &'static str) -> HttpJoinServer {
        HttpJoinServer::start_with_body(status_line, "")
    }

    pub fn start_with_body(status_line: &'static str, body: &'static str) -> HttpJoinServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        {
            let requests = Arc::clone(&requests);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { return };
                    let requests = Arc::clone(&requests);
                    std::thread::spawn(move || {
                        let _ = serve_connection(stream, status_line, body, &requests);
                    });
                }
            });
        }

        HttpJoinServer { address, requests }
    }

    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Accepts connections and reads requests, but never answers.
pub struct SilentServer {
    pub address: String,
    connections: Arc<AtomicUsize>,
}

impl SilentServer {
    pub fn start() -> SilentServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));

        {
            let connections = Arc::clone(&connections);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { return };
                    connections.fetch_add(1, Ordering::SeqCst);
                    std::thread::spawn(move || {
                        // Hold the connection open until the client gives up.
                        let mut buf = [0u8; 1024];
                        while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
                    });
                }
            });
        }

        SilentServer {
            address,
            connections,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve_connection(
    stream: TcpStream,
    status_line: &str,
    response_body: &str,
    requests: &Mutex<Vec<ReceivedRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line)? == 0 {
            return Ok(());
        }
        let mut parts = request_line.split_whitespace();
        let method = parts.next().unwrap_or_default().to_owned();
        let path = parts.next().unwrap_or_default().to_owned();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_owned(), value.trim().to_owned()));
            }
        }

        let content_length = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body)?;

        requests.lock().unwrap().push(ReceivedRequest {
            method,
            path,
            headers,
            body,
        });

        write!(
            writer,
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{response_body}",
            response_body.len()
        )?;
        writer.flush()?;
    }
}
