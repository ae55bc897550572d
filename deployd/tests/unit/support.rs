//! Shared test fixtures

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use deployd::app::options::ServerOptions;
use deployd::authn::signature::sign;
use deployd::deploy::builder::{BuildOutcome, Builder};
use deployd::deploy::slot::{self, JobSlot};
use deployd::filesys::file::File;
use deployd::models::deployment::{DeploymentState, DeploymentStatus};
use deployd::server::serve::router;
use deployd::server::state::ServerState;
use deployd::status::store::{StatusHandle, StatusStore};
use deployd::storage::status_file::load_status;
use deployd::workers::deployer;

pub const SECRET: &str = "It's a Secret to Everybody";

const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn secret() -> SecretString {
    SecretString::from(SECRET.to_string())
}

fn never() -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(std::future::pending::<()>())
}

/// Builder that blocks until released and then reports a fixed outcome
pub struct GatedBuilder {
    release: Notify,
    outcome: Mutex<BuildOutcome>,
}

impl GatedBuilder {
    pub fn new(outcome: BuildOutcome) -> Self {
        Self {
            release: Notify::new(),
            outcome: Mutex::new(outcome),
        }
    }

    /// Outcome reported by subsequent builds
    pub fn set_outcome(&self, outcome: BuildOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    /// Let the current (or next) build finish
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Builder for GatedBuilder {
    async fn build(&self) -> BuildOutcome {
        self.release.notified().await;
        self.outcome.lock().unwrap().clone()
    }
}

/// A gateway wired to a real status store and deployer worker
pub struct Harness {
    pub router: Router,
    pub status: StatusHandle,
    pub slot: JobSlot,
    pub builder: Arc<GatedBuilder>,
    pub status_path: PathBuf,
    _dir: Option<TempDir>,
    _tasks: Vec<JoinHandle<()>>,
}

impl Harness {
    pub async fn start(branch: &str, outcome: BuildOutcome) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let status_path = dir.path().join("status");
        let mut harness = Self::start_with_status_file(&status_path, branch, outcome).await;
        harness._dir = Some(dir);
        harness
    }

    /// Start against an existing status file, as a restarted daemon would
    pub async fn start_with_status_file(status_path: &Path, branch: &str, outcome: BuildOutcome) -> Self {
        let file = File::new(status_path);
        let initial = load_status(&file).await.unwrap().unwrap_or_default();
        let (status, store_task) = StatusStore::spawn(initial, file, never());

        let builder = Arc::new(GatedBuilder::new(outcome));
        let (slot, mut triggers) = slot::channel();
        let worker_task = {
            let builder = builder.clone();
            let status = status.clone();
            tokio::spawn(async move {
                deployer::run(builder.as_ref(), &status, &mut triggers, never()).await;
            })
        };

        let state = ServerState::new(secret(), branch, status.clone(), slot.clone());
        let router = router(&ServerOptions::default(), Arc::new(state));

        Self {
            router,
            status,
            slot,
            builder,
            status_path: status_path.to_path_buf(),
            _dir: None,
            _tasks: vec![store_task, worker_task],
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, String) {
        send(&self.router, request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.send(get_request(uri)).await
    }

    pub async fn push(&self, body: &str) -> (StatusCode, String) {
        self.send(signed_push(body)).await
    }

    pub async fn wait_for_state(&self, state: DeploymentState) -> DeploymentStatus {
        let status = self.status.clone();
        tokio::time::timeout(WAIT_LIMIT, async move {
            loop {
                let current = status.get().await.unwrap();
                if current.state == state {
                    return current;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("deployment never reached {:?}", state))
    }

    pub async fn wait_for_free_slot(&self) {
        let slot = self.slot.clone();
        tokio::time::timeout(WAIT_LIMIT, async move {
            while !slot.is_free() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("slot was never released");
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn push_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/");
    if let Some(signature) = signature {
        builder = builder.header("X-Hub-Signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn signed_push(body: &str) -> Request<Body> {
    let signature = sign(body.as_bytes(), &secret());
    push_request(body, Some(&signature))
}

pub fn push_event(git_ref: &str) -> String {
    format!(r#"{{"ref":"{}","before":"0000","after":"1111","commits":[]}}"#, git_ref)
}

/// Minimal HTTP/1.1 exchange against a running daemon
pub async fn raw_http(address: &str, request: &str) -> String {
    let mut stream = TcpStream::connect(address).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Reserve a local port for a daemon under test
pub fn free_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().to_string()
}
