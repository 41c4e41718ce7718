// One arena server per integration-test binary, plus helpers that talk to it.
use std::{
    sync::{Mutex, MutexGuard, OnceLock, PoisonError, mpsc},
    time::Duration,
};

// Base URL (`http://host:port`) once the server is accepting connections.
static SERVER_URL: OnceLock<String> = OnceLock::new();

// Start the shared server on first use and return its base URL.
pub fn ensure_server() -> &'static str {
    SERVER_URL.get_or_init(|| {
        let (addr_tx, addr_rx) = mpsc::channel();
        // Its own thread and runtime, so it outlives every `#[tokio::test]` runtime.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                addr_tx.send(addr).expect("publish test server address");
                arena_server::run(listener).await.expect("server failed");
            });
        });

        let addr = addr_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("server should publish its address");
        wait_until_accepting(addr);
        format!("http://{addr}")
    })
}

fn wait_until_accepting(addr: std::net::SocketAddr) {
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

// Serializes tests that share the one server, since rooms pair players across tests.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    // A failed test must not poison the rest of the binary.
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

// WebSocket endpoint of the shared server.
pub fn ws_url(query: &str) -> String {
    let base = ensure_server()
        .strip_prefix("http://")
        .expect("base url should use http://");
    format!("ws://{base}/ws{query}")
}

// Poll /health until the predicate holds and return the matching report.
pub async fn wait_for_health(ready: impl Fn(&serde_json::Value) -> bool) -> serde_json::Value {
    let client = reqwest::Client::new();
    let url = format!("{}/health", ensure_server());
    for _ in 0..250 {
        let health: serde_json::Value = client
            .get(&url)
            .send()
            .await
            .expect("health request should succeed")
            .json()
            .await
            .expect("health body should be json");
        if ready(&health) {
            return health;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server did not reach the expected state in time");
}

// Every room gone, so the next test starts from a clean registry.
pub async fn wait_for_idle() -> serde_json::Value {
    wait_for_health(|h| h["activeRooms"] == 0 && h["connectedPlayers"] == 0).await
}
