#[tokio::main]
async fn main() {
    if let Err(e) = arena_server::run_with_config().await {
        eprintln!("arena server failed: {e}");
        std::process::exit(1);
    }
}
