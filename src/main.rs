#[tokio::main]
async fn main() -> std::io::Result<()> {
    rhythm_bridge::run_with_config().await
}
