#[tokio::main]
async fn main() -> anyhow::Result<()> {
    batch_preview::run_server().await
}
