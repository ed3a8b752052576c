#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rankboard_backend::run().await
}
