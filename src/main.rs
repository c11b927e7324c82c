#[tokio::main]
async fn main() -> anyhow::Result<()> {
    apikit::server::run().await
}
