#[tokio::main]
async fn main() -> anyhow::Result<()> {
    easyspeak_gateway_lib::run().await
}
