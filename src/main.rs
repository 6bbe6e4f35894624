#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pitemp_lib::run().await
}
