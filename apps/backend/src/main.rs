#[tokio::main]
async fn main() -> anyhow::Result<()> {
    card_reviewer_backend::run().await
}
