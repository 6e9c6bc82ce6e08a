use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mentor_cli::embed_entry().await
}
