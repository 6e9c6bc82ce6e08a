use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    mentor_cli::tutor_entry().await
}
