use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    slotpilot_cli::cli::app::run().await
}
