use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    notifyd::cmd::start().await
}
