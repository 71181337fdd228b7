use anyhow::Result;

use ai_relay::app::serve;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    serve().await
}
