//! Account balance and available models.
//!
//! Run with: DEEPSEEK_API_KEY=... cargo run --example account

use deepseek::{estimate_tokens, Client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env()?;

    let balance = client.user_balance().await?;
    println!("Available: {}", balance.is_available);
    for info in &balance.balance_infos {
        println!(
            "  {}: {} total ({} granted, {} topped up)",
            info.currency, info.total_balance, info.granted_balance, info.topped_up_balance
        );
    }

    let models = client.list_models().await?;
    println!("\nModels:");
    for model in &models.data {
        println!("  {} (owned by {})", model.id, model.owned_by);
    }

    let prompt = "Hello 世界";
    println!("\n{prompt:?} is about {} tokens", estimate_tokens(prompt));
    Ok(())
}
