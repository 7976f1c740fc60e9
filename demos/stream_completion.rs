//! Streaming chat completion.
//!
//! Run with: DEEPSEEK_API_KEY=... cargo run --example stream_completion

use deepseek::{Client, Message, ModelId};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env()?;

    let messages = vec![
        Message::system("You are a helpful assistant"),
        Message::user("Explain Fermat's last theorem"),
    ];

    // The deadline covers the whole stream, not just the first byte
    let mut stream = client
        .chat(ModelId::DEEPSEEK_CHAT, messages)
        .include_usage()
        .timeout(Duration::from_secs(30))
        .stream()
        .await?;

    while stream.advance().await {
        let Some(chunk) = stream.current() else {
            continue;
        };
        if let Some(text) = chunk.text() {
            print!("{text}");
        }
        if let Some(usage) = &chunk.usage {
            println!(
                "\n\n--- {} prompt / {} completion tokens ---",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
    }
    stream.close();

    if let Some(err) = stream.error() {
        anyhow::bail!("stream failed: {err}");
    }
    Ok(())
}
