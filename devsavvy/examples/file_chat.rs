//! Attach files from the command line and ask a question about them.
//!
//! cargo run -p devsavvy --example file_chat -- "What changed?" CHANGELOG.md src/

use devsavvy::prelude::*;
use std::io::Write;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("devsavvy_core=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let question = args
        .next()
        .unwrap_or_else(|| "Summarize the attached files".to_string());

    let mut manager = ChatManager::new(Config::load_or_default());
    for path in args {
        if Path::new(&path).is_dir() {
            manager.attach_directory(&path).await?;
        } else {
            manager.attach_path(&path).await?;
        }
    }
    println!("Attached {} files\n", manager.attachments().len());

    let reply = manager
        .query_stream(&question, |chunk| {
            print!("{}", chunk);
            let _ = std::io::stdout().flush();
        })
        .await?;
    println!("\n");

    for citation in &reply.citations {
        println!(
            "[Source {}] {}",
            citation.index,
            citation.name.as_deref().unwrap_or("unknown")
        );
    }

    Ok(())
}
