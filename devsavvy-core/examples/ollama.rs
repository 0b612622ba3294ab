use devsavvy_core::{ChatRequest, Config, Message, OllamaProvider, Provider};
use std::io::Write;

#[tokio::main]
async fn main() {
    println!("Welcome to DevSavvy!");

    let config = Config::load_or_default();
    println!("Model: {}", config.llm.model);
    println!("Base URL: {}", config.llm.base_url);

    let provider = OllamaProvider::from_config(&config);

    match provider.version().await {
        Ok(version) => println!("Ollama version: {}", version),
        Err(e) => eprintln!("Could not read Ollama version: {}", e),
    }

    println!("Testing chat with model: {}", config.llm.model);
    let request = ChatRequest::new(&config.llm.model, vec![Message::user("Hi there!")])
        .with_temperature(config.llm.temperature);

    let result = provider
        .chat(
            request,
            Box::new(|response| {
                print!("{}", response.content);
                let _ = std::io::stdout().flush();
            }),
        )
        .await;

    match result {
        Ok(_) => {
            println!("\n\nChat test successful!");
        }
        Err(e) => {
            eprintln!("\n\nChat test failed: {}", e);
            eprintln!("\nTroubleshooting:");
            eprintln!("  1. Is Ollama running? (ollama serve)");
            eprintln!("  2. Is the model pulled? (ollama pull {})", config.llm.model);
            eprintln!("  3. Is the base URL correct? ({})", config.llm.base_url);
        }
    }
}
