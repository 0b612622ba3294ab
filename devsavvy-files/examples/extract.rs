use devsavvy_files::{build_context, FileProcessor};

#[tokio::main]
async fn main() {
    println!("DevSavvy - file extraction\n");

    let processor = FileProcessor::default();
    let mut files = Vec::new();

    for path in std::env::args().skip(1) {
        match processor.process_path(&path).await {
            Ok(file) => {
                println!(
                    "{} [{}] {} bytes, {} chars{}",
                    file.name,
                    file.kind.label(),
                    file.size,
                    file.text.chars().count(),
                    if file.truncated { " (truncated)" } else { "" }
                );
                files.push(file);
            }
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    if files.is_empty() {
        eprintln!("Usage: extract <file>...");
        return;
    }

    println!("\n{}", build_context(&files));
}
