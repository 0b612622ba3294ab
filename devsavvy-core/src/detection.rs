//! Ollama availability detection and installation guidance.

use crate::provider::{OllamaProvider, Provider};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Ollama is not reachable at {0}")]
    NotRunning(String),

    #[error("Failed to check Ollama status: {0}")]
    CheckFailed(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;

/// Information about Ollama availability.
#[derive(Debug, Clone)]
pub struct OllamaInfo {
    /// Whether the `ollama` binary is on PATH. A remote server can be
    /// running even when this is false.
    pub installed: bool,
    pub running: bool,
    pub version: String,
}

/// Checks if the Ollama server at `base_url` answers, printing setup help if not.
///
/// # Example
///
/// ```no_run
/// use devsavvy_core::detection;
///
/// # async fn example() {
/// match detection::detect_ollama("http://localhost:11434").await {
///     Ok(info) => println!("Ollama {} ready", info.version),
///     Err(e) => eprintln!("Setup required: {}", e),
/// }
/// # }
/// ```
pub async fn detect_ollama(base_url: &str) -> Result<OllamaInfo> {
    let result = check_ollama_silent(base_url).await;

    if let Err(DetectionError::NotRunning(_)) = &result {
        if is_ollama_installed() {
            print_startup_help();
        } else {
            print_installation_help();
        }
    }

    result
}

/// Quietly checks if Ollama is available without printing help messages.
pub async fn check_ollama_silent(base_url: &str) -> Result<OllamaInfo> {
    let provider = OllamaProvider::new(base_url);

    match provider.version().await {
        Ok(version) => Ok(OllamaInfo {
            installed: is_ollama_installed(),
            running: true,
            version,
        }),
        Err(crate::provider::ProviderError::Request(e)) => {
            debug!("Ollama version request failed: {}", e);
            Err(DetectionError::NotRunning(base_url.to_string()))
        }
        Err(e) => Err(DetectionError::CheckFailed(e.to_string())),
    }
}

fn is_ollama_installed() -> bool {
    Command::new("which")
        .arg("ollama")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn print_installation_help() {
    eprintln!("❌ Ollama not found!");
    eprintln!();
    eprintln!("  DevSavvy talks to a local Ollama server.");
    eprintln!();
    eprintln!("  Install Ollama:");

    #[cfg(target_os = "macos")]
    {
        eprintln!("   • macOS:  curl -fsSL https://ollama.ai/install.sh | sh");
        eprintln!("   • Or:     brew install ollama");
    }

    #[cfg(target_os = "linux")]
    {
        eprintln!("   • Linux:  curl -fsSL https://ollama.ai/install.sh | sh");
    }

    #[cfg(target_os = "windows")]
    {
        eprintln!("   • Windows: Download from https://ollama.ai/download");
    }

    eprintln!();
    eprintln!("  After installation, pull a model:");
    eprintln!("   ollama pull llama3.2:3b            (recommended, ~2GB)");
    eprintln!("   ollama pull llava:7b               (reads attached images)");
    eprintln!();
    eprintln!("  Learn more: https://github.com/ollama/ollama");
}

fn print_startup_help() {
    eprintln!("❌ Ollama is installed but not running!");
    eprintln!();
    eprintln!("  Start Ollama:");

    #[cfg(target_os = "macos")]
    {
        eprintln!("   • Run the Ollama app from Applications");
        eprintln!("   • Or:  ollama serve  (in a separate terminal)");
    }

    #[cfg(not(target_os = "macos"))]
    {
        eprintln!("   ollama serve");
    }

    eprintln!();
    eprintln!("  Verify it's running:");
    eprintln!("   ollama list");
}
