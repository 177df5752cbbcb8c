use crate::config::{Config, get_config_path, load_config, save_config};
use crate::engine::{ChatEngine, WeatherLookup, train_and_save};
use crate::errors::QuipError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "quip")]
#[command(about = "Pattern-and-ML conversational chatbot", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize quip configuration and data directory
    Onboard,
    /// Chat from the terminal (one-shot with -m, REPL otherwise)
    Chat {
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long, default_value = "local")]
        user: String,
    },
    /// Run the HTTP API server
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Train the intent model and save it
    Train {
        /// JSON dataset of [{text, intent}] entries; defaults to the
        /// configured dataset or the built-in samples
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Also merge good-rated feedback into the training set
        #[arg(long)]
        feedback: bool,
    },
    /// Show quip status
    Status,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => onboard()?,
        Commands::Chat { message, user } => chat(message, user).await?,
        Commands::Serve { host, port } => serve(host, port).await?,
        Commands::Train { data, feedback } => train(data, feedback).await?,
        Commands::Status => status().await?,
    }

    Ok(())
}

fn onboard() -> Result<()> {
    println!("Initializing quip...");

    let config_path = get_config_path()?;
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    save_config(&config, Some(config_path.as_path()))?;
    println!("Created config at {}", config_path.display());

    let users_dir = config.users_dir()?;
    crate::utils::ensure_dir(&users_dir)?;
    println!("Created user memory directory at {}", users_dir.display());

    println!("\nquip is ready!");
    println!("\nNext steps:");
    println!("  1. Train the intent model: quip train");
    println!("  2. Chat: quip chat -m \"Hello!\"");
    println!("  3. Or serve HTTP: quip serve");

    Ok(())
}

async fn chat(message: Option<String>, user: String) -> Result<()> {
    let config = load_config(None)?;
    let engine = ChatEngine::new(config)
        .map(|e| e.with_weather(Arc::new(CannedWeather)))
        .context("building chat engine")?;

    if let Some(msg) = message {
        let reply = engine.process_message(&user, &msg).await;
        println!("{}", reply.text);
        return Ok(());
    }

    let bot_name = engine.bot_name_for(&user).await;
    println!("{} here! Type 'quit' to leave.\n", bot_name);
    loop {
        use std::io::{self, BufRead, Write};
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit") {
            println!("\n{}: Goodbye! Thanks for chatting!", bot_name);
            break;
        }

        let reply = engine.process_message(&user, input).await;
        let bot_name = engine.bot_name_for(&user).await;
        println!("\n{}: {}\n", bot_name, reply.text);
    }

    Ok(())
}

async fn serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(None)?;
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);

    let engine = Arc::new(
        ChatEngine::new(config)
            .map(|e| e.with_weather(Arc::new(CannedWeather)))
            .context("building chat engine")?,
    );

    println!("Starting quip HTTP API on {}:{}...", host, port);
    tokio::select! {
        result = crate::gateway::serve(engine, &host, port) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            Ok(())
        }
    }
}

async fn train(data: Option<PathBuf>, feedback: bool) -> Result<()> {
    let config = load_config(None)?;
    let report = train_and_save(&config, data.as_deref(), feedback).await?;
    println!("Trained intent model:");
    println!("  examples: {}", report.examples);
    println!("  classes:  {}", report.classes);
    println!("  vocab:    {}", report.vocab_size);
    println!(
        "  training accuracy: {:.1}%",
        report.training_accuracy * 100.0
    );
    println!("Saved model to {}", config.model_path()?.display());
    Ok(())
}

async fn status() -> Result<()> {
    let config = load_config(None)?;
    let config_path = get_config_path()?;
    let model_path = config.model_path()?;

    println!("quip v{}", crate::VERSION);
    println!("  config:    {}", config_path.display());
    println!("  bot name:  {}", config.bot.bot_name);
    println!(
        "  model:     {} ({})",
        model_path.display(),
        if model_path.exists() {
            "trained"
        } else {
            "not trained, run `quip train`"
        }
    );

    let users_dir = config.users_dir()?;
    let users = std::fs::read_dir(&users_dir)
        .map(|entries| entries.filter_map(std::result::Result::ok).count())
        .unwrap_or(0);
    println!("  users:     {}", users);

    let feedback_store =
        crate::engine::feedback::FeedbackStore::new(config.feedback_path()?);
    let stats = feedback_store.stats().await?;
    println!(
        "  feedback:  {} entries ({} good / {} bad / {} neutral)",
        stats.total, stats.good, stats.bad, stats.neutral
    );

    Ok(())
}

/// Offline forecast source for CLI use. Deterministic per city so the same
/// question gets the same answer within a session.
struct CannedWeather;

const CONDITIONS: &[(&str, i32)] = &[
    ("sunny", 24),
    ("partly cloudy", 18),
    ("overcast", 14),
    ("rainy", 11),
    ("windy", 16),
    ("clear and crisp", 8),
];

#[async_trait]
impl WeatherLookup for CannedWeather {
    async fn describe(&self, city: &str) -> Result<String, QuipError> {
        let key: usize = city
            .to_lowercase()
            .bytes()
            .map(usize::from)
            .sum::<usize>()
            % CONDITIONS.len();
        let (condition, temp) = CONDITIONS[key];
        Ok(format!(
            "Right now it's {} and about {}°C in {}.",
            condition, temp, city
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_weather_is_deterministic() {
        let first = CannedWeather.describe("Paris").await.unwrap();
        let second = CannedWeather.describe("Paris").await.unwrap();
        assert_eq!(first, second);
        assert!(first.contains("Paris"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        Cli::try_parse_from(["quip", "chat", "-m", "hello"]).unwrap();
        Cli::try_parse_from(["quip", "serve", "--port", "9090"]).unwrap();
        Cli::try_parse_from(["quip", "train", "--feedback"]).unwrap();
        Cli::try_parse_from(["quip", "status"]).unwrap();
        Cli::try_parse_from(["quip", "onboard"]).unwrap();
        assert!(Cli::try_parse_from(["quip", "bogus"]).is_err());
    }
}
