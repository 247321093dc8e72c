use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info};

use crate::analytics::{self, ReportType};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::embeddings::OllamaClient;
use crate::engine::QueryEngine;
use crate::index;

/// Answer one question and print the result as JSON
#[inline]
pub async fn ask_question(config_dir: &Path, question: &str) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let engine = QueryEngine::from_config(&config)
        .await
        .context("Failed to start query engine")?;

    info!("Answering question: {}", question);
    let answer = engine.answer(question).await.map_err(|e| {
        error!("Failed to answer question: {}", e);
        anyhow::Error::from(e)
    })?;

    println!("{}", to_json(&answer)?);
    Ok(())
}

/// Run a named report and print it as JSON
#[inline]
pub async fn run_report(config_dir: &Path, report_type: &str) -> Result<()> {
    let report_type: ReportType = report_type.parse().map_err(crate::InsightsError::from)?;

    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let dataset = load_dataset(&config).await?;

    let report = analytics::generate_report(&dataset, report_type)
        .map_err(crate::InsightsError::from)?;

    println!("{}", to_json(&report)?);
    Ok(())
}

/// Print dataset, index and Ollama health
#[inline]
pub async fn show_status(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).unwrap_or_else(|e| {
        eprintln!("{} {:#}", style("⚠ Using default configuration:").yellow(), e);
        Config::with_base_dir(config_dir)
    });

    println!("{}", style("📊 Booking Insights Status").bold().cyan());
    println!("{}", "=".repeat(50));
    println!();

    println!("{}", style("🗂️  Dataset:").bold());
    match load_dataset(&config).await {
        Ok(dataset) => {
            let canceled = dataset.canceled().count();
            println!(
                "   ✅ {} bookings ({} canceled) from {}",
                dataset.len(),
                canceled,
                config.dataset_path().display()
            );
        }
        Err(e) => println!("   ❌ {:#}", e),
    }

    println!("{}", style("🔍 Retrieval Index:").bold());
    match index::open_index(&config).await {
        Ok(index) => match index.count().await {
            Ok(count) => println!(
                "   ✅ {:?} index with {} passages at {}",
                config.index.backend,
                count,
                config.index_path().display()
            ),
            Err(e) => println!("   ⚠️  Opened but unreadable - {}", e),
        },
        Err(e) => println!("   ❌ {}", e),
    }

    println!("{}", style("🤖 Ollama:").bold());
    let client = OllamaClient::new(&config)?;
    match tokio::task::spawn_blocking(move || client.health_check()).await? {
        Ok(()) => {
            println!(
                "   ✅ Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            println!("   📋 Generation model: {}", config.ollama.generation_model);
        }
        Err(e) => println!("   ❌ {:#}", e),
    }

    Ok(())
}

async fn load_dataset(config: &Config) -> Result<Dataset> {
    let path = config.dataset_path();
    let dataset = tokio::task::spawn_blocking(move || Dataset::load(path))
        .await
        .context("Dataset loading task failed")??;
    Ok(dataset)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}
