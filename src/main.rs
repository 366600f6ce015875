use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use floraguard_inference::{disease, metrics, model_fetch, InferenceConfig, InferenceResolver};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// FloraGuard crop-disease inference
#[derive(Parser, Debug)]
#[command(name = "floraguard-inference")]
#[command(about = "Resolve leaf images to disease predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify one or more leaf images and print each record as JSON
    Classify {
        /// Image files (PNG or JPEG)
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Display language tag carried on the record (en, hi, ta)
        #[arg(short, long)]
        language: Option<String>,

        /// Print Prometheus metrics after the records
        #[arg(long)]
        metrics: bool,
    },
    /// Print the disease catalog as JSON
    Diseases,
    /// Download the model artifact if it is missing
    FetchModel,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info")
                    // ONNX Runtime is chatty at info
                    .add_directive("ort=warn".parse().unwrap())
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = InferenceConfig::load()?;

    match cli.command {
        Command::Classify {
            images,
            language,
            metrics: show_metrics,
        } => {
            metrics::init_metrics();
            tracing::info!(
                offline = config.local.enabled,
                online = config.remote.api_key.is_some(),
                images = images.len(),
                "Starting inference"
            );

            let resolver = Arc::new(InferenceResolver::from_config(&config)?);
            let tasks = images.into_iter().map(|path| {
                let resolver = resolver.clone();
                let language = language.clone();
                tokio::spawn(async move {
                    let result = resolver.resolve(&path, language.as_deref()).await;
                    (path, result)
                })
            });

            let mut failures = 0usize;
            for joined in futures::future::join_all(tasks).await {
                let (path, result) = joined?;
                match result {
                    Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    Err(e) => {
                        failures += 1;
                        tracing::error!(path = %path.display(), error = %e, "Classification failed");
                    }
                }
            }

            if show_metrics {
                println!("{}", metrics::export_metrics());
            }
            if failures > 0 {
                bail!("{} image(s) could not be classified", failures);
            }
        }
        Command::Diseases => {
            println!("{}", serde_json::to_string_pretty(disease::catalog())?);
        }
        Command::FetchModel => {
            let outcome = model_fetch::ensure_model(&config).await?;
            tracing::info!(?outcome, "Model fetch finished");
        }
    }

    Ok(())
}
