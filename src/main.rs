//! Dual-Condition Risk Predictor
//!
//! Train ensembles, run one-off predictions, or serve the prediction API.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dual_risk::{
    bundle::ModelBundle,
    config::Config,
    ml::DualConditionPredictor,
    server::{self, auth, AppState},
    storage::Database,
    training::Trainer,
    types::Condition,
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dual-risk")]
#[command(about = "Heart disease and gastric cancer risk prediction ensembles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an ensemble from a CSV file and save its bundle
    Train {
        /// heart_disease or gastric_cancer
        #[arg(long)]
        condition: Condition,
        /// Training CSV
        #[arg(long)]
        data: PathBuf,
        /// Bundle path (defaults to the configured models location)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Predict from a JSON object read from a file or stdin
    Predict {
        /// Omit for a differential diagnosis across both conditions
        #[arg(long)]
        condition: Option<Condition>,
        /// Input JSON file (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Run the HTTP prediction API
    Serve {
        /// Overrides the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show what a trained bundle contains
    Inspect {
        #[arg(long)]
        condition: Condition,
    },
    /// Print a bearer token for the configured secret
    IssueToken {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "1")]
        ttl_hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Train {
            condition,
            data,
            output,
        } => train(config, condition, data, output),
        Commands::Predict { condition, input } => predict(config, condition, input),
        Commands::Serve { port } => serve(config, port).await,
        Commands::Inspect { condition } => inspect(config, condition),
        Commands::IssueToken { user, ttl_hours } => issue_token(config, &user, ttl_hours),
    }
}

fn train(
    config: Config,
    condition: Condition,
    data: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output = match output {
        Some(path) => path,
        None => config.models.path_for(condition)?,
    };

    let bundle = Trainer::new(condition, config.training)
        .train_file(&data)
        .with_context(|| format!("training {} from {}", condition, data.display()))?;
    let fingerprint = bundle.save(&output)?;

    println!("\n🩺 {} ensemble\n", condition);
    for model in &bundle.models {
        match (&model.performance.error, model.performance.test_score) {
            (Some(error), _) => println!("  {:<20} failed: {}", model.name, error),
            (None, Some(test)) => println!(
                "  {:<20} train {:.4}  test {:.4}",
                model.name,
                model.performance.train_score.unwrap_or_default(),
                test
            ),
            (None, None) => println!("  {:<20} no score", model.name),
        }
    }
    println!("\nSaved to {} ({})", output.display(), fingerprint);

    Ok(())
}

fn read_input(path: Option<PathBuf>) -> anyhow::Result<Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

fn run_prediction(config: Config, condition: Option<Condition>, input: Option<PathBuf>) -> anyhow::Result<Value> {
    let mut input = read_input(input)?;
    let requested = match input.as_object_mut() {
        Some(fields) => fields.remove("condition_type"),
        None => anyhow::bail!("input must be a JSON object"),
    };
    let condition = match (condition, requested) {
        (Some(condition), _) => Some(condition),
        (None, Some(Value::String(s))) => Some(s.parse::<Condition>()?),
        (None, None | Some(Value::Null)) => None,
        (None, Some(other)) => anyhow::bail!("Invalid condition type: {}", other),
    };

    let predictor = DualConditionPredictor::new(config.models);
    let report = predictor.predict(&input, condition)?;
    Ok(serde_json::to_value(report)?)
}

fn predict(config: Config, condition: Option<Condition>, input: Option<PathBuf>) -> anyhow::Result<()> {
    match run_prediction(config, condition, input) {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Prediction failed: {:#}", e);
            println!("{}", json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    }
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.server.port);

    let database = if config.storage.enabled {
        Some(Database::connect(&config.storage.database_url).await?)
    } else {
        tracing::info!("Prediction history storage disabled");
        None
    };
    if config.server.jwt_secret.is_none() {
        tracing::warn!("No jwt_secret configured; the API is open to anonymous callers");
    }

    let predictor = Arc::new(DualConditionPredictor::new(config.models));
    // Warm the cache; a missing bundle is reported per request instead
    for condition in Condition::ALL {
        if let Err(e) = predictor.bundle(condition) {
            tracing::warn!("{} bundle not loaded: {}", condition, e);
        }
    }

    let state = Arc::new(AppState::new(predictor, database, config.server.jwt_secret));

    let stats_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        interval.tick().await;
        loop {
            interval.tick().await;
            stats_state.monitor.log_stats().await;
        }
    });

    server::start_server(state, &config.server.host, port).await?;
    Ok(())
}

fn inspect(config: Config, condition: Condition) -> anyhow::Result<()> {
    let path = config.models.path_for(condition)?;
    let loaded = ModelBundle::load(&path)?;
    println!("{}", serde_json::to_string_pretty(&loaded.summary())?);
    Ok(())
}

fn issue_token(config: Config, user: &str, ttl_hours: i64) -> anyhow::Result<()> {
    let secret = config
        .server
        .jwt_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("server.jwt_secret is not configured"))?;
    let token = auth::issue_token(secret, user, chrono::Duration::hours(ttl_hours))?;
    println!("{}", token);
    Ok(())
}
