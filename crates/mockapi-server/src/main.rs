use anyhow::Context;
use clap::{Parser, ValueEnum};
use mockapi_server::config::{Config, RedisConfig};
use mockapi_server::store::{create_request_log_store, Definitions, InMemoryRepository};
use mockapi_server::{build_pipeline, MockServer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "mockapi-server", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Requests allowed per client IP per window
    #[arg(long, env = "GLOBAL_MAX_ALLOWED_REQUESTS")]
    max_requests: Option<u64>,

    #[arg(long, env = "GLOBAL_TIME_WINDOW_SECONDS")]
    window_seconds: Option<u64>,

    #[arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Keep rate limit counters in Redis
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// YAML file with teams, projects, urls and mock contents
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let Some(max_requests) = self.max_requests {
            config.rate_limit.max_requests = max_requests;
        }
        if let Some(window_seconds) = self.window_seconds {
            config.rate_limit.window_seconds = window_seconds;
        }
        if let Some(secret) = &self.jwt_secret {
            config.auth.jwt_secret = Some(secret.clone());
        }
        if let Some(url) = &self.redis_url {
            config.rate_limit.backend = "redis".to_string();
            config.rate_limit.redis = Some(RedisConfig::new(url.clone()));
        }
        if let Some(definitions) = &self.definitions {
            config.definitions = Some(definitions.clone());
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut config = match &args.config {
        Some(path) => Config::read_file(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let repository = match &config.definitions {
        Some(path) => {
            let definitions = Definitions::from_file(path)?;
            InMemoryRepository::from_definitions(&definitions)
                .with_context(|| format!("Invalid definitions in {}", path.display()))?
        }
        None => {
            info!("No definitions file configured, starting with an empty repository");
            InMemoryRepository::new()
        }
    };
    let log_store = create_request_log_store(&config.request_log)?;

    let pipeline = build_pipeline(&config, Arc::new(repository), log_store)?;
    let server = MockServer::bind(&config.listen, pipeline)?;

    info!("mockapi-server {} started", env!("CARGO_PKG_VERSION"));
    server.run().await?;
    info!("mockapi-server stopped");
    Ok(())
}
