use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub bucket: String,
    pub url_ttl_secs: u64,
    pub cdn_domain: Option<String>,
    pub sns_topic_arn: Option<String>,
    pub s3_endpoint: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Presigned upload gateway")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides UPLOAD_GATEWAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket receiving the uploads (overrides UPLOAD_GATEWAY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Lifetime in seconds of issued URLs (overrides UPLOAD_GATEWAY_URL_TTL_SECS)
    #[arg(long)]
    pub url_ttl_secs: Option<u64>,

    /// CDN domain fronting the bucket (overrides UPLOAD_GATEWAY_CDN_DOMAIN)
    #[arg(long)]
    pub cdn_domain: Option<String>,

    /// SNS topic for completion notifications (overrides UPLOAD_GATEWAY_SNS_TOPIC_ARN)
    #[arg(long)]
    pub sns_topic_arn: Option<String>,

    /// Custom S3 endpoint, path-style (overrides UPLOAD_GATEWAY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("UPLOAD_GATEWAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOAD_GATEWAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading UPLOAD_GATEWAY_PORT"),
        };
        let env_db = env::var("UPLOAD_GATEWAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_gateway.db".into());
        let env_bucket = env::var("UPLOAD_GATEWAY_BUCKET").unwrap_or_else(|_| "uploads".into());
        let env_ttl = match env::var("UPLOAD_GATEWAY_URL_TTL_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("parsing UPLOAD_GATEWAY_URL_TTL_SECS value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3600,
            Err(err) => return Err(err).context("reading UPLOAD_GATEWAY_URL_TTL_SECS"),
        };
        let env_cdn = env::var("UPLOAD_GATEWAY_CDN_DOMAIN").ok();
        let env_topic = env::var("UPLOAD_GATEWAY_SNS_TOPIC_ARN").ok();
        let env_endpoint = env::var("UPLOAD_GATEWAY_S3_ENDPOINT").ok();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            bucket: args.bucket.unwrap_or(env_bucket),
            url_ttl_secs: args.url_ttl_secs.unwrap_or(env_ttl),
            cdn_domain: args.cdn_domain.or(env_cdn),
            sns_topic_arn: args.sns_topic_arn.or(env_topic),
            s3_endpoint: args.s3_endpoint.or(env_endpoint),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
