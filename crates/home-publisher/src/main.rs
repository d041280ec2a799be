// # home-publisher
//
// One-shot DNS reconciliation: publish the lab's declared record set to the
// zone and exit. This binary is a THIN integration layer only:
//
// 1. Reading configuration from environment variables and the records file
// 2. Initializing logging and the runtime
// 3. Registering providers and constructing the engine
// 4. Running one reconciliation pass and mapping it to an exit code
//
// All reconciliation logic lives in publisher-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Zone & Provider
// - `HOME_PUBLISHER_ZONE`: Zone name (e.g. example.com)
// - `HOME_PUBLISHER_ZONE_ID`: Zone ID (optional, auto-detected otherwise)
// - `HOME_PUBLISHER_API_TOKEN`: Provider API token
// - `HOME_PUBLISHER_PROVIDER_TYPE`: Provider type (cloudflare)
//
// ### Desired records
// - `HOME_PUBLISHER_RECORDS_FILE`: Path to a JSON file holding the desired
//   record array
// - `HOME_PUBLISHER_DELETE_ORPHANS`: Delete unmatched remote records
//   (default true)
//
// ### Engine
// - `HOME_PUBLISHER_MAX_RETRIES`: Maximum retry attempts
// - `HOME_PUBLISHER_RETRY_DELAY_SECS`: Backoff base between retries
// - `HOME_PUBLISHER_CONCURRENCY`: Worker pool width
// - `HOME_PUBLISHER_RATE_LIMIT_PER_SEC`: API request rate (0 = unlimited)
// - `HOME_PUBLISHER_RUN_TIMEOUT_SECS`: Overall run deadline (0 = none)
//
// ### Misc
// - `HOME_PUBLISHER_LOG_LEVEL`: trace, debug, info, warn, error
// - `HOME_PUBLISHER_MODE`: set to "dry-run" to log mutations without
//   issuing them
//
// ## Example
//
// ```bash
// export HOME_PUBLISHER_ZONE=example.com
// export HOME_PUBLISHER_API_TOKEN=your_token
// export HOME_PUBLISHER_RECORDS_FILE=/etc/home-publisher/records.json
//
// home-publisher
// ```

use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use publisher_core::{
    EngineConfig, ProviderConfig, ProviderRegistry, PublisherConfig, Reconciler, RunReport,
    ZoneConfig,
};

/// Exit codes for different termination scenarios
///
/// - 0: Reconciliation fully succeeded
/// - 1: Configuration or authentication error (pre-flight, nothing mutated)
/// - 2: Reconciliation ran but the failure report is non-empty, or an
///   unexpected runtime error occurred
#[derive(Debug, Clone, Copy)]
enum PublisherExitCode {
    /// Fully successful reconciliation
    CleanRun = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Run finished with failures (or failed at runtime)
    ReconcileFailed = 2,
}

impl From<PublisherExitCode> for ExitCode {
    fn from(code: PublisherExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    zone: String,
    zone_id: Option<String>,
    provider_type: String,
    api_token: String,
    records_file: String,
    delete_orphans: bool,
    max_retries: Option<usize>,
    retry_delay_secs: Option<u64>,
    concurrency: Option<usize>,
    rate_limit_per_sec: Option<u32>,
    run_timeout_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            zone: env::var("HOME_PUBLISHER_ZONE")
                .context("HOME_PUBLISHER_ZONE is required. Set it via: export HOME_PUBLISHER_ZONE=example.com")?,
            zone_id: env::var("HOME_PUBLISHER_ZONE_ID").ok(),
            provider_type: env::var("HOME_PUBLISHER_PROVIDER_TYPE")
                .unwrap_or_else(|_| "cloudflare".to_string()),
            api_token: env::var("HOME_PUBLISHER_API_TOKEN")
                .context("HOME_PUBLISHER_API_TOKEN is required")?,
            records_file: env::var("HOME_PUBLISHER_RECORDS_FILE")
                .context("HOME_PUBLISHER_RECORDS_FILE is required")?,
            delete_orphans: env::var("HOME_PUBLISHER_DELETE_ORPHANS")
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
            max_retries: env::var("HOME_PUBLISHER_MAX_RETRIES")
                .ok()
                .map(|s| s.parse().unwrap_or(3)),
            retry_delay_secs: env::var("HOME_PUBLISHER_RETRY_DELAY_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(5)),
            concurrency: env::var("HOME_PUBLISHER_CONCURRENCY")
                .ok()
                .map(|s| s.parse().unwrap_or(4)),
            rate_limit_per_sec: env::var("HOME_PUBLISHER_RATE_LIMIT_PER_SEC")
                .ok()
                .map(|s| s.parse().unwrap_or(4)),
            run_timeout_secs: env::var("HOME_PUBLISHER_RUN_TIMEOUT_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(0)),
            log_level: env::var("HOME_PUBLISHER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// This performs validation that cannot wait for the engine's own
    /// pre-flight checks: value formats, placeholder tokens, file presence
    /// and numeric ranges, with actionable messages.
    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!(
                "HOME_PUBLISHER_API_TOKEN is required. \
                Set it via: export HOME_PUBLISHER_API_TOKEN=your_token"
            );
        }

        // Cloudflare API tokens are typically 40 characters alphanumeric.
        if self.api_token.len() < 20 {
            anyhow::bail!(
                "HOME_PUBLISHER_API_TOKEN appears too short ({} chars). \
                Cloudflare tokens are typically 40 characters. \
                Verify your token is correct.",
                self.api_token.len()
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.api_token.to_lowercase();
        if token_lower.contains("your_token")
            || token_lower.contains("replace_me")
            || token_lower.contains("example")
            || token_lower == "token"
        {
            anyhow::bail!(
                "HOME_PUBLISHER_API_TOKEN appears to be a placeholder. \
                Use an actual API token from your DNS provider."
            );
        }

        match self.provider_type.as_str() {
            "cloudflare" => {}
            _ => anyhow::bail!(
                "HOME_PUBLISHER_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                self.provider_type
            ),
        }

        publisher_core::record::validate_domain_name(&self.zone)
            .map_err(|e| anyhow::anyhow!("HOME_PUBLISHER_ZONE is invalid: {}", e))?;

        if self.records_file.is_empty() {
            anyhow::bail!("HOME_PUBLISHER_RECORDS_FILE cannot be empty");
        }
        if !std::path::Path::new(&self.records_file).exists() {
            anyhow::bail!(
                "HOME_PUBLISHER_RECORDS_FILE does not exist: {}",
                self.records_file
            );
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            anyhow::bail!(
                "HOME_PUBLISHER_MAX_RETRIES must be at most 10. Got: {}",
                max_retries
            );
        }

        if let Some(retry_delay) = self.retry_delay_secs
            && retry_delay > 300
        {
            anyhow::bail!(
                "HOME_PUBLISHER_RETRY_DELAY_SECS must be at most 300. Got: {}",
                retry_delay
            );
        }

        if let Some(concurrency) = self.concurrency
            && !(1..=64).contains(&concurrency)
        {
            anyhow::bail!(
                "HOME_PUBLISHER_CONCURRENCY must be between 1 and 64. Got: {}",
                concurrency
            );
        }

        if let Some(timeout) = self.run_timeout_secs
            && timeout > 3600
        {
            anyhow::bail!(
                "HOME_PUBLISHER_RUN_TIMEOUT_SECS must be at most 3600. Got: {}",
                timeout
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "HOME_PUBLISHER_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Assemble the engine configuration from env overrides
    fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default();
        if let Some(max_retries) = self.max_retries {
            engine.max_retries = max_retries;
        }
        if let Some(retry_delay) = self.retry_delay_secs {
            engine.retry_delay_secs = retry_delay;
        }
        if let Some(concurrency) = self.concurrency {
            engine.concurrency = concurrency;
        }
        if let Some(rate) = self.rate_limit_per_sec {
            engine.rate_limit_per_sec = rate;
        }
        if let Some(timeout) = self.run_timeout_secs {
            engine.run_timeout_secs = timeout;
        }
        engine.delete_orphans = self.delete_orphans;
        engine
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return PublisherExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PublisherExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PublisherExitCode::ConfigError.into();
    }

    info!("Starting home-publisher");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PublisherExitCode::ReconcileFailed.into();
        }
    };

    let code = rt.block_on(async {
        match run_publisher(config).await {
            Ok(report) if report.succeeded() => PublisherExitCode::CleanRun,
            Ok(report) => {
                for failure in &report.failures {
                    error!(
                        op = %failure.op,
                        key = %failure.key,
                        attempts = failure.attempts,
                        "operation failed: {}",
                        failure.error
                    );
                }
                PublisherExitCode::ReconcileFailed
            }
            Err(e) => {
                error!("Run error: {:#}", e);
                let fatal = e
                    .downcast_ref::<publisher_core::Error>()
                    .is_some_and(|pe| pe.is_fatal());
                if fatal {
                    PublisherExitCode::ConfigError
                } else {
                    PublisherExitCode::ReconcileFailed
                }
            }
        }
    });

    code.into()
}

/// Execute one reconciliation pass
async fn run_publisher(config: Config) -> Result<RunReport> {
    // Load the desired record set
    let records = publisher_core::config::load_records_file(&config.records_file)?;

    info!(
        zone = %config.zone,
        records = records.len(),
        "loaded desired record set"
    );

    // Create provider registry and register built-in providers
    let registry = ProviderRegistry::new();

    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        publisher_provider_cloudflare::register(&registry);
    }

    let provider_config = ProviderConfig::Cloudflare {
        api_token: config.api_token.clone(),
        zone_id: config.zone_id.clone(),
        account_id: None,
    };

    let publisher_config = PublisherConfig {
        zone: ZoneConfig {
            name: config.zone.clone(),
            zone_id: config.zone_id.clone(),
        },
        provider: provider_config.clone(),
        records,
        engine: config.engine_config(),
    };

    // The authenticated client lives for exactly one run: constructed here,
    // dropped when the reconciler goes out of scope.
    let provider = registry.create_provider(&provider_config)?;
    let (reconciler, event_rx) = Reconciler::new(Arc::from(provider), publisher_config)?;

    // Surface engine events in the log as they happen
    let events = tokio::spawn(async move {
        let mut stream = ReceiverStream::new(event_rx);
        while let Some(event) = stream.next().await {
            debug!(?event, "engine event");
        }
    });

    let result = reconciler.run().await;
    drop(reconciler); // closes the event channel
    let _ = events.await;

    let report = result?;
    if report.succeeded() {
        info!("Reconciliation succeeded: {}", report.summary());
    } else {
        warn!("Reconciliation finished with failures: {}", report.summary());
    }

    Ok(report)
}
