// # linkbio-sync - Profile Sync Command
//
// Thin integration layer: reads configuration from the environment, builds
// the stores through the registry and runs one sync of a profile. All sync
// logic lives in linkbio-core.
//
// A run:
// 1. Fetches the profile and reports whether the local marker is fresh
// 2. If a links file is given, reconciles the remote links to it
// 3. Flushes local state
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Document Store
// - `LINKBIO_STORE_TYPE`: Type of document store (rest, memory). Default: rest
// - `LINKBIO_STORE_URL`: Base URL of the document API (for rest)
// - `LINKBIO_API_TOKEN`: Bearer token (for rest)
// - `LINKBIO_TIMEOUT_SECS`: HTTP timeout in seconds. Default: 30
// - `LINKBIO_MODE`: Set to `dry-run` to log writes instead of sending them
//
// ### Local Store
// - `LINKBIO_LOCAL_STORE_TYPE`: Type of local store (file, memory). Default: file
// - `LINKBIO_LOCAL_STORE_PATH`: Path to the local store file (for file)
//
// ### Sync
// - `LINKBIO_PROFILE_ID`: Profile to sync (required)
// - `LINKBIO_LINKS_FILE`: JSON file `{"social": [...], "custom": [...]}` to push
// - `LINKBIO_MARKER_STRATEGY`: toggle or counter. Default: toggle
// - `LINKBIO_PER_PROFILE_KEYS`: Keep one local marker per profile (true/false)
// - `LINKBIO_LOG_LEVEL`: trace, debug, info, warn, error. Default: info
//
// ## Example
//
// ```bash
// export LINKBIO_STORE_URL=https://db.example.com/v1
// export LINKBIO_API_TOKEN=your_token
// export LINKBIO_LOCAL_STORE_PATH=/var/lib/linkbio/local.json
// export LINKBIO_PROFILE_ID=abc123
// export LINKBIO_LINKS_FILE=./links.json
//
// linkbio-sync
// ```

use anyhow::{Context, Result};
use linkbio_core::config::{
    DocumentStoreConfig, FreshnessConfig, LocalStoreConfig, SyncConfig,
};
use linkbio_core::{Error, LinkGroups, MarkerStrategy, ProfileService, StoreRegistry, SyncEvent};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Sync completed
/// - 1: Configuration or startup error
/// - 2: Runtime error (fetch failure, unexpected error)
/// - 3: Some link writes failed; re-running converges the rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncExitCode {
    Clean = 0,
    ConfigError = 1,
    RuntimeError = 2,
    PartialWrite = 3,
}

impl From<SyncExitCode> for ExitCode {
    fn from(code: SyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
struct Config {
    store_type: String,
    store_url: Option<String>,
    api_token: Option<String>,
    timeout_secs: Option<u64>,
    dry_run: bool,
    local_store_type: String,
    local_store_path: Option<String>,
    profile_id: String,
    links_file: Option<String>,
    marker_strategy: String,
    per_profile_keys: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let timeout_secs = match env::var("LINKBIO_TIMEOUT_SECS") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("LINKBIO_TIMEOUT_SECS is not a number: {}", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            store_type: env::var("LINKBIO_STORE_TYPE").unwrap_or_else(|_| "rest".to_string()),
            store_url: env::var("LINKBIO_STORE_URL").ok(),
            api_token: env::var("LINKBIO_API_TOKEN").ok(),
            timeout_secs,
            dry_run: env::var("LINKBIO_MODE")
                .unwrap_or_default()
                .eq_ignore_ascii_case("dry-run"),
            local_store_type: env::var("LINKBIO_LOCAL_STORE_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            local_store_path: env::var("LINKBIO_LOCAL_STORE_PATH").ok(),
            profile_id: env::var("LINKBIO_PROFILE_ID")
                .context("LINKBIO_PROFILE_ID is required")?,
            links_file: env::var("LINKBIO_LINKS_FILE").ok().filter(|s| !s.is_empty()),
            marker_strategy: env::var("LINKBIO_MARKER_STRATEGY")
                .unwrap_or_else(|_| "toggle".to_string()),
            per_profile_keys: env::var("LINKBIO_PER_PROFILE_KEYS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            log_level: env::var("LINKBIO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration and build the core config from it
    fn to_sync_config(&self) -> Result<SyncConfig> {
        if self.profile_id.trim().is_empty() {
            anyhow::bail!("LINKBIO_PROFILE_ID cannot be empty");
        }

        let document_store = match self.store_type.as_str() {
            "rest" => {
                let base_url = self.store_url.clone().filter(|u| !u.is_empty()).context(
                    "LINKBIO_STORE_URL is required when LINKBIO_STORE_TYPE=rest. \
                    Set it via: export LINKBIO_STORE_URL=https://db.example.com/v1",
                )?;
                let api_token = self.api_token.clone().filter(|t| !t.is_empty()).context(
                    "LINKBIO_API_TOKEN is required when LINKBIO_STORE_TYPE=rest. \
                    Set it via: export LINKBIO_API_TOKEN=your_token",
                )?;

                let token_lower = api_token.to_lowercase();
                if token_lower.contains("your_token") || token_lower.contains("replace_me") {
                    anyhow::bail!(
                        "LINKBIO_API_TOKEN appears to be a placeholder. \
                        Use an actual API token for the document API."
                    );
                }

                if base_url.starts_with("http://") {
                    eprintln!(
                        "WARNING: LINKBIO_STORE_URL uses HTTP (not HTTPS). \
                        The API token is sent in clear text."
                    );
                }

                DocumentStoreConfig::Rest {
                    base_url,
                    api_token,
                    timeout_secs: self.timeout_secs.unwrap_or(30),
                    dry_run: self.dry_run,
                }
            }
            "memory" => DocumentStoreConfig::Memory,
            other => anyhow::bail!(
                "LINKBIO_STORE_TYPE '{}' is not supported. Supported types: rest, memory",
                other
            ),
        };

        let local_store = match self.local_store_type.as_str() {
            "file" => {
                let path = self.local_store_path.clone().filter(|p| !p.is_empty()).context(
                    "LINKBIO_LOCAL_STORE_PATH is required when LINKBIO_LOCAL_STORE_TYPE=file. \
                    Set it via: export LINKBIO_LOCAL_STORE_PATH=/var/lib/linkbio/local.json",
                )?;
                LocalStoreConfig::File { path }
            }
            "memory" => LocalStoreConfig::Memory,
            other => anyhow::bail!(
                "LINKBIO_LOCAL_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let strategy: MarkerStrategy = self
            .marker_strategy
            .parse()
            .map_err(|e: Error| anyhow::anyhow!("LINKBIO_MARKER_STRATEGY: {}", e))?;

        parse_level(&self.log_level)?;

        let config = SyncConfig {
            document_store,
            local_store,
            freshness: FreshnessConfig {
                strategy,
                per_profile_keys: self.per_profile_keys,
                ..FreshnessConfig::default()
            },
            ..SyncConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "LINKBIO_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    let sync_config = match config.to_sync_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {:#}", e);
            return SyncExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SyncExitCode::ConfigError.into();
    }

    info!("Starting linkbio-sync for profile {}", config.profile_id);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SyncExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_sync(&config, &sync_config).await {
            Ok(code) => code,
            Err(e) => {
                error!("Sync error: {:#}", e);
                SyncExitCode::RuntimeError
            }
        }
    });

    code.into()
}

/// Run one sync
async fn run_sync(config: &Config, sync_config: &SyncConfig) -> Result<SyncExitCode> {
    let registry = StoreRegistry::with_builtin();

    #[cfg(feature = "rest")]
    {
        debug!("Registering REST document store");
        linkbio_store_rest::register(&registry);
    }

    let (service, mut events) = match ProfileService::from_config(&registry, sync_config).await {
        Ok(built) => built,
        Err(Error::Config(msg)) => {
            error!("Failed to build stores: {}", msg);
            return Ok(SyncExitCode::ConfigError);
        }
        Err(e) => return Err(e.into()),
    };

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    let code = sync_profile(&service, config).await;

    if let Err(e) = service.flush().await {
        warn!("Failed to flush local store: {}", e);
    }

    // Closing the channel ends the logger
    drop(service);
    if let Err(e) = event_logger.await {
        warn!("Event logger stopped abnormally: {}", e);
    }

    code
}

async fn sync_profile(service: &ProfileService, config: &Config) -> Result<SyncExitCode> {
    let profile = service
        .fetch_profile(&config.profile_id)
        .await
        .with_context(|| format!("Failed to fetch profile {}", config.profile_id))?;

    info!(
        "Profile {} is {:?}: {} social and {} custom link(s)",
        profile.id,
        profile.freshness,
        profile.links.social.len(),
        profile.links.custom.len()
    );

    let Some(path) = &config.links_file else {
        info!("No LINKBIO_LINKS_FILE given, nothing to push");
        return Ok(SyncExitCode::Clean);
    };

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read links file {}", path))?;
    let desired: LinkGroups = serde_json::from_str(&raw)
        .with_context(|| format!("Links file {} is not valid JSON", path))?;

    match service.update_links(&config.profile_id, desired).await {
        Ok(report) => {
            info!(
                "Links synced: {} created, {} updated, {} deleted, {} unchanged",
                report.created.len(),
                report.updated.len(),
                report.deleted.len(),
                report.unchanged.len()
            );
            for id in &report.stale_references {
                warn!("Link {} no longer exists remotely and was skipped", id);
            }
            Ok(SyncExitCode::Clean)
        }
        Err(e @ Error::Write { .. }) => {
            error!("{}", e);
            Ok(SyncExitCode::PartialWrite)
        }
        Err(Error::InvalidInput(msg)) => {
            error!("Invalid links file {}: {}", path, msg);
            Ok(SyncExitCode::ConfigError)
        }
        Err(e) => Err(e.into()),
    }
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::OperationFailed {
            kind,
            target,
            error,
        } => warn!("{} {} failed: {}", kind, target, error),
        SyncEvent::MarkerDiverged {
            profile_id, marker, ..
        } => warn!(
            "Local marker for {} diverged from remote marker {}",
            profile_id, marker
        ),
        other => debug!("Event: {:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            store_type: "rest".to_string(),
            store_url: Some("https://db.example.com/v1".to_string()),
            api_token: Some("a1b2c3d4e5f6".to_string()),
            timeout_secs: None,
            dry_run: false,
            local_store_type: "file".to_string(),
            local_store_path: Some("/tmp/linkbio-local.json".to_string()),
            profile_id: "abc".to_string(),
            links_file: None,
            marker_strategy: "toggle".to_string(),
            per_profile_keys: false,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn builds_rest_config() {
        let sync = config().to_sync_config().unwrap();
        assert_eq!(sync.document_store.type_name(), "rest");
        assert_eq!(sync.local_store.type_name(), "file");
        assert_eq!(sync.freshness.strategy, MarkerStrategy::Toggle);
    }

    #[test]
    fn rest_requires_url_and_token() {
        let mut cfg = config();
        cfg.store_url = None;
        assert!(cfg.to_sync_config().is_err());

        let mut cfg = config();
        cfg.api_token = Some(String::new());
        assert!(cfg.to_sync_config().is_err());

        let mut cfg = config();
        cfg.api_token = Some("your_token".to_string());
        assert!(cfg.to_sync_config().is_err());
    }

    #[test]
    fn rejects_unknown_values() {
        let mut cfg = config();
        cfg.marker_strategy = "random".to_string();
        assert!(cfg.to_sync_config().is_err());

        let mut cfg = config();
        cfg.log_level = "loud".to_string();
        assert!(cfg.to_sync_config().is_err());

        let mut cfg = config();
        cfg.store_type = "sql".to_string();
        assert!(cfg.to_sync_config().is_err());
    }

    #[test]
    fn memory_stores_need_no_paths() {
        let mut cfg = config();
        cfg.store_type = "memory".to_string();
        cfg.local_store_type = "memory".to_string();
        cfg.local_store_path = None;
        cfg.marker_strategy = "counter".to_string();

        let sync = cfg.to_sync_config().unwrap();
        assert_eq!(sync.freshness.strategy, MarkerStrategy::Counter);
    }
}
