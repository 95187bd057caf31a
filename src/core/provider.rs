use crate::config::{self, Config, ProviderOverrides};
use crate::connection::client::{ConnectionError, MongoConnection};
use crate::shared::logging;
use crate::shared::security::redact_url;
use crate::user::batch::{BatchReconciler, BatchResult};
use crate::user::model::{UserFile, UserSpec};
use crate::user::reconciler::UserReconciler;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TfMongoError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Resolve a possibly relative path against the current directory
fn absolute_path(path: &str) -> anyhow::Result<PathBuf> {
    let path_buf = PathBuf::from(path);
    if path_buf.is_absolute() {
        Ok(path_buf)
    } else {
        Ok(std::env::current_dir()?.join(path_buf))
    }
}

/// Load configuration with the usual precedence: flags, file, environment
pub fn load_config(
    config_path: Option<String>,
    overrides: &ProviderOverrides,
) -> anyhow::Result<Config> {
    let mut config = match config_path {
        Some(path) => {
            let abs_path = absolute_path(&path)?;
            logging::info(&format!("Using config file: {}", abs_path.display()));
            config::init_from_path(&abs_path.to_string_lossy())?
        }
        None => {
            logging::info("No config path provided, using default configuration");
            config::init_default()?
        }
    };

    config.provider.apply_overrides(overrides);
    config.provider.apply_env_defaults();
    Ok(config)
}

/// Read a JSON file holding one user declaration or a list of them
pub fn load_user_specs(path: &Path) -> anyhow::Result<Vec<UserSpec>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let file: UserFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    let specs = file.into_specs();
    logging::debug(&format!(
        "Loaded {} user declarations from {}",
        specs.len(),
        path.display()
    ));
    Ok(specs)
}

/// A configured provider: one shared connection, one reconciler on top of it
pub struct TfMongo {
    batch: BatchReconciler<MongoConnection>,
}

impl TfMongo {
    pub async fn new(
        config_path: Option<String>,
        overrides: ProviderOverrides,
    ) -> Result<Self, TfMongoError> {
        let config = load_config(config_path, &overrides)?;
        logging::info(&format!(
            "Configuring provider for {}",
            redact_url(&config.provider.url)
        ));

        let connection = MongoConnection::connect(&config.provider).await?;
        let reconciler = UserReconciler::new(Arc::new(connection));
        let batch = BatchReconciler::new(reconciler, config.apply.max_concurrent);

        logging::info("TfMongo initialized successfully");
        Ok(Self { batch })
    }

    pub fn reconciler(&self) -> &UserReconciler<MongoConnection> {
        self.batch.reconciler()
    }

    /// Override the configured concurrency for subsequent batches
    pub fn set_max_concurrent(&mut self, max_concurrent: usize) {
        let reconciler = self.batch.reconciler().clone();
        self.batch = BatchReconciler::new(reconciler, max_concurrent);
    }

    pub async fn apply(&self, specs: &[UserSpec]) -> Vec<BatchResult> {
        self.batch.apply(specs).await
    }

    pub async fn destroy(&self, specs: &[UserSpec]) -> Vec<BatchResult> {
        self.batch.destroy(specs).await
    }
}
