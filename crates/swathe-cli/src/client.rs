//! Error type, exit codes, and the application context shared by command handlers.

use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;
use swathe_client::HttpBackend;
use swathe_config::ViewConfig;
use swathe_core::{DispatchError, ListController, ListError, Query};
use swathe_telemetry::Metrics;
use url::Url;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ListError> for CliError {
    fn from(err: ListError) -> Self {
        Self::failure(err)
    }
}

impl From<DispatchError> for CliError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::EmptySelection
            | DispatchError::InvalidAction { .. }
            | DispatchError::AddressingConflict { .. } => Self::validation(err.to_string()),
            DispatchError::PartialFailure { ref failed, .. } => {
                let items = failed
                    .iter()
                    .map(|failure| format!("{} ({})", failure.hash, failure.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                Self::failure(anyhow!("{err}: {items}"))
            }
            DispatchError::Network { .. } | DispatchError::Rejected { .. } => Self::failure(err),
        }
    }
}

/// Application context passed to command handlers.
pub(crate) struct AppContext {
    pub(crate) backend: HttpBackend,
    pub(crate) config: ViewConfig,
    pub(crate) metrics: Option<Metrics>,
}

impl AppContext {
    /// Build the HTTP backend and load the view configuration.
    pub(crate) fn new(
        api_url: &Url,
        api_key: Option<&str>,
        timeout: Duration,
        config_path: Option<&Path>,
        with_metrics: bool,
    ) -> CliResult<Self> {
        let backend = HttpBackend::new(api_url.as_str(), api_key, timeout)
            .map_err(|err| CliError::validation(err.to_string()))?;
        let config = config_path
            .map(|path| {
                swathe_config::load_from_path(path)
                    .map_err(|err| CliError::validation(format!("{}: {err}", path.display())))
            })
            .transpose()?
            .unwrap_or_default();
        let metrics = if with_metrics {
            Some(Metrics::new().map_err(CliError::failure)?)
        } else {
            None
        };
        Ok(Self {
            backend,
            config,
            metrics,
        })
    }

    /// Fresh controller for `query` using this context's configuration.
    pub(crate) fn controller(&self, query: Query) -> ListController {
        let mut controller = ListController::new(self.config.clone(), query);
        if let Some(metrics) = &self.metrics {
            controller = controller.with_metrics(metrics.clone());
        }
        controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use swathe_api_models::{ItemFailure, ItemKey};

    fn local_url() -> Url {
        "http://127.0.0.1:7070".parse().expect("valid URL")
    }

    #[test]
    fn exit_codes_split_validation_from_failure() {
        assert_eq!(CliError::validation("bad").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("down")).exit_code(), 3);
        assert_eq!(
            CliError::failure(anyhow!("down")).display_message(),
            "down"
        );
    }

    #[test]
    fn dispatch_errors_map_to_exit_classes() {
        assert_eq!(CliError::from(DispatchError::EmptySelection).exit_code(), 2);
        let conflict = CliError::from(DispatchError::AddressingConflict {
            detail: "changed".to_string(),
        });
        assert_eq!(conflict.exit_code(), 2);
        assert_eq!(conflict.display_message(), "selection changed, please retry");

        let partial = CliError::from(DispatchError::PartialFailure {
            succeeded: 3,
            failed: vec![ItemFailure {
                hash: ItemKey::from("aa"),
                message: "locked".to_string(),
            }],
        });
        assert_eq!(partial.exit_code(), 3);
        assert_eq!(partial.display_message(), "1 of 4 items failed: aa (locked)");
    }

    #[test]
    fn context_rejects_missing_config_file() {
        let dir = std::env::temp_dir().join("swathe-cli-missing-config");
        let err = AppContext::new(
            &local_url(),
            None,
            Duration::from_secs(1),
            Some(&dir.join("absent.json")),
            false,
        )
        .err()
        .expect("missing file must fail");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn context_applies_config_file() {
        let dir = std::env::temp_dir().join(format!("swathe-cli-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("view.json");
        fs::write(&path, r#"{ "pagination": { "page_size": 25 } }"#).expect("write config");

        let ctx = AppContext::new(&local_url(), Some("key"), Duration::from_secs(1), Some(&path), true)
            .expect("context");
        assert_eq!(ctx.config.pagination.page_size, 25);
        assert!(ctx.metrics.is_some());
        assert_eq!(ctx.controller(Query::default()).page_size(), 25);
        fs::remove_dir_all(&dir).ok();
    }
}
