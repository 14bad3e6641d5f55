use formpane_spec::ValidationError;
use thiserror::Error;

use crate::catalog::FormId;

/// Failure reported by the workbook host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("sheet `{0}` does not exist")]
    MissingSheet(String),
    #[error("defined name `{0}` does not exist")]
    MissingName(String),
    #[error("table `{0}` does not exist")]
    MissingTable(String),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("request was read before its batch was synced")]
    NotSynced,
    #[error("unknown or already consumed request ticket")]
    UnknownTicket,
    #[error("workbook sync failed: {0}")]
    Sync(String),
    #[error("{0}")]
    Other(String),
}

/// Failure to retrieve a form template from the asset store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to fetch `{resource}`: {message}")]
pub struct FetchError {
    pub resource: String,
    pub message: String,
    /// Transport status code, when the source has one.
    pub status: Option<u16>,
}

impl FetchError {
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Error)]
pub enum FormpaneError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("form `{form}` could not be loaded")]
    Fetch {
        form: FormId,
        #[source]
        source: FetchError,
    },
    #[error("manifest rejected")]
    Manifest(#[from] ValidationError),
    #[error("no `{0}` form is declared")]
    MissingDefaultForm(&'static str),
    #[error("form `{0}` is not declared")]
    UnknownForm(String),
    #[error("field `{field}` is not bound on form `{form}`")]
    UnboundField { form: FormId, field: String },
    #[error("form `{form}` does not offer sheet `{sheet}`")]
    SheetNotOffered { form: FormId, sheet: String },
}

impl FormpaneError {
    /// Messages of this error and each of its sources, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut out = vec![self.to_string()];
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            out.push(err.to_string());
            source = err.source();
        }
        out
    }
}
