//! Application commands
//!
//! Each command maps one user action onto the services in [`AppContext`]
//! and converts failures into a [`CommandError`] carrying the message the
//! user should see.

use std::path::Path;

use cvforge_core::{JobError, JobObserver};
use cvforge_domain::{
    JobStatusReport, RewriteRequest, SessionState, StageDefinition, UploadReceipt,
};
use cvforge_infra::{default_rewrite_stages, EnhancedError, FileUpload, UploadProgress};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::context::AppContext;

/// Failure of a command, with the message meant for display
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Api(#[from] EnhancedError),

    #[error("{}", .0.user_message())]
    Job(#[from] JobError<EnhancedError>),

    #[error("{0}")]
    Domain(#[from] cvforge_domain::CvForgeError),

    #[error("{0}")]
    Input(String),
}

impl CommandError {
    /// Message to show the user in place of transport details.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message.clone(),
            Self::Job(err) => err.user_message(),
            Self::Domain(err) => err.to_string(),
            Self::Input(message) => message.clone(),
        }
    }
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub authenticated: bool,
}

pub fn session_status(ctx: &AppContext) -> SessionStatus {
    let state = ctx.session_state();
    SessionStatus { state, authenticated: state.is_authenticated() }
}

#[instrument(skip(ctx, password))]
pub async fn login(ctx: &AppContext, username: &str, password: &str) -> CommandResult<SessionStatus> {
    ctx.session.login(username, password).await?;
    Ok(session_status(ctx))
}

pub async fn logout(ctx: &AppContext) -> CommandResult<SessionStatus> {
    ctx.session.logout().await?;
    Ok(session_status(ctx))
}

/// Upload a CV file from disk.
#[instrument(skip(ctx, on_progress), fields(path = %path.display()))]
pub async fn upload_cv(
    ctx: &AppContext,
    path: &Path,
    on_progress: impl Fn(u8) + Send + Sync + 'static,
) -> CommandResult<UploadReceipt> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| CommandError::Input(format!("Cannot read {}: {err}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CommandError::Input(format!("{} is not a file", path.display())))?;

    let mut upload = FileUpload::new(file_name, bytes);
    if let Some(mime) = mime_for(path) {
        upload = upload.with_mime_type(mime);
    }

    let receipt = ctx.cv.upload_cv(upload, &[], Some(UploadProgress::new(on_progress))).await?;
    info!(id = ?receipt.id, "Upload finished");
    Ok(receipt)
}

/// Run a rewrite job over a parsed CV.
pub async fn rewrite_cv(
    ctx: &AppContext,
    request: &RewriteRequest,
    observer: Option<&dyn JobObserver>,
    cancel: &CancellationToken,
) -> CommandResult<JobStatusReport> {
    let stages: Vec<StageDefinition> = default_rewrite_stages();
    Ok(ctx.cv.rewrite_cv(request, &stages, observer, cancel).await?)
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some("application/pdf"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "doc" => Some("application/msword"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}
