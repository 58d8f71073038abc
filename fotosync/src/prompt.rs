use async_trait::async_trait;
use dialoguer::Confirm;

use crate::sync::error::SyncError;

/// Yes/no gate in front of the upload phase.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn ask(&self, message: &str) -> Result<bool, SyncError>;
}

/// Asks on the controlling terminal; anything but an explicit yes declines.
pub struct TerminalPrompt;

#[async_trait]
impl ConfirmationPrompt for TerminalPrompt {
    async fn ask(&self, message: &str) -> Result<bool, SyncError> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(message)
                .default(false)
                .interact()
        })
        .await
        .map_err(|err| SyncError::Prompt(err.to_string()))?
        .map_err(|err| SyncError::Prompt(err.to_string()))
    }
}

/// Approves without asking (`--yes`).
pub struct AutoApprove;

#[async_trait]
impl ConfirmationPrompt for AutoApprove {
    async fn ask(&self, message: &str) -> Result<bool, SyncError> {
        tracing::info!(prompt = message, "auto-approved");
        Ok(true)
    }
}
