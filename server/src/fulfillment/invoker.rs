//! Fulfillment Invokers
//!
//! The automation that actually delivers Stars is an external program. The
//! core only sees a blocking call that answers "delivered or not".

use std::process::Command;
use std::sync::Arc;

use tracing::{info, warn};

use super::types::{FulfillmentError, StarsAmount};
use crate::config::Config;

/// Blocking call-out to the delivery automation.
///
/// Implementations may block for tens of seconds; callers must run them off
/// the async executor (see [`super::FulfillmentPool`]).
pub trait FulfillmentInvoker: Send + Sync {
    fn attempt_fulfillment(
        &self,
        quantity: StarsAmount,
        recipient: &str,
    ) -> Result<bool, FulfillmentError>;
}

/// Runs `<program> <quantity> <recipient>`; exit status 0 means delivered.
///
/// Automation credentials are passed through the environment so they never
/// show up in process listings.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    program: String,
    username: Option<String>,
    password: Option<String>,
}

impl CommandInvoker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            username: None,
            password: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl FulfillmentInvoker for CommandInvoker {
    fn attempt_fulfillment(
        &self,
        quantity: StarsAmount,
        recipient: &str,
    ) -> Result<bool, FulfillmentError> {
        let mut command = Command::new(&self.program);
        command.arg(quantity.to_string()).arg(recipient);
        if let Some(username) = &self.username {
            command.env("FRAGMENTS_USERNAME", username);
        }
        if let Some(password) = &self.password {
            command.env("FRAGMENTS_PASSWORD", password);
        }

        let output = command.output()?;
        if output.status.success() {
            info!(quantity = %quantity, recipient, "Automation reported delivery");
            Ok(true)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let preview: String = stderr.chars().take(500).collect();
            warn!(
                quantity = %quantity,
                recipient,
                status = %output.status,
                stderr = %preview,
                "Automation reported failure"
            );
            Ok(false)
        }
    }
}

/// Stand-in used when no automation is configured. Every attempt fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredInvoker;

impl FulfillmentInvoker for UnconfiguredInvoker {
    fn attempt_fulfillment(
        &self,
        quantity: StarsAmount,
        recipient: &str,
    ) -> Result<bool, FulfillmentError> {
        warn!(
            quantity = %quantity,
            recipient,
            "Fulfillment requested but no automation is configured"
        );
        Ok(false)
    }
}

/// Pick the invoker for this deployment.
pub fn from_config(config: &Config) -> Arc<dyn FulfillmentInvoker> {
    let Some(program) = config.fulfillment_command.clone() else {
        warn!("FULFILLMENT_COMMAND is not set. Stars delivery will not work.");
        return Arc::new(UnconfiguredInvoker);
    };

    let (Some(username), Some(password)) =
        (&config.fragments_username, &config.fragments_password)
    else {
        warn!(
            "Fragments credentials (FRAGMENTS_USERNAME or FRAGMENTS_PASSWORD) are not set. \
             Fragments automation will not work."
        );
        return Arc::new(UnconfiguredInvoker);
    };

    Arc::new(CommandInvoker::new(program).with_credentials(username.clone(), password.clone()))
}
