use crate::error::ProcessorError;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything needed to resume a backchannel transaction once the device
/// has answered.
///
/// Created when the protocol engine asks for device communication and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    /// Opaque handle issued by the protocol engine.
    pub ticket: String,
    /// Subject of the user being authenticated.
    pub user_subject: String,
    /// Requested ACRs, in request order.
    pub requested_acrs: Vec<String>,
    /// Requested scope names, in request order.
    pub requested_scopes: Vec<String>,
    /// Requested claim names, in request order.
    pub requested_claims: Vec<String>,
    /// Message shown on the authentication device, if the client sent one.
    pub binding_message: Option<String>,
}

impl TransactionContext {
    pub fn new(ticket: impl Into<String>, user_subject: impl Into<String>) -> Self {
        Self {
            ticket: ticket.into(),
            user_subject: user_subject.into(),
            requested_acrs: Vec::new(),
            requested_scopes: Vec::new(),
            requested_claims: Vec::new(),
            binding_message: None,
        }
    }

    pub fn with_acrs<I, S>(mut self, acrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_acrs = acrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_claims<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested_claims = claims.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_binding_message(mut self, message: impl Into<String>) -> Self {
        self.binding_message = Some(message.into());
        self
    }

    /// The message displayed to the user on the device: the binding message
    /// followed by the comma-joined scope names.
    pub fn device_message(&self) -> String {
        let scopes = self.requested_scopes.join(",");
        match self.binding_message.as_deref() {
            Some(binding) if !binding.is_empty() && !scopes.is_empty() => {
                format!("{binding}\n{scopes}")
            }
            Some(binding) if !binding.is_empty() => binding.to_string(),
            _ => scopes,
        }
    }
}

/// A single transaction instance handed over by the protocol engine.
///
/// `started` guards dispatch; `settled` is set exactly once, when the
/// transaction is either completed or handed off to the correlation store.
#[derive(Debug)]
pub struct PendingTransaction {
    context: TransactionContext,
    started: AtomicBool,
    settled: AtomicBool,
}

impl PendingTransaction {
    pub fn new(context: TransactionContext) -> Self {
        Self {
            context,
            started: AtomicBool::new(false),
            settled: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    pub fn ticket(&self) -> &str {
        &self.context.ticket
    }

    /// Returns `true` for the first caller only.
    pub fn try_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Claims the right to complete (or hand off) the transaction.
    /// Returns `true` for the first caller only.
    pub fn try_settle(&self) -> bool {
        self.settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

/// How the authentication device is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sync,
    Async,
    Poll,
}

impl FromStr for Mode {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sync" => Ok(Mode::Sync),
            "async" => Ok(Mode::Async),
            "poll" => Ok(Mode::Poll),
            other => Err(ProcessorError::Config(format!(
                "unknown device communication mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Sync => "sync",
            Mode::Async => "async",
            Mode::Poll => "poll",
        };
        f.write_str(name)
    }
}

/// Outcome reported by the authentication device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceResult {
    Allow,
    Deny,
    Timeout,
}

impl FromStr for DeviceResult {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(DeviceResult::Allow),
            "deny" => Ok(DeviceResult::Deny),
            "timeout" => Ok(DeviceResult::Timeout),
            other => Err(ProcessorError::DeviceProtocol(format!(
                "unrecognized device result '{other}'"
            ))),
        }
    }
}

/// Result handed to the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionResult {
    Authorized,
    AccessDenied,
    Failed,
}

/// Arguments of the protocol engine's finalize-transaction operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub ticket: String,
    pub result: CompletionResult,
    pub user_subject: String,
    /// Epoch seconds; 0 when the user was not authenticated.
    pub authenticated_at: i64,
    pub acr: Option<String>,
    pub error_description: Option<String>,
    pub claims: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("sync".parse::<Mode>().unwrap(), Mode::Sync);
        assert_eq!("ASYNC".parse::<Mode>().unwrap(), Mode::Async);
        assert_eq!(" poll ".parse::<Mode>().unwrap(), Mode::Poll);
        assert!(matches!(
            "push".parse::<Mode>(),
            Err(ProcessorError::Config(_))
        ));
    }

    #[test]
    fn test_device_result_parsing() {
        assert_eq!("allow".parse::<DeviceResult>().unwrap(), DeviceResult::Allow);
        assert_eq!("deny".parse::<DeviceResult>().unwrap(), DeviceResult::Deny);
        assert_eq!(
            "timeout".parse::<DeviceResult>().unwrap(),
            DeviceResult::Timeout
        );
        assert!("".parse::<DeviceResult>().is_err());
        assert!("Allow".parse::<DeviceResult>().is_err());
    }

    #[test]
    fn test_device_message_rendering() {
        let ctx = TransactionContext::new("T1", "alice")
            .with_scopes(["openid", "email"])
            .with_binding_message("Pay 10 EUR");
        assert_eq!(ctx.device_message(), "Pay 10 EUR\nopenid,email");

        let no_binding = TransactionContext::new("T2", "alice").with_scopes(["openid"]);
        assert_eq!(no_binding.device_message(), "openid");

        let no_scopes = TransactionContext::new("T3", "alice").with_binding_message("Hi");
        assert_eq!(no_scopes.device_message(), "Hi");
    }

    #[test]
    fn test_pending_transaction_flags_are_one_shot() {
        let txn = PendingTransaction::new(TransactionContext::new("T1", "alice"));
        assert!(!txn.is_started());
        assert!(txn.try_start());
        assert!(!txn.try_start());
        assert!(txn.is_started());

        assert!(txn.try_settle());
        assert!(!txn.try_settle());
        assert!(txn.is_settled());
    }
}
