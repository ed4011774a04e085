//! The three ways of reaching the authentication device.
//!
//! A [`Strategy`] is picked once per processor from the configured [`Mode`].
//! Every variant guarantees the transaction is settled: either completed
//! (Sync, Poll, and Async on error) or handed to the correlation store
//! (Async on acknowledgement).

use super::completion::CompletionDispatcher;
use crate::config::ProcessorConfig;
use crate::domain::device::{AsyncAuthenticationRequest, PollStatus, SyncAuthenticationRequest};
use crate::domain::ports::{CorrelationStoreRef, DeviceClientRef};
use crate::domain::transaction::{DeviceResult, Mode, PendingTransaction};
use crate::error::{ProcessorError, Result};
use std::time::Duration;
use tokio::time::Instant;

pub const COMMUNICATION_FAILED: &str = "authentication device communication failed";

/// Collaborators shared by all strategies.
#[derive(Clone)]
pub struct StrategyDeps {
    pub device: DeviceClientRef,
    pub store: CorrelationStoreRef,
    pub dispatcher: CompletionDispatcher,
}

pub enum Strategy {
    Sync(SyncStrategy),
    Async(AsyncStrategy),
    Poll(PollStrategy),
}

impl Strategy {
    pub fn for_mode(mode: Mode, config: &ProcessorConfig, deps: StrategyDeps) -> Self {
        match mode {
            Mode::Sync => Strategy::Sync(SyncStrategy {
                auth_timeout: config.auth_timeout,
                deps,
            }),
            Mode::Async => Strategy::Async(AsyncStrategy { deps }),
            Mode::Poll => Strategy::Poll(PollStrategy {
                poll_interval: config.poll_interval,
                max_poll_wait: config.max_poll_wait,
                deps,
            }),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Strategy::Sync(_) => Mode::Sync,
            Strategy::Async(_) => Mode::Async,
            Strategy::Poll(_) => Mode::Poll,
        }
    }

    /// Runs device communication for one transaction.
    ///
    /// Device failures never surface here; they become `Failed` completions.
    /// An `Err` means the protocol engine (or store) itself failed.
    pub async fn process(&self, txn: &PendingTransaction) -> Result<()> {
        match self {
            Strategy::Sync(strategy) => strategy.process(txn).await,
            Strategy::Async(strategy) => strategy.process(txn).await,
            Strategy::Poll(strategy) => strategy.process(txn).await,
        }
    }
}

pub struct SyncStrategy {
    auth_timeout: Duration,
    deps: StrategyDeps,
}

impl SyncStrategy {
    async fn process(&self, txn: &PendingTransaction) -> Result<()> {
        let ctx = txn.context();
        let request = SyncAuthenticationRequest {
            user: ctx.user_subject.clone(),
            message: ctx.device_message(),
            timeout: self.auth_timeout.as_secs(),
        };

        let outcome = match self.deps.device.sync_authenticate(&request).await {
            Ok(response) => parse_result(response.result.as_deref()),
            Err(e) => Err(e),
        };
        settle(&self.deps.dispatcher, txn, outcome).await
    }
}

pub struct AsyncStrategy {
    deps: StrategyDeps,
}

impl AsyncStrategy {
    async fn process(&self, txn: &PendingTransaction) -> Result<()> {
        let ctx = txn.context();
        let request = AsyncAuthenticationRequest {
            user: ctx.user_subject.clone(),
            message: ctx.device_message(),
        };

        let ack = match self.deps.device.async_authenticate(&request).await {
            Ok(ack) => ack,
            Err(e) => return settle(&self.deps.dispatcher, txn, Err(e)).await,
        };
        let Some(request_id) = ack.request_id() else {
            let err = ProcessorError::DeviceProtocol("acknowledgement carried no request id".into());
            return settle(&self.deps.dispatcher, txn, Err(err)).await;
        };

        if !txn.try_settle() {
            tracing::warn!(ticket = %ctx.ticket, "transaction already settled, not storing correlation");
            return Ok(());
        }
        match self.deps.store.put(request_id.to_string(), ctx.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(ticket = %ctx.ticket, request_id, "device reused a pending request id");
                return self.deps.dispatcher.fail(ctx, COMMUNICATION_FAILED).await;
            }
            Err(e) => {
                tracing::error!(ticket = %ctx.ticket, request_id, error = %e, "failed to store correlation entry");
                return self.deps.dispatcher.fail(ctx, COMMUNICATION_FAILED).await;
            }
        }

        tracing::info!(ticket = %ctx.ticket, request_id, "awaiting device callback");
        Ok(())
    }
}

pub struct PollStrategy {
    poll_interval: Duration,
    max_poll_wait: Duration,
    deps: StrategyDeps,
}

impl PollStrategy {
    async fn process(&self, txn: &PendingTransaction) -> Result<()> {
        let ctx = txn.context();
        let request = AsyncAuthenticationRequest {
            user: ctx.user_subject.clone(),
            message: ctx.device_message(),
        };

        let ack = match self.deps.device.poll_authenticate(&request).await {
            Ok(ack) => ack,
            Err(e) => return settle(&self.deps.dispatcher, txn, Err(e)).await,
        };
        let Some(request_id) = ack.request_id() else {
            let err = ProcessorError::DeviceProtocol("acknowledgement carried no request id".into());
            return settle(&self.deps.dispatcher, txn, Err(err)).await;
        };

        let outcome = self.wait_for_result(request_id).await;
        settle(&self.deps.dispatcher, txn, outcome).await
    }

    async fn wait_for_result(&self, request_id: &str) -> Result<DeviceResult> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if started.elapsed() > self.max_poll_wait {
                tracing::info!(request_id, "gave up polling device");
                return Ok(DeviceResult::Timeout);
            }

            let response = self.deps.device.poll_result(request_id).await?;
            match response.status {
                PollStatus::Pending => continue,
                PollStatus::Complete => return parse_result(response.result.as_deref()),
                PollStatus::Timeout => return Ok(DeviceResult::Timeout),
            }
        }
    }
}

fn parse_result(raw: Option<&str>) -> Result<DeviceResult> {
    match raw.filter(|r| !r.is_empty()) {
        Some(raw) => raw.parse(),
        None => Err(ProcessorError::DeviceProtocol(
            "device response carried no result".into(),
        )),
    }
}

/// Completes the transaction from a device outcome, provided nobody else
/// has settled it yet.
async fn settle(
    dispatcher: &CompletionDispatcher,
    txn: &PendingTransaction,
    outcome: Result<DeviceResult>,
) -> Result<()> {
    let ctx = txn.context();
    if !txn.try_settle() {
        tracing::warn!(ticket = %ctx.ticket, "transaction already settled, dropping device outcome");
        return Ok(());
    }
    match outcome {
        Ok(result) => {
            tracing::info!(ticket = %ctx.ticket, ?result, "device answered");
            dispatcher.complete_with(ctx, result).await
        }
        Err(e) => {
            tracing::warn!(ticket = %ctx.ticket, error = %e, "device communication failed");
            dispatcher.fail(ctx, COMMUNICATION_FAILED).await
        }
    }
}
