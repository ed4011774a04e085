use super::completion::CompletionDispatcher;
use super::strategy::{Strategy, StrategyDeps};
use crate::config::ProcessorConfig;
use crate::domain::ports::CorrelationStoreRef;
use crate::domain::transaction::{Mode, PendingTransaction};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const OVERLOADED_DESCRIPTION: &str = "device processor overloaded";
pub const STOPPED_DESCRIPTION: &str = "device processor stopped";
pub const INTERNAL_DESCRIPTION: &str = "internal error during device communication";
pub const NO_RESPONSE_DESCRIPTION: &str = "authentication device did not respond";

type Job = Arc<PendingTransaction>;

/// What happened to a `start_communication` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a background worker.
    Queued,
    /// Another caller already started this transaction; nothing was done.
    AlreadyStarted,
    /// No worker could take it; the transaction was completed as failed.
    Rejected,
}

/// Runs device communication for backchannel transactions off the caller's
/// task.
///
/// Each transaction is dispatched at most once. Dispatched transactions go
/// through a bounded queue to a fixed pool of workers, each running the
/// configured [`Strategy`].
pub struct DeviceProcessor {
    mode: Mode,
    sender: mpsc::Sender<Job>,
    dispatcher: CompletionDispatcher,
    workers: Vec<JoinHandle<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl DeviceProcessor {
    /// Validates the configuration and spawns the worker pool (plus the
    /// correlation expiry sweeper in async mode).
    pub fn start(config: &ProcessorConfig, deps: StrategyDeps) -> Result<Self> {
        config.validate()?;

        let dispatcher = deps.dispatcher.clone();
        let store = deps.store.clone();
        let strategy = Arc::new(Strategy::for_mode(config.mode, config, deps));
        let (sender, receiver) = mpsc::channel::<Job>(config.queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..config.workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    receiver.clone(),
                    strategy.clone(),
                    dispatcher.clone(),
                ))
            })
            .collect();

        let sweeper = (config.mode == Mode::Async).then(|| {
            spawn_expiry_sweeper(
                store,
                dispatcher.clone(),
                config.correlation_ttl,
                config.sweep_interval,
            )
        });

        tracing::info!(mode = %config.mode, workers = config.workers, "device processor started");
        Ok(Self {
            mode: config.mode,
            sender,
            dispatcher,
            workers,
            sweeper,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Starts device communication for `txn`.
    ///
    /// Only the first call for a transaction instance does anything; later
    /// or concurrent calls return [`Dispatch::AlreadyStarted`]. When the queue
    /// is full the transaction is completed as failed right away. An `Err`
    /// is only returned if that completion itself fails.
    pub async fn start_communication(&self, txn: Arc<PendingTransaction>) -> Result<Dispatch> {
        if !txn.try_start() {
            tracing::debug!(ticket = %txn.ticket(), "device communication already started");
            return Ok(Dispatch::AlreadyStarted);
        }

        let (txn, description) = match self.sender.try_send(txn) {
            Ok(()) => return Ok(Dispatch::Queued),
            Err(TrySendError::Full(txn)) => (txn, OVERLOADED_DESCRIPTION),
            Err(TrySendError::Closed(txn)) => (txn, STOPPED_DESCRIPTION),
        };

        tracing::warn!(ticket = %txn.ticket(), reason = description, "rejecting backchannel transaction");
        if txn.try_settle() {
            self.dispatcher.fail(txn.context(), description).await?;
        }
        Ok(Dispatch::Rejected)
    }

    /// Stops accepting work and waits for queued transactions to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Some(sweeper) = self.sweeper {
            sweeper.abort();
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "device worker terminated abnormally");
            }
        }
        tracing::info!("device processor stopped");
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    strategy: Arc<Strategy>,
    dispatcher: CompletionDispatcher,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(txn) = job else {
            break;
        };
        tracing::debug!(worker, ticket = %txn.ticket(), mode = %strategy.mode(), "processing transaction");
        run_strategy(&strategy, &dispatcher, txn).await;
    }
    tracing::debug!(worker, "device worker exiting");
}

/// Runs one strategy in its own task so a panic cannot take the worker down,
/// and forces a failed completion if the transaction was left unsettled.
async fn run_strategy(strategy: &Arc<Strategy>, dispatcher: &CompletionDispatcher, txn: Job) {
    let task = {
        let strategy = strategy.clone();
        let txn = txn.clone();
        tokio::spawn(async move { strategy.process(&txn).await })
    };

    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(ticket = %txn.ticket(), error = %e, "transaction completion failed");
        }
        Err(e) => {
            tracing::error!(ticket = %txn.ticket(), error = %e, "device strategy aborted");
            if txn.try_settle()
                && let Err(e) = dispatcher.fail(txn.context(), INTERNAL_DESCRIPTION).await
            {
                tracing::error!(ticket = %txn.ticket(), error = %e, "forced failure completion failed");
            }
        }
    }
}

/// Periodically fails and evicts correlation entries the device never
/// called back for.
pub fn spawn_expiry_sweeper(
    store: CorrelationStoreRef,
    dispatcher: CompletionDispatcher,
    ttl: Duration,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = match store.purge_expired(ttl).await {
                Ok(expired) => expired,
                Err(e) => {
                    tracing::error!(error = %e, "correlation sweep failed");
                    continue;
                }
            };
            for (request_id, context) in expired {
                tracing::warn!(ticket = %context.ticket, %request_id, "correlation entry expired");
                if let Err(e) = dispatcher.fail(&context, NO_RESPONSE_DESCRIPTION).await {
                    tracing::error!(ticket = %context.ticket, error = %e, "expiry completion failed");
                }
            }
        }
    })
}
