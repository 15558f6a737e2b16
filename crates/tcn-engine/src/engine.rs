//! Engine facade and serialized event loop.
//!
//! [`TcnEngine::start`] spawns one tokio task that owns the
//! [`ConnectionScheduler`] outright. Every transport callback and every
//! timer firing is funneled through that task's channels, so peer state is
//! only ever touched from a single execution context. Connect timeouts are
//! sleep tasks that post back into the loop instead of mutating anything
//! themselves.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use tcn_core::types::TemporaryContactNumber;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scheduler::{ConnectTimeout, ConnectionScheduler};
use crate::transport::{PeerId, Transport, TransportEvent};

/// Supplies the token to advertise and serve over the local characteristic.
pub type TokenGenerator = Box<dyn FnMut() -> TemporaryContactNumber + Send>;

/// Receives every observed token with the peer's estimated distance, if
/// one is known.
pub type TokenObserver = Box<dyn FnMut(TemporaryContactNumber, Option<f64>) + Send>;

/// Receives unrecoverable failures (e.g. the radio stack refusing to start).
pub type CriticalErrorHandler = Box<dyn FnMut(EngineError) + Send>;

/// Application callbacks supplied at engine construction.
///
/// The facade owns the engine outright; these hooks are the only path back
/// to the application.
pub struct EngineHooks {
    pub token_generator: TokenGenerator,
    pub token_observed: TokenObserver,
    pub critical_error: CriticalErrorHandler,
}

/// Handle to a running engine.
pub struct TcnEngine {
    event_tx: mpsc::Sender<TransportEvent>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TcnEngine {
    /// Spawn the engine loop on the current tokio runtime.
    ///
    /// The transport integration must deliver its callbacks through the
    /// sender returned by [`TcnEngine::events`].
    pub fn start(config: EngineConfig, transport: Box<dyn Transport>, hooks: EngineHooks) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_depth);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let scheduler = ConnectionScheduler::new(&config, transport, hooks);
        let task = tokio::spawn(run_loop(scheduler, event_rx, shutdown_rx, connect_timeout));
        Self {
            event_tx,
            shutdown_tx,
            task,
        }
    }

    /// Sender for transport events. Cloneable; safe to hand to radio glue
    /// running on any thread.
    pub fn events(&self) -> mpsc::Sender<TransportEvent> {
        self.event_tx.clone()
    }

    /// Signal shutdown and wait for the loop to flush all peers and stop
    /// the radio.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

async fn run_loop(
    mut scheduler: ConnectionScheduler,
    mut event_rx: mpsc::Receiver<TransportEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    connect_timeout: Duration,
) {
    let (timer_tx, mut timer_rx) = mpsc::channel::<(PeerId, u64)>(64);

    scheduler.start();
    tracing::info!("engine event loop running");

    loop {
        let timers = tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                tracing::info!("shutdown signal received");
                break;
            }

            Some((peer, generation)) = timer_rx.recv() => {
                scheduler.handle_connect_timeout(peer, generation)
            }

            event = event_rx.recv() => {
                match event {
                    Some(event) => scheduler.handle_event(event),
                    None => {
                        tracing::info!("event channel closed, exiting");
                        break;
                    }
                }
            }
        };

        for ConnectTimeout { peer, generation } in timers {
            let tx = timer_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(connect_timeout).await;
                let _ = tx.send((peer, generation)).await;
            });
        }
    }

    scheduler.shutdown();
    tracing::info!("engine stopped");
}
