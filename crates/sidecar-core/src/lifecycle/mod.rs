//! Record lifecycle controller
//!
//! The LifecycleController owns the whole life of the one record this
//! process registers:
//! - Resolving the address to publish
//! - Upserting the record and waiting for it to propagate
//! - Waiting for a termination signal
//! - Deleting the record, waiting for propagation, and holding for the TTL
//!
//! ## State machine
//!
//! ```text
//! Initializing ──address resolved──▶ SettingUp ──upsert in sync──▶ Active
//!                                                                    │
//!                                                            termination signal
//!                                                                    ▼
//!  Terminated ◀──ttl elapsed── Drained ◀──delete in sync── TearingDown
//! ```
//!
//! Any fatal error jumps straight to `Terminated` and is returned tagged
//! with the state it happened in. A failure while setting up never
//! attempts a delete, and a failure while tearing down skips the drain.
//!
//! ## Signal yield points
//!
//! The termination channel is only checked once per second of the
//! pre-setup delay, once right before the upsert is submitted, and then
//! awaited while `Active`. A signal seen at either of the first two points
//! aborts the process without touching DNS. A signal arriving during an
//! in-flight submit or poll is picked up once that call finishes.

use crate::config::SidecarConfig;
use crate::error::{Error, Result};
use crate::propagation::PropagationWaiter;
use crate::record::{ChangeAction, ChangeHandle, ChangeRequest, RecordSpec};
use crate::resolver::AddressResolver;
use crate::termination::{TerminationReceiver, TerminationSignal};
use crate::traits::DnsChangeClient;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Capacity of the lifecycle event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Granularity of the interruptible pre-setup delay
const SETUP_DELAY_TICK: Duration = Duration::from_secs(1);

/// Lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Resolving the address
    Initializing,
    /// Waiting out the setup delay, upserting, and waiting for propagation
    SettingUp,
    /// Record is live, waiting for a termination signal
    Active,
    /// Deleting the record and waiting for propagation
    TearingDown,
    /// Record is gone, waiting for cached copies to expire
    Drained,
    /// Finished, successfully or not
    Terminated,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Initializing => "initializing",
            LifecycleState::SettingUp => "setting up",
            LifecycleState::Active => "active",
            LifecycleState::TearingDown => "tearing down",
            LifecycleState::Drained => "drained",
            LifecycleState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Events emitted by the LifecycleController
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The controller moved to a new state
    StateChanged {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// The address to publish was determined
    AddressResolved { address: IpAddr },

    /// A change was accepted by the provider
    ChangeSubmitted {
        action: ChangeAction,
        handle: ChangeHandle,
    },

    /// A termination signal was observed
    SignalReceived {
        signal: TerminationSignal,
        state: LifecycleState,
    },

    /// The lifecycle failed
    Failed {
        stage: LifecycleState,
        error: String,
    },
}

/// Drives one record through its lifecycle
///
/// ## Lifecycle
///
/// 1. Create with [`LifecycleController::new()`]
/// 2. Start with [`LifecycleController::run()`]
/// 3. `run()` returns once the record is deleted and drained, or on the
///    first fatal error
///
/// The controller is consumed by `run()`; one process runs one controller.
pub struct LifecycleController {
    /// Validated configuration
    config: SidecarConfig,

    /// Address resolution
    resolver: AddressResolver,

    /// Provider change API
    client: Box<dyn DnsChangeClient>,

    /// Propagation polling
    waiter: PropagationWaiter,

    /// Termination notifications
    termination: TerminationReceiver,

    /// Current state
    state: LifecycleState,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LifecycleEvent>,
}

impl LifecycleController {
    /// Create a new controller
    ///
    /// # Parameters
    ///
    /// - `config`: Sidecar configuration, validated here
    /// - `resolver`: Resolver with the sources the address strategy needs
    /// - `client`: Provider change client
    /// - `termination`: Receiving half of the termination channel
    ///
    /// # Returns
    ///
    /// A tuple of (controller, event_receiver) where event_receiver yields lifecycle events
    pub fn new(
        config: SidecarConfig,
        resolver: AddressResolver,
        client: Box<dyn DnsChangeClient>,
        termination: TerminationReceiver,
    ) -> Result<(Self, mpsc::Receiver<LifecycleEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let controller = Self {
            waiter: PropagationWaiter::from_config(&config.propagation),
            config,
            resolver,
            client,
            termination,
            state: LifecycleState::Initializing,
            event_tx: tx,
        };

        Ok((controller, rx))
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Run the lifecycle to completion
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The record was created, deleted, and drained
    /// - `Err(Error::Stage)`: Fatal error, tagged with the state it happened in
    pub async fn run(mut self) -> Result<()> {
        match self.run_internal().await {
            Ok(()) => {
                self.transition(LifecycleState::Terminated);
                info!("Lifecycle complete");
                Ok(())
            }
            Err(e) => {
                let stage = self.state;
                error!("Fatal error while {}: {}", stage, e);
                self.emit_event(LifecycleEvent::Failed {
                    stage,
                    error: e.to_string(),
                });
                self.transition(LifecycleState::Terminated);
                Err(e.at_stage(stage))
            }
        }
    }

    async fn run_internal(&mut self) -> Result<()> {
        let record = self.initialize().await?;
        self.set_up(&record).await?;
        self.wait_for_termination().await;
        self.tear_down(&record).await?;
        self.drain(&record).await;
        Ok(())
    }

    /// Initializing: resolve the address and build the record
    async fn initialize(&mut self) -> Result<RecordSpec> {
        let address = self.resolver.resolve(&self.config.address).await?;
        info!("Resolved address {} via {}", address, self.config.address);
        self.emit_event(LifecycleEvent::AddressResolved { address });

        let record = RecordSpec::new(&self.config.record, address)?;
        self.transition(LifecycleState::SettingUp);
        Ok(record)
    }

    /// SettingUp: optional delay, upsert, wait for propagation
    async fn set_up(&mut self, record: &RecordSpec) -> Result<()> {
        info!("Setting up {}", record);

        let delay_secs = self.config.setup_delay_secs;
        if delay_secs > 0 {
            info!("Waiting {} seconds before setting up DNS", delay_secs);
            for _ in 0..delay_secs {
                self.abort_if_signalled()?;
                tokio::time::sleep(SETUP_DELAY_TICK).await;
            }
            info!("Finished waiting");
        }

        self.abort_if_signalled()?;

        let handle = self.submit(ChangeRequest::upsert(record)).await?;
        self.waiter.await_sync(self.client.as_ref(), &handle).await?;

        info!("Record {} is live", record.name());
        self.transition(LifecycleState::Active);
        Ok(())
    }

    /// Active: block until a termination signal arrives
    async fn wait_for_termination(&mut self) {
        match self.termination.wait().await {
            Some(signal) => {
                info!("Caught signal {}", signal);
                self.emit_event(LifecycleEvent::SignalReceived {
                    signal,
                    state: self.state,
                });
            }
            None => {
                warn!("Termination channel closed without a signal, tearing down");
            }
        }
        self.transition(LifecycleState::TearingDown);
    }

    /// TearingDown: delete, wait for propagation
    async fn tear_down(&mut self, record: &RecordSpec) -> Result<()> {
        info!("Tearing down {}", record);

        let handle = self.submit(ChangeRequest::delete(record)).await?;
        self.waiter.await_sync(self.client.as_ref(), &handle).await?;

        self.transition(LifecycleState::Drained);
        Ok(())
    }

    /// Drained: hold for the TTL so cached answers expire before we exit
    async fn drain(&mut self, record: &RecordSpec) {
        let ttl = record.ttl_secs();
        info!("Waiting for DNS TTL to expire ({} seconds)", ttl);
        tokio::time::sleep(Duration::from_secs(u64::from(ttl))).await;
        info!("DNS TTL expiry finished");
    }

    async fn submit(&mut self, request: ChangeRequest) -> Result<ChangeHandle> {
        let action = request.action;
        let handle = self.client.submit(&request).await?;

        info!(
            "{} request for {} sent to {} (change {})",
            action,
            request.record.name(),
            self.client.provider_name(),
            handle
        );
        self.emit_event(LifecycleEvent::ChangeSubmitted {
            action,
            handle: handle.clone(),
        });
        Ok(handle)
    }

    /// Non-blocking check of the termination channel before anything exists in DNS
    fn abort_if_signalled(&mut self) -> Result<()> {
        if let Some(signal) = self.termination.check() {
            warn!("Caught signal {} before the record was created", signal);
            self.emit_event(LifecycleEvent::SignalReceived {
                signal,
                state: self.state,
            });
            return Err(Error::SignalDuringSetup(signal.to_string()));
        }
        Ok(())
    }

    fn transition(&mut self, to: LifecycleState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug!("Lifecycle {} -> {}", from, to);
        self.state = to;
        self.emit_event(LifecycleEvent::StateChanged { from, to });
    }

    /// Emit a lifecycle event
    fn emit_event(&self, event: LifecycleEvent) {
        if let Err(TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping lifecycle event");
        }
    }
}
