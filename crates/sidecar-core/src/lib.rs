// # sidecar-core
//
// Core library for the DNS registration sidecar.
//
// The sidecar publishes its host's address as one weighted DNS record when
// it starts and removes that record when it is told to stop, so the address
// is discoverable for exactly as long as the workload next to it is running.
//
// ## Architecture Overview
//
// - **AddressSource**: Trait for metadata services that report the host address
// - **AddressResolver**: Picks the address to publish from the configured strategy
// - **DnsChangeClient**: Trait for submitting record changes and polling their status
// - **PropagationWaiter**: Polls a submitted change until the provider reports it in sync
// - **LifecycleController**: The state machine sequencing setup, signal wait, teardown and drain
//
// ## Design Principles
//
// 1. **One record per process**: no reconciliation, no persistence across restarts
// 2. **Fail loudly**: every unrecoverable error ends the process with a nonzero code
// 3. **Synchronous teardown**: the delete is confirmed before the process exits
// 4. **Library-First**: the binary only wires configuration, logging and signals

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod propagation;
pub mod record;
pub mod resolver;
pub mod termination;
pub mod traits;

// Re-export core types for convenience
pub use config::{AddressSourceKind, AddressStrategy, FailureCounting, PropagationConfig, RecordConfig, SidecarConfig};
pub use error::{Error, Result};
pub use lifecycle::{LifecycleController, LifecycleEvent, LifecycleState};
pub use propagation::PropagationWaiter;
pub use record::{ChangeAction, ChangeHandle, ChangeRequest, PropagationStatus, RecordSpec, RecordType};
pub use resolver::AddressResolver;
pub use termination::{TerminationReceiver, TerminationSender, TerminationSignal};
pub use traits::{AddressSource, DnsChangeClient};
