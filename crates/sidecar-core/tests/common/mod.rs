//! Test doubles and common utilities for lifecycle contract tests
//!
//! The scripted client replays provider replies and records every call so
//! tests can assert exactly which changes were submitted and polled.

#![allow(dead_code)]

use sidecar_core::error::{Error, Result};
use sidecar_core::{
    AddressResolver, AddressSource, AddressSourceKind, AddressStrategy, ChangeAction, ChangeHandle,
    ChangeRequest, DnsChangeClient, LifecycleEvent, LifecycleState, PropagationStatus, RecordConfig,
    SidecarConfig, TerminationSender, TerminationSignal,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One scripted reply to a status query
#[derive(Debug, Clone, Copy)]
pub enum Poll {
    Pending,
    InSync,
    Fail,
}

#[derive(Default)]
struct Script {
    /// Replies to submit(), in order; `Err` carries the rejection message
    submit_replies: VecDeque<std::result::Result<String, String>>,
    /// Replies to poll() per handle; an exhausted script answers InSync
    poll_replies: HashMap<String, VecDeque<Poll>>,
    /// Every submitted request
    submissions: Vec<ChangeRequest>,
    /// Every polled handle
    polls: Vec<String>,
    /// Signal to deliver on the first poll of a handle
    signal_on_poll: Option<(String, TerminationSender, TerminationSignal)>,
}

/// A DnsChangeClient that replays scripted replies
///
/// Clones share the same script and call log.
#[derive(Clone, Default)]
pub struct ScriptedChangeClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChangeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the next submission with the given change id
    pub fn accept(self, handle: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .submit_replies
            .push_back(Ok(handle.to_string()));
        self
    }

    /// Reject the next submission
    pub fn reject(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .submit_replies
            .push_back(Err(message.to_string()));
        self
    }

    /// Script the status replies for a handle
    pub fn polls(self, handle: &str, replies: &[Poll]) -> Self {
        self.script
            .lock()
            .unwrap()
            .poll_replies
            .insert(handle.to_string(), replies.iter().copied().collect());
        self
    }

    /// Deliver a termination signal when `handle` is first polled
    pub fn signal_on_poll(self, handle: &str, tx: TerminationSender, signal: TerminationSignal) -> Self {
        self.script.lock().unwrap().signal_on_poll = Some((handle.to_string(), tx, signal));
        self
    }

    /// All submitted requests
    pub fn submissions(&self) -> Vec<ChangeRequest> {
        self.script.lock().unwrap().submissions.clone()
    }

    /// Actions of all submitted requests
    pub fn submitted_actions(&self) -> Vec<ChangeAction> {
        self.submissions().iter().map(|r| r.action).collect()
    }

    /// Number of status queries for a handle
    pub fn poll_count(&self, handle: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .polls
            .iter()
            .filter(|h| h.as_str() == handle)
            .count()
    }
}

#[async_trait::async_trait]
impl DnsChangeClient for ScriptedChangeClient {
    async fn submit(&self, request: &ChangeRequest) -> Result<ChangeHandle> {
        let mut script = self.script.lock().unwrap();
        script.submissions.push(request.clone());

        match script.submit_replies.pop_front() {
            Some(Ok(id)) => Ok(ChangeHandle::new(id)),
            Some(Err(message)) => Err(Error::submission("scripted", message)),
            None => Err(Error::submission("scripted", "unexpected submission")),
        }
    }

    async fn poll(&self, handle: &ChangeHandle) -> Result<PropagationStatus> {
        let mut script = self.script.lock().unwrap();
        script.polls.push(handle.id().to_string());

        let fire = matches!(&script.signal_on_poll, Some((h, _, _)) if h == handle.id());
        if fire && let Some((_, tx, signal)) = script.signal_on_poll.take() {
            tx.notify(signal);
        }

        let reply = script
            .poll_replies
            .get_mut(handle.id())
            .and_then(|replies| replies.pop_front())
            .unwrap_or(Poll::InSync);

        match reply {
            Poll::Pending => Ok(PropagationStatus::Pending),
            Poll::InSync => Ok(PropagationStatus::InSync),
            Poll::Fail => Err(Error::poll("scripted", "Throttling: Rate exceeded")),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// An address source that always answers the same way
pub struct StaticAddressSource {
    kind: AddressSourceKind,
    reply: std::result::Result<String, String>,
}

impl StaticAddressSource {
    pub fn answering(kind: AddressSourceKind, address: &str) -> Self {
        Self {
            kind,
            reply: Ok(address.to_string()),
        }
    }

    pub fn failing(kind: AddressSourceKind, message: &str) -> Self {
        Self {
            kind,
            reply: Err(message.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl AddressSource for StaticAddressSource {
    async fn fetch(&self, _strategy: &AddressStrategy) -> Result<String> {
        self.reply.clone().map_err(Error::http)
    }

    fn kind(&self) -> AddressSourceKind {
        self.kind
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Configuration for svc.example.com in zone Z1 with an explicit address
pub fn explicit_config(address: &str, ttl_secs: u32) -> SidecarConfig {
    SidecarConfig::new(
        RecordConfig::new("svc.example.com", "Z1", ttl_secs),
        AddressStrategy::Explicit {
            value: address.to_string(),
        },
    )
}

/// Drain all events currently buffered in the channel
pub fn drain_events(rx: &mut mpsc::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// The sequence of states entered, in order
pub fn states_entered(events: &[LifecycleEvent]) -> Vec<LifecycleState> {
    events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::StateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

/// Wait until the controller reports entering `state`
pub async fn wait_for_state(rx: &mut mpsc::Receiver<LifecycleEvent>, state: LifecycleState) -> Vec<LifecycleEvent> {
    let mut seen = Vec::new();
    while let Some(event) = rx.recv().await {
        let reached = matches!(event, LifecycleEvent::StateChanged { to, .. } if to == state);
        seen.push(event);
        if reached {
            return seen;
        }
    }
    panic!("event channel closed before reaching {:?}", state);
}

/// A resolver with no metadata sources
pub fn explicit_resolver() -> AddressResolver {
    AddressResolver::new()
}
