//! In-process broadcast hub
//!
//! Every peer joins the hub and gets a [`HubLink`] (its outbound
//! [`Transport`]) and an [`Inbox`]. A broadcast reaches every inbox except
//! the sender's, as encoded JSON text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use convoy_core::{ConvoyResult, Envelope, Transport, UserId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Shared broadcast medium
#[derive(Debug, Default)]
pub struct Hub {
    peers: Mutex<Vec<(UserId, mpsc::UnboundedSender<String>)>>,
    sent: AtomicU64,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connect a peer
    pub fn join(self: &Arc<Self>, user: UserId) -> (HubLink, Inbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().push((user, tx));
        (
            HubLink {
                hub: Arc::clone(self),
                user,
            },
            Inbox { rx },
        )
    }

    /// Messages delivered to inboxes so far
    pub fn delivered(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    fn broadcast_from(&self, sender: UserId, text: &str) {
        let mut peers = self.peers.lock();
        peers.retain(|(user, tx)| {
            if *user == sender {
                return true;
            }
            match tx.send(text.to_owned()) {
                Ok(()) => {
                    self.sent.fetch_add(1, Ordering::SeqCst);
                    true
                }
                Err(_) => {
                    warn!(peer = %user, "dropping disconnected peer");
                    false
                }
            }
        });
    }
}

/// One peer's outbound side of the hub
#[derive(Clone, Debug)]
pub struct HubLink {
    hub: Arc<Hub>,
    user: UserId,
}

impl HubLink {
    pub fn user(&self) -> UserId {
        self.user
    }
}

impl Transport for HubLink {
    fn broadcast(&self, envelope: &Envelope) -> ConvoyResult<()> {
        let text = envelope.encode()?;
        self.hub.broadcast_from(self.user, &text);
        Ok(())
    }
}

/// One peer's inbound side of the hub
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<String>,
}

impl Inbox {
    /// Everything queued right now
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(text) = self.rx.try_recv() {
            out.push(text);
        }
        out
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}
