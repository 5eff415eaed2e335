use samanvay_core::Severity;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Connected,
    Disconnected,
    IncidentAlert {
        incident_id: i64,
        severity: Severity,
    },
    RoutePlanned {
        convoy_id: i64,
        name: String,
    },
    RouteChanged {
        convoy_id: i64,
        points: usize,
    },
    RouteCleared {
        convoy_id: i64,
    },
    /// The active route now passes through these threat zones.
    RouteExposed {
        convoy_id: i64,
        zone_ids: Vec<i64>,
    },
    /// Transient failure of a backend request or live-channel send.
    RequestFailed {
        action: &'static str,
        message: String,
    },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Bounded, lossy notifier backed by a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<Notification>,
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        match self.sender.try_send(notification) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(?dropped, "notification consumer is behind; dropping notification");
            }
        }
    }
}

#[must_use]
pub fn notification_channel(capacity: usize) -> (ChannelNotifier, mpsc::Receiver<Notification>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ChannelNotifier { sender }, receiver)
}
