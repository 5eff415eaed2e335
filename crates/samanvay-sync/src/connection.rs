use std::sync::Arc;

use samanvay_core::ConnectionState;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::notify::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
    Up,
    Down,
}

/// Two-state machine fed by transport lifecycle callbacks. Each physical
/// transition is reported exactly once; repeated callbacks are no-ops.
pub struct ConnectionMonitor {
    state: watch::Sender<ConnectionState>,
    notifier: Arc<dyn Notifier>,
}

impl ConnectionMonitor {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self { state, notifier }
    }

    pub fn on_transport_up(&mut self) -> Option<ConnectionTransition> {
        self.transition(ConnectionState::Connected)
            .then(|| {
                info!("live channel up");
                self.notifier.notify(Notification::Connected);
                ConnectionTransition::Up
            })
    }

    pub fn on_transport_down(&mut self) -> Option<ConnectionTransition> {
        self.transition(ConnectionState::Disconnected)
            .then(|| {
                info!("live channel down");
                self.notifier.notify(Notification::Disconnected);
                ConnectionTransition::Down
            })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Read-only view for components that gate actions on connectivity.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            receiver: self.state.subscribe(),
        }
    }

    fn transition(&mut self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if !changed {
            debug!(state = ?next, "repeated lifecycle callback ignored");
        }
        changed
    }
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStatus {
    receiver: watch::Receiver<ConnectionState>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.receiver.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use samanvay_core::ConnectionState;

    use super::{ConnectionMonitor, ConnectionTransition};
    use crate::notify::{Notification, Notifier};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Notification>>,
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.seen
                .lock()
                .expect("mutex should be available")
                .push(notification);
        }
    }

    fn monitor() -> (ConnectionMonitor, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (ConnectionMonitor::new(recorder.clone()), recorder)
    }

    #[test]
    fn starts_disconnected() {
        let (monitor, recorder) = monitor();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert!(!monitor.is_connected());
        assert!(recorder.seen.lock().expect("mutex").is_empty());
    }

    #[test]
    fn double_disconnect_notifies_once() {
        let (mut monitor, recorder) = monitor();
        assert_eq!(monitor.on_transport_up(), Some(ConnectionTransition::Up));
        assert_eq!(monitor.on_transport_down(), Some(ConnectionTransition::Down));
        assert_eq!(monitor.on_transport_down(), None);

        assert_eq!(
            *recorder.seen.lock().expect("mutex"),
            vec![Notification::Connected, Notification::Disconnected]
        );
    }

    #[test]
    fn repeated_connect_is_idempotent() {
        let (mut monitor, recorder) = monitor();
        assert!(monitor.on_transport_up().is_some());
        assert!(monitor.on_transport_up().is_none());
        assert_eq!(recorder.seen.lock().expect("mutex").len(), 1);
    }

    #[test]
    fn status_handles_follow_the_monitor() {
        let (mut monitor, _recorder) = monitor();
        let status = monitor.status();
        assert!(!status.is_connected());

        monitor.on_transport_up();
        assert!(status.is_connected());
        monitor.on_transport_down();
        assert_eq!(status.state(), ConnectionState::Disconnected);
    }
}
