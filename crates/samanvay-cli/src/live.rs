use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use samanvay::SamanvayError;
use samanvay_config::SamanvayConfig;
use samanvay_core::{ConnectionState, Coordinate};
use samanvay_io::IoError;
use samanvay_server::BackendClient;
use samanvay_sync::{
    notification_channel, LiveHub, Notification, OperatorConfirmation, SessionExit,
    SessionHandle, SessionServices, SituationSession,
};
use samanvay_transport::{spawn_live_channel, LiveChannel, SupervisorTask};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::CliError;

const NOTIFICATION_BUFFER: usize = 64;

/// A running session fed by the live channel.
pub(crate) struct LiveRuntime {
    pub(crate) handle: SessionHandle,
    pub(crate) notifications: mpsc::Receiver<Notification>,
    shutdown: watch::Sender<bool>,
    session: JoinHandle<SessionExit>,
    pump: JoinHandle<IoError>,
    supervisor: SupervisorTask,
}

impl LiveRuntime {
    /// Must be called from inside a tokio runtime.
    pub(crate) fn start(config: &SamanvayConfig) -> Result<Self, CliError> {
        let backend =
            Arc::new(BackendClient::new(config.server.clone()).map_err(SamanvayError::from)?);
        let LiveChannel {
            handle,
            mut events,
            supervisor,
        } = spawn_live_channel(config.transport.clone()).map_err(SamanvayError::from)?;

        let (notifier, notifications) = notification_channel(NOTIFICATION_BUFFER);
        let services = SessionServices {
            routing: backend.clone(),
            scenario: backend.clone(),
            history: backend,
            outbound: Arc::new(handle),
        };
        let (session, session_handle) =
            SituationSession::new(config.session.clone(), services, Arc::new(notifier))
                .map_err(SamanvayError::from)?;

        let hub = LiveHub::new(config.session.event_buffer);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let session = session.spawn(&hub, shutdown_rx);
        let pump = tokio::spawn(async move { hub.pump(&mut events).await });

        Ok(Self {
            handle: session_handle,
            notifications,
            shutdown,
            session,
            pump,
            supervisor,
        })
    }

    /// Waits until the session observes the live channel as connected.
    pub(crate) async fn wait_connected(&self, limit: Duration) -> Result<(), CliError> {
        let mut snapshots = self.handle.snapshots();
        let waited = timeout(
            limit,
            snapshots.wait_for(|snapshot| snapshot.connection == ConnectionState::Connected),
        )
        .await
        .map(|connected| connected.map(|_| ()));

        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(SamanvayError::from(samanvay_sync::SyncError::SessionClosed).into()),
            Err(_) => Err(CliError::NotConnected { waited: limit }),
        }
    }

    pub(crate) async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        match self.session.await {
            Ok(exit) => debug!(?exit, "session stopped"),
            Err(error) => warn!(%error, "session task ended abnormally"),
        }

        self.supervisor.shutdown().await;
        if let Ok(reason) = self.pump.await {
            debug!(%reason, "live pump stopped");
        }
    }
}

/// Asks the operator on the terminal before an SOS goes out.
pub(crate) struct TerminalConfirmation;

impl OperatorConfirmation for TerminalConfirmation {
    fn confirm_emergency(&self, location: Coordinate) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                prompt_emergency(location, &mut io::stdin().lock(), &mut io::stderr())
            })
            .await;

            match answer {
                Ok(Ok(approved)) => approved,
                Ok(Err(error)) => {
                    warn!(%error, "could not read SOS confirmation");
                    false
                }
                Err(error) => {
                    warn!(%error, "SOS confirmation prompt failed");
                    false
                }
            }
        })
    }
}

pub(crate) fn prompt_emergency(
    location: Coordinate,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    write!(output, "Broadcast an SOS from {location}? [y/N] ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

pub(crate) fn describe(notification: &Notification) -> String {
    match notification {
        Notification::Connected => "live channel connected".to_owned(),
        Notification::Disconnected => "live channel disconnected".to_owned(),
        Notification::IncidentAlert {
            incident_id,
            severity,
        } => format!("incident {incident_id} reported ({severity})"),
        Notification::RoutePlanned { convoy_id, name } => {
            format!("route planned for {name} (convoy {convoy_id})")
        }
        Notification::RouteChanged { convoy_id, points } => {
            format!("convoy {convoy_id} rerouted ({points} points)")
        }
        Notification::RouteCleared { convoy_id } => format!("convoy {convoy_id} route cleared"),
        Notification::RouteExposed { convoy_id, zone_ids } => {
            let zones: Vec<String> = zone_ids.iter().map(ToString::to_string).collect();
            format!(
                "convoy {convoy_id} route crosses threat zones {}",
                zones.join(", ")
            )
        }
        Notification::RequestFailed { action, message } => format!("{action} failed: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::net::{SocketAddr, TcpListener};
    use std::time::Duration;

    use samanvay_config::SamanvayConfig;
    use samanvay_core::{Coordinate, Severity};
    use samanvay_sync::Notification;

    use super::{describe, prompt_emergency, LiveRuntime};
    use crate::CliError;

    fn here() -> Coordinate {
        Coordinate::new(20.2961, 85.8245).expect("coordinate should validate")
    }

    fn live_config(live_addr: SocketAddr) -> SamanvayConfig {
        let mut config = SamanvayConfig::default();
        config.transport.live_addr = live_addr;
        config.transport.connect_timeout = Duration::from_millis(200);
        config
    }

    #[tokio::test]
    async fn wait_connected_returns_once_the_peer_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
        let runtime = LiveRuntime::start(&live_config(listener.local_addr().expect("local addr")))
            .expect("runtime should start");

        runtime
            .wait_connected(Duration::from_secs(5))
            .await
            .expect("channel should connect");
        assert!(runtime.handle.snapshot().connection.is_connected());

        runtime.shutdown().await;
        drop(listener);
    }

    #[tokio::test]
    async fn wait_connected_times_out_without_a_peer() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind should work");
            listener.local_addr().expect("local addr")
        };
        let runtime = LiveRuntime::start(&live_config(addr)).expect("runtime should start");

        let error = runtime
            .wait_connected(Duration::from_millis(300))
            .await
            .expect_err("nothing is listening");
        assert!(matches!(error, CliError::NotConnected { .. }));

        runtime.shutdown().await;
    }

    #[test]
    fn only_an_explicit_yes_confirms() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("\n", false), ("no\n", false)] {
            let mut output = Vec::new();
            let approved = prompt_emergency(here(), &mut Cursor::new(answer), &mut output)
                .expect("prompt should work");
            assert_eq!(approved, expected, "answer {answer:?}");
            assert!(String::from_utf8_lossy(&output).contains("Broadcast an SOS"));
        }
    }

    #[test]
    fn closed_stdin_declines() {
        let approved = prompt_emergency(here(), &mut Cursor::new(""), &mut Vec::new())
            .expect("prompt should work");
        assert!(!approved);
    }

    #[test]
    fn notifications_render_as_single_lines() {
        assert_eq!(
            describe(&Notification::IncidentAlert {
                incident_id: 7,
                severity: Severity::Critical
            }),
            "incident 7 reported (Critical)"
        );
        assert_eq!(
            describe(&Notification::RouteExposed {
                convoy_id: 42,
                zone_ids: vec![11, 12]
            }),
            "convoy 42 route crosses threat zones 11, 12"
        );
    }
}
