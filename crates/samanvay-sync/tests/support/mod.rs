#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use samanvay_core::{ChatMessage, ConvoyRoute, Coordinate, Incident, Severity, ThreatZone};
use samanvay_io::{
    ConvoyPlanRequest, IoError, MessageHistoryService, MessageSink, RoutingService,
    ScenarioService, ServiceError,
};
use samanvay_sync::{
    notification_channel, LiveHub, Notification, OperatorConfirmation, SessionConfig,
    SessionExit, SessionHandle, SessionServices, SituationSession,
};
use samanvay_wire::OutboundEvent;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const STEP: Duration = Duration::from_secs(5);

pub fn point(latitude: f64, longitude: f64) -> Coordinate {
    Coordinate::new(latitude, longitude).expect("point should validate")
}

pub fn route(convoy_id: i64, name: &str, path: Vec<Coordinate>) -> ConvoyRoute {
    ConvoyRoute::new(convoy_id, name, path).expect("route should validate")
}

pub fn incident(id: i64, severity: Severity) -> Incident {
    Incident::new(id, point(20.29 + id as f64 * 0.001, 85.82), severity)
}

/// Plan responses handed out in order. A gated response waits for its
/// release signal after reporting that the request arrived.
pub struct PlannedResponse {
    pub started: Option<oneshot::Sender<()>>,
    pub release: Option<oneshot::Receiver<()>>,
    pub result: Result<ConvoyRoute, ServiceError>,
}

impl PlannedResponse {
    pub fn ready(result: Result<ConvoyRoute, ServiceError>) -> Self {
        Self {
            started: None,
            release: None,
            result,
        }
    }

    pub fn gated(
        result: Result<ConvoyRoute, ServiceError>,
    ) -> (Self, oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        (
            Self {
                started: Some(started_tx),
                release: Some(release_rx),
                result,
            },
            started_rx,
            release_tx,
        )
    }
}

#[derive(Default)]
pub struct ScriptedRouting {
    pub responses: Mutex<VecDeque<PlannedResponse>>,
    pub requests: Mutex<Vec<ConvoyPlanRequest>>,
}

impl ScriptedRouting {
    pub fn push(&self, response: PlannedResponse) {
        self.responses
            .lock()
            .expect("mutex should be available")
            .push_back(response);
    }
}

impl RoutingService for ScriptedRouting {
    fn plan_convoy(
        &self,
        request: ConvoyPlanRequest,
    ) -> BoxFuture<'_, Result<ConvoyRoute, ServiceError>> {
        self.requests
            .lock()
            .expect("mutex should be available")
            .push(request);
        let next = self
            .responses
            .lock()
            .expect("mutex should be available")
            .pop_front();

        Box::pin(async move {
            let Some(response) = next else {
                return Err(ServiceError::Request("no scripted response".to_owned()));
            };
            if let Some(started) = response.started {
                let _ = started.send(());
            }
            if let Some(release) = response.release {
                let _ = release.await;
            }
            response.result
        })
    }
}

#[derive(Default)]
pub struct ScriptedScenario {
    pub incidents: Mutex<Vec<Incident>>,
    pub zones: Mutex<Vec<ThreatZone>>,
    /// When set, `fetch_incidents` reports its start and waits for release.
    pub gate: Mutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    /// Returned by the next `fetch_incidents` call only.
    pub incidents_error: Mutex<Option<ServiceError>>,
    pub centers: Mutex<Vec<Coordinate>>,
}

impl ScenarioService for ScriptedScenario {
    fn initialize_scenario(&self, center: Coordinate) -> BoxFuture<'_, Result<(), ServiceError>> {
        self.centers
            .lock()
            .expect("mutex should be available")
            .push(center);
        Box::pin(async { Ok(()) })
    }

    fn fetch_incidents(&self) -> BoxFuture<'_, Result<Vec<Incident>, ServiceError>> {
        let gate = self.gate.lock().expect("mutex should be available").take();
        let error = self
            .incidents_error
            .lock()
            .expect("mutex should be available")
            .take();
        let incidents = self.incidents.lock().expect("mutex should be available").clone();
        Box::pin(async move {
            if let Some((started, release)) = gate {
                let _ = started.send(());
                let _ = release.await;
            }
            match error {
                Some(error) => Err(error),
                None => Ok(incidents),
            }
        })
    }

    fn fetch_threat_zones(&self) -> BoxFuture<'_, Result<Vec<ThreatZone>, ServiceError>> {
        let zones = self.zones.lock().expect("mutex should be available").clone();
        Box::pin(async move { Ok(zones) })
    }
}

#[derive(Default)]
pub struct FixedHistory {
    pub messages: Vec<ChatMessage>,
}

impl MessageHistoryService for FixedHistory {
    fn fetch_messages(&self) -> BoxFuture<'_, Result<Vec<ChatMessage>, ServiceError>> {
        let messages = self.messages.clone();
        Box::pin(async move { Ok(messages) })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<OutboundEvent>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().expect("mutex should be available").clone()
    }
}

impl MessageSink<OutboundEvent> for RecordingSink {
    fn send(&self, msg: OutboundEvent) -> BoxFuture<'_, Result<(), IoError>> {
        Box::pin(async move {
            self.sent
                .lock()
                .expect("mutex should be available")
                .push(msg);
            Ok(())
        })
    }
}

pub struct Operator {
    pub approve: bool,
}

impl OperatorConfirmation for Operator {
    fn confirm_emergency(&self, _location: Coordinate) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.approve })
    }
}

pub struct Harness {
    pub hub: LiveHub,
    pub handle: SessionHandle,
    pub notifications: mpsc::Receiver<Notification>,
    pub routing: Arc<ScriptedRouting>,
    pub scenario: Arc<ScriptedScenario>,
    pub sink: Arc<RecordingSink>,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<SessionExit>,
}

impl Harness {
    pub fn start(config: SessionConfig) -> Self {
        Self::start_with_history(config, Vec::new())
    }

    pub fn start_with_history(config: SessionConfig, history: Vec<ChatMessage>) -> Self {
        let routing = Arc::new(ScriptedRouting::default());
        let scenario = Arc::new(ScriptedScenario::default());
        let sink = Arc::new(RecordingSink::default());
        let (notifier, notifications) = notification_channel(64);
        let hub = LiveHub::new(config.event_buffer);

        let services = SessionServices {
            routing: routing.clone(),
            scenario: scenario.clone(),
            history: Arc::new(FixedHistory { messages: history }),
            outbound: sink.clone(),
        };
        let (session, handle) =
            SituationSession::new(config, services, Arc::new(notifier)).expect("session config");
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = session.spawn(&hub, shutdown_rx);

        Self {
            hub,
            handle,
            notifications,
            routing,
            scenario,
            sink,
            shutdown,
            task,
        }
    }

    /// Publishes live events and waits until the session has applied them.
    pub async fn push(&self, events: impl IntoIterator<Item = samanvay_wire::LiveEvent>) {
        for event in events {
            self.hub.publish(event).await;
        }
        self.settle().await;
    }

    /// Round-trips a command. Live events queued earlier are applied first.
    pub async fn settle(&self) {
        timeout(STEP, self.handle.current_snapshot())
            .await
            .expect("session should answer in time")
            .expect("session should be running");
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut seen = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            seen.push(notification);
        }
        seen
    }

    pub async fn stop(self) -> (LiveHub, SessionExit) {
        let _ = self.shutdown.send(true);
        let exit = timeout(STEP, self.task)
            .await
            .expect("session should stop in time")
            .expect("session task should not panic");
        (self.hub, exit)
    }
}
