use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use samanvay_core::{
    ChatMessage, ConnectionState, ConvoyRoute, Coordinate, Incident, ThreatZone,
};
use samanvay_geo::{route_exposure, ZoneExposure};
use samanvay_io::{
    IoError, MessageHistoryService, MessageSink, RoutingService, ScenarioService, ServiceError,
};
use samanvay_wire::{LiveEvent, LiveEventKind, OutboundEvent};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connection::ConnectionMonitor;
use crate::hub::{LiveHub, Subscription};
use crate::incidents::{IncidentFeed, PushOutcome};
use crate::messages::{MessageChannel, OperatorConfirmation};
use crate::notify::{Notification, Notifier};
use crate::route::{ActiveRouteController, PlanOutcome, PlanTicket, RerouteOutcome};
use crate::SyncError;

pub const SESSION_EVENT_KINDS: [LiveEventKind; 6] = LiveEventKind::ALL;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Location used for SOS broadcasts until the operator reports another.
    pub operator_location: Option<Coordinate>,
    pub event_buffer: usize,
    pub command_queue: usize,
    pub exposure_samples_per_leg: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            operator_location: None,
            event_buffer: 256,
            command_queue: 32,
            exposure_samples_per_leg: 16,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionConfigError> {
        if self.event_buffer == 0 {
            return Err(SessionConfigError::ZeroQueueCapacity {
                field: "event_buffer",
            });
        }
        if self.command_queue == 0 {
            return Err(SessionConfigError::ZeroQueueCapacity {
                field: "command_queue",
            });
        }
        if self.exposure_samples_per_leg == 0 {
            return Err(SessionConfigError::ZeroExposureSamples);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionConfigError {
    #[error("{field} must be greater than zero")]
    ZeroQueueCapacity { field: &'static str },

    #[error("exposure_samples_per_leg must be greater than zero")]
    ZeroExposureSamples,
}

#[derive(Clone)]
pub struct SessionServices {
    pub routing: Arc<dyn RoutingService>,
    pub scenario: Arc<dyn ScenarioService>,
    pub history: Arc<dyn MessageHistoryService>,
    pub outbound: Arc<dyn MessageSink<OutboundEvent>>,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SituationSnapshot {
    pub connection: ConnectionState,
    pub incidents: Vec<Incident>,
    pub pushed_incidents: u64,
    pub threat_zones: Vec<ThreatZone>,
    pub active_route: Option<ConvoyRoute>,
    pub exposure: Vec<ZoneExposure>,
    pub transcript: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub incidents: usize,
    pub threat_zones: usize,
    /// False when a newer scenario initialization overtook this one.
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Shutdown,
    HandlesDropped,
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum SessionCommand {
    InitializeScenario {
        center: Coordinate,
        reply: Reply<ScenarioSummary>,
    },
    LoadHistory {
        reply: Reply<usize>,
    },
    PlanRoute {
        name: String,
        start: Coordinate,
        end: Coordinate,
        reply: Reply<PlanOutcome>,
    },
    ClearRoute {
        reply: Reply<Option<ConvoyRoute>>,
    },
    SendMessage {
        text: String,
        reply: Reply<()>,
    },
    SendSos {
        confirmation: Arc<dyn OperatorConfirmation>,
        reply: Reply<()>,
    },
    SetOperatorLocation {
        location: Coordinate,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<SituationSnapshot>,
    },
}

enum Completion {
    Scenario {
        generation: u64,
        result: Result<(Vec<Incident>, Vec<ThreatZone>), ServiceError>,
        reply: Reply<ScenarioSummary>,
    },
    History {
        result: Result<Vec<ChatMessage>, ServiceError>,
        reply: Reply<usize>,
    },
    Plan {
        ticket: PlanTicket,
        result: Result<ConvoyRoute, ServiceError>,
        reply: Reply<PlanOutcome>,
    },
    SosConfirmed {
        location: Coordinate,
        confirmed: bool,
        reply: Reply<()>,
    },
    Sent {
        action: &'static str,
        result: Result<(), IoError>,
        reply: Reply<()>,
    },
}

type InFlight = FuturesUnordered<BoxFuture<'static, Completion>>;

/// Operator-side handle. Cloneable; the session stops once every handle is
/// dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SituationSnapshot>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::InitializeScenario { .. } => "InitializeScenario",
            Self::LoadHistory { .. } => "LoadHistory",
            Self::PlanRoute { .. } => "PlanRoute",
            Self::ClearRoute { .. } => "ClearRoute",
            Self::SendMessage { .. } => "SendMessage",
            Self::SendSos { .. } => "SendSos",
            Self::SetOperatorLocation { .. } => "SetOperatorLocation",
            Self::Snapshot { .. } => "Snapshot",
        };
        f.write_str(name)
    }
}

impl SessionHandle {
    pub async fn initialize_scenario(&self, center: Coordinate) -> Result<ScenarioSummary, SyncError> {
        self.request(|reply| SessionCommand::InitializeScenario { center, reply })
            .await
    }

    pub async fn load_history(&self) -> Result<usize, SyncError> {
        self.request(|reply| SessionCommand::LoadHistory { reply })
            .await
    }

    pub async fn plan_route(
        &self,
        name: impl Into<String>,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<PlanOutcome, SyncError> {
        let name = name.into();
        self.request(|reply| SessionCommand::PlanRoute {
            name,
            start,
            end,
            reply,
        })
        .await
    }

    pub async fn clear_route(&self) -> Result<Option<ConvoyRoute>, SyncError> {
        self.request(|reply| SessionCommand::ClearRoute { reply })
            .await
    }

    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), SyncError> {
        let text = text.into();
        self.request(|reply| SessionCommand::SendMessage { text, reply })
            .await
    }

    pub async fn send_sos(
        &self,
        confirmation: Arc<dyn OperatorConfirmation>,
    ) -> Result<(), SyncError> {
        self.request(|reply| SessionCommand::SendSos {
            confirmation,
            reply,
        })
        .await
    }

    pub async fn set_operator_location(&self, location: Coordinate) -> Result<(), SyncError> {
        self.request(|reply| SessionCommand::SetOperatorLocation { location, reply })
            .await
    }

    /// Snapshot taken after every live event queued before this call has been
    /// applied.
    pub async fn current_snapshot(&self) -> Result<SituationSnapshot, SyncError> {
        self.request(|reply| SessionCommand::Snapshot { reply })
            .await
    }

    #[must_use]
    pub fn snapshot(&self) -> SituationSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<SituationSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SyncError::SessionClosed)?;
        response.await.map_err(|_| SyncError::SessionClosed)?
    }
}

pub struct SituationSession {
    state: SessionState,
    commands: mpsc::Receiver<SessionCommand>,
}

impl std::fmt::Debug for SituationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SituationSession")
            .field("connection", &self.state.connection)
            .field("incidents", &self.state.incidents)
            .field("routes", &self.state.routes)
            .field("messages", &self.state.messages)
            .finish_non_exhaustive()
    }
}

impl SituationSession {
    pub fn new(
        config: SessionConfig,
        services: SessionServices,
        notifier: Arc<dyn Notifier>,
    ) -> Result<(Self, SessionHandle), SessionConfigError> {
        config.validate()?;

        let (commands_tx, commands_rx) = mpsc::channel(config.command_queue);
        let (snapshots_tx, snapshots_rx) = watch::channel(SituationSnapshot::default());

        let connection = ConnectionMonitor::new(Arc::clone(&notifier));
        let messages = MessageChannel::new(connection.status(), Arc::clone(&services.outbound));
        let state = SessionState {
            incidents: IncidentFeed::new(Arc::clone(&notifier)),
            routes: ActiveRouteController::new(Arc::clone(&notifier)),
            connection,
            messages,
            threat_zones: Vec::new(),
            exposure: Vec::new(),
            scenario_generation: 0,
            operator_location: config.operator_location,
            samples_per_leg: config.exposure_samples_per_leg,
            services,
            notifier,
            snapshots: snapshots_tx,
        };

        Ok((
            Self {
                state,
                commands: commands_rx,
            },
            SessionHandle {
                commands: commands_tx,
                snapshots: snapshots_rx,
            },
        ))
    }

    pub fn spawn(self, hub: &LiveHub, shutdown: watch::Receiver<bool>) -> JoinHandle<SessionExit> {
        let subscription = hub.subscribe(&SESSION_EVENT_KINDS);
        tokio::spawn(self.run(subscription, shutdown))
    }

    /// Runs until shutdown is requested or every handle is dropped. The
    /// subscription is released on return.
    pub async fn run(
        self,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionExit {
        let Self {
            mut state,
            mut commands,
        } = self;
        let mut in_flight = InFlight::new();
        let mut live_open = true;
        state.publish();

        let exit = loop {
            let changed = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break SessionExit::Shutdown,
                event = subscription.recv(), if live_open => match event {
                    Some(event) => state.apply_live_event(event),
                    None => {
                        live_open = false;
                        info!("live event subscription ended");
                        state.connection.on_transport_down().is_some()
                    }
                },
                Some(completion) = in_flight.next(), if !in_flight.is_empty() => {
                    state.complete(completion, &mut in_flight)
                }
                command = commands.recv() => match command {
                    Some(command) => state.handle(command, &mut in_flight),
                    None => break SessionExit::HandlesDropped,
                },
            };

            if changed {
                state.publish();
            }
        };

        drop(subscription);
        info!(?exit, abandoned = in_flight.len(), "situation session stopped");
        exit
    }
}

struct SessionState {
    connection: ConnectionMonitor,
    incidents: IncidentFeed,
    routes: ActiveRouteController,
    messages: MessageChannel,
    threat_zones: Vec<ThreatZone>,
    exposure: Vec<ZoneExposure>,
    scenario_generation: u64,
    operator_location: Option<Coordinate>,
    samples_per_leg: usize,
    services: SessionServices,
    notifier: Arc<dyn Notifier>,
    snapshots: watch::Sender<SituationSnapshot>,
}

impl SessionState {
    fn apply_live_event(&mut self, event: LiveEvent) -> bool {
        match event {
            LiveEvent::Connect => self.connection.on_transport_up().is_some(),
            LiveEvent::Disconnect => self.connection.on_transport_down().is_some(),
            LiveEvent::NewIncident(incident) => {
                self.incidents.on_incident_pushed(incident) == PushOutcome::Inserted
            }
            LiveEvent::RerouteUpdate { convoy_id, path } => self.reroute(convoy_id, path),
            LiveEvent::ConvoyUpdate {
                convoy_id,
                name,
                path,
            } => {
                debug!(convoy_id, %name, "convoy update received");
                self.reroute(convoy_id, path)
            }
            LiveEvent::Message { sender_id, text } => {
                self.messages.on_message_pushed(sender_id, text);
                true
            }
        }
    }

    fn reroute(&mut self, convoy_id: i64, path: Vec<Coordinate>) -> bool {
        match self.routes.on_reroute_event(convoy_id, path) {
            RerouteOutcome::Applied => {
                self.refresh_exposure();
                true
            }
            RerouteOutcome::Discarded(_) => false,
        }
    }

    fn handle(&mut self, command: SessionCommand, in_flight: &mut InFlight) -> bool {
        debug!(?command, "session command");
        match command {
            SessionCommand::InitializeScenario { center, reply } => {
                self.incidents.begin_reload();
                self.scenario_generation += 1;
                let generation = self.scenario_generation;
                let scenario = Arc::clone(&self.services.scenario);
                in_flight.push(Box::pin(async move {
                    let result = load_scenario(scenario.as_ref(), center).await;
                    Completion::Scenario {
                        generation,
                        result,
                        reply,
                    }
                }));
                false
            }
            SessionCommand::LoadHistory { reply } => {
                let history = Arc::clone(&self.services.history);
                in_flight.push(Box::pin(async move {
                    let result = history.fetch_messages().await;
                    Completion::History { result, reply }
                }));
                false
            }
            SessionCommand::PlanRoute {
                name,
                start,
                end,
                reply,
            } => {
                match self.routes.begin_plan(&name, start, end) {
                    Ok((ticket, request)) => {
                        let routing = Arc::clone(&self.services.routing);
                        in_flight.push(Box::pin(async move {
                            let result = routing.plan_convoy(request).await;
                            Completion::Plan {
                                ticket,
                                result,
                                reply,
                            }
                        }));
                    }
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
                false
            }
            SessionCommand::ClearRoute { reply } => {
                let cleared = self.routes.clear();
                let changed = cleared.is_some();
                if changed {
                    self.refresh_exposure();
                }
                let _ = reply.send(Ok(cleared));
                changed
            }
            SessionCommand::SendMessage { text, reply } => {
                match self.messages.prepare_message(&text) {
                    Ok(event) => self.dispatch("send a message", event, reply, in_flight),
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
                false
            }
            SessionCommand::SendSos {
                confirmation,
                reply,
            } => {
                match self.messages.prepare_emergency(self.operator_location) {
                    Ok(location) => in_flight.push(Box::pin(async move {
                        let confirmed = confirmation.confirm_emergency(location).await;
                        Completion::SosConfirmed {
                            location,
                            confirmed,
                            reply,
                        }
                    })),
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
                false
            }
            SessionCommand::SetOperatorLocation { location, reply } => {
                self.operator_location = Some(location);
                let _ = reply.send(Ok(()));
                false
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(Ok(self.snapshot()));
                false
            }
        }
    }

    fn complete(&mut self, completion: Completion, in_flight: &mut InFlight) -> bool {
        match completion {
            Completion::Scenario {
                generation,
                result,
                reply,
            } => {
                if generation != self.scenario_generation {
                    debug!(
                        generation,
                        current = self.scenario_generation,
                        failed = result.is_err(),
                        "stale scenario completion discarded"
                    );
                    let (incidents, threat_zones) = match &result {
                        Ok((incidents, zones)) => (incidents.len(), zones.len()),
                        Err(_) => (0, 0),
                    };
                    let _ = reply.send(Ok(ScenarioSummary {
                        incidents,
                        threat_zones,
                        applied: false,
                    }));
                    return false;
                }
                self.complete_scenario(result, reply)
            }
            Completion::History { result, reply } => match result {
                Ok(messages) => {
                    let count = messages.len();
                    self.messages.load_history(messages);
                    let _ = reply.send(Ok(count));
                    true
                }
                Err(error) => {
                    self.fail(reply, "load message history", error.into());
                    false
                }
            },
            Completion::Plan {
                ticket,
                result,
                reply,
            } => match self.routes.complete_plan(ticket, result) {
                Ok(outcome) => {
                    let installed = matches!(outcome, PlanOutcome::Installed(_));
                    if installed {
                        self.refresh_exposure();
                    }
                    let _ = reply.send(Ok(outcome));
                    installed
                }
                Err(error) => {
                    self.fail(reply, "plan a convoy route", error);
                    false
                }
            },
            Completion::SosConfirmed {
                location,
                confirmed,
                reply,
            } => {
                if !confirmed {
                    info!("emergency broadcast declined by operator");
                    let _ = reply.send(Err(SyncError::SosDeclined));
                    return false;
                }
                match self.messages.confirmed_emergency(location) {
                    Ok(event) => self.dispatch("broadcast an SOS", event, reply, in_flight),
                    Err(error) => {
                        let _ = reply.send(Err(error));
                    }
                }
                false
            }
            Completion::Sent {
                action,
                result,
                reply,
            } => {
                match result {
                    Ok(()) => {
                        let _ = reply.send(Ok(()));
                    }
                    Err(error) => self.fail(reply, action, error.into()),
                }
                false
            }
        }
    }

    fn complete_scenario(
        &mut self,
        result: Result<(Vec<Incident>, Vec<ThreatZone>), ServiceError>,
        reply: Reply<ScenarioSummary>,
    ) -> bool {
        match result {
            Ok((incidents, zones)) => {
                let summary = ScenarioSummary {
                    incidents: incidents.len(),
                    threat_zones: zones.len(),
                    applied: true,
                };
                self.incidents.initialize(incidents);
                self.threat_zones = zones;
                self.refresh_exposure();
                info!(
                    incidents = summary.incidents,
                    threat_zones = summary.threat_zones,
                    "scenario seeded"
                );
                let _ = reply.send(Ok(summary));
                true
            }
            Err(error) => {
                self.fail(reply, "initialize the scenario", error.into());
                false
            }
        }
    }

    fn dispatch(
        &self,
        action: &'static str,
        event: OutboundEvent,
        reply: Reply<()>,
        in_flight: &mut InFlight,
    ) {
        let sink = self.messages.sink();
        in_flight.push(Box::pin(async move {
            let result = sink.send(event).await;
            Completion::Sent {
                action,
                result,
                reply,
            }
        }));
    }

    fn fail<T>(&self, reply: Reply<T>, action: &'static str, error: SyncError) {
        if error.is_transport() {
            warn!(action, %error, "request failed");
            self.notifier.notify(Notification::RequestFailed {
                action,
                message: error.to_string(),
            });
        }
        let _ = reply.send(Err(error));
    }

    fn refresh_exposure(&mut self) {
        let exposure = match self.routes.current() {
            Some(route) => {
                match route_exposure(route.path(), &self.threat_zones, self.samples_per_leg) {
                    Ok(exposure) => exposure,
                    Err(error) => {
                        warn!(%error, "route exposure could not be computed");
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let zone_ids: Vec<i64> = exposure.iter().map(|entry| entry.zone_id).collect();
        let previous: Vec<i64> = self.exposure.iter().map(|entry| entry.zone_id).collect();
        if let Some(route) = self.routes.current() {
            if !zone_ids.is_empty() && zone_ids != previous {
                warn!(convoy_id = route.convoy_id(), ?zone_ids, "active route crosses threat zones");
                self.notifier.notify(Notification::RouteExposed {
                    convoy_id: route.convoy_id(),
                    zone_ids,
                });
            }
        }
        self.exposure = exposure;
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    fn snapshot(&self) -> SituationSnapshot {
        SituationSnapshot {
            connection: self.connection.state(),
            incidents: self.incidents.snapshot(),
            pushed_incidents: self.incidents.pushed_count(),
            threat_zones: self.threat_zones.clone(),
            active_route: self.routes.current().cloned(),
            exposure: self.exposure.clone(),
            transcript: self.messages.transcript().to_vec(),
        }
    }
}

async fn load_scenario(
    scenario: &dyn ScenarioService,
    center: Coordinate,
) -> Result<(Vec<Incident>, Vec<ThreatZone>), ServiceError> {
    scenario.initialize_scenario(center).await?;
    future::try_join(scenario.fetch_incidents(), scenario.fetch_threat_zones()).await
}

/// Resolves once shutdown is requested. A dropped controller never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            future::pending::<()>().await;
        }
    }
}
