use std::sync::Arc;

use samanvay_core::{ConvoyRoute, Coordinate, CoreError};
use samanvay_io::{ConvoyPlanRequest, RoutingService, ServiceError};
use tracing::{debug, info, warn};

use crate::notify::{Notification, Notifier};
use crate::SyncError;

/// Identifies one plan request. Only the most recent ticket can install a
/// route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanTicket {
    generation: u64,
}

impl PlanTicket {
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Installed(ConvoyRoute),
    /// A newer plan or a clear happened while the request was in flight.
    /// Carries no route when the superseded request failed.
    Superseded(Option<ConvoyRoute>),
}

impl PlanOutcome {
    #[must_use]
    pub fn into_route(self) -> Option<ConvoyRoute> {
        match self {
            Self::Installed(route) => Some(route),
            Self::Superseded(route) => route,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteOutcome {
    Applied,
    Discarded(DiscardReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoActiveRoute,
    ForeignConvoy { active: i64 },
    MalformedPath { points: usize },
}

pub struct ActiveRouteController {
    active: Option<ConvoyRoute>,
    generation: u64,
    notifier: Arc<dyn Notifier>,
}

impl ActiveRouteController {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            active: None,
            generation: 0,
            notifier,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&ConvoyRoute> {
        self.active.as_ref()
    }

    /// Requests a route and installs it on success. On failure the active
    /// route is left as it was.
    pub async fn plan_route(
        &mut self,
        routing: &dyn RoutingService,
        name: &str,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<PlanOutcome, SyncError> {
        let (ticket, request) = self.begin_plan(name, start, end)?;
        let result = routing.plan_convoy(request).await;
        self.complete_plan(ticket, result)
    }

    pub fn begin_plan(
        &mut self,
        name: &str,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<(PlanTicket, ConvoyPlanRequest), SyncError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::EmptyText {
                field: "convoy name",
            }
            .into());
        }

        self.generation += 1;
        let ticket = PlanTicket {
            generation: self.generation,
        };
        debug!(generation = ticket.generation, name, "convoy plan requested");

        Ok((
            ticket,
            ConvoyPlanRequest {
                name: name.to_owned(),
                start,
                end,
            },
        ))
    }

    pub fn complete_plan(
        &mut self,
        ticket: PlanTicket,
        result: Result<ConvoyRoute, ServiceError>,
    ) -> Result<PlanOutcome, SyncError> {
        if ticket.generation != self.generation {
            match &result {
                Ok(route) => debug!(
                    generation = ticket.generation,
                    current = self.generation,
                    convoy_id = route.convoy_id(),
                    "superseded plan response discarded"
                ),
                Err(error) => debug!(
                    generation = ticket.generation,
                    current = self.generation,
                    %error,
                    "superseded plan failure discarded"
                ),
            }
            return Ok(PlanOutcome::Superseded(result.ok()));
        }

        let route = result.map_err(|error| {
            warn!(generation = ticket.generation, %error, "convoy plan failed");
            SyncError::from(error)
        })?;

        info!(
            convoy_id = route.convoy_id(),
            name = route.name(),
            points = route.path().len(),
            "convoy route installed"
        );
        self.active = Some(route.clone());
        self.notifier.notify(Notification::RoutePlanned {
            convoy_id: route.convoy_id(),
            name: route.name().to_owned(),
        });
        Ok(PlanOutcome::Installed(route))
    }

    pub fn on_reroute_event(&mut self, convoy_id: i64, new_path: Vec<Coordinate>) -> RerouteOutcome {
        let Some(active) = self.active.as_ref() else {
            debug!(convoy_id, "reroute ignored; no active route");
            return RerouteOutcome::Discarded(DiscardReason::NoActiveRoute);
        };

        if active.convoy_id() != convoy_id {
            debug!(
                convoy_id,
                active = active.convoy_id(),
                "reroute for another convoy ignored"
            );
            return RerouteOutcome::Discarded(DiscardReason::ForeignConvoy {
                active: active.convoy_id(),
            });
        }

        let points = new_path.len();
        let rerouted = match active.with_path(new_path) {
            Ok(route) => route,
            Err(error) => {
                warn!(convoy_id, %error, "malformed reroute path ignored");
                return RerouteOutcome::Discarded(DiscardReason::MalformedPath { points });
            }
        };

        info!(convoy_id, points, "active convoy rerouted");
        self.active = Some(rerouted);
        self.notifier
            .notify(Notification::RouteChanged { convoy_id, points });
        RerouteOutcome::Applied
    }

    /// Empties the slot and supersedes any plan still in flight.
    pub fn clear(&mut self) -> Option<ConvoyRoute> {
        self.generation += 1;
        let cleared = self.active.take();
        if let Some(route) = &cleared {
            info!(convoy_id = route.convoy_id(), "active convoy route cleared");
            self.notifier.notify(Notification::RouteCleared {
                convoy_id: route.convoy_id(),
            });
        }
        cleared
    }
}

impl std::fmt::Debug for ActiveRouteController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRouteController")
            .field("active", &self.active)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
