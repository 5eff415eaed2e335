pub mod connection;
pub mod error;
pub mod hub;
pub mod incidents;
pub mod messages;
pub mod notify;
pub mod route;
pub mod session;

pub use connection::{ConnectionMonitor, ConnectionStatus, ConnectionTransition};
pub use error::SyncError;
pub use hub::{LiveHub, Subscription};
pub use incidents::{IncidentFeed, PushOutcome};
pub use messages::{MessageChannel, OperatorConfirmation};
pub use notify::{notification_channel, ChannelNotifier, Notification, Notifier};
pub use route::{ActiveRouteController, DiscardReason, PlanOutcome, PlanTicket, RerouteOutcome};
pub use session::{
    ScenarioSummary, SessionConfig, SessionConfigError, SessionExit, SessionHandle,
    SessionServices, SituationSession, SituationSnapshot, SESSION_EVENT_KINDS,
};
