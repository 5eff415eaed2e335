use std::sync::Arc;

use futures::future::BoxFuture;
use samanvay_core::{ChatMessage, Coordinate, TimestampUtc};
use samanvay_io::MessageSink;
use samanvay_wire::{OutboundEvent, SosPayload};
use tracing::{debug, info, warn};

use crate::connection::ConnectionStatus;
use crate::SyncError;

/// Human-in-the-loop gate for emergency broadcasts. Implementations must ask
/// an operator; there is no automatic approval.
pub trait OperatorConfirmation: Send + Sync {
    fn confirm_emergency(&self, location: Coordinate) -> BoxFuture<'_, bool>;
}

/// Append-only transcript. Sends never touch it: an operator's own message
/// appears when the live channel echoes it back.
pub struct MessageChannel {
    transcript: Vec<ChatMessage>,
    status: ConnectionStatus,
    sink: Arc<dyn MessageSink<OutboundEvent>>,
}

impl MessageChannel {
    #[must_use]
    pub fn new(status: ConnectionStatus, sink: Arc<dyn MessageSink<OutboundEvent>>) -> Self {
        Self {
            transcript: Vec::new(),
            status,
            sink,
        }
    }

    pub fn load_history(&mut self, messages: Vec<ChatMessage>) {
        debug!(
            history = messages.len(),
            pushed = self.transcript.len(),
            "message history loaded"
        );
        self.transcript.extend(messages);
    }

    pub fn on_message_pushed(&mut self, sender_id: String, text: String) -> &ChatMessage {
        let index = self.transcript.len();
        self.transcript
            .push(ChatMessage::new(None, sender_id, text, TimestampUtc::now()));
        &self.transcript[index]
    }

    #[must_use]
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub async fn send(&self, text: &str) -> Result<(), SyncError> {
        let event = self.prepare_message(text)?;
        self.sink.send(event).await?;
        Ok(())
    }

    pub fn prepare_message(&self, text: &str) -> Result<OutboundEvent, SyncError> {
        ChatMessage::validate_outbound_text(text)?;
        self.require_connection("send a message")?;
        Ok(OutboundEvent::Message {
            text: text.to_owned(),
        })
    }

    pub async fn send_emergency_broadcast(
        &self,
        location: Option<Coordinate>,
        confirmation: &dyn OperatorConfirmation,
    ) -> Result<(), SyncError> {
        let location = self.prepare_emergency(location)?;
        if !confirmation.confirm_emergency(location).await {
            info!("emergency broadcast declined by operator");
            return Err(SyncError::SosDeclined);
        }
        let event = self.confirmed_emergency(location)?;
        self.sink.send(event).await?;
        Ok(())
    }

    pub fn prepare_emergency(&self, location: Option<Coordinate>) -> Result<Coordinate, SyncError> {
        self.require_connection("broadcast an SOS")?;
        location.ok_or(SyncError::LocationUnknown)
    }

    /// Builds the broadcast after confirmation. Connectivity is checked again
    /// since the operator may have taken a while.
    pub fn confirmed_emergency(&self, location: Coordinate) -> Result<OutboundEvent, SyncError> {
        self.require_connection("broadcast an SOS")?;
        warn!(%location, "emergency broadcast confirmed");
        Ok(OutboundEvent::Sos(SosPayload::emergency(location)))
    }

    #[must_use]
    pub fn sink(&self) -> Arc<dyn MessageSink<OutboundEvent>> {
        Arc::clone(&self.sink)
    }

    fn require_connection(&self, action: &'static str) -> Result<(), SyncError> {
        if self.status.is_connected() {
            Ok(())
        } else {
            debug!(action, "rejected while disconnected");
            Err(SyncError::ConnectivityPrecondition { action })
        }
    }
}

impl std::fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageChannel")
            .field("transcript", &self.transcript.len())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
