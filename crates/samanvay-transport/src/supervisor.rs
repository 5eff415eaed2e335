use std::pin::Pin;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{stream, Stream};
use samanvay_io::{IoError, MessageEnvelope, MessageSink, MessageSource};
use samanvay_net::LineFrameError;
use samanvay_wire::{LiveEvent, OutboundEvent};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::connection::LiveChannelConnection;
use crate::{TransportConfig, TransportConfigError, TransportError};

const IDLE_TIMER_PLACEHOLDER: Duration = Duration::from_secs(3_600);

#[derive(Debug)]
pub struct LiveChannel {
    pub handle: LiveChannelHandle,
    pub events: LiveEventSource,
    pub supervisor: SupervisorTask,
}

pub fn spawn_live_channel(config: TransportConfig) -> Result<LiveChannel, TransportConfigError> {
    config.validate()?;

    let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue);
    let (events_tx, events_rx) = mpsc::channel(config.inbound_queue);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let supervisor = Supervisor {
        config,
        events: events_tx,
        outbound: outbound_rx,
        shutdown: shutdown_rx,
        emitted: 0,
    };
    let join = tokio::spawn(supervisor.run());

    Ok(LiveChannel {
        handle: LiveChannelHandle {
            outbound: outbound_tx,
        },
        events: LiveEventSource { receiver: events_rx },
        supervisor: SupervisorTask {
            shutdown: shutdown_tx,
            join,
        },
    })
}

#[derive(Debug)]
pub struct SupervisorTask {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SupervisorTask {
    /// Closes the socket, emits a final `disconnect` if connected, and waits
    /// for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.join.await {
            warn!(%error, "live channel supervisor ended abnormally");
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[derive(Debug)]
struct OutboundRequest {
    event: OutboundEvent,
    ack: oneshot::Sender<Result<(), IoError>>,
}

/// Cloneable outbound sink. `send` resolves once the frame is written, or
/// fails with [`IoError::Closed`] while the channel is down.
#[derive(Debug, Clone)]
pub struct LiveChannelHandle {
    outbound: mpsc::Sender<OutboundRequest>,
}

impl MessageSink<OutboundEvent> for LiveChannelHandle {
    fn send(&self, msg: OutboundEvent) -> BoxFuture<'_, Result<(), IoError>> {
        Box::pin(async move {
            let (ack, done) = oneshot::channel();
            self.outbound
                .try_send(OutboundRequest { event: msg, ack })
                .map_err(|error| match error {
                    mpsc::error::TrySendError::Full(_) => IoError::Overloaded,
                    mpsc::error::TrySendError::Closed(_) => IoError::Closed,
                })?;
            done.await.map_err(|_| IoError::Closed)?
        })
    }
}

#[derive(Debug)]
pub struct LiveEventSource {
    receiver: mpsc::Receiver<MessageEnvelope<LiveEvent>>,
}

impl MessageSource<LiveEvent> for LiveEventSource {
    fn recv(&mut self) -> BoxFuture<'_, Result<MessageEnvelope<LiveEvent>, IoError>> {
        Box::pin(async move { self.receiver.recv().await.ok_or(IoError::Closed) })
    }

    fn into_stream(
        self: Box<Self>,
    ) -> Pin<Box<dyn Stream<Item = Result<MessageEnvelope<LiveEvent>, IoError>> + Send>> {
        Box::pin(stream::unfold(self.receiver, |mut receiver| async move {
            receiver
                .recv()
                .await
                .map(|envelope| (Ok(envelope), receiver))
        }))
    }
}

#[derive(Debug)]
enum SessionEnd {
    Shutdown,
    ConsumerGone,
    PeerClosed,
    IdleTimeout,
    Failed(TransportError),
}

struct Supervisor {
    config: TransportConfig,
    events: mpsc::Sender<MessageEnvelope<LiveEvent>>,
    outbound: mpsc::Receiver<OutboundRequest>,
    shutdown: watch::Receiver<bool>,
    emitted: u64,
}

impl Supervisor {
    async fn run(mut self) {
        let addr = self.config.live_addr;
        let mut attempt: u32 = 0;

        loop {
            let connect = timeout(self.config.connect_timeout, TcpStream::connect(addr));
            tokio::pin!(connect);

            let dialed = loop {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut self.shutdown) => return,
                    () = self.events.closed() => return,
                    Some(request) = self.outbound.recv() => reject(request),
                    result = &mut connect => break result,
                }
            };

            match dialed {
                Ok(Ok(stream)) => {
                    attempt = 0;
                    info!(%addr, "live channel connected");
                    if !self.emit(LiveEvent::Connect).await {
                        return;
                    }

                    let end = self.serve(stream).await;
                    match &end {
                        SessionEnd::Shutdown => info!(%addr, "live channel closed on request"),
                        SessionEnd::ConsumerGone => debug!(%addr, "live event consumer dropped"),
                        SessionEnd::PeerClosed => warn!(%addr, "live channel closed by peer"),
                        SessionEnd::IdleTimeout => {
                            warn!(%addr, "live channel idle past read timeout")
                        }
                        SessionEnd::Failed(error) => warn!(%addr, %error, "live channel dropped"),
                    }

                    let delivered = self.emit(LiveEvent::Disconnect).await;
                    if !delivered || matches!(end, SessionEnd::Shutdown | SessionEnd::ConsumerGone)
                    {
                        return;
                    }
                }
                Ok(Err(error)) => warn!(%addr, %error, "live channel connect failed"),
                Err(_) => warn!(
                    %addr,
                    timeout = ?self.config.connect_timeout,
                    "live channel connect timed out"
                ),
            }

            attempt = attempt.saturating_add(1);
            if self.config.reconnect_policy.retries_exhausted(attempt) {
                warn!(%addr, attempt, "reconnect budget exhausted; live channel stays down");
                return;
            }

            let delay = self
                .config
                .reconnect_policy
                .delay_for_attempt(attempt, rand::random::<f64>());
            debug!(%addr, attempt, ?delay, "scheduling reconnect");

            let backoff = sleep(delay);
            tokio::pin!(backoff);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut self.shutdown) => return,
                    () = self.events.closed() => return,
                    Some(request) = self.outbound.recv() => reject(request),
                    () = &mut backoff => break,
                }
            }
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> SessionEnd {
        let (mut reader, mut writer) =
            LiveChannelConnection::new(stream, self.config.max_frame_bytes).into_split();
        let write_timeout = self.config.write_timeout;
        let read_timeout = self.config.read_timeout;

        let idle = sleep(read_timeout.unwrap_or(IDLE_TIMER_PLACEHOLDER));
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut self.shutdown) => return SessionEnd::Shutdown,
                () = self.events.closed() => return SessionEnd::ConsumerGone,
                Some(request) = self.outbound.recv() => {
                    let written = match timeout(write_timeout, writer.send_event(&request.event)).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::WriteTimeout(write_timeout)),
                    };

                    match written {
                        Ok(()) => {
                            let _ = request.ack.send(Ok(()));
                        }
                        Err(error) => {
                            warn!(%error, event = request.event.name(), "outbound event not written");
                            let drops_connection = matches!(
                                error,
                                TransportError::WriteTimeout(_)
                                    | TransportError::Frame(LineFrameError::Io(_))
                            );
                            let reply = match &error {
                                TransportError::WriteTimeout(limit) => IoError::Timeout(*limit),
                                other => IoError::Other(other.to_string()),
                            };
                            let _ = request.ack.send(Err(reply));
                            if drops_connection {
                                return SessionEnd::Failed(error);
                            }
                        }
                    }
                }
                inbound = reader.recv_event() => match inbound {
                    Ok(Some(event)) => {
                        if let Some(read_timeout) = read_timeout {
                            idle.as_mut().reset(Instant::now() + read_timeout);
                        }
                        if !self.emit(event).await {
                            return SessionEnd::ConsumerGone;
                        }
                    }
                    Ok(None) => return SessionEnd::PeerClosed,
                    Err(error) => return SessionEnd::Failed(error),
                },
                () = &mut idle, if read_timeout.is_some() => return SessionEnd::IdleTimeout,
            }
        }
    }

    async fn emit(&mut self, event: LiveEvent) -> bool {
        let envelope = MessageEnvelope::sequenced(self.emitted, event);
        self.emitted += 1;
        self.events.send(envelope).await.is_ok()
    }
}

fn reject(request: OutboundRequest) {
    debug!(
        event = request.event.name(),
        "live channel down; rejecting outbound event"
    );
    let _ = request.ack.send(Err(IoError::Closed));
}

/// Resolves once shutdown is requested. A dropped controller never resolves.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}
