use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wsmux_frame::{decode_frame, encode_frame, Frame, MessageKind, ReplyBody, RequestBody};
use wsmux_transport::{CloseReason, Connector, Endpoint, Link, LinkSender, TransportEvent};

use crate::config::ClientConfig;
use crate::correlator::{Completion, Correlator};
use crate::error::{ClientError, Result};
use crate::payload::{ConnectionInfo, InitialReply, ParameterSubscriptionReply, TopicEvent};
use crate::registry::Registry;
use crate::router::{Binding, Router};
use crate::subscription::Subscription;
use crate::topic::{ParameterSubscriptionRequest, Topic};
use crate::SubscriptionId;

/// Multiplexed subscription client.
///
/// One client serves any number of subscriptions over a single link at a
/// time. The client never reconnects on its own: when a link closes, the
/// owner opens a new one and hands it to [`attach`](Self::attach) (or calls
/// [`connect`](Self::connect) again). Subscriptions made earlier are replayed
/// on the new link as soon as the server's `CONNECTION_INFO` arrives, and
/// their handles keep streaming without any action from the caller.
///
/// Dropping the client closes it.
#[derive(Debug)]
pub struct SubscriptionClient {
    shared: Arc<Shared>,
}

/// State shared by the facade, the per-link driver tasks and subscription handles.
#[derive(Debug)]
pub(crate) struct Shared {
    config: ClientConfig,
    state: Mutex<State>,
    connected: watch::Sender<bool>,
    connection_info: watch::Sender<Option<ConnectionInfo>>,
    /// Flips to `true` once, when the client is closed.
    shutdown: watch::Sender<bool>,
    next_subscription: AtomicU64,
}

#[derive(Debug)]
struct ActiveLink {
    generation: u64,
    sender: LinkSender,
    /// `CONNECTION_INFO` seen on this link.
    ready: bool,
    /// Dropped to stop the link's driver task.
    _stop: oneshot::Sender<()>,
}

#[derive(Debug)]
struct State {
    link: Option<ActiveLink>,
    generation: u64,
    correlator: Correlator,
    router: Router,
    registry: Registry,
    closed: bool,
}

impl State {
    fn is_current(&self, generation: u64) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }
}

/// A link attached to a client.
#[derive(Debug)]
pub struct Connection {
    generation: u64,
    task: JoinHandle<CloseReason>,
}

impl Connection {
    /// Sequential number of this link within its client, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true once the link has closed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the link closes and report why.
    pub async fn closed(self) -> CloseReason {
        self.task.await.unwrap_or_else(CloseReason::error)
    }
}

impl SubscriptionClient {
    pub fn new(config: ClientConfig) -> Self {
        let (connected, _) = watch::channel(false);
        let (connection_info, _) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    link: None,
                    generation: 0,
                    correlator: Correlator::new(),
                    router: Router::default(),
                    registry: Registry::default(),
                    closed: false,
                }),
                connected,
                connection_info,
                shutdown,
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    /// Open a link with `connector` and attach it.
    pub async fn connect<C: Connector>(&self, connector: &C, endpoint: &Endpoint) -> Result<Connection> {
        let closed = self.shared.lock().closed;
        if closed {
            return Err(ClientError::Closed);
        }
        let link = connector.connect(endpoint).await?;
        self.attach(link)
    }

    /// Make `link` the client's current link and start processing its frames.
    ///
    /// A link that is still attached is treated as closed: its pending
    /// requests fail with [`ClientError::ConnectionLost`].
    pub fn attach(&self, link: Link) -> Result<Connection> {
        let (sender, events) = link.into_parts();
        let (stop_tx, stop_rx) = oneshot::channel();

        let generation = {
            let mut state = self.shared.lock();
            if state.closed {
                sender.close();
                return Err(ClientError::Closed);
            }
            if let Some(previous) = state.link.as_ref().map(|link| link.generation) {
                self.shared
                    .close_link(&mut state, previous, &CloseReason::local());
            }
            state.generation += 1;
            let generation = state.generation;
            state.link = Some(ActiveLink {
                generation,
                sender,
                ready: false,
                _stop: stop_tx,
            });
            generation
        };

        debug!(generation, "link attached");
        let task = tokio::spawn(drive(Arc::clone(&self.shared), generation, events, stop_rx));
        Ok(Connection { generation, task })
    }

    /// Subscribe to `topic`.
    ///
    /// Resolves once the server accepted or rejected the request. On
    /// success the subscription is recorded for replay and its handle starts
    /// receiving pushes.
    ///
    /// Fails immediately with [`ClientError::NotConnected`] when no link is
    /// attached; nothing is queued for later.
    pub async fn subscribe(&self, topic: Topic) -> Result<(InitialReply, Subscription)> {
        let id: SubscriptionId = self.shared.next_subscription.fetch_add(1, Ordering::Relaxed);
        let body = topic.request_body()?;
        let (sink, rx) = mpsc::unbounded_channel();
        let interrupted = Arc::new(AtomicBool::new(false));
        let (reply_tx, reply_rx) = oneshot::channel();

        let sequence = {
            let mut state = self.shared.lock();
            self.shared.send_request(
                &mut state,
                &body,
                Completion::Subscribe {
                    id,
                    topic: topic.clone(),
                    sink,
                    interrupted: Arc::clone(&interrupted),
                    reply: reply_tx,
                },
            )?
        };
        debug!(subscription = id, sequence, topic = %topic, "subscribe sent");

        // Built before waiting so a cancelled call still detaches the route.
        let subscription =
            Subscription::new(id, topic, rx, interrupted, Arc::downgrade(&self.shared));
        let initial = reply_rx.await.map_err(|_| ClientError::ConnectionLost)??;
        Ok((initial, subscription))
    }

    /// Subscribe to parameter values.
    ///
    /// The reply lists the accepted parameters and the `numericId → id`
    /// mapping the handle uses to restore ids in pushed samples.
    pub async fn subscribe_parameters(
        &self,
        request: ParameterSubscriptionRequest,
    ) -> Result<(ParameterSubscriptionReply, Subscription)> {
        let topic = Topic::Parameters(request);
        let name = topic.name();
        match self.subscribe(topic).await? {
            (InitialReply::Parameters(reply), subscription) => Ok((reply, subscription)),
            _ => Err(ClientError::UnexpectedReply {
                topic: name.to_string(),
                reason: "reply is not a parameter subscription".to_string(),
            }),
        }
    }

    /// Send a one-off request and wait for its terminal frame.
    ///
    /// No timeout is applied; wrap the call in `tokio::time::timeout` if one
    /// is needed.
    pub async fn request(&self, body: RequestBody) -> Result<ReplyBody> {
        let (tx, rx) = oneshot::channel();
        let sequence = {
            let mut state = self.shared.lock();
            self.shared
                .send_request(&mut state, &body, Completion::Request(tx))?
        };
        debug!(sequence, action = %body.action, "request sent");
        rx.await.map_err(|_| ClientError::ConnectionLost)?
    }

    /// Returns true after `CONNECTION_INFO` arrived on the current link.
    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Follow the logical connection state.
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Wait until the current or a future link is logically connected.
    ///
    /// Fails with [`ClientError::Closed`] once the client is closed, including
    /// when it is closed while waiting.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut connected = self.shared.connected.subscribe();
        let mut shutdown = self.shared.shutdown.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|closed| *closed) => Err(ClientError::Closed),
            res = connected.wait_for(|connected| *connected) => {
                res.map(|_| ()).map_err(|_| ClientError::Closed)
            }
        }
    }

    /// Latest `CONNECTION_INFO` pushed by the server.
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.shared.connection_info.borrow().clone()
    }

    /// Follow every `CONNECTION_INFO` push.
    pub fn watch_connection_info(&self) -> watch::Receiver<Option<ConnectionInfo>> {
        self.shared.connection_info.subscribe()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.shared.lock().registry.len()
    }

    /// Close the link and end every subscription. Idempotent.
    ///
    /// Pending requests fail with [`ClientError::Closed`].
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        if let Some(link) = state.link.take() {
            link.sender.close();
        }
        for pending in state.correlator.drain(u64::MAX) {
            pending.completion.reject(ClientError::Closed);
        }
        state.router.clear();
        state.registry.clear();
        self.shared.connected.send_replace(false);
        self.shared.shutdown.send_replace(true);
        info!("client closed");
    }
}

impl Drop for SubscriptionClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one request and register its completion.
    ///
    /// Runs under the state lock so sequence assignment and registration
    /// are atomic. A failed write consumes no sequence.
    fn send_request(
        &self,
        state: &mut State,
        body: &RequestBody,
        completion: Completion,
    ) -> Result<u64> {
        if state.closed {
            return Err(ClientError::Closed);
        }
        let link = state.link.as_ref().ok_or(ClientError::NotConnected)?;
        let sequence = state.correlator.peek_sequence();
        let text = encode_frame(&Frame::request(sequence, body), &self.config.frame)?;
        link.sender
            .send(text)
            .map_err(|_| ClientError::NotConnected)?;
        let generation = link.generation;
        Ok(state.correlator.register(generation, completion))
    }

    /// Forget a subscription. Called by [`Subscription::unsubscribe`].
    pub(crate) fn detach(&self, id: SubscriptionId) {
        let mut state = self.lock();
        let routed = state.router.remove(id);
        let recorded = state.registry.remove(id);
        if routed || recorded {
            debug!(subscription = id, "unsubscribed");
        }
    }

    /// Tear down `generation` if it is still the current link.
    ///
    /// Returns false when it already was, so repeated calls have no effect.
    fn close_link(&self, state: &mut State, generation: u64, reason: &CloseReason) -> bool {
        if !state.is_current(generation) {
            return false;
        }
        if let Some(link) = state.link.take() {
            link.sender.close();
        }
        let pending = state.correlator.drain(generation);
        let lost = pending.len();
        for request in pending {
            request.completion.reject(ClientError::ConnectionLost);
        }
        state.router.interrupt_all();
        self.connected.send_replace(false);
        info!(generation, %reason, pending = lost, "link closed");
        true
    }

    fn handle_closed(&self, generation: u64, reason: &CloseReason) -> bool {
        let mut state = self.lock();
        self.close_link(&mut state, generation, reason)
    }

    fn handle_message(&self, generation: u64, text: &str) {
        let frame = match decode_frame(text, &self.config.frame) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%err, "dropping malformed frame");
                return;
            }
        };

        match frame.kind {
            MessageKind::Reply => {
                let outcome = frame.reply_body().map_err(ClientError::from);
                self.complete(generation, frame.sequence, outcome);
            }
            MessageKind::Exception => match frame.exception_body() {
                Ok(body) => {
                    let err = ClientError::ServerException {
                        kind: body.et,
                        message: body.msg,
                    };
                    self.complete(generation, frame.sequence, Err(err));
                }
                Err(err) => {
                    self.complete(generation, frame.sequence, Err(err.into()));
                }
            },
            MessageKind::Data => {
                let event = frame
                    .data_body()
                    .map_err(ClientError::from)
                    .and_then(|body| {
                        let tag = body.dt.clone();
                        TopicEvent::decode(body)
                            .map_err(ClientError::from)
                            .map(|event| (tag, event))
                    });
                match event {
                    Ok((_, Some(event))) => self.dispatch(generation, event),
                    Ok((tag, None)) => debug!(tag, "dropping push for unknown topic"),
                    Err(err) => warn!(%err, "dropping malformed push"),
                }
            }
            MessageKind::Request => {
                warn!(sequence = frame.sequence, "dropping request frame sent by server");
            }
        }
    }

    /// Resolve the request answered by a REPLY or EXCEPTION frame.
    fn complete(&self, generation: u64, sequence: u64, outcome: Result<ReplyBody>) {
        let mut state = self.lock();
        if !state.is_current(generation) {
            debug!(generation, sequence, "dropping reply from a detached link");
            return;
        }
        let Some(pending) = state.correlator.take(sequence) else {
            if let Err(err) = outcome {
                warn!(sequence, %err, "server error without a pending request");
            }
            return;
        };

        match pending.completion {
            Completion::Request(tx) => {
                let _ = tx.send(outcome);
            }
            Completion::Subscribe {
                id,
                topic,
                sink,
                interrupted,
                reply,
            } => match outcome.and_then(|body| InitialReply::decode(&topic, body)) {
                Ok(initial) => {
                    let binding = binding_for(&initial);
                    state
                        .router
                        .insert(id, topic.clone(), binding, sink, interrupted);
                    state.registry.record(id, topic, generation);
                    if reply.send(Ok(initial)).is_err() {
                        // Caller gave up while the request was in flight.
                        state.router.remove(id);
                        state.registry.remove(id);
                    }
                }
                Err(err) => {
                    let _ = reply.send(Err(err));
                }
            },
            Completion::Replay { id, topic } => {
                if !state.registry.contains(id) {
                    debug!(subscription = id, "replayed subscription was dropped meanwhile");
                    return;
                }
                match outcome.and_then(|body| InitialReply::decode(&topic, body)) {
                    Ok(initial) => {
                        state.router.rebind(id, binding_for(&initial));
                        state.registry.confirm(id, generation);
                        debug!(subscription = id, topic = %topic, "subscription restored");
                    }
                    Err(err) => {
                        warn!(subscription = id, topic = %topic, %err, "replay failed, ending subscription");
                        state.registry.remove(id);
                        state.router.fail(id, err);
                    }
                }
            }
        }
    }

    fn dispatch(&self, generation: u64, event: TopicEvent) {
        let mut state = self.lock();
        if !state.is_current(generation) {
            return;
        }

        if let TopicEvent::ConnectionInfo(info) = event {
            let first = match state.link.as_mut() {
                Some(link) if !link.ready => {
                    link.ready = true;
                    true
                }
                _ => false,
            };
            debug!(client_id = info.client_id, first, "connection info");
            self.connection_info.send_replace(Some(info));
            if first {
                self.connected.send_replace(true);
                self.replay(&mut state, generation);
            }
            return;
        }

        state.router.route(&event);
    }

    /// Re-issue the subscribe request of every subscription not yet
    /// confirmed on `generation`.
    fn replay(&self, state: &mut State, generation: u64) {
        let stale = state.registry.stale(generation);
        if stale.is_empty() {
            return;
        }
        info!(generation, count = stale.len(), "replaying subscriptions");

        for (id, topic) in stale {
            let sent = topic.request_body().and_then(|body| {
                self.send_request(
                    state,
                    &body,
                    Completion::Replay {
                        id,
                        topic: topic.clone(),
                    },
                )
            });
            match sent {
                Ok(sequence) => debug!(subscription = id, sequence, "replay sent"),
                // Link went away; the rest waits for the next one.
                Err(ClientError::NotConnected) => break,
                Err(err) => {
                    warn!(subscription = id, %err, "replay not sent, ending subscription");
                    state.registry.remove(id);
                    state.router.fail(id, err);
                }
            }
        }
    }
}

fn binding_for(initial: &InitialReply) -> Binding {
    match initial {
        InitialReply::Parameters(reply) => Binding::from(reply),
        _ => Binding::default(),
    }
}

/// Per-link task: feeds inbound messages to the client until the link closes
/// or is detached.
async fn drive(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    mut stop: oneshot::Receiver<()>,
) -> CloseReason {
    let reason = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TransportEvent::Opened) => debug!(generation, "link open"),
                Some(TransportEvent::Message(text)) => shared.handle_message(generation, &text),
                Some(TransportEvent::Closed(reason)) => break reason,
                None => break CloseReason::remote(None, "transport task ended"),
            },
            _ = &mut stop => break CloseReason::local(),
        }
    };
    shared.handle_closed(generation, &reason);
    reason
}
