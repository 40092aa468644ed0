//! Session task: owns the transport, the heartbeat timer and the retry timer.
//!
//! Callers talk to it through a cloneable [`SessionClient`] handle. The task
//! multiplexes caller commands, transport frames, the in-flight open, the
//! heartbeat and the retry timer with `tokio::select!`, feeds each event to
//! [`SessionCore`] and executes the returned actions in order.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};

use idlemmo_shared::{ClientMessage, Envelope};

use crate::config::SessionConfig;
use crate::error::{SendOutcome, SessionError};
use crate::infrastructure::messaging::{
    set_connection_state, ConnectionState, ConnectionStateObserver, MessageDispatcher,
};

use super::core::{CoreAction, SessionCore};
use super::heartbeat::HeartbeatMonitor;
use super::transport::{Connector, Transport, TransportError};

const STATE_CHANNEL_CAPACITY: usize = 64;

type OpenResult = (u64, Result<Box<dyn Transport>, TransportError>);

enum Command {
    Connect {
        token: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Send {
        envelope: Envelope,
        reply: oneshot::Sender<SendOutcome>,
    },
}

/// Handle to a running session task.
///
/// The task stops, closing its transport, once every handle is dropped.
#[derive(Clone)]
pub struct SessionClient {
    commands: mpsc::Sender<Command>,
    observer: ConnectionStateObserver,
    state_changes: broadcast::Sender<ConnectionState>,
}

impl SessionClient {
    /// Spawn the session task on the current tokio runtime.
    pub fn spawn(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        dispatcher: MessageDispatcher,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8()));
        let (state_changes, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);

        let task = SessionTask {
            core: SessionCore::new(
                HeartbeatMonitor::new(config.heartbeat_interval, config.max_missed_pongs),
                config.confirm_on_first_message,
            ),
            config,
            connector,
            dispatcher,
            commands: command_rx,
            state: Arc::clone(&state),
            state_changes: state_changes.clone(),
            transport: None,
            transport_attempt: 0,
            opening: None,
            heartbeat: None,
            retry: None,
        };
        tokio::spawn(task.run());

        Self {
            commands,
            observer: ConnectionStateObserver::new(state),
            state_changes,
        }
    }

    /// Open the connection with `token`.
    ///
    /// Returns once the request is accepted, not once the session is live.
    /// Watch [`subscribe_state`](Self::subscribe_state) for progress.
    pub async fn connect(&self, token: &str) -> Result<(), SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::MissingToken);
        }
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Connect {
                token: token.to_string(),
                reply,
            },
            rx,
        )
        .await?
    }

    /// Close the connection and cancel any pending retry.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        // A stopped task has nothing left to disconnect.
        let _ = self.request(Command::Disconnect { reply }, rx).await;
    }

    /// Send an envelope if the session is live.
    pub async fn send(&self, envelope: Envelope) -> Result<SendOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send { envelope, reply }, rx).await
    }

    pub async fn send_message(&self, message: &ClientMessage) -> Result<SendOutcome, SessionError> {
        self.send(message.to_envelope()?).await
    }

    pub fn state(&self) -> ConnectionState {
        self.observer.state()
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        self.observer.clone()
    }

    /// Every state transition from now on, in order.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_changes.subscribe()
    }

    async fn request<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        rx.await.map_err(|_| SessionError::SessionClosed)
    }
}

struct SessionTask {
    core: SessionCore,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    dispatcher: MessageDispatcher,
    commands: mpsc::Receiver<Command>,
    state: Arc<AtomicU8>,
    state_changes: broadcast::Sender<ConnectionState>,
    transport: Option<Box<dyn Transport>>,
    transport_attempt: u64,
    opening: Option<BoxFuture<'static, OpenResult>>,
    heartbeat: Option<Interval>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                opened = open_in_flight(&mut self.opening), if self.opening.is_some() => {
                    self.opening = None;
                    self.handle_opened(opened).await;
                }
                frame = next_frame(&mut self.transport), if self.transport.is_some() => {
                    self.handle_frame(frame).await;
                }
                _ = next_tick(&mut self.heartbeat), if self.heartbeat.is_some() => {
                    let actions = self.core.on_heartbeat_tick();
                    self.apply(actions).await;
                }
                _ = retry_elapsed(&mut self.retry), if self.retry.is_some() => {
                    self.retry = None;
                    let actions = self.core.on_retry_elapsed();
                    self.apply(actions).await;
                }
            }
        }

        tracing::debug!("All session handles dropped, shutting down");
        let actions = self.core.disconnect();
        self.apply(actions).await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { token, reply } => match self.core.connect(&token) {
                Ok(actions) => {
                    self.apply(actions).await;
                    let _ = reply.send(Ok(()));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Disconnect { reply } => {
                tracing::info!("Disconnect requested");
                let actions = self.core.disconnect();
                self.apply(actions).await;
                let _ = reply.send(());
            }
            Command::Send { envelope, reply } => {
                let (outcome, actions) = self.core.send(envelope);
                self.apply(actions).await;
                let _ = reply.send(outcome);
            }
        }
    }

    async fn handle_opened(&mut self, (attempt, result): OpenResult) {
        match result {
            Ok(mut transport) => {
                if !self.core.is_current(attempt) || self.core.state() != ConnectionState::Connecting
                {
                    tracing::debug!(attempt, "Closing transport from superseded attempt");
                    transport.close().await;
                    return;
                }
                self.transport = Some(transport);
                self.transport_attempt = attempt;
                let actions = self.core.on_transport_opened(attempt);
                self.apply(actions).await;
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Gateway connection failed");
                let actions = self.core.on_transport_failed(attempt);
                self.apply(actions).await;
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<Result<String, TransportError>>) {
        let attempt = self.transport_attempt;
        let actions = match frame {
            Some(Ok(text)) => {
                tracing::debug!(attempt, len = text.len(), "Frame received");
                self.core.on_frame(attempt, &text)
            }
            Some(Err(e)) => {
                tracing::error!(attempt, error = %e, "Transport error");
                self.core.on_transport_closed(attempt)
            }
            None => {
                tracing::info!(attempt, "Transport closed by peer");
                self.core.on_transport_closed(attempt)
            }
        };
        self.apply(actions).await;
    }

    async fn apply(&mut self, actions: Vec<CoreAction>) {
        let mut queue: VecDeque<CoreAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                CoreAction::StateChanged(state) => {
                    set_connection_state(&self.state, state);
                    tracing::info!(%state, attempt = self.core.attempt(), "Connection state changed");
                    // No receivers is fine.
                    let _ = self.state_changes.send(state);
                }
                CoreAction::OpenTransport { attempt, token } => {
                    match self.config.socket_url(&token) {
                        Ok(url) => {
                            let connector = Arc::clone(&self.connector);
                            self.opening = Some(Box::pin(async move {
                                let result = connector.connect(&url).await;
                                (attempt, result)
                            }));
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Cannot build socket URL");
                            queue.extend(self.core.on_transport_failed(attempt));
                        }
                    }
                }
                CoreAction::CloseTransport => {
                    self.opening = None;
                    if let Some(mut transport) = self.transport.take() {
                        transport.close().await;
                    }
                }
                CoreAction::Write(envelope) => {
                    let Some(transport) = self.transport.as_mut() else {
                        tracing::warn!(kind = %envelope.kind, "No transport for outbound frame");
                        continue;
                    };
                    let text = match envelope.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(kind = %envelope.kind, error = %e, "Failed to encode frame");
                            continue;
                        }
                    };
                    if let Err(e) = transport.send(text).await {
                        tracing::error!(kind = %envelope.kind, error = %e, "Failed to send frame");
                        queue.extend(self.core.on_transport_closed(self.transport_attempt));
                    }
                }
                CoreAction::Publish(envelope) => self.dispatcher.dispatch(&envelope),
                CoreAction::StartHeartbeat => {
                    let period = self.core.heartbeat_interval();
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.heartbeat = Some(interval);
                }
                CoreAction::StopHeartbeat => self.heartbeat = None,
                CoreAction::ScheduleRetry => {
                    tracing::warn!(delay = ?self.config.reconnect_delay, "Scheduling reconnect");
                    self.retry = Some(Box::pin(time::sleep(self.config.reconnect_delay)));
                }
                CoreAction::CancelRetry => self.retry = None,
            }
        }
    }
}

async fn open_in_flight(opening: &mut Option<BoxFuture<'static, OpenResult>>) -> OpenResult {
    match opening {
        Some(future) => future.await,
        None => pending().await,
    }
}

async fn next_frame(
    transport: &mut Option<Box<dyn Transport>>,
) -> Option<Result<String, TransportError>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::infrastructure::testing::{fixtures, MockConnector, MockServer};

    struct Harness {
        client: SessionClient,
        connector: Arc<MockConnector>,
        servers: UnboundedReceiver<MockServer>,
        states: broadcast::Receiver<ConnectionState>,
    }

    fn harness_with(config: SessionConfig, dispatcher: MessageDispatcher) -> Harness {
        let (connector, servers) = MockConnector::new();
        let client = SessionClient::spawn(config, connector.clone(), dispatcher);
        let states = client.subscribe_state();
        Harness {
            client,
            connector,
            servers,
            states,
        }
    }

    fn harness() -> Harness {
        harness_with(SessionConfig::default(), MessageDispatcher::new())
    }

    async fn wait_for(states: &mut broadcast::Receiver<ConnectionState>, target: ConnectionState) {
        loop {
            match states.recv().await {
                Ok(state) if state == target => return,
                Ok(_) => continue,
                Err(e) => panic!("state stream ended before {target}: {e}"),
            }
        }
    }

    /// Connect, answer the login and return the live server end.
    async fn go_live(h: &mut Harness) -> MockServer {
        h.client.connect("tok").await.unwrap();
        let mut server = h.servers.recv().await.unwrap();
        let login = server.next_envelope().await.unwrap();
        assert!(login.is("C_Login"));
        server.push_json(fixtures::login_ok("p1", 10));
        wait_for(&mut h.states, ConnectionState::Live).await;
        server
    }

    #[tokio::test]
    async fn test_connect_walks_states_in_order() {
        let mut h = harness();
        h.client.connect("tok").await.unwrap();

        let mut server = h.servers.recv().await.unwrap();
        assert_eq!(server.token().as_deref(), Some("tok"));
        assert_eq!(server.url().path(), "/ws");

        let login = server.next_envelope().await.unwrap();
        assert_eq!(login.kind, "C_Login");
        assert_eq!(login.get("token"), Some(&serde_json::json!("tok")));

        server.push_json(fixtures::login_ok("p1", 10));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(h.states.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Authenticating,
                ConnectionState::Live
            ]
        );
        assert_eq!(h.client.state(), ConnectionState::Live);
    }

    #[tokio::test]
    async fn test_missing_token_stays_disconnected() {
        let h = harness();
        let err = h.client.connect("").await.unwrap_err();
        assert!(matches!(err, SessionError::MissingToken));
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert_eq!(h.connector.attempts(), 0);
    }

    #[tokio::test]
    async fn test_connect_twice_opens_once() {
        let mut h = harness();
        let _server = go_live(&mut h).await;

        h.client.connect("tok").await.unwrap();
        assert_eq!(h.connector.attempts(), 1);
        assert_eq!(h.client.state(), ConnectionState::Live);
    }

    #[tokio::test]
    async fn test_send_is_dropped_until_live() {
        let mut h = harness();
        let outcome = h.client.send(Envelope::empty("C_ListBag")).await.unwrap();
        assert_eq!(outcome, SendOutcome::Dropped);

        let mut server = go_live(&mut h).await;
        let outcome = h
            .client
            .send_message(&ClientMessage::ListBag)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent);
        assert!(server.next_envelope().await.unwrap().is("C_ListBag"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_cadence_while_live() {
        let mut h = harness();
        let mut server = go_live(&mut h).await;
        let live_at = Instant::now();

        let ping = server.next_envelope().await.unwrap();
        assert!(ping.is("C_Ping"));
        let first = live_at.elapsed();
        assert!(first >= Duration::from_secs(25) && first < Duration::from_secs(26));

        server.push_json(fixtures::pong());
        let ping = server.next_envelope().await.unwrap();
        assert!(ping.is("C_Ping"));
        let second = live_at.elapsed();
        assert!(second >= Duration::from_secs(50) && second < Duration::from_secs(51));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ping_before_login_confirmed() {
        let mut h = harness();
        h.client.connect("tok").await.unwrap();
        let mut server = h.servers.recv().await.unwrap();
        assert!(server.next_envelope().await.unwrap().is("C_Login"));

        time::sleep(Duration::from_secs(60)).await;
        assert!(server.try_next_frame().is_none());
        assert_eq!(h.client.state(), ConnectionState::Authenticating);
    }

    #[tokio::test]
    async fn test_pong_never_reaches_subscribers() {
        let dispatcher = MessageDispatcher::new();
        let (tx, mut seen) = mpsc::unbounded_channel();
        dispatcher.subscribe(move |env| {
            let _ = tx.send(env.kind.clone());
        });

        let mut h = harness_with(SessionConfig::default(), dispatcher);
        let server = go_live(&mut h).await;

        server.push_json(fixtures::pong());
        server.push_json(fixtures::bag_info(&[("ore", 3)]));

        assert_eq!(seen.recv().await.unwrap(), "S_LoginOK");
        assert_eq!(seen.recv().await.unwrap(), "S_BagInfo");
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_session_live() {
        let dispatcher = MessageDispatcher::new();
        let (tx, mut seen) = mpsc::unbounded_channel();
        dispatcher.subscribe(move |env| {
            let _ = tx.send(env.kind.clone());
        });

        let mut h = harness_with(SessionConfig::default(), dispatcher);
        let server = go_live(&mut h).await;
        assert_eq!(seen.recv().await.unwrap(), "S_LoginOK");

        server.push("{definitely not json");
        server.push_json(fixtures::bag_info(&[]));

        assert_eq!(seen.recv().await.unwrap(), "S_BagInfo");
        assert_eq!(h.client.state(), ConnectionState::Live);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_with_same_token_after_delay() {
        let mut h = harness();
        let server = go_live(&mut h).await;

        let closed_at = Instant::now();
        server.close();
        wait_for(&mut h.states, ConnectionState::Reconnecting).await;

        let mut second = h.servers.recv().await.unwrap();
        let waited = closed_at.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_millis(2100));
        assert_eq!(second.token().as_deref(), Some("tok"));

        let login = second.next_envelope().await.unwrap();
        assert_eq!(login.get("token"), Some(&serde_json::json!("tok")));
        assert_eq!(h.connector.attempts(), 2);

        second.push_json(fixtures::login_ok("p1", 10));
        wait_for(&mut h.states, ConnectionState::Live).await;
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_open_is_retried() {
        let mut h = harness();
        h.connector.fail_next(1);

        h.client.connect("tok").await.unwrap();
        wait_for(&mut h.states, ConnectionState::Reconnecting).await;

        let mut server = h.servers.recv().await.unwrap();
        assert!(server.next_envelope().await.unwrap().is("C_Login"));
        assert_eq!(h.connector.attempts(), 2);
        assert_eq!(h.connector.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let mut h = harness();
        let server = go_live(&mut h).await;

        server.close();
        wait_for(&mut h.states, ConnectionState::Reconnecting).await;

        h.client.disconnect().await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);

        time::sleep(Duration::from_secs(10)).await;
        assert!(h.servers.try_recv().is_err());
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_closes_live_transport() {
        let mut h = harness();
        let mut server = go_live(&mut h).await;

        h.client.disconnect().await;
        assert_eq!(h.client.state(), ConnectionState::Disconnected);
        assert!(server.next_frame().await.is_none());

        let outcome = h.client.send(Envelope::empty("C_ListBag")).await.unwrap();
        assert_eq!(outcome, SendOutcome::Dropped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_pings_force_reconnect() {
        let config = SessionConfig::default()
            .with_heartbeat_interval(Duration::from_secs(1))
            .with_max_missed_pongs(Some(1));
        let mut h = harness_with(config, MessageDispatcher::new());
        let mut server = go_live(&mut h).await;
        let live_at = Instant::now();

        assert!(server.next_envelope().await.unwrap().is("C_Ping"));
        wait_for(&mut h.states, ConnectionState::Reconnecting).await;

        let elapsed = live_at.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
