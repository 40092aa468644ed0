//! Game session - one explicit object per logged-in client.
//!
//! Owns the identity, the connection, the dispatcher and the game store, so
//! nothing in the crate needs process-global state. Views hold a
//! `GameSession` (it is cheap to clone) and read through [`GameStore`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use idlemmo_domain::{CatalogProvider, SessionIdentity};
use idlemmo_shared::{ClientMessage, Envelope};

use crate::config::SessionConfig;
use crate::error::{SendOutcome, SessionError};
use crate::infrastructure::messaging::{
    ConnectionState, ConnectionStateObserver, MessageDispatcher, SubscriptionId,
};
use crate::infrastructure::websocket::{Connector, SessionClient};
use crate::state::GameStore;

#[derive(Clone)]
pub struct GameSession {
    client: SessionClient,
    dispatcher: MessageDispatcher,
    store: GameStore,
    catalog: Arc<dyn CatalogProvider>,
    identity: Arc<RwLock<SessionIdentity>>,
}

impl GameSession {
    /// Validate `config`, spawn the connection task and attach the reducer.
    ///
    /// Must be called inside a tokio runtime. The session starts
    /// `Disconnected`; call [`login`](Self::login) to go online.
    pub fn start(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        catalog: Arc<dyn CatalogProvider>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let dispatcher = MessageDispatcher::new();
        let store = GameStore::new();
        dispatcher.subscribe(store.reducer(catalog.equipment_catalog()));

        let client = SessionClient::spawn(config, connector, dispatcher.clone());
        tracing::debug!("Game session started");

        Ok(Self {
            client,
            dispatcher,
            store,
            catalog,
            identity: Arc::new(RwLock::new(SessionIdentity::default())),
        })
    }

    /// Record the account and connect with its token.
    ///
    /// Logging in with a different token while a previous account is held
    /// drops that connection and its mirrored state first, so the identity
    /// and the token on the wire never diverge.
    pub async fn login(
        &self,
        account_name: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<(), SessionError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SessionError::MissingToken);
        }
        let account_name = account_name.into();

        let switching = self
            .identity()
            .token()
            .is_some_and(|current| current != token);
        if switching {
            tracing::info!(account = %account_name, "Switching account");
            self.client.disconnect().await;
            self.store.reset();
        }

        tracing::info!(account = %account_name, "Logging in");
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .login(account_name, token);
        self.connect().await
    }

    /// Connect with the stored token.
    pub async fn connect(&self) -> Result<(), SessionError> {
        let token = self
            .identity()
            .token()
            .map(str::to_string)
            .ok_or(SessionError::MissingToken)?;
        self.client.connect(&token).await
    }

    /// Drop the connection, keeping identity and mirrored state.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Disconnect, reset the mirror and forget the identity.
    pub async fn logout(&self) {
        self.client.disconnect().await;
        self.store.reset();
        self.identity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .logout();
        tracing::info!("Logged out");
    }

    pub async fn send(&self, message: &ClientMessage) -> Result<SendOutcome, SessionError> {
        self.client.send_message(message).await
    }

    pub async fn send_envelope(&self, envelope: Envelope) -> Result<SendOutcome, SessionError> {
        self.client.send(envelope).await
    }

    pub async fn list_sequences(&self) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::ListSequences).await
    }

    /// Start `seq_id`, optionally on a sub-project. An empty id means none.
    pub async fn start_sequence(
        &self,
        seq_id: &str,
        sub_project_id: Option<&str>,
    ) -> Result<SendOutcome, SessionError> {
        let message = ClientMessage::start_sequence(seq_id, sub_project_id.map(str::to_string));
        self.send(&message).await
    }

    pub async fn stop_sequence(&self) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::StopSequence).await
    }

    pub async fn list_bag(&self) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::ListBag).await
    }

    pub async fn list_equipment(&self) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::ListEquipment).await
    }

    pub async fn equip_item(
        &self,
        item_id: &str,
        enhancement: i32,
    ) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::EquipItem {
            item_id: item_id.to_string(),
            enhancement,
        })
        .await
    }

    pub async fn unequip_item(&self, slot: &str) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::UnequipItem {
            slot: slot.to_string(),
        })
        .await
    }

    pub async fn use_item(&self, item_id: &str, count: i64) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::UseItem {
            item_id: item_id.to_string(),
            count,
        })
        .await
    }

    pub async fn remove_item(&self, item_id: &str, count: i64) -> Result<SendOutcome, SessionError> {
        self.send(&ClientMessage::RemoveItem {
            item_id: item_id.to_string(),
            count,
        })
        .await
    }

    /// Receive every inbound envelope except heartbeat responses.
    ///
    /// The callback runs on the connection task; keep it short.
    pub fn subscribe(&self, callback: impl FnMut(&Envelope) + Send + 'static) -> SubscriptionId {
        self.dispatcher.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.client.subscribe_state()
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        self.client.observer()
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// A copy of the current identity.
    pub fn identity(&self) -> SessionIdentity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogProvider> {
        &self.catalog
    }

    /// Tick interval of the running sequence, `None` when idle.
    pub fn current_effective_interval(&self) -> Option<Duration> {
        self.store
            .snapshot()
            .current_effective_interval(self.catalog.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::infrastructure::testing::{fixtures, MockConnector, MockServer};
    use crate::state::GameState;

    struct Harness {
        session: GameSession,
        connector: Arc<MockConnector>,
        servers: UnboundedReceiver<MockServer>,
    }

    fn harness() -> Harness {
        let (connector, servers) = MockConnector::new();
        let session = GameSession::start(
            SessionConfig::default(),
            connector.clone(),
            Arc::new(fixtures::sample_catalog()),
        )
        .unwrap();
        Harness {
            session,
            connector,
            servers,
        }
    }

    async fn wait_for_state(session: &GameSession, done: impl FnMut(&GameState) -> bool) {
        let mut rx = session.store().watch();
        rx.wait_for(done).await.unwrap();
    }

    async fn go_live(h: &mut Harness) -> MockServer {
        h.session.login("alice", "tok").await.unwrap();
        let mut server = h.servers.recv().await.unwrap();
        let login = server.next_envelope().await.unwrap();
        assert!(login.is("C_Login"));
        server.push_json(fixtures::login_ok("p1", 10));
        wait_for_state(&h.session, |s| s.player_id.is_some()).await;
        server
    }

    #[tokio::test]
    async fn test_login_then_equip_updates_mirror() {
        let mut h = harness();
        let mut states = h.session.subscribe_state();
        let server = go_live(&mut h).await;

        assert_eq!(server.token().as_deref(), Some("tok"));
        assert_eq!(h.session.store().snapshot().player.exp, 10);
        assert_eq!(h.session.identity().account_name, "alice");

        let mut seen = Vec::new();
        while seen.last() != Some(&ConnectionState::Live) {
            seen.push(states.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Authenticating,
                ConnectionState::Live
            ]
        );

        server.push_json(fixtures::equipment_changed("weapon", "sword1"));
        wait_for_state(&h.session, |s| !s.player.equipment.is_empty()).await;
        let state = h.session.store().snapshot();
        assert_eq!(state.player.equipment_bonus.exp_multiplier, 0.1);
    }

    #[tokio::test]
    async fn test_missing_token_is_rejected() {
        let h = harness();
        assert!(matches!(
            h.session.connect().await,
            Err(SessionError::MissingToken)
        ));
        assert!(matches!(
            h.session.login("alice", "  ").await,
            Err(SessionError::MissingToken)
        ));
        assert!(!h.session.identity().is_authenticated());
        assert_eq!(h.connector.attempts(), 0);
        assert_eq!(h.session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (connector, _servers) = MockConnector::new();
        let result = GameSession::start(
            SessionConfig::new("not a url"),
            connector,
            Arc::new(fixtures::sample_catalog()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_logout_resets_state_and_identity() {
        let mut h = harness();
        let server = go_live(&mut h).await;
        server.push_json(fixtures::seq_started("mining", 4, "deep_vein"));
        wait_for_state(&h.session, |s| s.run.is_running).await;

        h.session.logout().await;

        assert_eq!(h.session.store().snapshot(), GameState::default());
        assert!(!h.session.identity().is_authenticated());
        assert_eq!(h.session.connection_state(), ConnectionState::Disconnected);
        assert!(matches!(
            h.session.connect().await,
            Err(SessionError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_login_as_other_account_reconnects_with_new_token() {
        let mut h = harness();
        let first = go_live(&mut h).await;
        first.push_json(fixtures::bag_info(&[("ore", 5)]));
        wait_for_state(&h.session, |s| !s.player.inventory.is_empty()).await;

        h.session.login("bob", "tok-b").await.unwrap();

        let mut second = h.servers.recv().await.unwrap();
        assert_eq!(second.token().as_deref(), Some("tok-b"));
        assert_eq!(h.connector.attempts(), 2);
        let identity = h.session.identity();
        assert_eq!(identity.account_name, "bob");
        assert_eq!(identity.token(), Some("tok-b"));
        assert!(h.session.store().snapshot().player.inventory.is_empty());

        let login = second.next_envelope().await.unwrap();
        assert_eq!(login.get("token"), Some(&serde_json::json!("tok-b")));
    }

    #[tokio::test]
    async fn test_repeated_login_with_same_token_keeps_connection() {
        let mut h = harness();
        let _server = go_live(&mut h).await;

        h.session.login("alice", "tok").await.unwrap();
        assert_eq!(h.connector.attempts(), 1);
        assert_eq!(h.session.connection_state(), ConnectionState::Live);
        assert_eq!(h.session.store().snapshot().player.exp, 10);
    }

    #[tokio::test]
    async fn test_commands_reach_the_server_when_live() {
        let mut h = harness();
        let mut server = go_live(&mut h).await;

        let outcome = h
            .session
            .start_sequence("mining", Some("deep_vein"))
            .await
            .unwrap();
        assert!(outcome.is_sent());
        let frame = server.next_envelope().await.unwrap();
        assert_eq!(frame.kind, "C_StartSeq");
        assert_eq!(frame.get("sub_project_id"), Some(&serde_json::json!("deep_vein")));

        h.session.equip_item("sword1", 2).await.unwrap();
        let frame = server.next_envelope().await.unwrap();
        assert_eq!(frame.kind, "C_EquipItem");
        assert_eq!(frame.get("enhancement"), Some(&serde_json::json!(2)));

        h.session.remove_item("ore", 3).await.unwrap();
        let frame = server.next_envelope().await.unwrap();
        assert_eq!(frame.kind, "C_RemoveItem");
        assert_eq!(frame.get("count"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn test_commands_are_dropped_while_offline() {
        let h = harness();
        assert_eq!(
            h.session.stop_sequence().await.unwrap(),
            SendOutcome::Dropped
        );
        assert_eq!(h.session.list_bag().await.unwrap(), SendOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_subscribers_see_messages_but_not_pongs() {
        let mut h = harness();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = h
            .session
            .subscribe(move |env| sink.lock().unwrap().push(env.kind.clone()));

        let server = go_live(&mut h).await;
        server.push_json(fixtures::pong());
        server.push_json(json_exp(42));
        wait_for_state(&h.session, |s| s.player.exp == 42).await;

        assert_eq!(*seen.lock().unwrap(), vec!["S_LoginOK", "S_ExpUpdate"]);
        assert!(h.session.unsubscribe(id));
        assert!(!h.session.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_current_interval_follows_run_status() {
        let mut h = harness();
        assert_eq!(h.session.current_effective_interval(), None);

        let server = go_live(&mut h).await;
        server.push_json(fixtures::seq_started("mining", 1, "quick"));
        wait_for_state(&h.session, |s| s.run.is_running).await;

        assert_eq!(
            h.session.current_effective_interval(),
            Some(Duration::from_millis(500))
        );
    }

    fn json_exp(exp: i64) -> serde_json::Value {
        serde_json::json!({"type": "S_ExpUpdate", "exp": exp})
    }
}
