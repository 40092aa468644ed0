//! In-memory transport pair.
//!
//! Every successful [`MockConnector::connect`] hands the client a
//! [`MockTransport`] and hands the test the matching [`MockServer`] through
//! the receiver returned by [`MockConnector::new`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use idlemmo_shared::Envelope;

use crate::infrastructure::websocket::{Connector, Transport, TransportError};

enum ServerFrame {
    Text(String),
    Close,
}

/// Connector that opens in-memory transports.
pub struct MockConnector {
    servers: mpsc::UnboundedSender<MockServer>,
    fail_next: AtomicU32,
    attempts: AtomicU32,
    opened: Mutex<Vec<Url>>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            servers,
            fail_next: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            opened: Mutex::new(Vec::new()),
        });
        (connector, rx)
    }

    /// Make the next `n` connect attempts fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Connect calls so far, failed ones included.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Transports successfully opened so far.
    pub fn open_count(&self) -> usize {
        self.opened_urls().len()
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("refused by mock".to_string()));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (to_server, server_rx) = mpsc::unbounded_channel();
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());

        // A test that stopped listening just sees the transport close.
        let _ = self.servers.send(MockServer {
            url: url.clone(),
            outbound: to_client,
            inbound: server_rx,
        });

        Ok(Box::new(MockTransport {
            inbound: client_rx,
            outbound: to_server,
        }))
    }
}

/// Client end of an in-memory connection.
pub struct MockTransport {
    inbound: mpsc::UnboundedReceiver<ServerFrame>,
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        match self.inbound.recv().await {
            Some(ServerFrame::Text(text)) => Some(Ok(text)),
            Some(ServerFrame::Close) | None => None,
        }
    }

    async fn close(&mut self) {
        self.inbound.close();
    }
}

/// Test end of an in-memory connection.
pub struct MockServer {
    url: Url,
    outbound: mpsc::UnboundedSender<ServerFrame>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `token` query parameter the client connected with.
    pub fn token(&self) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }

    /// Push a raw text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.outbound.send(ServerFrame::Text(text.into()));
    }

    pub fn push_json(&self, value: Value) {
        self.push(value.to_string());
    }

    /// Close the connection from the server side.
    pub fn close(&self) {
        let _ = self.outbound.send(ServerFrame::Close);
    }

    /// Next frame the client wrote. `None` once the client dropped its end.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Next frame decoded as an envelope; undecodable frames read as `None`.
    pub async fn next_envelope(&mut self) -> Option<Envelope> {
        let text = self.next_frame().await?;
        Envelope::decode(&text).ok()
    }

    /// A frame the client already wrote, without waiting.
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }
}
