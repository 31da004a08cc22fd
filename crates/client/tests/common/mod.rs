// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! In-process relay for integration tests.
//!
//! Speaks the client protocol over real WebSockets on a random port: it
//! records handshakes and inbound messages, answers pings, fans published
//! events out to matching subscribers (never back to the publisher) and can
//! drop every connection on demand.

// Shared across test binaries; not every binary uses every helper.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cairn::{ClientMessage, ServerMessage, SyncEvent, SyncEventType};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// What a client sent during the WebSocket upgrade.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub authorization: Option<String>,
    pub user: Option<String>,
    pub terminal: Option<String>,
    pub query: Option<String>,
}

enum Outbound {
    Text(String),
    Close,
}

struct Peer {
    tx: mpsc::UnboundedSender<Outbound>,
    event_types: HashSet<SyncEventType>,
    project: Option<String>,
}

impl Peer {
    fn wants(&self, event: &SyncEvent) -> bool {
        self.event_types.contains(&event.event_type())
            && self
                .project
                .as_deref()
                .map_or(true, |project| event.project() == Some(project))
    }
}

#[derive(Default)]
struct RelayState {
    next_id: AtomicU64,
    handshakes: Mutex<Vec<Handshake>>,
    received: Mutex<Vec<ClientMessage>>,
    peers: Mutex<HashMap<u64, Peer>>,
}

/// A relay on 127.0.0.1 with a random port.
pub struct TestRelay {
    addr: SocketAddr,
    state: Arc<RelayState>,
    accept: JoinHandle<()>,
}

impl TestRelay {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(RelayState::default());

        let accept_state = Arc::clone(&state);
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        TestRelay {
            addr,
            state,
            accept,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn handshakes(&self) -> Vec<Handshake> {
        self.state.handshakes.lock().unwrap().clone()
    }

    /// Every message received from any client, oldest first.
    pub fn received(&self) -> Vec<ClientMessage> {
        self.state.received.lock().unwrap().clone()
    }

    /// Number of open connections.
    pub fn connections(&self) -> usize {
        self.state.peers.lock().unwrap().len()
    }

    /// Number of connections subscribed to `event_type`.
    pub fn subscribers(&self, event_type: SyncEventType) -> usize {
        self.state
            .peers
            .lock()
            .unwrap()
            .values()
            .filter(|peer| peer.event_types.contains(&event_type))
            .count()
    }

    /// Sends a raw text frame to every connection.
    pub fn broadcast_raw(&self, text: &str) {
        for peer in self.state.peers.lock().unwrap().values() {
            let _ = peer.tx.send(Outbound::Text(text.to_string()));
        }
    }

    /// Closes every connection from the relay side. The listener keeps running.
    pub fn drop_all(&self) {
        for peer in self.state.peers.lock().unwrap().values() {
            let _ = peer.tx.send(Outbound::Close);
        }
    }

    /// Stops accepting and closes every connection.
    pub fn stop(&self) {
        self.accept.abort();
        self.drop_all();
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(stream: TcpStream, state: Arc<RelayState>) {
    let mut handshake = Handshake::default();
    let record = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        handshake.authorization = header("authorization");
        handshake.user = header("x-cairn-user");
        handshake.terminal = header("x-cairn-terminal");
        handshake.query = request.uri().query().map(str::to_string);
        Ok(response)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, record).await;
    let Ok(ws) = ws else {
        return;
    };
    state.handshakes.lock().unwrap().push(handshake);

    let id = state.next_id.fetch_add(1, Ordering::SeqCst);
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.peers.lock().unwrap().insert(
        id,
        Peer {
            tx: tx.clone(),
            event_types: HashSet::new(),
            project: None,
        },
    );

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => handle(&state, id, &tx, text.as_str()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.peers.lock().unwrap().remove(&id);
}

fn handle(state: &RelayState, id: u64, tx: &mpsc::UnboundedSender<Outbound>, text: &str) {
    let Ok(msg) = ClientMessage::from_json(text) else {
        return;
    };
    state.received.lock().unwrap().push(msg.clone());

    let mut peers = state.peers.lock().unwrap();
    match msg {
        ClientMessage::Publish { event } => {
            let frame = ServerMessage::event(event.clone()).to_json().unwrap();
            for (peer_id, peer) in peers.iter() {
                if *peer_id != id && peer.wants(&event) {
                    let _ = peer.tx.send(Outbound::Text(frame.clone()));
                }
            }
            let ack = ServerMessage::ack(event.id()).to_json().unwrap();
            let _ = tx.send(Outbound::Text(ack));
        }
        ClientMessage::Subscribe {
            event_types,
            project,
        } => {
            if let Some(peer) = peers.get_mut(&id) {
                peer.event_types.extend(event_types);
                peer.project = project;
            }
        }
        ClientMessage::Unsubscribe { event_types } => {
            if let Some(peer) = peers.get_mut(&id) {
                for event_type in event_types {
                    peer.event_types.remove(&event_type);
                }
            }
        }
        ClientMessage::Ping => {
            let _ = tx.send(Outbound::Text(ServerMessage::pong().to_json().unwrap()));
        }
    }
}

/// Polls `condition` until it holds, panicking after five seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
