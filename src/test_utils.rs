//! Test utilities: scripted transport and time helpers
//!
//! `MockConnector` hands out in-memory links numbered in connect order. Tests
//! push frames, errors and remote closes into a link by index and observe
//! pings and closes coming back.

use crate::ws::connection::{Connector, Frame, Result, Transport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

/// Let spawned tasks run. Under paused time this also advances the clock 1ms.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

enum MockInput {
    Text(String),
    Error(TransportError),
    Close,
}

#[derive(Default)]
struct LinkState {
    pings: u64,
    closed: bool,
    dropped: bool,
}

struct Link {
    input: UnboundedSender<MockInput>,
    state: Arc<Mutex<LinkState>>,
}

#[derive(Default)]
struct MockState {
    fail_connects: bool,
    hold_connects: bool,
    urls: Vec<String>,
    attempts: Vec<Instant>,
    links: Vec<Link>,
}

/// Scripted connector
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent connect fail immediately
    pub fn set_fail_connects(&self, fail: bool) {
        self.state.lock().fail_connects = fail;
    }

    /// Make every subsequent connect hang forever
    pub fn set_hold_connects(&self, hold: bool) {
        self.state.lock().hold_connects = hold;
    }

    /// URLs of every connect attempt, in order
    pub fn urls(&self) -> Vec<String> {
        self.state.lock().urls.clone()
    }

    /// Clock reading at every connect attempt
    pub fn attempt_times(&self) -> Vec<Instant> {
        self.state.lock().attempts.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().attempts.len()
    }

    /// Links whose transport is still alive
    pub fn open_links(&self) -> usize {
        self.state
            .lock()
            .links
            .iter()
            .filter(|link| !link.state.lock().dropped)
            .count()
    }

    pub fn push_text(&self, link: usize, text: &str) {
        self.push(link, MockInput::Text(text.to_string()));
    }

    pub fn push_error(&self, link: usize, error: TransportError) {
        self.push(link, MockInput::Error(error));
    }

    /// Simulate the server closing the link
    pub fn close_remote(&self, link: usize) {
        self.push(link, MockInput::Close);
    }

    pub fn pings(&self, link: usize) -> u64 {
        self.with_link(link, |state| state.pings)
    }

    /// Whether the link was closed locally
    pub fn is_closed(&self, link: usize) -> bool {
        self.with_link(link, |state| state.closed)
    }

    fn push(&self, link: usize, input: MockInput) {
        let state = self.state.lock();
        let link = state
            .links
            .get(link)
            .unwrap_or_else(|| panic!("no link #{}", link));
        // Transport may already be gone
        let _ = link.input.send(input);
    }

    fn with_link<T>(&self, link: usize, f: impl FnOnce(&LinkState) -> T) -> T {
        let state = self.state.lock();
        let link = state
            .links
            .get(link)
            .unwrap_or_else(|| panic!("no link #{}", link));
        let link_state = link.state.lock();
        f(&link_state)
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str) -> Result<MockTransport> {
        let (fail, hold) = {
            let mut state = self.state.lock();
            state.urls.push(url.to_string());
            state.attempts.push(Instant::now());
            (state.fail_connects, state.hold_connects)
        };

        if hold {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(TransportError::ConnectionFailed("connection refused".to_string()));
        }

        let (tx, rx) = unbounded_channel();
        let link_state = Arc::new(Mutex::new(LinkState::default()));
        self.state.lock().links.push(Link {
            input: tx,
            state: link_state.clone(),
        });

        Ok(MockTransport {
            input: rx,
            state: link_state,
        })
    }
}

/// In-memory transport fed by `MockConnector`
pub struct MockTransport {
    input: UnboundedReceiver<MockInput>,
    state: Arc<Mutex<LinkState>>,
}

impl Transport for MockTransport {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        match self.input.recv().await? {
            MockInput::Text(text) => Some(Ok(Frame::Text(text))),
            MockInput::Error(error) => Some(Err(error)),
            MockInput::Close => None,
        }
    }

    async fn ping(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::NotConnected);
        }
        state.pings += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.state.lock().dropped = true;
    }
}
