//! Mock link for deterministic testing of protocol engines.
//!
//! [`MockLink`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. Responses are not returned from `transmit()`:
//! like a real serial port they are pushed, byte by byte, through the
//! [`LinkRegistry`] into whichever engine owns the link, right after the
//! transmit completion signal.
//!
//! # Example
//!
//! ```
//! use swarmlink_core::LinkRegistry;
//! use swarmlink_test_harness::MockLink;
//!
//! let registry = LinkRegistry::new();
//! let mock = MockLink::new(registry.clone());
//! let handle = mock.handle();
//! // GFWV request, answered with firmware 1.4.2.
//! handle.expect(
//!     &[0x7F, 0x02, 0x54, 0x08, 0x9E, 0xC6],
//!     &[0x7F, 0x06, 0x54, 0x08, 0x01, 0x04, 0x02, 0x00, 0xCB, 0x48],
//! );
//! assert_eq!(handle.remaining_expectations(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use swarmlink_core::{Error, LinkId, LinkRegistry, Result, Transport};

/// A pre-loaded request and what the "device" does about it.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be transmitted.
    request: Vec<u8>,
    /// Bytes delivered to the engine after the transmission completes.
    /// `None` means the device stays silent.
    response: Option<Vec<u8>>,
}

#[derive(Debug)]
struct State {
    expectations: VecDeque<Expectation>,
    sent_log: Vec<Vec<u8>>,
    connected: bool,
    reject_next: bool,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. Each `transmit()` is recorded and
/// matched against the next expectation; a mismatch or an empty queue fails
/// the transmission with [`Error::Protocol`].
pub struct MockLink {
    link: LinkId,
    registry: Arc<LinkRegistry>,
    state: Arc<Mutex<State>>,
}

/// Shared handle for scripting and inspecting a [`MockLink`] after it has
/// been moved into an engine.
#[derive(Clone)]
pub struct MockHandle {
    link: LinkId,
    registry: Arc<LinkRegistry>,
    state: Arc<Mutex<State>>,
}

impl MockLink {
    /// Create a connected mock link with a fresh id from `registry`.
    pub fn new(registry: Arc<LinkRegistry>) -> Self {
        MockLink {
            link: registry.allocate(),
            registry,
            state: Arc::new(Mutex::new(State {
                expectations: VecDeque::new(),
                sent_log: Vec::new(),
                connected: true,
                reject_next: false,
            })),
        }
    }

    /// A handle sharing this link's script and log.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            link: self.link,
            registry: self.registry.clone(),
            state: self.state.clone(),
        }
    }
}

impl MockHandle {
    /// Add an expected request and the response the device sends back.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.state.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: Some(response.to_vec()),
        });
    }

    /// Add an expected request the device never answers.
    pub fn expect_silence(&self, request: &[u8]) {
        self.state.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: None,
        });
    }

    /// Deliver bytes to the engine as if the device had sent them
    /// spontaneously.
    pub fn inject(&self, bytes: &[u8]) {
        self.registry.dispatch_bytes(self.link, bytes);
    }

    /// Make the next `transmit()` fail with [`Error::Transport`] without
    /// consuming an expectation.
    pub fn reject_next_transmit(&self) {
        self.state.lock().reject_next = true;
    }

    /// All data transmitted so far, one element per `transmit()` call.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.state.lock().sent_log.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.state.lock().expectations.len()
    }

    /// Set the connected state. While disconnected, `transmit()` returns
    /// [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// Id under which this link dispatches inbound bytes.
    pub fn link_id(&self) -> LinkId {
        self.link
    }
}

#[async_trait]
impl Transport for MockLink {
    async fn transmit(&mut self, data: &[u8]) -> Result<()> {
        let response = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(Error::NotConnected);
            }
            if state.reject_next {
                state.reject_next = false;
                return Err(Error::Transport("transmit rejected by mock link".into()));
            }

            state.sent_log.push(data.to_vec());

            let Some(expectation) = state.expectations.pop_front() else {
                return Err(Error::Protocol("no more expectations in mock link".into()));
            };
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected transmit data: expected {:02X?}, got {:02X?}",
                    expectation.request, data
                )));
            }
            expectation.response
        };

        trace!(link = %self.link, len = data.len(), "mock transmit");
        self.registry.dispatch_transmit_complete(self.link);
        if let Some(bytes) = response {
            self.registry.dispatch_bytes(self.link, &bytes);
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn link_id(&self) -> LinkId {
        self.link
    }
}
