//! Single-outstanding-exchange coordinator.
//!
//! The coordinator owns the transport and the frame decoder for one link. It
//! sits between two execution contexts:
//!
//! - the **command context** calls [`ExchangeCoordinator::send`] and then
//!   [`ExchangeCoordinator::await_response`], and is the only side that
//!   ever suspends;
//! - the **receive context** (the transport's reader task or the mock link)
//!   calls the [`ByteSink`] methods once per byte and once per transmit
//!   completion. It never blocks: each byte does bounded work under a short
//!   `parking_lot` lock.
//!
//! A validated response is moved into a one-shot channel before the waiter
//! can observe it. At most one exchange is outstanding; a second `send`
//! fails with [`Error::TransportBusy`] and leaves the first untouched.
//!
//! ```text
//! Idle --send--> AwaitingResponse --+--> Fulfilled --+
//!                                   +--> TimedOut  --+--> Idle
//!                                   +--> CrcFailed --+
//!                                   +--> Desynced  --+
//! ```

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use swarmlink_core::{ByteSink, Error, LinkId, LinkRegistry, Result, Transport};

use crate::events::NodeEvent;
use crate::frame::{FeedEvent, FrameCodec, FrameDecoder, LogicalFrame};
use crate::status;

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No exchange outstanding.
    Idle,
    /// A request was sent and its response has not been resolved yet.
    AwaitingResponse,
    /// The response arrived and is waiting to be collected.
    Fulfilled,
    /// The deadline passed without a response.
    TimedOut,
    /// The response failed its CRC check.
    CrcFailed,
    /// Framing was lost while waiting for the response.
    Desynced,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingResponse => "awaiting response",
            Phase::Fulfilled => "fulfilled",
            Phase::TimedOut => "timed out",
            Phase::CrcFailed => "CRC failed",
            Phase::Desynced => "desynced",
        };
        f.write_str(name)
    }
}

/// Engine-wide settings for one coordinator.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeConfig {
    /// How long a request may wait for its response.
    pub response_timeout: Duration,
    /// Frame encoder/decoder parameters.
    pub codec: FrameCodec,
    /// Capacity of the node event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            response_timeout: Duration::from_millis(500),
            codec: FrameCodec::default(),
            event_capacity: 32,
        }
    }
}

/// The one in-flight request.
struct Exchange {
    id: u64,
    opcode: u8,
    deadline: Instant,
    /// Set once the transport reports the request left the wire.
    armed: bool,
    /// Taken when the exchange is resolved.
    reply: Option<oneshot::Sender<Result<LogicalFrame>>>,
}

struct Shared {
    phase: Phase,
    decoder: FrameDecoder,
    exchange: Option<Exchange>,
    next_id: u64,
}

impl Shared {
    /// Resolve the outstanding exchange, if it is armed and unresolved.
    fn resolve(&mut self, phase: Phase, result: Result<LogicalFrame>) -> bool {
        let Some(exchange) = self.exchange.as_mut() else {
            return false;
        };
        if !exchange.armed {
            return false;
        }
        let Some(reply) = exchange.reply.take() else {
            return false;
        };
        self.phase = phase;
        if reply.send(result).is_err() {
            // Fire-only exchange: nobody collects the outcome, so the slot
            // is released right away.
            self.exchange = None;
            self.phase = Phase::Idle;
        }
        true
    }

    /// Whether a validated frame answers the outstanding exchange.
    fn attributes(&self, frame: &LogicalFrame) -> bool {
        self.exchange.as_ref().is_some_and(|ex| {
            ex.armed && ex.reply.is_some() && (frame.is_error() || frame.opcode == ex.opcode)
        })
    }

    fn clear(&mut self, id: u64) {
        if self.exchange.as_ref().is_some_and(|ex| ex.id == id) {
            self.exchange = None;
            self.phase = Phase::Idle;
        }
    }
}

/// Handle to a sent request, redeemed with
/// [`ExchangeCoordinator::await_response`].
///
/// Dropping it without awaiting leaves a fire-only exchange behind. It is
/// released as soon as its response arrives, or by the next `send` once its
/// deadline has passed.
#[derive(Debug)]
pub struct Pending {
    id: u64,
    opcode: u8,
    deadline: Instant,
    rx: oneshot::Receiver<Result<LogicalFrame>>,
}

impl Pending {
    /// Opcode of the request this handle waits for.
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Instant after which the exchange times out.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Single-outstanding-request state machine bound to one link.
pub struct ExchangeCoordinator {
    shared: Mutex<Shared>,
    transport: tokio::sync::Mutex<Box<dyn Transport>>,
    event_tx: broadcast::Sender<NodeEvent>,
    config: ExchangeConfig,
    link: LinkId,
}

impl ExchangeCoordinator {
    /// Take ownership of `transport` and register as the receive context for
    /// its link in `registry`.
    pub fn attach(
        transport: Box<dyn Transport>,
        registry: &LinkRegistry,
        config: ExchangeConfig,
    ) -> Result<Arc<Self>> {
        let link = transport.link_id();
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let coordinator = Arc::new(ExchangeCoordinator {
            shared: Mutex::new(Shared {
                phase: Phase::Idle,
                decoder: config.codec.decoder(),
                exchange: None,
                next_id: 0,
            }),
            transport: tokio::sync::Mutex::new(transport),
            event_tx,
            config,
            link,
        });

        let sink: Arc<dyn ByteSink> = coordinator.clone();
        let weak: Weak<dyn ByteSink> = Arc::downgrade(&sink);
        registry.register(link, weak)?;
        debug!(link = %link, "exchange coordinator attached");
        Ok(coordinator)
    }

    /// Link this coordinator receives on.
    pub fn link_id(&self) -> LinkId {
        self.link
    }

    /// Frame codec shared by encoder and decoder.
    pub fn codec(&self) -> &FrameCodec {
        &self.config.codec
    }

    /// Configured response timeout.
    pub fn response_timeout(&self) -> Duration {
        self.config.response_timeout
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Whether an exchange is currently claimed.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().exchange.is_some()
    }

    /// Subscribe to frames and discards not attributed to any exchange.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }

    /// Claim the exchange slot for `opcode` and transmit `wire`.
    ///
    /// Fails with [`Error::TransportBusy`] while another exchange is
    /// outstanding, or if the transport rejects the bytes (the claim is then
    /// rolled back).
    pub async fn send(&self, opcode: u8, wire: &[u8]) -> Result<Pending> {
        let (reply, rx) = oneshot::channel();
        let (id, deadline) = {
            let mut shared = self.shared.lock();
            self.reclaim_expired(&mut shared);
            if let Some(current) = shared.exchange.as_ref() {
                debug!(
                    outstanding = format_args!("0x{:02X}", current.opcode),
                    requested = format_args!("0x{opcode:02X}"),
                    "exchange already outstanding"
                );
                return Err(Error::TransportBusy(format!(
                    "exchange for opcode 0x{:02X} outstanding",
                    current.opcode
                )));
            }
            let id = shared.next_id;
            shared.next_id += 1;
            let deadline = Instant::now() + self.config.response_timeout;
            shared.exchange = Some(Exchange {
                id,
                opcode,
                deadline,
                armed: false,
                reply: Some(reply),
            });
            shared.phase = Phase::AwaitingResponse;
            (id, deadline)
        };

        debug!(
            link = %self.link,
            opcode = format_args!("0x{opcode:02X}"),
            len = wire.len(),
            "exchange claimed"
        );

        let sent = self.transport.lock().await.transmit(wire).await;
        if let Err(e) = sent {
            self.shared.lock().clear(id);
            warn!(link = %self.link, error = %e, "transmit failed, exchange rolled back");
            return Err(match e {
                Error::NotConnected => Error::NotConnected,
                other => Error::TransportBusy(format!("transmit rejected: {other}")),
            });
        }

        Ok(Pending {
            id,
            opcode,
            deadline,
            rx,
        })
    }

    /// Wait for the response to `pending` until its deadline.
    ///
    /// On timeout the decoder is reset in the same critical section that
    /// decides the timeout, so late bytes of the abandoned response cannot
    /// complete a frame for the next exchange.
    pub async fn await_response(&self, mut pending: Pending) -> Result<LogicalFrame> {
        let outcome = tokio::time::timeout_at(pending.deadline, &mut pending.rx).await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            // The sender is gone: either the link was closed, or the exchange
            // outlived its deadline and a later `send` reclaimed it.
            Ok(Err(_)) if Instant::now() >= pending.deadline => Err(Error::Timeout),
            Ok(Err(_)) => Err(Error::NotConnected),
            Err(_) => {
                let mut shared = self.shared.lock();
                match pending.rx.try_recv() {
                    Ok(result) => {
                        shared.clear(pending.id);
                        return result;
                    }
                    Err(_) => {
                        shared.decoder.reset();
                        if shared.exchange.as_ref().is_some_and(|ex| ex.id == pending.id) {
                            shared.phase = Phase::TimedOut;
                        }
                        shared.clear(pending.id);
                        debug!(
                            link = %self.link,
                            opcode = format_args!("0x{:02X}", pending.opcode),
                            "exchange timed out"
                        );
                        return Err(Error::Timeout);
                    }
                }
            }
        };
        self.shared.lock().clear(pending.id);
        result
    }

    /// Send a request and wait for its response.
    pub async fn exchange(&self, opcode: u8, wire: &[u8]) -> Result<LogicalFrame> {
        let pending = self.send(opcode, wire).await?;
        self.await_response(pending).await
    }

    /// Transmit unframed bytes without opening an exchange.
    pub async fn transmit_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut transport = self.transport.lock().await;
        {
            let mut shared = self.shared.lock();
            self.reclaim_expired(&mut shared);
            if shared.exchange.is_some() {
                return Err(Error::TransportBusy(
                    "cannot send raw bytes while an exchange is outstanding".into(),
                ));
            }
        }
        debug!(link = %self.link, len = bytes.len(), "raw transmit");
        transport.transmit(bytes).await
    }

    /// Close the transport. Outstanding waiters fail with
    /// [`Error::NotConnected`].
    pub async fn close(&self) -> Result<()> {
        {
            let mut shared = self.shared.lock();
            shared.exchange = None;
            shared.phase = Phase::Idle;
            shared.decoder.reset();
        }
        self.transport.lock().await.close().await
    }

    /// Whether the underlying transport reports an open link.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Release an exchange past its deadline, or one whose outcome nobody
    /// will collect.
    fn reclaim_expired(&self, shared: &mut Shared) {
        let Some(ex) = shared.exchange.as_ref() else {
            return;
        };
        let expired = Instant::now() >= ex.deadline;
        let settled = ex.reply.as_ref().is_none_or(|reply| reply.is_closed());
        if !expired && !settled {
            return;
        }
        debug!(
            link = %self.link,
            opcode = format_args!("0x{:02X}", ex.opcode),
            expired,
            "reclaiming exchange"
        );
        shared.exchange = None;
        if expired {
            shared.decoder.reset();
        }
        shared.phase = Phase::Idle;
    }

    fn publish(&self, event: NodeEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl ByteSink for ExchangeCoordinator {
    fn on_byte_received(&self, byte: u8) {
        let event = {
            let mut shared = self.shared.lock();
            match shared.decoder.feed(byte) {
                FeedEvent::Incomplete => return,
                FeedEvent::FrameReady(frame) => {
                    if shared.attributes(&frame) {
                        debug!(
                            link = %self.link,
                            opcode = format_args!("0x{:02X}", frame.opcode),
                            error = frame.is_error(),
                            "exchange fulfilled"
                        );
                        shared.resolve(Phase::Fulfilled, Ok(frame));
                        return;
                    }
                    trace!(
                        link = %self.link,
                        opcode = format_args!("0x{:02X}", frame.opcode),
                        "unsolicited frame"
                    );
                    NodeEvent::Unsolicited(frame)
                }
                event @ FeedEvent::CrcMismatch { computed, received } => {
                    if let Some(err) = status::from_feed_event(&event) {
                        shared.resolve(Phase::CrcFailed, Err(err));
                    }
                    NodeEvent::CrcMismatch { computed, received }
                }
                FeedEvent::Desync(reason) => {
                    debug!(
                        link = %self.link,
                        reason = %status::desync_description(reason),
                        "frame discarded"
                    );
                    shared.resolve(Phase::Desynced, Err(Error::SyncLost));
                    NodeEvent::Desync(reason)
                }
            }
        };
        self.publish(event);
    }

    fn on_transmit_complete(&self) {
        let mut shared = self.shared.lock();
        let Some(exchange) = shared.exchange.as_mut() else {
            return;
        };
        if exchange.armed {
            return;
        }
        exchange.armed = true;
        shared.decoder.reset();
        trace!(link = %self.link, "reception armed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CrcSpan, FrameType};
    use swarmlink_test_harness::{MockHandle, MockLink};

    fn setup(timeout_ms: u64) -> (Arc<LinkRegistry>, Arc<ExchangeCoordinator>, MockHandle) {
        let registry = LinkRegistry::new();
        let mock = MockLink::new(registry.clone());
        let handle = mock.handle();
        let config = ExchangeConfig {
            response_timeout: Duration::from_millis(timeout_ms),
            ..ExchangeConfig::default()
        };
        let coordinator = ExchangeCoordinator::attach(Box::new(mock), &registry, config).unwrap();
        (registry, coordinator, handle)
    }

    fn wire(frame_type: FrameType, opcode: u8, payload: &[u8]) -> Vec<u8> {
        FrameCodec::default()
            .encode(frame_type, opcode, payload)
            .unwrap()
    }

    #[tokio::test]
    async fn exchange_returns_matching_frame() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        mock.expect(&request, &wire(FrameType::Get, 0x08, &[1, 4, 2, 0]));

        let frame = coordinator.exchange(0x08, &request).await.unwrap();
        assert_eq!(frame.payload, vec![1, 4, 2, 0]);
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn phase_is_fulfilled_until_collected() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x09, &[]);
        mock.expect(&request, &wire(FrameType::Get, 0x09, &[0; 12]));

        let pending = coordinator.send(0x09, &request).await.unwrap();
        assert_eq!(coordinator.phase(), Phase::Fulfilled);
        coordinator.await_response(pending).await.unwrap();
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_is_busy() {
        let (_registry, coordinator, mock) = setup(500);
        let first = wire(FrameType::Get, 0x00, &[]);
        let second = wire(FrameType::Get, 0x08, &[]);
        mock.expect_silence(&first);

        let pending = coordinator.send(0x00, &first).await.unwrap();
        assert_eq!(coordinator.phase(), Phase::AwaitingResponse);

        let result = coordinator.send(0x08, &second).await;
        assert!(matches!(result, Err(Error::TransportBusy(_))));
        assert_eq!(mock.sent_data().len(), 1);
        assert_eq!(coordinator.phase(), Phase::AwaitingResponse);

        // The first exchange still completes normally.
        mock.inject(&wire(FrameType::Get, 0x00, &[1, 2, 3, 4, 5, 6]));
        let frame = coordinator.await_response(pending).await.unwrap();
        assert_eq!(frame.opcode, 0x00);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_resets_decoder() {
        let (_registry, coordinator, mock) = setup(100);
        let request = wire(FrameType::Get, 0x08, &[]);
        mock.expect_silence(&request);

        let pending = coordinator.send(0x08, &request).await.unwrap();
        // Half a response arrives.
        let response = wire(FrameType::Get, 0x08, &[1, 4, 2, 0]);
        mock.inject(&response[..5]);

        let result = coordinator.await_response(pending).await;
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(coordinator.phase(), Phase::Idle);
        assert!(!coordinator.shared.lock().decoder.is_in_frame());
    }

    #[tokio::test]
    async fn transmit_failure_rolls_back() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        mock.expect(&request, &wire(FrameType::Get, 0x08, &[1, 4, 2, 0]));
        mock.reject_next_transmit();

        let result = coordinator.send(0x08, &request).await;
        assert!(matches!(result, Err(Error::TransportBusy(_))));
        assert_eq!(coordinator.phase(), Phase::Idle);

        // The slot is free again.
        assert!(coordinator.exchange(0x08, &request).await.is_ok());
    }

    #[tokio::test]
    async fn error_frame_resolves_exchange() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Set, 0x05, &[0x3F]);
        mock.expect(&request, &wire(FrameType::Error, 0x05, &[0x05]));

        let frame = coordinator.exchange(0x05, &request).await.unwrap();
        assert!(frame.is_error());
    }

    #[tokio::test]
    async fn crc_failure_resolves_exchange() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        let mut response = wire(FrameType::Get, 0x08, &[1, 4, 2, 0]);
        response[4] ^= 0x01;
        mock.expect(&request, &response);
        let mut events = coordinator.subscribe();

        let result = coordinator.exchange(0x08, &request).await;
        assert!(matches!(result, Err(Error::CrcMismatch { .. })));
        assert!(matches!(
            events.try_recv(),
            Ok(NodeEvent::CrcMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn desync_resolves_exchange() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        mock.expect(&request, &[0x7F, 0x06, 0x54, 0x1B, 0x00]);

        let result = coordinator.exchange(0x08, &request).await;
        assert!(matches!(result, Err(Error::SyncLost)));
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_opcode_is_unsolicited() {
        let (_registry, coordinator, mock) = setup(100);
        let request = wire(FrameType::Get, 0x08, &[]);
        let other = wire(FrameType::Get, 0x27, &[0]);
        mock.expect(&request, &other);
        let mut events = coordinator.subscribe();

        let result = coordinator.exchange(0x08, &request).await;
        assert!(matches!(result, Err(Error::Timeout)));
        match events.try_recv() {
            Ok(NodeEvent::Unsolicited(frame)) => assert_eq!(frame.opcode, 0x27),
            other => panic!("expected unsolicited frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bytes_before_transmit_completion_are_discarded() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        let response = wire(FrameType::Get, 0x08, &[1, 4, 2, 0]);
        // A partial frame is already in the decoder when the request goes out.
        mock.inject(&response[..4]);
        mock.expect(&request, &response[4..]);

        let pending = coordinator.send(0x08, &request).await.unwrap();
        assert_eq!(coordinator.phase(), Phase::AwaitingResponse);
        drop(pending);
    }

    #[tokio::test]
    async fn fire_only_exchange_is_released_by_its_response() {
        let (_registry, coordinator, mock) = setup(500);
        let first = wire(FrameType::Set, 0x01, &[]);
        let second = wire(FrameType::Get, 0x08, &[]);
        mock.expect(&first, &wire(FrameType::Set, 0x01, &[0]));
        mock.expect(&second, &wire(FrameType::Get, 0x08, &[1, 4, 2, 0]));

        // Fired, never awaited.
        drop(coordinator.send(0x01, &first).await.unwrap());

        let frame = coordinator.exchange(0x08, &second).await.unwrap();
        assert_eq!(frame.payload, vec![1, 4, 2, 0]);
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn response_after_waiter_left_frees_the_slot() {
        let (_registry, coordinator, mock) = setup(500);
        let first = wire(FrameType::Set, 0x01, &[]);
        let second = wire(FrameType::Get, 0x08, &[]);
        mock.expect_silence(&first);
        mock.expect(&second, &wire(FrameType::Get, 0x08, &[1, 4, 2, 0]));

        drop(coordinator.send(0x01, &first).await.unwrap());
        // The reply shows up after the caller stopped listening.
        mock.inject(&wire(FrameType::Set, 0x01, &[0]));
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.phase(), Phase::Idle);

        assert!(coordinator.exchange(0x08, &second).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_exchange_is_reclaimed_after_deadline() {
        let (_registry, coordinator, mock) = setup(100);
        let first = wire(FrameType::Set, 0x01, &[]);
        let second = wire(FrameType::Get, 0x08, &[]);
        mock.expect_silence(&first);
        mock.expect(&second, &wire(FrameType::Get, 0x08, &[1, 4, 2, 0]));

        let pending = coordinator.send(0x01, &first).await.unwrap();
        assert!(matches!(
            coordinator.send(0x08, &second).await,
            Err(Error::TransportBusy(_))
        ));

        tokio::time::advance(Duration::from_millis(150)).await;
        let frame = coordinator.exchange(0x08, &second).await.unwrap();
        assert_eq!(frame.opcode, 0x08);
        drop(pending);
    }

    #[tokio::test(start_paused = true)]
    async fn reclaimed_pending_reports_timeout() {
        let (_registry, coordinator, mock) = setup(100);
        let first = wire(FrameType::Get, 0x08, &[]);
        let second = wire(FrameType::Get, 0x00, &[]);
        mock.expect_silence(&first);
        mock.expect_silence(&second);

        let stale = coordinator.send(0x08, &first).await.unwrap();
        tokio::time::advance(Duration::from_millis(150)).await;
        // The next send takes over the slot before the stale waiter looks.
        let _current = coordinator.send(0x00, &second).await.unwrap();

        let result = coordinator.await_response(stale).await;
        assert!(matches!(result, Err(Error::Timeout)));
        // The newer exchange is untouched.
        assert!(coordinator.is_busy());
        assert_eq!(coordinator.phase(), Phase::AwaitingResponse);
    }

    #[tokio::test]
    async fn idle_frames_are_published() {
        let (_registry, coordinator, mock) = setup(500);
        let mut events = coordinator.subscribe();
        mock.inject(&wire(FrameType::Other(0x56), 0x27, &[1, 2]));

        match events.try_recv() {
            Ok(NodeEvent::Unsolicited(frame)) => {
                assert_eq!(frame.frame_type, FrameType::Other(0x56));
                assert_eq!(frame.payload, vec![1, 2]);
            }
            other => panic!("expected unsolicited frame, got {other:?}"),
        }
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn raw_transmit_when_idle() {
        let (_registry, coordinator, mock) = setup(500);
        mock.expect_silence(b"SBIN\r\n");
        coordinator.transmit_raw(b"SBIN\r\n").await.unwrap();
        assert_eq!(mock.sent_data(), vec![b"SBIN\r\n".to_vec()]);
        assert_eq!(coordinator.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn raw_transmit_while_busy_is_rejected() {
        let (_registry, coordinator, mock) = setup(500);
        let request = wire(FrameType::Get, 0x08, &[]);
        mock.expect_silence(&request);
        let _pending = coordinator.send(0x08, &request).await.unwrap();

        assert!(matches!(
            coordinator.transmit_raw(b"SBIN\r\n").await,
            Err(Error::TransportBusy(_))
        ));
    }

    #[tokio::test]
    async fn closed_link_reports_not_connected() {
        let (_registry, coordinator, _mock) = setup(500);
        coordinator.close().await.unwrap();
        assert!(!coordinator.is_connected().await);
        let request = wire(FrameType::Get, 0x08, &[]);
        assert!(matches!(
            coordinator.send(0x08, &request).await,
            Err(Error::NotConnected)
        ));
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn include_sync_span_is_honoured() {
        let registry = LinkRegistry::new();
        let mock = MockLink::new(registry.clone());
        let handle = mock.handle();
        let codec = FrameCodec::new(128, CrcSpan::IncludeSync);
        let config = ExchangeConfig {
            codec,
            ..ExchangeConfig::default()
        };
        let coordinator = ExchangeCoordinator::attach(Box::new(mock), &registry, config).unwrap();

        let request = codec.encode(FrameType::Get, 0x08, &[]).unwrap();
        let response = codec.encode(FrameType::Get, 0x08, &[1, 4, 2, 0]).unwrap();
        handle.expect(&request, &response);

        let frame = coordinator.exchange(0x08, &request).await.unwrap();
        assert_eq!(frame.payload, vec![1, 4, 2, 0]);
    }
}
