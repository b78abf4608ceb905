//! Outbound message queue
//!
//! Reliable, ordered delivery of outbound CALLs with two FIFO sub-queues:
//! *transactional* messages (StartTransaction, StopTransaction, MeterValues
//! carrying a transactionId) whose loss would corrupt billing, and *normal*
//! messages attempted once. At most one CALL is in flight per connection;
//! the worker blocks until the correlated response arrives or times out.
//!
//! CALLRESULT / CALLERROR responses bypass the queue and go straight through
//! the transport.

use crate::error::{ChargePointError, ChargePointResult};
use async_trait::async_trait;
use ocpp_messages::v16j::MessageType;
use ocpp_types::{CallErrorMessage, CallMessage, CallResultMessage, Message, MessageTypeId};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default wait for the response to an in-flight CALL
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the worker waits for the dispatcher to finish a
/// StartTransactionResponse before releasing the next message
const START_HANDLED_TIMEOUT: Duration = Duration::from_secs(5);

/// Send half of the transport; the queue holds this handle instead of a
/// back-pointer into the connection machinery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one frame; false signals the connection is unusable
    async fn send_frame(&self, frame: String) -> bool;
}

/// A response (or disconnect notification) correlated to an outbound CALL,
/// or a decoded inbound frame on its way to the dispatcher.
#[derive(Debug, Clone)]
pub struct EnhancedMessage {
    pub unique_id: String,
    /// Resolved message type; None for uncorrelated or unknown frames
    pub message_type: Option<MessageType>,
    pub message_type_id: MessageTypeId,
    /// The decoded envelope; None when the future completed offline
    pub message: Option<Message>,
    /// True when the transport disconnected before a response arrived
    pub offline: bool,
}

impl EnhancedMessage {
    fn offline(unique_id: String, message_type: Option<MessageType>) -> Self {
        Self {
            unique_id,
            message_type,
            message_type_id: MessageTypeId::Call,
            message: None,
            offline: true,
        }
    }
}

#[derive(Debug)]
struct QueuedCall {
    call: CallMessage,
    message_type: MessageType,
    transactional: bool,
    attempts: u32,
}

struct InFlight {
    unique_id: String,
    message_type: MessageType,
    /// Rendezvous with the worker task
    responder: Option<oneshot::Sender<EnhancedMessage>>,
}

struct QueueInner {
    transactional: VecDeque<QueuedCall>,
    normal: VecDeque<QueuedCall>,
    in_flight: Option<InFlight>,
    /// Caller futures from `push_with_waiter`, keyed by unique id
    waiters: HashMap<String, oneshot::Sender<EnhancedMessage>>,
    /// StopTransaction payload patches applied on dequeue
    stop_patches: HashMap<String, i32>,
    running: bool,
    stopped: bool,
    awaiting_start_handled: bool,
    attempts: u32,
    retry_interval: Duration,
}

/// Decides whether a message type may currently be sent; installed by the
/// dispatcher to enforce the registration-state gating.
pub type SendGate = Arc<dyn Fn(MessageType) -> bool + Send + Sync>;

/// The outbound queue. One instance per connection lifetime.
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    start_handled: Notify,
    transport: Arc<dyn Transport>,
    /// Responses fanned out to the dispatcher in addition to the awaiting future
    external_notify: HashSet<MessageType>,
    response_timeout: Duration,
    gate: std::sync::RwLock<Option<SendGate>>,
}

impl MessageQueue {
    pub fn new(
        transport: Arc<dyn Transport>,
        transaction_message_attempts: u32,
        transaction_message_retry_interval: Duration,
    ) -> Self {
        let mut external_notify = HashSet::new();
        external_notify.insert(MessageType::StartTransactionResponse);

        Self {
            inner: Mutex::new(QueueInner {
                transactional: VecDeque::new(),
                normal: VecDeque::new(),
                in_flight: None,
                waiters: HashMap::new(),
                stop_patches: HashMap::new(),
                running: false,
                stopped: false,
                awaiting_start_handled: false,
                attempts: transaction_message_attempts.max(1),
                retry_interval: transaction_message_retry_interval,
            }),
            notify: Notify::new(),
            start_handled: Notify::new(),
            transport,
            external_notify,
            response_timeout: RESPONSE_TIMEOUT,
            gate: std::sync::RwLock::new(None),
        }
    }

    /// Shorten the in-flight response timeout (tests)
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Install the allowed-to-send gate consulted before each dequeue.
    /// Messages held back stay queued in order.
    pub fn set_send_gate(&self, gate: SendGate) {
        *self.gate.write().unwrap() = Some(gate);
    }

    /// Wake the worker after a state change that may unblock gated messages
    pub fn kick(&self) {
        self.notify.notify_one();
    }

    /// Spawn the dequeue worker. Runs until `stop()`.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.run().await })
    }

    /// Enqueue a CALL
    pub fn push(&self, call: CallMessage) {
        self.push_internal(call, None);
    }

    /// Enqueue a CALL and obtain a future for its response. The future
    /// completes with `offline = true` on disconnect or final retry failure.
    pub fn push_with_waiter(&self, call: CallMessage) -> oneshot::Receiver<EnhancedMessage> {
        let (tx, rx) = oneshot::channel();
        self.push_internal(call, Some(tx));
        rx
    }

    fn push_internal(&self, call: CallMessage, waiter: Option<oneshot::Sender<EnhancedMessage>>) {
        let message_type = match MessageType::from_action(&call.action) {
            Some(mt) => mt,
            None => {
                error!("Refusing to queue unknown action {}", call.action);
                return;
            }
        };
        let transactional = is_transaction_related(message_type, &call);

        let mut inner = self.inner.lock().unwrap();
        if inner.stopped {
            warn!("Queue is stopped, dropping {}", call.action);
            if let Some(waiter) = waiter {
                let _ = waiter.send(EnhancedMessage::offline(
                    call.unique_id.clone(),
                    message_type.response(),
                ));
            }
            return;
        }
        debug!(
            action = %call.action,
            unique_id = %call.unique_id,
            transactional,
            "Queueing message"
        );
        if let Some(waiter) = waiter {
            inner.waiters.insert(call.unique_id.clone(), waiter);
        }
        let queued = QueuedCall {
            call,
            message_type,
            transactional,
            attempts: 0,
        };
        if transactional {
            inner.transactional.push_back(queued);
        } else {
            inner.normal.push_back(queued);
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Send a CALLRESULT immediately, bypassing the queue
    pub async fn send_call_result(&self, result: CallResultMessage) -> ChargePointResult<()> {
        let frame = Message::CallResult(result).to_frame()?;
        if self.transport.send_frame(frame).await {
            Ok(())
        } else {
            Err(ChargePointError::transport("failed to send CallResult"))
        }
    }

    /// Send a CALLERROR immediately, bypassing the queue
    pub async fn send_call_error(&self, error: CallErrorMessage) -> ChargePointResult<()> {
        let frame = Message::CallError(error).to_frame()?;
        if self.transport.send_frame(frame).await {
            Ok(())
        } else {
            Err(ChargePointError::transport("failed to send CallError"))
        }
    }

    /// Decode an inbound frame and correlate responses with the in-flight
    /// CALL. Completes the awaiting future; the returned message is handed to
    /// the dispatcher.
    pub fn receive(&self, frame: &str) -> ChargePointResult<EnhancedMessage> {
        let message = Message::from_frame(frame)?;
        let unique_id = message.unique_id().to_string();
        let message_type_id = message.message_type_id();

        if message_type_id == MessageTypeId::Call {
            let action = match &message {
                Message::Call(call) => call.action.clone(),
                _ => unreachable!(),
            };
            return Ok(EnhancedMessage {
                unique_id,
                message_type: MessageType::from_action(&action),
                message_type_id,
                message: Some(message),
                offline: false,
            });
        }

        let mut inner = self.inner.lock().unwrap();
        let correlated = inner
            .in_flight
            .as_ref()
            .map(|fly| fly.unique_id == unique_id)
            .unwrap_or(false);

        if !correlated {
            warn!(%unique_id, "Received response with no matching in-flight call");
            return Ok(EnhancedMessage {
                unique_id,
                message_type: None,
                message_type_id,
                message: Some(message),
                offline: false,
            });
        }

        let mut fly = inner.in_flight.take().unwrap();
        let message_type = fly.message_type.response();
        let enhanced = EnhancedMessage {
            unique_id: unique_id.clone(),
            message_type,
            message_type_id,
            message: Some(message),
            offline: false,
        };
        if message_type
            .map(|mt| self.external_notify.contains(&mt))
            .unwrap_or(false)
        {
            inner.awaiting_start_handled = true;
        }
        if let Some(waiter) = inner.waiters.remove(&unique_id) {
            let _ = waiter.send(enhanced.clone());
        }
        if let Some(responder) = fly.responder.take() {
            let _ = responder.send(enhanced.clone());
        }
        drop(inner);
        self.notify.notify_one();
        Ok(enhanced)
    }

    /// Stop dequeuing on disconnect. All awaited futures complete with
    /// `offline = true`; queued messages stay for resumption.
    pub fn pause(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running && inner.in_flight.is_none() && inner.waiters.is_empty() {
            return;
        }
        info!("Pausing message queue");
        inner.running = false;
        if let Some(mut fly) = inner.in_flight.take() {
            let offline =
                EnhancedMessage::offline(fly.unique_id.clone(), fly.message_type.response());
            if let Some(waiter) = inner.waiters.remove(&fly.unique_id) {
                let _ = waiter.send(offline.clone());
            }
            if let Some(responder) = fly.responder.take() {
                let _ = responder.send(offline);
            }
        }
        // queued-but-unsent awaiters also learn the charge point is offline
        let pending: Vec<String> = inner.waiters.keys().cloned().collect();
        for unique_id in pending {
            let message_type = find_queued(&inner, &unique_id)
                .and_then(|queued| queued.message_type.response());
            if let Some(waiter) = inner.waiters.remove(&unique_id) {
                let _ = waiter.send(EnhancedMessage::offline(unique_id, message_type));
            }
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Restart dequeuing on (re)connect
    pub fn resume(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.stopped {
            return;
        }
        info!("Resuming message queue");
        inner.running = true;
        drop(inner);
        self.notify.notify_one();
    }

    /// Shut the queue down permanently
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stopped = true;
        inner.running = false;
        let pending: Vec<(String, oneshot::Sender<EnhancedMessage>)> =
            inner.waiters.drain().collect();
        drop(inner);
        for (unique_id, waiter) in pending {
            let _ = waiter.send(EnhancedMessage::offline(unique_id, None));
        }
        self.notify.notify_one();
    }

    /// Patch a queued StopTransaction with the transaction id assigned by
    /// the StartTransactionResponse that arrived after it was queued.
    pub fn add_stopped_transaction_id(&self, stop_message_id: &str, transaction_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        for queued in inner.transactional.iter_mut() {
            if queued.call.unique_id == stop_message_id {
                queued.call.payload["transactionId"] = json!(transaction_id);
                debug!(%stop_message_id, transaction_id, "Patched queued StopTransaction");
                return;
            }
        }
        // not queued yet or already being dequeued: apply at dequeue time
        inner
            .stop_patches
            .insert(stop_message_id.to_string(), transaction_id);
    }

    /// Release the worker after the StartTransactionResponse handler ran, so
    /// a queued StopTransaction is patched before it can be sent.
    pub fn notify_start_transaction_handled(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.awaiting_start_handled = false;
        }
        self.start_handled.notify_one();
    }

    pub fn update_transaction_message_attempts(&self, attempts: u32) {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts = attempts.max(1);
    }

    pub fn update_transaction_message_retry_interval(&self, interval: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.retry_interval = interval;
    }

    async fn run(self: Arc<Self>) {
        loop {
            // claim the next sendable message
            let (mut queued, rendezvous) = loop {
                let gate = self.gate.read().unwrap().clone();
                {
                    let mut inner = self.inner.lock().unwrap();
                    if inner.stopped {
                        return;
                    }
                    if inner.running
                        && inner.in_flight.is_none()
                        && !inner.awaiting_start_handled
                    {
                        if let Some(mut queued) = pop_head(&mut inner, gate.as_ref()) {
                            if queued.message_type == MessageType::StopTransaction {
                                if let Some(tx_id) =
                                    inner.stop_patches.remove(&queued.call.unique_id)
                                {
                                    queued.call.payload["transactionId"] = json!(tx_id);
                                    debug!(
                                        unique_id = %queued.call.unique_id,
                                        tx_id,
                                        "Applied StopTransaction patch at dequeue"
                                    );
                                }
                            }
                            let (tx, rx) = oneshot::channel();
                            inner.in_flight = Some(InFlight {
                                unique_id: queued.call.unique_id.clone(),
                                message_type: queued.message_type,
                                responder: Some(tx),
                            });
                            break (queued, rx);
                        }
                    }
                }
                self.notify.notified().await;
            };

            let frame = match Message::Call(queued.call.clone()).to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!(action = %queued.call.action, "Failed to encode frame: {}", e);
                    let mut inner = self.inner.lock().unwrap();
                    inner.in_flight = None;
                    inner.waiters.remove(&queued.call.unique_id);
                    continue;
                }
            };

            debug!(
                action = %queued.call.action,
                unique_id = %queued.call.unique_id,
                attempt = queued.attempts + 1,
                "Sending message"
            );
            if !self.transport.send_frame(frame).await {
                warn!("Transport refused frame, waiting for reconnect");
                let mut inner = self.inner.lock().unwrap();
                inner.in_flight = None;
                inner.running = false;
                requeue_front(&mut inner, queued);
                continue;
            }

            match tokio::time::timeout(self.response_timeout, rendezvous).await {
                Ok(Ok(enhanced)) => {
                    if enhanced.offline {
                        // disconnected mid-flight; keep the message at the head
                        let mut inner = self.inner.lock().unwrap();
                        requeue_front(&mut inner, queued);
                        continue;
                    }
                    if enhanced
                        .message_type
                        .map(|mt| self.external_notify.contains(&mt))
                        .unwrap_or(false)
                    {
                        // hold the queue until the dispatcher patched any
                        // queued StopTransaction for this transaction
                        if tokio::time::timeout(
                            START_HANDLED_TIMEOUT,
                            self.start_handled.notified(),
                        )
                        .await
                        .is_err()
                        {
                            warn!("Timed out waiting for StartTransactionResponse handling");
                        }
                        let mut inner = self.inner.lock().unwrap();
                        inner.awaiting_start_handled = false;
                    }
                }
                Ok(Err(_)) => {
                    // queue dropped while in flight (stop)
                    return;
                }
                Err(_) => {
                    let retry = {
                        let mut inner = self.inner.lock().unwrap();
                        inner.in_flight = None;
                        queued.attempts += 1;
                        if queued.transactional && queued.attempts < inner.attempts {
                            let delay = inner.retry_interval * queued.attempts;
                            requeue_front(&mut inner, queued);
                            Some(delay)
                        } else {
                            error!(
                                action = %queued.call.action,
                                unique_id = %queued.call.unique_id,
                                attempts = queued.attempts,
                                "Message exceeded retries, dropping"
                            );
                            if let Some(waiter) = inner.waiters.remove(&queued.call.unique_id) {
                                let _ = waiter.send(EnhancedMessage::offline(
                                    queued.call.unique_id.clone(),
                                    queued.message_type.response(),
                                ));
                            }
                            None
                        }
                    };
                    if let Some(delay) = retry {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

/// Messages whose loss would corrupt billing go on the transactional queue
fn is_transaction_related(message_type: MessageType, call: &CallMessage) -> bool {
    match message_type {
        MessageType::StartTransaction | MessageType::StopTransaction => true,
        MessageType::MeterValues => call
            .payload
            .get("transactionId")
            .map(|v| !v.is_null())
            .unwrap_or(false),
        _ => false,
    }
}

/// Transactional head first, then normal head, skipping heads the gate
/// holds back. FIFO order within each sub-queue is never broken.
fn pop_head(inner: &mut QueueInner, gate: Option<&SendGate>) -> Option<QueuedCall> {
    let allowed = |message_type: MessageType| gate.map(|g| g(message_type)).unwrap_or(true);
    if let Some(head) = inner.transactional.front() {
        if allowed(head.message_type) {
            return inner.transactional.pop_front();
        }
    }
    if let Some(head) = inner.normal.front() {
        if allowed(head.message_type) {
            return inner.normal.pop_front();
        }
    }
    None
}

fn requeue_front(inner: &mut QueueInner, queued: QueuedCall) {
    if queued.transactional {
        inner.transactional.push_front(queued);
    } else {
        inner.normal.push_front(queued);
    }
}

fn find_queued<'a>(inner: &'a QueueInner, unique_id: &str) -> Option<&'a QueuedCall> {
    inner
        .transactional
        .iter()
        .chain(inner.normal.iter())
        .find(|queued| queued.call.unique_id == unique_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocpp_types::Message;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct ChannelTransport {
        frames: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl Transport for ChannelTransport {
        async fn send_frame(&self, frame: String) -> bool {
            self.frames.send(frame).is_ok()
        }
    }

    fn queue_with_transport() -> (Arc<MessageQueue>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(
            MessageQueue::new(
                Arc::new(ChannelTransport { frames: tx }),
                3,
                Duration::from_millis(10),
            )
            .with_response_timeout(Duration::from_millis(200)),
        );
        (queue, rx)
    }

    fn call(action: &str, payload: serde_json::Value) -> CallMessage {
        CallMessage::new(action, payload).unwrap()
    }

    fn result_frame(unique_id: &str, payload: serde_json::Value) -> String {
        format!("[3,\"{}\",{}]", unique_id, payload)
    }

    fn decode(frame: &str) -> CallMessage {
        match Message::from_frame(frame).unwrap() {
            Message::Call(call) => call,
            other => panic!("expected CALL, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transactional_priority() {
        let (queue, mut rx) = queue_with_transport();
        queue.push(call("Heartbeat", json!({})));
        queue.push(call(
            "StartTransaction",
            json!({"connectorId": 1, "idTag": "T", "meterStart": 0,
                   "timestamp": "2024-01-01T00:00:00Z"}),
        ));
        let _worker = queue.spawn();
        queue.resume();

        let first = decode(&rx.recv().await.unwrap());
        assert_eq!(first.action, "StartTransaction");

        // answer so the worker moves on; StartTransactionResponse gates on
        // the dispatcher signal
        queue
            .receive(&result_frame(
                &first.unique_id,
                json!({"idTagInfo": {"status": "Accepted"}, "transactionId": 7}),
            ))
            .unwrap();
        queue.notify_start_transaction_handled();

        let second = decode(&rx.recv().await.unwrap());
        assert_eq!(second.action, "Heartbeat");
        queue.stop();
    }

    #[tokio::test]
    async fn test_response_correlation() {
        let (queue, mut rx) = queue_with_transport();
        let waiter = queue.push_with_waiter(call("Authorize", json!({"idTag": "T1"})));
        let _worker = queue.spawn();
        queue.resume();

        let sent = decode(&rx.recv().await.unwrap());
        let enhanced = queue
            .receive(&result_frame(
                &sent.unique_id,
                json!({"idTagInfo": {"status": "Accepted"}}),
            ))
            .unwrap();
        assert_eq!(enhanced.message_type, Some(MessageType::AuthorizeResponse));

        let from_waiter = waiter.await.unwrap();
        assert!(!from_waiter.offline);
        assert_eq!(from_waiter.unique_id, sent.unique_id);
        queue.stop();
    }

    #[tokio::test]
    async fn test_pause_completes_futures_offline_and_keeps_message() {
        let (queue, mut rx) = queue_with_transport();
        let _worker = queue.spawn();
        queue.resume();

        let waiter = queue.push_with_waiter(call("Authorize", json!({"idTag": "T1"})));
        let sent = decode(&rx.recv().await.unwrap());

        queue.pause();
        let offline = waiter.await.unwrap();
        assert!(offline.offline);

        // the message stayed at the head and is re-sent on resume
        queue.resume();
        let resent = decode(&rx.recv().await.unwrap());
        assert_eq!(resent.unique_id, sent.unique_id);
        queue.stop();
    }

    #[tokio::test]
    async fn test_stop_transaction_patched_before_send() {
        let (queue, mut rx) = queue_with_transport();
        queue.push(call(
            "StartTransaction",
            json!({"connectorId": 1, "idTag": "T", "meterStart": 1000,
                   "timestamp": "2024-01-01T00:00:00Z"}),
        ));
        let stop_call = call(
            "StopTransaction",
            json!({"meterStop": 1500, "timestamp": "2024-01-01T00:01:00Z",
                   "transactionId": -1}),
        );
        let stop_id = stop_call.unique_id.clone();
        queue.push(stop_call);

        let _worker = queue.spawn();
        queue.resume();

        let start = decode(&rx.recv().await.unwrap());
        assert_eq!(start.action, "StartTransaction");

        // dispatcher receives the StartTransactionResponse, patches the
        // queued StopTransaction, then releases the queue
        queue
            .receive(&result_frame(
                &start.unique_id,
                json!({"idTagInfo": {"status": "Accepted"}, "transactionId": 42}),
            ))
            .unwrap();
        queue.add_stopped_transaction_id(&stop_id, 42);
        queue.notify_start_transaction_handled();

        let stop = decode(&rx.recv().await.unwrap());
        assert_eq!(stop.action, "StopTransaction");
        assert_eq!(stop.payload["transactionId"], 42);
        queue.stop();
    }

    #[tokio::test]
    async fn test_normal_message_dropped_after_timeout() {
        let (queue, mut rx) = queue_with_transport();
        let waiter = queue.push_with_waiter(call("Heartbeat", json!({})));
        queue.push(call("StatusNotification", json!({"connectorId": 1, "errorCode": "NoError", "status": "Available"})));
        let _worker = queue.spawn();
        queue.resume();

        let first = decode(&rx.recv().await.unwrap());
        assert_eq!(first.action, "Heartbeat");
        // no response: after the timeout the waiter resolves offline and the
        // next message is attempted
        let timed_out = waiter.await.unwrap();
        assert!(timed_out.offline);

        let second = decode(&rx.recv().await.unwrap());
        assert_eq!(second.action, "StatusNotification");
        queue.stop();
    }

    #[tokio::test]
    async fn test_meter_values_classification() {
        let with_tx = call("MeterValues", json!({"connectorId": 1, "transactionId": 5, "meterValue": []}));
        let mt = MessageType::from_action("MeterValues").unwrap();
        assert!(is_transaction_related(mt, &with_tx));

        let without_tx = call("MeterValues", json!({"connectorId": 1, "meterValue": []}));
        assert!(!is_transaction_related(mt, &without_tx));
    }
}
