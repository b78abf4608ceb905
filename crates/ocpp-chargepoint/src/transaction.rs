//! Transaction lifecycle management
//!
//! A transaction is created locally at session start with a UUID session id
//! and [`TransactionId::UNASSIGNED`]; the Central System assigns the real id
//! in the StartTransactionResponse. Stopped transactions are retained, keyed
//! by their StopTransaction message id, until the StopTransactionResponse
//! arrives.

use chrono::{DateTime, Utc};
use ocpp_types::common::MeterValue;
use ocpp_types::TransactionId;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A timestamped energy reading (Wh)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedEnergy {
    pub timestamp: DateTime<Utc>,
    pub energy_wh: f32,
}

/// One charging session from start to StopTransactionResponse
#[derive(Debug, Clone)]
pub struct Transaction {
    pub session_id: String,
    pub connector_id: u32,
    pub id_tag: String,
    pub meter_start: i32,
    pub start_time: DateTime<Utc>,
    pub reservation_id: Option<i32>,
    transaction_id: TransactionId,
    start_message_id: Option<String>,
    stop_message_id: Option<String>,
    stop_energy: Option<StampedEnergy>,
    transaction_data: Vec<MeterValue>,
    finished: bool,
}

impl Transaction {
    pub fn new(
        connector_id: u32,
        session_id: String,
        id_tag: String,
        meter_start: i32,
        reservation_id: Option<i32>,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            connector_id,
            id_tag,
            meter_start,
            start_time,
            reservation_id,
            transaction_id: TransactionId::UNASSIGNED,
            start_message_id: None,
            stop_message_id: None,
            stop_energy: None,
            transaction_data: Vec::new(),
            finished: false,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn set_transaction_id(&mut self, transaction_id: TransactionId) {
        self.transaction_id = transaction_id;
    }

    pub fn start_message_id(&self) -> Option<&str> {
        self.start_message_id.as_deref()
    }

    pub fn set_start_message_id(&mut self, message_id: String) {
        self.start_message_id = Some(message_id);
    }

    pub fn stop_message_id(&self) -> Option<&str> {
        self.stop_message_id.as_deref()
    }

    pub fn set_stop_message_id(&mut self, message_id: String) {
        self.stop_message_id = Some(message_id);
    }

    pub fn stop_energy(&self) -> Option<StampedEnergy> {
        self.stop_energy
    }

    pub fn add_stop_energy(&mut self, stamped: StampedEnergy) {
        self.stop_energy = Some(stamped);
    }

    /// Append a sample to the transaction data buffer, preserving
    /// timestamp order
    pub fn add_meter_value(&mut self, meter_value: MeterValue) {
        if let Some(last) = self.transaction_data.last() {
            if meter_value.timestamp < last.timestamp {
                warn!(
                    session_id = %self.session_id,
                    "Discarding out-of-order meter value"
                );
                return;
            }
        }
        self.transaction_data.push(meter_value);
    }

    pub fn transaction_data(&self) -> &[MeterValue] {
        &self.transaction_data
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn set_finished(&mut self) {
        self.finished = true;
    }
}

/// Fields the StartTransactionResponse handler needs after the id is bound
#[derive(Debug, Clone)]
pub struct StartResponseBinding {
    pub connector_id: u32,
    pub session_id: String,
    pub id_tag: String,
    pub finished: bool,
    pub stop_message_id: Option<String>,
}

/// Owns all active and not-yet-acknowledged transactions
#[derive(Default)]
pub struct TransactionManager {
    /// Active transactions by connector
    active: Mutex<HashMap<u32, Transaction>>,
    /// Stopped transactions awaiting StopTransactionResponse, by stop
    /// message id
    stopped: Mutex<HashMap<String, Transaction>>,
    /// Per-connector meter sampler tasks
    samplers: std::sync::Mutex<HashMap<u32, JoinHandle<()>>>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_transaction(&self, transaction: Transaction) {
        let mut active = self.active.lock().await;
        if active.contains_key(&transaction.connector_id) {
            warn!(
                connector = transaction.connector_id,
                "Replacing active transaction"
            );
        }
        info!(
            connector = transaction.connector_id,
            session_id = %transaction.session_id,
            "Transaction started"
        );
        active.insert(transaction.connector_id, transaction);
    }

    pub async fn transaction_active(&self, connector: u32) -> bool {
        self.active.lock().await.contains_key(&connector)
    }

    pub async fn any_active(&self) -> bool {
        !self.active.lock().await.is_empty()
    }

    pub async fn active_connectors(&self) -> Vec<u32> {
        let mut connectors: Vec<u32> = self.active.lock().await.keys().copied().collect();
        connectors.sort_unstable();
        connectors
    }

    pub async fn get(&self, connector: u32) -> Option<Transaction> {
        self.active.lock().await.get(&connector).cloned()
    }

    pub async fn transaction_id(&self, connector: u32) -> Option<TransactionId> {
        self.active
            .lock()
            .await
            .get(&connector)
            .map(|tx| tx.transaction_id())
    }

    /// Connector running the transaction with this Central System id
    pub async fn connector_for_transaction_id(&self, transaction_id: i32) -> Option<u32> {
        self.active
            .lock()
            .await
            .values()
            .find(|tx| tx.transaction_id().value() == transaction_id)
            .map(|tx| tx.connector_id)
    }

    pub async fn add_meter_value(&self, connector: u32, meter_value: MeterValue) {
        if let Some(tx) = self.active.lock().await.get_mut(&connector) {
            tx.add_meter_value(meter_value);
        }
    }

    /// Remove the active transaction; the atomic removal is what makes
    /// concurrent stop attempts single-shot.
    pub async fn take_active(&self, connector: u32) -> Option<Transaction> {
        self.active.lock().await.remove(&connector)
    }

    /// Park a stopped transaction until its StopTransactionResponse
    pub async fn insert_stopped(&self, transaction: Transaction) {
        let Some(stop_message_id) = transaction.stop_message_id().map(String::from) else {
            warn!(
                session_id = %transaction.session_id,
                "Stopped transaction has no stop message id"
            );
            return;
        };
        self.stopped
            .lock()
            .await
            .insert(stop_message_id, transaction);
    }

    pub async fn erase_stopped(&self, stop_message_id: &str) -> Option<Transaction> {
        let removed = self.stopped.lock().await.remove(stop_message_id);
        if removed.is_some() {
            debug!(%stop_message_id, "Stopped transaction acknowledged");
        }
        removed
    }

    /// Message ids of StopTransactions still awaiting acknowledgement
    pub async fn pending_stop_message_ids(&self) -> Vec<String> {
        self.stopped.lock().await.keys().cloned().collect()
    }

    pub async fn stopped_id_tag(&self, stop_message_id: &str) -> Option<String> {
        self.stopped
            .lock()
            .await
            .get(stop_message_id)
            .map(|tx| tx.id_tag.clone())
    }

    /// Bind the Central System transaction id to the transaction that sent
    /// this StartTransaction, searching active then stopped tables.
    pub async fn bind_transaction_id(
        &self,
        start_message_id: &str,
        transaction_id: TransactionId,
    ) -> Option<StartResponseBinding> {
        {
            let mut active = self.active.lock().await;
            if let Some(tx) = active
                .values_mut()
                .find(|tx| tx.start_message_id() == Some(start_message_id))
            {
                tx.set_transaction_id(transaction_id);
                return Some(StartResponseBinding {
                    connector_id: tx.connector_id,
                    session_id: tx.session_id.clone(),
                    id_tag: tx.id_tag.clone(),
                    finished: tx.is_finished(),
                    stop_message_id: tx.stop_message_id().map(String::from),
                });
            }
        }
        let mut stopped = self.stopped.lock().await;
        if let Some(tx) = stopped
            .values_mut()
            .find(|tx| tx.start_message_id() == Some(start_message_id))
        {
            tx.set_transaction_id(transaction_id);
            return Some(StartResponseBinding {
                connector_id: tx.connector_id,
                session_id: tx.session_id.clone(),
                id_tag: tx.id_tag.clone(),
                finished: tx.is_finished(),
                stop_message_id: tx.stop_message_id().map(String::from),
            });
        }
        None
    }

    pub fn register_sampler(&self, connector: u32, handle: JoinHandle<()>) {
        let mut samplers = self.samplers.lock().unwrap();
        if let Some(previous) = samplers.insert(connector, handle) {
            previous.abort();
        }
    }

    pub fn abort_sampler(&self, connector: u32) {
        if let Some(handle) = self.samplers.lock().unwrap().remove(&connector) {
            handle.abort();
        }
    }

    pub fn abort_all_samplers(&self) {
        let mut samplers = self.samplers.lock().unwrap();
        for (_, handle) in samplers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocpp_types::common::{MeterValue, SampledValue};

    fn transaction(connector: u32, session: &str) -> Transaction {
        Transaction::new(
            connector,
            session.to_string(),
            "TAG1".to_string(),
            1000,
            None,
            Utc::now(),
        )
    }

    fn sample(timestamp: DateTime<Utc>, value: &str) -> MeterValue {
        MeterValue {
            timestamp,
            sampled_value: vec![SampledValue {
                value: value.to_string(),
                context: None,
                format: None,
                measurand: None,
                phase: None,
                location: None,
                unit: None,
            }],
        }
    }

    #[test]
    fn test_new_transaction_unassigned() {
        let tx = transaction(1, "s1");
        assert_eq!(tx.transaction_id(), TransactionId::UNASSIGNED);
        assert!(!tx.is_finished());
        assert!(tx.transaction_data().is_empty());
    }

    #[test]
    fn test_out_of_order_samples_discarded() {
        let mut tx = transaction(1, "s1");
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(60);

        tx.add_meter_value(sample(t1, "1100"));
        tx.add_meter_value(sample(t0, "1050"));
        tx.add_meter_value(sample(t1 + chrono::Duration::seconds(60), "1200"));

        assert_eq!(tx.transaction_data().len(), 2);
        assert!(tx
            .transaction_data()
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[tokio::test]
    async fn test_active_table() {
        let mgr = TransactionManager::new();
        mgr.add_transaction(transaction(1, "s1")).await;

        assert!(mgr.transaction_active(1).await);
        assert!(!mgr.transaction_active(2).await);
        assert_eq!(mgr.active_connectors().await, vec![1]);

        let taken = mgr.take_active(1).await.unwrap();
        assert_eq!(taken.session_id, "s1");
        // the second take is a no-op: no double stop
        assert!(mgr.take_active(1).await.is_none());
    }

    #[tokio::test]
    async fn test_connector_lookup_by_cs_id() {
        let mgr = TransactionManager::new();
        let mut tx = transaction(2, "s2");
        tx.set_transaction_id(TransactionId::new(42));
        mgr.add_transaction(tx).await;

        assert_eq!(mgr.connector_for_transaction_id(42).await, Some(2));
        assert_eq!(mgr.connector_for_transaction_id(43).await, None);
    }

    #[tokio::test]
    async fn test_bind_transaction_id_in_active_table() {
        let mgr = TransactionManager::new();
        let mut tx = transaction(1, "s1");
        tx.set_start_message_id("msg-1".to_string());
        mgr.add_transaction(tx).await;

        let binding = mgr
            .bind_transaction_id("msg-1", TransactionId::new(7))
            .await
            .unwrap();
        assert_eq!(binding.connector_id, 1);
        assert!(!binding.finished);
        assert_eq!(mgr.transaction_id(1).await.unwrap().value(), 7);
    }

    #[tokio::test]
    async fn test_bind_transaction_id_in_stopped_table() {
        let mgr = TransactionManager::new();
        let mut tx = transaction(1, "s1");
        tx.set_start_message_id("msg-1".to_string());
        tx.set_stop_message_id("stop-1".to_string());
        tx.set_finished();
        mgr.insert_stopped(tx).await;

        let binding = mgr
            .bind_transaction_id("msg-1", TransactionId::new(9))
            .await
            .unwrap();
        assert!(binding.finished);
        assert_eq!(binding.stop_message_id.as_deref(), Some("stop-1"));

        assert_eq!(mgr.stopped_id_tag("stop-1").await.unwrap(), "TAG1");
        assert!(mgr.erase_stopped("stop-1").await.is_some());
        assert!(mgr.erase_stopped("stop-1").await.is_none());
    }
}
