//! Persistent store interface
//!
//! The runtime accesses durable state through [`Repository`]; hosts provide a
//! database-backed implementation, while [`InMemoryRepository`] serves tests
//! and volatile deployments. Persistence failures propagate to the caller;
//! a transaction is never silently dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ocpp_messages::v16j::AuthorizationData;
use ocpp_types::common::{AvailabilityType, ChargingProfile, IdTagInfo, Reason};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Store errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Store I/O failure: {0}")]
    Io(String),

    /// Fatal: detected at open, the runtime refuses to boot on this
    #[error("Store corruption: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable transaction row.
///
/// `last_meter_wh` tracks the most recent sample so crash recovery can close
/// the row with a real reading instead of `meter_start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub session_id: String,
    /// -1 until the Central System assigns an id
    pub transaction_id: i32,
    pub connector_id: u32,
    pub id_tag: String,
    pub start_time: DateTime<Utc>,
    pub meter_start: i32,
    pub reservation_id: Option<i32>,
    pub parent_id_tag: Option<String>,
    pub last_meter_wh: Option<i32>,
    pub meter_stop: Option<i32>,
    pub stop_time: Option<DateTime<Utc>>,
    pub stop_reason: Option<Reason>,
}

impl TransactionRow {
    pub fn is_open(&self) -> bool {
        self.stop_time.is_none()
    }
}

/// Typed persistent store for the runtime's durable state
#[async_trait]
pub trait Repository: Send + Sync {
    // -- transactions -------------------------------------------------------

    async fn insert_transaction(&self, row: TransactionRow) -> StoreResult<()>;

    /// Record the Central System assigned transaction id
    async fn update_transaction_cs_id(
        &self,
        session_id: &str,
        transaction_id: i32,
        parent_id_tag: Option<String>,
    ) -> StoreResult<()>;

    /// Record the latest meter sample of a running transaction
    async fn update_transaction_meter(&self, session_id: &str, meter_wh: i32) -> StoreResult<()>;

    /// Close a transaction row
    async fn close_transaction(
        &self,
        session_id: &str,
        meter_stop: i32,
        stop_time: DateTime<Utc>,
        reason: Reason,
    ) -> StoreResult<()>;

    async fn get_transaction(&self, session_id: &str) -> StoreResult<Option<TransactionRow>>;

    /// Rows with `stop_time = null`, candidates for crash recovery
    async fn unfinished_transactions(&self) -> StoreResult<Vec<TransactionRow>>;

    // -- authorization cache ------------------------------------------------

    async fn upsert_authorization_cache_entry(
        &self,
        id_tag: &str,
        info: IdTagInfo,
    ) -> StoreResult<()>;

    async fn get_authorization_cache_entry(&self, id_tag: &str)
        -> StoreResult<Option<IdTagInfo>>;

    async fn clear_authorization_cache(&self) -> StoreResult<()>;

    // -- local authorization list -------------------------------------------

    async fn get_local_list_version(&self) -> StoreResult<i32>;

    async fn set_local_list_version(&self, version: i32) -> StoreResult<()>;

    async fn clear_local_authorization_list(&self) -> StoreResult<()>;

    /// Apply entries; an entry without idTagInfo removes the id tag
    async fn upsert_local_authorization_entries(
        &self,
        entries: Vec<AuthorizationData>,
    ) -> StoreResult<()>;

    async fn get_local_authorization_entry(
        &self,
        id_tag: &str,
    ) -> StoreResult<Option<IdTagInfo>>;

    // -- connector availability ---------------------------------------------

    async fn upsert_connector_availability(
        &self,
        connectors: &[u32],
        availability: AvailabilityType,
    ) -> StoreResult<()>;

    async fn get_connector_availability(&self, connector: u32) -> StoreResult<AvailabilityType>;

    async fn get_all_connector_availability(
        &self,
    ) -> StoreResult<HashMap<u32, AvailabilityType>>;

    // -- charging profiles --------------------------------------------------

    async fn insert_charging_profile(
        &self,
        connector: u32,
        profile: ChargingProfile,
    ) -> StoreResult<()>;

    async fn delete_charging_profile(&self, profile_id: i32) -> StoreResult<()>;

    async fn charging_profiles(&self) -> StoreResult<Vec<ChargingProfile>>;

    async fn connector_for_profile(&self, profile_id: i32) -> StoreResult<Option<u32>>;
}

#[derive(Default)]
struct InMemoryState {
    transactions: HashMap<String, TransactionRow>,
    auth_cache: HashMap<String, IdTagInfo>,
    local_list: HashMap<String, IdTagInfo>,
    local_list_version: i32,
    availability: HashMap<u32, AvailabilityType>,
    profiles: HashMap<i32, (u32, ChargingProfile)>,
}

/// Reference repository keeping everything in memory
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<InMemoryState>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert_transaction(&self, row: TransactionRow) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.transactions.insert(row.session_id.clone(), row);
        Ok(())
    }

    async fn update_transaction_cs_id(
        &self,
        session_id: &str,
        transaction_id: i32,
        parent_id_tag: Option<String>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let row = state
            .transactions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        row.transaction_id = transaction_id;
        row.parent_id_tag = parent_id_tag;
        Ok(())
    }

    async fn update_transaction_meter(&self, session_id: &str, meter_wh: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let row = state
            .transactions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        row.last_meter_wh = Some(meter_wh);
        Ok(())
    }

    async fn close_transaction(
        &self,
        session_id: &str,
        meter_stop: i32,
        stop_time: DateTime<Utc>,
        reason: Reason,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let row = state
            .transactions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        row.meter_stop = Some(meter_stop);
        row.stop_time = Some(stop_time);
        row.stop_reason = Some(reason);
        Ok(())
    }

    async fn get_transaction(&self, session_id: &str) -> StoreResult<Option<TransactionRow>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(session_id).cloned())
    }

    async fn unfinished_transactions(&self) -> StoreResult<Vec<TransactionRow>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .filter(|row| row.is_open())
            .cloned()
            .collect())
    }

    async fn upsert_authorization_cache_entry(
        &self,
        id_tag: &str,
        info: IdTagInfo,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.auth_cache.insert(id_tag.to_string(), info);
        Ok(())
    }

    async fn get_authorization_cache_entry(
        &self,
        id_tag: &str,
    ) -> StoreResult<Option<IdTagInfo>> {
        let state = self.state.read().await;
        Ok(state.auth_cache.get(id_tag).cloned())
    }

    async fn clear_authorization_cache(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.auth_cache.clear();
        Ok(())
    }

    async fn get_local_list_version(&self) -> StoreResult<i32> {
        let state = self.state.read().await;
        Ok(state.local_list_version)
    }

    async fn set_local_list_version(&self, version: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.local_list_version = version;
        Ok(())
    }

    async fn clear_local_authorization_list(&self) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.local_list.clear();
        Ok(())
    }

    async fn upsert_local_authorization_entries(
        &self,
        entries: Vec<AuthorizationData>,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for entry in entries {
            match entry.id_tag_info {
                Some(info) => {
                    state.local_list.insert(entry.id_tag, info);
                }
                None => {
                    state.local_list.remove(&entry.id_tag);
                }
            }
        }
        Ok(())
    }

    async fn get_local_authorization_entry(
        &self,
        id_tag: &str,
    ) -> StoreResult<Option<IdTagInfo>> {
        let state = self.state.read().await;
        Ok(state.local_list.get(id_tag).cloned())
    }

    async fn upsert_connector_availability(
        &self,
        connectors: &[u32],
        availability: AvailabilityType,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        for connector in connectors {
            state.availability.insert(*connector, availability);
        }
        Ok(())
    }

    async fn get_connector_availability(&self, connector: u32) -> StoreResult<AvailabilityType> {
        let state = self.state.read().await;
        Ok(state
            .availability
            .get(&connector)
            .copied()
            .unwrap_or(AvailabilityType::Operative))
    }

    async fn get_all_connector_availability(
        &self,
    ) -> StoreResult<HashMap<u32, AvailabilityType>> {
        let state = self.state.read().await;
        Ok(state.availability.clone())
    }

    async fn insert_charging_profile(
        &self,
        connector: u32,
        profile: ChargingProfile,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .profiles
            .insert(profile.charging_profile_id, (connector, profile));
        Ok(())
    }

    async fn delete_charging_profile(&self, profile_id: i32) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.profiles.remove(&profile_id);
        Ok(())
    }

    async fn charging_profiles(&self) -> StoreResult<Vec<ChargingProfile>> {
        let state = self.state.read().await;
        Ok(state
            .profiles
            .values()
            .map(|(_, profile)| profile.clone())
            .collect())
    }

    async fn connector_for_profile(&self, profile_id: i32) -> StoreResult<Option<u32>> {
        let state = self.state.read().await;
        Ok(state.profiles.get(&profile_id).map(|(c, _)| *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocpp_types::common::AuthorizationStatus;

    fn row(session_id: &str, connector: u32) -> TransactionRow {
        TransactionRow {
            session_id: session_id.to_string(),
            transaction_id: -1,
            connector_id: connector,
            id_tag: "TAG1".to_string(),
            start_time: Utc::now(),
            meter_start: 1000,
            reservation_id: None,
            parent_id_tag: None,
            last_meter_wh: None,
            meter_stop: None,
            stop_time: None,
            stop_reason: None,
        }
    }

    #[tokio::test]
    async fn test_transaction_lifecycle() {
        let repo = InMemoryRepository::new();
        repo.insert_transaction(row("s1", 1)).await.unwrap();

        let stored = repo.get_transaction("s1").await.unwrap().unwrap();
        assert!(stored.is_open());
        assert_eq!(stored.transaction_id, -1);

        repo.update_transaction_cs_id("s1", 42, None).await.unwrap();
        repo.update_transaction_meter("s1", 1200).await.unwrap();
        repo.close_transaction("s1", 1500, Utc::now(), Reason::Local)
            .await
            .unwrap();

        let stored = repo.get_transaction("s1").await.unwrap().unwrap();
        assert!(!stored.is_open());
        assert_eq!(stored.transaction_id, 42);
        assert_eq!(stored.last_meter_wh, Some(1200));
        assert_eq!(stored.meter_stop, Some(1500));
    }

    #[tokio::test]
    async fn test_unfinished_transactions() {
        let repo = InMemoryRepository::new();
        repo.insert_transaction(row("s1", 1)).await.unwrap();
        repo.insert_transaction(row("s2", 2)).await.unwrap();
        repo.close_transaction("s1", 1100, Utc::now(), Reason::PowerLoss)
            .await
            .unwrap();

        let open = repo.unfinished_transactions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].session_id, "s2");
    }

    #[tokio::test]
    async fn test_update_missing_row_fails() {
        let repo = InMemoryRepository::new();
        assert!(repo.update_transaction_meter("nope", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_authorization_cache() {
        let repo = InMemoryRepository::new();
        repo.upsert_authorization_cache_entry("TAG1", IdTagInfo::accepted())
            .await
            .unwrap();

        let entry = repo
            .get_authorization_cache_entry("TAG1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, AuthorizationStatus::Accepted);

        repo.clear_authorization_cache().await.unwrap();
        assert!(repo
            .get_authorization_cache_entry("TAG1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_local_list_differential_remove() {
        let repo = InMemoryRepository::new();
        repo.upsert_local_authorization_entries(vec![
            AuthorizationData {
                id_tag: "A".into(),
                id_tag_info: Some(IdTagInfo::accepted()),
            },
            AuthorizationData {
                id_tag: "B".into(),
                id_tag_info: Some(IdTagInfo::accepted()),
            },
        ])
        .await
        .unwrap();

        // entry without idTagInfo removes the tag
        repo.upsert_local_authorization_entries(vec![AuthorizationData {
            id_tag: "A".into(),
            id_tag_info: None,
        }])
        .await
        .unwrap();

        assert!(repo
            .get_local_authorization_entry("A")
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .get_local_authorization_entry("B")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_availability_defaults_operative() {
        let repo = InMemoryRepository::new();
        assert_eq!(
            repo.get_connector_availability(1).await.unwrap(),
            AvailabilityType::Operative
        );

        repo.upsert_connector_availability(&[1, 2], AvailabilityType::Inoperative)
            .await
            .unwrap();
        assert_eq!(
            repo.get_connector_availability(1).await.unwrap(),
            AvailabilityType::Inoperative
        );
    }
}
