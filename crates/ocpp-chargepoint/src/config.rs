//! Typed OCPP configuration store
//!
//! Holds every configuration key from OCPP 1.6J §9 plus the Security
//! Whitepaper keys, each with a read-only flag and type validation. The
//! Central System reads and writes keys through GetConfiguration /
//! ChangeConfiguration; the runtime consumes them through typed getters.

use ocpp_types::common::{
    ChargePointInfo, ChargingRateUnitType, KeyValue, Measurand, DEFAULT_AND_MAX_NUMBER_PHASES,
};
use ocpp_types::v16j::ConfigurationStatus;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

/// Static host-provided settings that do not live in the key/value store
#[derive(Debug, Clone)]
pub struct ChargePointSettings {
    /// Charge point identity used in the connection URL
    pub charge_point_id: String,
    /// Vendor/model/serial fields for BootNotification
    pub info: ChargePointInfo,
    /// Number of physical connectors (1..N)
    pub number_of_connectors: u32,
    /// Phase count per connector, used for A <-> W conversion
    pub connector_phases: i32,
    /// Initial overrides for configuration keys
    pub config_overrides: HashMap<String, String>,
}

impl Default for ChargePointSettings {
    fn default() -> Self {
        Self {
            charge_point_id: "CP001".to_string(),
            info: ChargePointInfo {
                charge_point_vendor: "ocpp-chargepoint".to_string(),
                charge_point_model: "Runtime".to_string(),
                charge_point_serial_number: None,
                charge_box_serial_number: None,
                firmware_version: Some(env!("CARGO_PKG_VERSION").to_string()),
                iccid: None,
                imsi: None,
                meter_type: None,
                meter_serial_number: None,
            },
            number_of_connectors: 2,
            connector_phases: DEFAULT_AND_MAX_NUMBER_PHASES,
            config_overrides: HashMap::new(),
        }
    }
}

/// How a configuration value is validated on ChangeConfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyType {
    Boolean,
    Integer,
    String,
    /// Comma separated list of measurands
    MeasurandList,
    /// Comma separated list of "Current" / "Power"
    RateUnitList,
}

#[derive(Debug, Clone)]
struct ConfigEntry {
    value: String,
    readonly: bool,
    key_type: KeyType,
}

impl ConfigEntry {
    fn rw(value: &str, key_type: KeyType) -> Self {
        Self {
            value: value.to_string(),
            readonly: false,
            key_type,
        }
    }

    fn ro(value: &str, key_type: KeyType) -> Self {
        Self {
            value: value.to_string(),
            readonly: true,
            key_type,
        }
    }
}

/// The configuration store. Interior mutability so the runtime can share one
/// instance across components; the lock is never held across an await.
pub struct Configuration {
    settings: ChargePointSettings,
    entries: RwLock<HashMap<String, ConfigEntry>>,
}

impl Configuration {
    pub fn new(settings: ChargePointSettings) -> Self {
        let mut entries = HashMap::new();

        // Core profile
        entries.insert(
            "AllowOfflineTxForUnknownId".into(),
            ConfigEntry::rw("false", KeyType::Boolean),
        );
        entries.insert(
            "AuthorizationCacheEnabled".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "AuthorizeRemoteTxRequests".into(),
            ConfigEntry::rw("false", KeyType::Boolean),
        );
        entries.insert(
            "ClockAlignedDataInterval".into(),
            ConfigEntry::rw("0", KeyType::Integer),
        );
        entries.insert(
            "ConnectionTimeOut".into(),
            ConfigEntry::rw("60", KeyType::Integer),
        );
        entries.insert(
            "ConnectorPhaseRotation".into(),
            ConfigEntry::rw("NotApplicable", KeyType::String),
        );
        entries.insert(
            "GetConfigurationMaxKeys".into(),
            ConfigEntry::ro("100", KeyType::Integer),
        );
        entries.insert(
            "HeartbeatInterval".into(),
            ConfigEntry::rw("86400", KeyType::Integer),
        );
        entries.insert(
            "LocalAuthorizeOffline".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "LocalPreAuthorize".into(),
            ConfigEntry::rw("false", KeyType::Boolean),
        );
        entries.insert(
            "MeterValuesAlignedData".into(),
            ConfigEntry::rw("Energy.Active.Import.Register", KeyType::MeasurandList),
        );
        entries.insert(
            "MeterValuesSampledData".into(),
            ConfigEntry::rw("Energy.Active.Import.Register", KeyType::MeasurandList),
        );
        entries.insert(
            "MeterValueSampleInterval".into(),
            ConfigEntry::rw("60", KeyType::Integer),
        );
        entries.insert(
            "MinimumStatusDuration".into(),
            ConfigEntry::rw("0", KeyType::Integer),
        );
        entries.insert(
            "NumberOfConnectors".into(),
            ConfigEntry::ro(&settings.number_of_connectors.to_string(), KeyType::Integer),
        );
        entries.insert("ResetRetries".into(), ConfigEntry::rw("3", KeyType::Integer));
        entries.insert(
            "StopTransactionOnEVSideDisconnect".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "StopTransactionOnInvalidId".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "StopTxnAlignedData".into(),
            ConfigEntry::rw("", KeyType::MeasurandList),
        );
        entries.insert(
            "StopTxnSampledData".into(),
            ConfigEntry::rw("Energy.Active.Import.Register", KeyType::MeasurandList),
        );
        entries.insert(
            "SupportedFeatureProfiles".into(),
            ConfigEntry::ro(
                "Core,FirmwareManagement,LocalAuthListManagement,Reservation,SmartCharging,RemoteTrigger",
                KeyType::String,
            ),
        );
        entries.insert(
            "TransactionMessageAttempts".into(),
            ConfigEntry::rw("3", KeyType::Integer),
        );
        entries.insert(
            "TransactionMessageRetryInterval".into(),
            ConfigEntry::rw("60", KeyType::Integer),
        );
        entries.insert(
            "UnlockConnectorOnEVSideDisconnect".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "WebsocketReconnectInterval".into(),
            ConfigEntry::rw("10", KeyType::Integer),
        );

        // Local auth list management profile
        entries.insert(
            "LocalAuthListEnabled".into(),
            ConfigEntry::rw("true", KeyType::Boolean),
        );
        entries.insert(
            "LocalAuthListMaxLength".into(),
            ConfigEntry::ro("250", KeyType::Integer),
        );
        entries.insert(
            "SendLocalListMaxLength".into(),
            ConfigEntry::ro("250", KeyType::Integer),
        );

        // Smart charging profile
        entries.insert(
            "ChargeProfileMaxStackLevel".into(),
            ConfigEntry::ro("10", KeyType::Integer),
        );
        entries.insert(
            "ChargingScheduleAllowedChargingRateUnit".into(),
            ConfigEntry::ro("Current,Power", KeyType::RateUnitList),
        );
        entries.insert(
            "ChargingScheduleMaxPeriods".into(),
            ConfigEntry::ro("48", KeyType::Integer),
        );
        entries.insert(
            "MaxChargingProfilesInstalled".into(),
            ConfigEntry::ro("20", KeyType::Integer),
        );
        entries.insert(
            "MaxCompositeScheduleDuration".into(),
            ConfigEntry::ro("86400", KeyType::Integer),
        );

        // Security Whitepaper
        entries.insert(
            "SecurityProfile".into(),
            ConfigEntry::rw("0", KeyType::Integer),
        );
        entries.insert(
            "AuthorizationKey".into(),
            ConfigEntry::rw("", KeyType::String),
        );
        entries.insert("CpoName".into(), ConfigEntry::rw("", KeyType::String));
        entries.insert(
            "AdditionalRootCertificateCheck".into(),
            ConfigEntry::ro("false", KeyType::Boolean),
        );
        entries.insert(
            "CertificateStoreMaxLength".into(),
            ConfigEntry::ro("10", KeyType::Integer),
        );

        for (key, value) in &settings.config_overrides {
            match entries.get_mut(key) {
                Some(entry) => entry.value = value.clone(),
                None => warn!("Ignoring override for unknown configuration key {}", key),
            }
        }

        Self {
            settings,
            entries: RwLock::new(entries),
        }
    }

    pub fn settings(&self) -> &ChargePointSettings {
        &self.settings
    }

    pub fn charge_point_id(&self) -> &str {
        &self.settings.charge_point_id
    }

    /// Lookup a key for GetConfiguration. AuthorizationKey is write-only and
    /// reported as unknown.
    pub fn get(&self, key: &str) -> Option<KeyValue> {
        if key == "AuthorizationKey" {
            return None;
        }
        let entries = self.entries.read().unwrap();
        entries.get(key).map(|entry| KeyValue {
            key: key.to_string(),
            value: Some(entry.value.clone()),
            readonly: entry.readonly,
        })
    }

    /// All reportable key/value pairs, sorted by key
    pub fn get_all_key_value(&self) -> Vec<KeyValue> {
        let entries = self.entries.read().unwrap();
        let mut keys: Vec<&String> = entries
            .keys()
            .filter(|k| k.as_str() != "AuthorizationKey")
            .collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let entry = &entries[key];
                KeyValue {
                    key: key.clone(),
                    value: Some(entry.value.clone()),
                    readonly: entry.readonly,
                }
            })
            .collect()
    }

    /// Whether the key exists and is read-only
    pub fn is_readonly(&self, key: &str) -> Option<bool> {
        let entries = self.entries.read().unwrap();
        entries.get(key).map(|entry| entry.readonly)
    }

    /// Validate and set a key from ChangeConfiguration
    pub fn set(&self, key: &str, value: &str) -> ConfigurationStatus {
        let mut entries = self.entries.write().unwrap();
        let entry = match entries.get_mut(key) {
            Some(entry) => entry,
            None => return ConfigurationStatus::NotSupported,
        };
        if entry.readonly {
            return ConfigurationStatus::Rejected;
        }
        let valid = match entry.key_type {
            KeyType::Boolean => matches!(value, "true" | "false"),
            KeyType::Integer => value.parse::<i64>().map(|v| v >= 0).unwrap_or(false),
            KeyType::String => true,
            KeyType::MeasurandList => parse_measurand_csl(value).is_some(),
            KeyType::RateUnitList => parse_rate_unit_csl(value).is_some(),
        };
        if !valid {
            return ConfigurationStatus::Rejected;
        }
        if key == "SecurityProfile" {
            // profile downgrades are a security event, not a config change
            let current: i32 = entry.value.parse().unwrap_or(0);
            let requested: i32 = value.parse().unwrap_or(-1);
            if !(0..=3).contains(&requested) || requested < current {
                return ConfigurationStatus::Rejected;
            }
        }
        entry.value = value.to_string();
        ConfigurationStatus::Accepted
    }

    /// Internal setter bypassing the read-only flag (e.g. persisting the
    /// server-chosen heartbeat interval)
    pub fn set_internal(&self, key: &str, value: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.value = value.to_string();
        }
    }

    fn raw(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap();
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn int(&self, key: &str, default: i64) -> i64 {
        self.raw(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn boolean(&self, key: &str, default: bool) -> bool {
        self.raw(key)
            .map(|v| v == "true")
            .unwrap_or(default)
    }

    // -- typed getters ------------------------------------------------------

    pub fn number_of_connectors(&self) -> u32 {
        self.settings.number_of_connectors
    }

    pub fn connector_phases(&self) -> i32 {
        self.settings.connector_phases
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.int("HeartbeatInterval", 86_400).max(0) as u64
    }

    pub fn set_heartbeat_interval(&self, seconds: i32) {
        self.set_internal("HeartbeatInterval", &seconds.to_string());
    }

    pub fn meter_value_sample_interval(&self) -> u64 {
        self.int("MeterValueSampleInterval", 60).max(0) as u64
    }

    pub fn clock_aligned_data_interval(&self) -> u64 {
        self.int("ClockAlignedDataInterval", 0).max(0) as u64
    }

    pub fn connection_timeout(&self) -> i32 {
        self.int("ConnectionTimeOut", 60) as i32
    }

    pub fn minimum_status_duration(&self) -> u64 {
        self.int("MinimumStatusDuration", 0).max(0) as u64
    }

    pub fn transaction_message_attempts(&self) -> u32 {
        self.int("TransactionMessageAttempts", 3).max(1) as u32
    }

    pub fn transaction_message_retry_interval(&self) -> u64 {
        self.int("TransactionMessageRetryInterval", 60).max(0) as u64
    }

    pub fn authorize_remote_tx_requests(&self) -> bool {
        self.boolean("AuthorizeRemoteTxRequests", false)
    }

    pub fn allow_offline_tx_for_unknown_id(&self) -> bool {
        self.boolean("AllowOfflineTxForUnknownId", false)
    }

    pub fn authorization_cache_enabled(&self) -> bool {
        self.boolean("AuthorizationCacheEnabled", true)
    }

    pub fn local_pre_authorize(&self) -> bool {
        self.boolean("LocalPreAuthorize", false)
    }

    pub fn local_authorize_offline(&self) -> bool {
        self.boolean("LocalAuthorizeOffline", true)
    }

    pub fn local_auth_list_enabled(&self) -> bool {
        self.boolean("LocalAuthListEnabled", true)
    }

    pub fn stop_transaction_on_invalid_id(&self) -> bool {
        self.boolean("StopTransactionOnInvalidId", true)
    }

    pub fn unlock_connector_on_ev_side_disconnect(&self) -> bool {
        self.boolean("UnlockConnectorOnEVSideDisconnect", true)
    }

    pub fn supported_feature_profiles(&self) -> Vec<String> {
        self.raw("SupportedFeatureProfiles")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_feature_profile(&self, profile: &str) -> bool {
        self.supported_feature_profiles()
            .iter()
            .any(|p| p == profile)
    }

    pub fn security_profile(&self) -> i32 {
        self.int("SecurityProfile", 0) as i32
    }

    pub fn set_security_profile(&self, profile: i32) {
        self.set_internal("SecurityProfile", &profile.to_string());
    }

    pub fn authorization_key(&self) -> Option<String> {
        self.raw("AuthorizationKey").filter(|v| !v.is_empty())
    }

    pub fn cpo_name(&self) -> Option<String> {
        self.raw("CpoName").filter(|v| !v.is_empty())
    }

    pub fn charge_profile_max_stack_level(&self) -> i32 {
        self.int("ChargeProfileMaxStackLevel", 10) as i32
    }

    pub fn charging_schedule_max_periods(&self) -> usize {
        self.int("ChargingScheduleMaxPeriods", 48).max(0) as usize
    }

    pub fn max_charging_profiles_installed(&self) -> usize {
        self.int("MaxChargingProfilesInstalled", 20).max(0) as usize
    }

    pub fn max_composite_schedule_duration(&self) -> i32 {
        self.int("MaxCompositeScheduleDuration", 86_400) as i32
    }

    pub fn allowed_charging_rate_units(&self) -> Vec<ChargingRateUnitType> {
        self.raw("ChargingScheduleAllowedChargingRateUnit")
            .and_then(|v| parse_rate_unit_csl(&v))
            .unwrap_or_default()
    }

    pub fn meter_values_sampled_data(&self) -> Vec<Measurand> {
        self.raw("MeterValuesSampledData")
            .and_then(|v| parse_measurand_csl(&v))
            .unwrap_or_default()
    }

    pub fn meter_values_aligned_data(&self) -> Vec<Measurand> {
        self.raw("MeterValuesAlignedData")
            .and_then(|v| parse_measurand_csl(&v))
            .unwrap_or_default()
    }

    pub fn certificate_store_max_length(&self) -> i32 {
        self.int("CertificateStoreMaxLength", 10) as i32
    }

    pub fn additional_root_certificate_check(&self) -> bool {
        self.boolean("AdditionalRootCertificateCheck", false)
    }

    pub fn websocket_reconnect_interval(&self) -> u64 {
        self.int("WebsocketReconnectInterval", 10).max(1) as u64
    }
}

fn parse_measurand_csl(value: &str) -> Option<Vec<Measurand>> {
    let mut measurands = Vec::new();
    for item in value.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let measurand: Measurand =
            serde_json::from_value(Value::String(item.to_string())).ok()?;
        measurands.push(measurand);
    }
    Some(measurands)
}

fn parse_rate_unit_csl(value: &str) -> Option<Vec<ChargingRateUnitType>> {
    let mut units = Vec::new();
    for item in value.split(',') {
        match item.trim() {
            "" => continue,
            "Current" => units.push(ChargingRateUnitType::A),
            "Power" => units.push(ChargingRateUnitType::W),
            _ => return None,
        }
    }
    Some(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::new(ChargePointSettings::default())
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert_eq!(config.heartbeat_interval(), 86_400);
        assert_eq!(config.meter_value_sample_interval(), 60);
        assert_eq!(config.clock_aligned_data_interval(), 0);
        assert_eq!(config.transaction_message_attempts(), 3);
        assert!(config.local_auth_list_enabled());
        assert_eq!(config.security_profile(), 0);
    }

    #[test]
    fn test_set_unknown_key() {
        assert_eq!(
            config().set("NoSuchKey", "1"),
            ConfigurationStatus::NotSupported
        );
    }

    #[test]
    fn test_set_readonly_rejected() {
        assert_eq!(
            config().set("NumberOfConnectors", "4"),
            ConfigurationStatus::Rejected
        );
    }

    #[test]
    fn test_set_type_validation() {
        let config = config();
        assert_eq!(
            config.set("HeartbeatInterval", "abc"),
            ConfigurationStatus::Rejected
        );
        assert_eq!(
            config.set("HeartbeatInterval", "-5"),
            ConfigurationStatus::Rejected
        );
        assert_eq!(
            config.set("HeartbeatInterval", "300"),
            ConfigurationStatus::Accepted
        );
        assert_eq!(config.heartbeat_interval(), 300);

        assert_eq!(
            config.set("LocalPreAuthorize", "yes"),
            ConfigurationStatus::Rejected
        );
        assert_eq!(
            config.set("LocalPreAuthorize", "true"),
            ConfigurationStatus::Accepted
        );
    }

    #[test]
    fn test_measurand_list_validation() {
        let config = config();
        assert_eq!(
            config.set(
                "MeterValuesSampledData",
                "Energy.Active.Import.Register,Power.Active.Import,Voltage"
            ),
            ConfigurationStatus::Accepted
        );
        assert_eq!(config.meter_values_sampled_data().len(), 3);

        assert_eq!(
            config.set("MeterValuesSampledData", "Bogus.Measurand"),
            ConfigurationStatus::Rejected
        );
    }

    #[test]
    fn test_security_profile_no_downgrade() {
        let config = config();
        assert_eq!(config.set("SecurityProfile", "2"), ConfigurationStatus::Accepted);
        assert_eq!(config.set("SecurityProfile", "1"), ConfigurationStatus::Rejected);
        assert_eq!(config.set("SecurityProfile", "4"), ConfigurationStatus::Rejected);
        assert_eq!(config.security_profile(), 2);
    }

    #[test]
    fn test_authorization_key_write_only() {
        let config = config();
        assert_eq!(
            config.set("AuthorizationKey", "0011223344556677"),
            ConfigurationStatus::Accepted
        );
        assert!(config.get("AuthorizationKey").is_none());
        assert!(config
            .get_all_key_value()
            .iter()
            .all(|kv| kv.key != "AuthorizationKey"));
        assert_eq!(config.authorization_key().unwrap(), "0011223344556677");
    }

    #[test]
    fn test_allowed_rate_units() {
        let config = config();
        let units = config.allowed_charging_rate_units();
        assert!(units.contains(&ChargingRateUnitType::A));
        assert!(units.contains(&ChargingRateUnitType::W));
    }

    #[test]
    fn test_overrides_applied() {
        let mut settings = ChargePointSettings::default();
        settings
            .config_overrides
            .insert("HeartbeatInterval".into(), "120".into());
        let config = Configuration::new(settings);
        assert_eq!(config.heartbeat_interval(), 120);
    }

    #[test]
    fn test_feature_profiles() {
        let config = config();
        assert!(config.has_feature_profile("Core"));
        assert!(config.has_feature_profile("SmartCharging"));
        assert!(!config.has_feature_profile("Nonexistent"));
    }
}
