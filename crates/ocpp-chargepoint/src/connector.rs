//! Connector table
//!
//! Holds one entry per connector (0..=N): the operational state machine, the
//! last power meter snapshot, the offered current and the persisted
//! availability. Readers take a short guard; the lock is never held across
//! an await.

use crate::state_machine::{ConnectorEvent, ConnectorStateMachine, StateTransition};
use ocpp_types::common::{
    AvailabilityType, Location, Measurand, MeterValue, Phase, PhasedReading, Powermeter,
    ReadingContext, SampledValue, UnitOfMeasure, ValueFormat,
};
use ocpp_types::v16j::{ChargePointErrorCode, ChargePointStatus};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// One physical outlet (or, for id 0, the charge point itself)
struct ConnectorEntry {
    state_machine: ConnectorStateMachine,
    powermeter: Option<Powermeter>,
    max_current_offered: f32,
    availability: AvailabilityType,
    /// Session id of the active transaction, if any (backreference only,
    /// the transaction manager owns the record)
    transaction_session: Option<String>,
}

/// Table of all connectors, owned by the charge point core
pub struct ConnectorTable {
    entries: RwLock<BTreeMap<u32, ConnectorEntry>>,
    count: u32,
}

impl ConnectorTable {
    /// Create entries for connector 0 (reduced machine) and 1..=count
    pub fn new(count: u32) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            0,
            ConnectorEntry {
                state_machine: ConnectorStateMachine::reduced(ChargePointStatus::Available),
                powermeter: None,
                max_current_offered: 0.0,
                availability: AvailabilityType::Operative,
                transaction_session: None,
            },
        );
        for id in 1..=count {
            entries.insert(
                id,
                ConnectorEntry {
                    state_machine: ConnectorStateMachine::new(ChargePointStatus::Available),
                    powermeter: None,
                    max_current_offered: 0.0,
                    availability: AvailabilityType::Operative,
                    transaction_session: None,
                },
            );
        }
        Self {
            entries: RwLock::new(entries),
            count,
        }
    }

    /// Number of physical connectors (excluding 0)
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn exists(&self, connector: u32) -> bool {
        connector <= self.count
    }

    /// Drive the connector's state machine; None for an unknown connector
    pub fn submit_event(&self, connector: u32, event: ConnectorEvent) -> Option<StateTransition> {
        let mut entries = self.entries.write().unwrap();
        entries
            .get_mut(&connector)
            .map(|entry| entry.state_machine.submit_event(event))
    }

    pub fn state(&self, connector: u32) -> Option<ChargePointStatus> {
        let entries = self.entries.read().unwrap();
        entries.get(&connector).map(|entry| entry.state_machine.state())
    }

    pub fn error_code(&self, connector: u32) -> ChargePointErrorCode {
        let entries = self.entries.read().unwrap();
        entries
            .get(&connector)
            .map(|entry| entry.state_machine.error_code())
            .unwrap_or(ChargePointErrorCode::NoError)
    }

    /// Seed states from persisted availability before the first status run
    pub fn seed_from_availability(&self, availability: &std::collections::HashMap<u32, AvailabilityType>) {
        let mut entries = self.entries.write().unwrap();
        for (id, entry) in entries.iter_mut() {
            let availability = if *id == 0 {
                // connector 0 is always operative
                AvailabilityType::Operative
            } else {
                availability
                    .get(id)
                    .copied()
                    .unwrap_or(AvailabilityType::Operative)
            };
            entry.availability = availability;
            entry.state_machine.force_state(match availability {
                AvailabilityType::Operative => ChargePointStatus::Available,
                AvailabilityType::Inoperative => ChargePointStatus::Unavailable,
            });
        }
    }

    pub fn set_powermeter(&self, connector: u32, powermeter: Powermeter) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(&connector) {
            entry.powermeter = Some(powermeter);
        }
    }

    pub fn powermeter(&self, connector: u32) -> Option<Powermeter> {
        let entries = self.entries.read().unwrap();
        entries.get(&connector).and_then(|entry| entry.powermeter.clone())
    }

    pub fn set_max_current_offered(&self, connector: u32, amps: f32) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(&connector) {
            entry.max_current_offered = amps;
        }
    }

    pub fn max_current_offered(&self, connector: u32) -> f32 {
        let entries = self.entries.read().unwrap();
        entries
            .get(&connector)
            .map(|entry| entry.max_current_offered)
            .unwrap_or(0.0)
    }

    pub fn set_availability(&self, connector: u32, availability: AvailabilityType) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(&connector) {
            entry.availability = availability;
        }
    }

    pub fn availability(&self, connector: u32) -> AvailabilityType {
        let entries = self.entries.read().unwrap();
        entries
            .get(&connector)
            .map(|entry| entry.availability)
            .unwrap_or(AvailabilityType::Operative)
    }

    pub fn set_transaction_session(&self, connector: u32, session_id: Option<String>) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get_mut(&connector) {
            entry.transaction_session = session_id;
        }
    }

    pub fn transaction_session(&self, connector: u32) -> Option<String> {
        let entries = self.entries.read().unwrap();
        entries
            .get(&connector)
            .and_then(|entry| entry.transaction_session.clone())
    }

    /// Capture the configured measurands from the connector's last snapshot
    /// into a MeterValue; empty sampledValue when no snapshot exists.
    pub fn latest_meter_value(
        &self,
        connector: u32,
        measurands: &[Measurand],
        context: ReadingContext,
    ) -> Option<MeterValue> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&connector)?;
        let powermeter = entry.powermeter.as_ref()?;
        Some(filtered_meter_value(
            powermeter,
            measurands,
            context,
            entry.max_current_offered,
        ))
    }
}

/// Build the sampled-value vector for the configured measurands from one
/// power meter snapshot. Missing readings and phases are skipped.
pub fn filtered_meter_value(
    powermeter: &Powermeter,
    measurands: &[Measurand],
    context: ReadingContext,
    max_current_offered: f32,
) -> MeterValue {
    let mut sampled_value = Vec::new();

    for measurand in measurands {
        match measurand {
            Measurand::EnergyActiveImportRegister => push_phased(
                &mut sampled_value,
                Some(&powermeter.energy_wh_import),
                *measurand,
                context,
                Some(UnitOfMeasure::Wh),
                Some(Location::Outlet),
            ),
            Measurand::EnergyActiveExportRegister => push_phased(
                &mut sampled_value,
                powermeter.energy_wh_export.as_ref(),
                *measurand,
                context,
                Some(UnitOfMeasure::Wh),
                None,
            ),
            Measurand::PowerActiveImport => push_phased(
                &mut sampled_value,
                powermeter.power_w.as_ref(),
                *measurand,
                context,
                Some(UnitOfMeasure::W),
                Some(Location::Outlet),
            ),
            Measurand::Voltage => push_phased(
                &mut sampled_value,
                powermeter.voltage_v.as_ref(),
                *measurand,
                context,
                Some(UnitOfMeasure::V),
                Some(Location::Outlet),
            ),
            Measurand::CurrentImport => push_phased(
                &mut sampled_value,
                powermeter.current_a.as_ref(),
                *measurand,
                context,
                Some(UnitOfMeasure::A),
                Some(Location::Outlet),
            ),
            Measurand::Frequency => push_phased(
                &mut sampled_value,
                powermeter.frequency_hz.as_ref(),
                *measurand,
                context,
                // 1.6J has no unit for Hz
                None,
                None,
            ),
            Measurand::CurrentOffered => sampled_value.push(SampledValue {
                value: format_reading(max_current_offered),
                context: Some(context),
                format: Some(ValueFormat::Raw),
                measurand: Some(*measurand),
                phase: None,
                location: Some(Location::Outlet),
                unit: Some(UnitOfMeasure::A),
            }),
            // not derivable from the power meter snapshot
            _ => {}
        }
    }

    MeterValue {
        timestamp: powermeter.timestamp,
        sampled_value,
    }
}

fn push_phased(
    out: &mut Vec<SampledValue>,
    reading: Option<&PhasedReading>,
    measurand: Measurand,
    context: ReadingContext,
    unit: Option<UnitOfMeasure>,
    location: Option<Location>,
) {
    let Some(reading) = reading else {
        return;
    };
    let sample = |value: f32, phase: Option<Phase>| SampledValue {
        value: format_reading(value),
        context: Some(context),
        format: Some(ValueFormat::Raw),
        measurand: Some(measurand),
        phase,
        location,
        unit,
    };
    out.push(sample(reading.total, None));
    for phase in [Phase::L1, Phase::L2, Phase::L3] {
        if let Some(value) = reading.phase(phase) {
            out.push(sample(value, Some(phase)));
        }
    }
}

fn format_reading(value: f32) -> String {
    // trim trailing zeros the way meters usually report
    let formatted = format!("{:.2}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> Powermeter {
        Powermeter {
            timestamp: Utc::now(),
            energy_wh_import: PhasedReading {
                total: 1234.5,
                l1: Some(400.0),
                l2: Some(434.5),
                l3: Some(400.0),
            },
            energy_wh_export: None,
            power_w: Some(PhasedReading::total(7360.0)),
            voltage_v: Some(PhasedReading {
                total: 230.0,
                l1: Some(230.0),
                l2: None,
                l3: None,
            }),
            current_a: None,
            frequency_hz: Some(PhasedReading::total(50.0)),
        }
    }

    #[test]
    fn test_table_layout() {
        let table = ConnectorTable::new(2);
        assert_eq!(table.count(), 2);
        assert!(table.exists(0));
        assert!(table.exists(2));
        assert!(!table.exists(3));
        assert_eq!(table.state(1), Some(ChargePointStatus::Available));
    }

    #[test]
    fn test_seed_from_availability() {
        let table = ConnectorTable::new(2);
        let mut availability = std::collections::HashMap::new();
        availability.insert(1, AvailabilityType::Inoperative);

        table.seed_from_availability(&availability);

        assert_eq!(table.state(0), Some(ChargePointStatus::Available));
        assert_eq!(table.state(1), Some(ChargePointStatus::Unavailable));
        assert_eq!(table.state(2), Some(ChargePointStatus::Available));
        assert_eq!(table.availability(1), AvailabilityType::Inoperative);
    }

    #[test]
    fn test_event_flow_through_table() {
        let table = ConnectorTable::new(1);
        let transition = table
            .submit_event(1, ConnectorEvent::UsageInitiated)
            .unwrap();
        assert!(transition.changed);
        assert_eq!(table.state(1), Some(ChargePointStatus::Preparing));

        assert!(table.submit_event(9, ConnectorEvent::UsageInitiated).is_none());
    }

    #[test]
    fn test_filtered_meter_value_totals_and_phases() {
        let meter_value = filtered_meter_value(
            &snapshot(),
            &[
                Measurand::EnergyActiveImportRegister,
                Measurand::Voltage,
                Measurand::CurrentImport,
                Measurand::CurrentOffered,
            ],
            ReadingContext::SamplePeriodic,
            16.0,
        );

        // energy: total + 3 phases, voltage: total + L1, current: absent,
        // current offered: 1
        assert_eq!(meter_value.sampled_value.len(), 4 + 2 + 1);

        let energy_total = &meter_value.sampled_value[0];
        assert_eq!(energy_total.value, "1234.5");
        assert_eq!(energy_total.phase, None);
        assert_eq!(energy_total.unit, Some(UnitOfMeasure::Wh));

        let offered = meter_value
            .sampled_value
            .iter()
            .find(|s| s.measurand == Some(Measurand::CurrentOffered))
            .unwrap();
        assert_eq!(offered.value, "16");
    }

    #[test]
    fn test_frequency_has_no_unit() {
        let meter_value = filtered_meter_value(
            &snapshot(),
            &[Measurand::Frequency],
            ReadingContext::SampleClock,
            0.0,
        );
        assert_eq!(meter_value.sampled_value.len(), 1);
        assert_eq!(meter_value.sampled_value[0].unit, None);
        assert_eq!(meter_value.sampled_value[0].value, "50");
    }

    #[test]
    fn test_latest_meter_value_requires_snapshot() {
        let table = ConnectorTable::new(1);
        assert!(table
            .latest_meter_value(1, &[Measurand::Voltage], ReadingContext::SamplePeriodic)
            .is_none());

        table.set_powermeter(1, snapshot());
        table.set_max_current_offered(1, 32.0);
        let meter_value = table
            .latest_meter_value(
                1,
                &[Measurand::CurrentOffered],
                ReadingContext::SamplePeriodic,
            )
            .unwrap();
        assert_eq!(meter_value.sampled_value[0].value, "32");
    }

    #[test]
    fn test_transaction_session_backref() {
        let table = ConnectorTable::new(1);
        table.set_transaction_session(1, Some("session-1".into()));
        assert_eq!(table.transaction_session(1).unwrap(), "session-1");
        table.set_transaction_session(1, None);
        assert!(table.transaction_session(1).is_none());
    }
}
