//! Connector state machines
//!
//! Per-connector finite state machine over the nine OCPP 1.6J operational
//! states, driven by events from the EVSE manager and from CS-initiated
//! operations. Connector 0 (the charge point itself) runs a reduced machine
//! over Available / Unavailable / Faulted.

use ocpp_types::v16j::{ChargePointErrorCode, ChargePointStatus};
use tracing::{debug, warn};

/// Events that drive connector state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// Cable plugged in or token presented
    UsageInitiated,
    /// Energy transfer started or resumed
    StartCharging,
    /// EV paused the charge
    PauseChargingEV,
    /// EVSE paused the charge
    PauseChargingEVSE,
    /// Transaction stopped, cable still attached
    TransactionStoppedAndUserActionRequired,
    /// Connector returns to service
    BecomeAvailable,
    /// ChangeAvailability to Inoperative took effect
    ChangeAvailabilityToUnavailable,
    /// Reservation placed on the connector
    ReserveConnector,
    /// Hardware fault reported
    FaultDetected(ChargePointErrorCode),
    /// Fault cleared
    ReturnToAvailable,
}

/// Outcome of feeding an event into the machine
#[derive(Debug, Clone, PartialEq)]
pub struct StateTransition {
    pub from: ChargePointStatus,
    pub to: ChargePointStatus,
    pub error_code: ChargePointErrorCode,
    /// False when the event was not valid in the current state
    pub changed: bool,
}

/// State machine for one connector
#[derive(Debug)]
pub struct ConnectorStateMachine {
    state: ChargePointStatus,
    error_code: ChargePointErrorCode,
    /// Connector 0 only accepts the reduced state set
    reduced: bool,
}

impl ConnectorStateMachine {
    pub fn new(initial: ChargePointStatus) -> Self {
        Self {
            state: initial,
            error_code: ChargePointErrorCode::NoError,
            reduced: false,
        }
    }

    /// Reduced machine for connector 0
    pub fn reduced(initial: ChargePointStatus) -> Self {
        Self {
            state: initial,
            error_code: ChargePointErrorCode::NoError,
            reduced: true,
        }
    }

    pub fn state(&self) -> ChargePointStatus {
        self.state
    }

    pub fn error_code(&self) -> ChargePointErrorCode {
        self.error_code
    }

    fn next_state(&self, event: &ConnectorEvent) -> Option<ChargePointStatus> {
        use ChargePointStatus::*;
        use ConnectorEvent::*;

        if self.reduced {
            return match (self.state, event) {
                (Unavailable, BecomeAvailable) => Some(Available),
                (Available, ChangeAvailabilityToUnavailable) => Some(Unavailable),
                (Faulted, ChangeAvailabilityToUnavailable) => Some(Unavailable),
                (_, FaultDetected(_)) => Some(Faulted),
                (Faulted, ReturnToAvailable) => Some(Available),
                _ => None,
            };
        }

        match (self.state, event) {
            // faults override everything
            (_, FaultDetected(_)) => Some(Faulted),
            (Faulted, ReturnToAvailable) => Some(Available),
            (Faulted, ChangeAvailabilityToUnavailable) => Some(Unavailable),

            (Available, UsageInitiated) => Some(Preparing),
            (Available, StartCharging) => Some(Charging),
            (Available, ReserveConnector) => Some(Reserved),
            (Available, ChangeAvailabilityToUnavailable) => Some(Unavailable),

            (Preparing, StartCharging) => Some(Charging),
            (Preparing, PauseChargingEV) => Some(SuspendedEV),
            (Preparing, TransactionStoppedAndUserActionRequired) => Some(Finishing),
            (Preparing, BecomeAvailable) => Some(Available),
            (Preparing, ChangeAvailabilityToUnavailable) => Some(Unavailable),

            (Charging, PauseChargingEV) => Some(SuspendedEV),
            (Charging, PauseChargingEVSE) => Some(SuspendedEVSE),
            (Charging, TransactionStoppedAndUserActionRequired) => Some(Finishing),
            (Charging, BecomeAvailable) => Some(Available),

            (SuspendedEV, StartCharging) => Some(Charging),
            (SuspendedEV, PauseChargingEVSE) => Some(SuspendedEVSE),
            (SuspendedEV, TransactionStoppedAndUserActionRequired) => Some(Finishing),
            (SuspendedEV, BecomeAvailable) => Some(Available),

            (SuspendedEVSE, StartCharging) => Some(Charging),
            (SuspendedEVSE, PauseChargingEV) => Some(SuspendedEV),
            (SuspendedEVSE, TransactionStoppedAndUserActionRequired) => Some(Finishing),
            (SuspendedEVSE, BecomeAvailable) => Some(Available),

            (Finishing, BecomeAvailable) => Some(Available),
            (Finishing, UsageInitiated) => Some(Preparing),
            (Finishing, ChangeAvailabilityToUnavailable) => Some(Unavailable),

            (Reserved, UsageInitiated) => Some(Preparing),
            (Reserved, BecomeAvailable) => Some(Available),
            (Reserved, ChangeAvailabilityToUnavailable) => Some(Unavailable),

            (Unavailable, BecomeAvailable) => Some(Available),

            _ => None,
        }
    }

    /// Feed an event; an invalid event leaves the state untouched
    pub fn submit_event(&mut self, event: ConnectorEvent) -> StateTransition {
        let from = self.state;
        match self.next_state(&event) {
            Some(to) => {
                self.state = to;
                self.error_code = match &event {
                    ConnectorEvent::FaultDetected(code) => *code,
                    _ => ChargePointErrorCode::NoError,
                };
                debug!("Connector state {} -> {} on {:?}", from, to, event);
                StateTransition {
                    from,
                    to,
                    error_code: self.error_code,
                    changed: from != to,
                }
            }
            None => {
                warn!("Ignoring event {:?} in state {}", event, from);
                StateTransition {
                    from,
                    to: from,
                    error_code: self.error_code,
                    changed: false,
                }
            }
        }
    }

    /// Force a state, used when seeding from persisted availability
    pub fn force_state(&mut self, state: ChargePointStatus) {
        self.state = state;
        if state != ChargePointStatus::Faulted {
            self.error_code = ChargePointErrorCode::NoError;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChargePointStatus::*;
    use ConnectorEvent::*;

    #[test]
    fn test_full_charge_cycle() {
        let mut sm = ConnectorStateMachine::new(Available);

        assert!(sm.submit_event(UsageInitiated).changed);
        assert_eq!(sm.state(), Preparing);

        assert!(sm.submit_event(StartCharging).changed);
        assert_eq!(sm.state(), Charging);

        assert!(sm
            .submit_event(TransactionStoppedAndUserActionRequired)
            .changed);
        assert_eq!(sm.state(), Finishing);

        assert!(sm.submit_event(BecomeAvailable).changed);
        assert_eq!(sm.state(), Available);
    }

    #[test]
    fn test_suspend_resume() {
        let mut sm = ConnectorStateMachine::new(Charging);

        sm.submit_event(PauseChargingEV);
        assert_eq!(sm.state(), SuspendedEV);

        sm.submit_event(StartCharging);
        assert_eq!(sm.state(), Charging);

        sm.submit_event(PauseChargingEVSE);
        assert_eq!(sm.state(), SuspendedEVSE);

        sm.submit_event(StartCharging);
        assert_eq!(sm.state(), Charging);
    }

    #[test]
    fn test_fault_from_any_state() {
        for initial in [Available, Preparing, Charging, Reserved, Unavailable] {
            let mut sm = ConnectorStateMachine::new(initial);
            let transition =
                sm.submit_event(FaultDetected(ChargePointErrorCode::GroundFailure));
            assert_eq!(transition.to, Faulted);
            assert_eq!(sm.error_code(), ChargePointErrorCode::GroundFailure);
        }
    }

    #[test]
    fn test_fault_clears_to_available() {
        let mut sm = ConnectorStateMachine::new(Charging);
        sm.submit_event(FaultDetected(ChargePointErrorCode::OverCurrentFailure));
        assert_eq!(sm.state(), Faulted);

        sm.submit_event(ReturnToAvailable);
        assert_eq!(sm.state(), Available);
        assert_eq!(sm.error_code(), ChargePointErrorCode::NoError);
    }

    #[test]
    fn test_reservation_flow() {
        let mut sm = ConnectorStateMachine::new(Available);
        sm.submit_event(ReserveConnector);
        assert_eq!(sm.state(), Reserved);

        // reservation holder plugs in
        sm.submit_event(UsageInitiated);
        assert_eq!(sm.state(), Preparing);
    }

    #[test]
    fn test_invalid_event_keeps_state() {
        let mut sm = ConnectorStateMachine::new(Available);
        let transition = sm.submit_event(PauseChargingEVSE);
        assert!(!transition.changed);
        assert_eq!(sm.state(), Available);
    }

    #[test]
    fn test_unavailable_cycle() {
        let mut sm = ConnectorStateMachine::new(Available);
        sm.submit_event(ChangeAvailabilityToUnavailable);
        assert_eq!(sm.state(), Unavailable);

        sm.submit_event(BecomeAvailable);
        assert_eq!(sm.state(), Available);
    }

    #[test]
    fn test_reduced_machine_rejects_session_events() {
        let mut sm = ConnectorStateMachine::reduced(Available);
        assert!(!sm.submit_event(UsageInitiated).changed);
        assert!(!sm.submit_event(StartCharging).changed);

        assert!(sm.submit_event(ChangeAvailabilityToUnavailable).changed);
        assert_eq!(sm.state(), Unavailable);

        assert!(sm.submit_event(BecomeAvailable).changed);
        assert_eq!(sm.state(), Available);

        assert!(sm
            .submit_event(FaultDetected(ChargePointErrorCode::InternalError))
            .changed);
        assert_eq!(sm.state(), Faulted);
    }
}
