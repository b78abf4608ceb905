//! Smart charging engine
//!
//! Stores charging profiles in three stacks: ChargePointMaxProfile
//! (connector 0 only), per-connector TxDefaultProfile (connector 0 means
//! "all connectors") and per-connector TxProfile. Composite schedule
//! queries layer them with the precedence ChargePointMaxProfile over
//! TxProfile over TxDefaultProfile, highest stack level first within a
//! class.

use chrono::{DateTime, Duration, Utc};
use ocpp_types::common::{
    ChargingProfile, ChargingProfileKindType, ChargingProfilePurposeType, ChargingRateUnitType,
    ChargingSchedule, ChargingSchedulePeriod, RecurrencyKindType, LOW_VOLTAGE,
    NO_LIMIT_SPECIFIED, SECONDS_PER_DAY, SECONDS_PER_WEEK,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Validation limits sourced from the configuration
#[derive(Debug, Clone)]
pub struct ProfileLimits {
    pub max_stack_level: i32,
    pub max_installed: usize,
    pub max_periods: usize,
    pub allowed_units: Vec<ChargingRateUnitType>,
}

#[derive(Default)]
struct ProfileStore {
    /// stack level -> profile, connector 0 only
    charge_point_max: HashMap<i32, ChargingProfile>,
    /// connector -> stack level -> profile
    tx_default: HashMap<u32, HashMap<i32, ChargingProfile>>,
    /// connector -> stack level -> profile, bound to running transactions
    tx: HashMap<u32, HashMap<i32, ChargingProfile>>,
}

/// The smart charging engine. Owns all installed profiles.
#[derive(Default)]
pub struct SmartChargingHandler {
    store: Mutex<ProfileStore>,
}

impl SmartChargingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a profile against the configured limits and the purpose
    /// rules. `active_tx_id` is the Central System id of the transaction
    /// running on the target connector, if any.
    pub fn validate_profile(
        &self,
        profile: &ChargingProfile,
        connector_id: u32,
        is_remote_start: bool,
        connector_count: u32,
        limits: &ProfileLimits,
        active_tx_id: Option<i32>,
    ) -> bool {
        if connector_id > connector_count {
            warn!("Rejecting profile for unknown connector {}", connector_id);
            return false;
        }
        if profile.stack_level < 0 || profile.stack_level > limits.max_stack_level {
            warn!("Rejecting profile with stack level {}", profile.stack_level);
            return false;
        }
        let periods = &profile.charging_schedule.charging_schedule_period;
        if periods.is_empty() || periods.len() > limits.max_periods {
            warn!("Rejecting profile with {} periods", periods.len());
            return false;
        }
        if periods[0].start_period != 0 {
            warn!("Rejecting profile whose first period does not start at 0");
            return false;
        }
        if periods
            .windows(2)
            .any(|w| w[0].start_period >= w[1].start_period)
        {
            warn!("Rejecting profile with unsorted schedule periods");
            return false;
        }
        if !limits
            .allowed_units
            .contains(&profile.charging_schedule.charging_rate_unit)
        {
            warn!("Rejecting profile with disallowed charging rate unit");
            return false;
        }
        if profile.charging_profile_kind == ChargingProfileKindType::Recurring
            && profile.recurrency_kind.is_none()
        {
            warn!("Rejecting recurring profile without recurrency kind");
            return false;
        }
        if !self.replaces_existing(profile) && self.installed_count() >= limits.max_installed {
            warn!("Rejecting profile, maximum installed count reached");
            return false;
        }

        match profile.charging_profile_purpose {
            ChargingProfilePurposeType::ChargePointMaxProfile => connector_id == 0,
            ChargingProfilePurposeType::TxDefaultProfile => true,
            ChargingProfilePurposeType::TxProfile => {
                if connector_id == 0 {
                    return false;
                }
                if is_remote_start {
                    // the reference is the upcoming transaction
                    return true;
                }
                match (profile.transaction_id, active_tx_id) {
                    (Some(profile_tx), Some(active)) => profile_tx == active,
                    _ => false,
                }
            }
        }
    }

    fn replaces_existing(&self, profile: &ChargingProfile) -> bool {
        let store = self.store.lock().unwrap();
        let found =
            all_profiles(&store).any(|(_, p)| p.charging_profile_id == profile.charging_profile_id);
        found
    }

    pub fn installed_count(&self) -> usize {
        let store = self.store.lock().unwrap();
        all_profiles(&store).count()
    }

    /// Install a profile. An existing profile with the same id, or the same
    /// (purpose, stackLevel) on the same connector, is replaced.
    pub fn add_profile(&self, profile: ChargingProfile, connector_id: u32) {
        self.clear_with_filter(
            Some(profile.charging_profile_id),
            None,
            None,
            None,
            true,
        );
        let mut store = self.store.lock().unwrap();
        debug!(
            profile_id = profile.charging_profile_id,
            connector = connector_id,
            purpose = ?profile.charging_profile_purpose,
            stack = profile.stack_level,
            "Installing charging profile"
        );
        match profile.charging_profile_purpose {
            ChargingProfilePurposeType::ChargePointMaxProfile => {
                store.charge_point_max.insert(profile.stack_level, profile);
            }
            ChargingProfilePurposeType::TxDefaultProfile => {
                store
                    .tx_default
                    .entry(connector_id)
                    .or_default()
                    .insert(profile.stack_level, profile);
            }
            ChargingProfilePurposeType::TxProfile => {
                store
                    .tx
                    .entry(connector_id)
                    .or_default()
                    .insert(profile.stack_level, profile);
            }
        }
    }

    pub fn clear_all_profiles(&self) {
        let mut store = self.store.lock().unwrap();
        store.charge_point_max.clear();
        store.tx_default.clear();
        store.tx.clear();
    }

    /// Remove profiles matching the filter; true when anything matched.
    /// With `check_id_only` the other filter fields are ignored.
    pub fn clear_with_filter(
        &self,
        id: Option<i32>,
        connector_id: Option<u32>,
        stack_level: Option<i32>,
        purpose: Option<ChargingProfilePurposeType>,
        check_id_only: bool,
    ) -> bool {
        let mut store = self.store.lock().unwrap();
        let matches = |profile: &ChargingProfile, profile_connector: u32| -> bool {
            if check_id_only {
                return id.map(|id| profile.charging_profile_id == id).unwrap_or(false);
            }
            id.map(|id| profile.charging_profile_id == id).unwrap_or(true)
                && connector_id.map(|c| profile_connector == c).unwrap_or(true)
                && stack_level.map(|s| profile.stack_level == s).unwrap_or(true)
                && purpose
                    .map(|p| profile.charging_profile_purpose == p)
                    .unwrap_or(true)
        };

        let mut removed = false;
        store.charge_point_max.retain(|_, profile| {
            let keep = !matches(profile, 0);
            removed |= !keep;
            keep
        });
        for (connector, stacks) in store.tx_default.iter_mut() {
            let connector = *connector;
            stacks.retain(|_, profile| {
                let keep = !matches(profile, connector);
                removed |= !keep;
                keep
            });
        }
        for (connector, stacks) in store.tx.iter_mut() {
            let connector = *connector;
            stacks.retain(|_, profile| {
                let keep = !matches(profile, connector);
                removed |= !keep;
                keep
            });
        }
        removed
    }

    /// Remove the TxProfiles of a connector when its transaction ends
    pub fn clear_tx_profiles(&self, connector_id: u32) {
        let mut store = self.store.lock().unwrap();
        store.tx.remove(&connector_id);
    }

    /// All installed profiles with their owning connector
    pub fn profiles_with_connectors(&self) -> Vec<(u32, ChargingProfile)> {
        let store = self.store.lock().unwrap();
        all_profiles(&store)
            .map(|(connector, profile)| (connector, profile.clone()))
            .collect()
    }

    /// Compute the composite schedule for one connector over
    /// `[start, start + duration)`, expressed in `unit`.
    pub fn composite_schedule(
        &self,
        connector_id: u32,
        start: DateTime<Utc>,
        duration_s: i32,
        unit: ChargingRateUnitType,
        default_phases: i32,
        tx_start_time: Option<DateTime<Utc>>,
    ) -> ChargingSchedule {
        let store = self.store.lock().unwrap();
        let end = start + Duration::seconds(duration_s as i64);

        let cp_max = stack_descending(store.charge_point_max.values());
        let tx = store
            .tx
            .get(&connector_id)
            .map(|stacks| stack_descending(stacks.values()))
            .unwrap_or_default();
        // connector 0 defaults apply to every connector without an override
        let tx_default = store
            .tx_default
            .get(&connector_id)
            .filter(|stacks| !stacks.is_empty())
            .or_else(|| store.tx_default.get(&0))
            .map(|stacks| stack_descending(stacks.values()))
            .unwrap_or_default();

        // change points: every instant at which any profile's limit can change
        let mut boundaries: BTreeSet<i64> = BTreeSet::new();
        boundaries.insert(start.timestamp());
        for profile in cp_max
            .iter()
            .chain(tx.iter())
            .chain(tx_default.iter())
        {
            collect_boundaries(profile, start, end, tx_start_time, &mut boundaries);
        }

        let mut periods: Vec<ChargingSchedulePeriod> = Vec::new();
        for boundary in boundaries {
            if boundary < start.timestamp() || boundary >= end.timestamp() {
                continue;
            }
            let t = DateTime::from_timestamp(boundary, 0).unwrap_or(start);
            let cp_limit = class_limit(&cp_max, t, tx_start_time, unit, default_phases);
            let tx_limit = class_limit(&tx, t, tx_start_time, unit, default_phases);
            let default_limit = class_limit(&tx_default, t, tx_start_time, unit, default_phases);

            let base = tx_limit.or(default_limit);
            let (limit, number_phases) = match (base, cp_limit) {
                (Some((b, bp)), Some((m, mp))) => {
                    if m < b {
                        (m, mp)
                    } else {
                        (b, bp)
                    }
                }
                (Some((b, bp)), None) => (b, bp),
                (None, Some((m, mp))) => (m, mp),
                (None, None) => (NO_LIMIT_SPECIFIED, None),
            };

            let start_period = (boundary - start.timestamp()) as i32;
            let same_as_previous = periods
                .last()
                .map(|p: &ChargingSchedulePeriod| {
                    (p.limit - limit).abs() < 1e-3 && p.number_phases == number_phases
                })
                .unwrap_or(false);
            if !same_as_previous {
                periods.push(ChargingSchedulePeriod {
                    start_period,
                    limit,
                    number_phases,
                });
            }
        }

        ChargingSchedule {
            duration: Some(duration_s),
            start_schedule: Some(start),
            charging_rate_unit: unit,
            charging_schedule_period: periods,
            min_charging_rate: None,
        }
    }
}

fn all_profiles(store: &ProfileStore) -> impl Iterator<Item = (u32, &ChargingProfile)> {
    store
        .charge_point_max
        .values()
        .map(|p| (0, p))
        .chain(store.tx_default.iter().flat_map(|(connector, stacks)| {
            stacks.values().map(move |p| (*connector, p))
        }))
        .chain(
            store
                .tx
                .iter()
                .flat_map(|(connector, stacks)| stacks.values().map(move |p| (*connector, p))),
        )
}

fn stack_descending<'a>(
    profiles: impl Iterator<Item = &'a ChargingProfile>,
) -> Vec<ChargingProfile> {
    let mut sorted: Vec<ChargingProfile> = profiles.cloned().collect();
    sorted.sort_by(|a, b| b.stack_level.cmp(&a.stack_level));
    sorted
}

/// Absolute start of the schedule window containing `t`, expanding
/// recurring profiles by daily or weekly modulo
fn schedule_base(
    profile: &ChargingProfile,
    t: DateTime<Utc>,
    tx_start_time: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match profile.charging_profile_kind {
        ChargingProfileKindType::Absolute => profile
            .charging_schedule
            .start_schedule
            .or(profile.valid_from),
        ChargingProfileKindType::Relative => tx_start_time,
        ChargingProfileKindType::Recurring => {
            let anchor = profile
                .charging_schedule
                .start_schedule
                .or(profile.valid_from)?;
            let period = match profile.recurrency_kind {
                Some(RecurrencyKindType::Daily) => SECONDS_PER_DAY,
                Some(RecurrencyKindType::Weekly) => SECONDS_PER_WEEK,
                None => return None,
            };
            let delta = (t - anchor).num_seconds();
            if delta < 0 {
                return None;
            }
            Some(anchor + Duration::seconds(delta.div_euclid(period) * period))
        }
    }
}

/// The limit a single profile imposes at instant `t`, converted to `unit`
fn profile_limit_at(
    profile: &ChargingProfile,
    t: DateTime<Utc>,
    tx_start_time: Option<DateTime<Utc>>,
    unit: ChargingRateUnitType,
    default_phases: i32,
) -> Option<(f32, Option<i32>)> {
    if profile.valid_from.map(|from| t < from).unwrap_or(false) {
        return None;
    }
    if profile.valid_to.map(|to| t >= to).unwrap_or(false) {
        return None;
    }
    let base = schedule_base(profile, t, tx_start_time)?;
    let offset = (t - base).num_seconds();
    if offset < 0 {
        return None;
    }
    if let Some(duration) = profile.charging_schedule.duration {
        if offset >= duration as i64 {
            return None;
        }
    }

    let mut governing: Option<&ChargingSchedulePeriod> = None;
    for period in &profile.charging_schedule.charging_schedule_period {
        if (period.start_period as i64) <= offset {
            governing = Some(period);
        } else {
            break;
        }
    }
    let period = governing?;
    let phases = period.number_phases.unwrap_or(default_phases);
    let limit = convert_rate(
        period.limit,
        profile.charging_schedule.charging_rate_unit,
        unit,
        phases,
    );
    Some((limit, period.number_phases))
}

/// First applicable profile wins within a class (stack level descending)
fn class_limit(
    profiles: &[ChargingProfile],
    t: DateTime<Utc>,
    tx_start_time: Option<DateTime<Utc>>,
    unit: ChargingRateUnitType,
    default_phases: i32,
) -> Option<(f32, Option<i32>)> {
    profiles
        .iter()
        .find_map(|profile| profile_limit_at(profile, t, tx_start_time, unit, default_phases))
}

fn convert_rate(
    value: f32,
    from: ChargingRateUnitType,
    to: ChargingRateUnitType,
    phases: i32,
) -> f32 {
    match (from, to) {
        (ChargingRateUnitType::A, ChargingRateUnitType::W) => {
            value * LOW_VOLTAGE * phases as f32
        }
        (ChargingRateUnitType::W, ChargingRateUnitType::A) => {
            value / (LOW_VOLTAGE * phases as f32)
        }
        _ => value,
    }
}

fn collect_boundaries(
    profile: &ChargingProfile,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tx_start_time: Option<DateTime<Utc>>,
    boundaries: &mut BTreeSet<i64>,
) {
    if let Some(from) = profile.valid_from {
        boundaries.insert(from.timestamp());
    }
    if let Some(to) = profile.valid_to {
        boundaries.insert(to.timestamp());
    }

    let recurrence = match profile.charging_profile_kind {
        ChargingProfileKindType::Recurring => match profile.recurrency_kind {
            Some(RecurrencyKindType::Daily) => Some(SECONDS_PER_DAY),
            Some(RecurrencyKindType::Weekly) => Some(SECONDS_PER_WEEK),
            None => return,
        },
        _ => None,
    };

    let Some(first_base) = schedule_base(profile, start, tx_start_time)
        .or_else(|| schedule_base(profile, end, tx_start_time))
    else {
        return;
    };

    let mut base = first_base;
    loop {
        for period in &profile.charging_schedule.charging_schedule_period {
            boundaries.insert(base.timestamp() + period.start_period as i64);
        }
        if let Some(duration) = profile.charging_schedule.duration {
            boundaries.insert(base.timestamp() + duration as i64);
        }
        match recurrence {
            Some(period_s) => {
                base = base + Duration::seconds(period_s);
                if base >= end {
                    break;
                }
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ProfileLimits {
        ProfileLimits {
            max_stack_level: 10,
            max_installed: 20,
            max_periods: 48,
            allowed_units: vec![ChargingRateUnitType::A, ChargingRateUnitType::W],
        }
    }

    fn profile(
        id: i32,
        purpose: ChargingProfilePurposeType,
        stack: i32,
        limit: f32,
    ) -> ChargingProfile {
        ChargingProfile {
            charging_profile_id: id,
            transaction_id: None,
            stack_level: stack,
            charging_profile_purpose: purpose,
            charging_profile_kind: ChargingProfileKindType::Absolute,
            recurrency_kind: None,
            valid_from: None,
            valid_to: None,
            charging_schedule: ChargingSchedule {
                duration: None,
                start_schedule: Some(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
                charging_rate_unit: ChargingRateUnitType::A,
                charging_schedule_period: vec![ChargingSchedulePeriod {
                    start_period: 0,
                    limit,
                    number_phases: None,
                }],
                min_charging_rate: None,
            },
        }
    }

    fn query_start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_600, 0).unwrap()
    }

    #[test]
    fn test_validate_basic_rules() {
        let handler = SmartChargingHandler::new();
        let limits = limits();

        let ok = profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 16.0);
        assert!(handler.validate_profile(&ok, 0, false, 2, &limits, None));

        let mut bad_stack = ok.clone();
        bad_stack.stack_level = 11;
        assert!(!handler.validate_profile(&bad_stack, 0, false, 2, &limits, None));

        let mut bad_period = ok.clone();
        bad_period.charging_schedule.charging_schedule_period[0].start_period = 10;
        assert!(!handler.validate_profile(&bad_period, 0, false, 2, &limits, None));

        let cp_max = profile(2, ChargingProfilePurposeType::ChargePointMaxProfile, 0, 32.0);
        assert!(handler.validate_profile(&cp_max, 0, false, 2, &limits, None));
        assert!(!handler.validate_profile(&cp_max, 1, false, 2, &limits, None));
    }

    #[test]
    fn test_validate_tx_profile_binding() {
        let handler = SmartChargingHandler::new();
        let limits = limits();

        let mut tx_profile = profile(3, ChargingProfilePurposeType::TxProfile, 0, 20.0);
        tx_profile.transaction_id = Some(42);

        // connector 0 is never valid for TxProfile
        assert!(!handler.validate_profile(&tx_profile, 0, false, 2, &limits, Some(42)));
        // must reference the running transaction
        assert!(handler.validate_profile(&tx_profile, 1, false, 2, &limits, Some(42)));
        assert!(!handler.validate_profile(&tx_profile, 1, false, 2, &limits, Some(7)));
        assert!(!handler.validate_profile(&tx_profile, 1, false, 2, &limits, None));
        // except for remote start, where the transaction is upcoming
        assert!(handler.validate_profile(&tx_profile, 1, true, 2, &limits, None));
    }

    #[test]
    fn test_replacement_by_purpose_and_stack() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 16.0),
            1,
        );
        handler.add_profile(
            profile(2, ChargingProfilePurposeType::TxDefaultProfile, 0, 24.0),
            1,
        );
        // same (purpose, stackLevel, connector): replaced, not stacked
        assert_eq!(handler.installed_count(), 1);

        // replacing by id
        handler.add_profile(
            profile(2, ChargingProfilePurposeType::TxDefaultProfile, 1, 20.0),
            1,
        );
        assert_eq!(handler.installed_count(), 1);
    }

    #[test]
    fn test_clear_with_filter() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::ChargePointMaxProfile, 0, 32.0),
            0,
        );
        handler.add_profile(
            profile(2, ChargingProfilePurposeType::TxDefaultProfile, 0, 16.0),
            1,
        );
        handler.add_profile(
            profile(3, ChargingProfilePurposeType::TxDefaultProfile, 0, 16.0),
            2,
        );

        assert!(handler.clear_with_filter(Some(2), None, None, None, true));
        assert_eq!(handler.installed_count(), 2);

        assert!(handler.clear_with_filter(
            None,
            None,
            None,
            Some(ChargingProfilePurposeType::TxDefaultProfile),
            false
        ));
        assert_eq!(handler.installed_count(), 1);

        assert!(!handler.clear_with_filter(Some(99), None, None, None, true));
    }

    #[test]
    fn test_composite_precedence() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::ChargePointMaxProfile, 0, 16.0),
            0,
        );
        handler.add_profile(
            profile(2, ChargingProfilePurposeType::TxDefaultProfile, 0, 32.0),
            0,
        );
        let mut tx_profile = profile(3, ChargingProfilePurposeType::TxProfile, 0, 20.0);
        tx_profile.transaction_id = Some(42);
        handler.add_profile(tx_profile, 1);

        let schedule = handler.composite_schedule(
            1,
            query_start(),
            3600,
            ChargingRateUnitType::A,
            3,
            Some(query_start()),
        );

        assert_eq!(schedule.charging_schedule_period.len(), 1);
        let period = &schedule.charging_schedule_period[0];
        assert_eq!(period.start_period, 0);
        // min(16, min(20, 32)) = 16
        assert!((period.limit - 16.0).abs() < 1e-3);
    }

    #[test]
    fn test_higher_stack_level_wins_within_class() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 32.0),
            1,
        );
        handler.add_profile(
            profile(2, ChargingProfilePurposeType::TxDefaultProfile, 5, 10.0),
            1,
        );

        let schedule = handler.composite_schedule(
            1,
            query_start(),
            600,
            ChargingRateUnitType::A,
            3,
            None,
        );
        assert!((schedule.charging_schedule_period[0].limit - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_connector_zero_default_applies_to_all() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 24.0),
            0,
        );

        let schedule = handler.composite_schedule(
            2,
            query_start(),
            600,
            ChargingRateUnitType::A,
            3,
            None,
        );
        assert!((schedule.charging_schedule_period[0].limit - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_no_profiles_means_no_limit() {
        let handler = SmartChargingHandler::new();
        let schedule = handler.composite_schedule(
            1,
            query_start(),
            600,
            ChargingRateUnitType::A,
            3,
            None,
        );
        assert_eq!(schedule.charging_schedule_period.len(), 1);
        assert!((schedule.charging_schedule_period[0].limit - NO_LIMIT_SPECIFIED).abs() < 1e-3);
    }

    #[test]
    fn test_unit_conversion_amps_to_watts() {
        let handler = SmartChargingHandler::new();
        handler.add_profile(
            profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 16.0),
            1,
        );

        let schedule = handler.composite_schedule(
            1,
            query_start(),
            600,
            ChargingRateUnitType::W,
            3,
            None,
        );
        // 16 A * 230 V * 3 phases
        assert!((schedule.charging_schedule_period[0].limit - 11040.0).abs() < 1e-1);
    }

    #[test]
    fn test_schedule_periods_produce_change_points() {
        let handler = SmartChargingHandler::new();
        let mut stepped = profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 32.0);
        stepped.charging_schedule.start_schedule = Some(query_start());
        stepped.charging_schedule.charging_schedule_period = vec![
            ChargingSchedulePeriod {
                start_period: 0,
                limit: 32.0,
                number_phases: None,
            },
            ChargingSchedulePeriod {
                start_period: 300,
                limit: 8.0,
                number_phases: None,
            },
        ];
        handler.add_profile(stepped, 1);

        let schedule = handler.composite_schedule(
            1,
            query_start(),
            600,
            ChargingRateUnitType::A,
            3,
            None,
        );
        assert_eq!(schedule.charging_schedule_period.len(), 2);
        assert_eq!(schedule.charging_schedule_period[1].start_period, 300);
        assert!((schedule.charging_schedule_period[1].limit - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_recurring_daily_expansion() {
        let handler = SmartChargingHandler::new();
        let mut recurring = profile(1, ChargingProfilePurposeType::TxDefaultProfile, 0, 6.0);
        recurring.charging_profile_kind = ChargingProfileKindType::Recurring;
        recurring.recurrency_kind = Some(RecurrencyKindType::Daily);
        // anchored two days before the query, limited to the first hour of
        // each day
        recurring.charging_schedule.start_schedule =
            Some(query_start() - Duration::seconds(2 * SECONDS_PER_DAY));
        recurring.charging_schedule.duration = Some(3600);
        handler.add_profile(recurring, 1);

        // query starts exactly at the recurrence instant
        let schedule = handler.composite_schedule(
            1,
            query_start(),
            7200,
            ChargingRateUnitType::A,
            3,
            None,
        );
        let periods = &schedule.charging_schedule_period;
        assert_eq!(periods.len(), 2);
        assert!((periods[0].limit - 6.0).abs() < 1e-3);
        assert_eq!(periods[1].start_period, 3600);
        assert!((periods[1].limit - NO_LIMIT_SPECIFIED).abs() < 1e-3);
    }

    #[test]
    fn test_relative_profile_uses_transaction_start() {
        let handler = SmartChargingHandler::new();
        let mut relative = profile(1, ChargingProfilePurposeType::TxProfile, 0, 12.0);
        relative.transaction_id = Some(1);
        relative.charging_profile_kind = ChargingProfileKindType::Relative;
        relative.charging_schedule.start_schedule = None;
        relative.charging_schedule.duration = Some(300);
        handler.add_profile(relative, 1);

        let tx_start = query_start() - Duration::seconds(120);
        let schedule = handler.composite_schedule(
            1,
            query_start(),
            600,
            ChargingRateUnitType::A,
            3,
            Some(tx_start),
        );
        // 180 s of the relative window remain, then no limit
        let periods = &schedule.charging_schedule_period;
        assert!((periods[0].limit - 12.0).abs() < 1e-3);
        assert_eq!(periods[1].start_period, 180);
        assert!((periods[1].limit - NO_LIMIT_SPECIFIED).abs() < 1e-3);
    }
}
