use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use proptest::prelude::*;

use u_gestation::audit::OverbookingAuditor;
use u_gestation::gestation::{compute_ga, ToleranceTable};
use u_gestation::models::{
    days_between, shift_days, Booking, CapacityTable, ClinicalDates, FacilityCapacity, GaMethod,
    GestationalAge,
};
use u_gestation::protocol::{ProtocolEntry, ProtocolTable};
use u_gestation::scheduler::{resolve_slot, OccupancyLookup, SlotResult, TargetDateCalculator};
use u_gestation::store::BookingLedger;

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

fn facility() -> FacilityCapacity {
    FacilityCapacity::new("Cruzeiro")
        .with_weekday(3)
        .with_saturday(1)
}

proptest! {
    #[test]
    fn prop_lmp_only_counts_days(lmp_offset in 0i64..300, elapsed in 0i64..300) {
        let lmp = shift_days(base(), lmp_offset);
        let reference = shift_days(lmp, elapsed);
        let ga = compute_ga(&ClinicalDates::new().with_lmp(lmp, true), reference).unwrap();
        prop_assert_eq!(ga.method, GaMethod::Lmp);
        prop_assert_eq!(ga.total_days, days_between(lmp, reference));
    }

    #[test]
    fn prop_tolerance_monotone(a in 0u32..60, b in 0u32..60) {
        let table = ToleranceTable::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.tolerance_days(lo) <= table.tolerance_days(hi));
    }

    #[test]
    fn prop_lowest_ideal_ga_wins(
        weeks in prop::collection::vec(30u32..41, 1..8),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
    ) {
        let entries: Vec<ProtocolEntry> = weeks
            .iter()
            .enumerate()
            .map(|(i, &w)| ProtocolEntry::new(format!("t{i}"), w, 7))
            .collect();
        let table = ProtocolTable::new(entries.clone());
        let chosen: Vec<&ProtocolEntry> = picks.iter().map(|ix| ix.get(&entries)).collect();
        let result = table.ideal_ga(chosen.iter().map(|e| e.token.as_str()));

        match chosen.iter().map(|e| e.ideal_ga_weeks).min() {
            Some(min) => prop_assert_eq!(result.ideal_ga_weeks, min),
            None => {
                prop_assert!(result.is_default());
                prop_assert_eq!(result.ideal_ga_weeks, 39);
            }
        }
    }

    #[test]
    fn prop_target_date_respects_rules(
        ga_days in 0i64..300,
        ideal_weeks in 30u32..42,
        ref_offset in 0i64..365,
    ) {
        let reference = shift_days(base(), ref_offset);
        let ga = GestationalAge::new(ga_days, GaMethod::Lmp, reference);
        let ideal = ProtocolTable::default().with_defaults(ideal_weeks, 7).default_match();
        let target = TargetDateCalculator::new().calculate(&ga, &ideal, reference);

        prop_assert_ne!(target.date.weekday(), Weekday::Sun);
        prop_assert!(days_between(reference, target.date) >= 10);
        if !target.adjusted_for_lead_time {
            prop_assert!(days_between(target.raw_date, target.date) <= 1);
        }
    }

    #[test]
    fn prop_resolved_slot_has_room(
        loads in prop::collection::vec(0u32..5, 29),
        window in 0u32..8,
        start in 7i64..15,
    ) {
        let occupancy = |_: &str, date: NaiveDate| {
            loads[days_between(base(), date) as usize]
        };
        let ideal = shift_days(base(), start);
        let cap = facility();

        match resolve_slot("Cruzeiro", ideal, &cap, &occupancy, window) {
            SlotResult::Resolved { date, days_shifted } => {
                prop_assert_eq!(shift_days(ideal, i64::from(days_shifted)), date);
                prop_assert!(days_shifted.unsigned_abs() <= window);
                prop_assert!(occupancy.occupancy("Cruzeiro", date) < cap.capacity_on(date));
            }
            SlotResult::NeedsManualReview => {
                for k in -(window as i64)..=(window as i64) {
                    let day = shift_days(ideal, k);
                    prop_assert!(occupancy.occupancy("Cruzeiro", day) >= cap.capacity_on(day));
                }
            }
        }
    }

    #[test]
    fn prop_audit_is_idempotent(days in prop::collection::vec(0i64..21, 0..40)) {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ga = GestationalAge::new(259, GaMethod::Lmp, base());
        let seed: Vec<Booking> = days
            .iter()
            .enumerate()
            .map(|(i, &day)| {
                Booking::new(
                    format!("B{i:03}"),
                    "Cruzeiro",
                    shift_days(base(), day),
                    at + Duration::minutes(i as i64),
                    ga,
                )
            })
            .collect();
        let ledger = BookingLedger::from_bookings(seed).unwrap();
        let capacities = CapacityTable::new(vec![facility()]);
        let auditor = OverbookingAuditor::default().at(at);

        let mut bookings = ledger.snapshot();
        auditor.audit_and_correct(&mut bookings, &capacities, &ledger, &ledger);
        let after_first = ledger.snapshot();

        let second = auditor.audit_and_correct(&mut bookings, &capacities, &ledger, &ledger);
        prop_assert!(second.relocated.is_empty());
        prop_assert!(second.manual_review.iter().all(|r| r.already_flagged));
        prop_assert_eq!(ledger.snapshot(), after_first);
    }

    #[test]
    fn prop_reservations_never_exceed_capacity(targets in prop::collection::vec(0i64..14, 1..60)) {
        let ledger = BookingLedger::new();
        let cap = facility();
        for (i, &offset) in targets.iter().enumerate() {
            let ideal = shift_days(base(), offset);
            ledger
                .reserve("Cruzeiro", ideal, &cap, 2, |date, _| {
                    Booking::new(
                        format!("R{i:03}"),
                        "Cruzeiro",
                        date,
                        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                        GestationalAge::new(259, GaMethod::Lmp, base()),
                    )
                })
                .unwrap();
        }
        for k in -2..16 {
            let day = shift_days(base(), k);
            prop_assert!(ledger.occupancy("cruzeiro", day) <= cap.capacity_on(day));
        }
    }
}
