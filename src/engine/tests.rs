use super::*;
use crate::limits::*;
use chrono::NaiveDate;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("agenda_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

fn date(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

fn w(start: &str, end: &str) -> TimeWindow {
    TimeWindow::parse(start, end).unwrap()
}

fn req(pid: Ulid, d: &str, start: &str, end: &str) -> BookingRequest {
    BookingRequest::new(pid, date(d), w(start, end))
}

fn new_appt(pid: Ulid, d: &str, start: &str, end: &str) -> NewAppointment {
    NewAppointment::new(Ulid::new(), pid, date(d), w(start, end))
}

fn room(name: &str, exclusive: bool) -> Resource {
    Resource {
        id: Ulid::new(),
        name: name.into(),
        kind: "room".into(),
        exclusive,
        capacity: 1,
    }
}

/// Professional working Mon–Fri 09:00–18:00, with optional pauses.
async fn weekday_professional(engine: &Engine, pauses: Vec<TimeWindow>) -> Ulid {
    let pid = Ulid::new();
    engine.register_professional(pid, Some("Dr. Costa".into())).await.unwrap();
    for day in 1..=5 {
        engine
            .upsert_availability_rule(Some(pid), day, w("09:00", "18:00"), true, pauses.clone())
            .await
            .unwrap();
    }
    pid
}

// 2025-03-10 is a Monday.
const MONDAY: &str = "2025-03-10";
const TUESDAY: &str = "2025-03-11";
const SATURDAY: &str = "2025-03-15";

// ── End-to-end scenarios ─────────────────────────────────

#[tokio::test]
async fn free_slot_inside_working_hours() {
    let engine = new_engine("scenario_free_slot.wal");
    let pid = weekday_professional(&engine, vec![]).await;

    let conflicts = engine.check_conflicts(&req(pid, TUESDAY, "10:00", "10:30")).await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn tenant_default_day_off_applies() {
    let engine = new_engine("scenario_day_off.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    engine
        .upsert_availability_rule(None, 6, w("09:00", "12:00"), false, vec![])
        .await
        .unwrap();

    let conflicts = engine.check_conflicts(&req(pid, SATURDAY, "10:00", "10:30")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Unavailable);
    assert_eq!(conflicts[0].message, "professional does not work this day");
}

#[tokio::test]
async fn lunch_pause_overlap() {
    let engine = new_engine("scenario_pause.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "11:30", "12:30")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Unavailable);
    assert_eq!(conflicts[0].message, "overlaps break (12:00-13:00)");
}

#[tokio::test]
async fn recurring_christmas_blocks_every_year() {
    let engine = new_engine("scenario_christmas.wal");
    let pid = Ulid::new();
    engine.register_professional(pid, None).await.unwrap();
    engine
        .upsert_holiday(None, "Christmas".into(), date("2024-12-25"), true, true)
        .await
        .unwrap();

    for d in ["2024-12-25", "2025-12-25", "2031-12-25"] {
        let conflicts = engine.check_conflicts(&req(pid, d, "10:00", "11:00")).await.unwrap();
        assert_eq!(conflicts.len(), 1, "{d}");
        assert_eq!(conflicts[0].kind, ConflictKind::Holiday);
        assert_eq!(conflicts[0].message, "Christmas - schedule blocked for this day");
    }
    let conflicts = engine.check_conflicts(&req(pid, "2025-12-26", "10:00", "11:00")).await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn double_booking_and_touching_boundary() {
    let engine = new_engine("scenario_double_booking.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    engine.create_appointment(new_appt(pid, MONDAY, "14:00", "15:00")).await.unwrap();

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "14:30", "15:30")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Unavailable);
    assert_eq!(conflicts[0].message, "professional already has an appointment at this time");

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "15:00", "16:00")).await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn exclusive_room_conflicts_across_professionals() {
    let engine = new_engine("scenario_room.wal");
    let p1 = weekday_professional(&engine, vec![]).await;
    let p2 = weekday_professional(&engine, vec![]).await;
    let room1 = room("Room 1", true);
    let rid = room1.id;
    engine.create_resource(room1).await.unwrap();

    engine
        .create_appointment(new_appt(p1, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();

    let proposed = req(p2, MONDAY, "09:30", "10:30").with_resources(vec![rid]);
    let conflicts = engine.check_conflicts(&proposed).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Resource);
    assert_eq!(conflicts[0].message, "Room 1 is already reserved for this time");

    // Without the room, p2 is free.
    let conflicts = engine.check_conflicts(&req(p2, MONDAY, "09:30", "10:30")).await.unwrap();
    assert!(conflicts.is_empty());
}

// ── Properties ───────────────────────────────────────────

#[tokio::test]
async fn day_off_conflicts_for_any_window() {
    let engine = new_engine("prop_day_off.wal");
    let pid = Ulid::new();
    engine.register_professional(pid, None).await.unwrap();
    engine
        .upsert_availability_rule(Some(pid), 0, w("08:00", "20:00"), false, vec![])
        .await
        .unwrap();

    for (s, e) in [("00:00", "00:15"), ("08:00", "09:00"), ("12:00", "23:59")] {
        let conflicts = engine.check_conflicts(&req(pid, "2025-03-09", s, e)).await.unwrap();
        assert!(conflicts.iter().any(|c| c.kind == ConflictKind::Unavailable), "{s}-{e}");
    }
}

#[tokio::test]
async fn inside_hours_away_from_pauses_is_clear() {
    let engine = new_engine("prop_inside_hours.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;

    for (s, e) in [("09:00", "09:30"), ("11:00", "12:00"), ("13:00", "18:00"), ("09:00", "12:00")] {
        let conflicts = engine.check_conflicts(&req(pid, MONDAY, s, e)).await.unwrap();
        assert!(conflicts.is_empty(), "{s}-{e}: {conflicts:?}");
    }
}

#[tokio::test]
async fn terminal_appointments_never_overlap() {
    let engine = new_engine("prop_terminal.wal");
    let pid = weekday_professional(&engine, vec![]).await;

    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();

    let b = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    engine.update_appointment_status(b.id, AppointmentStatus::Confirmed).await.unwrap();
    engine.update_appointment_status(b.id, AppointmentStatus::Completed).await.unwrap();

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    assert!(conflicts.is_empty());
    assert_eq!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn check_conflicts_is_idempotent() {
    let engine = new_engine("prop_idempotent.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;
    engine.create_appointment(new_appt(pid, MONDAY, "11:00", "12:00")).await.unwrap();

    let r = req(pid, MONDAY, "08:30", "12:30");
    let first = engine.check_conflicts(&r).await.unwrap();
    let second = engine.check_conflicts(&r).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn starting_before_opening_is_outside_hours() {
    let engine = new_engine("prop_before_open.wal");
    let pid = weekday_professional(&engine, vec![]).await;

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "08:30", "09:30")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].message, "outside business hours (09:00-18:00)");
}

#[tokio::test]
async fn conflicts_reported_in_fixed_order() {
    let engine = new_engine("order.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;
    let r = room("Room 2", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();
    let other = weekday_professional(&engine, vec![]).await;

    engine.create_appointment(new_appt(pid, MONDAY, "11:00", "12:00")).await.unwrap();
    engine
        .create_appointment(new_appt(other, MONDAY, "11:30", "12:30").with_resources(vec![rid]))
        .await
        .unwrap();
    engine
        .upsert_holiday(None, "Inventory day".into(), date(MONDAY), false, true)
        .await
        .unwrap();

    let conflicts = engine
        .check_conflicts(&req(pid, MONDAY, "11:30", "12:30").with_resources(vec![rid]))
        .await
        .unwrap();
    let kinds: Vec<ConflictKind> = conflicts.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ConflictKind::Holiday,
            ConflictKind::Unavailable, // pause
            ConflictKind::Unavailable, // double booking
            ConflictKind::Resource,
        ]
    );
    assert!(conflicts[1].message.starts_with("overlaps break"));
}

#[tokio::test]
async fn no_rule_means_unconstrained() {
    let engine = new_engine("no_rule.wal");
    let pid = Ulid::new();
    engine.register_professional(pid, None).await.unwrap();
    let conflicts = engine.check_conflicts(&req(pid, SATURDAY, "03:00", "04:00")).await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn professional_rule_overrides_default() {
    let engine = new_engine("override_default.wal");
    let pid = Ulid::new();
    engine.register_professional(pid, None).await.unwrap();
    engine
        .upsert_availability_rule(None, 1, w("09:00", "17:00"), true, vec![])
        .await
        .unwrap();
    engine
        .upsert_availability_rule(Some(pid), 1, w("13:00", "21:00"), true, vec![])
        .await
        .unwrap();

    assert!(engine.check_conflicts(&req(pid, MONDAY, "19:00", "20:00")).await.unwrap().is_empty());

    let other = Ulid::new();
    engine.register_professional(other, None).await.unwrap();
    let conflicts = engine.check_conflicts(&req(other, MONDAY, "19:00", "20:00")).await.unwrap();
    assert_eq!(conflicts[0].message, "outside business hours (09:00-17:00)");
}

// ── Errors ───────────────────────────────────────────────

#[tokio::test]
async fn unknown_professional_or_resource_not_found() {
    let engine = new_engine("not_found.wal");
    let ghost = Ulid::new();
    let result = engine.check_conflicts(&req(ghost, MONDAY, "10:00", "11:00")).await;
    assert!(matches!(result, Err(EngineError::NotFound(id)) if id == ghost));

    let pid = weekday_professional(&engine, vec![]).await;
    let missing_room = Ulid::new();
    let result = engine
        .check_conflicts(&req(pid, MONDAY, "10:00", "11:00").with_resources(vec![missing_room]))
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(id)) if id == missing_room));

    let result = engine.create_appointment(new_appt(ghost, MONDAY, "10:00", "11:00")).await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn missing_lead_is_validation_error() {
    let engine = new_engine("missing_lead.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let mut new = new_appt(pid, MONDAY, "10:00", "11:00");
    new.lead_id = Ulid::nil();
    let err = engine.create_appointment(new).await.unwrap_err();
    assert!(err.is_validation());
    assert!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().is_empty());
}

#[tokio::test]
async fn reversed_window_is_validation_error() {
    let engine = new_engine("reversed_window.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let reversed = TimeWindow { start: 660, end: 600 };
    let past_midnight = TimeWindow { start: 1380, end: MINUTES_PER_DAY };

    for window in [reversed, past_midnight] {
        let mut new = new_appt(pid, MONDAY, "10:00", "11:00");
        new.window = window;
        let err = engine.create_appointment(new.clone()).await.unwrap_err();
        assert!(err.is_validation());
        let err = engine.book_appointment(new).await.unwrap_err();
        assert!(err.is_validation());

        let mut request = req(pid, MONDAY, "10:00", "11:00");
        request.window = window;
        assert!(engine.check_conflicts(&request).await.unwrap_err().is_validation());

        let err = engine
            .upsert_availability_rule(None, 2, window, true, vec![])
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let err = engine
            .upsert_availability_rule(None, 2, w("09:00", "17:00"), true, vec![window])
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
    assert!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().is_empty());
    assert!(engine.resolve_availability(None, 2).is_none());

    let appt = engine
        .create_appointment(new_appt(pid, MONDAY, "10:00", "11:00"))
        .await
        .unwrap();
    let err = engine
        .reschedule_appointment(appt.id, date(MONDAY), reversed)
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let kept = engine.get_appointment(&appt.id).await.unwrap();
    assert_eq!(kept.window(), w("10:00", "11:00"));
}

#[tokio::test]
async fn rule_validation() {
    let engine = new_engine("rule_validation.wal");
    let result = engine
        .upsert_availability_rule(None, 7, w("09:00", "17:00"), true, vec![])
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    let result = engine
        .upsert_availability_rule(Some(Ulid::new()), 1, w("09:00", "17:00"), true, vec![])
        .await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));

    let pauses = vec![w("10:00", "10:05"); MAX_PAUSES_PER_RULE + 1];
    let result = engine
        .upsert_availability_rule(None, 1, w("09:00", "17:00"), true, pauses)
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn upsert_rule_keeps_id() {
    let engine = new_engine("rule_keeps_id.wal");
    let first = engine
        .upsert_availability_rule(None, 2, w("09:00", "17:00"), true, vec![])
        .await
        .unwrap();
    let second = engine
        .upsert_availability_rule(None, 2, w("10:00", "16:00"), true, vec![w("12:00", "12:30")])
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(engine.resolve_availability(None, 2).unwrap().window, w("10:00", "16:00"));

    let removed = engine.remove_availability_rule(None, 2).await.unwrap();
    assert_eq!(removed.map(|r| r.id), Some(first.id));
    assert!(engine.resolve_availability(None, 2).is_none());
    assert!(engine.remove_availability_rule(None, 2).await.unwrap().is_none());
}

// ── Holidays ─────────────────────────────────────────────

#[tokio::test]
async fn non_blocking_holiday_is_informational() {
    let engine = new_engine("holiday_info.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    engine
        .upsert_holiday(None, "Carnival".into(), date(MONDAY), false, false)
        .await
        .unwrap();

    assert!(engine.check_conflicts(&req(pid, MONDAY, "10:00", "11:00")).await.unwrap().is_empty());
    let listed = engine.holidays_on(date(MONDAY), None);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Carnival");
}

#[tokio::test]
async fn earliest_created_holiday_named() {
    let engine = new_engine("holiday_tiebreak.wal");
    let pid = Ulid::new();
    engine.register_professional(pid, None).await.unwrap();
    engine
        .upsert_holiday(None, "Christmas".into(), date("2020-12-25"), true, true)
        .await
        .unwrap();
    engine
        .upsert_holiday(None, "Clinic closed".into(), date("2025-12-25"), false, true)
        .await
        .unwrap();

    let conflicts = engine.check_conflicts(&req(pid, "2025-12-25", "10:00", "11:00")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].message, "Christmas - schedule blocked for this day");
}

#[tokio::test]
async fn upsert_holiday_updates_in_place() {
    let engine = new_engine("holiday_upsert.wal");
    let first = engine
        .upsert_holiday(None, "Founders day".into(), date("2025-06-01"), false, true)
        .await
        .unwrap();
    let second = engine
        .upsert_holiday(None, "Founders day".into(), date("2025-06-01"), false, false)
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(engine.list_holidays().len(), 1);
    assert!(!engine.get_holiday(&first.id).unwrap().blocking);

    engine.remove_holiday(first.id).await.unwrap();
    assert!(engine.list_holidays().is_empty());
    assert!(matches!(engine.remove_holiday(first.id).await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn professional_holidays_ignored_in_tenant_scope() {
    let engine = new_engine("holiday_tenant_scope.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    engine
        .upsert_holiday(Some(pid), "Vacation".into(), date(MONDAY), false, true)
        .await
        .unwrap();

    assert!(engine.check_conflicts(&req(pid, MONDAY, "10:00", "11:00")).await.unwrap().is_empty());
    assert_eq!(engine.holidays_on(date(MONDAY), Some(pid)).len(), 1);
    assert!(engine.holidays_on(date(MONDAY), None).is_empty());
}

#[tokio::test]
async fn professional_scope_reports_blocked() {
    let options = EngineOptions {
        holiday_scope: HolidayScope::Professional,
    };
    let engine = Engine::with_options(
        test_wal_path("holiday_professional_scope.wal"),
        Arc::new(NotifyHub::new()),
        options,
    )
    .unwrap();
    let pid = weekday_professional(&engine, vec![]).await;
    let colleague = weekday_professional(&engine, vec![]).await;
    engine
        .upsert_holiday(Some(pid), "Vacation".into(), date(MONDAY), false, true)
        .await
        .unwrap();

    let conflicts = engine.check_conflicts(&req(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::Blocked);
    assert_eq!(conflicts[0].message, "Vacation - professional unavailable on this day");

    let conflicts = engine
        .check_conflicts(&req(colleague, MONDAY, "10:00", "11:00"))
        .await
        .unwrap();
    assert!(conflicts.is_empty());
}

// ── Appointment lifecycle ────────────────────────────────

#[tokio::test]
async fn create_sets_scheduled_and_keeps_details() {
    let engine = new_engine("create_details.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let service = AppointmentService {
        service_id: Ulid::new(),
        quantity: 2,
        unit_price_cents: 4500,
    };
    let a = engine
        .create_appointment(
            new_appt(pid, MONDAY, "10:00", "10:45")
                .with_notes("first visit")
                .with_services(vec![service.clone()]),
        )
        .await
        .unwrap();

    assert_eq!(a.status, AppointmentStatus::Scheduled);
    assert_eq!(a.start, date(MONDAY).and_hms_opt(10, 0, 0).unwrap());
    assert_eq!(a.end, date(MONDAY).and_hms_opt(10, 45, 0).unwrap());
    let stored = engine.get_appointment(&a.id).await.unwrap();
    assert_eq!(stored.notes.as_deref(), Some("first visit"));
    assert_eq!(stored.services, vec![service]);
}

#[tokio::test]
async fn create_skips_availability_checks() {
    let engine = new_engine("create_no_checks.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    // Saturday, no rule and outside hours anyway: create does not care.
    engine.create_appointment(new_appt(pid, SATURDAY, "22:00", "23:00")).await.unwrap();
    engine.create_appointment(new_appt(pid, MONDAY, "06:00", "07:00")).await.unwrap();
}

#[tokio::test]
async fn create_guard_rejects_double_booking() {
    let engine = new_engine("create_guard.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let first = engine.create_appointment(new_appt(pid, MONDAY, "14:00", "15:00")).await.unwrap();

    let err = engine
        .create_appointment(new_appt(pid, MONDAY, "14:30", "15:30"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConcurrencyConflict(id) if id == first.id));
    assert!(!err.is_validation());

    engine.create_appointment(new_appt(pid, MONDAY, "15:00", "16:00")).await.unwrap();
}

#[tokio::test]
async fn create_guard_covers_exclusive_resources() {
    let engine = new_engine("create_guard_room.wal");
    let p1 = weekday_professional(&engine, vec![]).await;
    let p2 = weekday_professional(&engine, vec![]).await;
    let r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();

    let a = engine
        .create_appointment(new_appt(p1, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();
    let err = engine
        .create_appointment(new_appt(p2, MONDAY, "09:30", "10:30").with_resources(vec![rid]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConcurrencyConflict(id) if id == a.id));
}

#[tokio::test]
async fn shared_resource_can_be_double_held() {
    let engine = new_engine("shared_resource.wal");
    let p1 = weekday_professional(&engine, vec![]).await;
    let p2 = weekday_professional(&engine, vec![]).await;
    let mut r = room("Waiting area", false);
    r.capacity = 10;
    let rid = r.id;
    engine.create_resource(r).await.unwrap();

    engine
        .create_appointment(new_appt(p1, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();
    let outcome = engine
        .book_appointment(new_appt(p2, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();
    assert!(outcome.is_booked());
    assert_eq!(engine.reservations_on(&rid, date(MONDAY)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn status_transitions_enforced() {
    let engine = new_engine("status_transitions.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();

    let err = engine
        .update_appointment_status(a.id, AppointmentStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InvalidTransition {
            from: AppointmentStatus::Scheduled,
            to: AppointmentStatus::Completed
        }
    ));

    let confirmed = engine
        .update_appointment_status(a.id, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);

    // Same status again is a no-op.
    let again = engine
        .update_appointment_status(a.id, AppointmentStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(again, confirmed);

    engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();
    let err = engine
        .update_appointment_status(a.id, AppointmentStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancel_releases_resource() {
    let engine = new_engine("cancel_releases.wal");
    let p1 = weekday_professional(&engine, vec![]).await;
    let p2 = weekday_professional(&engine, vec![]).await;
    let r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();

    let a = engine
        .create_appointment(new_appt(p1, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();
    engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();

    let proposed = req(p2, MONDAY, "09:00", "10:00").with_resources(vec![rid]);
    assert!(engine.check_conflicts(&proposed).await.unwrap().is_empty());
    assert!(engine.reservations_on(&rid, date(MONDAY)).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_appointment_frees_slot() {
    let engine = new_engine("delete_appointment.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();

    engine.delete_appointment(a.id).await.unwrap();
    assert!(engine.get_appointment(&a.id).await.is_none());
    assert!(engine.check_conflicts(&req(pid, MONDAY, "10:00", "11:00")).await.unwrap().is_empty());
    assert!(matches!(engine.delete_appointment(a.id).await, Err(EngineError::NotFound(_))));
    assert!(matches!(
        engine.update_appointment_status(a.id, AppointmentStatus::Confirmed).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn duplicate_appointment_id_rejected() {
    let engine = new_engine("duplicate_id.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let new = new_appt(pid, MONDAY, "10:00", "11:00");
    let mut again = new_appt(pid, MONDAY, "12:00", "13:00");
    again.id = new.id;
    engine.create_appointment(new).await.unwrap();
    assert!(matches!(engine.create_appointment(again).await, Err(EngineError::AlreadyExists(_))));
}

// ── Booking and rescheduling ─────────────────────────────

#[tokio::test]
async fn book_rejects_with_conflicts_and_stores_nothing() {
    let engine = new_engine("book_rejects.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;

    let outcome = engine.book_appointment(new_appt(pid, MONDAY, "12:30", "13:30")).await.unwrap();
    match outcome {
        BookingOutcome::Rejected(conflicts) => {
            assert_eq!(conflicts.len(), 1);
            assert_eq!(conflicts[0].message, "overlaps break (12:00-13:00)");
        }
        BookingOutcome::Booked(a) => panic!("unexpected booking {a:?}"),
    }
    assert!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().is_empty());

    let outcome = engine.book_appointment(new_appt(pid, MONDAY, "13:00", "14:00")).await.unwrap();
    assert!(outcome.is_booked());
}

#[tokio::test]
async fn reschedule_excludes_itself() {
    let engine = new_engine("reschedule_self.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();

    // Shifting by half an hour overlaps the old position, which must not count.
    let outcome = engine.reschedule_appointment(a.id, date(MONDAY), w("10:30", "11:30")).await.unwrap();
    let moved = match outcome {
        BookingOutcome::Booked(moved) => moved,
        BookingOutcome::Rejected(c) => panic!("rejected: {c:?}"),
    };
    assert_eq!(moved.id, a.id);
    assert_eq!(moved.window(), w("10:30", "11:30"));

    // check_conflicts with the exclusion agrees.
    let r = req(pid, MONDAY, "10:00", "11:00").excluding(a.id);
    assert!(engine.check_conflicts(&r).await.unwrap().is_empty());
    let r = req(pid, MONDAY, "10:00", "11:00");
    assert_eq!(engine.check_conflicts(&r).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reschedule_across_days_moves_reservation() {
    let engine = new_engine("reschedule_days.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();
    let a = engine
        .create_appointment(new_appt(pid, MONDAY, "10:00", "11:00").with_resources(vec![rid]))
        .await
        .unwrap();

    let outcome = engine.reschedule_appointment(a.id, date(TUESDAY), w("14:00", "15:00")).await.unwrap();
    assert!(outcome.is_booked());
    assert!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().is_empty());
    assert_eq!(engine.appointments_on(pid, date(TUESDAY)).await.unwrap().len(), 1);
    assert!(engine.reservations_on(&rid, date(MONDAY)).await.unwrap().is_empty());
    let held = engine.reservations_on(&rid, date(TUESDAY)).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].window, w("14:00", "15:00"));
}

#[tokio::test]
async fn reschedule_rejected_leaves_appointment() {
    let engine = new_engine("reschedule_rejected.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    engine.create_appointment(new_appt(pid, MONDAY, "14:00", "15:00")).await.unwrap();

    let outcome = engine.reschedule_appointment(a.id, date(MONDAY), w("14:30", "15:30")).await.unwrap();
    assert!(!outcome.is_booked());
    assert_eq!(engine.get_appointment(&a.id).await.unwrap().window(), w("10:00", "11:00"));

    let outcome = engine.reschedule_appointment(a.id, date(SATURDAY), w("10:00", "11:00")).await.unwrap();
    assert!(outcome.is_booked());
}

#[tokio::test]
async fn reschedule_terminal_is_validation_error() {
    let engine = new_engine("reschedule_terminal.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();
    let err = engine
        .reschedule_appointment(a.id, date(TUESDAY), w("10:00", "11:00"))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

// ── Free windows ─────────────────────────────────────────

#[tokio::test]
async fn free_windows_subtract_pauses_and_bookings() {
    let engine = new_engine("free_windows.wal");
    let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;
    engine.create_appointment(new_appt(pid, MONDAY, "09:00", "10:00")).await.unwrap();
    let cancelled = engine.create_appointment(new_appt(pid, MONDAY, "15:00", "16:00")).await.unwrap();
    engine
        .update_appointment_status(cancelled.id, AppointmentStatus::Cancelled)
        .await
        .unwrap();
    engine.create_appointment(new_appt(pid, MONDAY, "12:30", "13:30")).await.unwrap();

    let free = engine.free_windows(pid, date(MONDAY)).await.unwrap();
    assert_eq!(free, vec![w("10:00", "12:00"), w("13:30", "18:00")]);
}

#[tokio::test]
async fn free_windows_empty_on_day_off_and_holiday() {
    let engine = new_engine("free_windows_empty.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    engine
        .upsert_availability_rule(Some(pid), 6, w("09:00", "12:00"), false, vec![])
        .await
        .unwrap();
    assert!(engine.free_windows(pid, date(SATURDAY)).await.unwrap().is_empty());

    engine
        .upsert_holiday(None, "Strike".into(), date(MONDAY), false, true)
        .await
        .unwrap();
    assert!(engine.free_windows(pid, date(MONDAY)).await.unwrap().is_empty());

    // No Sunday rule at all: whole day.
    let free = engine.free_windows(pid, date("2025-03-09")).await.unwrap();
    assert_eq!(free, vec![TimeWindow::new(0, MINUTES_PER_DAY - 1)]);
}

// ── Resources ────────────────────────────────────────────

#[tokio::test]
async fn resource_in_use_cannot_be_deleted() {
    let engine = new_engine("resource_in_use.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();
    let a = engine
        .create_appointment(new_appt(pid, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();

    assert!(matches!(engine.delete_resource(rid).await, Err(EngineError::InUse(_))));
    engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();
    engine.delete_resource(rid).await.unwrap();
    assert!(engine.get_resource(&rid).await.is_none());

    // The appointment still references the deleted room and can be removed.
    engine.delete_appointment(a.id).await.unwrap();
}

#[tokio::test]
async fn update_resource_renames_conflict_message() {
    let engine = new_engine("resource_rename.wal");
    let p1 = weekday_professional(&engine, vec![]).await;
    let p2 = weekday_professional(&engine, vec![]).await;
    let mut r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r.clone()).await.unwrap();
    engine
        .create_appointment(new_appt(p1, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();

    r.name = "Surgery A".into();
    engine.update_resource(r).await.unwrap();
    let conflicts = engine
        .check_conflicts(&req(p2, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
        .await
        .unwrap();
    assert_eq!(conflicts[0].message, "Surgery A is already reserved for this time");
    assert_eq!(engine.list_resources().await.len(), 1);
}

// ── Concurrency ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_check_then_create_single_winner() {
    let engine = Arc::new(new_engine("concurrent_create.wal"));
    let pid = weekday_professional(&engine, vec![]).await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            let proposed = req(pid, MONDAY, "10:00", "11:00");
            let conflicts = eng.check_conflicts(&proposed).await?;
            if !conflicts.is_empty() {
                return Ok::<_, EngineError>(false);
            }
            eng.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00"))
                .await
                .map(|_| true)
        }));
    }

    let mut created = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(true) => created += 1,
            Ok(false) | Err(EngineError::ConcurrencyConflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(engine.appointments_on(pid, date(MONDAY)).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_share_a_room_once() {
    let engine = Arc::new(new_engine("concurrent_room.wal"));
    let r = room("Room 1", true);
    let rid = r.id;
    engine.create_resource(r).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let pid = weekday_professional(&engine, vec![]).await;
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            eng.book_appointment(new_appt(pid, MONDAY, "10:00", "11:00").with_resources(vec![rid]))
                .await
        }));
    }

    let mut booked = 0;
    for h in handles {
        match h.await.unwrap().unwrap() {
            BookingOutcome::Booked(_) => booked += 1,
            BookingOutcome::Rejected(conflicts) => {
                assert_eq!(conflicts[0].kind, ConflictKind::Resource);
            }
        }
    }
    assert_eq!(booked, 1);
    assert_eq!(engine.reservations_on(&rid, date(MONDAY)).await.unwrap().len(), 1);
}

// ── WAL ──────────────────────────────────────────────────

#[tokio::test]
async fn wal_replay_restores_state() {
    let path = test_wal_path("replay.wal");
    let notify = Arc::new(NotifyHub::new());

    let r = room("Room 1", true);
    let rid = r.id;
    let (pid, kept, moved) = {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        let pid = weekday_professional(&engine, vec![w("12:00", "13:00")]).await;
        engine.create_resource(r).await.unwrap();
        engine
            .upsert_holiday(None, "Christmas".into(), date("2024-12-25"), true, true)
            .await
            .unwrap();
        let kept = engine
            .create_appointment(new_appt(pid, MONDAY, "09:00", "10:00").with_resources(vec![rid]))
            .await
            .unwrap();
        engine.update_appointment_status(kept.id, AppointmentStatus::Confirmed).await.unwrap();
        let moved = engine.create_appointment(new_appt(pid, MONDAY, "14:00", "15:00")).await.unwrap();
        engine.reschedule_appointment(moved.id, date(TUESDAY), w("16:00", "17:00")).await.unwrap();
        let gone = engine.create_appointment(new_appt(pid, MONDAY, "16:00", "17:00")).await.unwrap();
        engine.delete_appointment(gone.id).await.unwrap();
        (pid, kept, moved)
    };

    let engine = Engine::new(path, notify).unwrap();
    let monday = engine.appointments_on(pid, date(MONDAY)).await.unwrap();
    assert_eq!(monday.len(), 1);
    assert_eq!(monday[0].id, kept.id);
    assert_eq!(monday[0].status, AppointmentStatus::Confirmed);
    let tuesday = engine.appointments_on(pid, date(TUESDAY)).await.unwrap();
    assert_eq!(tuesday[0].id, moved.id);
    assert_eq!(tuesday[0].window(), w("16:00", "17:00"));

    assert_eq!(engine.reservations_on(&rid, date(MONDAY)).await.unwrap().len(), 1);
    assert_eq!(engine.resolve_availability(Some(pid), 1).unwrap().pauses, vec![w("12:00", "13:00")]);
    let conflicts = engine.check_conflicts(&req(pid, "2025-12-25", "10:00", "11:00")).await.unwrap();
    assert_eq!(conflicts[0].kind, ConflictKind::Holiday);
}

#[tokio::test]
async fn compact_then_replay_matches() {
    let path = test_wal_path("compact_replay.wal");
    let notify = Arc::new(NotifyHub::new());

    let pid = {
        let engine = Engine::new(path.clone(), notify.clone()).unwrap();
        let pid = weekday_professional(&engine, vec![]).await;
        for _ in 0..5 {
            engine
                .upsert_availability_rule(None, 6, w("09:00", "12:00"), false, vec![])
                .await
                .unwrap();
        }
        let a = engine.create_appointment(new_appt(pid, MONDAY, "09:00", "10:00")).await.unwrap();
        engine.update_appointment_status(a.id, AppointmentStatus::Cancelled).await.unwrap();
        engine.create_appointment(new_appt(pid, MONDAY, "11:00", "12:00")).await.unwrap();
        assert!(engine.wal_appends_since_compact().await > 0);

        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);
        pid
    };

    let engine = Engine::new(path, notify).unwrap();
    let day = engine.appointments_on(pid, date(MONDAY)).await.unwrap();
    assert_eq!(day.len(), 2);
    assert_eq!(day[0].status, AppointmentStatus::Cancelled);
    assert_eq!(day[1].status, AppointmentStatus::Scheduled);
    assert_eq!(engine.list_availability_rules().len(), 6);
    assert_eq!(engine.professional_name(&pid).await.unwrap().as_deref(), Some("Dr. Costa"));
}

#[tokio::test]
async fn group_commit_batches_appends() {
    let path = test_wal_path("group_commit.wal");
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(path.clone(), notify.clone()).unwrap());

    let n = 20;
    let mut handles = Vec::new();
    for i in 0..n {
        let eng = engine.clone();
        handles.push(tokio::spawn(async move {
            eng.create_resource(Resource {
                id: Ulid::new(),
                name: format!("Chair {i}"),
                kind: "chair".into(),
                exclusive: true,
                capacity: 1,
            })
            .await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(engine.list_resources().await.len(), n);

    let engine2 = Engine::new(path, notify).unwrap();
    assert_eq!(engine2.list_resources().await.len(), n);
}

// ── Notify ───────────────────────────────────────────────

#[tokio::test]
async fn committed_appointment_events_broadcast() {
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::new(test_wal_path("notify.wal"), notify.clone()).unwrap();
    let pid = weekday_professional(&engine, vec![]).await;
    let mut rx = notify.subscribe(pid);

    let a = engine.create_appointment(new_appt(pid, MONDAY, "10:00", "11:00")).await.unwrap();
    match rx.recv().await.unwrap() {
        Event::AppointmentCreated { appointment } => assert_eq!(appointment.id, a.id),
        other => panic!("unexpected event {other:?}"),
    }

    // Rejected bookings publish nothing.
    let outcome = engine.book_appointment(new_appt(pid, MONDAY, "10:30", "11:30")).await.unwrap();
    assert!(!outcome.is_booked());
    assert!(rx.try_recv().is_err());
}

// ── Limits ───────────────────────────────────────────────

#[tokio::test]
async fn too_many_resources_on_appointment() {
    let engine = new_engine("limit_resources.wal");
    let pid = weekday_professional(&engine, vec![]).await;
    let ids: Vec<Ulid> = (0..=MAX_RESOURCES_PER_APPOINTMENT).map(|_| Ulid::new()).collect();
    let result = engine
        .create_appointment(new_appt(pid, MONDAY, "10:00", "11:00").with_resources(ids))
        .await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn name_limits() {
    let engine = new_engine("limit_names.wal");
    let long = "x".repeat(MAX_NAME_LEN + 1);
    let result = engine.register_professional(Ulid::new(), Some(long.clone())).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    let result = engine.upsert_holiday(None, long, date(MONDAY), false, true).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    let result = engine.upsert_holiday(None, "  ".into(), date(MONDAY), false, true).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[test]
fn store_default() {
    let store = InMemoryStore::default();
    assert_eq!(store.professional_count(), 0);
    assert_eq!(store.resource_count(), 0);
}
