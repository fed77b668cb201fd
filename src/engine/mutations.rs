use std::collections::HashSet;

use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{BOOKING_REJECTIONS_TOTAL, CONCURRENCY_CONFLICTS_TOTAL};

use super::conflict::occupied_by;
use super::store::apply_to_resource;
use super::{Engine, EngineError, WalCommand};

fn check_name(name: &str, what: &'static str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(format!("{what} must not be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

/// Everything about a new appointment that can be rejected without looking at state.
fn validate_new(new: &NewAppointment) -> Result<(), EngineError> {
    if new.lead_id.is_nil() {
        return Err(EngineError::Validation("lead_id is required".into()));
    }
    if new.profile_id.is_nil() {
        return Err(EngineError::Validation("profile_id is required".into()));
    }
    new.window.validate()?;
    if let Some(ref n) = new.notes
        && n.len() > MAX_NOTES_LEN
    {
        return Err(EngineError::LimitExceeded("notes too long"));
    }
    if new.services.len() > MAX_SERVICES_PER_APPOINTMENT {
        return Err(EngineError::LimitExceeded("too many services on appointment"));
    }
    if new.services.iter().any(|s| s.quantity == 0) {
        return Err(EngineError::Validation("service quantity must be at least 1".into()));
    }
    if new.resource_ids.len() > MAX_RESOURCES_PER_APPOINTMENT {
        return Err(EngineError::LimitExceeded("too many resources on appointment"));
    }
    Ok(())
}

fn dedup_ids(ids: &[Ulid]) -> Vec<Ulid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

impl Engine {
    // ── Registry ─────────────────────────────────────────────

    pub async fn register_professional(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        if let Some(ref n) = name {
            check_name(n, "professional name")?;
        }
        let _gate = self.gate_shared().await;
        if self.store.contains_professional(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.store.professional_count() >= MAX_PROFESSIONALS_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many professionals"));
        }
        self.commit_catalog(&Event::ProfessionalRegistered { id, name }).await?;
        info!("registered professional {id}");
        Ok(())
    }

    pub async fn create_resource(&self, resource: Resource) -> Result<(), EngineError> {
        check_name(&resource.name, "resource name")?;
        if resource.kind.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("resource kind too long"));
        }
        if resource.capacity == 0 {
            return Err(EngineError::Validation("capacity must be at least 1".into()));
        }
        let _gate = self.gate_shared().await;
        if self.store.contains_resource(&resource.id) {
            return Err(EngineError::AlreadyExists(resource.id));
        }
        if self.store.resource_count() >= MAX_RESOURCES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        let id = resource.id;
        self.commit_catalog(&Event::ResourceCreated { resource }).await?;
        info!("created resource {id}");
        Ok(())
    }

    /// Rename or reconfigure a resource. Existing reservations are kept as they are.
    pub async fn update_resource(&self, resource: Resource) -> Result<(), EngineError> {
        check_name(&resource.name, "resource name")?;
        if resource.capacity == 0 {
            return Err(EngineError::Validation("capacity must be at least 1".into()));
        }
        let _gate = self.gate_shared().await;
        let rs = self.resource(&resource.id)?;
        let mut guard = rs.write().await;
        let event = Event::ResourceUpdated { resource };
        self.wal_append(&event).await?;
        apply_to_resource(&mut guard, &event);
        self.publish(&event);
        Ok(())
    }

    pub async fn delete_resource(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.gate_shared().await;
        let rs = self.resource(&id)?;
        let guard = rs.write().await;
        if !guard.reservations.is_empty() {
            return Err(EngineError::InUse(id));
        }
        self.commit_catalog(&Event::ResourceDeleted { id }).await?;
        drop(guard);
        info!("deleted resource {id}");
        Ok(())
    }

    // ── Availability rules ───────────────────────────────────

    /// Insert or replace the rule for `(profile_id, day_of_week)`. Replacing keeps the rule id.
    pub async fn upsert_availability_rule(
        &self,
        profile_id: Option<Ulid>,
        day_of_week: u8,
        window: TimeWindow,
        is_working_day: bool,
        pauses: Vec<TimeWindow>,
    ) -> Result<AvailabilityRule, EngineError> {
        if day_of_week > 6 {
            return Err(EngineError::Validation(format!(
                "day_of_week must be 0..=6, got {day_of_week}"
            )));
        }
        if pauses.len() > MAX_PAUSES_PER_RULE {
            return Err(EngineError::LimitExceeded("too many pauses"));
        }
        window.validate()?;
        for pause in &pauses {
            pause.validate()?;
        }
        let _gate = self.gate_shared().await;
        if let Some(pid) = profile_id
            && !self.store.contains_professional(&pid)
        {
            return Err(EngineError::NotFound(pid));
        }

        let key = RuleKey {
            profile_id,
            day_of_week,
        };
        let id = match self.store.get_rule(&key) {
            Some(existing) => existing.id,
            None => self.next_id(),
        };
        let rule = AvailabilityRule {
            id,
            profile_id,
            day_of_week,
            is_working_day,
            window,
            pauses,
        };
        self.commit_catalog(&Event::AvailabilityRuleUpserted { rule: rule.clone() })
            .await?;
        Ok(rule)
    }

    /// Drop the rule for `(profile_id, day_of_week)`, returning it if there was one.
    pub async fn remove_availability_rule(
        &self,
        profile_id: Option<Ulid>,
        day_of_week: u8,
    ) -> Result<Option<AvailabilityRule>, EngineError> {
        let _gate = self.gate_shared().await;
        let key = RuleKey {
            profile_id,
            day_of_week,
        };
        let Some(rule) = self.store.get_rule(&key) else {
            return Ok(None);
        };
        self.commit_catalog(&Event::AvailabilityRuleRemoved {
            id: rule.id,
            profile_id,
            day_of_week,
        })
        .await?;
        Ok(Some(rule))
    }

    // ── Holidays ─────────────────────────────────────────────

    /// Insert or replace the holiday named `name` on `date` in the given scope.
    /// Replacing keeps the original id, and with it the holiday's tie-break position.
    pub async fn upsert_holiday(
        &self,
        profile_id: Option<Ulid>,
        name: String,
        date: NaiveDate,
        is_recurring: bool,
        blocking: bool,
    ) -> Result<Holiday, EngineError> {
        check_name(&name, "holiday name")?;
        let _gate = self.gate_shared().await;
        if let Some(pid) = profile_id
            && !self.store.contains_professional(&pid)
        {
            return Err(EngineError::NotFound(pid));
        }

        let existing = self
            .store
            .holidays_in_scope(profile_id)
            .into_iter()
            .find(|h| h.date == date && h.name == name);
        let id = match existing {
            Some(h) => h.id,
            None => {
                if self.store.holiday_count() >= MAX_HOLIDAYS_PER_TENANT {
                    return Err(EngineError::LimitExceeded("too many holidays"));
                }
                self.next_id()
            }
        };
        let holiday = Holiday {
            id,
            profile_id,
            date,
            name,
            is_recurring,
            blocking,
        };
        self.commit_catalog(&Event::HolidayUpserted {
            holiday: holiday.clone(),
        })
        .await?;
        Ok(holiday)
    }

    pub async fn remove_holiday(&self, id: Ulid) -> Result<Holiday, EngineError> {
        let _gate = self.gate_shared().await;
        let holiday = self.store.get_holiday(&id).ok_or(EngineError::NotFound(id))?;
        self.commit_catalog(&Event::HolidayRemoved { id }).await?;
        Ok(holiday)
    }

    // ── Appointments ─────────────────────────────────────────

    /// Persist a new SCHEDULED appointment without running the availability checks.
    /// Fails with `ConcurrencyConflict` if the professional or an exclusive resource
    /// is already occupied for an overlapping window.
    pub async fn create_appointment(&self, new: NewAppointment) -> Result<Appointment, EngineError> {
        validate_new(&new)?;
        let _gate = self.gate_shared().await;
        let ps = self.professional(&new.profile_id)?;
        let resource_ids = dedup_ids(&new.resource_ids);
        for rid in &resource_ids {
            self.resource(rid)?;
        }

        let mut book = ps.write().await;
        let mut resources = self.lock_resources_write(&resource_ids).await?;
        self.check_insertable(&book, &new)?;

        let req = BookingRequest::from(&new);
        if let Some(holder) = occupied_by(&book, resources.iter().map(|(_, g)| &**g), &req) {
            metrics::counter!(CONCURRENCY_CONFLICTS_TOTAL).increment(1);
            warn!(
                "appointment {} for {} on {} {} lost the slot to {holder}",
                new.id, new.profile_id, new.date, new.window
            );
            return Err(EngineError::ConcurrencyConflict(holder));
        }

        let appointment = build_appointment(new, resource_ids)?;
        let event = Event::AppointmentCreated {
            appointment: appointment.clone(),
        };
        self.commit_appointment(&mut book, &mut resources, &event).await?;
        info!("created appointment {} for {}", appointment.id, appointment.profile_id);
        Ok(appointment)
    }

    /// Check and commit under the same locks: the appointment is stored only
    /// if the full conflict evaluation comes back empty.
    pub async fn book_appointment(&self, new: NewAppointment) -> Result<BookingOutcome, EngineError> {
        validate_new(&new)?;
        let _gate = self.gate_shared().await;
        let ps = self.professional(&new.profile_id)?;
        let resource_ids = dedup_ids(&new.resource_ids);
        for rid in &resource_ids {
            self.resource(rid)?;
        }

        let mut book = ps.write().await;
        let mut resources = self.lock_resources_write(&resource_ids).await?;
        self.check_insertable(&book, &new)?;

        let req = BookingRequest::from(&new);
        let views: Vec<&ResourceState> = resources.iter().map(|(_, g)| &**g).collect();
        let conflicts = self.evaluate(&req, &book, &views);
        drop(views);
        if !conflicts.is_empty() {
            metrics::counter!(BOOKING_REJECTIONS_TOTAL).increment(1);
            warn!(
                "booking for {} on {} {} rejected: {}",
                new.profile_id, new.date, new.window, conflicts[0].message
            );
            return Ok(BookingOutcome::Rejected(conflicts));
        }

        let appointment = build_appointment(new, resource_ids)?;
        let event = Event::AppointmentCreated {
            appointment: appointment.clone(),
        };
        self.commit_appointment(&mut book, &mut resources, &event).await?;
        info!("booked appointment {} for {}", appointment.id, appointment.profile_id);
        Ok(BookingOutcome::Booked(appointment))
    }

    /// Move a non-terminal appointment to a new date and window. The move is
    /// evaluated like a fresh booking, ignoring the appointment itself.
    pub async fn reschedule_appointment(
        &self,
        id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    ) -> Result<BookingOutcome, EngineError> {
        window.validate()?;
        let _gate = self.gate_shared().await;
        let profile_id = self
            .store
            .get_professional_for_appointment(&id)
            .ok_or(EngineError::NotFound(id))?;
        let ps = self.professional(&profile_id)?;
        let mut book = ps.write().await;
        let current = book.get(&id).cloned().ok_or(EngineError::NotFound(id))?;
        if current.status.is_terminal() {
            return Err(EngineError::Validation(format!(
                "cannot reschedule a {} appointment",
                current.status
            )));
        }

        let mut resources = self.lock_held_resources(&current.resource_ids).await?;
        let req = BookingRequest {
            profile_id,
            resource_ids: current.resource_ids.clone(),
            date,
            window,
            exclude_appointment_id: Some(id),
        };
        let views: Vec<&ResourceState> = resources.iter().map(|(_, g)| &**g).collect();
        let conflicts = self.evaluate(&req, &book, &views);
        drop(views);
        if !conflicts.is_empty() {
            metrics::counter!(BOOKING_REJECTIONS_TOTAL).increment(1);
            warn!("reschedule of {id} to {date} {window} rejected: {}", conflicts[0].message);
            return Ok(BookingOutcome::Rejected(conflicts));
        }

        let (start, end) = window.on(date)?;
        let event = Event::AppointmentRescheduled {
            id,
            profile_id,
            resource_ids: current.resource_ids.clone(),
            date,
            start,
            end,
        };
        self.commit_appointment(&mut book, &mut resources, &event).await?;
        info!("rescheduled appointment {id} to {date} {window}");
        let moved = book.get(&id).cloned().ok_or(EngineError::NotFound(id))?;
        Ok(BookingOutcome::Booked(moved))
    }

    /// Apply a lifecycle transition. Setting the current status again is a no-op.
    /// No conflict re-validation is performed.
    pub async fn update_appointment_status(
        &self,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<Appointment, EngineError> {
        let _gate = self.gate_shared().await;
        let profile_id = self
            .store
            .get_professional_for_appointment(&id)
            .ok_or(EngineError::NotFound(id))?;
        let ps = self.professional(&profile_id)?;
        let mut book = ps.write().await;
        let current = book.get(&id).cloned().ok_or(EngineError::NotFound(id))?;
        if current.status == status {
            return Ok(current);
        }
        if !current.status.can_transition_to(status) {
            return Err(EngineError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let mut resources = self.lock_held_resources(&current.resource_ids).await?;
        let event = Event::AppointmentStatusChanged {
            id,
            profile_id,
            resource_ids: current.resource_ids.clone(),
            status,
        };
        self.commit_appointment(&mut book, &mut resources, &event).await?;
        info!("appointment {id}: {} -> {status}", current.status);
        book.get(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Hard delete, line items included.
    pub async fn delete_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.gate_shared().await;
        let profile_id = self
            .store
            .get_professional_for_appointment(&id)
            .ok_or(EngineError::NotFound(id))?;
        let ps = self.professional(&profile_id)?;
        let mut book = ps.write().await;
        let current = book.get(&id).cloned().ok_or(EngineError::NotFound(id))?;

        let mut resources = self.lock_held_resources(&current.resource_ids).await?;
        let event = Event::AppointmentDeleted {
            id,
            profile_id,
            resource_ids: current.resource_ids,
        };
        self.commit_appointment(&mut book, &mut resources, &event).await?;
        info!("deleted appointment {id}");
        Ok(())
    }

    fn check_insertable(&self, book: &ProfessionalState, new: &NewAppointment) -> Result<(), EngineError> {
        if self.store.get_professional_for_appointment(&new.id).is_some() {
            return Err(EngineError::AlreadyExists(new.id));
        }
        if book.appointments.len() >= MAX_APPOINTMENTS_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many appointments for professional"));
        }
        Ok(())
    }

    /// Write-lock the resources an existing appointment still points at. Resources
    /// deleted since the appointment ended hold nothing for it and are skipped.
    async fn lock_held_resources(
        &self,
        ids: &[Ulid],
    ) -> Result<super::ResourceWriteGuards, EngineError> {
        let live: Vec<Ulid> = ids
            .iter()
            .copied()
            .filter(|rid| self.store.contains_resource(rid))
            .collect();
        self.lock_resources_write(&live).await
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Rewrite the WAL as the minimal event sequence that rebuilds current state.
    /// Mutations are held off for the duration.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.gate_exclusive().await;
        let mut events = Vec::new();

        for pid in self.store.professional_ids() {
            if let Some(ps) = self.store.get_professional(&pid) {
                let guard = ps.read().await;
                events.push(Event::ProfessionalRegistered {
                    id: guard.id,
                    name: guard.name.clone(),
                });
            }
        }
        for rid in self.store.resource_ids() {
            if let Some(rs) = self.store.get_resource(&rid) {
                let guard = rs.read().await;
                events.push(Event::ResourceCreated {
                    resource: guard.resource.clone(),
                });
            }
        }
        for rule in self.store.rules() {
            events.push(Event::AvailabilityRuleUpserted { rule });
        }
        for holiday in self.store.all_holidays() {
            events.push(Event::HolidayUpserted { holiday });
        }
        for pid in self.store.professional_ids() {
            if let Some(ps) = self.store.get_professional(&pid) {
                let guard = ps.read().await;
                for appointment in &guard.appointments {
                    events.push(Event::AppointmentCreated {
                        appointment: appointment.clone(),
                    });
                }
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn build_appointment(new: NewAppointment, resource_ids: Vec<Ulid>) -> Result<Appointment, EngineError> {
    let (start, end) = new.window.on(new.date)?;
    Ok(Appointment {
        id: new.id,
        lead_id: new.lead_id,
        profile_id: new.profile_id,
        date: new.date,
        start,
        end,
        status: AppointmentStatus::Scheduled,
        notes: new.notes,
        services: new.services,
        resource_ids,
    })
}
