use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedProfessionalState = Arc<RwLock<ProfessionalState>>;
pub type SharedResourceState = Arc<RwLock<ResourceState>>;

/// Tenant-local state. Catalog data (rules, holidays) lives in plain maps;
/// appointment books and resource reservations sit behind per-entity locks.
pub struct InMemoryStore {
    professionals: DashMap<Ulid, SharedProfessionalState>,
    resources: DashMap<Ulid, SharedResourceState>,
    rules: DashMap<RuleKey, AvailabilityRule>,
    holidays: DashMap<Ulid, Holiday>,
    /// Reverse lookup: appointment id → professional id
    appointment_to_professional: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            professionals: DashMap::new(),
            resources: DashMap::new(),
            rules: DashMap::new(),
            holidays: DashMap::new(),
            appointment_to_professional: DashMap::new(),
        }
    }

    // ── Professionals ────────────────────────────────────────

    pub fn professional_count(&self) -> usize {
        self.professionals.len()
    }

    pub fn contains_professional(&self, id: &Ulid) -> bool {
        self.professionals.contains_key(id)
    }

    pub fn get_professional(&self, id: &Ulid) -> Option<SharedProfessionalState> {
        self.professionals.get(id).map(|e| e.value().clone())
    }

    pub fn professional_ids(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.professionals.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Resources ────────────────────────────────────────────

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn contains_resource(&self, id: &Ulid) -> bool {
        self.resources.contains_key(id)
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.resources.get(id).map(|e| e.value().clone())
    }

    pub fn resource_ids(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.resources.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Availability rules ───────────────────────────────────

    pub fn get_rule(&self, key: &RuleKey) -> Option<AvailabilityRule> {
        self.rules.get(key).map(|e| e.value().clone())
    }

    pub fn rules(&self) -> Vec<AvailabilityRule> {
        let mut rules: Vec<AvailabilityRule> = self.rules.iter().map(|e| e.value().clone()).collect();
        rules.sort_by_key(|r| (r.profile_id, r.day_of_week));
        rules
    }

    // ── Holidays ─────────────────────────────────────────────

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    pub fn get_holiday(&self, id: &Ulid) -> Option<Holiday> {
        self.holidays.get(id).map(|e| e.value().clone())
    }

    /// Holidays in the given scope (`None` = tenant-wide), in creation order.
    pub fn holidays_in_scope(&self, profile_id: Option<Ulid>) -> Vec<Holiday> {
        let mut found: Vec<Holiday> = self
            .holidays
            .iter()
            .filter(|e| e.value().profile_id == profile_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|h| h.id);
        found
    }

    pub fn all_holidays(&self) -> Vec<Holiday> {
        let mut found: Vec<Holiday> = self.holidays.iter().map(|e| e.value().clone()).collect();
        found.sort_by_key(|h| h.id);
        found
    }

    // ── Appointment index ────────────────────────────────────

    pub fn get_professional_for_appointment(&self, appointment_id: &Ulid) -> Option<Ulid> {
        self.appointment_to_professional
            .get(appointment_id)
            .map(|e| *e.value())
    }

    // ── Event application ────────────────────────────────────

    /// Apply the map-level part of an event: catalog entries, registries and the
    /// appointment index. State behind per-entity locks is handled by
    /// [`apply_to_professional`] / [`apply_to_resource`] with the caller holding the lock.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::ProfessionalRegistered { id, name } => {
                self.professionals
                    .entry(*id)
                    .or_insert_with(|| Arc::new(RwLock::new(ProfessionalState::new(*id, name.clone()))));
            }
            Event::ResourceCreated { resource } => {
                self.resources.insert(
                    resource.id,
                    Arc::new(RwLock::new(ResourceState::new(resource.clone()))),
                );
            }
            Event::ResourceDeleted { id } => {
                self.resources.remove(id);
            }
            Event::AvailabilityRuleUpserted { rule } => {
                self.rules.insert(rule.key(), rule.clone());
            }
            Event::AvailabilityRuleRemoved {
                profile_id,
                day_of_week,
                ..
            } => {
                self.rules.remove(&RuleKey {
                    profile_id: *profile_id,
                    day_of_week: *day_of_week,
                });
            }
            Event::HolidayUpserted { holiday } => {
                self.holidays.insert(holiday.id, holiday.clone());
            }
            Event::HolidayRemoved { id } => {
                self.holidays.remove(id);
            }
            Event::AppointmentCreated { appointment } => {
                self.appointment_to_professional
                    .insert(appointment.id, appointment.profile_id);
            }
            Event::AppointmentDeleted { id, .. } => {
                self.appointment_to_professional.remove(id);
            }
            Event::ResourceUpdated { .. }
            | Event::AppointmentStatusChanged { .. }
            | Event::AppointmentRescheduled { .. } => {}
        }
    }
}

/// Apply an appointment event to a professional's book (caller holds the lock).
pub fn apply_to_professional(ps: &mut ProfessionalState, event: &Event) {
    match event {
        Event::AppointmentCreated { appointment } => {
            ps.insert_appointment(appointment.clone());
        }
        Event::AppointmentStatusChanged { id, status, .. } => {
            if let Some(a) = ps.get_mut(id) {
                a.status = *status;
            }
        }
        Event::AppointmentRescheduled {
            id, date, start, end, ..
        } => {
            if let Some(mut a) = ps.remove_appointment(*id) {
                a.date = *date;
                a.start = *start;
                a.end = *end;
                ps.insert_appointment(a);
            }
        }
        Event::AppointmentDeleted { id, .. } => {
            ps.remove_appointment(*id);
        }
        _ => {}
    }
}

/// Apply an event to a resource's reservations (caller holds the lock).
pub fn apply_to_resource(rs: &mut ResourceState, event: &Event) {
    match event {
        Event::ResourceUpdated { resource } => {
            rs.resource = resource.clone();
        }
        Event::AppointmentCreated { appointment } => {
            if appointment.is_occupying() && appointment.resource_ids.contains(&rs.resource.id) {
                rs.insert_reservation(Reservation {
                    appointment_id: appointment.id,
                    date: appointment.date,
                    window: appointment.window(),
                });
            }
        }
        Event::AppointmentStatusChanged { id, status, .. } => {
            if status.is_terminal() {
                rs.remove_reservation(*id);
            }
        }
        Event::AppointmentRescheduled {
            id, date, start, end, ..
        } => {
            if rs.remove_reservation(*id).is_some() {
                rs.insert_reservation(Reservation {
                    appointment_id: *id,
                    date: *date,
                    window: TimeWindow::spanning(start, end),
                });
            }
        }
        Event::AppointmentDeleted { id, .. } => {
            rs.remove_reservation(*id);
        }
        _ => {}
    }
}

/// Resources whose lock-protected state an event touches.
pub fn event_resource_ids(event: &Event) -> Vec<Ulid> {
    match event {
        Event::ResourceUpdated { resource } => vec![resource.id],
        Event::AppointmentCreated { appointment } => appointment.resource_ids.clone(),
        Event::AppointmentStatusChanged { resource_ids, .. }
        | Event::AppointmentRescheduled { resource_ids, .. }
        | Event::AppointmentDeleted { resource_ids, .. } => resource_ids.clone(),
        _ => Vec::new(),
    }
}

/// Professional whose lock-protected book an event touches.
pub fn event_book_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::AppointmentCreated { appointment } => Some(appointment.profile_id),
        Event::AppointmentStatusChanged { profile_id, .. }
        | Event::AppointmentRescheduled { profile_id, .. }
        | Event::AppointmentDeleted { profile_id, .. } => Some(*profile_id),
        _ => None,
    }
}
