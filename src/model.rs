use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::EngineError;

/// Minutes since midnight on the tenant-local clock.
pub type Minutes = u16;

pub const MINUTES_PER_DAY: Minutes = 1440;

/// Parse `HH:MM` into minutes since midnight.
pub fn to_minutes(s: &str) -> Result<Minutes, EngineError> {
    let bad = || EngineError::InvalidTimeFormat(s.to_string());
    let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
        return Err(bad());
    }
    let hours: Minutes = h.parse().map_err(|_| bad())?;
    let minutes: Minutes = m.parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(bad());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_minutes(m: Minutes) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| EngineError::Validation(format!("invalid date: {s}")))
}

/// 0 = Sunday … 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

fn minutes_of(t: &NaiveDateTime) -> Minutes {
    (t.hour() * 60 + t.minute()) as Minutes
}

/// Half-open clock interval `[start, end)` within a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Minutes,
    pub end: Minutes,
}

impl TimeWindow {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "TimeWindow start must be before end");
        debug_assert!(end < MINUTES_PER_DAY, "TimeWindow must not span midnight");
        Self { start, end }
    }

    pub fn try_new(start: Minutes, end: Minutes) -> Result<Self, EngineError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Check `start < end < 24:00`. The fields are public, so the engine
    /// re-checks every window it is handed.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.start >= self.end {
            return Err(EngineError::Validation(format!(
                "start {} must be before end {}",
                format_minutes(self.start),
                format_minutes(self.end)
            )));
        }
        if self.end >= MINUTES_PER_DAY {
            return Err(EngineError::Validation("window must end before midnight".into()));
        }
        Ok(())
    }

    /// Build from two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, EngineError> {
        Self::try_new(to_minutes(start)?, to_minutes(end)?)
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, point: Minutes) -> bool {
        self.start <= point && point < self.end
    }

    /// True if `other` lies entirely within `self`.
    pub fn contains_window(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Clock window covered by two timestamps on the same day.
    pub fn spanning(start: &NaiveDateTime, end: &NaiveDateTime) -> Self {
        Self {
            start: minutes_of(start),
            end: minutes_of(end),
        }
    }

    /// Full timestamps for this window on `date`.
    pub fn on(&self, date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), EngineError> {
        let at = |m: Minutes| {
            date.and_hms_opt((m / 60) as u32, (m % 60) as u32, 0)
                .ok_or_else(|| EngineError::Validation(format!("invalid time {}", format_minutes(m))))
        };
        Ok((at(self.start)?, at(self.end)?))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_minutes(self.start), format_minutes(self.end))
    }
}

/// Lookup key for availability rules. `profile_id = None` is the tenant default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleKey {
    pub profile_id: Option<Ulid>,
    pub day_of_week: u8,
}

/// Recurring weekly working hours for a professional, or the tenant default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRule {
    pub id: Ulid,
    pub profile_id: Option<Ulid>,
    pub day_of_week: u8,
    pub is_working_day: bool,
    pub window: TimeWindow,
    /// Breaks inside the working window, in stored order. May overlap each other.
    pub pauses: Vec<TimeWindow>,
}

impl AvailabilityRule {
    pub fn key(&self) -> RuleKey {
        RuleKey {
            profile_id: self.profile_id,
            day_of_week: self.day_of_week,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Ulid,
    pub profile_id: Option<Ulid>,
    pub date: NaiveDate,
    pub name: String,
    pub is_recurring: bool,
    pub blocking: bool,
}

impl Holiday {
    /// Recurring holidays match on month and day in any year; others on the exact date.
    pub fn matches(&self, date: NaiveDate) -> bool {
        if self.is_recurring {
            self.date.month() == date.month() && self.date.day() == date.day()
        } else {
            self.date == date
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    /// Occupying appointments block the professional's and the resources' time.
    pub fn is_occupying(self) -> bool {
        !self.is_terminal()
    }

    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Scheduled, Confirmed) | (Scheduled, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SCHEDULED" => Ok(AppointmentStatus::Scheduled),
            "CONFIRMED" => Ok(AppointmentStatus::Confirmed),
            "CANCELLED" | "CANCELED" => Ok(AppointmentStatus::Cancelled),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            _ => Err(EngineError::Validation(format!("unknown appointment status: {s}"))),
        }
    }
}

/// Line item on an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentService {
    pub service_id: Ulid,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub lead_id: Ulid,
    pub profile_id: Ulid,
    pub date: NaiveDate,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub services: Vec<AppointmentService>,
    pub resource_ids: Vec<Ulid>,
}

impl Appointment {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::spanning(&self.start, &self.end)
    }

    pub fn is_occupying(&self) -> bool {
        self.status.is_occupying()
    }
}

/// Input to `create_appointment` / `book_appointment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAppointment {
    pub id: Ulid,
    pub lead_id: Ulid,
    pub profile_id: Ulid,
    pub date: NaiveDate,
    pub window: TimeWindow,
    pub notes: Option<String>,
    pub services: Vec<AppointmentService>,
    pub resource_ids: Vec<Ulid>,
}

impl NewAppointment {
    pub fn new(lead_id: Ulid, profile_id: Ulid, date: NaiveDate, window: TimeWindow) -> Self {
        Self {
            id: Ulid::new(),
            lead_id,
            profile_id,
            date,
            window,
            notes: None,
            services: Vec::new(),
            resource_ids: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resource_ids: Vec<Ulid>) -> Self {
        self.resource_ids = resource_ids;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_services(mut self, services: Vec<AppointmentService>) -> Self {
        self.services = services;
        self
    }
}

/// A proposed booking to evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub profile_id: Ulid,
    pub resource_ids: Vec<Ulid>,
    pub date: NaiveDate,
    pub window: TimeWindow,
    /// Ignore this appointment when looking for overlaps (rescheduling).
    pub exclude_appointment_id: Option<Ulid>,
}

impl BookingRequest {
    pub fn new(profile_id: Ulid, date: NaiveDate, window: TimeWindow) -> Self {
        Self {
            profile_id,
            resource_ids: Vec::new(),
            date,
            window,
            exclude_appointment_id: None,
        }
    }

    /// Build from the string forms callers submit: `YYYY-MM-DD`, `HH:MM`, `HH:MM`.
    pub fn parse(
        profile_id: Ulid,
        resource_ids: Vec<Ulid>,
        date: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            profile_id,
            resource_ids,
            date: parse_date(date)?,
            window: TimeWindow::parse(start_time, end_time)?,
            exclude_appointment_id: None,
        })
    }

    pub fn with_resources(mut self, resource_ids: Vec<Ulid>) -> Self {
        self.resource_ids = resource_ids;
        self
    }

    pub fn excluding(mut self, appointment_id: Ulid) -> Self {
        self.exclude_appointment_id = Some(appointment_id);
        self
    }
}

impl From<&NewAppointment> for BookingRequest {
    fn from(new: &NewAppointment) -> Self {
        Self {
            profile_id: new.profile_id,
            resource_ids: new.resource_ids.clone(),
            date: new.date,
            window: new.window,
            exclude_appointment_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub name: String,
    pub kind: String,
    /// At most one appointment may hold an exclusive resource at a time.
    pub exclusive: bool,
    pub capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Unavailable,
    Blocked,
    Holiday,
    Resource,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::Unavailable => "unavailable",
            ConflictKind::Blocked => "blocked",
            ConflictKind::Holiday => "holiday",
            ConflictKind::Resource => "resource",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reason a proposed booking cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn new(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked(Appointment),
    Rejected(Vec<Conflict>),
}

impl BookingOutcome {
    pub fn is_booked(&self) -> bool {
        matches!(self, BookingOutcome::Booked(_))
    }
}

/// Appointment book for one professional.
#[derive(Debug, Clone)]
pub struct ProfessionalState {
    pub id: Ulid,
    pub name: Option<String>,
    /// All appointments (any status), sorted by `(date, start)`.
    pub appointments: Vec<Appointment>,
}

impl ProfessionalState {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            appointments: Vec::new(),
        }
    }

    /// Insert maintaining sort order by `(date, start)`.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let key = (appointment.date, appointment.start);
        let pos = self
            .appointments
            .partition_point(|a| (a.date, a.start) <= key);
        self.appointments.insert(pos, appointment);
    }

    pub fn remove_appointment(&mut self, id: Ulid) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn get(&self, id: &Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == *id)
    }

    pub fn get_mut(&mut self, id: &Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == *id)
    }

    /// Appointments on `date`, in start order.
    pub fn on_date(&self, date: NaiveDate) -> &[Appointment] {
        let lo = self.appointments.partition_point(|a| a.date < date);
        let hi = self.appointments.partition_point(|a| a.date <= date);
        &self.appointments[lo..hi]
    }

    /// Appointments on `date` whose window overlaps `window`, regardless of status.
    pub fn overlapping(&self, date: NaiveDate, window: TimeWindow) -> impl Iterator<Item = &Appointment> {
        self.on_date(date)
            .iter()
            .filter(move |a| a.window().overlaps(&window))
    }
}

/// An occupying appointment's hold on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub appointment_id: Ulid,
    pub date: NaiveDate,
    pub window: TimeWindow,
}

#[derive(Debug, Clone)]
pub struct ResourceState {
    pub resource: Resource,
    /// Reservations of occupying appointments, sorted by `(date, window.start)`.
    pub reservations: Vec<Reservation>,
}

impl ResourceState {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            reservations: Vec::new(),
        }
    }

    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let key = (reservation.date, reservation.window.start);
        let pos = self
            .reservations
            .partition_point(|r| (r.date, r.window.start) <= key);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, appointment_id: Ulid) -> Option<Reservation> {
        let pos = self
            .reservations
            .iter()
            .position(|r| r.appointment_id == appointment_id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn overlapping(&self, date: NaiveDate, window: TimeWindow) -> impl Iterator<Item = &Reservation> {
        let lo = self.reservations.partition_point(|r| r.date < date);
        // Everything from here on starts at or after window.end on that date, or is a later date.
        let hi = self
            .reservations
            .partition_point(|r| (r.date, r.window.start) < (date, window.end));
        self.reservations[lo..hi.max(lo)]
            .iter()
            .filter(move |r| r.window.end > window.start)
    }
}

/// The WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProfessionalRegistered {
        id: Ulid,
        name: Option<String>,
    },
    ResourceCreated {
        resource: Resource,
    },
    ResourceUpdated {
        resource: Resource,
    },
    ResourceDeleted {
        id: Ulid,
    },
    AvailabilityRuleUpserted {
        rule: AvailabilityRule,
    },
    AvailabilityRuleRemoved {
        id: Ulid,
        profile_id: Option<Ulid>,
        day_of_week: u8,
    },
    HolidayUpserted {
        holiday: Holiday,
    },
    HolidayRemoved {
        id: Ulid,
    },
    AppointmentCreated {
        appointment: Appointment,
    },
    AppointmentStatusChanged {
        id: Ulid,
        profile_id: Ulid,
        resource_ids: Vec<Ulid>,
        status: AppointmentStatus,
    },
    AppointmentRescheduled {
        id: Ulid,
        profile_id: Ulid,
        resource_ids: Vec<Ulid>,
        date: NaiveDate,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    AppointmentDeleted {
        id: Ulid,
        profile_id: Ulid,
        resource_ids: Vec<Ulid>,
    },
}

impl Event {
    /// The professional whose book this event touches, if any.
    pub fn profile_id(&self) -> Option<Ulid> {
        match self {
            Event::ProfessionalRegistered { id, .. } => Some(*id),
            Event::AvailabilityRuleUpserted { rule } => rule.profile_id,
            Event::AvailabilityRuleRemoved { profile_id, .. } => *profile_id,
            Event::HolidayUpserted { holiday } => holiday.profile_id,
            Event::AppointmentCreated { appointment } => Some(appointment.profile_id),
            Event::AppointmentStatusChanged { profile_id, .. }
            | Event::AppointmentRescheduled { profile_id, .. }
            | Event::AppointmentDeleted { profile_id, .. } => Some(*profile_id),
            Event::ResourceCreated { .. }
            | Event::ResourceUpdated { .. }
            | Event::ResourceDeleted { .. }
            | Event::HolidayRemoved { .. } => None,
        }
    }
}
