use std::str::FromStr;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

/// Which holidays take part in conflict checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HolidayScope {
    /// Only tenant-wide holidays (no professional attached).
    #[default]
    Tenant,
    /// Tenant-wide holidays, plus the proposed professional's own blocking days.
    Professional,
}

impl FromStr for HolidayScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tenant" => Ok(HolidayScope::Tenant),
            "professional" | "profile" => Ok(HolidayScope::Professional),
            _ => Err(EngineError::Validation(format!("unknown holiday scope: {s}"))),
        }
    }
}

/// First blocking holiday matching `date`. `holidays` must be in creation order,
/// which makes the tie-break between several matches deterministic.
pub fn first_blocking(holidays: &[Holiday], date: NaiveDate) -> Option<&Holiday> {
    holidays.iter().find(|h| h.blocking && h.matches(date))
}

impl Engine {
    /// Every holiday matching `date`, blocking or not: tenant-wide first,
    /// then those scoped to `profile_id`, each in creation order.
    pub fn holidays_on(&self, date: NaiveDate, profile_id: Option<Ulid>) -> Vec<Holiday> {
        let mut found: Vec<Holiday> = self
            .store
            .holidays_in_scope(None)
            .into_iter()
            .filter(|h| h.matches(date))
            .collect();
        if let Some(pid) = profile_id {
            found.extend(
                self.store
                    .holidays_in_scope(Some(pid))
                    .into_iter()
                    .filter(|h| h.matches(date)),
            );
        }
        found
    }

    pub(super) fn holiday_conflicts(&self, profile_id: Ulid, date: NaiveDate) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        let tenant_wide = self.store.holidays_in_scope(None);
        if let Some(h) = first_blocking(&tenant_wide, date) {
            conflicts.push(Conflict::new(
                ConflictKind::Holiday,
                format!("{} - schedule blocked for this day", h.name),
            ));
        }

        if self.options.holiday_scope == HolidayScope::Professional {
            let own = self.store.holidays_in_scope(Some(profile_id));
            if let Some(h) = first_blocking(&own, date) {
                conflicts.push(Conflict::new(
                    ConflictKind::Blocked,
                    format!("{} - professional unavailable on this day", h.name),
                ));
            }
        }

        conflicts
    }

    /// True when no booking can land on `date` for this professional.
    pub(super) fn day_blocked(&self, profile_id: Ulid, date: NaiveDate) -> bool {
        !self.holiday_conflicts(profile_id, date).is_empty()
    }
}
