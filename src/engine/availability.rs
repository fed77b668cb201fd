use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

/// Keys to try, most specific first: the professional's own rule, then the tenant default.
pub fn lookup_keys(profile_id: Option<Ulid>, day_of_week: u8) -> Vec<RuleKey> {
    let mut keys = Vec::with_capacity(2);
    if profile_id.is_some() {
        keys.push(RuleKey {
            profile_id,
            day_of_week,
        });
    }
    keys.push(RuleKey {
        profile_id: None,
        day_of_week,
    });
    keys
}

/// Check a proposed window against a resolved rule.
///
/// A non-working day yields a single conflict. Otherwise the window must lie
/// inside the working hours, and every pause it touches is reported once, in
/// the order the pauses were stored.
pub fn evaluate_rule(rule: &AvailabilityRule, proposed: &TimeWindow) -> Vec<Conflict> {
    if !rule.is_working_day {
        return vec![Conflict::new(
            ConflictKind::Unavailable,
            "professional does not work this day",
        )];
    }

    let mut conflicts = Vec::new();
    if !rule.window.contains_window(proposed) {
        conflicts.push(Conflict::new(
            ConflictKind::Unavailable,
            format!("outside business hours ({})", rule.window),
        ));
    }
    for pause in &rule.pauses {
        if pause.overlaps(proposed) {
            conflicts.push(Conflict::new(
                ConflictKind::Unavailable,
                format!("overlaps break ({pause})"),
            ));
        }
    }
    conflicts
}

/// Merge sorted overlapping/adjacent windows into disjoint windows.
pub fn merge_overlapping(sorted: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut merged: Vec<TimeWindow> = Vec::new();
    for &w in sorted {
        if let Some(last) = merged.last_mut()
            && w.start <= last.end
        {
            last.end = last.end.max(w.end);
            continue;
        }
        merged.push(w);
    }
    merged
}

/// Remove `to_remove` (sorted, disjoint) from `base` (sorted, disjoint).
pub fn subtract_windows(base: &[TimeWindow], to_remove: &[TimeWindow]) -> Vec<TimeWindow> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < b.end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(TimeWindow::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < b.end {
            result.push(TimeWindow::new(current_start, b.end));
        }
    }

    result
}

impl Engine {
    /// The rule that applies to `profile_id` on `day_of_week`, falling back to the
    /// tenant default. `None` means the day is unconstrained.
    pub fn resolve_availability(&self, profile_id: Option<Ulid>, day_of_week: u8) -> Option<AvailabilityRule> {
        lookup_keys(profile_id, day_of_week)
            .iter()
            .find_map(|key| self.store.get_rule(key))
    }

    /// Bookable sub-windows of `date` for a professional: working hours minus
    /// pauses minus occupying appointments. Without a rule the whole day is the base,
    /// which ends at 23:59 since no window may reach midnight.
    pub async fn free_windows(&self, profile_id: Ulid, date: NaiveDate) -> Result<Vec<TimeWindow>, EngineError> {
        let ps = self.professional(&profile_id)?;
        if self.day_blocked(profile_id, date) {
            return Ok(Vec::new());
        }

        let rule = self.resolve_availability(Some(profile_id), day_of_week(date));
        let (base, mut taken) = match rule {
            Some(rule) if !rule.is_working_day => return Ok(Vec::new()),
            Some(rule) => (rule.window, rule.pauses),
            None => (TimeWindow::new(0, MINUTES_PER_DAY - 1), Vec::new()),
        };

        let guard = ps.read().await;
        taken.extend(
            guard
                .on_date(date)
                .iter()
                .filter(|a| a.is_occupying())
                .map(|a| a.window()),
        );
        drop(guard);

        taken.sort_by_key(|w| w.start);
        let taken = merge_overlapping(&taken);
        Ok(subtract_windows(&[base], &taken))
    }
}
