use tracing::debug;
use ulid::Ulid;

use crate::model::*;
use crate::observability::{CONFLICTS_TOTAL, CONFLICT_CHECKS_TOTAL};

use super::availability::evaluate_rule;
use super::{Engine, EngineError};

/// Occupying appointments in the professional's book that overlap the request.
pub fn find_overlaps<'a>(ps: &'a ProfessionalState, req: &BookingRequest) -> Vec<&'a Appointment> {
    ps.overlapping(req.date, req.window)
        .filter(|a| a.is_occupying())
        .filter(|a| Some(a.id) != req.exclude_appointment_id)
        .collect()
}

/// Any number of overlapping appointments collapses into one conflict.
pub fn overlap_conflict(overlaps: &[&Appointment]) -> Option<Conflict> {
    if overlaps.is_empty() {
        return None;
    }
    Some(Conflict::new(
        ConflictKind::Unavailable,
        "professional already has an appointment at this time",
    ))
}

/// Exclusive resources may not be held twice. Shared resources are never checked.
pub fn resource_conflict(rs: &ResourceState, req: &BookingRequest) -> Option<Conflict> {
    if !rs.resource.exclusive {
        return None;
    }
    let taken = rs
        .overlapping(req.date, req.window)
        .any(|r| Some(r.appointment_id) != req.exclude_appointment_id);
    taken.then(|| {
        Conflict::new(
            ConflictKind::Resource,
            format!("{} is already reserved for this time", rs.resource.name),
        )
    })
}

/// Commit-time guard: the first occupying appointment or reservation that already
/// holds the slot. Runs under write locks, after any caller-side check.
pub(super) fn occupied_by<'a, I>(ps: &ProfessionalState, resources: I, req: &BookingRequest) -> Option<Ulid>
where
    I: IntoIterator<Item = &'a ResourceState>,
{
    if let Some(a) = find_overlaps(ps, req).first() {
        return Some(a.id);
    }
    resources
        .into_iter()
        .filter(|rs| rs.resource.exclusive)
        .find_map(|rs| {
            rs.overlapping(req.date, req.window)
                .find(|r| Some(r.appointment_id) != req.exclude_appointment_id)
                .map(|r| r.appointment_id)
        })
}

impl Engine {
    /// Every reason the proposed booking cannot proceed, in fixed order:
    /// holidays, working hours, the professional's own book, then each requested
    /// resource. Empty means the slot is free. Never mutates.
    pub async fn check_conflicts(&self, req: &BookingRequest) -> Result<Vec<Conflict>, EngineError> {
        req.window.validate()?;
        let ps = self.professional(&req.profile_id)?;
        for rid in &req.resource_ids {
            self.resource(rid)?;
        }

        let book = ps.read().await;
        let resources = self.lock_resources_read(&req.resource_ids).await?;
        let views: Vec<&ResourceState> = resources.iter().map(|(_, g)| &**g).collect();
        Ok(self.evaluate(req, &book, &views))
    }

    /// Run every check against state the caller has already locked.
    /// `resources` is in lock order; conflicts are reported in request order.
    pub(super) fn evaluate(
        &self,
        req: &BookingRequest,
        book: &ProfessionalState,
        resources: &[&ResourceState],
    ) -> Vec<Conflict> {
        metrics::counter!(CONFLICT_CHECKS_TOTAL).increment(1);

        let mut conflicts = self.holiday_conflicts(req.profile_id, req.date);

        if let Some(rule) = self.resolve_availability(Some(req.profile_id), day_of_week(req.date)) {
            conflicts.extend(evaluate_rule(&rule, &req.window));
        }

        conflicts.extend(overlap_conflict(&find_overlaps(book, req)));

        let mut seen = Vec::with_capacity(req.resource_ids.len());
        for rid in &req.resource_ids {
            if seen.contains(rid) {
                continue;
            }
            seen.push(*rid);
            if let Some(rs) = resources.iter().find(|rs| rs.resource.id == *rid) {
                conflicts.extend(resource_conflict(rs, req));
            }
        }

        for c in &conflicts {
            metrics::counter!(CONFLICTS_TOTAL, "kind" => c.kind.as_str()).increment(1);
        }
        debug!(
            profile_id = %req.profile_id,
            date = %req.date,
            window = %req.window,
            conflicts = conflicts.len(),
            "conflict check"
        );
        conflicts
    }
}
