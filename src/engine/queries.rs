use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_appointment(&self, id: &Ulid) -> Option<Appointment> {
        let pid = self.store.get_professional_for_appointment(id)?;
        let ps = self.store.get_professional(&pid)?;
        let guard = ps.read().await;
        guard.get(id).cloned()
    }

    /// A professional's appointments on `date`, any status, in start order.
    pub async fn appointments_on(&self, profile_id: Ulid, date: NaiveDate) -> Result<Vec<Appointment>, EngineError> {
        let ps = self.professional(&profile_id)?;
        let guard = ps.read().await;
        Ok(guard.on_date(date).to_vec())
    }

    pub async fn professional_name(&self, id: &Ulid) -> Result<Option<String>, EngineError> {
        let ps = self.professional(id)?;
        let guard = ps.read().await;
        Ok(guard.name.clone())
    }

    pub async fn get_resource(&self, id: &Ulid) -> Option<Resource> {
        let rs = self.store.get_resource(id)?;
        let guard = rs.read().await;
        Some(guard.resource.clone())
    }

    pub async fn list_resources(&self) -> Vec<Resource> {
        let mut out = Vec::new();
        for id in self.store.resource_ids() {
            if let Some(r) = self.get_resource(&id).await {
                out.push(r);
            }
        }
        out
    }

    /// Active reservations on a resource for `date`.
    pub async fn reservations_on(&self, resource_id: &Ulid, date: NaiveDate) -> Result<Vec<Reservation>, EngineError> {
        let rs = self.resource(resource_id)?;
        let guard = rs.read().await;
        Ok(guard
            .reservations
            .iter()
            .filter(|r| r.date == date)
            .copied()
            .collect())
    }

    /// Every stored rule, tenant defaults first, then by professional and weekday.
    pub fn list_availability_rules(&self) -> Vec<AvailabilityRule> {
        self.store.rules()
    }

    pub fn get_holiday(&self, id: &Ulid) -> Option<Holiday> {
        self.store.get_holiday(id)
    }

    pub fn list_holidays(&self) -> Vec<Holiday> {
        self.store.all_holidays()
    }
}
