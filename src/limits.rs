//! Hard caps that bound memory per tenant and per request.

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_PROFESSIONALS_PER_TENANT: usize = 10_000;
pub const MAX_RESOURCES_PER_TENANT: usize = 10_000;
pub const MAX_HOLIDAYS_PER_TENANT: usize = 10_000;
pub const MAX_APPOINTMENTS_PER_PROFESSIONAL: usize = 100_000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_PAUSES_PER_RULE: usize = 32;
pub const MAX_RESOURCES_PER_APPOINTMENT: usize = 16;
pub const MAX_SERVICES_PER_APPOINTMENT: usize = 64;
