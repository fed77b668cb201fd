use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "agenda_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "agenda_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "agenda_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "agenda_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "agenda_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "agenda_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "agenda_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "agenda_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "agenda_wal_compactions_total";

// ── Scheduling metrics ──────────────────────────────────────────

/// Counter: conflict evaluations run, by check or by booking.
pub const CONFLICT_CHECKS_TOTAL: &str = "agenda_conflict_checks_total";

/// Counter: conflicts reported. Labels: kind.
pub const CONFLICTS_TOTAL: &str = "agenda_conflicts_total";

/// Counter: atomic bookings refused because the slot had conflicts.
pub const BOOKING_REJECTIONS_TOTAL: &str = "agenda_booking_rejections_total";

/// Counter: direct creates that lost a race for the slot.
pub const CONCURRENCY_CONFLICTS_TOTAL: &str = "agenda_concurrency_conflicts_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertProfessional { .. } => "insert_professional",
        Command::InsertResource { .. } => "insert_resource",
        Command::UpdateResource { .. } => "update_resource",
        Command::DeleteResource { .. } => "delete_resource",
        Command::UpsertRule { .. } => "upsert_rule",
        Command::DeleteRule { .. } => "delete_rule",
        Command::InsertHoliday { .. } => "insert_holiday",
        Command::DeleteHoliday { .. } => "delete_holiday",
        Command::InsertAppointment { .. } => "insert_appointment",
        Command::InsertBooking { .. } => "insert_booking",
        Command::UpdateStatus { .. } => "update_status",
        Command::Reschedule { .. } => "reschedule",
        Command::DeleteAppointment { .. } => "delete_appointment",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectAppointments { .. } => "select_appointments",
        Command::SelectAppointment { .. } => "select_appointment",
        Command::SelectHolidays { .. } => "select_holidays",
        Command::SelectResources => "select_resources",
        Command::SelectRules { .. } => "select_rules",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
        Command::UnlistenAll => "unlisten_all",
    }
}
