use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::{Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::response::NotificationResponse;
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::auth::AgendaAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::tenant::TenantManager;

/// Query handler for one client connection. Holds that connection's LISTEN
/// subscriptions; pending notifications go out after each command.
pub struct AgendaHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<AgendaQueryParser>,
    listeners: Mutex<HashMap<String, broadcast::Receiver<Event>>>,
}

impl AgendaHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(AgendaQueryParser),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager
            .get_or_create(&db)
            .map_err(|e| user_error("08006", format!("tenant error: {e}")))
    }

    async fn run(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(engine, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertProfessional { id, name } => {
                engine.register_professional(id, name).await.map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::InsertResource { resource } => {
                engine.create_resource(resource).await.map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::UpdateResource { id, changes } => {
                let current = engine
                    .get_resource(&id)
                    .await
                    .ok_or_else(|| engine_err(EngineError::NotFound(id)))?;
                engine
                    .update_resource(changes.apply(current))
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("UPDATE", 1)])
            }
            Command::DeleteResource { id } => {
                engine.delete_resource(id).await.map_err(engine_err)?;
                Ok(vec![executed("DELETE", 1)])
            }
            Command::UpsertRule {
                profile_id,
                day_of_week,
                window,
                is_working_day,
                pauses,
            } => {
                engine
                    .upsert_availability_rule(profile_id, day_of_week, window, is_working_day, pauses)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::DeleteRule {
                profile_id,
                day_of_week,
            } => {
                let removed = engine
                    .remove_availability_rule(profile_id, day_of_week)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("DELETE", removed.is_some() as usize)])
            }
            Command::InsertHoliday {
                profile_id,
                name,
                date,
                is_recurring,
                blocking,
            } => {
                engine
                    .upsert_holiday(profile_id, name, date, is_recurring, blocking)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::DeleteHoliday { id } => {
                engine.remove_holiday(id).await.map_err(engine_err)?;
                Ok(vec![executed("DELETE", 1)])
            }
            Command::InsertAppointment { appointment } => {
                engine.create_appointment(appointment).await.map_err(engine_err)?;
                Ok(vec![executed("INSERT", 1)])
            }
            Command::InsertBooking { appointment } => {
                match engine.book_appointment(appointment).await.map_err(engine_err)? {
                    BookingOutcome::Booked(_) => Ok(vec![executed("INSERT", 1)]),
                    BookingOutcome::Rejected(conflicts) => Err(rejected(&conflicts)),
                }
            }
            Command::UpdateStatus { id, status } => {
                engine
                    .update_appointment_status(id, status)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![executed("UPDATE", 1)])
            }
            Command::Reschedule { id, date, window } => {
                match engine
                    .reschedule_appointment(id, date, window)
                    .await
                    .map_err(engine_err)?
                {
                    BookingOutcome::Booked(_) => Ok(vec![executed("UPDATE", 1)]),
                    BookingOutcome::Rejected(conflicts) => Err(rejected(&conflicts)),
                }
            }
            Command::DeleteAppointment { id } => {
                engine.delete_appointment(id).await.map_err(engine_err)?;
                Ok(vec![executed("DELETE", 1)])
            }
            Command::SelectConflicts { request } => {
                let conflicts = engine.check_conflicts(&request).await.map_err(engine_err)?;
                let schema = Arc::new(conflicts_schema());
                let rows: Vec<PgWireResult<_>> = conflicts
                    .iter()
                    .map(|c| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&c.kind.to_string())?;
                        encoder.encode_field(&c.message)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectAvailability { profile_id, date } => {
                let windows = engine.free_windows(profile_id, date).await.map_err(engine_err)?;
                let schema = Arc::new(availability_schema());
                let rows: Vec<PgWireResult<_>> = windows
                    .iter()
                    .map(|w| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&format_minutes(w.start))?;
                        encoder.encode_field(&format_minutes(w.end))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectAppointments { profile_id, date } => {
                let appointments = engine
                    .appointments_on(profile_id, date)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![appointments_response(&appointments)?])
            }
            Command::SelectAppointment { id } => {
                let found: Vec<Appointment> = engine.get_appointment(&id).await.into_iter().collect();
                Ok(vec![appointments_response(&found)?])
            }
            Command::SelectHolidays { date, profile_id } => {
                let holidays = match date {
                    Some(date) => engine.holidays_on(date, profile_id),
                    None => engine
                        .list_holidays()
                        .into_iter()
                        .filter(|h| profile_id.is_none() || h.profile_id.is_none() || h.profile_id == profile_id)
                        .collect(),
                };
                let schema = Arc::new(holidays_schema());
                let rows: Vec<PgWireResult<_>> = holidays
                    .iter()
                    .map(|h| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&h.id.to_string())?;
                        encoder.encode_field(&h.profile_id.map(|p| p.to_string()))?;
                        encoder.encode_field(&h.name)?;
                        encoder.encode_field(&h.date.to_string())?;
                        encoder.encode_field(&h.is_recurring)?;
                        encoder.encode_field(&h.blocking)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectResources => {
                let resources = engine.list_resources().await;
                let schema = Arc::new(resources_schema());
                let rows: Vec<PgWireResult<_>> = resources
                    .iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.name)?;
                        encoder.encode_field(&r.kind)?;
                        encoder.encode_field(&r.exclusive)?;
                        encoder.encode_field(&(r.capacity as i64))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectRules { profile_id } => {
                let rules: Vec<AvailabilityRule> = engine
                    .list_availability_rules()
                    .into_iter()
                    .filter(|r| profile_id.is_none() || r.profile_id == profile_id)
                    .collect();
                let schema = Arc::new(rules_schema());
                let rows: Vec<PgWireResult<_>> = rules
                    .iter()
                    .map(|r| {
                        let pauses: Vec<String> = r.pauses.iter().map(|p| p.to_string()).collect();
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id.to_string())?;
                        encoder.encode_field(&r.profile_id.map(|p| p.to_string()))?;
                        encoder.encode_field(&(r.day_of_week as i16))?;
                        encoder.encode_field(&format_minutes(r.window.start))?;
                        encoder.encode_field(&format_minutes(r.window.end))?;
                        encoder.encode_field(&r.is_working_day)?;
                        encoder.encode_field(&pauses.join(","))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Listen { channel } => {
                let profile_id = sql::channel_professional(&channel).map_err(sql_err)?;
                // Unknown professionals cannot be listened to.
                engine.professional_name(&profile_id).await.map_err(engine_err)?;
                let mut listeners = self.lock_listeners();
                if !listeners.contains_key(&channel) {
                    listeners.insert(channel, engine.notify.subscribe(profile_id));
                }
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
            Command::Unlisten { channel } => {
                self.lock_listeners().remove(&channel);
                engine.notify.prune();
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
            Command::UnlistenAll => {
                self.lock_listeners().clear();
                engine.notify.prune();
                Ok(vec![Response::Execution(Tag::new("UNLISTEN"))])
            }
        }
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Receiver<Event>>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drain every subscription into `(channel, JSON payload)` pairs.
    /// Channels whose hub has gone away are dropped.
    fn pending_notifications(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.lock_listeners().retain(|channel, rx| loop {
            match rx.try_recv() {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => out.push((channel.clone(), payload)),
                    Err(e) => warn!("cannot encode notification on {channel}: {e}"),
                },
                Err(TryRecvError::Lagged(n)) => warn!("{channel}: {n} notifications dropped"),
                Err(TryRecvError::Empty) => break true,
                Err(TryRecvError::Closed) => break false,
            }
        });
        out
    }

    async fn deliver_notifications<C>(&self, client: &mut C) -> PgWireResult<()>
    where
        C: Sink<PgWireBackendMessage> + Unpin + Send,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        for (channel, payload) in self.pending_notifications() {
            debug!("notify {channel}");
            client
                .send(PgWireBackendMessage::NotificationResponse(NotificationResponse::new(
                    0, channel, payload,
                )))
                .await?;
        }
        Ok(())
    }
}

fn executed(tag: &str, rows: usize) -> Response {
    Response::Execution(Tag::new(tag).with_rows(rows))
}

fn appointments_response(appointments: &[Appointment]) -> PgWireResult<Response> {
    let schema = Arc::new(appointments_schema());
    let mut rows: Vec<PgWireResult<_>> = Vec::with_capacity(appointments.len());
    for a in appointments {
        let services = serde_json::to_string(&a.services)
            .map_err(|e| user_error("XX000", format!("cannot encode services: {e}")))?;
        let resource_ids: Vec<String> = a.resource_ids.iter().map(|r| r.to_string()).collect();
        let window = a.window();
        let mut encoder = DataRowEncoder::new(schema.clone());
        encoder.encode_field(&a.id.to_string())?;
        encoder.encode_field(&a.lead_id.to_string())?;
        encoder.encode_field(&a.profile_id.to_string())?;
        encoder.encode_field(&a.date.to_string())?;
        encoder.encode_field(&format_minutes(window.start))?;
        encoder.encode_field(&format_minutes(window.end))?;
        encoder.encode_field(&a.status.to_string())?;
        encoder.encode_field(&a.notes)?;
        encoder.encode_field(&resource_ids.join(","))?;
        encoder.encode_field(&services)?;
        rows.push(Ok(encoder.take_row()));
    }
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn conflicts_schema() -> Vec<FieldInfo> {
    vec![field("type", Type::VARCHAR), field("message", Type::VARCHAR)]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![field("start_time", Type::VARCHAR), field("end_time", Type::VARCHAR)]
}

fn appointments_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("lead_id", Type::VARCHAR),
        field("profile_id", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("start_time", Type::VARCHAR),
        field("end_time", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("notes", Type::VARCHAR),
        field("resource_ids", Type::VARCHAR),
        field("services", Type::VARCHAR),
    ]
}

fn holidays_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("profile_id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("date", Type::VARCHAR),
        field("is_recurring", Type::BOOL),
        field("blocking", Type::BOOL),
    ]
}

fn resources_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("name", Type::VARCHAR),
        field("kind", Type::VARCHAR),
        field("exclusive", Type::BOOL),
        field("capacity", Type::INT8),
    ]
}

fn rules_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::VARCHAR),
        field("profile_id", Type::VARCHAR),
        field("day_of_week", Type::INT2),
        field("start_time", Type::VARCHAR),
        field("end_time", Type::VARCHAR),
        field("is_working_day", Type::BOOL),
        field("pauses", Type::VARCHAR),
    ]
}

/// Result columns for a statement, known before its parameters are bound.
fn schema_for(sql: &str) -> Vec<FieldInfo> {
    match sql::result_table(sql).as_deref() {
        Some("conflicts") => conflicts_schema(),
        Some("availability") => availability_schema(),
        Some("appointments") => appointments_schema(),
        Some("holidays") => holidays_schema(),
        Some("resources") => resources_schema(),
        Some("availability_rules") => rules_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for AgendaHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let responses = self.run(&engine, cmd).await;
        self.deliver_notifications(client).await?;
        responses
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct AgendaQueryParser;

#[async_trait]
impl QueryParser for AgendaQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for AgendaHandler {
    type Statement = String;
    type QueryParser = AgendaQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let responses = self.run(&engine, cmd).await;
        self.deliver_notifications(client).await?;
        responses?
            .into_iter()
            .next()
            .ok_or_else(|| user_error("XX000", "command produced no response".into()))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, schema_for(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for(&target.statement.statement)))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// Runs from the highest index down so `$1` never clobbers `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct AgendaFactory {
    handler: Arc<AgendaHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<AgendaAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl AgendaFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = AgendaAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(AgendaHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for AgendaFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client until it disconnects. Each connection gets its own
/// handler, so LISTEN state never leaks between clients.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(AgendaFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

fn engine_sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::InvalidTimeFormat(_) => "22007",
        EngineError::Validation(_) => "22023",
        EngineError::NotFound(_) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::InUse(_) => "23503",
        EngineError::InvalidTransition { .. } => "55000",
        // serialization_failure: clients re-check and retry
        EngineError::ConcurrencyConflict(_) => "40001",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::WalError(_) => "58030",
    }
}

fn sql_sqlstate(e: &SqlError) -> &'static str {
    match e {
        SqlError::Value(inner) => engine_sqlstate(inner),
        SqlError::UnknownTable(_) => "42P01",
        SqlError::UnknownColumn(_) => "42703",
        SqlError::BadChannel(_) => "42602",
        _ => "42601",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    user_error(engine_sqlstate(&e), e.to_string())
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error(sql_sqlstate(&e), e.to_string())
}

/// A booking refused by the conflict check. The first conflict is the message.
fn rejected(conflicts: &[Conflict]) -> PgWireError {
    let message = conflicts
        .first()
        .map_or_else(|| "booking rejected".to_string(), |c| c.message.clone());
    user_error("23P01", message)
}
