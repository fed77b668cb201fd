use chrono::NaiveDate;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject,
    Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertProfessional {
        id: Ulid,
        name: Option<String>,
    },
    InsertResource {
        resource: Resource,
    },
    UpdateResource {
        id: Ulid,
        changes: ResourceChanges,
    },
    DeleteResource {
        id: Ulid,
    },
    UpsertRule {
        profile_id: Option<Ulid>,
        day_of_week: u8,
        window: TimeWindow,
        is_working_day: bool,
        pauses: Vec<TimeWindow>,
    },
    DeleteRule {
        profile_id: Option<Ulid>,
        day_of_week: u8,
    },
    InsertHoliday {
        profile_id: Option<Ulid>,
        name: String,
        date: NaiveDate,
        is_recurring: bool,
        blocking: bool,
    },
    DeleteHoliday {
        id: Ulid,
    },
    /// Direct create: only the commit-time occupancy guard applies.
    InsertAppointment {
        appointment: NewAppointment,
    },
    /// Atomic check-and-commit.
    InsertBooking {
        appointment: NewAppointment,
    },
    UpdateStatus {
        id: Ulid,
        status: AppointmentStatus,
    },
    Reschedule {
        id: Ulid,
        date: NaiveDate,
        window: TimeWindow,
    },
    DeleteAppointment {
        id: Ulid,
    },
    SelectConflicts {
        request: BookingRequest,
    },
    SelectAvailability {
        profile_id: Ulid,
        date: NaiveDate,
    },
    SelectAppointments {
        profile_id: Ulid,
        date: NaiveDate,
    },
    SelectAppointment {
        id: Ulid,
    },
    SelectHolidays {
        date: Option<NaiveDate>,
        profile_id: Option<Ulid>,
    },
    SelectResources,
    /// `None` lists every rule, tenant defaults included.
    SelectRules {
        profile_id: Option<Ulid>,
    },
    Listen {
        channel: String,
    },
    Unlisten {
        channel: String,
    },
    UnlistenAll,
}

/// Partial update of a resource. Unset fields keep their current value.
#[derive(Debug, Default, PartialEq)]
pub struct ResourceChanges {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub exclusive: Option<bool>,
    pub capacity: Option<u32>,
}

impl ResourceChanges {
    pub fn apply(self, mut resource: Resource) -> Resource {
        if let Some(name) = self.name {
            resource.name = name;
        }
        if let Some(kind) = self.kind {
            resource.kind = kind;
        }
        if let Some(exclusive) = self.exclusive {
            resource.exclusive = exclusive;
        }
        if let Some(capacity) = self.capacity {
            resource.capacity = capacity;
        }
        resource
    }
}

const CHANNEL_PREFIX: &str = "professional_";

/// The professional a `LISTEN` channel refers to.
pub fn channel_professional(channel: &str) -> Result<Ulid, SqlError> {
    let id = channel
        .get(..CHANNEL_PREFIX.len())
        .filter(|head| head.eq_ignore_ascii_case(CHANNEL_PREFIX))
        .map(|_| &channel[CHANNEL_PREFIX.len()..])
        .ok_or_else(|| SqlError::BadChannel(channel.to_string()))?;
    Ulid::from_string(id).map_err(|_| SqlError::BadChannel(channel.to_string()))
}

pub fn channel_name(profile_id: Ulid) -> String {
    format!("{CHANNEL_PREFIX}{profile_id}")
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if let Some(channel) = keyword_arg(trimmed, "UNLISTEN") {
        return match channel.as_str() {
            "" => Err(SqlError::Parse("UNLISTEN needs a channel".into())),
            "*" => Ok(Command::UnlistenAll),
            _ => Ok(Command::Unlisten { channel }),
        };
    }
    if let Some(channel) = keyword_arg(trimmed, "LISTEN") {
        if channel.is_empty() {
            return Err(SqlError::Parse("LISTEN needs a channel".into()));
        }
        return Ok(Command::Listen { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection.as_ref()),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table a SELECT reads from, for describing result columns before
/// parameters are bound. `None` for anything that returns no rows.
pub fn result_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    let Some(Statement::Query(query)) = stmts.first() else {
        return None;
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return None;
    };
    table_factor_name(&select.from.first()?.relation).ok()
}

/// `LISTEN foo;` style statements, which carry a bare channel name.
fn keyword_arg(sql: &str, keyword: &str) -> Option<String> {
    let head = sql.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &sql[keyword.len()..];
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim().trim_end_matches(';').trim().trim_matches('"').to_string())
}

// ── INSERT ────────────────────────────────────────────────────

const PROFESSIONAL_COLUMNS: &[&str] = &["id", "name"];
const RESOURCE_COLUMNS: &[&str] = &["id", "name", "kind", "exclusive", "capacity"];
const RULE_COLUMNS: &[&str] = &[
    "profile_id",
    "day_of_week",
    "start_time",
    "end_time",
    "is_working_day",
    "pauses",
];
const HOLIDAY_COLUMNS: &[&str] = &["profile_id", "name", "date", "is_recurring", "blocking"];
const APPOINTMENT_COLUMNS: &[&str] = &[
    "id",
    "lead_id",
    "profile_id",
    "date",
    "start_time",
    "end_time",
    "notes",
    "resource_ids",
    "services",
];

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let columns = match table.as_str() {
        "professionals" => PROFESSIONAL_COLUMNS,
        "resources" => RESOURCE_COLUMNS,
        "availability_rules" => RULE_COLUMNS,
        "holidays" => HOLIDAY_COLUMNS,
        "appointments" | "bookings" => APPOINTMENT_COLUMNS,
        _ => return Err(SqlError::UnknownTable(table)),
    };
    let row = insert_fields(insert, &table, columns)?;

    match table.as_str() {
        "professionals" => Ok(Command::InsertProfessional {
            id: row.ulid("id")?,
            name: row.opt_text("name")?,
        }),
        "resources" => Ok(Command::InsertResource {
            resource: Resource {
                id: row.ulid("id")?,
                name: row.text("name")?,
                kind: row.opt_text("kind")?.unwrap_or_default(),
                exclusive: row.bool_or("exclusive", true)?,
                capacity: row.u32_or("capacity", 1)?,
            },
        }),
        "availability_rules" => {
            let is_working_day = row.bool_or("is_working_day", true)?;
            // Non-working days may omit their hours.
            let window = if !is_working_day && !row.has("start_time") && !row.has("end_time") {
                TimeWindow::new(0, MINUTES_PER_DAY - 1)
            } else {
                row.window("start_time", "end_time")?
            };
            Ok(Command::UpsertRule {
                profile_id: row.opt_ulid("profile_id")?,
                day_of_week: row.day_of_week("day_of_week")?,
                window,
                is_working_day,
                pauses: parse_pauses(row.opt_text("pauses")?.as_deref())?,
            })
        }
        "holidays" => Ok(Command::InsertHoliday {
            profile_id: row.opt_ulid("profile_id")?,
            name: row.text("name")?,
            date: row.date("date")?,
            is_recurring: row.bool_or("is_recurring", false)?,
            blocking: row.bool_or("blocking", true)?,
        }),
        _ => {
            let appointment = new_appointment(&row)?;
            if table == "bookings" {
                Ok(Command::InsertBooking { appointment })
            } else {
                Ok(Command::InsertAppointment { appointment })
            }
        }
    }
}

fn new_appointment(row: &Fields) -> Result<NewAppointment, SqlError> {
    let mut appointment = NewAppointment::new(
        row.ulid("lead_id")?,
        row.ulid("profile_id")?,
        row.date("date")?,
        row.window("start_time", "end_time")?,
    );
    if let Some(id) = row.opt_ulid("id")? {
        appointment.id = id;
    }
    appointment.notes = row.opt_text("notes")?;
    appointment.resource_ids = row.ulid_list("resource_ids")?;
    if let Some(json) = row.opt_text("services")? {
        appointment.services =
            serde_json::from_str(&json).map_err(|e| SqlError::Parse(format!("bad services JSON: {e}")))?;
    }
    Ok(appointment)
}

/// `'12:00-13:00,16:00-16:15'`. Empty or NULL means no pauses.
fn parse_pauses(text: Option<&str>) -> Result<Vec<TimeWindow>, SqlError> {
    let Some(text) = text else { return Ok(Vec::new()) };
    text.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| -> Result<TimeWindow, SqlError> {
            let (start, end) = p
                .split_once('-')
                .ok_or_else(|| SqlError::Parse(format!("bad pause {p:?} (expected HH:MM-HH:MM)")))?;
            Ok(TimeWindow::parse(start, end)?)
        })
        .collect()
}

// ── UPDATE ────────────────────────────────────────────────────

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: Option<&Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    let id = where_fields(selection)?.ulid("id")?;

    let mut pairs = Vec::with_capacity(assignments.len());
    for a in assignments {
        let column = match &a.target {
            AssignmentTarget::ColumnName(name) => {
                object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))?
            }
            AssignmentTarget::Tuple(_) => return Err(SqlError::Unsupported("tuple assignment".into())),
        };
        pairs.push((column, expr_text(&a.value)?));
    }
    let set = Fields::new(pairs, SqlError::MissingColumn);

    match table.as_str() {
        "appointments" => {
            let moves = ["date", "start_time", "end_time"].iter().any(|c| set.has(c));
            match (set.has("status"), moves) {
                (true, false) => Ok(Command::UpdateStatus {
                    id,
                    status: set.text("status")?.parse()?,
                }),
                (false, true) => Ok(Command::Reschedule {
                    id,
                    date: set.date("date")?,
                    window: set.window("start_time", "end_time")?,
                }),
                (true, true) => Err(SqlError::Unsupported(
                    "status and time cannot change in one statement".into(),
                )),
                (false, false) => Err(SqlError::MissingColumn("status")),
            }
        }
        "resources" => Ok(Command::UpdateResource {
            id,
            changes: ResourceChanges {
                name: set.opt_text("name")?,
                kind: set.opt_text("kind")?,
                exclusive: set.opt_bool("exclusive")?,
                capacity: set.opt_u32("capacity")?,
            },
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── DELETE ────────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filter = where_fields(delete.selection.as_ref())?;

    match table.as_str() {
        "resources" => Ok(Command::DeleteResource { id: filter.ulid("id")? }),
        "holidays" => Ok(Command::DeleteHoliday { id: filter.ulid("id")? }),
        "appointments" => Ok(Command::DeleteAppointment { id: filter.ulid("id")? }),
        "availability_rules" => Ok(Command::DeleteRule {
            profile_id: filter.opt_ulid("profile_id")?,
            day_of_week: filter.day_of_week("day_of_week")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── SELECT ────────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filter = where_fields(select.selection.as_ref())?;

    match table.as_str() {
        "conflicts" => {
            let mut request = BookingRequest::new(
                filter.ulid("profile_id")?,
                filter.date("date")?,
                filter.window("start_time", "end_time")?,
            )
            .with_resources(filter.ulid_list("resource_ids")?);
            if let Some(exclude) = filter.opt_ulid("exclude_id")? {
                request = request.excluding(exclude);
            }
            Ok(Command::SelectConflicts { request })
        }
        "availability" => Ok(Command::SelectAvailability {
            profile_id: filter.ulid("profile_id")?,
            date: filter.date("date")?,
        }),
        "appointments" => {
            if filter.has("id") {
                return Ok(Command::SelectAppointment { id: filter.ulid("id")? });
            }
            Ok(Command::SelectAppointments {
                profile_id: filter.ulid("profile_id")?,
                date: filter.date("date")?,
            })
        }
        "holidays" => Ok(Command::SelectHolidays {
            date: filter.opt_date("date")?,
            profile_id: filter.opt_ulid("profile_id")?,
        }),
        "resources" => Ok(Command::SelectResources),
        "availability_rules" => Ok(Command::SelectRules {
            profile_id: filter.opt_ulid("profile_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn where_fields(selection: Option<&Expr>) -> Result<Fields, SqlError> {
    let mut pairs = Vec::new();
    if let Some(expr) = selection {
        collect_filters(expr, &mut pairs)?;
    }
    Ok(Fields::new(pairs, SqlError::MissingFilter))
}

/// Flatten `a = 1 AND b IS NULL AND ...` into column/value pairs.
fn collect_filters(expr: &Expr, pairs: &mut Vec<(String, Option<String>)>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_filters(left, pairs)?;
            collect_filters(right, pairs)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let column = expr_column_name(left).ok_or_else(|| SqlError::Unsupported(format!("filter {expr}")))?;
            pairs.push((column, expr_text(right)?));
            Ok(())
        }
        Expr::IsNull(inner) => {
            let column = expr_column_name(inner).ok_or_else(|| SqlError::Unsupported(format!("filter {expr}")))?;
            pairs.push((column, None));
            Ok(())
        }
        Expr::Nested(inner) => collect_filters(inner, pairs),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Column values ─────────────────────────────────────────────

/// Column/value pairs from an INSERT row, a SET list or a WHERE conjunction.
/// `None` values are SQL NULL.
struct Fields {
    pairs: Vec<(String, Option<String>)>,
    missing: fn(&'static str) -> SqlError,
}

impl Fields {
    fn new(pairs: Vec<(String, Option<String>)>, missing: fn(&'static str) -> SqlError) -> Self {
        Self { pairs, missing }
    }

    fn has(&self, column: &str) -> bool {
        self.pairs.iter().any(|(c, _)| c == column)
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>, SqlError> {
        Ok(self
            .pairs
            .iter()
            .find(|(c, _)| c == column)
            .and_then(|(_, v)| v.clone()))
    }

    fn text(&self, column: &'static str) -> Result<String, SqlError> {
        self.opt_text(column)?.ok_or_else(|| (self.missing)(column))
    }

    fn opt_ulid(&self, column: &str) -> Result<Option<Ulid>, SqlError> {
        self.opt_text(column)?
            .map(|s| Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("{column}: bad ULID: {e}"))))
            .transpose()
    }

    fn ulid(&self, column: &'static str) -> Result<Ulid, SqlError> {
        self.opt_ulid(column)?.ok_or_else(|| (self.missing)(column))
    }

    /// Comma-separated ids, optionally in a Postgres array literal `{a,b}`.
    fn ulid_list(&self, column: &str) -> Result<Vec<Ulid>, SqlError> {
        let Some(text) = self.opt_text(column)? else {
            return Ok(Vec::new());
        };
        text.trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("{column}: bad ULID: {e}"))))
            .collect()
    }

    fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>, SqlError> {
        Ok(self.opt_text(column)?.map(|s| parse_date(&s)).transpose()?)
    }

    fn date(&self, column: &'static str) -> Result<NaiveDate, SqlError> {
        self.opt_date(column)?.ok_or_else(|| (self.missing)(column))
    }

    fn window(&self, start: &'static str, end: &'static str) -> Result<TimeWindow, SqlError> {
        Ok(TimeWindow::parse(&self.text(start)?, &self.text(end)?)?)
    }

    fn opt_bool(&self, column: &str) -> Result<Option<bool>, SqlError> {
        self.opt_text(column)?.map(|s| parse_bool(column, &s)).transpose()
    }

    fn bool_or(&self, column: &str, default: bool) -> Result<bool, SqlError> {
        Ok(self.opt_bool(column)?.unwrap_or(default))
    }

    fn opt_u32(&self, column: &str) -> Result<Option<u32>, SqlError> {
        self.opt_text(column)?
            .map(|s| {
                s.trim()
                    .parse::<u32>()
                    .map_err(|e| SqlError::Parse(format!("{column}: bad integer {s:?}: {e}")))
            })
            .transpose()
    }

    fn u32_or(&self, column: &str, default: u32) -> Result<u32, SqlError> {
        Ok(self.opt_u32(column)?.unwrap_or(default))
    }

    fn day_of_week(&self, column: &'static str) -> Result<u8, SqlError> {
        let v = self.opt_u32(column)?.ok_or_else(|| (self.missing)(column))?;
        u8::try_from(v).map_err(|_| SqlError::Parse(format!("{column}: {v} out of range")))
    }
}

fn parse_bool(column: &str, s: &str) -> Result<bool, SqlError> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "on" => Ok(true),
        "false" | "f" | "0" | "no" | "off" => Ok(false),
        _ => Err(SqlError::Parse(format!("{column}: bad bool: {s}"))),
    }
}

fn insert_fields(insert: &ast::Insert, table: &str, defaults: &[&str]) -> Result<Fields, SqlError> {
    let rows = extract_insert_rows(insert)?;
    let [values] = rows else {
        return Err(SqlError::Unsupported(format!("{table}: multi-row INSERT")));
    };
    let columns: Vec<String> = if insert.columns.is_empty() {
        defaults.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|c| c.value.to_lowercase()).collect()
    };
    if columns.len() != values.len() {
        return Err(SqlError::WrongArity(table.to_string(), columns.len(), values.len()));
    }
    if let Some(unknown) = columns.iter().find(|c| !defaults.contains(&c.as_str())) {
        return Err(SqlError::UnknownColumn(format!("{table}.{unknown}")));
    }

    let mut pairs = Vec::with_capacity(values.len());
    for (column, expr) in columns.into_iter().zip(values) {
        pairs.push((column, expr_text(expr)?));
    }
    Ok(Fields::new(pairs, SqlError::MissingColumn))
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(&values.rows)
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

/// Literal as text. Everything arrives as text once `$n` parameters are substituted.
fn expr_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => match value {
            Value::Null => Ok(None),
            Value::SingleQuotedString(s) | Value::Number(s, _) => Ok(Some(s.clone())),
            Value::Boolean(b) => Ok(Some(b.to_string())),
            other => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        },
        Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => Ok(expr_text(expr)?.map(|s| format!("-{s}"))),
        other => Err(SqlError::Parse(format!("expected a literal, got {other}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(String, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
    BadChannel(String),
    /// A literal that parsed but is not a valid scheduling value.
    Value(EngineError),
}

impl From<EngineError> for SqlError {
    fn from(e: EngineError) -> Self {
        SqlError::Value(e)
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadChannel(c) => write!(f, "invalid channel: {c} (expected professional_{{id}})"),
            SqlError::Value(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SqlError {}
