use chrono::NaiveDate;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject,
    Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertRoomType(NewRoomType),
    InsertRoom(NewRoom),
    InsertGuest(NewGuest),
    InsertReservations(Vec<NewReservation>),
    InsertInvoice(NewInvoice),
    UpdateRoomStatus { id: RoomId, status: RoomStatus },
    SelectAvailability(SearchRequest),
    SelectRoomTypes,
    SelectRooms,
    SelectGuests,
    SelectReservations,
    SelectInvoices,
}

/// Parse a single statement. Anything after the first statement is ignored.
pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let stmts = parse_statements(sql)?;
    parse_statement(&stmts[0])
}

/// Parse every `;`-separated statement, as sent by a simple query.
pub fn parse_batch(sql: &str) -> Result<Vec<Command>, SqlError> {
    parse_statements(sql)?.iter().map(parse_statement).collect()
}

fn parse_statements(sql: &str) -> Result<Vec<Statement>, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    Ok(stmts)
}

fn parse_statement(stmt: &Statement) -> Result<Command, SqlError> {
    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(&table.relation, assignments, selection),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;

    match table.as_str() {
        "room_types" => {
            let values = extract_insert_values(insert)?;
            if values.len() < 5 {
                return Err(SqlError::WrongArity("room_types", 5, values.len()));
            }
            Ok(Command::InsertRoomType(NewRoomType {
                id: parse_i64_or_null(&values[0])?,
                name: parse_string(&values[1])?,
                description: parse_string_or_null(&values[2])?,
                capacity: parse_u32(&values[3])?,
                price_per_night: parse_f64(&values[4])?,
            }))
        }
        "rooms" => {
            let values = extract_insert_values(insert)?;
            if values.len() < 3 {
                return Err(SqlError::WrongArity("rooms", 3, values.len()));
            }
            let status = match values.get(3) {
                Some(expr) => parse_status_or_null(expr)?.unwrap_or(RoomStatus::Available),
                None => RoomStatus::Available,
            };
            let floor = match values.get(4) {
                Some(expr) => parse_i64_or_null(expr)?
                    .map(|f| i32::try_from(f).map_err(|_| SqlError::Parse(format!("{f} out of i32 range"))))
                    .transpose()?,
                None => None,
            };
            Ok(Command::InsertRoom(NewRoom {
                id: parse_i64_or_null(&values[0])?,
                room_number: parse_string(&values[1])?,
                room_type_id: parse_i64(&values[2])?,
                status,
                floor,
            }))
        }
        "guests" => {
            let values = extract_insert_values(insert)?;
            if values.len() < 4 {
                return Err(SqlError::WrongArity("guests", 4, values.len()));
            }
            let phone = match values.get(4) {
                Some(expr) => parse_string_or_null(expr)?,
                None => None,
            };
            Ok(Command::InsertGuest(NewGuest {
                id: parse_i64_or_null(&values[0])?,
                first_name: parse_string(&values[1])?,
                last_name: parse_string(&values[2])?,
                email: parse_string(&values[3])?,
                phone,
            }))
        }
        "reservations" => {
            let all_rows = extract_all_insert_rows(insert)?;
            let mut reservations = Vec::with_capacity(all_rows.len());
            for (i, row) in all_rows.iter().enumerate() {
                let reservation =
                    parse_reservation_row(row).map_err(|e| match e {
                        SqlError::Parse(msg) if all_rows.len() > 1 => {
                            SqlError::Parse(format!("row {i}: {msg}"))
                        }
                        other => other,
                    })?;
                reservations.push(reservation);
            }
            Ok(Command::InsertReservations(reservations))
        }
        "invoices" => {
            let values = extract_insert_values(insert)?;
            if values.len() < 3 {
                return Err(SqlError::WrongArity("invoices", 3, values.len()));
            }
            Ok(Command::InsertInvoice(NewInvoice {
                id: parse_i64_or_null(&values[0])?,
                reservation_id: parse_i64(&values[1])?,
                total_amount: parse_f64(&values[2])?,
            }))
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_reservation_row(row: &[Expr]) -> Result<NewReservation, SqlError> {
    if row.len() < 5 {
        return Err(SqlError::WrongArity("reservations", 5, row.len()));
    }
    let status = match row.get(5) {
        Some(expr) => parse_reservation_status_or_null(expr)?.unwrap_or(ReservationStatus::Confirmed),
        None => ReservationStatus::Confirmed,
    };
    Ok(NewReservation {
        id: parse_i64_or_null(&row[0])?,
        guest_id: parse_i64(&row[1])?,
        room_id: parse_i64(&row[2])?,
        check_in: parse_date(&row[3])?,
        check_out: parse_date(&row[4])?,
        status,
    })
}

fn parse_update(
    relation: &TableFactor,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(relation)?;
    if table != "rooms" {
        return Err(SqlError::UnknownTable(table));
    }

    let mut status = None;
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name),
            _ => None,
        };
        match column.as_deref() {
            Some("status") => status = Some(parse_room_status(&assignment.value)?),
            Some(other) => {
                return Err(SqlError::Unsupported(format!("UPDATE rooms SET {other}")));
            }
            None => return Err(SqlError::Parse("unsupported assignment target".into())),
        }
    }

    Ok(Command::UpdateRoomStatus {
        id: extract_where_id(selection)?,
        status: status.ok_or(SqlError::MissingFilter("status"))?,
    })
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    match table.as_str() {
        "availability" => {
            let mut filters = AvailabilityFilters::default();
            if let Some(selection) = &select.selection {
                extract_availability_filters(selection, &mut filters)?;
            }
            Ok(Command::SelectAvailability(SearchRequest {
                check_in: filters.check_in.ok_or(SqlError::MissingFilter("check_in"))?,
                check_out: filters.check_out.ok_or(SqlError::MissingFilter("check_out"))?,
                guest_count: filters.guests.ok_or(SqlError::MissingFilter("guests"))?,
            }))
        }
        "room_types" => Ok(Command::SelectRoomTypes),
        "rooms" => Ok(Command::SelectRooms),
        "guests" => Ok(Command::SelectGuests),
        "reservations" => Ok(Command::SelectReservations),
        "invoices" => Ok(Command::SelectInvoices),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Default)]
struct AvailabilityFilters {
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    guests: Option<i64>,
}

fn extract_availability_filters(expr: &Expr, filters: &mut AvailabilityFilters) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_availability_filters(left, filters)?;
                extract_availability_filters(right, filters)?;
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("check_in" | "check_in_date") => filters.check_in = Some(parse_date(right)?),
                Some("check_out" | "check_out_date") => filters.check_out = Some(parse_date(right)?),
                Some("guests" | "guest_count") => filters.guests = Some(parse_i64_expr(right)?),
                _ => {}
            },
            _ => {}
        },
        Expr::Nested(inner) => extract_availability_filters(inner, filters)?,
        _ => {}
    }
    Ok(())
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

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let mut rows = extract_all_insert_rows(insert)?;
    if rows.len() > 1 {
        return Err(SqlError::Unsupported("multi-row INSERT for this table".into()));
    }
    Ok(rows.swap_remove(0))
}

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<i64, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_i64_expr(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn is_null(expr: &Expr) -> bool {
    matches!(extract_value(expr), Some(Value::Null))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s}: {e}"))),
            Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer '{s}': {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    parse_i64_expr(expr)
}

fn parse_i64_or_null(expr: &Expr) -> Result<Option<i64>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        Ok(Some(parse_i64_expr(expr)?))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad decimal {s}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        parse_string(expr).map(Some)
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    s.trim()
        .parse()
        .map_err(|e| SqlError::Parse(format!("bad date '{s}': {e}")))
}

fn parse_room_status(expr: &Expr) -> Result<RoomStatus, SqlError> {
    parse_string(expr)?.parse().map_err(SqlError::Parse)
}

fn parse_status_or_null(expr: &Expr) -> Result<Option<RoomStatus>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        parse_room_status(expr).map(Some)
    }
}

fn parse_reservation_status_or_null(expr: &Expr) -> Result<Option<ReservationStatus>, SqlError> {
    if is_null(expr) {
        Ok(None)
    } else {
        parse_string(expr)?.parse().map(Some).map_err(SqlError::Parse)
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
