use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
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
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::VacancyAuthSource;
use crate::engine::EngineError;
use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::store::StoreError;
use crate::tenant::{Property, TenantManager};

pub struct VacancyHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<VacancyQueryParser>,
}

impl VacancyHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(VacancyQueryParser),
        }
    }

    async fn resolve_property<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Property>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager
            .get_or_create(&db)
            .await
            .map_err(|e| user_error("08006", format!("property error: {e}")))
    }

    /// Parse, run and record metrics for one statement.
    async fn run(&self, property: &Property, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(parse_failed)?;
        self.run_command(property, cmd).await
    }

    /// Run every statement of a simple query in order, stopping at the first failure.
    async fn run_batch(&self, property: &Property, query: &str) -> PgWireResult<Vec<Response>> {
        let cmds = sql::parse_batch(query).map_err(parse_failed)?;
        let mut responses = Vec::with_capacity(cmds.len());
        for cmd in cmds {
            responses.push(self.run_command(property, cmd).await?);
        }
        Ok(responses)
    }

    async fn run_command(&self, property: &Property, cmd: Command) -> PgWireResult<Response> {
        let label = command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(property, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        result
    }

    async fn execute_command(&self, property: &Property, cmd: Command) -> PgWireResult<Response> {
        let store = property.store();
        match cmd {
            Command::InsertRoomType(new) => {
                store.add_room_type(new).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertRoom(new) => {
                store.add_room(new).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertGuest(new) => {
                store.add_guest(new).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::InsertReservations(batch) => {
                let ids = store.record_reservations(batch).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(ids.len())))
            }
            Command::InsertInvoice(new) => {
                store.issue_invoice(new).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
            }
            Command::UpdateRoomStatus { id, status } => {
                store.set_room_status(id, status).await.map_err(store_err)?;
                Ok(Response::Execution(Tag::new("UPDATE").with_rows(1)))
            }
            Command::SelectAvailability(request) => {
                // One snapshot for the whole search.
                let snapshot = store.snapshot().await;
                let available = property
                    .engine()
                    .search_available(snapshot.as_ref(), &request)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(availability_schema());
                let rows: Vec<PgWireResult<_>> = available
                    .iter()
                    .map(|rt| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rt.id)?;
                        encoder.encode_field(&rt.name)?;
                        encoder.encode_field(&rt.description)?;
                        encoder.encode_field(&(rt.capacity as i32))?;
                        encoder.encode_field(&rt.price_per_night)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
            Command::SelectRoomTypes => {
                let snapshot = store.snapshot().await;
                let schema = Arc::new(room_types_schema());
                let rows: Vec<PgWireResult<_>> = snapshot
                    .room_types()
                    .map(|rt| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&rt.id)?;
                        encoder.encode_field(&rt.name)?;
                        encoder.encode_field(&rt.description)?;
                        encoder.encode_field(&(rt.capacity as i32))?;
                        encoder.encode_field(&rt.price_per_night)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
            Command::SelectRooms => {
                let snapshot = store.snapshot().await;
                let schema = Arc::new(rooms_schema());
                let rows: Vec<PgWireResult<_>> = snapshot
                    .rooms()
                    .map(|room| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&room.id)?;
                        encoder.encode_field(&room.room_number)?;
                        encoder.encode_field(&room.room_type_id)?;
                        encoder.encode_field(&room.status.as_str())?;
                        encoder.encode_field(&room.floor)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
            Command::SelectGuests => {
                let snapshot = store.snapshot().await;
                let schema = Arc::new(guests_schema());
                let rows: Vec<PgWireResult<_>> = snapshot
                    .guests()
                    .map(|g| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&g.id)?;
                        encoder.encode_field(&g.first_name)?;
                        encoder.encode_field(&g.last_name)?;
                        encoder.encode_field(&g.email)?;
                        encoder.encode_field(&g.phone)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
            Command::SelectReservations => {
                let snapshot = store.snapshot().await;
                let schema = Arc::new(reservations_schema());
                let mut reservations: Vec<&Reservation> = snapshot.reservations().iter().collect();
                reservations.sort_by_key(|r| r.id);
                let rows: Vec<PgWireResult<_>> = reservations
                    .into_iter()
                    .map(|r| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&r.id)?;
                        encoder.encode_field(&r.guest_id)?;
                        encoder.encode_field(&r.room_id)?;
                        encoder.encode_field(&r.stay.check_in.to_string())?;
                        encoder.encode_field(&r.stay.check_out.to_string())?;
                        encoder.encode_field(&r.status.as_str())?;
                        encoder.encode_field(&r.created_at.to_rfc3339())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
            Command::SelectInvoices => {
                let snapshot = store.snapshot().await;
                let schema = Arc::new(invoices_schema());
                let rows: Vec<PgWireResult<_>> = snapshot
                    .invoices()
                    .map(|i| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&i.id)?;
                        encoder.encode_field(&i.reservation_id)?;
                        encoder.encode_field(&i.total_amount)?;
                        encoder.encode_field(&i.issued_at.to_rfc3339())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(query_response(schema, rows))
            }
        }
    }
}

fn query_response(
    schema: Arc<Vec<FieldInfo>>,
    rows: Vec<PgWireResult<pgwire::messages::data::DataRow>>,
) -> Response {
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

// ── Result schemas ───────────────────────────────────────────────

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("name", Type::VARCHAR),
        field("description", Type::VARCHAR),
        field("capacity", Type::INT4),
        field("price_per_night", Type::FLOAT8),
    ]
}

fn room_types_schema() -> Vec<FieldInfo> {
    availability_schema()
}

fn rooms_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("room_number", Type::VARCHAR),
        field("room_type_id", Type::INT8),
        field("status", Type::VARCHAR),
        field("floor", Type::INT4),
    ]
}

fn guests_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("first_name", Type::VARCHAR),
        field("last_name", Type::VARCHAR),
        field("email", Type::VARCHAR),
        field("phone", Type::VARCHAR),
    ]
}

fn reservations_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("guest_id", Type::INT8),
        field("room_id", Type::INT8),
        field("check_in", Type::VARCHAR),
        field("check_out", Type::VARCHAR),
        field("status", Type::VARCHAR),
        field("created_at", Type::VARCHAR),
    ]
}

fn invoices_schema() -> Vec<FieldInfo> {
    vec![
        field("id", Type::INT8),
        field("reservation_id", Type::INT8),
        field("total_amount", Type::FLOAT8),
        field("issued_at", Type::VARCHAR),
    ]
}

/// Result columns for a statement that may still carry `$n` placeholders.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.trim_start().starts_with("SELECT") {
        return vec![];
    }
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("ROOM_TYPES") {
        room_types_schema()
    } else if upper.contains("ROOMS") {
        rooms_schema()
    } else if upper.contains("GUESTS") {
        guests_schema()
    } else if upper.contains("RESERVATIONS") {
        reservations_schema()
    } else if upper.contains("INVOICES") {
        invoices_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for VacancyHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let property = self.resolve_property(client).await?;
        self.run_batch(&property, query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct VacancyQueryParser;

#[async_trait]
impl QueryParser for VacancyQueryParser {
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
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for VacancyHandler {
    type Statement = String;
    type QueryParser = VacancyQueryParser;

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
        let property = self.resolve_property(client).await?;
        let sql = substitute_params(portal);
        self.run(&property, &sql).await
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
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
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
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Substitute `$1`, `$2`, ... with bound text parameters as quoted literals.
/// Highest index first so `$1` never clobbers the prefix of `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    substitute_text_params(&portal.statement.statement, &portal.parameters)
}

fn substitute_text_params<B: AsRef<[u8]>>(sql: &str, params: &[Option<B>]) -> String {
    let mut result = sql.to_string();
    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct VacancyFactory {
    handler: Arc<VacancyHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<VacancyAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl VacancyFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = VacancyAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(VacancyHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for VacancyFactory {
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

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = Arc::new(VacancyFactory::new(tenant_manager, password));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

fn sqlstate_for_store(e: &StoreError) -> &'static str {
    match e {
        StoreError::AlreadyExists { .. } => "23505",
        StoreError::MissingReference { .. } => "23503",
        StoreError::NotFound { .. } => "P0002",
        StoreError::LimitExceeded(_) => "54000",
        StoreError::Invalid(_) => "22023",
        StoreError::WalError(_) => "58000",
    }
}

fn sqlstate_for_engine(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_) => "22023",
        EngineError::DataAccess(store) => sqlstate_for_store(store),
    }
}

fn store_err(e: StoreError) -> PgWireError {
    user_error(sqlstate_for_store(&e), e.to_string())
}

/// Validation failures carry just the `field: message` pairs.
fn engine_err(e: EngineError) -> PgWireError {
    let message = match &e {
        EngineError::Validation(errors) => errors.to_string(),
        EngineError::DataAccess(_) => e.to_string(),
    };
    user_error(sqlstate_for_engine(&e), message)
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}

fn parse_failed(e: SqlError) -> PgWireError {
    metrics::counter!(QUERIES_TOTAL, "command" => "unparsed", "status" => "error").increment(1);
    sql_err(e)
}
