use std::net::SocketAddr;

use crate::sql::Command;

// ── Search metrics ──────────────────────────────────────────────

/// Counter: availability searches. Labels: outcome (ok, empty, invalid, error).
pub const SEARCHES_TOTAL: &str = "vacancy_searches_total";

/// Histogram: end-to-end search latency in seconds, validated searches only.
pub const SEARCH_DURATION_SECONDS: &str = "vacancy_search_duration_seconds";

/// Histogram: room types returned per search.
pub const SEARCH_RESULTS: &str = "vacancy_search_results";

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "vacancy_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "vacancy_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "vacancy_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "vacancy_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "vacancy_connections_rejected_total";

/// Gauge: number of loaded properties.
pub const PROPERTIES_ACTIVE: &str = "vacancy_properties_active";

/// Counter: startup/auth failures.
pub const AUTH_FAILURES_TOTAL: &str = "vacancy_auth_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "vacancy_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "vacancy_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
///
/// A failed install is logged and the server keeps running without metrics.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus exporter on {addr}: {e}"),
    }
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoomType(_) => "insert_room_type",
        Command::InsertRoom(_) => "insert_room",
        Command::InsertGuest(_) => "insert_guest",
        Command::InsertReservations(rows) if rows.len() > 1 => "batch_insert_reservations",
        Command::InsertReservations(_) => "insert_reservation",
        Command::InsertInvoice(_) => "insert_invoice",
        Command::UpdateRoomStatus { .. } => "update_room_status",
        Command::SelectAvailability(_) => "select_availability",
        Command::SelectRoomTypes => "select_room_types",
        Command::SelectRooms => "select_rooms",
        Command::SelectGuests => "select_guests",
        Command::SelectReservations => "select_reservations",
        Command::SelectInvoices => "select_invoices",
    }
}
