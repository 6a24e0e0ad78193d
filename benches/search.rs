use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{Days, NaiveDate, Utc};
use tokio_postgres::{Config, NoTls};

const ROOM_TYPES: i64 = 20;
const ROOMS_PER_TYPE: i64 = 25;
const RESERVATIONS: i64 = 5_000;

async fn connect(host: &str, port: u16, dbname: &str) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(dbname)
        .user("vacancy")
        .password("vacancy");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn day(offset: i64) -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(offset as u64))
        .expect("date out of range")
}

/// A pseudo-random but reproducible search window within the next 300 days.
fn search_sql(i: i64) -> String {
    let start = (i * 37) % 300 + 1;
    let nights = i % 7 + 1;
    let guests = i % 3 + 1;
    format!(
        "SELECT * FROM availability WHERE check_in = '{}' AND check_out = '{}' AND guests = {guests}",
        day(start),
        day(start + nights)
    )
}

async fn setup(client: &tokio_postgres::Client) {
    for t in 1..=ROOM_TYPES {
        client
            .batch_execute(&format!(
                "INSERT INTO room_types (id, name, description, capacity, price_per_night) \
                 VALUES ({t}, 'Type {t}', NULL, {}, {})",
                t % 4 + 1,
                50 + t * 10
            ))
            .await
            .unwrap();
        for r in 0..ROOMS_PER_TYPE {
            let id = t * 100 + r;
            client
                .batch_execute(&format!(
                    "INSERT INTO rooms (id, room_number, room_type_id) VALUES ({id}, '{id}', {t})"
                ))
                .await
                .unwrap();
        }
    }
    client
        .batch_execute(
            "INSERT INTO guests (id, first_name, last_name, email) VALUES (1, 'Bench', 'Guest', 'bench@example.com')",
        )
        .await
        .unwrap();

    // Reservations in multi-row batches
    let total_rooms = ROOM_TYPES * ROOMS_PER_TYPE;
    let mut next = 1;
    while next <= RESERVATIONS {
        let rows: Vec<String> = (next..(next + 500).min(RESERVATIONS + 1))
            .map(|i| {
                let room = (i % ROOM_TYPES + 1) * 100 + (i / ROOM_TYPES) % ROOMS_PER_TYPE;
                let start = (i * 13) % 330;
                format!(
                    "({i}, 1, {room}, '{}', '{}', 'confirmed')",
                    day(start),
                    day(start + i % 5 + 1)
                )
            })
            .collect();
        client
            .batch_execute(&format!(
                "INSERT INTO reservations (id, guest_id, room_id, check_in, check_out, status) VALUES {}",
                rows.join(", ")
            ))
            .await
            .unwrap();
        next += 500;
    }

    println!(
        "  loaded {ROOM_TYPES} room types, {total_rooms} rooms, {RESERVATIONS} reservations"
    );
}

async fn phase1_sequential(host: &str, port: u16, db: &str) {
    let client = connect(host, port, db).await;
    let n = 2_000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();
    for i in 0..n as i64 {
        let t = Instant::now();
        client.simple_query(&search_sql(i)).await.unwrap();
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    println!(
        "  {n} searches in {:.2}s = {:.0} searches/sec",
        elapsed.as_secs_f64(),
        n as f64 / elapsed.as_secs_f64()
    );
    print_latency("search", &mut latencies);
}

async fn phase2_concurrent(host: &str, port: u16, db: &str) {
    let clients = 32;
    let per_client = 250;
    let start = Instant::now();
    let mut handles = Vec::with_capacity(clients);
    for c in 0..clients {
        let host = host.to_string();
        let db = db.to_string();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port, &db).await;
            let mut latencies = Vec::with_capacity(per_client);
            for i in 0..per_client as i64 {
                let t = Instant::now();
                client
                    .simple_query(&search_sql(c as i64 * 1_000 + i))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }
    let mut all = Vec::with_capacity(clients * per_client);
    for h in handles {
        all.extend(h.await.unwrap());
    }
    let elapsed = start.elapsed();
    println!(
        "  {clients} clients x {per_client} searches in {:.2}s = {:.0} searches/sec",
        elapsed.as_secs_f64(),
        all.len() as f64 / elapsed.as_secs_f64()
    );
    print_latency("search (concurrent)", &mut all);
}

async fn phase3_search_under_load(host: &str, port: u16, db: &str) {
    let next_id = Arc::new(AtomicI64::new(RESERVATIONS + 1));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let writer = {
        let host = host.to_string();
        let db = db.to_string();
        let next_id = next_id.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let client = connect(&host, port, &db).await;
            let mut written = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let room = (id % ROOM_TYPES + 1) * 100 + id % ROOMS_PER_TYPE;
                let start = id % 300;
                let sql = format!(
                    "INSERT INTO reservations (id, guest_id, room_id, check_in, check_out) \
                     VALUES ({id}, 1, {room}, '{}', '{}')",
                    day(start),
                    day(start + 2)
                );
                if client.batch_execute(&sql).await.is_ok() {
                    written += 1;
                }
            }
            written
        })
    };

    let client = connect(host, port, db).await;
    let mut latencies = Vec::with_capacity(1_000);
    for i in 0..1_000 {
        let t = Instant::now();
        client.simple_query(&search_sql(i)).await.unwrap();
        latencies.push(t.elapsed());
    }
    stop.store(true, Ordering::Relaxed);
    let written = writer.await.unwrap();
    println!("  {written} reservations written during the run");
    print_latency("search (under write load)", &mut latencies);
}

#[tokio::main]
async fn main() {
    let host = std::env::var("VACANCY_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("VACANCY_PORT")
        .unwrap_or_else(|_| "5433".into())
        .parse()
        .expect("invalid VACANCY_PORT");

    println!("=== vacancy search benchmark ===");
    println!("target: {host}:{port}\n");

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let db = format!("bench_{nanos}");

    println!("[setup]");
    let setup_client = connect(&host, port, &db).await;
    setup(&setup_client).await;
    drop(setup_client);

    println!("\n[phase 1] sequential search latency");
    phase1_sequential(&host, port, &db).await;

    println!("\n[phase 2] concurrent search throughput");
    phase2_concurrent(&host, port, &db).await;

    println!("\n[phase 3] search latency under write load");
    phase3_search_under_load(&host, port, &db).await;

    println!("\n=== benchmark complete ===");
}
