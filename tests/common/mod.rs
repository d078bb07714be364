//! Shared test fixtures for the market database integration tests.
//!
//! Provides `setup_sample_db()` which creates an in-memory DuckDB database
//! holding small weekly and monthly record tables plus the three bucket
//! lookup tables, with periods resolved as of 2026-10-16.
//!
//! Week window for 4 periods: 202637 (20260914-20260920) .. 202640
//! (20261005-20261011). Week 202638 has no records; week 202636 lies outside
//! the window. One zone is stored under its legacy name 仙西.

use chrono::NaiveDate;
use std::io::Write;
use tempfile::NamedTempFile;
use winsun_market::{CalendarResolver, Connection, MarketDb};

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

/// Build a `MarketDb` over the sample tables.
///
/// Returns `(MarketDb, tempfile::TempDir)`. The caller must keep the `TempDir`
/// alive for the duration of the test; it is the archive root.
pub fn setup_sample_db() -> (MarketDb, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let conn = Connection::open_in_memory().unwrap();

    // -- record tables --------------------------------------------------------
    create_record_tables(&conn);
    insert_week_records(&conn);
    insert_month_records(&conn);

    // -- bucket lookup tables -------------------------------------------------
    register_lookups(&conn);

    let db = MarketDb::builder()
        .connection(conn)
        .data_root(tmp_dir.path())
        .resolver(CalendarResolver::anchored(today()))
        .build()
        .unwrap();

    (db, tmp_dir)
}

fn create_record_tables(conn: &Connection) {
    let detail = "\"功能\" VARCHAR, \"板块\" VARCHAR, \"片区\" VARCHAR, \
                  popularizename VARCHAR, projectname VARCHAR, \
                  \"面积\" DOUBLE, \"件数\" BIGINT";
    let buckets = "\"金额\" DOUBLE, \"面积段\" BIGINT, \"单价段\" BIGINT, \"总价段\" BIGINT";

    conn.execute_batch(&format!(
        "CREATE TABLE week_sale (\"星期\" BIGINT, {detail});
         CREATE TABLE week_book (\"星期\" BIGINT, {detail});
         CREATE TABLE week_sold (\"星期\" BIGINT, {detail}, {buckets});
         CREATE TABLE month_sale (\"年月\" DATE NOT NULL, {detail});
         CREATE TABLE month_book (\"年月\" DATE NOT NULL, {detail});
         CREATE TABLE month_sold (\"年月\" DATE NOT NULL, {detail}, {buckets});"
    ))
    .unwrap();
}

fn insert_week_records(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO week_sale VALUES
            (202637, '高层住宅', '城中', '新街口', 'popA', 'prjA', 10000, 100),
            (202637, '高层住宅', '河西', '河西南', 'popB', 'prjB', 20000, 180),
            (202639, '多层住宅', '仙西', '仙林湖', 'popC', 'prjC', 5000, 40),
            (202640, '高层住宅', '城中', '新街口', 'popA', 'prjA', 30000, 250),
            (202640, '集中商业', '江宁', '百家湖', 'popD', 'prjD', 8000, 12),
            (202636, '高层住宅', '城中', '新街口', 'popA', 'prjA', 99999, 900);

         INSERT INTO week_sold VALUES
            (202637, '高层住宅', '城中', '新街口', 'popA', 'prjA', 8000, 70, 160000000, 1, 2, 3),
            (202637, '高层住宅', '河西', '河西南', 'popB', 'prjB', 4000, 30, 120000000, 2, 3, 3),
            (202639, '多层住宅', '仙西', '仙林湖', 'popC', 'prjC', 2000, 20, 30000000, 1, 1, 2),
            (202640, '高层住宅', '城中', '新街口', 'popA', 'prjA', 10000, 90, 220000000, 2, 2, 3),
            (202640, '集中商业', '江宁', '百家湖', 'popD', 'prjD', 0, 0, 0, 3, 1, 1),
            (202636, '高层住宅', '城中', '新街口', 'popA', 'prjA', 50000, 400, 900000000, 1, 1, 1);",
    )
    .unwrap();
}

fn insert_month_records(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO month_sale VALUES
            ('2026-08-01', '高层住宅', '城中', '新街口', 'popA', 'prjA', 5000, 50),
            ('2026-09-01', '高层住宅', '河西', '河西南', 'popB', 'prjB', 2000, 20);

         INSERT INTO month_sold VALUES
            ('2026-07-01', '高层住宅', '城中', '新街口', 'popA', 'prjA', 1000, 10, 20000000, 2, 2, 3),
            ('2026-09-01', '高层住宅', '城中', '新街口', 'popA', 'prjA', 3000, 30, 66000000, 2, 2, 3),
            ('2026-10-01', '高层住宅', '城中', '新街口', 'popA', 'prjA', 7777, 77, 99999999, 2, 2, 3);",
    )
    .unwrap();
}

fn register_lookups(conn: &Connection) {
    let acreage = vec![
        serde_json::json!({"id": 1, "label": "90以下", "acreage_low": 0, "acreage_high": 90}),
        serde_json::json!({"id": 2, "label": "90-144", "acreage_low": 90, "acreage_high": 144}),
        serde_json::json!({"id": 3, "label": "144以上", "acreage_low": 144, "acreage_high": 10000}),
    ];
    write_ndjson_and_register(conn, "acreage", &acreage);

    let aveprice = vec![
        serde_json::json!({"id": 1, "label": "1.5万以下", "aveprice_low": 0, "aveprice_high": 15000}),
        serde_json::json!({"id": 2, "label": "1.5-2.5万", "aveprice_low": 15000, "aveprice_high": 25000}),
        serde_json::json!({"id": 3, "label": "2.5万以上", "aveprice_low": 25000, "aveprice_high": 50000}),
    ];
    write_ndjson_and_register(conn, "aveprice", &aveprice);

    let tprice = vec![
        serde_json::json!({"id": 1, "label": "100万以下", "tprice_low": 0, "tprice_high": 1000000}),
        serde_json::json!({"id": 2, "label": "100-300万", "tprice_low": 1000000, "tprice_high": 3000000}),
        serde_json::json!({"id": 3, "label": "300万以上", "tprice_low": 3000000, "tprice_high": 10000000}),
    ];
    write_ndjson_and_register(conn, "tprice", &tprice);
}

/// Write a slice of JSON values as NDJSON to a temp file and register it
/// as a DuckDB table via `Connection::register_table_from_ndjson`.
fn write_ndjson_and_register(conn: &Connection, table_name: &str, rows: &[serde_json::Value]) {
    let mut file = NamedTempFile::new().unwrap();
    for row in rows {
        writeln!(file, "{}", serde_json::to_string(row).unwrap()).unwrap();
    }
    file.flush().unwrap();

    let path = file.path().to_str().unwrap();
    conn.register_table_from_ndjson(table_name, path).unwrap();
}
