//! Archive and load raw records.

mod common;

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::time::Duration;
use winsun_market::ingest::parse_records;
use winsun_market::{Granularity, PortalClient, WinsunError};

const OCTOBER: &str = "2026-10-01";

fn count(db: &winsun_market::MarketDb, table: &str) -> i64 {
    db.connection()
        .execute_scalar(&format!("SELECT COUNT(*) FROM {}", table), &[])
        .unwrap()
        .unwrap()
        .as_i64()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

#[test]
fn archive_round_trips_text() {
    let (db, tmp) = common::setup_sample_db();
    let archive = db.archive();

    let path = archive
        .write("[]", Granularity::Week, "202641", "sale")
        .unwrap();
    assert_eq!(path, tmp.path().join("week_sale").join("202641.json"));
    assert_eq!(archive.load(Granularity::Week, "202641", "sale").unwrap(), "[]");
}

#[test]
fn archive_reads_gzipped_copies() {
    let (db, tmp) = common::setup_sample_db();

    let dir = tmp.path().join("month_book");
    std::fs::create_dir_all(&dir).unwrap();
    let file = std::fs::File::create(dir.join(format!("{}.json.gz", OCTOBER))).unwrap();
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(r#"[{"板块": "城中"}]"#.as_bytes()).unwrap();
    gz.finish().unwrap();

    let text = db.archive().load(Granularity::Month, OCTOBER, "book").unwrap();
    assert_eq!(text, r#"[{"板块": "城中"}]"#);
}

#[test]
fn missing_archive_is_not_found() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db.archive().load(Granularity::Week, "202641", "sold");
    assert!(matches!(err, Err(WinsunError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// parse_records
// ---------------------------------------------------------------------------

#[test]
fn parse_records_reads_an_array_of_objects() {
    let records = parse_records(r#"[{"板块": "城中", "面积": 12.5}, {"板块": "河西"}]"#).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["面积"], 12.5);
}

#[test]
fn parse_records_rejects_non_arrays() {
    assert!(matches!(
        parse_records(r#"{"板块": "城中"}"#),
        Err(WinsunError::Json(_))
    ));
}

// ---------------------------------------------------------------------------
// replay / insert
// ---------------------------------------------------------------------------

#[test]
fn replay_inserts_archived_records() {
    let (db, _tmp) = common::setup_sample_db();
    let text = r#"[
        {"年月": "2026-10-01", "功能": "高层住宅", "板块": "城中", "面积": 120.5, "金额": 3000000, "件数": 1, "开发商": "ignored"},
        {"年月": "2026-10-01 00:00:00", "功能": "高层住宅", "板块": "河西", "面积": 90, "金额": 2500000, "件数": 1}
    ]"#;
    db.archive()
        .write(text, Granularity::Month, OCTOBER, "sold")
        .unwrap();

    let before = count(&db, "month_sold");
    let n = db
        .ingestor(None)
        .replay(Granularity::Month, OCTOBER, "sold")
        .unwrap();
    assert_eq!(n, 2);
    assert_eq!(count(&db, "month_sold"), before + 2);

    let rows = db
        .sql(
            "SELECT \"年月\", \"面积\" FROM month_sold WHERE \"板块\" = ? AND \"年月\" = ?",
            &["河西".to_string(), OCTOBER.to_string()],
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["年月"], OCTOBER);
    assert_eq!(rows[0]["面积"].as_f64(), Some(90.0));
}

#[test]
fn failed_batch_leaves_table_untouched() {
    let (db, _tmp) = common::setup_sample_db();
    // Second record lacks the required month
    let text = r#"[
        {"年月": "2026-10-01", "板块": "城中", "面积": 100},
        {"板块": "河西", "面积": 80}
    ]"#;

    let before = count(&db, "month_sold");
    let result = db.ingestor(None).insert(Granularity::Month, "sold", text);
    assert!(result.is_err());
    assert_eq!(count(&db, "month_sold"), before);
}

#[test]
fn bad_dates_are_rejected_before_inserting() {
    let (db, _tmp) = common::setup_sample_db();
    let text = r#"[{"年月": "2026/10/01", "板块": "城中"}]"#;

    let result = db.ingestor(None).insert(Granularity::Month, "sale", text);
    assert!(matches!(result, Err(WinsunError::InvalidArgument(_))));
    assert_eq!(count(&db, "month_sale"), 2);
}

#[test]
fn inserted_rows_show_up_in_reports() {
    let (db, _tmp) = common::setup_sample_db();
    let text = r#"[{"星期": 202640, "功能": "高层住宅", "板块": "城东", "面积": 7000}]"#;

    db.ingestor(None)
        .insert(Granularity::Week, "sale", text)
        .unwrap();

    let report = db
        .gxj(
            winsun_market::OutputBy::Plate,
            Granularity::Week,
            4,
            winsun_market::FilterCriteria::new(),
        )
        .unwrap()
        .report()
        .unwrap();
    assert_eq!(report.row("城东").unwrap().sale, Some(7000.0));
}

// ---------------------------------------------------------------------------
// Portal
// ---------------------------------------------------------------------------

#[test]
fn fetching_without_a_client_fails() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db
        .ingestor(None)
        .get_write_update(Granularity::Week, "202641", "sold");
    assert!(matches!(err, Err(WinsunError::InvalidArgument(_))));
}

#[test]
fn cookie_must_be_a_valid_header() {
    assert!(PortalClient::new("PHPSESSID=abc\n", Duration::from_secs(5)).is_err());
    assert!(PortalClient::new("PHPSESSID=abc", Duration::from_secs(5)).is_ok());
}
