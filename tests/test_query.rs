//! Filter / group plans and range cross-tabulation.

mod common;

use winsun_market::{BucketKind, FilterCriteria, PeriodKey, WinsunError};

fn window() -> FilterCriteria {
    FilterCriteria::new().date_range(PeriodKey::Week(202637), PeriodKey::Week(202640))
}

// ---------------------------------------------------------------------------
// filter
// ---------------------------------------------------------------------------

#[test]
fn unfiltered_query_returns_every_row() {
    let (db, _tmp) = common::setup_sample_db();

    let table = db.query("week_sale").unwrap().execute().unwrap();
    assert_eq!(table.len(), 6);
}

#[test]
fn date_range_is_inclusive() {
    let (db, _tmp) = common::setup_sample_db();

    let table = db
        .query("week_sale")
        .unwrap()
        .filter(&window())
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 5);
}

#[test]
fn month_range_compares_dates() {
    let (db, _tmp) = common::setup_sample_db();

    let criteria = FilterCriteria::new().date_range(
        PeriodKey::Month(chrono::NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()),
        PeriodKey::Month(chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()),
    );
    let table = db
        .query("month_sold")
        .unwrap()
        .filter(&criteria)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn list_criterion_matches_any_value() {
    let (db, _tmp) = common::setup_sample_db();

    let criteria = window().usage(["多层住宅", "集中商业"]);
    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&criteria)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 2);
}

#[test]
fn criteria_are_and_combined() {
    let (db, _tmp) = common::setup_sample_db();

    let criteria = window().usage("高层住宅").plate("城中");
    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&criteria)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.sum("面积"), 18000.0);
}

#[test]
fn current_zone_name_finds_legacy_rows() {
    let (db, _tmp) = common::setup_sample_db();

    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&FilterCriteria::new().plate("仙林"))
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.value(0, "板块").unwrap(), "仙林");
}

#[test]
fn unknown_filter_keys_do_not_restrict_rows() {
    let (db, _tmp) = common::setup_sample_db();

    let criteria = window().with("developer", "someone");
    assert_eq!(criteria.ignored_keys(), ["developer".to_string()]);

    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&criteria)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 5);
}

#[test]
fn filtering_a_missing_column_fails() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db
        .query("acreage")
        .unwrap()
        .filter(&FilterCriteria::new().usage("高层住宅"));
    assert!(matches!(err, Err(WinsunError::UnknownColumn { .. })));
}

#[test]
fn unknown_table_is_not_found() {
    let (db, _tmp) = common::setup_sample_db();

    assert!(matches!(db.query("week_rent"), Err(WinsunError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// group
// ---------------------------------------------------------------------------

#[test]
fn group_sums_per_dimension() {
    let (db, _tmp) = common::setup_sample_db();

    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&window())
        .unwrap()
        .group("星期", ["面积", "金额"])
        .unwrap()
        .execute()
        .unwrap();

    assert_eq!(table.columns, vec!["星期", "面积", "金额"]);
    // 202638 has no rows and is absent
    assert_eq!(table.len(), 3);
    assert_eq!(table.value(0, "星期").unwrap().as_i64(), Some(202637));
    assert_eq!(table.f64(0, "面积"), Some(12000.0));
    assert_eq!(table.f64(0, "金额"), Some(280_000_000.0));
    assert_eq!(table.f64(2, "面积"), Some(10000.0));
}

#[test]
fn group_sums_conserve_the_filtered_total() {
    let (db, _tmp) = common::setup_sample_db();

    let filtered = db.query("week_sold").unwrap().filter(&window()).unwrap();
    let total = filtered.execute().unwrap().sum("金额");
    let grouped = filtered.group("板块", "金额").unwrap().execute().unwrap();
    assert_eq!(grouped.sum("金额"), total);
}

#[test]
fn membership_equals_union_of_equalities() {
    let (db, _tmp) = common::setup_sample_db();

    let rows = |c: FilterCriteria| {
        db.query("week_sale")
            .unwrap()
            .filter(&c)
            .unwrap()
            .execute()
            .unwrap()
            .len()
    };
    let any = rows(window().plate(["城中", "江宁"]));
    assert_eq!(any, rows(window().plate("城中")) + rows(window().plate("江宁")));
    assert_eq!(any, 3);
}

#[test]
fn group_by_several_dimensions() {
    let (db, _tmp) = common::setup_sample_db();

    let table = db
        .query("week_sale")
        .unwrap()
        .filter(&window())
        .unwrap()
        .group(vec!["星期", "板块"], "面积")
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(table.len(), 5);
    assert_eq!(table.columns, vec!["星期", "板块", "面积"]);
}

#[test]
fn legacy_and_current_zone_names_share_a_group() {
    let (db, _tmp) = common::setup_sample_db();
    db.connection()
        .execute_batch(
            "INSERT INTO week_sold VALUES
                (202640, '高层住宅', '仙林', '仙林湖', 'popE', 'prjE', 3000, 25, 45000000, 2, 1, 2)",
        )
        .unwrap();

    let table = db
        .query("week_sold")
        .unwrap()
        .filter(&window())
        .unwrap()
        .group("板块", "面积")
        .unwrap()
        .execute()
        .unwrap();

    let xianlin: Vec<usize> = (0..table.len())
        .filter(|&i| table.value(i, "板块").unwrap() == "仙林")
        .collect();
    assert_eq!(xianlin.len(), 1);
    assert_eq!(table.f64(xianlin[0], "面积"), Some(5000.0));
    assert_eq!(table.len(), 4);
}

#[test]
fn grouping_twice_is_rejected() {
    let (db, _tmp) = common::setup_sample_db();

    let grouped = db
        .query("week_sold")
        .unwrap()
        .group("板块", "面积")
        .unwrap();
    assert!(grouped.group("星期", "面积").is_err());
}

#[test]
fn group_by_unknown_column_fails() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db.query("week_sold").unwrap().group("开发商", "面积");
    assert!(matches!(err, Err(WinsunError::UnknownColumn { .. })));
}

#[test]
fn plans_are_immutable() {
    let (db, _tmp) = common::setup_sample_db();

    let base = db.query("week_sold").unwrap();
    let narrowed = base.filter(&FilterCriteria::new().plate("河西")).unwrap();

    assert_eq!(base.execute().unwrap().len(), 6);
    assert_eq!(narrowed.execute().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// cut
// ---------------------------------------------------------------------------

#[test]
fn cut_pivots_ranges_against_a_dimension() {
    let (db, _tmp) = common::setup_sample_db();

    let tab = db
        .query("week_sold")
        .unwrap()
        .filter(&window())
        .unwrap()
        .group(["面积段", "功能"], "面积")
        .unwrap()
        .cut(BucketKind::Acreage, &[90.0, 144.0], None, Some("功能"))
        .unwrap();

    assert_eq!(tab.index, vec!["90-", "90-144", "144+"]);
    assert_eq!(tab.columns, vec!["多层住宅", "集中商业", "高层住宅"]);
    assert_eq!(tab.get("面积", "90-", "高层住宅"), Some(8000.0));
    assert_eq!(tab.get("面积", "90-144", "高层住宅"), Some(14000.0));
    assert_eq!(tab.get("面积", "90-", "多层住宅"), Some(2000.0));
    assert_eq!(tab.get("面积", "144+", "集中商业"), Some(0.0));
    assert_eq!(tab.get("面积", "144+", "高层住宅"), None);
}

#[test]
fn cut_without_column_totals_each_range() {
    let (db, _tmp) = common::setup_sample_db();

    let tab = db
        .query("week_sold")
        .unwrap()
        .filter(&window())
        .unwrap()
        .group("总价段", ["面积", "金额"])
        .unwrap()
        .cut(BucketKind::TPrice, &[300.0], Some(&["300万以下", "300万以上"]), None)
        .unwrap();

    assert_eq!(tab.columns, vec!["total"]);
    assert_eq!(tab.index, vec!["300万以下", "300万以上"]);
    assert_eq!(tab.get("面积", "300万以下", "total"), Some(2000.0));
    assert_eq!(tab.get("面积", "300万以上", "total"), Some(22000.0));
    assert_eq!(tab.total("金额"), 530_000_000.0);
}

#[test]
fn cut_requires_a_grouped_query() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db
        .query("week_sold")
        .unwrap()
        .cut(BucketKind::Acreage, &[90.0], None, None);
    assert!(matches!(err, Err(WinsunError::InvalidArgument(_))));
}

#[test]
fn cut_rejects_label_count_mismatch() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db
        .query("week_sold")
        .unwrap()
        .group("面积段", "面积")
        .unwrap()
        .cut(BucketKind::Acreage, &[90.0, 144.0], Some(&["small", "large"]), None);
    assert!(matches!(err, Err(WinsunError::InvalidArgument(_))));
}

// ---------------------------------------------------------------------------
// cross
// ---------------------------------------------------------------------------

#[test]
fn cross_tabulates_two_bucket_kinds() {
    let (db, _tmp) = common::setup_sample_db();

    let tab = db
        .query("week_sold")
        .unwrap()
        .filter(&window())
        .unwrap()
        .cross(
            "面积",
            (BucketKind::Acreage, BucketKind::AvePrice),
            &[90.0, 144.0],
            &[20000.0],
        )
        .unwrap();

    assert_eq!(tab.index, vec!["90-", "90-144", "144+"]);
    assert_eq!(tab.columns, vec!["20000-", "20000+"]);
    assert_eq!(tab.get("面积", "90-", "20000-"), Some(10000.0));
    assert_eq!(tab.get("面积", "90-", "20000+"), None);
    assert_eq!(tab.get("面积", "90-144", "20000-"), Some(10000.0));
    assert_eq!(tab.get("面积", "90-144", "20000+"), Some(4000.0));
    assert_eq!(tab.get("面积", "144+", "20000-"), Some(0.0));
    assert_eq!(tab.total("面积"), 24000.0);
}

#[test]
fn cross_needs_two_kinds() {
    let (db, _tmp) = common::setup_sample_db();

    let err = db.query("week_sold").unwrap().cross(
        "面积",
        (BucketKind::Acreage, BucketKind::Acreage),
        &[90.0],
        &[144.0],
    );
    assert!(err.is_err());
}
