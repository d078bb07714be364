use std::path::PathBuf;

pub const PORTAL_URL: &str = "http://winsun.house365.com";
pub const DATA_URL: &str = "http://winsun.house365.com/sys/dataout/data";

/// Reports run on or before this day of the month describe the previous month.
pub const MONTH_ROLLOVER_DAY: u32 = 25;

/// Raw tables fetched per period: listings, subscriptions, sales.
pub const MARKET_TABLES: [&str; 3] = ["sale", "book", "sold"];

/// Record fields stored as DATE columns; scraped as `YYYY-MM-DD` strings.
pub const DATE_FIELDS: [&str; 4] = ["年月", "perdate", "start_date", "end_date"];

// ---------------------------------------------------------------------------
// Usage categories (功能)
// ---------------------------------------------------------------------------

pub const ZHUZHAI: [&str; 3] = ["多层住宅", "高层住宅", "小高层住宅"];
pub const BIESHU: [&str; 4] = ["叠加别墅", "独立别墅", "双拼别墅", "联排别墅"];
pub const GONGYU: [&str; 2] = ["挑高公寓办公", "平层公寓办公"];
pub const XIEZILOU: [&str; 2] = ["乙级办公", "甲级办公"];
pub const SHANGYE: [&str; 5] = ["底商商业", "专业市场商业", "集中商业", "街区商业", "其它商业"];

/// Commercial housing: apartments plus villas.
pub fn spzz() -> Vec<&'static str> {
    ZHUZHAI.iter().chain(BIESHU.iter()).copied().collect()
}

/// Every office subtype.
pub fn bangong() -> Vec<&'static str> {
    GONGYU
        .iter()
        .chain(XIEZILOU.iter())
        .copied()
        .chain(std::iter::once("其它办公"))
        .collect()
}

// ---------------------------------------------------------------------------
// Zones (板块)
// ---------------------------------------------------------------------------

/// Zone name as it appears in older records, and its current name.
pub const LEGACY_ZONE: (&str, &str) = ("仙西", "仙林");

/// Every administrative district, in reporting order, with current names.
pub const QUANSHI: [&str; 12] = [
    "城中",
    "城东",
    "城南",
    "河西",
    "城北",
    "仙林",
    "江宁",
    "浦口",
    "江北新区直管区",
    "六合",
    "溧水",
    "高淳",
];

/// Districts excluding 溧水 and 高淳.
pub fn buhanligao() -> &'static [&'static str] {
    &QUANSHI[..QUANSHI.len() - 2]
}

/// Districts excluding 溧水, 高淳 and 六合.
pub fn buhanligaolu() -> &'static [&'static str] {
    &QUANSHI[..QUANSHI.len() - 3]
}

/// Map a legacy zone name onto its current name; other names pass through.
pub fn normalize_zone(name: &str) -> &str {
    if name == LEGACY_ZONE.0 {
        LEGACY_ZONE.1
    } else {
        name
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

pub const DEFAULT_DATABASE_FILE: &str = "winsun.duckdb";

pub fn default_data_root() -> PathBuf {
    if let Some(data) = dirs::data_dir() {
        data.join("winsun-market")
    } else {
        PathBuf::from(".winsun-market")
    }
}

pub fn default_database_path() -> PathBuf {
    default_data_root().join(DEFAULT_DATABASE_FILE)
}
