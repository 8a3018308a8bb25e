//! Language-to-region resolution
//!
//! Users declare a system language, not a location; the map buckets them by
//! the region conventionally associated with that language. Resolution is a
//! pure lookup over a fixed table. Unknown languages resolve to `None` and
//! are excluded from regional stats by the callers; this is a deliberate
//! data-completeness gap, not an error.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable descriptor of a geographic bucket on the map
///
/// Identity is the canonical `name`; two descriptors with the same name are
/// the same region regardless of the other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Canonical region key, e.g. "Japan"
    pub name: String,
    /// Localized display name shown in the dashboard UI
    pub display_name: String,
    /// Marker latitude
    pub lat: f64,
    /// Marker longitude
    pub lng: f64,
}

impl PartialEq for RegionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RegionDescriptor {}

impl RegionDescriptor {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        lat: f64,
        lng: f64,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            lat,
            lng,
        }
    }
}

macro_rules! region {
    ($name:expr, $display:expr, $lat:expr, $lng:expr) => {
        RegionDescriptor::new($name, $display, $lat, $lng)
    };
}

/// Static language -> region table
///
/// Mirrors the in-game language selector. Several languages intentionally
/// map to the same region ("Chinese" and "ChineseSimplified" both bucket
/// into China).
static LANGUAGE_TO_REGION: Lazy<HashMap<&'static str, RegionDescriptor>> = Lazy::new(|| {
    HashMap::from([
        ("ChineseSimplified", region!("China", "中国", 35.86, 104.19)),
        ("ChineseTraditional", region!("Taiwan", "台湾", 23.69, 120.96)),
        ("Chinese", region!("China", "中国", 35.86, 104.19)),
        ("English", region!("USA", "アメリカ", 37.09, -95.71)),
        ("Japanese", region!("Japan", "日本", 36.20, 138.25)),
        ("Russian", region!("Russia", "ロシア", 61.52, 105.31)),
        ("Korean", region!("South Korea", "韓国", 35.90, 127.76)),
        ("Spanish", region!("Spain", "スペイン", 40.46, -3.74)),
        ("French", region!("France", "フランス", 46.22, 2.21)),
        ("Portuguese", region!("Brazil", "ブラジル", -14.23, -51.92)),
        ("German", region!("Germany", "ドイツ", 51.16, 10.45)),
        ("Italian", region!("Italy", "イタリア", 41.87, 12.56)),
        ("Polish", region!("Poland", "ポーランド", 51.91, 19.14)),
        ("Ukrainian", region!("Ukraine", "ウクライナ", 48.37, 31.16)),
        ("Thai", region!("Thailand", "タイ", 15.87, 100.99)),
        ("Turkish", region!("Turkey", "トルコ", 38.96, 35.24)),
        ("Vietnamese", region!("Vietnam", "ベトナム", 14.05, 108.27)),
        ("Hungarian", region!("Hungary", "ハンガリー", 47.16, 19.50)),
        ("Norwegian", region!("Norway", "ノルウェー", 60.47, 8.46)),
        ("Finnish", region!("Finland", "フィンランド", 61.92, 25.74)),
        ("Czech", region!("Czech Republic", "チェコ", 49.81, 15.47)),
        ("Arabic", region!("Saudi Arabia", "サウジアラビア", 23.88, 45.07)),
        ("Dutch", region!("Netherlands", "オランダ", 52.13, 5.29)),
        ("Greek", region!("Greece", "ギリシャ", 39.07, 21.82)),
        ("Swedish", region!("Sweden", "スウェーデン", 60.12, 18.64)),
        ("Lithuanian", region!("Lithuania", "リトアニア", 55.16, 23.88)),
        ("Latvian", region!("Latvia", "ラトビア", 56.87, 24.60)),
        ("Slovak", region!("Slovakia", "スロバキア", 48.66, 19.69)),
        ("SerboCroatian", region!("Serbia", "セルビア", 44.01, 21.00)),
        ("Belarusian", region!("Belarus", "ベラルーシ", 53.71, 27.95)),
    ])
});

/// Resolve a declared language identifier to its region
///
/// Returns `None` for identifiers outside the table; callers exclude those
/// users from regional stats.
pub fn resolve_region(language: &str) -> Option<&'static RegionDescriptor> {
    LANGUAGE_TO_REGION.get(language)
}
