//! Static table of forecast indicators and the pages they are read from.
//!
//! Every per-category difference (sensor name, icon, which page, which
//! fragment shape) lives here; the extractors and publisher are generic.

use crate::config::PageLayout;

/// DOM fragment shape an indicator is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    /// `gauge` value + `cond` phrase, today at 0, tomorrow at 1.
    Gauge,
    /// `aq-number` / `category-text` / `statement`, today at 0, tomorrow at 2.
    AirQuality,
}

/// One fetched page, cached under `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSet {
    pub key: &'static str,
    /// Path segment after the location, e.g. `allergies-weather`.
    pub page: &'static str,
    /// `name=` query selecting one category on a multi-category page.
    pub query: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    /// Record key in the embedded forecast literal.
    pub key: &'static str,
    /// Sensor name part: `sensor.<prefix>_<slug>_<day>`.
    pub slug: &'static str,
    /// Attribute name part: `<day>_<attr>_value`.
    pub attr: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub fragment: Fragment,
    /// Cache key of the per-indicator page (DOM layout).
    pub dom_set: &'static str,
    /// Cache key of the shared page (script layout).
    pub script_set: &'static str,
}

impl Indicator {
    pub fn set_key(&self, layout: PageLayout) -> &'static str {
        match layout {
            PageLayout::Dom => self.dom_set,
            PageLayout::Script => self.script_set,
        }
    }
}

const fn set(key: &'static str, page: &'static str, query: Option<&'static str>) -> IndicatorSet {
    IndicatorSet { key, page, query }
}

pub const DOM_SETS: &[IndicatorSet] = &[
    set("asthma", "asthma-weather", None),
    set("arthritis", "arthritis-weather", None),
    set("migraine", "migraine-weather", None),
    set("sinus", "sinus-weather", None),
    set("air", "air-quality-index", None),
    set("ragweed", "allergies-weather", Some("ragweed-pollen")),
    set("grass", "allergies-weather", Some("grass-pollen")),
    set("tree", "allergies-weather", Some("tree-pollen")),
    set("mold", "allergies-weather", Some("mold")),
    set("dust", "allergies-weather", Some("dust-dander")),
    set("cold", "cold-flu-weather", Some("common-cold")),
    set("flu", "cold-flu-weather", Some("flu")),
];

pub const SCRIPT_SETS: &[IndicatorSet] = &[
    set("allergies", "allergies-weather", None),
    set("coldflu", "cold-flu-weather", None),
    set("asthma", "asthma-weather", None),
    set("arthritis", "arthritis-weather", None),
    set("migraine", "migraine-weather", None),
    set("sinus", "sinus-weather", None),
];

macro_rules! indicator {
    ($key:expr, $slug:expr, $attr:expr, $label:expr, $icon:expr, $frag:ident, $dom:expr, $script:expr) => {
        Indicator {
            key: $key,
            slug: $slug,
            attr: $attr,
            label: $label,
            icon: $icon,
            fragment: Fragment::$frag,
            dom_set: $dom,
            script_set: $script,
        }
    };
}

pub const INDICATORS: &[Indicator] = &[
    indicator!("ragweed-pollen", "ragweed_pollen", "ragweed", "Ragweed Pollen", "mdi:clover", Gauge, "ragweed", "allergies"),
    indicator!("grass-pollen", "grass_pollen", "grass", "Grass Pollen", "mdi:barley", Gauge, "grass", "allergies"),
    indicator!("tree-pollen", "tree_pollen", "tree", "Tree Pollen", "mdi:tree-outline", Gauge, "tree", "allergies"),
    indicator!("mold", "mold", "mold", "Mold", "mdi:bacteria-outline", Gauge, "mold", "allergies"),
    indicator!("dust-dander", "dust", "dust", "Dust", "mdi:cloud-search-outline", Gauge, "dust", "allergies"),
    indicator!("air-quality", "air", "air", "Air Quality", "mdi:air-purifier", AirQuality, "air", "allergies"),
    indicator!("common-cold", "common_cold", "common", "Common Cold", "mdi:snowflake-alert", Gauge, "cold", "coldflu"),
    indicator!("flu", "flu", "flu", "Flu", "mdi:bacteria", Gauge, "flu", "coldflu"),
    indicator!("asthma", "asthma", "asthma", "Asthma", "mdi:lungs", Gauge, "asthma", "asthma"),
    indicator!("arthritis", "arthritis", "arthritis", "Arthritis", "mdi:bone", Gauge, "arthritis", "arthritis"),
    indicator!("migraine", "migraine", "migraine", "Migraine", "mdi:head-flash", Gauge, "migraine", "migraine"),
    indicator!("sinus", "sinus", "sinus", "Sinus", "mdi:head-remove-outline", Gauge, "sinus", "sinus"),
];

pub fn sets_for(layout: PageLayout) -> &'static [IndicatorSet] {
    match layout {
        PageLayout::Dom => DOM_SETS,
        PageLayout::Script => SCRIPT_SETS,
    }
}

/// Indicators read from the set cached under `set_key`, in table order.
pub fn indicators_in(layout: PageLayout, set_key: &str) -> impl Iterator<Item = &'static Indicator> + '_ {
    INDICATORS.iter().filter(move |i| i.set_key(layout) == set_key)
}
