//! Pure parsers for duration tokens and item URLs.
//!
//! Both functions are total: they never panic and never return an error.

use std::sync::OnceLock;

use regex::Regex;

static DURATION_RE: OnceLock<Regex> = OnceLock::new();
static ITEM_ID_RES: OnceLock<Vec<Regex>> = OnceLock::new();

fn duration_re() -> &'static Regex {
    DURATION_RE.get_or_init(|| {
        Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("static duration regex")
    })
}

fn item_id_res() -> &'static [Regex] {
    ITEM_ID_RES.get_or_init(|| {
        [
            r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#/]+)",
            r"youtube\.com/(?:v|shorts|live)/([^&\n?#/]+)",
            r"youtube\.com/watch\?(?:.*&)?v=([^&\n?#/]+)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static item id regex"))
        .collect()
    })
}

/// Parse a compact duration token ("PT1H2M3S") into whole seconds.
///
/// Every unit is optional. A token without the `PT` designator yields 0.
/// Components too large for `u64` saturate.
pub fn parse_duration(token: &str) -> u64 {
    let Some(caps) = duration_re().captures(token) else {
        return 0;
    };

    let unit = |idx: usize| -> u64 {
        caps.get(idx)
            .map(|m| m.as_str().parse::<u64>().unwrap_or(u64::MAX))
            .unwrap_or(0)
    };

    unit(1)
        .saturating_mul(3600)
        .saturating_add(unit(2).saturating_mul(60))
        .saturating_add(unit(3))
}

/// Format seconds as `H:MM:SS` (or `M:SS` under an hour)
pub fn format_seconds(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Extract the item id from a short-link, watch, or embed URL
pub fn extract_item_id(url: &str) -> Option<String> {
    item_id_res()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
