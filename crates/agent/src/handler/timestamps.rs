//! Known timestamp prefixes for multi-line auto-sensing.

use std::sync::LazyLock;

use regex::bytes::Regex;

/// Timestamp shapes commonly found at the head of a log line, in the
/// order they are tried. The first pattern still matching every sampled
/// line becomes the multi-line message boundary.
static TIMESTAMP_FORMATS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // RFC 3339 / ISO 8601
        r"\d+-\d+-\d+T\d+:\d+:\d+(\.\d+)?(Z\d*:?\d*)?",
        // asctime
        r"[A-Za-z_]+ [A-Za-z_]+ +\d+ \d+:\d+:\d+ \d+",
        // Unix date
        r"[A-Za-z_]+ [A-Za-z_]+ +\d+ \d+:\d+:\d+( [A-Za-z_]+ \d+)?",
        // Ruby date
        r"[A-Za-z_]+ [A-Za-z_]+ \d+ \d+:\d+:\d+ [\-\+]\d+ \d+",
        // RFC 822
        r"\d+ [A-Za-z_]+ \d+ \d+:\d+ [A-Za-z_]+",
        // RFC 822 with numeric zone
        r"\d+ [A-Za-z_]+ \d+ \d+:\d+ -\d+",
        // RFC 850
        r"[A-Za-z_]+, \d+-[A-Za-z_]+-\d+ \d+:\d+:\d+ [A-Za-z_]+",
        // RFC 1123
        r"[A-Za-z_]+, \d+ [A-Za-z_]+ \d+ \d+:\d+:\d+ [A-Za-z_]+",
        // RFC 1123 with numeric zone
        r"[A-Za-z_]+, \d+ [A-Za-z_]+ \d+ \d+:\d+:\d+ -\d+",
        // RFC 3339 with fractional seconds and offset
        r"\d+-\d+-\d+[A-Za-z_]+\d+:\d+:\d+\.\d+[A-Za-z_]+\d+:\d+",
        // "2006-01-02 15:04:05" with optional comma-separated millis
        r"\d+-\d+-\d+ \d+:\d+:\d+(,\d+)?",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("built-in timestamp pattern must compile"))
    .collect()
});

/// The built-in catalogue, catalogue order preserved.
pub(crate) fn catalogue() -> &'static [Regex] {
    &TIMESTAMP_FORMATS
}
