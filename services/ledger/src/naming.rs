//! Snapshot naming codec and output naming
//!
//! A capture is identified by `<safe-realm>-<YYYYMMDD_HHMMSS>`, e.g.
//! `eu-fordragon-20150301_120000`. On disk the live fetcher stores it as
//! `<id>.json.zst`, the backup bundles store it as `<id>.json`; both decode
//! to the same `SnapshotName`. Ordering is on the decoded (realm, time)
//! pair, never on the raw string.
//!
//! `OutputNaming` renders the names of state files and output streams,
//! optionally bucketed by a chrono pattern of the snapshot time.

use auction_types::ids::Realm;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::fmt;

/// Timestamp layout inside a snapshot identifier.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const ZSTD_SUFFIX: &str = ".json.zst";
const PLAIN_SUFFIX: &str = ".json";

// ── Snapshot Name ───────────────────────────────────────────────────

/// How a snapshot body is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Zstd,
}

impl Encoding {
    pub fn suffix(&self) -> &'static str {
        match self {
            Encoding::Plain => PLAIN_SUFFIX,
            Encoding::Zstd => ZSTD_SUFFIX,
        }
    }

    pub fn other(&self) -> Encoding {
        match self {
            Encoding::Plain => Encoding::Zstd,
            Encoding::Zstd => Encoding::Plain,
        }
    }
}

/// Decoded snapshot identifier: which realm, captured when (UTC, seconds).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotName {
    pub realm: Realm,
    pub captured_at: DateTime<Utc>,
}

impl SnapshotName {
    /// Create a name; sub-second precision is dropped.
    pub fn new(realm: Realm, captured_at: DateTime<Utc>) -> Self {
        let captured_at = captured_at.with_nanosecond(0).unwrap_or(captured_at);
        Self { realm, captured_at }
    }

    /// Decode an identifier or a file name (path prefix and `.json` /
    /// `.json.zst` suffix are ignored).
    pub fn parse(name: &str) -> Option<Self> {
        let base = basename(name);
        let stem = strip_suffix(base).map(|(stem, _)| stem).unwrap_or(base);
        Self::parse_stem(stem)
    }

    /// Decode a physical file name; the suffix is mandatory.
    pub fn parse_file_name(name: &str) -> Option<(Self, Encoding)> {
        let (stem, encoding) = strip_suffix(basename(name))?;
        Self::parse_stem(stem).map(|parsed| (parsed, encoding))
    }

    /// File name for this capture with the given encoding.
    pub fn file_name(&self, encoding: Encoding) -> String {
        format!("{}{}", self, encoding.suffix())
    }

    fn parse_stem(stem: &str) -> Option<Self> {
        let (safe_realm, stamp) = stem.rsplit_once('-')?;
        if stamp.len() != 15 {
            return None;
        }
        let realm = Realm::from_safe_name(safe_realm).ok()?;
        let naive = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            realm,
            captured_at: naive.and_utc(),
        })
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.realm.safe_name(),
            self.captured_at.format(TIMESTAMP_FORMAT)
        )
    }
}

fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn strip_suffix(name: &str) -> Option<(&str, Encoding)> {
    if let Some(stem) = name.strip_suffix(ZSTD_SUFFIX) {
        Some((stem, Encoding::Zstd))
    } else {
        name.strip_suffix(PLAIN_SUFFIX)
            .map(|stem| (stem, Encoding::Plain))
    }
}

/// Sort identifiers by their decoded (realm, time) key. Undecodable
/// identifiers sort last, in string order.
pub fn sort_by_content(names: &mut [String]) {
    names.sort_by_cached_key(|name| {
        let decoded = SnapshotName::parse(name);
        (decoded.is_none(), decoded, name.clone())
    });
}

// ── Output Naming ───────────────────────────────────────────────────

/// Renders state and output file names.
///
/// `name_format` takes `{realm}` and `{name}` placeholders; the timed
/// format is additionally a chrono pattern applied to the snapshot time,
/// so `%Y_%m-{realm}-{name}` splits output by month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    name_format: String,
    timed_name_format: String,
}

impl OutputNaming {
    pub fn new(name_format: impl Into<String>, timed_name_format: impl Into<String>) -> Self {
        Self {
            name_format: name_format.into(),
            timed_name_format: timed_name_format.into(),
        }
    }

    /// Undated name, e.g. `eu-fordragon-state`.
    pub fn name(&self, kind: &str, realm: &Realm) -> String {
        substitute(&self.name_format, kind, realm)
    }

    /// Name bucketed by the snapshot time, e.g. `2015_03-eu-fordragon-auctions`.
    pub fn timed_name(&self, kind: &str, realm: &Realm, at: DateTime<Utc>) -> String {
        let dated = at.format(&self.timed_name_format).to_string();
        substitute(&dated, kind, realm)
    }

    /// Whether `pattern` is a chrono format string chrono can render.
    pub fn is_valid_pattern(pattern: &str) -> bool {
        !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
    }
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self::new("{realm}-{name}", "%Y_%m-{realm}-{name}")
    }
}

fn substitute(format: &str, kind: &str, realm: &Realm) -> String {
    format
        .replace("{realm}", &realm.safe_name())
        .replace("{name}", kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn realm() -> Realm {
        "eu:fordragon".parse().unwrap()
    }

    #[test]
    fn test_encode_identifier() {
        let at = Utc.with_ymd_and_hms(2015, 3, 1, 12, 5, 9).unwrap();
        let name = SnapshotName::new(realm(), at);
        assert_eq!(name.to_string(), "eu-fordragon-20150301_120509");
        assert_eq!(name.file_name(Encoding::Zstd), "eu-fordragon-20150301_120509.json.zst");
    }

    #[test]
    fn test_decode_identifier_and_file_names() {
        let at = Utc.with_ymd_and_hms(2015, 3, 1, 12, 5, 9).unwrap();
        let expected = SnapshotName::new(realm(), at);
        assert_eq!(SnapshotName::parse("eu-fordragon-20150301_120509"), Some(expected.clone()));
        assert_eq!(
            SnapshotName::parse("/data/download/eu-fordragon-20150301_120509.json.zst"),
            Some(expected.clone())
        );
        assert_eq!(
            SnapshotName::parse_file_name("eu-fordragon-20150301_120509.json"),
            Some((expected, Encoding::Plain))
        );
    }

    #[test]
    fn test_decode_dashed_slug() {
        let name = SnapshotName::parse("us-twisting-nether-20150301_120509.json").unwrap();
        assert_eq!(name.realm.to_string(), "us:twisting-nether");
    }

    #[test]
    fn test_reject_ill_formed_names() {
        assert!(SnapshotName::parse("md5sum.txt").is_none());
        assert!(SnapshotName::parse("eu-fordragon-2015.json").is_none());
        assert!(SnapshotName::parse("eu-fordragon-20151301_120509.json").is_none());
        assert!(SnapshotName::parse("fordragon-20150301_120509.json").is_none());
        assert!(SnapshotName::parse_file_name("eu-fordragon-20150301_120509").is_none());
    }

    #[test]
    fn test_new_drops_subseconds() {
        let at = Utc.timestamp_opt(1_425_211_509, 750_000_000).unwrap();
        let name = SnapshotName::new(realm(), at);
        assert_eq!(name.captured_at.timestamp_subsec_nanos(), 0);
        assert_eq!(SnapshotName::parse(&name.to_string()), Some(name));
    }

    #[test]
    fn test_sort_by_content_is_chronological() {
        let mut names = vec![
            "eu-fordragon-20150302_000000".to_string(),
            "junk".to_string(),
            "eu-fordragon-20150301_235959.json".to_string(),
            "eu-ahnqiraj-20150309_000000".to_string(),
        ];
        sort_by_content(&mut names);
        assert_eq!(
            names,
            vec![
                "eu-ahnqiraj-20150309_000000",
                "eu-fordragon-20150301_235959.json",
                "eu-fordragon-20150302_000000",
                "junk",
            ]
        );
    }

    #[test]
    fn test_output_naming() {
        let naming = OutputNaming::default();
        let at = Utc.with_ymd_and_hms(2015, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(naming.name("state", &realm()), "eu-fordragon-state");
        assert_eq!(naming.timed_name("auctions", &realm(), at), "2015_03-eu-fordragon-auctions");
    }

    #[test]
    fn test_pattern_validation() {
        assert!(OutputNaming::is_valid_pattern("%Y_%m-{realm}-{name}"));
        assert!(!OutputNaming::is_valid_pattern("%Q-{name}"));
    }
}
