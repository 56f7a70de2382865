//! Statistical language detection and allowlist gating (spec §4.I).
//!
//! `whatlang` supplies the bundled statistical model; this module only
//! adds the confidence-threshold collapse to `unknown` and the allowlist
//! intersection logic ingest and query both need.

use crate::domain::error::{Error, Result};

/// Sentinel returned when detection confidence is below threshold, or no
/// script-bearing text was present at all.
pub const UNKNOWN: &str = "unknown";

/// Detect the dominant language of `text`, returning an ISO 639-1 code or
/// [`UNKNOWN`] when `whatlang`'s confidence is below `threshold`.
///
/// `whatlang` reports ISO 639-3 (three-letter) codes; [`to_iso_639_1`]
/// narrows those down to the two-letter codes spec.md and the allowlist
/// both speak in.
pub fn detect(text: &str, threshold: f64) -> Vec<String> {
    match whatlang::detect(text) {
        Some(info) if info.confidence() >= threshold => {
            vec![to_iso_639_1(info.lang().code())]
        }
        _ => vec![UNKNOWN.to_string()],
    }
}

/// Map a `whatlang` ISO 639-3 code to its ISO 639-1 equivalent, covering
/// every language `whatlang` can detect. Falls back to the 639-3 code
/// itself for the handful it has no two-letter assignment for.
fn to_iso_639_1(code639_3: &str) -> String {
    const TABLE: &[(&str, &str)] = &[
        ("eng", "en"), ("rus", "ru"), ("cmn", "zh"), ("spa", "es"), ("por", "pt"),
        ("ita", "it"), ("ben", "bn"), ("fra", "fr"), ("deu", "de"), ("ukr", "uk"),
        ("kat", "ka"), ("ara", "ar"), ("hin", "hi"), ("jpn", "ja"), ("heb", "he"),
        ("yid", "yi"), ("pol", "pl"), ("amh", "am"), ("jav", "jv"), ("kor", "ko"),
        ("nob", "nb"), ("dan", "da"), ("swe", "sv"), ("fin", "fi"), ("tur", "tr"),
        ("nld", "nl"), ("hun", "hu"), ("ces", "cs"), ("ell", "el"), ("bul", "bg"),
        ("bel", "be"), ("mar", "mr"), ("kan", "kn"), ("ron", "ro"), ("slv", "sl"),
        ("hrv", "hr"), ("srp", "sr"), ("mkd", "mk"), ("lit", "lt"), ("lav", "lv"),
        ("est", "et"), ("tam", "ta"), ("vie", "vi"), ("urd", "ur"), ("tha", "th"),
        ("guj", "gu"), ("uzb", "uz"), ("pan", "pa"), ("aze", "az"), ("ind", "id"),
        ("tel", "te"), ("pes", "fa"), ("mal", "ml"), ("ori", "or"), ("mya", "my"),
        ("nep", "ne"), ("sin", "si"), ("khm", "km"), ("tuk", "tk"), ("aka", "ak"),
        ("zul", "zu"), ("sna", "sn"), ("afr", "af"), ("lat", "la"), ("slk", "sk"),
        ("cat", "ca"), ("tgl", "tl"), ("hye", "hy"),
    ];
    TABLE
        .iter()
        .find(|(three, _)| *three == code639_3)
        .map(|(_, two)| two.to_string())
        .unwrap_or_else(|| code639_3.to_string())
}

/// Check `detected` languages against `allowlist`. An empty allowlist
/// accepts everything. `unknown` is only accepted if explicitly listed.
pub fn is_allowed(detected: &[String], allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    detected.iter().any(|lang| allowlist.iter().any(|allowed| allowed == lang))
}

/// Detect languages and enforce `allowlist`, returning
/// [`Error::LanguageRejected`] when nothing in `detected` intersects it.
pub fn gate(text: &str, threshold: f64, allowlist: &[String]) -> Result<Vec<String>> {
    let detected = detect(text, threshold);
    if is_allowed(&detected, allowlist) {
        Ok(detected)
    } else {
        Err(Error::LanguageRejected {
            detected,
            allowed: allowlist.to_vec(),
        })
    }
}
