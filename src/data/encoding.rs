use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use super::error::DataError;
use super::parser;
use crate::config::Settings;

// ---------------------------------------------------------------------------
// Decoded text
// ---------------------------------------------------------------------------

/// Text decoded from raw bytes plus the label of the encoding that won.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Decode `bytes` with the first candidate encoding that yields plausible,
/// non-garbled delimited text.
///
/// Candidates decode strictly, so a malformed byte sequence just moves on to
/// the next label. A candidate whose only fault is a low CJK share (a CJK
/// header over numeric rows) is held back and used if no candidate is clean.
/// After that an auto-detect pass (BOM sniff, otherwise lossy UTF-8) runs if
/// enabled; its output must still pass the hard garbling checks.
pub fn resolve(bytes: &[u8], settings: &Settings) -> Result<Decoded, DataError> {
    let mut sparse: Option<Decoded> = None;
    for label in &settings.encoding_candidates {
        match try_candidate(bytes, label) {
            Verdict::Clean(decoded) => {
                log::info!("Decoded {} bytes as {}", bytes.len(), decoded.label);
                return Ok(decoded);
            }
            Verdict::SparseCjk(decoded) => {
                if sparse.is_none() {
                    sparse = Some(decoded);
                }
            }
            Verdict::Rejected => {}
        }
    }

    if let Some(decoded) = sparse {
        log::info!(
            "Decoded {} bytes as {} (little CJK text outside the header)",
            bytes.len(),
            decoded.label
        );
        return Ok(decoded);
    }

    if settings.auto_detect_fallback {
        let (text, label) = auto_detect(bytes);
        if is_plausible_table(&text) && !has_hard_garbling(&text) {
            log::warn!("All candidate encodings failed, falling back to {label}");
            return Ok(Decoded {
                text: text.into_owned(),
                label,
            });
        }
        log::debug!("{label}: output is garbled or not a table");
    }

    Err(DataError::EncodingUnresolved {
        tried: settings.encoding_candidates.join(", "),
    })
}

/// Outcome of decoding with one candidate label.
enum Verdict {
    Clean(Decoded),
    /// Strictly decoded and plausible; only the CJK-ratio check failed.
    SparseCjk(Decoded),
    Rejected,
}

fn try_candidate(bytes: &[u8], label: &str) -> Verdict {
    let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
        log::warn!("Unknown encoding label '{label}', skipping");
        return Verdict::Rejected;
    };

    let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) else {
        log::debug!("{label}: malformed byte sequence");
        return Verdict::Rejected;
    };

    if has_hard_garbling(&text) {
        log::debug!("{label}: decoded text looks garbled");
        return Verdict::Rejected;
    }
    if !is_plausible_table(&text) {
        log::debug!("{label}: decoded text has no usable fields");
        return Verdict::Rejected;
    }

    let decoded = Decoded {
        text: text.into_owned(),
        label: label.to_string(),
    };
    // Hard garbling is ruled out above, so only the CJK share can trip this.
    if looks_garbled(&decoded.text) {
        log::debug!("{label}: CJK share is suspiciously low");
        Verdict::SparseCjk(decoded)
    } else {
        Verdict::Clean(decoded)
    }
}

/// BOM sniffing for UTF-8 / UTF-16, otherwise UTF-8 with replacement characters.
fn auto_detect(bytes: &[u8]) -> (Cow<'_, str>, String) {
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));
    let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
    if had_errors {
        log::warn!("auto-detect: {} decode replaced malformed bytes", encoding.name());
    }
    (text, format!("auto-detect ({})", encoding.name()))
}

/// At least one non-blank line whose fields contain something non-empty.
pub fn is_plausible_table(text: &str) -> bool {
    let text = text.trim_start_matches('\u{feff}');
    text.lines()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| parser::parse_line(line).ok())
        .is_some_and(|fields| fields.iter().any(|f| !f.is_empty()))
}

// ---------------------------------------------------------------------------
// Garbled-text heuristics
// ---------------------------------------------------------------------------

const ACCENT_RUNS: [(&str, usize); 3] = [("àáâãäåæçèéêë", 4), ("ÄÖÜ", 3), ("âêîôû", 3)];

const CJK_SAMPLE_CHARS: usize = 200;
const CJK_MIN_TEXT_CHARS: usize = 100;

fn is_latin1_supplement(c: char) -> bool {
    ('\u{00C0}'..='\u{00FF}').contains(&c)
}

fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Whether `text` contains `min` or more consecutive chars satisfying `pred`.
fn has_run(text: &str, min: usize, pred: impl Fn(char) -> bool) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if pred(c) {
            run += 1;
            if run >= min {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Heuristic verdict on whether `text` was decoded with the wrong encoding.
pub fn looks_garbled(text: &str) -> bool {
    has_hard_garbling(text) || cjk_ratio_suspicious(text)
}

/// Empty text, replacement-character pairs, Latin-1 runs or accent runs.
fn has_hard_garbling(text: &str) -> bool {
    text.is_empty()
        || text.contains("\u{FFFD}\u{FFFD}")
        || has_run(text, 5, is_latin1_supplement)
        || ACCENT_RUNS
            .iter()
            .any(|(set, min)| has_run(text, *min, |c| set.contains(c)))
}

/// The prefix promises CJK content but almost none of the body is CJK.
fn cjk_ratio_suspicious(text: &str) -> bool {
    let total = text.chars().count();
    if total <= CJK_MIN_TEXT_CHARS {
        return false;
    }
    if !text.chars().take(CJK_SAMPLE_CHARS).any(is_cjk) {
        return false;
    }
    let cjk = text.chars().filter(|&c| is_cjk(c)).count();
    (cjk as f64) / (total as f64) < 0.01
}

/// Cell-level check used to count suspect rows after parsing.
pub fn is_suspect_cell(text: &str) -> bool {
    text.contains('\u{FFFD}') || has_run(text, 3, is_latin1_supplement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_run_is_garbled() {
        assert!(looks_garbled("name,city\nÃÂÃÂÃ,x"));
        assert!(!looks_garbled("name,city\nÃÂÃÂ,x"));
    }

    #[test]
    fn test_replacement_pair_is_garbled() {
        assert!(looks_garbled("a,b\n\u{FFFD}\u{FFFD},c"));
        assert!(!looks_garbled("a,b\n\u{FFFD}x,c"));
    }

    #[test]
    fn test_accent_runs_are_garbled() {
        assert!(looks_garbled("a,àáâã"));
        assert!(looks_garbled("a,ÄÖÜ"));
        assert!(!looks_garbled("café,crème"));
    }

    #[test]
    fn test_cjk_ratio_heuristic() {
        let mut text = String::from("城,");
        text.push_str(&"x".repeat(300));
        assert!(looks_garbled(&text));

        let mut plain = String::from("city,");
        plain.push_str(&"x".repeat(300));
        assert!(!looks_garbled(&plain));

        assert!(!looks_garbled("城市,数量\n上海,3"));
    }

    #[test]
    fn test_empty_text_is_garbled() {
        assert!(looks_garbled(""));
    }

    #[test]
    fn test_resolve_prefers_utf8() {
        let decoded = resolve("城市,数量\n上海,3\n".as_bytes(), &Settings::default()).unwrap();
        assert_eq!(decoded.label, "UTF-8");
        assert!(decoded.text.starts_with("城市"));
    }

    #[test]
    fn test_resolve_falls_through_to_gbk() {
        let (bytes, _, _) = encoding_rs::GBK.encode("城市,数量\n上海,3\n北京,5\n");
        let decoded = resolve(&bytes, &Settings::default()).unwrap();
        assert_eq!(decoded.label, "GBK");
        assert_eq!(decoded.text, "城市,数量\n上海,3\n北京,5\n");
    }

    #[test]
    fn test_resolve_utf16_via_auto_detect() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a,b\n1,2\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = resolve(&bytes, &Settings::default()).unwrap();
        assert!(decoded.label.starts_with("auto-detect"));
        assert_eq!(decoded.text, "a,b\n1,2\n");
    }

    #[test]
    fn test_resolve_unresolved_without_fallback() {
        let settings = Settings {
            encoding_candidates: vec!["UTF-8".into()],
            auto_detect_fallback: false,
            ..Settings::default()
        };
        let err = resolve(&[0xFF, 0xFE, 0xFD], &settings).unwrap_err();
        assert!(matches!(err, DataError::EncodingUnresolved { .. }));
    }

    fn cjk_header_numeric_rows() -> String {
        let mut text = String::from("日期,金额\n");
        for i in 0..200 {
            text.push_str(&format!("2024-01-{i:03},{i}\n"));
        }
        text
    }

    #[test]
    fn test_gbk_cjk_header_over_numeric_rows() {
        let text = cjk_header_numeric_rows();
        let (bytes, _, _) = encoding_rs::GBK.encode(&text);
        let decoded = resolve(&bytes, &Settings::default()).unwrap();
        assert_eq!(decoded.label, "GBK");
        assert_eq!(decoded.text, text);
    }

    #[test]
    fn test_utf8_cjk_header_over_numeric_rows() {
        let text = cjk_header_numeric_rows();
        let decoded = resolve(text.as_bytes(), &Settings::default()).unwrap();
        assert_eq!(decoded.label, "UTF-8");
        assert_eq!(decoded.text, text);
    }

    #[test]
    fn test_garbled_auto_detect_output_is_rejected() {
        // Invalid in every candidate; lossy UTF-8 yields a run of U+FFFD.
        let settings = Settings {
            encoding_candidates: vec!["UTF-8".into()],
            ..Settings::default()
        };
        let err = resolve(b"a,\xFF\xFE\xFD\n1,2\n", &settings).unwrap_err();
        assert!(matches!(err, DataError::EncodingUnresolved { .. }));
    }

    #[test]
    fn test_blank_text_is_not_plausible() {
        assert!(!is_plausible_table("  \n\n"));
        assert!(!is_plausible_table("\u{feff}"));
        assert!(is_plausible_table("\u{feff}a,b"));
    }

    #[test]
    fn test_suspect_cell() {
        assert!(is_suspect_cell("ÃÂÃ"));
        assert!(is_suspect_cell("x\u{FFFD}"));
        assert!(!is_suspect_cell("Zürich"));
    }
}
