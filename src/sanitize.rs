use lazy_static::lazy_static;
use regex::Regex;

/// Label used whenever a report type cannot be used as-is.
pub const UNKNOWN_TYPE: &str = "unknown";

lazy_static! {
    // Anchored on both ends: a partial match must never pass.
    static ref SAFE_SEGMENT: Regex = Regex::new(r"^[A-Za-z0-9._-]*$").unwrap();
}

/// True if `raw` only contains letters, digits, `.`, `_` and `-`.
pub fn is_safe_segment(raw: &str) -> bool {
    SAFE_SEGMENT.is_match(raw)
}

/// Returns `raw` when it is safe to interpolate into a metric line and a
/// directory name, `"unknown"` otherwise.
///
/// This is the only thing standing between attacker-controlled report fields
/// and the forensic tree, so it rejects rather than repairs.
pub fn sanitize(raw: &str) -> String {
    if is_safe_segment(raw) {
        raw.to_string()
    } else {
        UNKNOWN_TYPE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_types_pass_through() {
        for raw in [
            "crash.oom",
            "network-error.dns.failed",
            "deprecation.xhr-sync",
            "tls.cert.ct",
            "csp_violation",
            "ABC123",
        ] {
            assert_eq!(sanitize(raw), raw);
        }
    }

    #[test]
    fn test_empty_string_is_safe() {
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_unsafe_types_collapse_to_unknown() {
        for raw in [
            "/etc/passwd",
            "../../tmp",
            "a b",
            "; rm -rf",
            "crash\nnel,type=forged,value=1",
            "type=x,value=9",
            "ünïcode",
            "tab\there",
        ] {
            assert_eq!(sanitize(raw), UNKNOWN_TYPE, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn test_dot_segments_only_checked_for_charset() {
        // Dot-only segments are remapped by the forensic writer.
        assert!(is_safe_segment(".."));
        assert!(!is_safe_segment("../x"));
    }

    #[test]
    fn test_trailing_newline_rejected() {
        assert!(!is_safe_segment("crash.oom\n"));
    }
}
