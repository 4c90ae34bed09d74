//! Helpers for sanitizing data before it enters tracing span attributes
//! or log lines.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips query string and userinfo from a URL so signed download links and
/// webhook tokens stay out of logs.
///
/// - `https://files.example.com/a.zip?sig=abc` → `https://files.example.com/a.zip`
/// - `https://user:pw@hooks.example.com/x` → `https://****@hooks.example.com/x`
pub fn redact_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    if let Some(scheme_end) = without_query.find("://") {
        let after_scheme = &without_query[scheme_end + 3..];
        let host_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        if let Some(at_pos) = after_scheme[..host_end].find('@') {
            let scheme = &without_query[..scheme_end + 3];
            return format!("{}****@{}", scheme, &after_scheme[at_pos + 1..]);
        }
    }

    without_query.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(Path::new("/tmp/invoicy-abc/factura.pdf")),
            "factura.pdf"
        );
    }

    #[test]
    fn test_redact_path_no_filename() {
        assert_eq!(redact_path(Path::new("/")), "<unknown>");
    }

    #[test]
    fn test_redact_url_drops_query() {
        assert_eq!(
            redact_url("https://files.example.com/a.zip?sig=abc&exp=1"),
            "https://files.example.com/a.zip"
        );
    }

    #[test]
    fn test_redact_url_masks_userinfo() {
        assert_eq!(
            redact_url("https://user:pw@hooks.example.com/x"),
            "https://****@hooks.example.com/x"
        );
    }

    #[test]
    fn test_redact_url_ignores_at_in_path() {
        assert_eq!(
            redact_url("https://example.com/users/@me"),
            "https://example.com/users/@me"
        );
    }
}
