//! Server-URL normalization (§4.4 "URL normalization"): prevents storage-key
//! aliasing between e.g. `https://MCP.EXAMPLE.COM:443/api/` and
//! `https://mcp.example.com/api`.

use url::Url;

/// Lowercases the host, strips the scheme's default port, and drops a
/// trailing slash from the path. Idempotent:
/// `normalize(normalize(u)) == normalize(u)`.
#[must_use]
pub fn normalize(input: &str) -> String {
    let Ok(mut url) = Url::parse(input) else {
        return input.trim_end_matches('/').to_lowercase();
    };

    if let Some(host) = url.host_str() {
        let lowered = host.to_lowercase();
        let _ = url.set_host(Some(&lowered));
    }

    let is_default_port = matches!(
        (url.scheme(), url.port()),
        ("https", Some(443)) | ("http", Some(80))
    );
    if is_default_port {
        let _ = url.set_port(None);
    }

    if url.path().ends_with('/') && url.path() != "/" {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    url.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_host_strips_default_port_and_trailing_slash() {
        assert_eq!(
            normalize("https://MCP.EXAMPLE.COM:443/api/"),
            "https://mcp.example.com/api"
        );
    }

    #[test]
    fn idempotent() {
        let once = normalize("https://MCP.EXAMPLE.COM:443/api/");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn preserves_non_default_port() {
        assert_eq!(normalize("http://localhost:8080/mcp"), "http://localhost:8080/mcp");
    }

    #[test]
    fn root_path_keeps_single_slash() {
        assert_eq!(normalize("https://example.com/"), "https://example.com/");
    }
}
