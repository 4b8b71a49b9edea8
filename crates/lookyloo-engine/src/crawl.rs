//! URL checks and link discovery for multi-page captures.

use std::net::IpAddr;

use scraper::{Html, Selector};
use url::Url;

use lookyloo_common::error::{LookylooError, Result};

/// Parse a user-supplied URL, defaulting to `http://` when no scheme is given.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(LookylooError::InvalidUrl("empty URL".to_string()));
    }
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&candidate).map_err(|e| LookylooError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(LookylooError::InvalidUrl(raw.to_string())),
    }
}

/// Whether an address is publicly routable.
pub fn is_global(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
                // shared address space, 100.64.0.0/10
                || (a == 100 && (b & 0b1100_0000) == 64)
                || a == 0
                || a >= 240)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_global(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // link local fe80::/10
                || (first & 0xffc0) == 0xfe80
                // documentation 2001:db8::/32
                || (first == 0x2001 && v6.segments()[1] == 0x0db8))
        }
    }
}

/// Refuse URLs whose host resolves to any non-global address.
pub async fn ensure_global(url: &Url) -> Result<()> {
    let host = url
        .host_str()
        .ok_or_else(|| LookylooError::InvalidUrl(url.to_string()))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| LookylooError::InvalidUrl(format!("cannot resolve {host}: {e}")))?
        .map(|sa| sa.ip())
        .collect();

    if addrs.is_empty() || addrs.iter().any(|ip| !is_global(*ip)) {
        return Err(LookylooError::NonGlobalTarget(host.to_string()));
    }
    Ok(())
}

/// Same-site links of a rendered page, in document order, without duplicates.
pub fn same_site_links(base: &Url, html: &str, limit: usize) -> Vec<Url> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut links: Vec<Url> = Vec::new();
    for href in document.select(&selector).filter_map(|a| a.value().attr("href")) {
        if links.len() >= limit {
            break;
        }
        let Ok(mut link) = base.join(href) else { continue };
        link.set_fragment(None);
        if link.host_str() != base.host_str() || !matches!(link.scheme(), "http" | "https") {
            continue;
        }
        if link == *base || links.contains(&link) {
            continue;
        }
        links.push(link);
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_added() {
        assert_eq!(normalize_url("circl.lu").unwrap().as_str(), "http://circl.lu/");
        assert_eq!(normalize_url(" https://circl.lu/x ").unwrap().as_str(), "https://circl.lu/x");
    }

    #[test]
    fn test_bad_urls_rejected() {
        assert!(normalize_url("").is_err());
        assert!(normalize_url("ftp://example.com").is_err());
        assert!(normalize_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_global_addresses() {
        for ip in ["10.1.2.3", "192.168.0.1", "127.0.0.1", "169.254.1.1", "100.64.0.1", "::1", "fd00::1", "::ffff:10.0.0.1"] {
            assert!(!is_global(ip.parse().unwrap()), "{ip} should not be global");
        }
        for ip in ["8.8.8.8", "185.194.93.14", "2a00:1450:4001::200e"] {
            assert!(is_global(ip.parse().unwrap()), "{ip} should be global");
        }
    }

    #[tokio::test]
    async fn test_loopback_target_refused() {
        let url = normalize_url("http://127.0.0.1:8000/").unwrap();
        assert!(matches!(ensure_global(&url).await, Err(LookylooError::NonGlobalTarget(_))));
    }

    #[test]
    fn test_links_same_site_only() {
        let base = Url::parse("https://example.com/news/").unwrap();
        let html = r##"
            <a href="item1.html">one</a>
            <a href="/about#team">about</a>
            <a href="/about">about again</a>
            <a href="https://other.org/">elsewhere</a>
            <a href="mailto:x@example.com">mail</a>
            <a href="#top">top</a>
        "##;
        let links: Vec<String> = same_site_links(&base, html, 10).iter().map(Url::to_string).collect();
        assert_eq!(links, vec!["https://example.com/news/item1.html", "https://example.com/about"]);
    }

    #[test]
    fn test_links_limited() {
        let base = Url::parse("https://example.com/").unwrap();
        let html = r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#;
        assert_eq!(same_site_links(&base, html, 2).len(), 2);
    }
}
