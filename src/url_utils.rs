//! URL Canonicalization
//!
//! Normalizes raw asset references found in markup into absolute URLs that serve
//! as deduplication keys, and classifies whether a URL looks like an image asset.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::options::{CanonicalizeOptions, DEFAULT_IMAGE_FORMATS};
use crate::patterns::{ASSET_PATH, FILE_EXTENSION};
use crate::{Error, Result};

/// A normalized absolute URL (or pass-through `data:` URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    #[must_use]
    pub fn is_data(&self) -> bool {
        is_data_uri(&self.0)
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip surrounding whitespace and one pair of matching quotes.
fn trim_quotes(raw: &str) -> &str {
    let s = raw.trim();
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}

fn is_data_uri(s: &str) -> bool {
    s.get(..5).is_some_and(|p| p.eq_ignore_ascii_case("data:"))
}

/// Canonicalize a raw URL reference.
///
/// Relative references resolve against `options.base_url`; protocol-relative ones
/// take its scheme (`https` without a base). The result is idempotent: feeding a
/// canonical URL back in returns it unchanged.
///
/// # Errors
///
/// [`Error::InvalidUrl`] for empty input, unparseable references, non-http(s)
/// schemes, hostless URLs, and `data:` URIs when they are disallowed.
///
/// # Examples
///
/// ```
/// use rs_mediasweep::url_utils::canonicalize;
/// use rs_mediasweep::CanonicalizeOptions;
///
/// let options = CanonicalizeOptions {
///     base_url: url::Url::parse("https://example.com/gallery/").ok(),
///     force_https: true,
///     ..CanonicalizeOptions::default()
/// };
/// let url = canonicalize("//cdn.example.com/a.jpg", &options)?;
/// assert_eq!(url.as_str(), "https://cdn.example.com/a.jpg");
/// # Ok::<(), rs_mediasweep::Error>(())
/// ```
pub fn canonicalize(raw: &str, options: &CanonicalizeOptions) -> Result<CanonicalUrl> {
    let s = trim_quotes(raw);

    if s.is_empty() {
        return Err(Error::InvalidUrl("empty URL".to_string()));
    }

    if is_data_uri(s) {
        return if options.allow_data_urls {
            Ok(CanonicalUrl(s.to_string()))
        } else {
            Err(Error::InvalidUrl("data URIs are not allowed".to_string()))
        };
    }

    let base = options.base_url.as_ref();
    let parsed = if s.starts_with("//") {
        let scheme = base.map_or("https", Url::scheme);
        Url::parse(&format!("{scheme}:{s}"))
    } else if let Some(base) = base {
        base.join(s)
    } else {
        Url::parse(s)
    };

    let mut url = parsed.map_err(|e| Error::InvalidUrl(format!("{s}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!("{s}: unsupported scheme")));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(format!("{s}: missing host")));
    }

    if options.force_https && url.scheme() == "http" {
        // http -> https is always a permitted scheme change
        let _ = url.set_scheme("https");
    }

    if options.strip_fragment {
        url.set_fragment(None);
    }

    if options.strip_query {
        url.set_query(None);
    } else if options.sort_query {
        sort_query(&mut url);
    }

    if options.strip_trailing_slash {
        let path = url.path().to_string();
        let trimmed = path.trim_end_matches('/');
        if path.len() > 1 && trimmed.len() < path.len() {
            url.set_path(if trimmed.is_empty() { "/" } else { trimmed });
        }
    }

    Ok(CanonicalUrl(url.to_string()))
}

/// Sort query parameters by key; equal keys keep their relative order.
fn sort_query(url: &mut Url) {
    match url.query() {
        None => return,
        Some("") => {
            url.set_query(None);
            return;
        }
        Some(_) => {}
    }

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Lowercase format of an asset URL: the path extension, or the subtype of a
/// `data:` URI (`data:image/svg+xml,...` gives `svg`).
#[must_use]
pub fn asset_format(url: &str) -> Option<String> {
    let url = url.trim();

    if is_data_uri(url) {
        let mime = data_mime(url)?;
        let subtype = mime.split('/').nth(1)?;
        let subtype = subtype.split('+').next().unwrap_or(subtype);
        return (!subtype.is_empty()).then(|| subtype.to_ascii_lowercase());
    }

    let filename = extract_filename(url);
    FILE_EXTENSION
        .captures(&filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

fn data_mime(url: &str) -> Option<&str> {
    let rest = url.get(5..)?;
    let end = rest.find([';', ',']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Whether a URL plausibly points at an image asset.
///
/// True when the extension is in `allowed_formats` (the default image set when
/// empty), when the path contains a known asset directory such as `/images/`, or
/// for `data:` URIs with an `image/*` MIME type.
#[must_use]
pub fn is_likely_asset<S: AsRef<str>>(url: &str, allowed_formats: &[S]) -> bool {
    let url = url.trim();

    if is_data_uri(url) {
        return data_mime(url).is_some_and(|m| m.to_ascii_lowercase().starts_with("image/"));
    }

    if let Some(format) = asset_format(url) {
        let allowed = if allowed_formats.is_empty() {
            DEFAULT_IMAGE_FORMATS.contains(&format.as_str())
        } else {
            allowed_formats
                .iter()
                .any(|f| f.as_ref().eq_ignore_ascii_case(&format))
        };
        if allowed {
            return true;
        }
    }

    let path = Url::parse(url).map_or_else(|_| url.to_string(), |u| u.path().to_string());
    ASSET_PATH.is_match(&path)
}

/// Key under which per-site data (inferred selectors) is cached: the host.
#[must_use]
pub fn site_key(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

/// Key identifying one page for detection caching: host plus path.
#[must_use]
pub fn page_key(url: &Url) -> String {
    format!("{}{}", site_key(url), url.path())
}

/// Extract filename from a URL, stripping query parameters and fragments.
///
/// # Examples
/// ```
/// use rs_mediasweep::url_utils::extract_filename;
///
/// assert_eq!(extract_filename("https://example.com/images/photo.jpg?v=1"), "photo.jpg");
/// assert_eq!(extract_filename("/path/to/image.png#section"), "image.png");
/// assert_eq!(extract_filename("https://example.com/"), "");
/// ```
#[must_use]
pub fn extract_filename(url: &str) -> String {
    let url = url.trim();
    let without_query = url.split(['?', '#']).next().unwrap_or(url);

    let filename = without_query.rsplit('/').next().unwrap_or("").trim();

    if filename.is_empty() || filename == "." || filename == ".." {
        return String::new();
    }

    filename.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(base: &str) -> CanonicalizeOptions {
        CanonicalizeOptions {
            base_url: Url::parse(base).ok(),
            ..CanonicalizeOptions::default()
        }
    }

    fn canon(raw: &str, options: &CanonicalizeOptions) -> String {
        canonicalize(raw, options)
            .map(CanonicalUrl::into_string)
            .unwrap_or_else(|e| panic!("canonicalize({raw}) failed: {e}"))
    }

    #[test]
    fn test_relative_resolution() {
        let options = opts("https://example.com/articles/page.html");
        assert_eq!(canon("b.png", &options), "https://example.com/articles/b.png");
        assert_eq!(canon("/root/c.png", &options), "https://example.com/root/c.png");
        assert_eq!(canon("../d.png", &options), "https://example.com/d.png");
    }

    #[test]
    fn test_protocol_relative_uses_page_scheme() {
        let options = opts("http://example.com/");
        assert_eq!(canon("//cdn.example.com/a.jpg", &options), "http://cdn.example.com/a.jpg");

        let https = CanonicalizeOptions {
            force_https: true,
            ..opts("https://example.com/")
        };
        assert_eq!(canon("//cdn.example.com/a.jpg", &https), "https://cdn.example.com/a.jpg");
    }

    #[test]
    fn test_force_https_upgrades() {
        let options = CanonicalizeOptions {
            force_https: true,
            ..CanonicalizeOptions::default()
        };
        assert_eq!(canon("http://example.com/a.jpg", &options), "https://example.com/a.jpg");
    }

    #[test]
    fn test_quotes_and_whitespace_trimmed() {
        let options = opts("https://example.com/");
        assert_eq!(canon("  'x/y.png'  ", &options), "https://example.com/x/y.png");
        assert_eq!(canon("\"z.gif\"", &options), "https://example.com/z.gif");
    }

    #[test]
    fn test_empty_and_bad_schemes_rejected() {
        let options = opts("https://example.com/");
        assert!(canonicalize("", &options).is_err());
        assert!(canonicalize("   ''  ", &options).is_err());
        assert!(canonicalize("javascript:void(0)", &options).is_err());
        assert!(canonicalize("mailto:a@example.com", &options).is_err());
        assert!(canonicalize("relative.png", &CanonicalizeOptions::default()).is_err());
    }

    #[test]
    fn test_data_uri_passthrough() {
        let data = "data:image/png;base64,iVBORw0KGgo=";
        assert_eq!(canon(data, &CanonicalizeOptions::default()), data);

        let strict = CanonicalizeOptions {
            allow_data_urls: false,
            ..CanonicalizeOptions::default()
        };
        assert!(canonicalize(data, &strict).is_err());
    }

    #[test]
    fn test_query_and_fragment_handling() {
        let options = opts("https://example.com/");
        assert_eq!(
            canon("https://example.com/a.jpg?z=1&a=2#top", &options),
            "https://example.com/a.jpg?a=2&z=1"
        );

        let stripped = CanonicalizeOptions {
            strip_query: true,
            ..opts("https://example.com/")
        };
        assert_eq!(canon("https://example.com/a.jpg?z=1", &stripped), "https://example.com/a.jpg");
        assert_eq!(canon("https://example.com/a.jpg?", &options), "https://example.com/a.jpg");
    }

    #[test]
    fn test_trailing_slash() {
        let options = CanonicalizeOptions::default();
        assert_eq!(canon("https://example.com/photos/", &options), "https://example.com/photos");
        assert_eq!(canon("https://example.com/", &options), "https://example.com/");
        assert_eq!(canon("https://example.com/photos//", &options), "https://example.com/photos");
    }

    #[test]
    fn test_idempotent() {
        let options = CanonicalizeOptions {
            force_https: true,
            ..opts("http://example.com/dir/")
        };
        for raw in [
            "a.jpg",
            "/img/b.png?size=large&crop=1",
            "//cdn.example.com/c.webp#frag",
            "http://Example.COM/d/",
            "https://example.com/e%20f.jpg?q=a+b",
            "data:image/gif;base64,R0lGOD==",
        ] {
            let once = canon(raw, &options);
            let twice = canon(&once, &options);
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_is_likely_asset() {
        let none: &[&str] = &[];
        assert!(is_likely_asset("https://example.com/a.JPG", none));
        assert!(is_likely_asset("https://example.com/images/12345", none));
        assert!(is_likely_asset("https://example.com/media/view?id=1", none));
        assert!(is_likely_asset("data:image/png;base64,AAA", none));
        assert!(!is_likely_asset("data:text/html,hello", none));
        assert!(!is_likely_asset("https://example.com/page.html", none));
        assert!(!is_likely_asset("https://example.com/about", none));

        assert!(is_likely_asset("https://example.com/a.webp", &["webp"]));
        assert!(!is_likely_asset("https://example.com/a.png", &["webp"]));
    }

    #[test]
    fn test_asset_format() {
        assert_eq!(asset_format("https://example.com/a.JPeG?x=1"), Some("jpeg".to_string()));
        assert_eq!(asset_format("data:image/svg+xml;utf8,<svg/>"), Some("svg".to_string()));
        assert_eq!(asset_format("https://example.com/images/"), None);
    }

    #[test]
    fn test_cache_keys() {
        let url = Url::parse("https://Photos.Example.com/albums/7?page=2").ok();
        let url = url.as_ref().map_or_else(|| panic!("url"), |u| u);
        assert_eq!(site_key(url), "photos.example.com");
        assert_eq!(page_key(url), "photos.example.com/albums/7");
    }
}
