use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::cache::fingerprint::Fingerprint;

/// Rendering options understood by the rasterizer, in the order they are
/// hashed and forwarded. Anything else on the query string is ignored.
pub const RECOGNIZED_OPTIONS: [&str; 11] = [
    "width",
    "height",
    "clipRect",
    "javascriptEnabled",
    "loadImages",
    "localToRemoteUrlAccessEnabled",
    "userAgent",
    "userName",
    "password",
    "delay",
    "imgSize",
];

/// Name of the option that doubles as the thumbnail width hint.
pub const SIZE_HINT_OPTION: &str = "imgSize";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    // Always sorted by position in RECOGNIZED_OPTIONS
    values: Vec<(&'static str, String)>,
}

impl RenderOptions {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut slots: [Option<String>; RECOGNIZED_OPTIONS.len()] = Default::default();

        for (name, value) in pairs {
            let value = value.into();
            if value.is_empty() {
                continue;
            }
            if let Some(index) = RECOGNIZED_OPTIONS.iter().position(|o| *o == name.as_ref()) {
                slots[index] = Some(value);
            }
        }

        let values = RECOGNIZED_OPTIONS
            .iter()
            .zip(slots)
            .filter_map(|(name, value)| value.map(|v| (*name, v)))
            .collect();

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(n, v)| (*n, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Width requested for the thumbnail, if the hint parses as a positive number.
    pub fn size_hint(&self) -> Option<u32> {
        self.get(SIZE_HINT_OPTION)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|w| *w > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub url: String,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(url: &str, options: RenderOptions) -> Self {
        Self {
            url: normalize_url(url),
            options,
        }
    }
}

/// Where the finished image goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryTarget {
    Inline,
    Callback(Url),
}

/// Everything one request needs, built once at the edge and never shared
/// between requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request: RenderRequest,
    pub fingerprint: Fingerprint,
    pub target: DeliveryTarget,
    pub size_hint: Option<u32>,
}

impl RequestContext {
    pub fn new(request: RenderRequest, target: DeliveryTarget) -> Self {
        let fingerprint = Fingerprint::derive(&request.url, &request.options);
        let size_hint = request.options.size_hint();
        Self {
            request,
            fingerprint,
            target,
            size_hint,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self.target, DeliveryTarget::Callback(_))
    }
}

lazy_static! {
    static ref SCHEME_PREFIX: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap();
}

/// Prepends `http://` to addresses that do not start with a scheme.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if SCHEME_PREFIX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

pub fn parse_callback(raw: &str) -> Result<Url, url::ParseError> {
    Url::parse(&normalize_url(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_empty_options_are_dropped() {
        let options = RenderOptions::from_pairs([
            ("width", "320"),
            ("format", "png"),
            ("height", ""),
        ]);
        assert_eq!(options.iter().collect::<Vec<_>>(), vec![("width", "320")]);
    }

    #[test]
    fn options_are_kept_in_allow_list_order() {
        let options = RenderOptions::from_pairs([
            ("delay", "200"),
            ("userAgent", "bot"),
            ("width", "800"),
        ]);
        let names: Vec<_> = options.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["width", "userAgent", "delay"]);
    }

    #[test]
    fn size_hint_requires_positive_number() {
        assert_eq!(RenderOptions::from_pairs([("imgSize", "120")]).size_hint(), Some(120));
        assert_eq!(RenderOptions::from_pairs([("imgSize", "0")]).size_hint(), None);
        assert_eq!(RenderOptions::from_pairs([("imgSize", "big")]).size_hint(), None);
    }

    #[test]
    fn urls_without_scheme_get_http() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url("https://example.com/a"), "https://example.com/a");
    }

    #[test]
    fn embedded_urls_do_not_count_as_a_scheme() {
        assert_eq!(
            normalize_url("hooks.example.com/cb?next=http://x"),
            "http://hooks.example.com/cb?next=http://x"
        );
        let callback = parse_callback("hooks.example.com/cb?next=http://x").unwrap();
        assert_eq!(callback.host_str(), Some("hooks.example.com"));
    }

    #[test]
    fn callback_must_parse() {
        assert!(parse_callback("hooks.example.com/shot").is_ok());
        assert!(parse_callback("http://[::1").is_err());
    }
}
