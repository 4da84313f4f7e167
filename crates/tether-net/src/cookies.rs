//! In-memory cookie store shared with the transport.
//!
//! Cookies are kept per host for the life of the process. The jar implements
//! [`reqwest::cookie::CookieStore`], so the transport stores `Set-Cookie`
//! responses and attaches `Cookie` headers on its own.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use http::HeaderValue;
use parking_lot::Mutex;
use url::Url;

use tether_core::logging::targets;

#[derive(Debug, Clone)]
struct Cookie {
    name: String,
    value: String,
    domain: Option<String>,
    path: String,
    secure: bool,
    expires_at: Option<Instant>,
}

impl Cookie {
    /// Parse a `Set-Cookie` header value.
    fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.trim().split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            domain: None,
            path: "/".to_string(),
            secure: false,
            expires_at: None,
        };

        for part in parts {
            let part = part.trim();
            match part.split_once('=') {
                Some((attr, val)) => match attr.trim().to_ascii_lowercase().as_str() {
                    "domain" => {
                        let domain = val.trim().trim_start_matches('.').to_ascii_lowercase();
                        if !domain.is_empty() {
                            cookie.domain = Some(domain);
                        }
                    }
                    "path" if val.starts_with('/') => cookie.path = val.to_string(),
                    "max-age" => {
                        if let Ok(secs) = val.trim().parse::<i64>() {
                            let secs = u64::try_from(secs).unwrap_or(0);
                            cookie.expires_at = Some(Instant::now() + Duration::from_secs(secs));
                        }
                    }
                    _ => {}
                },
                None if part.eq_ignore_ascii_case("secure") => cookie.secure = true,
                None => {}
            }
        }
        Some(cookie)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, now: Instant) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        url.path().starts_with(&self.path)
    }
}

/// A process-wide cookie store keyed by host.
#[derive(Debug, Default)]
pub struct CookieJar {
    hosts: Mutex<HashMap<String, Vec<Cookie>>>,
}

impl CookieJar {
    /// Create an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cookie from a `Set-Cookie` header value received from `url`.
    ///
    /// A cookie with the same name replaces the earlier one in place. Returns
    /// `false` if the header could not be parsed.
    pub fn set(&self, url: &Url, set_cookie: &str) -> bool {
        let Some(request_host) = url.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        let Some(cookie) = Cookie::parse(set_cookie) else {
            return false;
        };
        let host = match &cookie.domain {
            Some(domain) if domain_matches(&request_host, domain) => domain.clone(),
            Some(_) => return false,
            None => request_host,
        };

        let now = Instant::now();
        let mut hosts = self.hosts.lock();
        let cookies = hosts.entry(host).or_default();
        let expired = cookie.is_expired(now);
        match cookies.iter().position(|c| c.name == cookie.name && c.path == cookie.path) {
            Some(index) if expired => {
                cookies.remove(index);
            }
            Some(index) => cookies[index] = cookie,
            None if expired => {}
            None => cookies.push(cookie),
        }
        true
    }

    /// The `Cookie` header value for a request to `url`, as `name=value; ...`.
    pub fn get(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let now = Instant::now();
        let hosts = self.hosts.lock();

        let pairs: Vec<String> = hosts
            .iter()
            .filter(|(stored, _)| domain_matches(&host, stored))
            .flat_map(|(_, cookies)| cookies.iter())
            .filter(|cookie| cookie.matches(url, now))
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect();

        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Remove every cookie. Returns `true` if anything was removed.
    pub fn clear(&self) -> bool {
        let mut hosts = self.hosts.lock();
        let had_cookies = hosts.values().any(|cookies| !cookies.is_empty());
        hosts.clear();
        tracing::debug!(target: targets::HTTP, had_cookies, "cleared cookies");
        had_cookies
    }
}

/// Whether `host` is `domain` or a subdomain of it.
fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl reqwest::cookie::CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.set(url, value);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.get(url)
            .and_then(|value| HeaderValue::from_str(&value).ok())
    }
}
