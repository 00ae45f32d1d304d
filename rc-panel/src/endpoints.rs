use axum::http::{HeaderMap, header::HOST};

pub const DEFAULT_FALLBACK_ORIGIN: &str = "http://127.0.0.1:8080";

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Produces the ordered origins a backend call may be sent to.
///
/// Priority is fixed: configured override, then the origin of the inbound
/// request, then the local fallback. Duplicates are dropped so the same
/// origin is never contacted twice within one call.
#[derive(Clone, Debug)]
pub struct EndpointResolver {
    override_origin: Option<String>,
    fallback_origin: String,
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new(None, DEFAULT_FALLBACK_ORIGIN)
    }
}

impl EndpointResolver {
    pub fn new(override_origin: Option<&str>, fallback_origin: &str) -> Self {
        let override_origin = override_origin
            .map(normalize_origin)
            .filter(|origin| !origin.is_empty());
        let fallback_origin = match normalize_origin(fallback_origin) {
            origin if origin.is_empty() => DEFAULT_FALLBACK_ORIGIN.to_string(),
            origin => origin,
        };
        Self {
            override_origin,
            fallback_origin,
        }
    }

    pub fn override_origin(&self) -> Option<&str> {
        self.override_origin.as_deref()
    }

    pub fn fallback_origin(&self) -> &str {
        &self.fallback_origin
    }

    /// Absolute URLs come back as the only entry, untouched.
    pub fn candidates(&self, path: &str, request_origin: Option<&str>) -> Vec<String> {
        if is_absolute_url(path) {
            return vec![path.to_string()];
        }

        let mut candidates: Vec<String> = Vec::with_capacity(3);
        let mut push = |origin: String| {
            if !origin.is_empty() && !candidates.contains(&origin) {
                candidates.push(origin);
            }
        };

        if let Some(origin) = &self.override_origin {
            push(origin.clone());
        }
        if let Some(origin) = request_origin {
            push(normalize_origin(origin));
        }
        push(self.fallback_origin.clone());
        candidates
    }
}

pub fn is_absolute_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

pub fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_string()
}

pub fn join_url(base: &str, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Origin the inbound request arrived on, as seen through `Host` and an
/// optional reverse-proxy `X-Forwarded-Proto`.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?.trim();
    if host.is_empty() {
        return None;
    }
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| matches!(*value, "http" | "https"))
        .unwrap_or("http");

    let origin = format!("{scheme}://{host}");
    url::Url::parse(&origin).ok()?;
    Some(origin)
}
