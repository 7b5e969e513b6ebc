//! Scheme inference and URL resolution against an optional base.

use crate::domain::errors::ClientError;
use url::Url;

/// Gives a scheme-less token a default protocol.
///
/// Rules, in order:
/// - anything with `://` is left untouched
/// - a leading `:` is a localhost shorthand (`:3000/api`, `:/health`)
/// - a leading `/` is a path, resolved against a base URL later
/// - `localhost` and `host:port` forms get `http://`
/// - bare domains get `https://`
pub fn infer_scheme(raw: &str) -> String {
    if raw.contains("://") {
        return raw.to_string();
    }
    if let Some(rest) = raw.strip_prefix(':') {
        return if rest.starts_with('/') {
            format!("http://localhost{rest}")
        } else {
            format!("http://localhost:{rest}")
        };
    }
    if raw.starts_with('/') {
        return raw.to_string();
    }
    let host = raw.split(['/', '?']).next().unwrap_or(raw);
    let is_local = host == "localhost" || host.starts_with("localhost:");
    let has_port = host
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));
    if is_local || has_port {
        format!("http://{raw}")
    } else {
        format!("https://{raw}")
    }
}

/// Resolves a URL or path against an optional base and appends query pairs.
///
/// An absolute input ignores the base entirely. A relative path joins the base
/// with exactly one separating slash. Query pairs are appended after any
/// query string already on the URL; existing pairs are never replaced and
/// repeated keys stay repeated.
pub fn resolve(
    url_or_path: &str,
    base: Option<&str>,
    query: &[(String, String)],
) -> Result<Url, ClientError> {
    let parsed = if url_or_path.contains("://") {
        Url::parse(url_or_path)
    } else if let Some(base) = base {
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url_or_path.trim_start_matches('/')
        );
        Url::parse(&joined)
    } else {
        Url::parse(&infer_scheme(url_or_path))
    };
    let mut url = parsed.map_err(|_| ClientError::InvalidUrl(url_or_path.to_string()))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}
