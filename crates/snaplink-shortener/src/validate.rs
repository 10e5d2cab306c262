use crate::error::{Result, ShortenerError};
use url::Url;

/// Longest accepted source URL, after normalisation.
pub const MAX_URL_LEN: usize = 2048;

/// Parses and normalises a source URL.
///
/// Only absolute `http`/`https` URLs with a host are accepted. The returned
/// string is the normalised serialisation (lower-cased scheme and host,
/// default port dropped, empty path replaced by `/`), which is what gets
/// stored and compared.
pub fn normalize_source_url(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ShortenerError::InvalidUrl("url cannot be empty".to_string()));
    }

    let url = Url::parse(input).map_err(|e| ShortenerError::InvalidUrl(format!("{input}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ShortenerError::InvalidUrl(format!(
                "url scheme must be http or https, got {other}"
            )))
        }
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(ShortenerError::InvalidUrl(format!("url has no host: {input}"))),
    }

    let normalized = String::from(url);
    if normalized.len() > MAX_URL_LEN {
        return Err(ShortenerError::InvalidUrl(format!(
            "url is longer than {MAX_URL_LEN} characters"
        )));
    }

    Ok(normalized)
}
