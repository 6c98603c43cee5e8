use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

const PREFLIGHT_MAX_AGE_SECS: u64 = 86400;

/// `origins` is a comma separated list; the local front-end dev servers are
/// allowed when it is `None`.
pub fn create_cors_layer(origins: Option<&str>) -> CorsLayer {
    let allowed_origins = parse_allowed_origins(origins.unwrap_or(DEFAULT_ALLOWED_ORIGINS));

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

fn parse_origin_list(origins: &str) -> Vec<HeaderValue> {
    origins
        .split(',')
        .filter_map(|origin| {
            let trimmed = origin.trim();
            if trimmed.is_empty() {
                None
            } else {
                match trimmed.parse::<HeaderValue>() {
                    Ok(value) => {
                        tracing::debug!("CORS: Allowing origin: {}", trimmed);
                        Some(value)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                        None
                    }
                }
            }
        })
        .collect()
}

fn parse_allowed_origins(origins: &str) -> AllowOrigin {
    let origins = parse_origin_list(origins);

    if origins.is_empty() {
        // Credentialed requests cannot use a wildcard origin, so mirror the caller.
        tracing::warn!("CORS: No valid origins configured, mirroring request origin for development");
        AllowOrigin::mirror_request()
    } else {
        tracing::info!("CORS: Configured with {} allowed origin(s)", origins.len());
        AllowOrigin::list(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer() {
        let _layer = create_cors_layer(None);
        let _layer = create_cors_layer(Some("https://tickets.example.edu"));
    }

    #[test]
    fn test_origin_list_skips_blank_and_invalid_entries() {
        let parsed = parse_origin_list("https://a.example.edu, ,https://b.example.edu,bad\norigin");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], "https://a.example.edu");
    }

    #[test]
    fn test_default_origins_are_valid() {
        assert_eq!(
            parse_origin_list(DEFAULT_ALLOWED_ORIGINS).len(),
            DEFAULT_ALLOWED_ORIGINS.split(',').count()
        );
    }
}
