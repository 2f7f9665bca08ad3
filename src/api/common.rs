//! Query types and helpers shared by the handlers

use axum::http::{header, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::api::responses::ApiError;
use crate::config::SessionConfig;
use crate::models::ListParams;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}

fn default_limit() -> i64 {
    10
}

/// `?page=&per_page=`
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// `?limit=`
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// `Set-Cookie` header carrying the session id
pub fn session_cookie(config: &SessionConfig, session_id: &str) -> Result<HeaderMap, ApiError> {
    let mut cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_id,
        config.expiration_days * 24 * 60 * 60
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }

    let value = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_error("Invalid session cookie"))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

/// `Set-Cookie` header that clears the session
pub fn clear_session_cookie() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_flags() {
        let config = SessionConfig {
            expiration_days: 7,
            secure_cookie: true,
        };
        let headers = session_cookie(&config, "abc").unwrap();
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session=abc;"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_pagination_query_clamps() {
        let query = PaginationQuery { page: 0, per_page: 1000 };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }
}
