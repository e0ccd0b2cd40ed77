//! Cookie service — set/clear the httpOnly `token` cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

/// Build a httpOnly cookie for the session token.
pub fn token_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build an expired cookie to clear auth state.
pub fn clear_token_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE.to_string(), String::new()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_cookie_attributes() {
        let c = token_cookie("abc", 60);
        assert_eq!(c.name(), TOKEN_COOKIE);
        assert_eq!(c.value(), "abc");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.max_age(), Some(Duration::seconds(60)));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let c = clear_token_cookie();
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(Duration::ZERO));
    }
}
