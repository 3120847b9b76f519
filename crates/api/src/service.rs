//! Shared business logic — framework-agnostic pure functions.
//!
//! The Axum server and the maintenance CLI both call these, keeping
//! handlers and commands as thin adapters.

use crate::ServiceError;

/// Name of the session cookie carrying the signed token.
pub const AUTH_COOKIE: &str = "auth_token";

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize a username. Returns the trimmed username.
pub fn validate_username(username: &str) -> Result<String, ServiceError> {
    let trimmed = username.trim().to_string();
    if trimmed.len() < 2 || trimmed.len() > 64 {
        return Err(ServiceError::BadRequest(
            "username must be 2-64 characters".into(),
        ));
    }
    Ok(trimmed)
}

/// Validate a password (minimum 6 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.len() < 6 {
        return Err(ServiceError::BadRequest(
            "password must be at least 6 characters".into(),
        ));
    }
    if password.len() > 128 {
        return Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        ));
    }
    Ok(())
}

/// Validate a caller's daily call target.
pub fn validate_daily_target(target: i64) -> Result<(), ServiceError> {
    if !(0..=500).contains(&target) {
        return Err(ServiceError::BadRequest(
            "daily_target must be between 0 and 500".into(),
        ));
    }
    Ok(())
}

/// Validate and normalize a practice name. Returns the trimmed name.
pub fn validate_practice_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim().to_string();
    if trimmed.is_empty() || trimmed.len() > 200 {
        return Err(ServiceError::BadRequest(
            "practice name must be 1-200 characters".into(),
        ));
    }
    Ok(trimmed)
}

/// Validate and normalize a region name. Returns the trimmed region.
pub fn validate_region(region: &str) -> Result<String, ServiceError> {
    let trimmed = region.trim().to_string();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest("region is required".into()));
    }
    Ok(trimmed)
}

/// Validate a YYYY-MM-DD date string, returning it unchanged.
pub fn validate_date(date: &str) -> Result<&str, ServiceError> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ServiceError::BadRequest("invalid date format (YYYY-MM-DD)".into()))?;
    Ok(date)
}

// ─── Phones column codec ────────────────────────────────────────────────────

/// Parse the JSON-array `phones` column. Malformed values collapse to empty.
pub fn parse_phones(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Serialize phone numbers for the `phones` column.
pub fn encode_phones(phones: &[String]) -> String {
    serde_json::to_string(phones).unwrap_or_else(|_| "[]".into())
}

// ─── Session cookie ─────────────────────────────────────────────────────────

/// Build the `Set-Cookie` value carrying the session token.
pub fn auth_cookie(token: &str) -> String {
    format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        crate::crypto::SESSION_EXPIRY_SECS
    )
}

/// Build the `Set-Cookie` value that clears the session cookie.
pub fn clear_auth_cookie() -> String {
    format!("{AUTH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Extract a cookie value from a `Cookie` request header.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then_some(v)
    })
}

// ─── Date windows ───────────────────────────────────────────────────────────

/// Compute the inclusive `(start, end)` dates of a window beginning at
/// `start` and spanning `days` days.
pub fn date_window(start: &str, days: u32) -> Result<(String, String), ServiceError> {
    let first = chrono::NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map_err(|_| ServiceError::BadRequest("invalid date format (YYYY-MM-DD)".into()))?;
    let last = first + chrono::Duration::days(days.saturating_sub(1) as i64);
    Ok((
        first.format("%Y-%m-%d").to_string(),
        last.format("%Y-%m-%d").to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_bounds() {
        assert_eq!(validate_username("  dani  ").unwrap(), "dani");
        assert!(validate_username("x").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
    }

    #[test]
    fn password_minimum_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn daily_target_bounds() {
        assert!(validate_daily_target(0).is_ok());
        assert!(validate_daily_target(500).is_ok());
        assert!(validate_daily_target(-1).is_err());
        assert!(validate_daily_target(501).is_err());
    }

    #[test]
    fn phones_codec_tolerates_garbage() {
        assert_eq!(
            parse_phones(r#"["02 555 123","0888 111 222"]"#),
            vec!["02 555 123".to_string(), "0888 111 222".to_string()]
        );
        assert!(parse_phones("not json").is_empty());
        assert!(parse_phones("").is_empty());
        assert_eq!(encode_phones(&[]), "[]");
    }

    #[test]
    fn cookie_value_finds_token_among_pairs() {
        let header = "theme=dark; auth_token=abc.def.ghi; lang=bg";
        assert_eq!(cookie_value(header, AUTH_COOKIE), Some("abc.def.ghi"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("", AUTH_COOKIE), None);
    }

    #[test]
    fn date_window_spans_inclusive_days() {
        assert_eq!(
            date_window("2025-03-28", 7).unwrap(),
            ("2025-03-28".to_string(), "2025-04-03".to_string())
        );
        assert_eq!(
            date_window("2025-03-28", 1).unwrap(),
            ("2025-03-28".to_string(), "2025-03-28".to_string())
        );
        assert!(date_window("28-03-2025", 7).is_err());
    }
}
