use super::ApiError;

pub fn validate_product_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid product ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_product_name(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Product name cannot be empty"));
    }
    if trimmed.len() > 200 {
        return Err(ApiError::validation(
            "Product name must be 200 characters or less",
        ));
    }
    Ok(trimmed)
}

pub fn validate_username(name: &str) -> Result<&str, ApiError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation("Username cannot be empty"));
    }
    if trimmed.len() > 64 {
        return Err(ApiError::validation("Username must be 64 characters or less"));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, hyphens, underscores, and dots",
        ));
    }
    Ok(trimmed)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.len() < 8 {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }
    Ok(password)
}

/// Accepts either a full rfc3339 timestamp or a bare `YYYY-MM-DD` date.
/// Bare dates are widened to cover the whole day so an inclusive range
/// behaves the way the export dialog in the old client did.
pub fn normalize_date_bound(value: &str, is_end: bool) -> Result<String, ApiError> {
    let trimmed = value.trim();

    if chrono::DateTime::parse_from_rfc3339(trimmed).is_ok() {
        return Ok(trimmed.to_string());
    }

    if chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        let widened = if is_end {
            format!("{trimmed}T23:59:59.999999Z")
        } else {
            format!("{trimmed}T00:00:00.000000Z")
        };
        return Ok(widened);
    }

    Err(ApiError::validation(format!(
        "Invalid date '{}'. Expected rfc3339 or YYYY-MM-DD",
        trimmed
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id(1).is_ok());
        assert!(validate_product_id(12345).is_ok());
        assert!(validate_product_id(0).is_err());
        assert!(validate_product_id(-1).is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert_eq!(validate_product_name(" Widget ").unwrap(), "Widget");
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name("a".repeat(201).as_str()).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("bob.smith_2").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("bad user").is_err());
        assert!(validate_username("a".repeat(65).as_str()).is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_normalize_date_bound() {
        assert_eq!(
            normalize_date_bound("2026-03-01", false).unwrap(),
            "2026-03-01T00:00:00.000000Z"
        );
        assert_eq!(
            normalize_date_bound("2026-03-01", true).unwrap(),
            "2026-03-01T23:59:59.999999Z"
        );
        let full = "2026-03-01T12:00:00.000000Z";
        assert_eq!(normalize_date_bound(full, true).unwrap(), full);
        assert!(normalize_date_bound("yesterday", false).is_err());
    }
}
