//! Field-level validation helpers.

use lettre::message::Mailbox;

/// Validates the sender address. Display names are allowed
/// (`CI <ci@example.com>`).
pub(crate) fn validate_from_address(from: &str) -> Result<(), String> {
    from.parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| format!("'{}' is not a valid email address: {}", from, e))
}

/// Validates the product name shown in subjects.
pub(crate) fn validate_product_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.chars().any(char::is_control) {
        return Err(format!(
            "'{}' must not contain control characters",
            name.escape_default()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_from_address_accepts_plain_and_named_addresses() {
        assert!(validate_from_address("user@email.com").is_ok());
        assert!(validate_from_address("CI Bot <ci@example.com>").is_ok());
    }

    #[test]
    fn validate_from_address_rejects_garbage() {
        let err = validate_from_address("nonEmailString").unwrap_err();
        assert!(err.contains("nonEmailString"));
        assert!(validate_from_address("").is_err());
        assert!(validate_from_address("a@").is_err());
    }

    #[test]
    fn validate_product_name_rules() {
        assert!(validate_product_name("Screwdriver").is_ok());
        assert!(validate_product_name("Acme CI").is_ok());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name("bad\nname").is_err());
    }
}
