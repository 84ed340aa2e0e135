use crate::{Error, Result};

/// Maximum length, in characters, of readable and machine names.
pub const MAX_NAME_LEN: usize = 100;

/// Returns `true` if `value` only contains `[A-Za-z0-9_-]`.
pub fn is_machine_name(value: &str) -> bool {
    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Validates a URL/API friendly key.
///
/// # Errors
/// - [`Error::InvalidName`] if the value is empty, longer than
///   [`MAX_NAME_LEN`], or contains characters outside `[A-Za-z0-9_-]`.
pub fn validate_machine_name(value: &str) -> Result<()> {
    check_length("machine_name", value)?;
    if !is_machine_name(value) {
        return Err(Error::InvalidName {
            field: "machine_name",
            value: value.to_owned(),
            reason: "only letters, numbers, `-` and `_` are allowed",
        });
    }
    Ok(())
}

/// Validates a human readable label.
///
/// # Errors
/// - [`Error::InvalidName`] if the value is blank or longer than
///   [`MAX_NAME_LEN`].
pub fn validate_readable_name(value: &str) -> Result<()> {
    check_length("readable_name", value)?;
    if value.trim().is_empty() {
        return Err(Error::InvalidName {
            field: "readable_name",
            value: value.to_owned(),
            reason: "must not be blank",
        });
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidName {
            field,
            value: value.to_owned(),
            reason: "must not be empty",
        });
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidName {
            field,
            value: value.to_owned(),
            reason: "must be at most 100 characters",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_names() {
        assert!(validate_machine_name("utpool1").is_ok());
        assert!(validate_machine_name("utp_ool-1").is_ok());
        assert!(validate_machine_name("00377700000136").is_ok());

        assert!(validate_machine_name("").is_err());
        assert!(validate_machine_name("has space").is_err());
        assert!(validate_machine_name("slash/").is_err());
        assert!(validate_machine_name("ümlaut").is_err());
        assert!(validate_machine_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_machine_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn readable_names() {
        assert!(validate_readable_name("Unit Test Region One").is_ok());
        assert!(validate_readable_name("   ").is_err());
        assert!(validate_readable_name("").is_err());
    }
}
