//! Validation for the display colors attached to accounts, categories and
//! tags.

use crate::Error;

/// The color assigned when a client does not pick one.
pub const DEFAULT_COLOR: &str = "#6172F3";

/// Check that `color` is a `#RRGGBB` hex color.
///
/// # Errors
/// Returns [Error::InvalidInput] naming the offending value otherwise.
pub fn validate_color(color: &str) -> Result<(), Error> {
    let is_valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if is_valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "\"{color}\" is not a valid color, expected the format #RRGGBB"
        )))
    }
}

#[cfg(test)]
mod color_tests {
    use super::{DEFAULT_COLOR, validate_color};

    #[test]
    fn default_color_is_valid() {
        assert!(validate_color(DEFAULT_COLOR).is_ok());
    }

    #[test]
    fn lowercase_hex_is_valid() {
        assert!(validate_color("#a1b2c3").is_ok());
    }

    #[test]
    fn rejects_missing_hash() {
        assert!(validate_color("6172F3").is_err());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_color("#FFF").is_err());
        assert!(validate_color("#1234567").is_err());
    }

    #[test]
    fn rejects_non_hex_digits() {
        assert!(validate_color("#12345G").is_err());
    }
}
