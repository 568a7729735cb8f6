//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a display name is not blank once trimmed.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("display_name_blank");
        err.message = Some("Display name must contain visible characters".into());
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("display_name_format");
        err.message = Some("Display name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a brush color is a `#rrggbb` hexadecimal string.
///
/// # Examples
///
/// ```ignore
/// validate_color("#1a2b3c") // Ok
/// validate_color("1a2b3c")  // Err - missing '#'
/// validate_color("#1a2b3")  // Err - too short
/// ```
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let Some(hex) = color.strip_prefix('#') else {
        let mut err = ValidationError::new("color_prefix");
        err.message = Some("Color must start with '#'".into());
        return Err(err);
    };

    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut err = ValidationError::new("color_format");
        err.message = Some(format!("Color must be #rrggbb (got {color})").into());
        return Err(err);
    }

    Ok(())
}
