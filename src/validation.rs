use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ids::is_complaint_code;
use crate::models::Coordinates;

/// Largest photo accepted for upload (10 MiB)
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::Validation(message.into())
}

/// Validation utilities for input sanitization and edge case handling
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Validate a latitude/longitude pair
    pub fn validate_coordinates(coords: Coordinates) -> Result<()> {
        if !coords.lat.is_finite() || !coords.lon.is_finite() {
            return Err(invalid("Coordinates must be finite numbers"));
        }
        if !(-90.0..=90.0).contains(&coords.lat) {
            return Err(invalid(format!("Latitude {} out of range [-90, 90]", coords.lat)));
        }
        if !(-180.0..=180.0).contains(&coords.lon) {
            return Err(invalid(format!("Longitude {} out of range [-180, 180]", coords.lon)));
        }
        Ok(())
    }

    /// Validate uploaded photo bytes
    pub fn validate_photo(photo: &[u8]) -> Result<()> {
        if photo.is_empty() {
            return Err(invalid("Photo is required"));
        }
        if photo.len() > MAX_PHOTO_BYTES {
            return Err(invalid(format!(
                "Photo too large ({} bytes, max {MAX_PHOTO_BYTES})",
                photo.len()
            )));
        }
        Ok(())
    }

    /// Validate complainant name
    pub fn validate_complainant_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(invalid("Complainant name cannot be empty"));
        }

        if name.chars().count() > 100 {
            return Err(invalid("Complainant name too long (max 100 characters)"));
        }

        // Check for potentially dangerous characters
        if name.contains('\0') || name.contains('\r') || name.contains('\n') {
            return Err(invalid("Complainant name contains invalid characters"));
        }

        Ok(())
    }

    /// Validate a display address
    pub fn validate_address(address: &str) -> Result<()> {
        if address.chars().count() > 255 {
            return Err(invalid("Address too long (max 255 characters)"));
        }
        if address.contains('\0') {
            return Err(invalid("Address contains invalid characters"));
        }
        Ok(())
    }

    /// Validate a rejection reason
    pub fn validate_reason(reason: &str) -> Result<()> {
        if reason.trim().is_empty() {
            return Err(invalid("Rejection reason cannot be empty"));
        }
        if reason.chars().count() > 1000 {
            return Err(invalid("Rejection reason too long (max 1000 characters)"));
        }
        Ok(())
    }

    /// Validate a complaint key: a `CC-` code or a UUID
    pub fn validate_complaint_key(key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid("Complaint id cannot be empty"));
        }
        if is_complaint_code(key) || Uuid::parse_str(key).is_ok() {
            Ok(())
        } else {
            Err(invalid(format!("Malformed complaint id: {key}")))
        }
    }

    /// Sanitize text input
    #[must_use]
    pub fn sanitize_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect::<String>()
            .trim()
            .to_string()
    }

    /// Sanitize optional free text, dropping it when nothing is left
    #[must_use]
    pub fn sanitize_optional(text: Option<&str>) -> Option<String> {
        text.map(Self::sanitize_text).filter(|s| !s.is_empty())
    }
}
