//! Input validation utilities.

/// Validate video ID format.
///
/// Valid format: alphanumeric characters and hyphens only, 8-64 chars
/// (covers UUID strings without allowing path tricks).
pub fn is_valid_video_id(id: &str) -> bool {
    if id.len() < 8 || id.len() > 64 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
