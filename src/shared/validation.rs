use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

use crate::core::error::AppError;

lazy_static! {
    /// Runs of characters that are unsafe in a download filename
    /// - "Main Street #4" -> "Main_Street_4"
    /// - "plan/v2" -> "plan_v2"
    pub static ref UNSAFE_FILENAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Reduce a display name to filename-safe characters.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c| c == '_' || c == '.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Validate an actor identifier: non-empty after trimming and a well-formed UUID
pub fn parse_actor_id(field: &str, value: &str) -> Result<Uuid, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Uuid::parse_str(value)
        .map_err(|_| AppError::Validation(format!("{} must be a valid UUID", field)))
}

/// Require a non-empty project identifier, returning it trimmed
pub fn require_project_id(project_id: &str) -> Result<&str, AppError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        Err(AppError::Validation("projectId is required".to_string()))
    } else {
        Ok(project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("Main Street #4"),
            Some("Main_Street_4".to_string())
        );
        assert_eq!(sanitize_filename("plan/v2"), Some("plan_v2".to_string()));
        assert_eq!(sanitize_filename("P1"), Some("P1".to_string()));
        assert_eq!(sanitize_filename("  ../  "), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_parse_actor_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_actor_id("deletedBy", &format!(" {} ", id)).unwrap(), id);
        assert!(matches!(
            parse_actor_id("deletedBy", "   "),
            Err(AppError::Validation(msg)) if msg == "deletedBy is required"
        ));
        assert!(matches!(
            parse_actor_id("archivedBy", "not-a-uuid"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_require_project_id() {
        assert_eq!(require_project_id(" P1 ").unwrap(), "P1");
        assert!(require_project_id("  ").is_err());
    }
}
