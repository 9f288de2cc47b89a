//! Input validation, applied before any transaction opens.

use taskvault_common::{sanitize_tags, sanitize_text, Error, Result};

use crate::model::{CategoryDraft, CategoryPatch, TaskDraft, TaskPatch};

/// Maximum accepted title length, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Validate and sanitize a task draft in place.
///
/// # Errors
/// - Title empty after sanitization
/// - Title longer than [`MAX_TITLE_LEN`]
pub fn validate_draft(draft: &mut TaskDraft) -> Result<()> {
    draft.title = sanitize_text(&draft.title);
    if draft.title.is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    if draft.title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    draft.description = sanitize_text(&draft.description);
    draft.tags = sanitize_tags(&draft.tags);
    Ok(())
}

/// Validate and sanitize a task patch in place.
///
/// Absent fields are left untouched; present free-text fields are sanitized
/// with the same rules as drafts.
pub fn validate_patch(patch: &mut TaskPatch) -> Result<()> {
    if let Some(title) = patch.title.as_mut() {
        *title = sanitize_text(title);
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::Validation(format!(
                "title exceeds {} characters",
                MAX_TITLE_LEN
            )));
        }
    }
    if let Some(description) = patch.description.as_mut() {
        *description = sanitize_text(description);
    }
    if let Some(tags) = patch.tags.as_mut() {
        *tags = sanitize_tags(tags);
    }
    Ok(())
}

/// Validate and sanitize a category draft in place.
pub fn validate_category_draft(draft: &mut CategoryDraft) -> Result<()> {
    draft.name = sanitize_text(&draft.name);
    if draft.name.is_empty() {
        return Err(Error::Validation(
            "category name must not be empty".to_string(),
        ));
    }
    draft.description = sanitize_text(&draft.description);
    Ok(())
}

/// Validate and sanitize a category patch in place.
pub fn validate_category_patch(patch: &mut CategoryPatch) -> Result<()> {
    if let Some(name) = patch.name.as_mut() {
        *name = sanitize_text(name);
        if name.is_empty() {
            return Err(Error::Validation(
                "category name must not be empty".to_string(),
            ));
        }
    }
    if let Some(description) = patch.description.as_mut() {
        *description = sanitize_text(description);
    }
    Ok(())
}
