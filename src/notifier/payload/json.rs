//! Rendering of notices as JSON objects.

use crate::error::BuildError;

use super::Notice;

pub(super) fn render(notice: &Notice<'_>) -> Result<String, BuildError> {
    Ok(serde_json::to_string(notice)?)
}
