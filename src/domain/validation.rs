use super::errors::ValidationError;

// Player names are shown on every client HUD; keep them short and plain.
const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 20;

/// Validates a join name and returns the trimmed value to store.
pub fn validate_player_name(value: &str) -> Result<String, ValidationError> {
    let name = value.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let len = name.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(ValidationError::NameLength {
            min: MIN_NAME_LEN,
            max: MAX_NAME_LEN,
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' '))
    {
        return Err(ValidationError::NameCharset);
    }

    Ok(name.to_string())
}
