use crate::error::CredentialError;

pub const CREDENTIAL_KEY: &str = "moonApiKey";

/// Stored in place of a real key to run on simulated data.
pub const DEMO_KEY: &str = "Demo";

pub const API_KEY_LENGTH: usize = 50;

const PREVIEW_CHARS: usize = 6;

pub fn is_demo(key: &str) -> bool {
    key == DEMO_KEY
}

/// Trim and check a key typed by the user.
pub fn validate_api_key(raw: &str) -> Result<String, CredentialError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(CredentialError::Empty);
    }
    if is_demo(key) {
        return Ok(key.to_string());
    }

    let actual = key.chars().count();
    if actual != API_KEY_LENGTH {
        return Err(CredentialError::InvalidLength {
            expected: API_KEY_LENGTH,
            actual,
        });
    }
    Ok(key.to_string())
}

pub fn key_preview(key: &str) -> String {
    let head: String = key.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_fifty_character_keys_after_trimming() {
        let key = "a".repeat(API_KEY_LENGTH);
        assert_eq!(validate_api_key(&format!("  {key}\n")).unwrap(), key);
    }

    #[test]
    fn accepts_the_demo_sentinel() {
        assert_eq!(validate_api_key(" Demo ").unwrap(), DEMO_KEY);
    }

    #[test]
    fn rejects_wrong_lengths() {
        assert_eq!(validate_api_key(""), Err(CredentialError::Empty));
        assert_eq!(
            validate_api_key("short"),
            Err(CredentialError::InvalidLength {
                expected: API_KEY_LENGTH,
                actual: 5
            })
        );
    }

    #[test]
    fn preview_shows_six_characters() {
        assert_eq!(key_preview("abcdefghijkl"), "abcdef...");
    }
}
