//! Sanitation and validation of user-authored text.
//!
//! [`sanitize_input`] runs on every piece of text before it is stored locally
//! or transmitted, whatever the validation outcome. It is idempotent:
//! `sanitize_input(&sanitize_input(x)) == sanitize_input(x)`.
//!
//! [`InputValidator::validate`] is total. Every input maps to either the
//! normalized text or a [`ReasonCode`].

use crate::domain::error::{InvalidInput, ReasonCode};
use crate::domain::subject::FieldKind;
use crate::{Config, InputLimits};

/// URL schemes a rendering layer could execute. Matched case-insensitively.
const EXECUTABLE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:text/html"];

/// Strips control characters (keeping newlines and tabs), angle brackets and
/// executable URL schemes.
///
/// Scheme removal repeats until no scheme remains, so fragments that join into
/// a new scheme after one removal are caught too.
///
/// # Example
///
/// ```rust
/// use feedsync::app::sanitize_input;
///
/// assert_eq!(sanitize_input("<b>hi</b>\u{7}"), "bhi/b");
/// assert_eq!(sanitize_input("jajavascript:vascript:alert(1)"), "alert(1)");
/// ```
#[must_use]
pub fn sanitize_input(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>'))
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    // Schemes are ASCII, so offsets in the lowercased copy are valid in `text`.
    loop {
        let lower = text.to_ascii_lowercase();
        let hit = EXECUTABLE_SCHEMES
            .iter()
            .filter_map(|scheme| lower.find(scheme).map(|at| (at, scheme.len())))
            .min();

        let Some((at, len)) = hit else { break };
        text.replace_range(at..at + len, "");
    }

    text
}

/// Stateless per-field rules: non-empty after trimming, bounded length.
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    limits: InputLimits,
}

impl InputValidator {
    #[must_use]
    pub const fn new(limits: InputLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.input.clone())
    }

    /// Sanitizes, trims and checks `raw` for `field`.
    ///
    /// Length is counted in characters of the normalized text.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInput`] with [`ReasonCode::Empty`] or
    /// [`ReasonCode::TooLong`].
    pub fn validate(&self, field: FieldKind, raw: &str) -> Result<String, InvalidInput> {
        let sanitized = sanitize_input(raw);
        let normalized = sanitized.trim();

        if normalized.is_empty() {
            return Err(InvalidInput { field, reason: ReasonCode::Empty });
        }

        let max = self.limits.max_len(field);
        let actual = normalized.chars().count();
        if actual > max {
            return Err(InvalidInput { field, reason: ReasonCode::TooLong { max, actual } });
        }

        Ok(normalized.to_string())
    }
}
