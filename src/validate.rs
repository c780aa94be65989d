use crate::constants::WEBSITE_KEY_PREFIXES;
use crate::error::SitelineError;

/// Check a site key before a tracker is built.
///
/// Rejects:
///   - empty keys
///   - keys without one of the accepted `*_secret_` prefixes
pub fn validate_website_key(key: &str) -> Result<(), SitelineError> {
    if key.is_empty() {
        return Err(SitelineError::Validation("Missing websiteKey.".to_string()));
    }
    if !WEBSITE_KEY_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
    {
        return Err(SitelineError::Validation(
            "Invalid websiteKey format.".to_string(),
        ));
    }
    Ok(())
}
