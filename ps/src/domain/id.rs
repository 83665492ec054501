//! Session ID generation
//!
//! Format: `{8-hex}-plan-{slug}`, e.g. `3f09a1c2-plan-5-days-in-pokhara`.
//! The hex part comes from the random tail of a v7 UUID.

/// Longest slug carried into an ID
const MAX_SLUG_LEN: usize = 40;

/// Generate a session ID from the prompt
pub fn generate_session_id(prompt: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    let hex = &uuid[uuid.len() - 8..];
    let slug = slugify(prompt);
    if slug.is_empty() {
        format!("{}-plan", hex)
    } else {
        format!("{}-plan-{}", hex, slug)
    }
}

/// Slugify a prompt for use in IDs
fn slugify(text: &str) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    // Cut on a word boundary where possible
    let cut = &slug[..MAX_SLUG_LEN];
    match cut.rfind('-') {
        Some(pos) if pos > 0 => cut[..pos].to_string(),
        _ => cut.to_string(),
    }
}
