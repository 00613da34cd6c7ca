//! Display labels for voices

use super::gender::Gender;

/// Shortened form of a voice id for display
///
/// The segment after the last `:` when the id has one, otherwise after the
/// last `.`; `"default"` for an empty id.
pub fn short_id(id: &str) -> &str {
    if id.is_empty() {
        return "default";
    }
    let sep = if id.contains(':') { ':' } else { '.' };
    id.rsplit(sep).next().unwrap_or(id)
}

/// Compose the user-facing label: `Name (lang) - Gender - shortid`
///
/// Falls back to the id when the name is blank. Pure and deterministic;
/// uniqueness within a catalog is handled by the catalog.
pub fn build_label(id: &str, name: &str, language: Option<&str>, gender: Gender) -> String {
    let name = if name.trim().is_empty() { id } else { name };
    let mut label = String::from(name);
    if let Some(lang) = language.filter(|l| !l.is_empty()) {
        label.push_str(" (");
        label.push_str(lang);
        label.push(')');
    }
    label.push_str(" - ");
    label.push_str(&gender.to_string());
    label.push_str(" - ");
    label.push_str(short_id(id));
    label
}
