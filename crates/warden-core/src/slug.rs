//! Lower-kebab slug derivation for role and package names.

/// Derive a slug from a display name: lowercase alphanumerics separated by
/// single dashes. Whitespace, `-` and `_` act as separators; `@` becomes
/// `at`; anything else is dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c == '@' {
            if !slug.is_empty() {
                slug.push('-');
            }
            slug.push_str("at");
            pending_dash = true;
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}
