//! Field checks shared by the administrative operations.

use std::collections::BTreeSet;

use uuid::Uuid;
use warden_core::error::ValidationErrors;
use warden_core::slug::slugify;

pub(crate) fn check_name(errors: &mut ValidationErrors, name: &str, max: usize) {
    if name.trim().is_empty() {
        errors.add("name", "is required");
    } else if name.chars().count() > max {
        errors.add("name", format!("may not be greater than {max} characters"));
    }
}

pub(crate) fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "is required");
    } else if !is_valid_email(email) {
        errors.add("email", "must be a valid email address");
    }
}

pub(crate) fn check_password(errors: &mut ValidationErrors, password: &str, min: usize) {
    if password.chars().count() < min {
        errors.add("password", format!("must be at least {min} characters"));
    }
}

/// Record one error per id in `missing`.
pub(crate) fn check_known_ids(errors: &mut ValidationErrors, field: &str, missing: &[Uuid]) {
    for id in missing {
        errors.add(field, format!("unknown id {id}"));
    }
}

/// The slug a new role or package is stored under: the caller's slug when
/// given, otherwise one derived from the name. Either way it is normalized.
pub(crate) fn derive_slug(requested: Option<&str>, name: &str) -> String {
    match requested {
        Some(slug) if !slug.trim().is_empty() => slugify(slug),
        _ => slugify(name),
    }
}

pub(crate) fn id_set<'a>(ids: impl IntoIterator<Item = &'a Uuid>) -> BTreeSet<Uuid> {
    ids.into_iter().copied().collect()
}

/// RFC-shaped check: a local part and a domain made of non-empty labels.
/// Single-label hosts such as `localhost` are accepted.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.split('.').all(|label| !label.is_empty())
}
