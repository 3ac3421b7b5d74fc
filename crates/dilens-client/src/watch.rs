//! Reload decisions for watched-file notifications.

/// Returns `true` when a changed file URI ends with one of the reload
/// patterns, meaning the backend's view of the application is stale.
#[must_use]
pub fn requires_reload<S: AsRef<str>>(uri: &str, patterns: &[S]) -> bool {
    patterns
        .iter()
        .map(AsRef::as_ref)
        .any(|pattern| !pattern.is_empty() && uri.ends_with(pattern))
}
