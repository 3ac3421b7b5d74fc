//! Prefix search over a sorted key list.

/// Returns up to `limit` keys from `sorted` that start with `prefix`.
///
/// `sorted` must be in ascending byte order. The search starts at the first
/// key not less than `prefix`; every key sharing the prefix follows it
/// contiguously. An empty prefix matches nothing.
#[must_use]
pub fn keys_with_prefix<S: AsRef<str>>(sorted: &[S], prefix: &str, limit: usize) -> Vec<String> {
    if prefix.is_empty() {
        return Vec::new();
    }
    let start = sorted.partition_point(|key| key.as_ref() < prefix);
    sorted
        .get(start..)
        .unwrap_or_default()
        .iter()
        .map(AsRef::as_ref)
        .take_while(|key| key.starts_with(prefix))
        .take(limit)
        .map(str::to_owned)
        .collect()
}
