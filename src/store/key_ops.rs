/// Checks if a store key matches a subscription pattern
///
/// # Arguments
/// * `key` - The store key that changed
/// * `pattern` - The pattern to match against
///
/// # Examples
/// * `"baseUrl"` matches `"baseUrl"`
/// * `"baseUrl"` matches `"*"`
/// * `"bridgeDebug"` matches `"bridge*"`
/// * `"bridgeLogs"` matches `"baseUrl|bridgeLogs"`
pub(super) fn key_matches(key: &str, pattern: &str) -> bool {
    const WILDCARD: char = '*';

    pattern.split('|').any(|alternative| {
        match alternative.strip_suffix(WILDCARD) {
            Some(prefix) => key.starts_with(prefix),
            None => key == alternative,
        }
    })
}
