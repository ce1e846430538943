//! Request header lists.

/// Ordered list of `(name, value)` request headers.
pub type Headers = Vec<(String, String)>;

/// Merge global headers with caller-supplied ones.
///
/// Names compare case-insensitively. A caller entry replaces every global
/// entry of the same name; the remaining global entries keep their order and
/// come first.
pub fn merge_headers(global: &[(String, String)], extra: &[(String, String)]) -> Headers {
    let mut merged: Headers = global
        .iter()
        .filter(|(name, _)| !extra.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)))
        .cloned()
        .collect();
    merged.extend(extra.iter().cloned());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_merge_keeps_disjoint_headers() {
        let merged = merge_headers(&[h("Accept", "image/*")], &[h("X-Trace", "1")]);
        assert_eq!(merged, vec![h("Accept", "image/*"), h("X-Trace", "1")]);
    }

    #[test]
    fn test_merge_caller_wins_case_insensitive() {
        let merged = merge_headers(
            &[h("User-Agent", "global"), h("Accept", "*/*")],
            &[h("user-agent", "caller")],
        );
        assert_eq!(merged, vec![h("Accept", "*/*"), h("user-agent", "caller")]);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_headers(&[], &[]).is_empty());
    }
}
