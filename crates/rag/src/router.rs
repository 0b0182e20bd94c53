//! Keyword-based query routing.
//!
//! Maps doc-type cues in the (possibly rewritten) query to a metadata filter
//! narrowing retrieval to one document category. Deliberately a fixed
//! priority list, not an inference engine.

use crate::store::DocFilter;

/// Map keyword cues to a single-category filter, or None for unscoped
/// retrieval. Priority order: moa, aoa, memo, rule.
pub fn route_filter(question: &str) -> Option<DocFilter> {
    let q = question.to_lowercase();

    if q.contains("moa") {
        return Some(DocFilter::new("moa"));
    }
    if q.contains("aoa") {
        return Some(DocFilter::new("aoa"));
    }
    if q.contains("memo") || q.contains("memos") {
        return Some(DocFilter::new("memo"));
    }
    if q.contains("rule") || q.contains("rules") || q.contains("policy") {
        return Some(DocFilter::new("rule"));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_each_category() {
        assert_eq!(route_filter("what does the MOA say?"), Some(DocFilter::new("moa")));
        assert_eq!(route_filter("AOA amendment process"), Some(DocFilter::new("aoa")));
        assert_eq!(route_filter("recent memos"), Some(DocFilter::new("memo")));
        assert_eq!(route_filter("travel policy"), Some(DocFilter::new("rule")));
        assert_eq!(route_filter("what are the rules"), Some(DocFilter::new("rule")));
    }

    #[test]
    fn test_priority_order() {
        // moa wins over rule when both cues appear
        assert_eq!(
            route_filter("is the MOA policy binding?"),
            Some(DocFilter::new("moa"))
        );
        // memo wins over rule
        assert_eq!(
            route_filter("the memo about the dress code policy"),
            Some(DocFilter::new("memo"))
        );
    }

    #[test]
    fn test_unscoped_when_no_cue() {
        assert_eq!(route_filter("when is the office closed?"), None);
        assert_eq!(route_filter(""), None);
    }
}
