//! Request body builders for OpenSearch `_search` calls.

use serde_json::{Map, Value, json};

/// Fields returned with each search hit.
pub const SEARCH_SOURCE_FIELDS: [&str; 8] = [
    "title",
    "path",
    "file_name",
    "level1",
    "level2",
    "relative_subpath",
    "modified_at",
    "ext",
];

/// Default page size for `GET /api/search`.
pub const DEFAULT_PAGE_SIZE: usize = 20;

const FACET_SIZE: usize = 200;
const SUGGEST_SIZE: usize = 5;

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Engine relevance score.
    #[default]
    Relevance,
    /// Most recently modified files first.
    Recency,
}

impl SortOrder {
    /// Parse the `sort` query parameter; unknown values keep relevance ordering.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("recency") => Self::Recency,
            _ => Self::Relevance,
        }
    }
}

/// Parameters of a filtered full-text search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    /// Free text matched against titles and bodies; empty matches everything.
    pub q: String,
    /// Accepted level1 values (each entry may hold a comma-separated list).
    pub level1: Vec<String>,
    /// Accepted level2 values (each entry may hold a comma-separated list).
    pub level2: Vec<String>,
    /// Offset of the first hit.
    pub from: usize,
    /// Number of hits to return.
    pub size: usize,
    /// Requested ordering.
    pub sort: SortOrder,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            q: String::new(),
            level1: Vec::new(),
            level2: Vec::new(),
            from: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: SortOrder::Relevance,
        }
    }
}

/// Build a `terms` filter for `field`, or `None` when no usable value remains.
pub fn terms_filter(field: &str, values: &[String]) -> Option<Value> {
    let expanded: Vec<&str> = values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    if expanded.is_empty() {
        None
    } else {
        Some(json!({ "terms": { field: expanded } }))
    }
}

fn level_aggregations(level1_size: usize, level2_size: usize) -> Value {
    json!({
        "by_level1": { "terms": { "field": "level1", "size": level1_size } },
        "by_level2": { "terms": { "field": "level2", "size": level2_size } }
    })
}

/// Compose the body of a filtered full-text search.
///
/// Level filters go into the `filter` clause so that they restrict hits without affecting
/// scoring; both dimensions must match when both are given.
pub fn build_search_body(params: &SearchParams) -> Value {
    let query_text = params.q.trim();
    let must = if query_text.is_empty() {
        json!([{ "match_all": {} }])
    } else {
        json!([{
            "multi_match": {
                "query": query_text,
                "fields": ["title^3", "content"],
                "fuzziness": "AUTO"
            }
        }])
    };

    let filters: Vec<Value> = [
        terms_filter("level1", &params.level1),
        terms_filter("level2", &params.level2),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut body = Map::new();
    body.insert("from".into(), json!(params.from));
    body.insert("size".into(), json!(params.size));
    body.insert("_source".into(), json!(SEARCH_SOURCE_FIELDS));
    body.insert(
        "query".into(),
        json!({
            "bool": {
                "must": must,
                "filter": filters
            }
        }),
    );
    body.insert("aggs".into(), level_aggregations(FACET_SIZE, FACET_SIZE));
    body.insert(
        "highlight".into(),
        json!({
            "fields": {
                "title": {},
                "content": { "fragment_size": 160, "number_of_fragments": 1 }
            },
            "pre_tags": ["<mark>"],
            "post_tags": ["</mark>"]
        }),
    );
    if params.sort == SortOrder::Recency {
        body.insert(
            "sort".into(),
            json!([{ "modified_at": { "order": "desc" } }]),
        );
    }
    Value::Object(body)
}

/// Aggregation-only body listing the available level1/level2 values.
pub fn build_filters_body() -> Value {
    json!({
        "size": 0,
        "aggs": level_aggregations(FACET_SIZE, FACET_SIZE)
    })
}

/// Prefix query over the search-as-you-type `suggest` field.
pub fn build_suggest_body(q: &str) -> Value {
    json!({
        "size": SUGGEST_SIZE,
        "_source": ["title", "level1", "level2"],
        "query": {
            "multi_match": {
                "query": q,
                "type": "bool_prefix",
                "fields": ["suggest", "suggest._2gram", "suggest._3gram"]
            }
        }
    })
}

/// Aggregation body used to count indexed documents per level.
pub fn build_stats_body() -> Value {
    json!({
        "size": 0,
        "track_total_hits": true,
        "aggs": level_aggregations(500, 1000)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(q: &str, level1: &[&str], level2: &[&str]) -> SearchParams {
        SearchParams {
            q: q.into(),
            level1: level1.iter().map(|v| v.to_string()).collect(),
            level2: level2.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn terms_filter_expands_commas_and_drops_blanks() {
        let filter = terms_filter(
            "level1",
            &["Paris, Lyon".to_string(), " ".into(), "Nantes".into()],
        )
        .expect("filter");
        assert_eq!(
            filter,
            json!({ "terms": { "level1": ["Paris", "Lyon", "Nantes"] } })
        );
    }

    #[test]
    fn terms_filter_absent_without_values() {
        assert!(terms_filter("level1", &[]).is_none());
        assert!(terms_filter("level1", &[" , ".to_string()]).is_none());
    }

    #[test]
    fn empty_query_matches_all_without_filters() {
        let body = build_search_body(&params("", &[], &[]));
        assert_eq!(body["query"]["bool"]["must"], json!([{ "match_all": {} }]));
        assert_eq!(body["query"]["bool"]["filter"], json!([]));
        assert_eq!(body["from"], 0);
        assert_eq!(body["size"], DEFAULT_PAGE_SIZE);
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn text_query_uses_fuzzy_multi_match() {
        let body = build_search_body(&params("  taxi  ", &[], &[]));
        let multi = &body["query"]["bool"]["must"][0]["multi_match"];
        assert_eq!(multi["query"], "taxi");
        assert_eq!(multi["fields"], json!(["title^3", "content"]));
        assert_eq!(multi["fuzziness"], "AUTO");
    }

    #[test]
    fn level1_filter_restricts_single_dimension() {
        let body = build_search_body(&params("hotel", &["2023"], &[]));
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([{ "terms": { "level1": ["2023"] } }])
        );
    }

    #[test]
    fn both_levels_are_combined_as_separate_filters() {
        let body = build_search_body(&params("hotel", &["2023"], &["Mars"]));
        assert_eq!(
            body["query"]["bool"]["filter"],
            json!([
                { "terms": { "level1": ["2023"] } },
                { "terms": { "level2": ["Mars"] } }
            ])
        );
    }

    #[test]
    fn recency_sort_orders_by_modification_date() {
        let mut request = params("", &[], &[]);
        request.sort = SortOrder::parse(Some("recency"));
        let body = build_search_body(&request);
        assert_eq!(body["sort"], json!([{ "modified_at": { "order": "desc" } }]));
        assert_eq!(SortOrder::parse(Some("score")), SortOrder::Relevance);
    }

    #[test]
    fn search_body_requests_facets_and_highlights() {
        let body = build_search_body(&params("a", &[], &[]));
        assert_eq!(body["aggs"]["by_level1"]["terms"]["field"], "level1");
        assert_eq!(body["aggs"]["by_level2"]["terms"]["size"], 200);
        assert_eq!(body["highlight"]["pre_tags"], json!(["<mark>"]));
        assert_eq!(body["_source"], json!(SEARCH_SOURCE_FIELDS));
    }

    #[test]
    fn suggest_body_uses_bool_prefix() {
        let body = build_suggest_body("not");
        assert_eq!(body["size"], 5);
        assert_eq!(body["query"]["multi_match"]["type"], "bool_prefix");
    }

    #[test]
    fn stats_body_is_aggregation_only() {
        let body = build_stats_body();
        assert_eq!(body["size"], 0);
        assert_eq!(body["aggs"]["by_level1"]["terms"]["size"], 500);
        assert_eq!(body["aggs"]["by_level2"]["terms"]["size"], 1000);
        assert_eq!(build_filters_body()["size"], 0);
    }
}
