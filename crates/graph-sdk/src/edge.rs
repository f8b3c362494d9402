//! Graph nodes and paginated edges.

use serde_json::{Map, Value};

use crate::errors::{SDKError, SDKResult, value_as_u64};
use crate::request::{GraphRequest, ParamValue, Params};
use crate::url_manipulator;

/// Declared element type of a node. Carried across pages unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    #[default]
    Node,
    User,
    Page,
    Album,
    Event,
    Group,
    Location,
    Picture,
    Application,
    Achievement,
    SessionInfo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    kind: NodeKind,
    fields: Value,
}

impl GraphNode {
    pub fn new(kind: NodeKind, fields: Value) -> Self {
        Self { kind, fields }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn fields(&self) -> &Value {
        &self.fields
    }

    pub fn into_fields(self) -> Value {
        self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Ids arrive as strings or numbers depending on the endpoint.
    pub fn id(&self) -> Option<String> {
        match self.field("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageDirection {
    Next,
    Previous,
}

impl PageDirection {
    fn paging_key(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }

    fn cursor_key(self) -> &'static str {
        match self {
            Self::Next => "after",
            Self::Previous => "before",
        }
    }

    fn opposite(self) -> Self {
        match self {
            Self::Next => Self::Previous,
            Self::Previous => Self::Next,
        }
    }
}

/// One page of a list endpoint.
#[derive(Clone, Debug)]
pub struct GraphEdge {
    request: GraphRequest,
    nodes: Vec<GraphNode>,
    metadata: Map<String, Value>,
    parent_edge_endpoint: Option<String>,
    kind: NodeKind,
}

impl GraphEdge {
    /// Nodes come from `data`; a body without a `data` list is one node.
    /// Everything except `data` is kept as metadata.
    pub fn new(
        request: GraphRequest,
        body: &Value,
        parent_edge_endpoint: Option<String>,
        kind: NodeKind,
    ) -> Self {
        let (items, metadata) = match body {
            Value::Object(object) => {
                let mut metadata = object.clone();
                let items = match metadata.remove("data") {
                    Some(Value::Array(items)) => items,
                    Some(single @ Value::Object(_)) => vec![single],
                    Some(_) | None if object.is_empty() => Vec::new(),
                    Some(_) | None => {
                        let node = Value::Object(std::mem::take(&mut metadata));
                        vec![node]
                    }
                };
                (items, metadata)
            }
            Value::Array(items) => (items.clone(), Map::new()),
            _ => (Vec::new(), Map::new()),
        };
        Self::from_parts(request, items, metadata, parent_edge_endpoint, kind)
    }

    pub fn from_parts(
        request: GraphRequest,
        items: Vec<Value>,
        metadata: Map<String, Value>,
        parent_edge_endpoint: Option<String>,
        kind: NodeKind,
    ) -> Self {
        Self {
            request,
            nodes: items
                .into_iter()
                .map(|fields| GraphNode::new(kind, fields))
                .collect(),
            metadata,
            parent_edge_endpoint,
            kind,
        }
    }

    pub fn request(&self) -> &GraphRequest {
        &self.request
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GraphNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn parent_edge_endpoint(&self) -> Option<&str> {
        self.parent_edge_endpoint.as_deref()
    }

    pub fn cursor(&self, direction: PageDirection) -> Option<&str> {
        self.metadata
            .get("paging")?
            .get("cursors")?
            .get(direction.cursor_key())?
            .as_str()
    }

    pub fn pagination_url(&self, direction: PageDirection) -> Option<&str> {
        self.metadata
            .get("paging")?
            .get(direction.paging_key())?
            .as_str()
            .filter(|url| !url.is_empty())
    }

    pub fn summary(&self) -> Option<&Value> {
        self.metadata.get("summary")
    }

    pub fn total_count(&self) -> Option<u64> {
        self.summary()?.get("total_count").and_then(value_as_u64)
    }

    /// Request for the adjacent page, or `None` at either end of the list.
    ///
    /// A `paging.next`/`paging.previous` URL wins. Otherwise the cursor is
    /// substituted into the original params against the parent edge.
    pub fn page_request(&self, direction: PageDirection) -> SDKResult<Option<GraphRequest>> {
        if self.request.method() != "GET" {
            return Err(SDKError::validation("only GET requests can be paginated"));
        }

        if let Some(url) = self.pagination_url(direction) {
            let endpoint = url_manipulator::base_graph_url_endpoint(url);
            return self
                .request
                .derive(&endpoint, Default::default())
                .map(Some);
        }

        let (Some(cursor), Some(parent)) = (self.cursor(direction), self.parent_edge_endpoint())
        else {
            return Ok(None);
        };
        // Query params on the parent or the original endpoint carry over,
        // explicit params win over both.
        let mut params: Params = url_manipulator::params_from_url(parent)
            .into_iter()
            .chain(url_manipulator::params_from_url(self.request.endpoint()))
            .map(|(key, value)| (key, ParamValue::Text(value)))
            .collect();
        params.extend(self.request.params().clone());
        params.insert(
            direction.cursor_key().to_string(),
            ParamValue::Text(cursor.to_string()),
        );
        params.remove(direction.opposite().cursor_key());
        let parent_path = parent.split('?').next().unwrap_or(parent);
        self.request.derive(parent_path, params).map(Some)
    }

    pub fn next_page_request(&self) -> SDKResult<Option<GraphRequest>> {
        self.page_request(PageDirection::Next)
    }

    pub fn previous_page_request(&self) -> SDKResult<Option<GraphRequest>> {
        self.page_request(PageDirection::Previous)
    }
}

impl<'a> IntoIterator for &'a GraphEdge {
    type Item = &'a GraphNode;
    type IntoIter = std::slice::Iter<'a, GraphNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

impl std::ops::Index<usize> for GraphEdge {
    type Output = GraphNode;

    fn index(&self, index: usize) -> &Self::Output {
        &self.nodes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::GraphApp;
    use crate::request::params;
    use crate::token::AccessToken;
    use serde_json::json;

    fn request(method: &str, params: Params) -> GraphRequest {
        GraphRequest::new(
            GraphApp::new("123", "foo_secret"),
            Some(AccessToken::new("foo_token")),
            method,
            "/1337/photos",
            params,
            Some("v2.8"),
        )
        .expect("request builds")
    }

    #[test]
    fn data_list_becomes_typed_nodes() {
        let body = json!({
            "data": [{"id": "1", "name": "Foo"}, {"id": 2}],
            "summary": {"total_count": "42"}
        });
        let edge = GraphEdge::new(request("GET", Params::new()), &body, None, NodeKind::User);
        assert_eq!(edge.len(), 2);
        assert!(edge.iter().all(|node| node.kind() == NodeKind::User));
        assert_eq!(edge[0].field_str("name"), Some("Foo"));
        assert_eq!(edge[1].id().as_deref(), Some("2"));
        assert_eq!(edge.total_count(), Some(42));
        assert!(!edge.metadata().contains_key("data"));
    }

    #[test]
    fn single_object_body_is_one_node() {
        let body = json!({"id": "1337", "name": "Foo Page"});
        let edge = GraphEdge::new(request("GET", Params::new()), &body, None, NodeKind::Page);
        assert_eq!(edge.len(), 1);
        assert_eq!(edge[0].field_str("name"), Some("Foo Page"));
    }

    #[test]
    fn no_paging_means_no_page() {
        let edge = GraphEdge::new(
            request("GET", Params::new()),
            &json!({"data": []}),
            Some("/1337/photos".to_string()),
            NodeKind::Node,
        );
        assert!(edge.next_page_request().expect("GET paginates").is_none());
        assert!(edge.previous_page_request().expect("GET paginates").is_none());
    }

    #[test]
    fn paging_url_wins_over_cursor() {
        let body = json!({
            "data": [],
            "paging": {
                "cursors": {"after": "bar_after_cursor", "before": "bar_before_cursor"},
                "next": "https://graph.facebook.com/v2.8/1337/photos?limit=25&after=from_url"
            }
        });
        let edge = GraphEdge::new(
            request("GET", Params::new()),
            &body,
            Some("/1337/photos".to_string()),
            NodeKind::Picture,
        );
        let next = edge
            .next_page_request()
            .expect("GET paginates")
            .expect("next page exists");
        assert_eq!(next.endpoint(), "/1337/photos?limit=25&after=from_url");
        assert_eq!(next.graph_version(), "v2.8");
        assert_eq!(next.access_token().map(AccessToken::value), Some("foo_token"));
    }

    #[test]
    fn cursor_is_substituted_into_original_params() {
        let body = json!({
            "data": [],
            "paging": {"cursors": {"after": "bar_after_cursor", "before": "bar_before_cursor"}}
        });
        let edge = GraphEdge::new(
            request("GET", params([("limit", "10"), ("before", "stale")])),
            &body,
            Some("/1337/photos".to_string()),
            NodeKind::Picture,
        );

        let next = edge
            .next_page_request()
            .expect("GET paginates")
            .expect("next page exists");
        assert_eq!(next.endpoint(), "/1337/photos");
        assert_eq!(next.params().get("after"), Some(&ParamValue::from("bar_after_cursor")));
        assert_eq!(next.params().get("limit"), Some(&ParamValue::from("10")));
        assert!(!next.params().contains_key("before"));

        let previous = edge
            .previous_page_request()
            .expect("GET paginates")
            .expect("previous page exists");
        assert_eq!(
            previous.params().get("before"),
            Some(&ParamValue::from("bar_before_cursor"))
        );
        assert!(!previous.params().contains_key("after"));
    }

    #[test]
    fn cursor_page_keeps_params_from_the_endpoint_query() {
        let original = GraphRequest::new(
            GraphApp::new("123", "foo_secret"),
            Some(AccessToken::new("foo_token")),
            "GET",
            "/me/albums?fields=name&limit=2&after=old_cursor",
            Params::new(),
            Some("v2.8"),
        )
        .expect("request builds");
        let edge = GraphEdge::new(
            original,
            &json!({"data": [], "paging": {"cursors": {"after": "c1"}}}),
            Some("/me/albums".to_string()),
            NodeKind::Album,
        );

        let next = edge
            .next_page_request()
            .expect("GET paginates")
            .expect("next page exists");
        assert_eq!(next.endpoint(), "/me/albums");
        assert_eq!(next.params().get("fields"), Some(&ParamValue::from("name")));
        assert_eq!(next.params().get("limit"), Some(&ParamValue::from("2")));
        assert_eq!(next.params().get("after"), Some(&ParamValue::from("c1")));
        let url = next.url();
        assert!(url.contains("fields=name"));
        assert!(url.contains("limit=2"));
        assert!(!url.contains("old_cursor"));
    }

    #[test]
    fn cursor_without_parent_endpoint_yields_nothing() {
        let body = json!({"data": [], "paging": {"cursors": {"after": "a"}}});
        let edge = GraphEdge::new(request("GET", Params::new()), &body, None, NodeKind::Node);
        assert!(edge.next_page_request().expect("GET paginates").is_none());
    }

    #[test]
    fn only_get_requests_paginate() {
        let body = json!({"data": [], "paging": {"next": "https://graph.facebook.com/v2.8/x"}});
        let edge = GraphEdge::new(request("POST", Params::new()), &body, None, NodeKind::Node);
        assert!(matches!(
            edge.next_page_request(),
            Err(SDKError::Validation(_))
        ));
    }
}
