//! OpenAPI 3 documents generated from a route table

use crate::descriptor::Shape;
use crate::route::{Location, Route, Segment};
use crate::table::RouteTable;
use crate::types::status_codes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// OpenAPI specification for a whole interface tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiSpec {
    pub openapi: String,
    pub info: OpenApiInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<OpenApiServer>,
    /// Path template, then lowercase verb
    pub paths: BTreeMap<String, BTreeMap<String, OpenApiOperation>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiInfo {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiServer {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl OpenApiServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiOperation {
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<OpenApiParameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    pub responses: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Value,
}

impl OpenApiSpec {
    /// Create an empty specification
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            openapi: "3.0.3".to_string(),
            info: OpenApiInfo {
                title: title.into(),
                version: version.into(),
                description: None,
            },
            servers: Vec::new(),
            paths: BTreeMap::new(),
        }
    }

    /// Describe every route of `table`
    pub fn from_table(table: &RouteTable, title: &str, version: &str) -> Self {
        tracing::debug!(route_count = table.len(), "generating openapi spec");
        let mut spec = Self::new(title, version);
        for route in table.routes() {
            spec.paths
                .entry(template(route))
                .or_default()
                .insert(route.verb.as_str().to_ascii_lowercase(), operation(route));
        }
        spec
    }

    pub fn add_server(&mut self, server: OpenApiServer) {
        self.servers.push(server);
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// `/svc/:id` → `/svc/{id}`
fn template(route: &Route) -> String {
    if route.pattern.segments().is_empty() {
        return "/".to_string();
    }
    route
        .pattern
        .segments()
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => format!("/{}", text),
            Segment::Capture(name) => format!("/{{{}}}", name),
        })
        .collect()
}

fn operation(route: &Route) -> OpenApiOperation {
    let mut parameters = Vec::new();
    let mut fields = Map::new();
    let mut required_fields = Vec::new();
    let mut whole_body = None;

    for binding in route.visible_parameters() {
        let schema = schema(&binding.shape);
        let required = binding.is_required();
        let (name, location) = match &binding.location {
            Location::Path { capture } => (capture.clone(), "path"),
            Location::Query { key } => (key.clone(), "query"),
            Location::Header { name } => (name.clone(), "header"),
            Location::BodyField { key } => {
                if required {
                    required_fields.push(Value::String(key.clone()));
                }
                fields.insert(key.clone(), schema);
                continue;
            }
            Location::WholeBody => {
                whole_body = Some(schema);
                continue;
            }
        };
        parameters.push(OpenApiParameter {
            name,
            location: location.to_string(),
            required: required || location == "path",
            schema,
        });
    }

    let body_schema = whole_body.or_else(|| {
        (!fields.is_empty()).then(|| {
            json!({
                "type": "object",
                "properties": fields,
                "required": required_fields,
            })
        })
    });
    let request_body = body_schema.map(|schema| {
        json!({
            "required": true,
            "content": { "application/json": { "schema": schema } }
        })
    });

    let mut responses = BTreeMap::new();
    let mut headers = Map::new();
    for binding in route.returned_parameters() {
        if let Location::Header { name } = &binding.location {
            headers.insert(name.clone(), json!({ "schema": schema(&binding.shape) }));
        }
    }
    let success = match route.returns() {
        Shape::Void => (status_codes::NO_CONTENT, json!({ "description": "No content" })),
        shape => (
            status_codes::OK,
            json!({
                "description": "Success",
                "content": { "application/json": { "schema": schema(shape) } }
            }),
        ),
    };
    let (status, mut body) = success;
    if !headers.is_empty() {
        body["headers"] = Value::Object(headers);
    }
    responses.insert(status.to_string(), body);
    responses.insert("default".to_string(), json!({ "description": "Error" }));

    OpenApiOperation {
        operation_id: route.qualified_name.clone(),
        parameters,
        request_body,
        responses,
    }
}

/// JSON schema of a shape
pub fn schema(shape: &Shape) -> Value {
    match shape {
        Shape::Void | Shape::Any | Shape::Interface(_) => json!({}),
        Shape::Bool => json!({ "type": "boolean" }),
        Shape::Integer => json!({ "type": "integer" }),
        Shape::Number => json!({ "type": "number" }),
        Shape::String => json!({ "type": "string" }),
        Shape::Optional(inner) => {
            let mut inner = schema(inner);
            if let Value::Object(map) = &mut inner {
                map.insert("nullable".to_string(), Value::Bool(true));
            }
            inner
        }
        Shape::List(inner) => json!({ "type": "array", "items": schema(inner) }),
        Shape::Object { name, fields } => {
            let properties: Map<String, Value> = fields
                .iter()
                .map(|f| (f.name.clone(), schema(&f.shape)))
                .collect();
            let required: Vec<&str> = fields
                .iter()
                .filter(|f| !f.shape.is_optional())
                .map(|f| f.name.as_str())
                .collect();
            json!({
                "title": name,
                "type": "object",
                "properties": properties,
                "required": required,
            })
        }
    }
}
