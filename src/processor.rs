//! Document Processor (C7): pure transformation from a raw ORD document to
//! one safe to serve — base URL rewritten, resource definition URLs routed
//! through this server, and access strategies derived from the configured
//! authentication modes.

use serde_json::{json, Value};

use crate::config::AuthConfig;

/// Inputs the processor needs beyond the raw document itself.
pub struct ProcessingContext<'a> {
    pub base_url: &'a str,
    pub auth_methods: &'a AuthConfig,
    pub documents_sub_directory: &'a str,
}

/// Access-strategy identifiers in the order configured methods are checked.
fn access_strategies(auth: &AuthConfig) -> Vec<&'static str> {
    let mut strategies = Vec::new();
    if auth.open {
        strategies.push("open");
    }
    if auth.basic {
        strategies.push("basic-auth");
    }
    if auth.cf_mtls {
        strategies.push("sap:cmp-mtls:v1");
    }
    strategies
}

/// Applies the transformation described by SPEC §4.7 to a parsed document.
pub fn process(mut doc: Value, ctx: &ProcessingContext<'_>) -> Value {
    if let Some(instance) = doc
        .get_mut("describedSystemInstance")
        .and_then(Value::as_object_mut)
    {
        instance.insert("baseUrl".into(), json!(ctx.base_url));
    }

    for key in ["apiResources", "eventResources"] {
        if let Some(resources) = doc.get_mut(key).and_then(Value::as_array_mut) {
            for resource in resources {
                rewrite_resource(resource, ctx);
            }
        }
    }

    doc
}

fn rewrite_resource(resource: &mut Value, ctx: &ProcessingContext<'_>) {
    let Some(object) = resource.as_object_mut() else {
        return;
    };

    let ord_id = object.get("ordId").and_then(Value::as_str).map(str::to_string);

    if let Some(definitions) = object.get_mut("resourceDefinitions").and_then(Value::as_array_mut) {
        for definition in definitions {
            rewrite_definition_url(definition, ord_id.as_deref());
        }
    }

    let strategies: Vec<Value> = access_strategies(ctx.auth_methods)
        .into_iter()
        .map(|strategy| json!({ "type": strategy }))
        .collect();
    object.insert("accessStrategies".into(), Value::Array(strategies));
}

fn rewrite_definition_url(definition: &mut Value, ord_id: Option<&str>) {
    let Some(url) = definition.get("url").and_then(Value::as_str) else {
        return;
    };
    if url.starts_with("http://") || url.starts_with("https://") {
        return;
    }

    let mut rewritten = format!("/ord/v1{}", normalize_path(url));
    if let Some(ord_id) = ord_id {
        let escaped = ord_id.replace(':', "_");
        rewritten = restore_escaped_ord_id(&rewritten, &escaped, ord_id);
    }

    if let Some(object) = definition.as_object_mut() {
        object.insert("url".into(), json!(rewritten));
    }
}

fn normalize_path(url: &str) -> String {
    if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Restores a full path segment equal to the escaped ORD id (colons
/// replaced by underscores) back to the canonical id.
fn restore_escaped_ord_id(path: &str, escaped: &str, canonical: &str) -> String {
    path.split('/')
        .map(|segment| if segment == escaped { canonical } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// A single entry of the served ORD configuration document list.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfiguredDocument {
    pub url: String,
    #[serde(rename = "accessStrategies")]
    pub access_strategies: Vec<Value>,
    pub perspective: String,
}

/// Top-level configuration document served at the well-known endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrdConfiguration {
    #[serde(rename = "openResourceDiscoveryV1")]
    pub open_resource_discovery_v1: OrdConfigurationBody,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrdConfigurationBody {
    pub documents: Vec<ConfiguredDocument>,
}

/// Builds the served well-known document list from every document in the
/// snapshot, optionally filtered by `perspective`.
pub fn build_config(
    documents: &[(String, Value)],
    auth_methods: &AuthConfig,
    documents_sub_directory: &str,
    perspective_filter: Option<&str>,
) -> OrdConfiguration {
    let strategies: Vec<Value> = access_strategies(auth_methods)
        .into_iter()
        .map(|s| json!({ "type": s }))
        .collect();

    let documents = documents
        .iter()
        .filter_map(|(file_name, doc)| {
            let perspective = doc
                .get("perspective")
                .and_then(Value::as_str)
                .unwrap_or("system-instance")
                .to_string();

            if let Some(filter) = perspective_filter {
                if perspective != filter {
                    return None;
                }
            }

            let stem = file_name.trim_end_matches(".json");
            let url = format!(
                "/ord/v1/{}/{}",
                documents_sub_directory,
                urlencoding_segment(stem)
            );

            Some(ConfiguredDocument {
                url,
                access_strategies: strategies.clone(),
                perspective,
            })
        })
        .collect();

    OrdConfiguration {
        open_resource_discovery_v1: OrdConfigurationBody { documents },
    }
}

/// Indexes every `ordId` found anywhere in a document against the declaring
/// file and, where the id carries local `resourceDefinitions`, the
/// snapshot-relative path of each definition file (a sibling of the
/// documents directory, per the raw `url` field — before
/// `rewrite_definition_url` points it at `/ord/v1/...`). An id with no
/// locally servable definition (a package, a bundle, a remote-hosted
/// definition) is still indexed, with an empty path, so existence checks
/// still succeed. The same id can legitimately appear in more than one
/// document (e.g. re-exported by a bundle), hence the `Vec`.
pub fn build_fqn_map(
    documents: &[(String, Value)],
) -> std::collections::HashMap<String, Vec<(String, String)>> {
    let mut map: std::collections::HashMap<String, Vec<(String, String)>> =
        std::collections::HashMap::new();
    for (file_name, doc) in documents {
        collect_ord_ids(doc, file_name, &mut map);
    }
    map
}

fn collect_ord_ids(
    value: &Value,
    file_name: &str,
    map: &mut std::collections::HashMap<String, Vec<(String, String)>>,
) {
    match value {
        Value::Object(object) => {
            if let Some(ord_id) = object.get("ordId").and_then(Value::as_str) {
                let mut paths: Vec<String> = object
                    .get("resourceDefinitions")
                    .and_then(Value::as_array)
                    .map(|defs| defs.iter().filter_map(local_resource_path).collect())
                    .unwrap_or_default();
                if paths.is_empty() {
                    paths.push(String::new());
                }
                let entry = map.entry(ord_id.to_string()).or_default();
                for path in paths {
                    entry.push((file_name.to_string(), path));
                }
            }
            for v in object.values() {
                collect_ord_ids(v, file_name, map);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_ord_ids(v, file_name, map);
            }
        }
        _ => {}
    }
}

/// The snapshot-relative path a resource definition's raw `url` denotes,
/// or `None` for an already-absolute (remote-hosted) url.
fn local_resource_path(definition: &Value) -> Option<String> {
    let url = definition.get("url").and_then(Value::as_str)?;
    if url.starts_with("http://") || url.starts_with("https://") {
        return None;
    }
    Some(normalize_path(url).trim_start_matches('/').to_string())
}

fn urlencoding_segment(segment: &str) -> String {
    segment
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
