//! Append-only schema upgrades.
//!
//! Every step runs on every incoming environment and leaves it untouched
//! when the shape it introduces is already there. New steps go at the end
//! of [`MIGRATIONS`]; existing ones are never edited or reordered.

use std::path::Path;

use tracing::debug;
use uuid::Uuid;

use crate::models::{
    DEFAULT_STATUS_CODE, EnvironmentsCollection, RawEnvironment, RawHeader, StatusCodeRepr,
};

pub struct Migration {
    /// Schema version this step upgrades to.
    pub id: u32,
    pub description: &'static str,
    /// Returns whether anything changed.
    pub apply: fn(&mut RawEnvironment) -> bool,
}

pub static MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "latency on environments and routes",
        apply: latency_defaults,
    },
    Migration {
        id: 2,
        description: "route contentType becomes a Content-Type header",
        apply: content_type_header,
    },
    Migration {
        id: 3,
        description: "route files get sendAsBody and a mime type",
        apply: route_file_shape,
    },
    Migration {
        id: 4,
        description: "https and cors flags",
        apply: https_and_cors,
    },
    Migration {
        id: 5,
        description: "proxy mode",
        apply: proxy_mode,
    },
    Migration {
        id: 6,
        description: "uuids on routes and headers",
        apply: missing_uuids,
    },
    Migration {
        id: 7,
        description: "numeric status codes",
        apply: numeric_status_codes,
    },
    Migration {
        id: 8,
        description: "endpoint prefix",
        apply: endpoint_prefix,
    },
];

/// Highest schema version known to this build.
pub fn current_schema_version() -> u32 {
    MIGRATIONS.last().map(|m| m.id).unwrap_or(0)
}

/// Run the whole pipeline on one record. Returns the ids of the steps that
/// changed something.
pub fn migrate_environment(raw: &mut RawEnvironment) -> Vec<u32> {
    let mut applied = Vec::new();
    for migration in MIGRATIONS {
        if (migration.apply)(raw) {
            debug!(
                "migration {} applied to {:?}: {}",
                migration.id, raw.name, migration.description
            );
            applied.push(migration.id);
        }
    }
    applied
}

pub fn migrate_collection(raws: Vec<RawEnvironment>) -> EnvironmentsCollection {
    raws.into_iter()
        .map(|mut raw| {
            migrate_environment(&mut raw);
            raw.finalize()
        })
        .collect()
}

fn fill<T>(slot: &mut Option<T>, value: impl FnOnce() -> T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value());
    true
}

fn latency_defaults(env: &mut RawEnvironment) -> bool {
    let mut changed = fill(&mut env.latency, || 0);
    for route in env.routes_mut() {
        changed |= fill(&mut route.latency, || 0);
    }
    changed
}

fn content_type_header(env: &mut RawEnvironment) -> bool {
    let mut changed = false;
    for route in env.routes_mut() {
        changed |= fill(&mut route.custom_headers, Vec::new);
        let Some(content_type) = route.content_type.take() else {
            continue;
        };
        changed = true;
        let headers = route.custom_headers.get_or_insert_with(Vec::new);
        let present = headers.iter().any(|h| {
            h.key
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case("content-type"))
        });
        if !present {
            headers.insert(
                0,
                RawHeader {
                    uuid: Some(Uuid::new_v4()),
                    key: Some("Content-Type".into()),
                    value: Some(content_type),
                },
            );
        }
    }
    changed
}

fn guess_mime(filename: &str) -> mime::Mime {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "json" => mime::APPLICATION_JSON,
        "html" | "htm" => mime::TEXT_HTML,
        "txt" => mime::TEXT_PLAIN,
        "css" => mime::TEXT_CSS,
        "csv" => mime::TEXT_CSV,
        "xml" => mime::TEXT_XML,
        "js" => mime::APPLICATION_JAVASCRIPT,
        "pdf" => mime::APPLICATION_PDF,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "svg" => mime::IMAGE_SVG,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

fn route_file_shape(env: &mut RawEnvironment) -> bool {
    let mut changed = false;
    for file in env.routes_mut().filter_map(|r| r.file.as_mut()) {
        changed |= fill(&mut file.send_as_body, || false);
        if file.filename.as_deref().is_none_or(str::is_empty) {
            let from_path = file
                .path
                .as_deref()
                .and_then(|p| Path::new(p).file_name())
                .and_then(|n| n.to_str())
                .map(str::to_owned);
            if let Some(name) = from_path {
                file.filename = Some(name);
                changed = true;
            }
        }
        if file.mime_type.as_deref().is_none_or(str::is_empty) {
            let name = file.filename.as_deref().or(file.path.as_deref()).unwrap_or("");
            file.mime_type = Some(guess_mime(name).to_string());
            changed = true;
        }
    }
    changed
}

fn https_and_cors(env: &mut RawEnvironment) -> bool {
    let https = fill(&mut env.https, || false);
    let cors = fill(&mut env.cors, || true);
    https || cors
}

fn proxy_mode(env: &mut RawEnvironment) -> bool {
    let mode = fill(&mut env.proxy_mode, || false);
    let host = fill(&mut env.proxy_host, String::new);
    mode || host
}

fn missing_uuids(env: &mut RawEnvironment) -> bool {
    let mut changed = fill(&mut env.uuid, Uuid::new_v4);
    for route in env.routes_mut() {
        changed |= fill(&mut route.uuid, Uuid::new_v4);
        for header in route.custom_headers.iter_mut().flatten() {
            changed |= fill(&mut header.uuid, Uuid::new_v4);
        }
    }
    changed
}

fn numeric_status_codes(env: &mut RawEnvironment) -> bool {
    let mut changed = false;
    for route in env.routes_mut() {
        let code = match &route.status_code {
            Some(StatusCodeRepr::Number(_)) => continue,
            Some(StatusCodeRepr::Text(text)) => text.trim().parse().unwrap_or(DEFAULT_STATUS_CODE),
            None => DEFAULT_STATUS_CODE,
        };
        route.status_code = Some(StatusCodeRepr::Number(code));
        changed = true;
    }
    changed
}

fn endpoint_prefix(env: &mut RawEnvironment) -> bool {
    fill(&mut env.endpoint_prefix, String::new)
}
