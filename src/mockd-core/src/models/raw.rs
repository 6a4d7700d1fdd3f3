//! Loosely shaped records as found in stores and export files.
//!
//! Every field is optional so data written by any older release decodes.
//! The migration pipeline fills the gaps, then [`RawEnvironment::finalize`]
//! turns the record into a strict [`Environment`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schema::{DEFAULT_ENVIRONMENT_NAME, DEFAULT_METHOD, DEFAULT_PORT, DEFAULT_STATUS_CODE};
use super::{CustomHeader, Environment, Route, RouteFile, RuntimeState};

/// Old releases stored status codes as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusCodeRepr {
    Number(u16),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawHeader {
    pub uuid: Option<Uuid>,
    pub key: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRouteFile {
    pub path: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub send_as_body: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRoute {
    pub uuid: Option<Uuid>,
    pub method: Option<String>,
    pub endpoint: Option<String>,
    pub body: Option<String>,
    pub status_code: Option<StatusCodeRepr>,
    pub latency: Option<u64>,
    pub custom_headers: Option<Vec<RawHeader>>,
    /// Replaced by a `Content-Type` custom header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub file: Option<RawRouteFile>,
    pub duplicates: Option<Vec<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEnvironment {
    pub uuid: Option<Uuid>,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub endpoint_prefix: Option<String>,
    pub latency: Option<u64>,
    pub routes: Option<Vec<RawRoute>>,
    pub duplicates: Option<Vec<usize>>,
    pub https: Option<bool>,
    pub cors: Option<bool>,
    pub proxy_mode: Option<bool>,
    pub proxy_host: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RawEnvironment {
    pub fn routes_mut(&mut self) -> impl Iterator<Item = &mut RawRoute> {
        self.routes.iter_mut().flatten()
    }

    /// Strict environment from a migrated record. Anything still missing
    /// falls back to the schema defaults.
    pub fn finalize(self) -> Environment {
        Environment {
            uuid: self.uuid.unwrap_or_else(Uuid::new_v4),
            name: self.name.unwrap_or_else(|| DEFAULT_ENVIRONMENT_NAME.into()),
            port: self.port.unwrap_or(DEFAULT_PORT),
            endpoint_prefix: self.endpoint_prefix.unwrap_or_default(),
            latency: self.latency.unwrap_or_default(),
            routes: self
                .routes
                .unwrap_or_default()
                .into_iter()
                .map(RawRoute::finalize)
                .collect(),
            duplicates: self.duplicates.unwrap_or_default(),
            https: self.https.unwrap_or(false),
            cors: self.cors.unwrap_or(true),
            proxy_mode: self.proxy_mode.unwrap_or(false),
            proxy_host: self.proxy_host.unwrap_or_default(),
            modified_at: self.modified_at,
            runtime: RuntimeState::default(),
        }
    }
}

impl RawRoute {
    pub fn finalize(self) -> Route {
        let status_code = match self.status_code {
            Some(StatusCodeRepr::Number(code)) => code,
            Some(StatusCodeRepr::Text(text)) => text.trim().parse().unwrap_or(DEFAULT_STATUS_CODE),
            None => DEFAULT_STATUS_CODE,
        };
        Route {
            uuid: self.uuid.unwrap_or_else(Uuid::new_v4),
            method: self.method.unwrap_or_else(|| DEFAULT_METHOD.into()),
            endpoint: self.endpoint.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            status_code,
            latency: self.latency.unwrap_or_default(),
            custom_headers: self
                .custom_headers
                .unwrap_or_default()
                .into_iter()
                .map(|h| CustomHeader {
                    uuid: h.uuid.unwrap_or_else(Uuid::new_v4),
                    key: h.key.unwrap_or_default(),
                    value: h.value.unwrap_or_default(),
                })
                .collect(),
            file: self.file.map(|f| RouteFile {
                path: f.path.unwrap_or_default(),
                filename: f.filename.unwrap_or_default(),
                mime_type: f.mime_type.unwrap_or_default(),
                send_as_body: f.send_as_body.unwrap_or(false),
            }),
            duplicates: self.duplicates.unwrap_or_default(),
        }
    }
}

impl From<Environment> for RawEnvironment {
    fn from(env: Environment) -> Self {
        Self {
            uuid: Some(env.uuid),
            name: Some(env.name),
            port: Some(env.port),
            endpoint_prefix: Some(env.endpoint_prefix),
            latency: Some(env.latency),
            routes: Some(env.routes.into_iter().map(RawRoute::from).collect()),
            duplicates: Some(env.duplicates),
            https: Some(env.https),
            cors: Some(env.cors),
            proxy_mode: Some(env.proxy_mode),
            proxy_host: Some(env.proxy_host),
            modified_at: env.modified_at,
        }
    }
}

impl From<Route> for RawRoute {
    fn from(route: Route) -> Self {
        Self {
            uuid: Some(route.uuid),
            method: Some(route.method),
            endpoint: Some(route.endpoint),
            body: Some(route.body),
            status_code: Some(StatusCodeRepr::Number(route.status_code)),
            latency: Some(route.latency),
            custom_headers: Some(
                route
                    .custom_headers
                    .into_iter()
                    .map(|h| RawHeader {
                        uuid: Some(h.uuid),
                        key: Some(h.key),
                        value: Some(h.value),
                    })
                    .collect(),
            ),
            content_type: None,
            file: route.file.map(|f| RawRouteFile {
                path: Some(f.path),
                filename: Some(f.filename),
                mime_type: Some(f.mime_type),
                send_as_body: Some(f.send_as_body),
            }),
            duplicates: Some(route.duplicates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::environment_template;

    #[test]
    fn legacy_json_decodes_with_missing_fields() {
        let raw: RawEnvironment = serde_json::from_str(
            r#"{"name":"legacy","port":3001,"routes":[{"method":"post","endpoint":"users","statusCode":"201","contentType":"text/plain"}]}"#,
        )
        .unwrap();
        assert_eq!(raw.name.as_deref(), Some("legacy"));
        assert!(raw.https.is_none());
        let routes = raw.routes.as_ref().unwrap();
        assert_eq!(routes[0].status_code, Some(StatusCodeRepr::Text("201".into())));
        assert_eq!(routes[0].content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn environment_survives_raw_conversion() {
        let env = environment_template();
        let back = RawEnvironment::from(env.clone()).finalize();
        assert_eq!(back, env);
    }
}
