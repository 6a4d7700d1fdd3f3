use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    pub uuid: Uuid,
    pub key: String,
    pub value: String,
}

/// File served in place of the inline body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteFile {
    pub path: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub send_as_body: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub uuid: Uuid,
    /// Compared verbatim by the duplicate detector, no case folding.
    pub method: String,
    pub endpoint: String,
    pub body: String,
    pub status_code: u16,
    pub latency: u64,
    pub custom_headers: Vec<CustomHeader>,
    pub file: Option<RouteFile>,
    #[serde(default)]
    pub duplicates: Vec<usize>,
}

impl Route {
    /// Collision key used by the duplicate detector.
    pub fn signature(&self) -> (&str, &str) {
        (&self.method, &self.endpoint)
    }

    /// Give the route and all of its headers fresh identifiers.
    pub fn renew_uuids(&mut self) {
        self.uuid = Uuid::new_v4();
        for header in &mut self.custom_headers {
            header.uuid = Uuid::new_v4();
        }
    }

    pub fn header(&self, key: &str) -> Option<&CustomHeader> {
        self.custom_headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
    }
}
