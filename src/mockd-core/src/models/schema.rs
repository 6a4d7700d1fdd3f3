//! Templates every new entity starts from.
//!
//! Each function builds a brand new value, so two entities created from the
//! same template never share nested vectors.

use uuid::Uuid;

use super::{CustomHeader, Environment, Route, RuntimeState};

pub const DEFAULT_ENVIRONMENT_NAME: &str = "New environment";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_METHOD: &str = "get";
pub const DEFAULT_BODY: &str = "{}";
pub const DEFAULT_STATUS_CODE: u16 = 200;
pub const COPY_SUFFIX: &str = " (copy)";

pub fn header_template() -> CustomHeader {
    CustomHeader {
        uuid: Uuid::new_v4(),
        key: "Content-Type".into(),
        value: mime::APPLICATION_JSON.to_string(),
    }
}

pub fn route_template() -> Route {
    Route {
        uuid: Uuid::new_v4(),
        method: DEFAULT_METHOD.into(),
        endpoint: String::new(),
        body: DEFAULT_BODY.into(),
        status_code: DEFAULT_STATUS_CODE,
        latency: 0,
        custom_headers: vec![header_template()],
        file: None,
        duplicates: vec![],
    }
}

pub fn environment_template() -> Environment {
    Environment {
        uuid: Uuid::new_v4(),
        name: DEFAULT_ENVIRONMENT_NAME.into(),
        port: DEFAULT_PORT,
        endpoint_prefix: String::new(),
        latency: 0,
        routes: vec![route_template()],
        duplicates: vec![],
        https: false,
        cors: true,
        proxy_mode: false,
        proxy_host: String::new(),
        modified_at: None,
        runtime: RuntimeState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_template_has_one_route_with_one_header() {
        let env = environment_template();
        assert_eq!(env.routes.len(), 1);
        assert_eq!(env.routes[0].custom_headers.len(), 1);
        assert_eq!(env.routes[0].custom_headers[0].key, "Content-Type");
        assert_eq!(env.routes[0].custom_headers[0].value, "application/json");
        assert!(env.cors);
        assert!(!env.runtime.running);
    }

    #[test]
    fn templates_never_repeat_uuids() {
        let a = environment_template();
        let b = environment_template();
        assert_ne!(a.uuid, b.uuid);
        assert_ne!(a.routes[0].uuid, b.routes[0].uuid);
        assert_ne!(a.routes[0].custom_headers[0].uuid, b.routes[0].custom_headers[0].uuid);
    }
}
