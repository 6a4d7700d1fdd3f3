use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Route;

/// Process-local state attached by the server runtime. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeState {
    pub running: bool,
    /// Identifier of the live server instance, as handed out by the runtime.
    pub instance: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub need_restart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub uuid: Uuid,
    pub name: String,
    pub port: u16,
    pub endpoint_prefix: String,
    pub latency: u64,
    pub routes: Vec<Route>,
    #[serde(default)]
    pub duplicates: Vec<usize>,
    pub https: bool,
    pub cors: bool,
    pub proxy_mode: bool,
    pub proxy_host: String,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub runtime: RuntimeState,
}

pub type EnvironmentsCollection = Vec<Environment>;

impl Environment {
    /// Deep copy without any runtime state, ready to be written out.
    pub fn sanitized(&self) -> Environment {
        Environment {
            runtime: RuntimeState::default(),
            ..self.clone()
        }
    }

    /// Fresh identifiers for the environment and everything it owns.
    pub fn renew_uuids(&mut self) {
        self.uuid = Uuid::new_v4();
        for route in &mut self.routes {
            route.renew_uuids();
        }
    }

    pub fn touch(&mut self) {
        self.modified_at = Some(Utc::now());
        if self.runtime.running {
            self.runtime.need_restart = true;
        }
    }

    pub fn find_route_index(&self, uuid: &Uuid) -> Option<usize> {
        self.routes.iter().position(|r| r.uuid == *uuid)
    }
}

pub fn find_environment_index(environments: &[Environment], uuid: &Uuid) -> Option<usize> {
    environments.iter().position(|e| e.uuid == *uuid)
}

/// Sanitized deep copy of a whole collection.
pub fn sanitize(environments: &[Environment]) -> EnvironmentsCollection {
    environments.iter().map(Environment::sanitized).collect()
}
