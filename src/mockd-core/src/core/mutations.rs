//! Structural changes to the collection.
//!
//! Every mutation applies synchronously under the collection write lock and
//! publishes one event before releasing it. Duplicate flags and persistence
//! catch up through the consumers, except where noted.

use chrono::Utc;
use mockd_errors::ServiceError;
use tracing::info;
use uuid::Uuid;

use super::service::{EnvironmentsService, Mutation};
use super::{check_environments_duplicates, check_routes_duplicates};
use crate::models::{
    COPY_SUFFIX, Environment, Route, environment_template, find_environment_index, route_template,
};

fn environment_mut<'a>(
    environments: &'a mut [Environment],
    uuid: &Uuid,
) -> Result<&'a mut Environment, ServiceError> {
    environments
        .iter_mut()
        .find(|e| e.uuid == *uuid)
        .ok_or(ServiceError::EnvironmentNotFound(*uuid))
}

fn check_environment_index(index: usize, len: usize) -> Result<(), ServiceError> {
    if index < len {
        Ok(())
    } else {
        Err(ServiceError::EnvironmentIndexOutOfRange { index, len })
    }
}

fn check_route_index(environment: &Environment, index: usize) -> Result<(), ServiceError> {
    if index < environment.routes.len() {
        Ok(())
    } else {
        Err(ServiceError::RouteIndexOutOfRange {
            environment: environment.uuid,
            index,
            len: environment.routes.len(),
        })
    }
}

impl EnvironmentsService {
    /// Append a fresh environment built from the template. Returns its index.
    pub fn add_environment(&self) -> Mutation<usize> {
        let mut environments = self.environments.write();
        let mut environment = environment_template();
        environment.modified_at = Some(Utc::now());
        let uuid = environment.uuid;
        environments.push(environment);
        let index = environments.len() - 1;
        let receipt = self.emit(Some(uuid));
        info!(%uuid, index, "environment added");
        Mutation {
            output: index,
            receipt,
        }
    }

    /// Append a fresh route to an environment. Returns the route index.
    pub fn add_route(&self, environment: &Uuid) -> Result<Mutation<usize>, ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, environment)?;
        target.routes.push(route_template());
        target.touch();
        let index = target.routes.len() - 1;
        let receipt = self.emit(Some(*environment));
        info!(environment = %environment, index, "route added");
        Ok(Mutation {
            output: index,
            receipt,
        })
    }

    /// Remove a route. Route duplicates of the environment are fixed before
    /// this returns since removal shifts every later index.
    pub fn remove_route(
        &self,
        environment: &Uuid,
        route_index: usize,
    ) -> Result<Mutation<Route>, ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, environment)?;
        check_route_index(target, route_index)?;
        let removed = target.routes.remove(route_index);
        check_routes_duplicates(target);
        target.touch();
        let receipt = self.emit(Some(*environment));
        info!(environment = %environment, route = %removed.uuid, "route removed");
        Ok(Mutation {
            output: removed,
            receipt,
        })
    }

    /// Remove an environment, stopping its server first when it runs.
    ///
    /// The collection lock is released while the runtime stops the server, so
    /// the environment is looked up again by UUID afterwards.
    pub async fn remove_environment(
        &self,
        index: usize,
    ) -> Result<Mutation<Environment>, ServiceError> {
        let target = {
            let environments = self.environments.read();
            check_environment_index(index, environments.len())?;
            environments[index].clone()
        };

        if target.runtime.running {
            self.runtime
                .stop(&target)
                .await
                .map_err(|source| ServiceError::Runtime {
                    environment: target.uuid,
                    source,
                })?;
        }

        let mut environments = self.environments.write();
        let index = find_environment_index(&environments, &target.uuid)
            .ok_or(ServiceError::EnvironmentNotFound(target.uuid))?;
        let mut removed = environments.remove(index);
        removed.runtime = Default::default();
        check_environments_duplicates(&mut environments);
        let receipt = self.emit(None);
        drop(environments);
        info!(uuid = %removed.uuid, "environment removed");
        Ok(Mutation {
            output: removed,
            receipt,
        })
    }

    /// Append a deep copy with fresh UUIDs and no runtime state.
    pub fn duplicate_environment(&self, index: usize) -> Result<Mutation<usize>, ServiceError> {
        let mut environments = self.environments.write();
        check_environment_index(index, environments.len())?;
        let mut copy = environments[index].sanitized();
        copy.renew_uuids();
        copy.name.push_str(COPY_SUFFIX);
        copy.duplicates.clear();
        copy.modified_at = Some(Utc::now());
        let uuid = copy.uuid;
        environments.push(copy);
        let new_index = environments.len() - 1;
        let receipt = self.emit(Some(uuid));
        info!(source = index, %uuid, "environment duplicated");
        Ok(Mutation {
            output: new_index,
            receipt,
        })
    }

    /// Append a deep copy of a route to the same environment.
    pub fn duplicate_route(
        &self,
        environment: &Uuid,
        route_index: usize,
    ) -> Result<Mutation<usize>, ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, environment)?;
        check_route_index(target, route_index)?;
        let mut copy = target.routes[route_index].clone();
        copy.renew_uuids();
        copy.duplicates.clear();
        target.routes.push(copy);
        target.touch();
        let index = target.routes.len() - 1;
        let receipt = self.emit(Some(*environment));
        info!(environment = %environment, source = route_index, "route duplicated");
        Ok(Mutation {
            output: index,
            receipt,
        })
    }

    /// Edit environment settings in place. The UUID cannot be changed.
    pub fn update_environment<F>(&self, uuid: &Uuid, edit: F) -> Result<Mutation<()>, ServiceError>
    where
        F: FnOnce(&mut Environment),
    {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, uuid)?;
        edit(target);
        target.uuid = *uuid;
        target.touch();
        let receipt = self.emit(Some(*uuid));
        Ok(Mutation { output: (), receipt })
    }

    /// Edit one route in place. The route UUID cannot be changed.
    pub fn update_route<F>(
        &self,
        environment: &Uuid,
        route: &Uuid,
        edit: F,
    ) -> Result<Mutation<()>, ServiceError>
    where
        F: FnOnce(&mut Route),
    {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, environment)?;
        let index = target
            .find_route_index(route)
            .ok_or(ServiceError::RouteNotFound {
                environment: *environment,
                route: *route,
            })?;
        edit(&mut target.routes[index]);
        target.routes[index].uuid = *route;
        target.touch();
        let receipt = self.emit(Some(*environment));
        Ok(Mutation { output: (), receipt })
    }

    /// Move an environment so it ends up at index `to`.
    pub fn move_environment(&self, from: usize, to: usize) -> Result<Mutation<()>, ServiceError> {
        let mut environments = self.environments.write();
        let len = environments.len();
        check_environment_index(from, len)?;
        check_environment_index(to, len)?;
        let moved = environments.remove(from);
        environments.insert(to, moved);
        let receipt = self.emit(None);
        Ok(Mutation { output: (), receipt })
    }

    /// Move a route inside its environment so it ends up at index `to`.
    pub fn move_route(
        &self,
        environment: &Uuid,
        from: usize,
        to: usize,
    ) -> Result<Mutation<()>, ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, environment)?;
        check_route_index(target, from)?;
        check_route_index(target, to)?;
        let moved = target.routes.remove(from);
        target.routes.insert(to, moved);
        target.touch();
        let receipt = self.emit(Some(*environment));
        Ok(Mutation { output: (), receipt })
    }

    /// Record that the runtime started serving an environment. Runtime state
    /// is never persisted, so no event is published.
    pub fn mark_started(&self, uuid: &Uuid, instance: impl Into<String>) -> Result<(), ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, uuid)?;
        target.runtime.running = true;
        target.runtime.instance = Some(instance.into());
        target.runtime.started_at = Some(Utc::now());
        target.runtime.need_restart = false;
        Ok(())
    }

    pub fn mark_stopped(&self, uuid: &Uuid) -> Result<(), ServiceError> {
        let mut environments = self.environments.write();
        let target = environment_mut(&mut environments, uuid)?;
        target.runtime = Default::default();
        Ok(())
    }
}
