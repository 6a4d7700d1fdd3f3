use crate::models::Environment;

/// Indices of every other element sharing `key` with element `i`, for all `i`.
fn collisions<'a, T, K: PartialEq>(items: &'a [T], key: impl Fn(&'a T) -> K) -> Vec<Vec<usize>> {
    let keys: Vec<K> = items.iter().map(key).collect();
    (0..keys.len())
        .map(|i| {
            keys.iter()
                .enumerate()
                .filter(|(j, other)| *j != i && **other == keys[i])
                .map(|(j, _)| j)
                .collect()
        })
        .collect()
}

/// Flag routes of one environment sharing the same method and endpoint.
pub fn check_routes_duplicates(environment: &mut Environment) {
    let found = collisions(&environment.routes, |r| r.signature());
    for (route, duplicates) in environment.routes.iter_mut().zip(found) {
        route.duplicates = duplicates;
    }
}

/// Flag environments listening on the same port.
pub fn check_environments_duplicates(environments: &mut [Environment]) {
    let found = collisions(environments, |e| e.port);
    for (environment, duplicates) in environments.iter_mut().zip(found) {
        environment.duplicates = duplicates;
    }
}
