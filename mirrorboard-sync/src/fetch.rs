//! Remote State Fetcher.
//!
//! Every tracked parent is fetched once per pass. Calls run concurrently and
//! are individually bounded by a timeout; one parent's failure never affects
//! another's result.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::join_all;

use mirrorboard_core::{FetchError, Identity, InstanceRecord, ParentStatus, RemoteDirectory};

use crate::registry::ParentRegistry;

/// Instances fetched successfully during this pass, per identity.
pub type Fetched = BTreeMap<Identity, Vec<InstanceRecord>>;

/// Fetch one identity, bounded by `timeout`.
pub async fn fetch_one(
    directory: &dyn RemoteDirectory,
    identity: &Identity,
    timeout: Duration,
) -> Result<Vec<InstanceRecord>, FetchError> {
    match tokio::time::timeout(timeout, directory.fetch_instances(identity)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Fetch every tracked parent and record the outcome on the registry.
///
/// Success sets `status = ok` and replaces the parent's instance list.
/// Failure sets `status = error` and leaves the previous list untouched.
/// Returns the successful results, which are the only ones the child
/// reconciler acts on.
pub async fn fetch_all(
    directory: &dyn RemoteDirectory,
    registry: &mut ParentRegistry,
    timeout: Duration,
) -> (Fetched, Vec<Identity>) {
    let identities = registry.identities();
    let results = join_all(
        identities
            .iter()
            .map(|identity| fetch_one(directory, identity, timeout)),
    )
    .await;

    let mut fetched = Fetched::new();
    let mut failed = Vec::new();
    for (identity, result) in identities.into_iter().zip(results) {
        let Some(parent) = registry.get_mut(&identity) else {
            continue;
        };
        match result {
            Ok(instances) => {
                tracing::debug!(identity = %identity, count = instances.len(), "fetched instances");
                parent.status = ParentStatus::Ok;
                parent.instances = Some(instances.clone());
                fetched.insert(identity, instances);
            }
            Err(err) => {
                tracing::warn!(identity = %identity, error = %err, "remote fetch failed");
                parent.status = ParentStatus::Error;
                failed.push(identity);
            }
        }
    }
    (fetched, failed)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use mirrorboard_core::Node;

    use super::*;

    struct Scripted;

    #[async_trait]
    impl RemoteDirectory for Scripted {
        async fn fetch_instances(
            &self,
            identity: &Identity,
        ) -> Result<Vec<InstanceRecord>, FetchError> {
            match identity.0.as_str() {
                "good" => Ok(vec![InstanceRecord::new("i1", "good-1")]),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(vec![])
                }
                _ => Err(FetchError::Status {
                    code: 502,
                    body: "bad gateway".into(),
                }),
            }
        }
    }

    fn registry(labels: &[&str]) -> ParentRegistry {
        let nodes: Vec<Node> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| Node::parent(i.to_string(), *l))
            .collect();
        let current = nodes
            .iter()
            .map(|n| (Identity::from(n.label.as_str()), n.clone()))
            .collect();
        let mut registry = ParentRegistry::new();
        registry.reconcile(&current, &nodes);
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_isolated_per_parent() {
        let mut registry = registry(&["good", "bad", "slow"]);
        let (fetched, failed) = fetch_all(&Scripted, &mut registry, Duration::from_secs(5)).await;

        assert_eq!(fetched.keys().collect::<Vec<_>>(), [&Identity::from("good")]);
        assert_eq!(failed, vec![Identity::from("bad"), Identity::from("slow")]);
        assert_eq!(
            registry.get(&Identity::from("good")).expect("good").status,
            ParentStatus::Ok
        );
        assert_eq!(
            registry.get(&Identity::from("slow")).expect("slow").status,
            ParentStatus::Error
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_fetch_error() {
        let err = fetch_one(&Scripted, &Identity::from("slow"), Duration::from_millis(250))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_known_instances() {
        let mut registry = registry(&["bad"]);
        let previous = vec![InstanceRecord::new("i9", "kept")];
        registry
            .get_mut(&Identity::from("bad"))
            .expect("bad")
            .instances = Some(previous.clone());

        let (fetched, _) = fetch_all(&Scripted, &mut registry, Duration::from_secs(1)).await;
        assert!(fetched.is_empty());
        assert_eq!(
            registry.get(&Identity::from("bad")).expect("bad").instances,
            Some(previous)
        );
    }
}
