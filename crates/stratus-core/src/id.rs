use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite key addressing one resource under Azure Resource Manager.
///
/// Child resources (an elastic pool under a SQL server, a virtual network
/// rule under a server) extend the route with further type/name pairs via
/// [`ResourceId::child`].
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// Provider namespace, e.g. "microsoft.insights" or "Microsoft.Sql".
    pub namespace: String,
    /// Type/name pairs, outermost first, e.g. `[("servers", "srv1"),
    /// ("elasticPools", "pool1")]`.
    pub route: Vec<(String, String)>,
}

impl ResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        namespace: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            namespace: namespace.into(),
            route: vec![(resource_type.into(), name.into())],
        }
    }

    /// Extend the route with a child resource.
    pub fn child(mut self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        self.route.push((resource_type.into(), name.into()));
        self
    }

    /// The resource name (innermost route segment).
    pub fn name(&self) -> &str {
        self.route
            .last()
            .map(|(_, name)| name.as_str())
            .unwrap_or_default()
    }

    /// Full ARM resource path, starting with `/subscriptions/...`.
    pub fn path(&self) -> String {
        let mut path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}",
            self.subscription_id, self.resource_group, self.namespace
        );
        for (resource_type, name) in &self.route {
            path.push('/');
            path.push_str(resource_type);
            path.push('/');
            path.push_str(name);
        }
        path
    }

    /// Collection path for a top-level resource type in a resource group,
    /// without naming any one resource. Used for list calls.
    pub fn collection(
        subscription_id: &str,
        resource_group: &str,
        namespace: &str,
        resource_type: &str,
    ) -> String {
        format!(
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{namespace}/{resource_type}"
        )
    }

    /// Path of a child collection under this resource, e.g. the
    /// `elasticPools` under one server.
    pub fn child_collection(&self, resource_type: &str) -> String {
        format!("{}/{}", self.path(), resource_type)
    }

    /// Path of the collection this resource belongs to (everything up to,
    /// and including, the innermost resource type). Used for list calls.
    pub fn collection_path(&self) -> String {
        let path = self.path();
        match path.rfind('/') {
            Some(idx) => path[..idx].to_string(),
            None => path,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = self
            .route
            .last()
            .map(|(t, _)| t.as_str())
            .unwrap_or_default();
        write!(f, "{}/{}/{}", self.resource_group, kind, self.name())
    }
}
