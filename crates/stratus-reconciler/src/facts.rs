//! Read-only fact gathering.
//!
//! One get/list pair per resource family. Every function is a pure read:
//! zero writes, results normalized to the same flat shape the reconciler
//! diffs against, and "not found" reported as `None` rather than an
//! error.

use serde_json::Value;

use stratus_arm::ResourceTransport;
use stratus_core::{norm, ResourceId, StratusError};

use crate::handlers::autoscale;
use crate::handlers::sql_server;

const SQL_PREVIEW_API_VERSION: &str = "2015-05-01-preview";

fn sql_server_id(subscription_id: &str, resource_group: &str, server: &str) -> ResourceId {
    ResourceId::new(subscription_id, resource_group, "Microsoft.Sql", "servers", server)
}

pub async fn get_autoscale_setting(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    name: &str,
) -> Result<Option<Value>, StratusError> {
    let id = ResourceId::new(
        subscription_id,
        resource_group,
        "microsoft.insights",
        "autoscalesettings",
        name,
    );
    let remote = transport.get(&id, autoscale::API_VERSION).await?;
    Ok(remote.map(|r| autoscale::normalize_setting(&r)))
}

pub async fn list_autoscale_settings(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection = ResourceId::collection(
        subscription_id,
        resource_group,
        "microsoft.insights",
        "autoscalesettings",
    );
    let items = transport.list(&collection, autoscale::API_VERSION, None).await?;
    Ok(items.iter().map(autoscale::normalize_setting).collect())
}

pub async fn get_sql_server(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    name: &str,
) -> Result<Option<Value>, StratusError> {
    let id = sql_server_id(subscription_id, resource_group, name);
    let remote = transport.get(&id, sql_server::API_VERSION).await?;
    Ok(remote.map(|r| norm::flatten_resource(&r)))
}

pub async fn list_sql_servers(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection =
        ResourceId::collection(subscription_id, resource_group, "Microsoft.Sql", "servers");
    let items = transport.list(&collection, sql_server::API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

pub async fn get_elastic_pool(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    name: &str,
) -> Result<Option<Value>, StratusError> {
    let id = sql_server_id(subscription_id, resource_group, server).child("elasticPools", name);
    let remote = transport.get(&id, sql_server::API_VERSION).await?;
    Ok(remote.map(|r| norm::flatten_resource(&r)))
}

pub async fn list_elastic_pools(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection =
        sql_server_id(subscription_id, resource_group, server).child_collection("elasticPools");
    let items = transport.list(&collection, sql_server::API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

pub async fn get_virtual_network_rule(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    name: &str,
) -> Result<Option<Value>, StratusError> {
    let id =
        sql_server_id(subscription_id, resource_group, server).child("virtualNetworkRules", name);
    let remote = transport.get(&id, SQL_PREVIEW_API_VERSION).await?;
    Ok(remote.map(|r| norm::flatten_resource(&r)))
}

pub async fn list_virtual_network_rules(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection = sql_server_id(subscription_id, resource_group, server)
        .child_collection("virtualNetworkRules");
    let items = transport.list(&collection, SQL_PREVIEW_API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

pub async fn get_encryption_protector(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    name: &str,
) -> Result<Option<Value>, StratusError> {
    let id = sql_server_id(subscription_id, resource_group, server)
        .child("encryptionProtector", name);
    let remote = transport.get(&id, SQL_PREVIEW_API_VERSION).await?;
    Ok(remote.map(|r| norm::flatten_resource(&r)))
}

pub async fn list_encryption_protectors(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection = sql_server_id(subscription_id, resource_group, server)
        .child_collection("encryptionProtector");
    let items = transport.list(&collection, SQL_PREVIEW_API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

/// Usage metrics for one database. List-only: the provider exposes no
/// per-metric get.
pub async fn list_database_usages(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    database: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection = sql_server_id(subscription_id, resource_group, server)
        .child("databases", database)
        .child_collection("usages");
    let items = transport.list(&collection, sql_server::API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

/// Metric values for one database. `filter` is an OData expression
/// narrowing which metrics come back, e.g.
/// `name/value eq 'cpu_percent' and timeGrain eq duration'PT5M'`.
pub async fn list_database_metrics(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    database: &str,
    filter: Option<&str>,
) -> Result<Vec<Value>, StratusError> {
    let collection = sql_server_id(subscription_id, resource_group, server)
        .child("databases", database)
        .child_collection("metrics");
    let items = transport
        .list(&collection, sql_server::API_VERSION, filter)
        .await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}

/// The metrics a database can report, with their units and supported
/// aggregations.
pub async fn list_database_metric_definitions(
    transport: &dyn ResourceTransport,
    subscription_id: &str,
    resource_group: &str,
    server: &str,
    database: &str,
) -> Result<Vec<Value>, StratusError> {
    let collection = sql_server_id(subscription_id, resource_group, server)
        .child("databases", database)
        .child_collection("metricDefinitions");
    let items = transport.list(&collection, sql_server::API_VERSION, None).await?;
    Ok(items.iter().map(norm::flatten_resource).collect())
}
