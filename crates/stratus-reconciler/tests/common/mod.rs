//! Recording fake transport shared by the integration tests.

use std::sync::Mutex;

use serde_json::Value;

use stratus_arm::ResourceTransport;
use stratus_core::{BoxFuture, ResourceId, StratusError};

/// In-memory transport that records every call. `create_or_update`
/// stores the payload as the new remote state, so successive reconciles
/// behave like they would against a real provider.
#[derive(Default)]
pub struct FakeTransport {
    pub remote: Mutex<Option<Value>>,
    pub listing: Mutex<Vec<Value>>,
    pub gets: Mutex<usize>,
    pub puts: Mutex<Vec<Value>>,
    pub list_filters: Mutex<Vec<Option<String>>>,
    pub deletes: Mutex<usize>,
    /// Simulate a permission/transport failure on reads.
    pub fail_get: bool,
    /// Simulate the resource vanishing between fetch and delete.
    pub delete_races_to_absent: bool,
}

impl FakeTransport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_remote(remote: Value) -> Self {
        Self {
            remote: Mutex::new(Some(remote)),
            ..Self::default()
        }
    }

    pub fn write_count(&self) -> usize {
        self.puts.lock().unwrap().len() + *self.deletes.lock().unwrap()
    }

    pub fn last_put(&self) -> Option<Value> {
        self.puts.lock().unwrap().last().cloned()
    }
}

impl ResourceTransport for FakeTransport {
    fn get<'a>(
        &'a self,
        id: &'a ResourceId,
        _api_version: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StratusError>> {
        Box::pin(async move {
            *self.gets.lock().unwrap() += 1;
            if self.fail_get {
                return Err(StratusError::transport("get", id, "503 Service Unavailable"));
            }
            Ok(self.remote.lock().unwrap().clone())
        })
    }

    fn create_or_update<'a>(
        &'a self,
        _id: &'a ResourceId,
        _api_version: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<Value, StratusError>> {
        Box::pin(async move {
            self.puts.lock().unwrap().push(payload.clone());
            *self.remote.lock().unwrap() = Some(payload.clone());
            Ok(payload.clone())
        })
    }

    fn delete<'a>(
        &'a self,
        _id: &'a ResourceId,
        _api_version: &'a str,
    ) -> BoxFuture<'a, Result<bool, StratusError>> {
        Box::pin(async move {
            *self.deletes.lock().unwrap() += 1;
            if self.delete_races_to_absent {
                return Ok(false);
            }
            let existed = self.remote.lock().unwrap().take().is_some();
            Ok(existed)
        })
    }

    fn list<'a>(
        &'a self,
        _collection_path: &'a str,
        _api_version: &'a str,
        filter: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Value>, StratusError>> {
        Box::pin(async move {
            self.list_filters
                .lock()
                .unwrap()
                .push(filter.map(String::from));
            Ok(self.listing.lock().unwrap().clone())
        })
    }
}
