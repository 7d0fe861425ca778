//! VIN to internal vehicle id resolution

use std::sync::Arc;

use tracing::{debug, info, instrument};

use precond_core::{keys, PrecondError, ResolvedVehicle, Result, TokenStore};

use crate::client::Endpoint;
use crate::dispatcher::CommandDispatcher;
use crate::types::VehicleSummary;

/// Maps VINs to internal ids, caching the mapping in the store
#[derive(Clone)]
pub struct VehicleResolver {
    store: Arc<dyn TokenStore>,
}

impl VehicleResolver {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Internal id for `vin`
    pub async fn resolve(&self, dispatcher: &CommandDispatcher, vin: &str) -> Result<String> {
        self.resolve_with_state(dispatcher, vin)
            .await
            .map(|resolved| resolved.internal_id)
    }

    /// Internal id for `vin`, plus the reported state when the vehicle list
    /// had to be fetched
    #[instrument(skip(self, dispatcher))]
    pub async fn resolve_with_state(
        &self,
        dispatcher: &CommandDispatcher,
        vin: &str,
    ) -> Result<ResolvedVehicle> {
        if vin.is_empty() {
            return Err(PrecondError::InvalidRequest("No vin provided".to_string()));
        }

        let key = keys::vehicle_id(vin);
        if let Some(internal_id) = self.store.get(&key).await? {
            debug!(%internal_id, "Using cached vehicle id");
            return Ok(ResolvedVehicle {
                vin: vin.to_string(),
                internal_id,
                state: None,
            });
        }

        let response = dispatcher
            .dispatch(&Endpoint::ListVehicles, None, false)
            .await?;
        let vehicles: Vec<VehicleSummary> = response.payload()?;

        let vehicle = vehicles
            .into_iter()
            .find(|v| v.vin == vin)
            .ok_or_else(|| PrecondError::VehicleNotFound {
                vin: vin.to_string(),
            })?;

        self.store.put(&key, &vehicle.id).await?;
        info!(internal_id = %vehicle.id, state = %vehicle.state, "Resolved vehicle");

        Ok(ResolvedVehicle {
            vin: vin.to_string(),
            internal_id: vehicle.id,
            state: Some(vehicle.state),
        })
    }

    /// Drop the cached id so the next resolution fetches the list again
    pub async fn invalidate(&self, vin: &str) -> Result<()> {
        debug!(%vin, "Invalidating cached vehicle id");
        self.store.delete(&keys::vehicle_id(vin)).await
    }
}
