//! Shared fixtures for the integration tests

use anyhow::Result;
use camino::Utf8PathBuf;
use statushub::models::VehicleParam;
use statushub::services::VehicleManager;

/// Vehicle manager with no active vehicle that accepts every switch
pub struct NoVehicle;

impl VehicleManager for NoVehicle {
    fn use_vehicle(&self, _vehicle: &str) -> Result<()> {
        Ok(())
    }
    fn vehicle_param(&self) -> VehicleParam {
        VehicleParam::default()
    }
    fn vehicle_data_path(&self) -> Option<Utf8PathBuf> {
        None
    }
}
