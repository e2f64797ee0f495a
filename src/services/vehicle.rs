use crate::config::ConfigManager;
use crate::models::{SensorHeight, VehicleParam};
use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use std::sync::{PoisonError, RwLock};

/// Vehicle collaborator: owns the active vehicle profile.
pub trait VehicleManager: Send + Sync {
    /// Switch to `vehicle`, reloading its geometry and sensor parameters.
    fn use_vehicle(&self, vehicle: &str) -> Result<()>;

    /// Geometry of the active vehicle (defaults when none is active).
    fn vehicle_param(&self) -> VehicleParam;

    /// Data directory of the active vehicle.
    fn vehicle_data_path(&self) -> Option<Utf8PathBuf>;
}

#[derive(Debug, Default)]
struct ActiveVehicle {
    dir: Option<Utf8PathBuf>,
    param: VehicleParam,
    sensor_height: Option<f64>,
}

/// Vehicle profiles stored as `<vehicles_dir>/<vehicle>/...` YAML files.
#[derive(Debug)]
pub struct VehicleStore {
    vehicles_dir: Utf8PathBuf,
    param_file: Utf8PathBuf,
    sensor_height_file: Utf8PathBuf,
    active: RwLock<ActiveVehicle>,
}

impl VehicleStore {
    pub fn new(
        vehicles_dir: impl Into<Utf8PathBuf>,
        param_file: impl Into<Utf8PathBuf>,
        sensor_height_file: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            vehicles_dir: vehicles_dir.into(),
            param_file: param_file.into(),
            sensor_height_file: sensor_height_file.into(),
            active: RwLock::new(ActiveVehicle::default()),
        }
    }

    /// Main lidar mounting height of the active vehicle, if it declares one
    pub fn sensor_height(&self) -> Option<f64> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sensor_height
    }
}

impl VehicleManager for VehicleStore {
    fn use_vehicle(&self, vehicle: &str) -> Result<()> {
        let dir = self.vehicles_dir.join(vehicle);
        if !dir.is_dir() {
            bail!("Vehicle {} not found in {}", vehicle, self.vehicles_dir);
        }

        let param_path = dir.join(&self.param_file);
        let param = if param_path.exists() {
            ConfigManager::load_yaml::<VehicleParam>(&param_path)?
        } else {
            tracing::warn!("No vehicle param file at {}, using defaults", param_path);
            VehicleParam::default()
        };

        let height_path = dir.join(&self.sensor_height_file);
        let sensor_height = if height_path.exists() {
            Some(ConfigManager::load_yaml::<SensorHeight>(&height_path)?.height)
        } else {
            tracing::warn!("No sensor height file at {}", height_path);
            None
        };

        // Only swap in a fully loaded profile
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = ActiveVehicle {
            dir: Some(dir),
            param,
            sensor_height,
        };

        tracing::info!(
            "Using vehicle {}: sensor_height={:?}",
            vehicle,
            sensor_height
        );
        Ok(())
    }

    fn vehicle_param(&self) -> VehicleParam {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .param
            .clone()
    }

    fn vehicle_data_path(&self) -> Option<Utf8PathBuf> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dir
            .clone()
    }
}
