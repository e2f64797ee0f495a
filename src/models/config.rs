use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Hub configuration from `statushub.yaml`, overridable by `STATUSHUB__*`
/// environment variables.
///
/// Every field has a default, so a partial (or missing) file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub log_dir: String,
    pub log_prefix: String,
    pub debug_mode: bool,
    pub console_logging: bool,

    /// Write the file log as JSON lines
    pub log_json: bool,

    /// Directory whose subdirectories are the selectable maps
    pub maps_dir: Utf8PathBuf,

    /// Directory whose subdirectories are the selectable vehicles
    pub vehicles_dir: Utf8PathBuf,

    /// Vehicle geometry file, relative to a vehicle directory
    pub vehicle_param_file: Utf8PathBuf,

    /// Sensor height file, relative to a vehicle directory
    pub sensor_height_file: Utf8PathBuf,

    pub modes: Vec<String>,
    pub modules: Vec<String>,

    pub default_mode: String,
    pub default_map: String,
    pub default_vehicle: String,

    pub preprocess: PreprocessSettings,

    /// Buffer size of the progress event feed
    pub progress_channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_prefix: "statushub".to_string(),
            debug_mode: false,
            console_logging: true,
            log_json: false,
            maps_dir: Utf8PathBuf::from("data/maps"),
            vehicles_dir: Utf8PathBuf::from("data/vehicles"),
            vehicle_param_file: Utf8PathBuf::from("vehicle_param.yaml"),
            sensor_height_file: Utf8PathBuf::from("sensor_params/lidar_height.yaml"),
            modes: vec![
                "Standard".to_string(),
                "Lidar-GNSS Calibration".to_string(),
            ],
            modules: vec![
                "Recorder".to_string(),
                "Localization".to_string(),
                "Perception".to_string(),
                "Planning".to_string(),
            ],
            default_mode: String::new(),
            default_map: String::new(),
            default_vehicle: String::new(),
            preprocess: PreprocessSettings::default(),
            progress_channel_capacity: 64,
        }
    }
}

/// Settings of the data-preprocess monitor and the `Preprocess` submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Mode name the preprocess monitor is registered under
    pub mode: String,

    /// Preprocess table location, relative to the current vehicle directory
    pub config_subpath: Utf8PathBuf,

    /// Fallback preprocess table when the vehicle has none
    pub default_config_path: Utf8PathBuf,

    /// Where submitted preprocess tables are written
    pub output_path: Utf8PathBuf,

    /// Extraction command launched after a table is submitted
    pub extract_command: String,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            mode: "Lidar-GNSS Calibration".to_string(),
            config_subpath: Utf8PathBuf::from("dreamview_conf/preprocess_table.yaml"),
            default_config_path: Utf8PathBuf::from("conf/preprocess_table.yaml"),
            output_path: Utf8PathBuf::from("data/calibration/lidar_to_gnss_user.yaml"),
            extract_command: "bash scripts/extract_data.sh -n".to_string(),
        }
    }
}

/// Vehicle geometry, read from `<vehicle_dir>/vehicle_param.yaml`.
///
/// Serialized in camelCase for the `VehicleParam` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct VehicleParam {
    pub brand: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub wheel_base: f64,
    pub front_edge_to_center: f64,
    pub back_edge_to_center: f64,
    pub left_edge_to_center: f64,
    pub right_edge_to_center: f64,
    pub min_turn_radius: f64,
    pub max_steer_angle: f64,
}

/// Mounting height of the main lidar, read from the vehicle's sensor file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorHeight {
    pub height: f64,
}

/// A data-collection/preprocess table.
///
/// The schema is owned by the extraction tooling, so the table is kept as an
/// ordered mapping of arbitrary values. It must be a mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreprocessTable {
    pub fields: IndexMap<String, serde_json::Value>,
}

impl PreprocessTable {
    /// The table as a JSON object, the seed of the progress document.
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
