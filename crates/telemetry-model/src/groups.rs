//! Sensor-group reading types
//!
//! One struct per sensor group on a station. Wire names are pinned to the
//! field names the ingestion endpoint's device template expects, so the
//! Rust names stay snake_case and serde carries the renames.

use serde::{Deserialize, Serialize};

/// Air temperature and humidity readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AirHumidity {
    #[serde(rename = "MaxAirTemp1")]
    pub max_air_temp1: f32,
    #[serde(rename = "CurAirTemp1")]
    pub cur_air_temp1: f32,
    #[serde(rename = "MinAirTemp1")]
    pub min_air_temp1: f32,
    #[serde(rename = "AirTempQ")]
    pub air_temp_q: f32,
    #[serde(rename = "AirTemp2")]
    pub air_temp2: f32,
    #[serde(rename = "AirTemp2Q")]
    pub air_temp2_q: f32,
    #[serde(rename = "RH")]
    pub rh: f32,
    #[serde(rename = "Dew_Point")]
    pub dew_point: f32,
}

/// Atmospheric pressure reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AtmosPressure {
    #[serde(rename = "AtmPressure")]
    pub atm_pressure: f32,
}

/// Pavement surface and sub-surface readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pavement {
    #[serde(rename = "PvmntTemp1")]
    pub pvmnt_temp1: f32,
    #[serde(rename = "PavementQ1")]
    pub pavement_q1: f32,
    #[serde(rename = "AltPaveTemp1")]
    pub alt_pave_temp1: f32,
    #[serde(rename = "FrzPntTemp1")]
    pub frz_pnt_temp1: f32,
    #[serde(rename = "FrzPntTemp1Q")]
    pub frz_pnt_temp1_q: f32,
    #[serde(rename = "PvmntCond")]
    pub pvmnt_cond: f32,
    #[serde(rename = "PvmntCond1Q")]
    pub pvmnt_cond1_q: f32,
    #[serde(rename = "SbAsphltTemp")]
    pub sb_asphlt_temp: f32,
    #[serde(rename = "PvBaseTemp1")]
    pub pv_base_temp1: f32,
    #[serde(rename = "PvBaseTemp1Q")]
    pub pv_base_temp1_q: f32,
    #[serde(rename = "PvmntSrfCvTh")]
    pub pvmnt_srf_cv_th: f32,
    #[serde(rename = "PvmntSrfCvThQ")]
    pub pvmnt_srf_cv_th_q: f32,
}

/// Precipitation gauge readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "GaugeTot")]
    pub gauge_tot: f32,
    #[serde(rename = "NewPrecip")]
    pub new_precip: f32,
    #[serde(rename = "HrlyPrecip")]
    pub hrly_precip: f32,
    #[serde(rename = "PrecipGaugeQ")]
    pub precip_gauge_q: f32,
    #[serde(rename = "PrecipDetRatio")]
    pub precip_det_ratio: f32,
    #[serde(rename = "PrecipDetQ")]
    pub precip_det_q: f32,
}

/// Snow depth readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Snow {
    #[serde(rename = "HS")]
    pub hs: f32,
    #[serde(rename = "HStd")]
    pub h_std: f32,
    #[serde(rename = "HrlySnow")]
    pub hrly_snow: f32,
    #[serde(rename = "SnowQ")]
    pub snow_q: f32,
}

/// Wind speed and direction readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    #[serde(rename = "MaxWindSpd")]
    pub max_wind_spd: f32,
    #[serde(rename = "MeanWindSpd")]
    pub mean_wind_spd: f32,
    #[serde(rename = "WindSpd")]
    pub wind_spd: f32,
    #[serde(rename = "WindSpdQ")]
    pub wind_spd_q: f32,
    #[serde(rename = "MeanWindDir")]
    pub mean_wind_dir: f32,
    #[serde(rename = "StDevWind")]
    pub st_dev_wind: f32,
    #[serde(rename = "WindDir")]
    pub wind_dir: f32,
    #[serde(rename = "DerimeStat")]
    pub derime_stat: f32,
}
