use super::Material;
use config::{Config, File};
use nalgebra::RealField;
use serde::{de::DeserializeOwned, Deserialize};
use std::{ops::Deref, path::PathBuf};

/// A planar layer stack, as written by the user
///
/// ```toml
/// temperature = 1.5
///
/// [[layers]]
/// material = { AlGaAs = 0.33 }
/// zmin = -60.0
/// zmax = -10.0
/// ```
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Device<T: RealField> {
    pub(crate) temperature: T,
    pub(crate) layers: Vec<Layer<T>>,
}

impl<T: RealField> Deref for Device<T> {
    type Target = Vec<Layer<T>>;

    fn deref(&self) -> &Self::Target {
        &self.layers
    }
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Layer<T: RealField> {
    pub(crate) material: Material,
    pub(crate) zmin: T,
    pub(crate) zmax: T,
}

impl<T: DeserializeOwned + RealField> Device<T> {
    pub fn build(path: PathBuf) -> Result<Self, config::ConfigError> {
        let s = Config::builder().add_source(File::from(path)).build()?;
        s.try_deserialize()
    }
}
