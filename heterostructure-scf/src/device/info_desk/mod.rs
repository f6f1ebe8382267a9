//! Generates and returns the material properties of a planar layer stack
//!
//! This module defines the `Material` enum which represents all materials implemented
//! in the simulation software. A `DeviceInfoDesk` holds one `LayerRecord` per layer
//! and answers point queries through the `LayerLookup` trait.

mod materials;

pub use materials::Material;

use super::Device;
use crate::constants::{ELECTRON_MASS, EPSILON_0};
use miette::Diagnostic;
use nalgebra::RealField;
use num_traits::ToPrimitive;

/// Tolerance used when testing whether a coordinate lies on a layer face, in nm
const INTERFACE_TOLERANCE: f64 = 1e-9;

#[derive(thiserror::Error, Debug, Diagnostic, PartialEq)]
pub enum DeviceError {
    #[error("no layer contains the point z = {z} nm")]
    #[diagnostic(help("extend the layer stack or shrink the simulation grid"))]
    LayerNotFound { z: f64 },
    #[error("the point z = {z} nm lies inside the substrate, which ends at {zmax} nm")]
    InSubstrate { z: f64, zmax: f64 },
    #[error("{material} requires a mole fraction in [{minimum}, 1], found {fraction}")]
    Composition {
        material: String,
        fraction: f64,
        minimum: f64,
    },
    #[error("layer {index} has zmin {zmin} >= zmax {zmax}")]
    InvertedLayer { index: usize, zmin: f64, zmax: f64 },
    #[error("{0}")]
    Geometry(String),
}

/// Material parameters of a single layer, in simulation units
#[derive(Clone, Debug, PartialEq)]
pub struct LayerRecord {
    pub material: Material,
    pub zmin: f64,
    pub zmax: f64,
    /// Band gap in meV
    pub band_gap: f64,
    /// Absolute permittivity in zC^2 / meV nm
    pub permittivity: f64,
    /// Absolute conduction band effective mass in meV ps^2 / nm^2
    pub effective_mass: f64,
    pub is_substrate: bool,
}

/// Point lookup of material parameters
///
/// Implementors are shared between the worker threads of the density solver and are
/// never mutated by it.
pub trait LayerLookup: Sync {
    /// Returns the layer containing the point `(x, y, z)`
    fn layer_at(&self, x: f64, y: f64, z: f64) -> Result<&LayerRecord, DeviceError>;
}

/// Parameters of a single material which can be determined at compile time
pub(crate) struct LayerInfoDesk<T: RealField> {
    /// Band gap in meV
    pub(crate) band_gap: T,
    /// Static dielectric constant relative to the vacuum
    pub(crate) dielectric_constant: T,
    /// Effective mass relative to the free electron mass
    pub(crate) effective_mass: T,
}

/// Struct holding all the material information necessary to solve the problem
#[derive(Clone, Debug)]
pub struct DeviceInfoDesk {
    layers: Vec<LayerRecord>,
    /// The temperature the simulation is to be run at in Kelvin
    pub(crate) temperature: f64,
}

/// Split-gate geometry handed to the external elliptic solver
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceDimensions {
    pub split_width: f64,
    pub zmin: f64,
    pub pmma_depth: f64,
    pub cap_depth: f64,
    pub interface_depth: f64,
    pub buffer_depth: f64,
}

impl DeviceInfoDesk {
    /// Build directly from a list of records, checking each is well ordered
    pub fn from_records(layers: Vec<LayerRecord>, temperature: f64) -> Result<Self, DeviceError> {
        for (index, layer) in layers.iter().enumerate() {
            if layer.zmin >= layer.zmax {
                return Err(DeviceError::InvertedLayer {
                    index,
                    zmin: layer.zmin,
                    zmax: layer.zmax,
                });
            }
        }
        Ok(Self {
            layers,
            temperature,
        })
    }

    pub fn layers(&self) -> &[LayerRecord] {
        &self.layers
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// The split-gate dimensions, read from the stack relative to the surface at `z = 0`
    ///
    /// The first layer above the substrate sets the bottom of the domain and the interface
    /// depth, the next layer sets the buffer depth.
    pub fn dimensions(&self, split_width: f64) -> Result<DeviceDimensions, DeviceError> {
        let [_, well, buffer, ..] = self.layers.as_slice() else {
            return Err(DeviceError::Geometry(
                "the split gate geometry needs at least three layers".into(),
            ));
        };
        let above = self
            .layers
            .iter()
            .find(|layer| layer.zmin.abs() < INTERFACE_TOLERANCE)
            .ok_or_else(|| DeviceError::Geometry("no layer starts at the surface".into()))?;
        let below = self
            .layers
            .iter()
            .find(|layer| layer.zmax.abs() < INTERFACE_TOLERANCE)
            .ok_or_else(|| DeviceError::Geometry("no layer ends at the surface".into()))?;
        Ok(DeviceDimensions {
            split_width,
            zmin: well.zmin,
            pmma_depth: above.zmax,
            cap_depth: below.zmin,
            interface_depth: well.zmax,
            buffer_depth: buffer.zmax,
        })
    }
}

impl LayerLookup for DeviceInfoDesk {
    fn layer_at(&self, _x: f64, _y: f64, z: f64) -> Result<&LayerRecord, DeviceError> {
        // later layers take precedence on shared faces
        let layer = self
            .layers
            .iter()
            .rev()
            .find(|layer| {
                z >= layer.zmin - INTERFACE_TOLERANCE && z <= layer.zmax + INTERFACE_TOLERANCE
            })
            .ok_or(DeviceError::LayerNotFound { z })?;
        if layer.is_substrate && z < layer.zmax - INTERFACE_TOLERANCE {
            return Err(DeviceError::InSubstrate {
                z,
                zmax: layer.zmax,
            });
        }
        Ok(layer)
    }
}

/// A helper trait to build an instance of `DeviceInfoDesk`
pub trait BuildInfoDesk {
    /// Builds a single instance of `DeviceInfoDesk`
    fn build_device_info_desk(&self) -> Result<DeviceInfoDesk, DeviceError>;
}

impl<T> BuildInfoDesk for Device<T>
where
    T: Copy + RealField + ToPrimitive,
{
    fn build_device_info_desk(&self) -> Result<DeviceInfoDesk, DeviceError> {
        let records = self
            .layers
            .iter()
            .map(|layer| {
                let info: LayerInfoDesk<T> = layer.material.get_info()?;
                Ok(LayerRecord {
                    material: layer.material,
                    zmin: to_f64(layer.zmin),
                    zmax: to_f64(layer.zmax),
                    band_gap: to_f64(info.band_gap),
                    permittivity: to_f64(info.dielectric_constant) * EPSILON_0,
                    effective_mass: to_f64(info.effective_mass) * ELECTRON_MASS,
                    is_substrate: layer.material.is_substrate(),
                })
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;
        DeviceInfoDesk::from_records(records, to_f64(self.temperature))
    }
}

fn to_f64<T: ToPrimitive>(x: T) -> f64 {
    x.to_f64().unwrap_or(f64::NAN)
}
