use super::{DeviceError, LayerInfoDesk};
use nalgebra::RealField;

const EPSILON_R_GAAS: f64 = 12.9;
const EPSILON_R_ALAS: f64 = 10.06;
const EPSILON_R_INAS: f64 = 14.6;

#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
#[non_exhaustive]
/// Enum with all implemented material types
///
/// Alloys carry their mole fraction. As materials may be added in future this is
/// labelled as `non_exhaustive`
pub enum Material {
    GaAs,
    /// Al_x Ga_{1-x} As
    AlGaAs(f64),
    /// In_{1-x} Al_x As, only lattice matched compositions with `x >= 0.53` are supported
    InAlAs(f64),
    Pmma,
    Air,
    /// Semi-infinite GaAs substrate, only its top face lies inside the simulation domain
    Substrate,
}

impl std::fmt::Display for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Material::GaAs => write!(f, "GaAs"),
            Material::AlGaAs(x) => write!(f, "Al({x})GaAs"),
            Material::InAlAs(x) => write!(f, "InAl({x})As"),
            Material::Pmma => write!(f, "PMMA"),
            Material::Air => write!(f, "Air"),
            Material::Substrate => write!(f, "Substrate"),
        }
    }
}

impl Material {
    /// Builds an instance of `LayerInfoDesk` for the given `Material` variant
    pub(crate) fn get_info<T: Copy + RealField>(&self) -> Result<LayerInfoDesk<T>, DeviceError> {
        match *self {
            Material::GaAs => Ok(LayerInfoDesk::gaas()),
            Material::AlGaAs(x) => {
                check_fraction(self, x, 0_f64)?;
                Ok(LayerInfoDesk::algaas(from_f64(x)))
            }
            Material::InAlAs(x) => {
                check_fraction(self, x, 0.53)?;
                Ok(LayerInfoDesk::inalas(from_f64(x)))
            }
            Material::Pmma => Ok(LayerInfoDesk::pmma()),
            Material::Air => Ok(LayerInfoDesk::air()),
            Material::Substrate => Ok(LayerInfoDesk::substrate()),
        }
    }

    pub(crate) fn is_substrate(&self) -> bool {
        matches!(self, Material::Substrate)
    }
}

fn check_fraction(material: &Material, x: f64, lower: f64) -> Result<(), DeviceError> {
    if !(lower..=1_f64).contains(&x) {
        return Err(DeviceError::Composition {
            material: material.to_string(),
            fraction: x,
            minimum: lower,
        });
    }
    Ok(())
}

fn from_f64<T: RealField>(x: f64) -> T {
    T::from_subset(&x)
}

impl<T: Copy + RealField> LayerInfoDesk<T> {
    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn gaas() -> Self {
        Self {
            band_gap: 1424.0,
            dielectric_constant: from_f64(EPSILON_R_GAAS),
            effective_mass: 0.067,
        }
    }

    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn algaas(x: T) -> Self {
        // the gap turns indirect above x = 0.45
        let band_gap = if x < 0.45 {
            1424.0 + 1247.0 * x
        } else {
            1900.0 + 125.0 * x + 143.0 * x * x
        };
        let epsilon_alas: T = from_f64(EPSILON_R_ALAS);
        let epsilon_gaas: T = from_f64(EPSILON_R_GAAS);
        Self {
            band_gap,
            dielectric_constant: x * epsilon_alas + (1.0 - x) * epsilon_gaas,
            effective_mass: 0.067,
        }
    }

    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn inalas(x: T) -> Self {
        let epsilon_inas: T = from_f64(EPSILON_R_INAS);
        let epsilon_alas: T = from_f64(EPSILON_R_ALAS);
        Self {
            band_gap: 2640.0 - 2280.0 * x,
            dielectric_constant: x * epsilon_inas
                + (1.0 - x) * epsilon_alas
                + 12.5 * x * (1.0 - x),
            effective_mass: 0.067,
        }
    }

    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn pmma() -> Self {
        Self {
            band_gap: 4500.0,
            dielectric_constant: 2.6,
            effective_mass: 0.067,
        }
    }

    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn air() -> Self {
        Self {
            band_gap: 1e4,
            dielectric_constant: 1.0,
            effective_mass: 0.067,
        }
    }

    #[numeric_literals::replace_float_literals(T::from_f64(literal).unwrap())]
    fn substrate() -> Self {
        Self {
            band_gap: 1420.0,
            dielectric_constant: from_f64(EPSILON_R_GAAS),
            effective_mass: 0.067,
        }
    }
}
