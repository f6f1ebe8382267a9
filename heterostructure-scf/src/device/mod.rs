//! Controls the deserialization and storage of the top-level device structure,
//! and the `LayerLookup` trait which yields the material information necessary
//! to run the simulation

/// The material library and the point lookup used by the solvers
pub mod info_desk;
/// The deserialization and storage of the `Device`
pub(crate) mod reader;

pub use info_desk::{
    BuildInfoDesk, DeviceDimensions, DeviceError, DeviceInfoDesk, LayerLookup, LayerRecord,
    Material,
};
pub use reader::{Device, Layer};
