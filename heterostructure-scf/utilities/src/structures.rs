use heterostructure_mesher::RegularGrid2d;
use heterostructure_scf::{
    app::Configuration,
    constants::{ELECTRON_MASS, EPSILON_0},
    device::{DeviceInfoDesk, LayerRecord, Material},
};
use std::path::Path;

fn record(
    material: Material,
    zmin: f64,
    zmax: f64,
    band_gap: f64,
    relative_permittivity: f64,
) -> LayerRecord {
    LayerRecord {
        material,
        zmin,
        zmax,
        band_gap,
        permittivity: relative_permittivity * EPSILON_0,
        effective_mass: 0.067 * ELECTRON_MASS,
        is_substrate: matches!(material, Material::Substrate),
    }
}

/// A shallow split-gate stack with a 15 nm well directly above the substrate
///
/// The well has band gap `well_gap`, the barrier and cap above it sit 300 meV higher. The
/// surface is at `z = 0` with a PMMA layer above it.
pub fn split_gate_stack(well_gap: f64, temperature: f64) -> DeviceInfoDesk {
    let barrier_gap = well_gap + 300_f64;
    DeviceInfoDesk::from_records(
        vec![
            record(Material::Substrate, -200., -40., 1420., 12.9),
            record(Material::GaAs, -40., -25., well_gap, 12.9),
            record(Material::AlGaAs(0.33), -25., -5., barrier_gap, 11.9),
            record(Material::GaAs, -5., 0., barrier_gap, 12.9),
            record(Material::Pmma, 0., 50., 4500., 2.6),
        ],
        temperature,
    )
    .expect("the fixture stack is well ordered")
}

/// A grid centred on `y = 0` starting at the top of the substrate in `split_gate_stack`
pub fn small_grid(ny: usize, nz: usize) -> RegularGrid2d<f64> {
    let dy = 10_f64;
    RegularGrid2d::new([ny, nz], [dy, 5.], [-0.5 * (ny - 1) as f64 * dy, -40.])
        .expect("the fixture grid is valid")
}

/// A complete configuration for an `ny` by `nz` grid writing into `output`
pub fn test_configuration(ny: usize, nz: usize, output: &Path) -> Configuration {
    let contents = format!(
        r#"
        [grid]
        ny = {ny}
        nz = {nz}
        dy = 10.0
        dz = 5.0

        [physics]
        temperature = 1.0

        [exchange]
        enabled = true
        mixing = 0.1

        [convergence]
        maximum_iterations = 50
        damping_ratio = 0.8
        minimum_damping = 1e-3
        density_threshold = 0.12
        minimum_density_threshold = 0.005
        exchange_tolerance = 0.1
        potential_tolerance = 0.1
        warm_up_iterations = 3
        minimum_mixing = 0.03

        [poisson]
        initial_executable = "unused"
        newton_executable = "unused"
        working_directory = "."
        timeout_seconds = 10

        [device]
        split_width = 40.0

        [boundary]
        top_voltage = 0.0
        split_voltage = 0.0
        surface_charge = 0.0

        [output]
        directory = "{}"
        "#,
        output.display()
    );
    Configuration::from_toml(&contents).expect("the fixture configuration is complete")
}
