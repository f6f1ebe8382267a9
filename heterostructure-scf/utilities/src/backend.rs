use heterostructure_mesher::RegularGrid2d;
use heterostructure_scf::{
    constants::ELECTRON_CHARGE,
    outer_loop::poisson::{
        BackendSetup, EllipticBackend, EllipticRequest, EllipticResponse, Laplacian,
        PoissonError,
    },
};
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

/// An in-process elliptic solver assembling the discrete Laplacian as a dense matrix
///
/// Gate voltages are imposed as Dirichlet values on the outer ring: the `z` faces and the
/// sides interpolate linearly between the bottom and top voltages, and the top face outside
/// the split opening carries the split-gate voltage. Newton steps vanish on the ring.
#[derive(Debug, Default)]
pub struct DenseBackend {
    state: Option<State>,
}

#[derive(Debug)]
struct State {
    grid: RegularGrid2d<f64>,
    laplacian: Laplacian,
    /// Electrostatic potential on the outer ring, in meV / zC
    boundary: Array2<f64>,
}

impl DenseBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Convert a voltage to the electrostatic potential `phi = mu / q`
fn potential_from_voltage(voltage: f64) -> f64 {
    1000_f64 * voltage / ELECTRON_CHARGE
}

impl EllipticBackend for DenseBackend {
    fn initiate(&mut self, setup: &BackendSetup<'_>) -> Result<(), PoissonError> {
        let grid = setup.grid.clone();
        let conditions = setup.boundary_conditions;
        let half_split = 0.5 * setup.dimensions.split_width;
        let (ny, nz) = grid.shape();
        let z = grid.z_coordinates();
        let height = z[nz - 1] - z[0];
        let boundary = Array2::from_shape_fn((ny, nz), |(i, j)| {
            let y = grid.y_coordinates()[i];
            let fraction = (z[j] - z[0]) / height;
            let voltage = if j == nz - 1 && y.abs() > half_split {
                conditions.split_voltage
            } else {
                conditions.bottom_voltage
                    + fraction * (conditions.top_voltage - conditions.bottom_voltage)
            };
            potential_from_voltage(voltage)
        });
        self.state = Some(State {
            grid,
            laplacian: setup.laplacian.clone(),
            boundary,
        });
        Ok(())
    }

    fn solve(&mut self, request: &EllipticRequest<'_>) -> Result<EllipticResponse, PoissonError> {
        let state = self.state.as_ref().ok_or(PoissonError::NotInitiated)?;
        let grid = &state.grid;
        let n = grid.number_of_points();
        let mut matrix = DMatrix::<f64>::zeros(n, n);
        let mut rhs = DVector::<f64>::zeros(n);

        for i in 0..grid.ny() {
            for j in 0..grid.nz() {
                let row = grid.flat_index(i, j);
                if !grid.is_interior(i, j) {
                    matrix[(row, row)] = 1_f64;
                    rhs[row] = match request {
                        EllipticRequest::Potential { .. } => state.boundary[[i, j]],
                        EllipticRequest::NewtonStep { .. } => 0_f64,
                    };
                    continue;
                }
                let (scale, shift, source) = match request {
                    // -L(phi) = rho
                    EllipticRequest::Potential { density } => {
                        (1_f64, 0_f64, density.values()[[i, j]])
                    }
                    // (-L / q - rho') x = -g
                    EllipticRequest::NewtonStep {
                        jacobian, residual, ..
                    } => (
                        1_f64 / ELECTRON_CHARGE,
                        -jacobian.values()[[i, j]],
                        -residual.values()[[i, j]],
                    ),
                };
                let (along_y, along_z) = state.laplacian.stencil(i, j);
                matrix[(row, grid.flat_index(i - 1, j))] -= scale * along_y[0];
                matrix[(row, grid.flat_index(i + 1, j))] -= scale * along_y[2];
                matrix[(row, grid.flat_index(i, j - 1))] -= scale * along_z[0];
                matrix[(row, grid.flat_index(i, j + 1))] -= scale * along_z[2];
                matrix[(row, row)] -= scale * (along_y[1] + along_z[1]);
                matrix[(row, row)] += shift;
                rhs[row] = source;
            }
        }

        let solution = matrix
            .lu()
            .solve(&rhs)
            .expect("the discrete elliptic system is singular");
        let values = Array2::from_shape_fn(grid.shape(), |(i, j)| solution[grid.flat_index(i, j)]);
        Ok(EllipticResponse {
            field: request.density().with_values(values)?,
        })
    }
}
