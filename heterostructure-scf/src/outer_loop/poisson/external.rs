//! Elliptic solves delegated to an external program
//!
//! Fields are written as text tables into the working directory, the program is run as
//! `<executable> -p <parameter file>` and its result file is parsed back onto the grid. The
//! program's stdout and stderr are appended to `poisson.log` in the working directory.

use super::{
    exchange_format::{read_values, write_key_values, write_table},
    BackendSetup, EllipticBackend, EllipticRequest, EllipticResponse, PoissonError,
};
use serde::Deserialize;
use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::{Duration, Instant},
};

const DENSITY_FILE: &str = "car_dens.dat";
const JACOBIAN_FILE: &str = "rho_prime.dat";
const RESIDUAL_FILE: &str = "gphi.dat";
const EXCHANGE_FILE: &str = "xc_pot.dat";
const BOUNDARY_FILE: &str = "boundary_conditions.dat";
const LOG_FILE: &str = "poisson.log";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Executables and files used by the external solver
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SubprocessSettings {
    pub initial_executable: PathBuf,
    pub newton_executable: PathBuf,
    pub initial_parameter_file: PathBuf,
    pub newton_parameter_file: PathBuf,
    pub initial_result_file: PathBuf,
    pub newton_result_file: PathBuf,
    pub working_directory: PathBuf,
    pub timeout_seconds: u64,
}

#[derive(Debug)]
pub struct SubprocessBackend {
    settings: SubprocessSettings,
}

impl SubprocessBackend {
    pub fn new(settings: SubprocessSettings) -> Self {
        Self { settings }
    }

    fn path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.settings.working_directory.join(file)
    }

    /// Run `executable -p parameter_file` in the working directory and wait for it
    fn run(&self, executable: &Path, parameter_file: &Path) -> Result<(), PoissonError> {
        let program = locate(executable, &self.settings.working_directory)?;
        let command = format!("{} -p {}", program.display(), parameter_file.display());

        let log_path = self.path(LOG_FILE);
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| PoissonError::io(&log_path, e))?;
        let log_err = log.try_clone().map_err(|e| PoissonError::io(&log_path, e))?;

        tracing::debug!(%command, "Running the elliptic solver");
        let mut child = Command::new(&program)
            .arg("-p")
            .arg(parameter_file)
            .current_dir(&self.settings.working_directory)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .spawn()
            .map_err(|e| PoissonError::io(&program, e))?;

        let timeout = Duration::from_secs(self.settings.timeout_seconds);
        let start = Instant::now();
        loop {
            match child.try_wait().map_err(|e| PoissonError::io(&program, e))? {
                Some(status) if status.success() => return Ok(()),
                Some(status) => {
                    return Err(PoissonError::NonZeroExit {
                        command,
                        status: status.to_string(),
                    })
                }
                None if start.elapsed() > timeout => {
                    // the child may exit between the poll and the kill, both outcomes are fine
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(PoissonError::Timeout {
                        command,
                        seconds: self.settings.timeout_seconds,
                    });
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn read_result(
        &self,
        file: &Path,
        request: &EllipticRequest<'_>,
    ) -> Result<EllipticResponse, PoissonError> {
        let density = request.density();
        let (ny, nz) = density.shape();
        let values = read_values(&self.path(file), ny * nz)?;
        // the point count is checked on read, files are row-major like the grid
        let mut field = density.map(|_| 0_f64);
        for (point, value) in field.values_mut().iter_mut().zip(values) {
            *point = value;
        }
        Ok(EllipticResponse { field })
    }
}

/// Resolve an executable to an absolute path
///
/// Paths with more than one component are taken relative to the working directory, bare
/// names are looked up in the working directory and then on the `PATH`.
fn locate(executable: &Path, working_directory: &Path) -> Result<PathBuf, PoissonError> {
    let not_found = || PoissonError::ExecutableNotFound {
        executable: executable.to_path_buf(),
    };
    let candidate = if executable.is_absolute() || executable.components().count() > 1 {
        Some(working_directory.join(executable)).filter(|path| path.is_file())
    } else {
        Some(working_directory.join(executable))
            .filter(|path| path.is_file())
            .or_else(|| {
                std::env::var_os("PATH").and_then(|paths| {
                    std::env::split_paths(&paths)
                        .map(|dir| dir.join(executable))
                        .find(|path| path.is_file())
                })
            })
    };
    candidate
        .and_then(|path| std::fs::canonicalize(path).ok())
        .ok_or_else(not_found)
}

impl EllipticBackend for SubprocessBackend {
    fn initiate(&mut self, setup: &BackendSetup<'_>) -> Result<(), PoissonError> {
        let dimensions = setup.dimensions;
        let boundary = setup.boundary_conditions;
        write_key_values(
            &self.path(BOUNDARY_FILE),
            &[
                ("ny", setup.grid.ny() as f64),
                ("nz", setup.grid.nz() as f64),
                ("dy", setup.grid.dy()),
                ("dz", setup.grid.dz()),
                ("ymin", setup.grid.ymin()),
                ("zmin", setup.grid.zmin()),
                ("split_width", dimensions.split_width),
                ("zmin_pot", dimensions.zmin),
                ("pmma_depth", dimensions.pmma_depth),
                ("cap_depth", dimensions.cap_depth),
                ("interface_depth", dimensions.interface_depth),
                ("buffer_depth", dimensions.buffer_depth),
                ("top_V", boundary.top_voltage),
                ("split_V", boundary.split_voltage),
                ("bottom_V", boundary.bottom_voltage),
                ("surface", boundary.surface_charge),
            ],
        )
    }

    fn solve(&mut self, request: &EllipticRequest<'_>) -> Result<EllipticResponse, PoissonError> {
        match request {
            EllipticRequest::Potential { density } => {
                write_table(&self.path(DENSITY_FILE), density)?;
                self.run(
                    &self.settings.initial_executable,
                    &self.settings.initial_parameter_file,
                )?;
                self.read_result(&self.settings.initial_result_file, request)
            }
            EllipticRequest::NewtonStep {
                density,
                jacobian,
                residual,
                exchange_difference,
            } => {
                write_table(&self.path(DENSITY_FILE), density)?;
                write_table(&self.path(JACOBIAN_FILE), jacobian)?;
                write_table(&self.path(RESIDUAL_FILE), residual)?;
                write_table(&self.path(EXCHANGE_FILE), exchange_difference)?;
                self.run(
                    &self.settings.newton_executable,
                    &self.settings.newton_parameter_file,
                )?;
                self.read_result(&self.settings.newton_result_file, request)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{SubprocessBackend, SubprocessSettings};
    use crate::{
        fields::GridField,
        outer_loop::poisson::{EllipticBackend, EllipticRequest, PoissonError},
    };
    use heterostructure_mesher::RegularGrid2d;
    use std::path::PathBuf;

    fn settings(directory: PathBuf, executable: &str) -> SubprocessSettings {
        SubprocessSettings {
            initial_executable: PathBuf::from(executable),
            newton_executable: PathBuf::from(executable),
            initial_parameter_file: PathBuf::from("split_gate.in"),
            newton_parameter_file: PathBuf::from("newton.in"),
            initial_result_file: PathBuf::from("phi.dat"),
            newton_result_file: PathBuf::from("x.dat"),
            working_directory: directory,
            timeout_seconds: 5,
        }
    }

    fn directory(name: &str) -> PathBuf {
        let directory = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&directory).unwrap();
        directory
    }

    #[test]
    fn missing_executables_are_reported() {
        let directory = directory("heterostructure_missing_solver");
        let mut backend =
            SubprocessBackend::new(settings(directory.clone(), "no-such-elliptic-solver-binary"));
        let grid = RegularGrid2d::new([3, 3], [1., 1.], [0., 0.]).unwrap();
        let density = GridField::zeros(&grid);
        let result = backend.solve(&EllipticRequest::Potential { density: &density });
        std::fs::remove_dir_all(&directory).unwrap();
        assert!(matches!(result, Err(PoissonError::ExecutableNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn results_are_parsed_back_onto_the_grid() {
        use std::os::unix::fs::PermissionsExt;
        let directory = directory("heterostructure_fake_solver");
        let script = directory.join("fake_solver.sh");
        std::fs::write(&script, "#!/bin/sh\nfor i in 1 2 3 4 5 6 7 8 9; do echo $i; done > phi.dat\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut backend = SubprocessBackend::new(settings(directory.clone(), "./fake_solver.sh"));
        let grid = RegularGrid2d::new([3, 3], [1., 1.], [0., 0.]).unwrap();
        let density = GridField::zeros(&grid);
        let response = backend
            .solve(&EllipticRequest::Potential { density: &density })
            .unwrap();
        let written = directory.join("car_dens.dat").is_file();
        std::fs::remove_dir_all(&directory).unwrap();

        assert!(written);
        assert_eq!(response.field.values()[[1, 0]], 4.);
        assert_eq!(response.field.values()[[2, 2]], 9.);
    }

    #[cfg(unix)]
    #[test]
    fn failing_solvers_report_their_command() {
        use std::os::unix::fs::PermissionsExt;
        let directory = directory("heterostructure_failing_solver");
        let script = directory.join("failing_solver.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut backend =
            SubprocessBackend::new(settings(directory.clone(), "./failing_solver.sh"));
        let grid = RegularGrid2d::new([3, 3], [1., 1.], [0., 0.]).unwrap();
        let density = GridField::zeros(&grid);
        let result = backend.solve(&EllipticRequest::Potential { density: &density });
        std::fs::remove_dir_all(&directory).unwrap();

        match result {
            Err(PoissonError::NonZeroExit { command, .. }) => {
                assert!(command.ends_with("-p split_gate.in"))
            }
            other => panic!("expected a non-zero exit, found {other:?}"),
        }
    }
}
