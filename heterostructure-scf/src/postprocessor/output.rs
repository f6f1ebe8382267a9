use super::PostProcessorError;
use crate::{
    error::DataFileError,
    fields::{GridField, SpinResolved},
};
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub struct OutputWriterBuilder<RefDirectory> {
    directory: RefDirectory,
}

impl OutputWriterBuilder<()> {
    pub fn new() -> Self {
        Self { directory: () }
    }
}

impl Default for OutputWriterBuilder<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefDirectory> OutputWriterBuilder<RefDirectory> {
    /// Attach the results directory, created on `build` if it is missing
    pub fn with_directory<Directory: ?Sized>(
        self,
        directory: &Directory,
    ) -> OutputWriterBuilder<&Directory> {
        OutputWriterBuilder { directory }
    }
}

impl<'a> OutputWriterBuilder<&'a Path> {
    pub fn build(self) -> Result<OutputWriter, PostProcessorError> {
        std::fs::create_dir_all(self.directory)
            .map_err(|e| DataFileError::io(self.directory, e))?;
        Ok(OutputWriter {
            directory: self.directory.to_path_buf(),
        })
    }
}

/// Writes one file per quantity into the results directory
#[derive(Clone, Debug)]
pub struct OutputWriter {
    directory: PathBuf,
}

impl OutputWriter {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// `dens_2D_raw.dat` and the two spin channels
    pub fn write_density(&self, density: &SpinResolved) -> Result<(), PostProcessorError> {
        density
            .spin_summed()
            .write_to_file(self.directory.join("dens_2D_raw.dat"))?;
        density
            .up()
            .write_to_file(self.directory.join("dens_2D_up_raw.dat"))?;
        density
            .down()
            .write_to_file(self.directory.join("dens_2D_down_raw.dat"))?;
        Ok(())
    }

    /// The band structure minus the chemical potential
    pub fn write_potential(&self, band_structure: &GridField) -> Result<(), PostProcessorError> {
        Ok(band_structure.write_to_file(self.directory.join("potential.dat"))?)
    }

    /// The band structure minus the potential of the gates alone, with no charge in the device
    pub fn write_bare_potential(
        &self,
        band_structure: &GridField,
    ) -> Result<(), PostProcessorError> {
        Ok(band_structure.write_to_file(self.directory.join("bare_pot.dat"))?)
    }

    /// The effective single-particle potential, band structure minus chemical potential plus
    /// exchange correlation
    pub fn write_kohn_sham_potential(
        &self,
        potential: &GridField,
    ) -> Result<(), PostProcessorError> {
        Ok(potential.write_to_file(self.directory.join("pot_KS.dat"))?)
    }

    pub fn write_exchange(&self, exchange: &GridField) -> Result<(), PostProcessorError> {
        Ok(exchange.write_to_file(self.directory.join("xc_pot.dat"))?)
    }

    /// Final density minus the density recomputed at the final potential
    pub fn write_density_error(&self, error: &GridField) -> Result<(), PostProcessorError> {
        Ok(error.write_to_file(self.directory.join("density_error.dat"))?)
    }

    pub fn write_surface_charge(&self, surface_charge: f64) -> Result<(), PostProcessorError> {
        self.write_lines("surface_charge.dat", std::iter::once(surface_charge))
    }

    /// Occupied longitudinal energies in meV, one per line
    pub fn write_energies(&self, energies: &[f64]) -> Result<(), PostProcessorError> {
        self.write_lines("energies.dat", energies.iter().copied())
    }

    fn write_lines(
        &self,
        name: &str,
        values: impl Iterator<Item = f64>,
    ) -> Result<(), PostProcessorError> {
        let path = self.directory.join(name);
        let mut file = std::fs::File::create(&path).map_err(|e| DataFileError::io(&path, e))?;
        for value in values {
            writeln!(file, "{}", value).map_err(|e| DataFileError::io(&path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::OutputWriterBuilder;
    use crate::fields::{GridField, SpinResolved};
    use heterostructure_mesher::RegularGrid2d;

    #[test]
    fn every_quantity_lands_in_its_own_file() {
        let directory = std::env::temp_dir().join("heterostructure_output_writer");
        let writer = OutputWriterBuilder::new()
            .with_directory(directory.as_path())
            .build()
            .unwrap();
        let grid = RegularGrid2d::new([3, 4], [1., 1.], [0., 0.]).unwrap();
        let total = GridField::from_element(&grid, -2.);

        writer
            .write_density(&SpinResolved::from_total(&total))
            .unwrap();
        writer.write_surface_charge(0.25).unwrap();
        writer.write_energies(&[-3.5, -1.]).unwrap();
        writer.write_bare_potential(&total.scale(3.)).unwrap();
        writer.write_kohn_sham_potential(&total).unwrap();

        let up = std::fs::read_to_string(directory.join("dens_2D_up_raw.dat")).unwrap();
        let energies = std::fs::read_to_string(directory.join("energies.dat")).unwrap();
        let surface = std::fs::read_to_string(directory.join("surface_charge.dat")).unwrap();
        let total_exists = directory.join("dens_2D_raw.dat").is_file();
        let bare = std::fs::read_to_string(directory.join("bare_pot.dat")).unwrap();
        let kohn_sham_exists = directory.join("pot_KS.dat").is_file();
        std::fs::remove_dir_all(&directory).unwrap();

        assert!(total_exists);
        assert!(kohn_sham_exists);
        assert_eq!(bare.lines().next(), Some("-6\t-6\t-6\t-6"));
        assert_eq!(up.lines().count(), 3);
        assert_eq!(up.lines().next(), Some("-1\t-1\t-1\t-1"));
        assert_eq!(energies, "-3.5\n-1\n");
        assert_eq!(surface.trim(), "0.25");
    }
}
