//! File access for on-disk delta pairs.
//!
//! A toolchain that produces updates for `<assembly>` writes two co-located
//! files per generation: `<assembly>.<generation>.dmeta` (metadata delta) and
//! `<assembly>.<generation>.dil` (IL delta), starting at generation 1. This
//! module memory-maps such a pair so the coordinator can hand the raw bytes to
//! the delta reader without copying them first; the reader produces a fully
//! owned [`crate::metadata::delta::DeltaImage`], after which the maps are
//! dropped.

pub mod io;
pub mod parser;

use std::{fs::File, path::Path};

use memmap2::Mmap;

use crate::Result;

/// A memory-mapped `.dmeta`/`.dil` pair for one generation of one assembly.
#[derive(Debug)]
pub struct DeltaPair {
    dmeta: Mmap,
    dil: Mmap,
}

impl DeltaPair {
    /// Map the delta pair for `generation` of the assembly at `assembly_path`.
    ///
    /// The expected file names are `<assembly_path>.<generation>.dmeta` and
    /// `<assembly_path>.<generation>.dil`.
    ///
    /// # Errors
    /// [`crate::Error::FileError`] if either file cannot be opened or mapped.
    pub fn open(assembly_path: &Path, generation: u32) -> Result<Self> {
        let dmeta_path = delta_file_name(assembly_path, generation, "dmeta");
        let dil_path = delta_file_name(assembly_path, generation, "dil");

        let dmeta_file = File::open(&dmeta_path)?;
        let dil_file = File::open(&dil_path)?;

        // Safety: the maps are read-only and private to this process. A
        // concurrent writer truncating the file could still fault us, which is
        // the standard mmap caveat and acceptable for tooling-produced files.
        let dmeta = unsafe { Mmap::map(&dmeta_file)? };
        let dil = unsafe { Mmap::map(&dil_file)? };

        Ok(DeltaPair { dmeta, dil })
    }

    /// The raw metadata delta bytes.
    #[must_use]
    pub fn dmeta(&self) -> &[u8] {
        &self.dmeta
    }

    /// The raw IL delta bytes.
    #[must_use]
    pub fn dil(&self) -> &[u8] {
        &self.dil
    }
}

/// Build `<assembly_path>.<generation>.<suffix>`.
fn delta_file_name(assembly_path: &Path, generation: u32, suffix: &str) -> std::path::PathBuf {
    let mut name = assembly_path.as_os_str().to_os_string();
    name.push(format!(".{generation}.{suffix}"));
    name.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_file_name() {
        let path = Path::new("/tmp/App.dll");
        assert_eq!(
            delta_file_name(path, 1, "dmeta"),
            Path::new("/tmp/App.dll.1.dmeta")
        );
        assert_eq!(
            delta_file_name(path, 12, "dil"),
            Path::new("/tmp/App.dll.12.dil")
        );
    }

    #[test]
    fn test_open_missing_pair() {
        let err = DeltaPair::open(Path::new("/nonexistent/App.dll"), 1).unwrap_err();
        assert!(matches!(err, crate::Error::FileError(_)));
    }
}
