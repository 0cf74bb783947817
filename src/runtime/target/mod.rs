//! Compilation targets

use std::path::Path;

use anyhow::Result;

use crate::options::Options;

use super::Program;

mod c;
mod listing;
pub use c::C;
pub use listing::Listing;

/// Compilation target
pub trait Target {
    /// Translate the program into target code and write it to a stream.
    fn write(f: impl std::io::Write, program: &Program, options: &Options) -> Result<()>;

    /// Translate the program into target code and write it to a file.
    fn write_to_file(
        filename: impl AsRef<Path>,
        program: &Program,
        options: &Options,
    ) -> Result<()> {
        let mut f = std::fs::File::create(filename)?;
        Self::write(&mut f, program, options)
    }
}
