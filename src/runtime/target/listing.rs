//! Human readable listing of the intermediate representation

use anyhow::Result;

use crate::options::Options;

use super::super::Program;

/// Pseudo-code listing of a program, for inspection
pub struct Listing;

impl super::Target for Listing {
    fn write(mut f: impl std::io::Write, program: &Program, _options: &Options) -> Result<()> {
        write!(f, "{program}")?;
        Ok(())
    }
}
