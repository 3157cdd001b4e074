//! `purser parse` - dump the parsed tree

use std::path::Path;

use anyhow::Result;

use crate::parser;

pub fn run(file: &Path) -> Result<()> {
    let node = parser::parse_file(file)?;
    print!("{node}");
    Ok(())
}
