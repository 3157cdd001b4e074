//! `purser provision` - the three-phase run over one document

use std::path::Path;

use anyhow::Result;

use crate::config::Config;
use crate::document;
use crate::logger::Logger;

pub fn run(file: &Path, credentials: Option<&Path>) -> Result<()> {
    let dir = match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let config = Config::load(dir)?;
    let mut opts = config.load_options();
    if let Some(path) = credentials {
        opts.credentials_file = path.to_path_buf();
    }

    let mut resource = document::read_file(file, &opts)?;

    let logger = Logger::new();
    resource.prepare(&logger)?;
    resource.generate(&logger)?;
    resource.provision(&logger)?;
    Ok(())
}
