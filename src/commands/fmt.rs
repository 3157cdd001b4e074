//! `purser fmt` - canonical document formatting
//!
//! Reformats documents through an AST round-trip, writing atomically and
//! preserving file permissions. `--check` reports files that would change
//! instead of rewriting them.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::parser;

pub fn run(files: &[PathBuf], check: bool) -> Result<()> {
    let mut dirty = Vec::new();
    for file in files {
        let text = std::fs::read_to_string(file)?;
        let node = parser::parse_str(&file.display().to_string(), &text)?;
        let formatted = node.to_string();
        if formatted == text {
            continue;
        }
        if check {
            dirty.push(file);
            continue;
        }
        write_atomic(file, &formatted)?;
    }

    if check && !dirty.is_empty() {
        for file in &dirty {
            println!("{}", file.display());
        }
        anyhow::bail!("{} file(s) need formatting", dirty.len());
    }
    Ok(())
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    let permissions = std::fs::metadata(path)?.permissions();
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path)?;
    Ok(())
}
