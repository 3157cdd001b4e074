//! Executable steps
//!
//! A package is an ordered list of steps behind one capability trait. Each
//! step folds its content into a chained digest during `prepare`; the chain
//! is what lets the engine decide which steps are still valid on the target.

mod artifact;
mod secrets;
mod shell;
mod write_file;

pub use artifact::JenkinsArtifactStep;
pub use secrets::{Credentials, InjectSecretsStep};
pub use shell::ShellStep;
pub use write_file::WriteFileStep;

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::attrs::Attributes;
use crate::connect::Connection;
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::parser::ScriptNode;

/// Context a step captures at construction time.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Directory of the source document; relative directive sources resolve
    /// against it.
    pub dir: PathBuf,
    /// Path of the local credential store.
    pub credentials: PathBuf,
}

pub trait Step: std::fmt::Debug {
    /// Resolve the step against `attrs`, fold its content onto `prev_hash`
    /// and return the new chain head. Steps may publish synthetic attributes
    /// for later steps.
    fn prepare(&mut self, attrs: &mut Attributes, prev_hash: &str) -> PurserResult<String>;

    /// Apply the step on the target.
    fn exec(&self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()>;

    /// Chain digest computed by the last `prepare`.
    fn hash(&self) -> &str;

    /// Whether the step re-executes even when its hash matches the
    /// persisted state.
    fn must_execute(&self) -> bool {
        false
    }
}

/// Build a step from a parsed script node. Directive keywords dispatch into
/// their variant here; argument rendering waits until prepare time.
pub fn new_step(ctx: &StepContext, id: &str, node: &ScriptNode) -> PurserResult<Box<dyn Step>> {
    match node {
        ScriptNode::Shell(text) => Ok(Box::new(ShellStep::new(id, text))),
        ScriptNode::Directive(line) => new_directive(ctx, line),
    }
}

fn new_directive(ctx: &StepContext, line: &str) -> PurserResult<Box<dyn Step>> {
    let mut words = line.split_whitespace();
    let keyword = words
        .next()
        .ok_or_else(|| PurserError::directive("empty directive line"))?;
    let args: Vec<String> = words.map(str::to_string).collect();

    match keyword.to_ascii_lowercase().as_str() {
        ":write_file" => Ok(Box::new(WriteFileStep::plain(&ctx.dir, &args)?)),
        ":write_template" => Ok(Box::new(WriteFileStep::template(&ctx.dir, &args)?)),
        ":jenkins_artifact" => Ok(Box::new(JenkinsArtifactStep::new(&args)?)),
        ":inject_passwords" => Ok(Box::new(InjectSecretsStep::new(&ctx.credentials, &args)?)),
        other => Err(PurserError::directive(format!("directive {other} unknown"))),
    }
}

/// Fold `parts` onto `prev` to produce the next chain digest.
pub(crate) fn chain_hash(prev: &str, parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev.as_bytes());
    for part in parts {
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}
