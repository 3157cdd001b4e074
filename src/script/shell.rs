//! Literal shell steps
//!
//! The block is rendered against the attribute set with a strict-mode
//! prologue, uploaded to the target and executed through a login shell.

use std::io::Write;

use crate::attrs::Attributes;
use crate::connect::{self, Connection};
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::package::REMOTE_STATE_DIR;
use crate::render;
use crate::script::{chain_hash, Step};

#[derive(Debug)]
pub struct ShellStep {
    id: String,
    script: String,
    rendered: String,
    hash: String,
}

impl ShellStep {
    pub fn new(id: &str, script: &str) -> Self {
        ShellStep {
            id: id.to_string(),
            script: script.to_string(),
            rendered: String::new(),
            hash: String::new(),
        }
    }
}

impl Step for ShellStep {
    fn prepare(&mut self, attrs: &mut Attributes, prev_hash: &str) -> PurserResult<String> {
        self.rendered = render::render_str(
            &self.id,
            &format!("set -e\n{}\n", self.script),
            attrs,
        )?;
        self.hash = chain_hash(prev_hash, &[self.rendered.as_bytes()]);
        Ok(self.hash.clone())
    }

    fn exec(&self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()> {
        let file = format!("{REMOTE_STATE_DIR}/{}.sh", self.hash);
        let cmd = connect::bash_c(&format!("cat - > {file} && bash -l {file}"));

        let body = self
            .rendered
            .strip_prefix("set -e\n")
            .unwrap_or(&self.rendered);
        logger.printf(format_args!("{}", body.trim()));

        connect::with_logged_session(conn, logger, |sess| {
            sess.start(&cmd)?;
            let mut stdin = sess.stdin_pipe()?;
            stdin
                .write_all(self.rendered.as_bytes())
                .map_err(|e| PurserError::remote(format!("failed to send script to target: {e}")))?;
            drop(stdin);
            sess.wait()
        })
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
