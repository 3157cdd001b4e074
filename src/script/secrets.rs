//! Secret injection steps and the local credential store
//!
//! `:inject_passwords <name>+` streams `name<TAB>value` pairs into a secret
//! file on the target and publishes per-secret synthetic attributes. The
//! step always re-executes; the secret file lives in scratch space and is
//! cleared when package state is persisted.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::attrs::Attributes;
use crate::connect::{self, Connection};
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::package::REMOTE_SCRATCH_DIR;
use crate::render;
use crate::script::{chain_hash, Step};

/// Local credential store: a file of `name: value` lines.
#[derive(Debug)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn load(path: &Path) -> PurserResult<Credentials> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PurserError::directive(format!(
                "failed to read credential store {}: {e}",
                path.display()
            ))
        })?;

        let mut values = BTreeMap::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                PurserError::directive(format!(
                    "invalid syntax in credential store line {}: expected \"name: value\"",
                    i + 1
                ))
            })?;
            values.insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(Credentials { values })
    }

    pub fn get(&self, name: &str) -> PurserResult<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| PurserError::SecretLookup {
                name: name.to_string(),
            })
    }
}

#[derive(Debug)]
pub struct InjectSecretsStep {
    names: Vec<String>,
    store: PathBuf,
    values: Vec<(String, String)>,
    hash: String,
}

impl InjectSecretsStep {
    pub fn new(store: &Path, args: &[String]) -> PurserResult<Self> {
        if args.is_empty() {
            return Err(PurserError::directive(
                "password injector usage \":inject_passwords <name>+\"",
            ));
        }
        Ok(InjectSecretsStep {
            names: args.to_vec(),
            store: store.to_path_buf(),
            values: Vec::new(),
            hash: String::new(),
        })
    }

    fn secret_file() -> String {
        format!("{REMOTE_SCRATCH_DIR}/passwords")
    }
}

impl Step for InjectSecretsStep {
    fn prepare(&mut self, attrs: &mut Attributes, prev_hash: &str) -> PurserResult<String> {
        let store = Credentials::load(&self.store)?;

        self.values.clear();
        for raw in &self.names {
            let name = render::render_str("secret name", raw, attrs)?;
            let value = store.get(&name)?.to_string();

            // remote lookup expression: scripts using it never embed the
            // raw secret in their rendered text
            attrs.insert(
                format!("PASSWORD_{name}"),
                format!("$(grep {name} {} | cut -f2)", Self::secret_file()),
            );
            attrs.insert(format!("PASSWORD_{name}_RAW"), value.clone());
            attrs.insert(format!("PASSWORD_{name}_QUOTED"), format!("{value:?}"));

            self.values.push((name, value));
        }

        let parts: Vec<&[u8]> = self.values.iter().map(|(_, v)| v.as_bytes()).collect();
        self.hash = chain_hash(prev_hash, &parts);
        Ok(self.hash.clone())
    }

    fn exec(&self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()> {
        logger.printf(format_args!("injecting passwords"));

        let cmd = connect::bash_c(&format!("cat - > {}", Self::secret_file()));
        connect::with_logged_session(conn, logger, |sess| {
            sess.start(&cmd)?;
            let mut stdin = sess.stdin_pipe()?;
            for (name, value) in &self.values {
                stdin
                    .write_all(format!("{name}\t{value}\n").as_bytes())
                    .map_err(|e| {
                        PurserError::remote(format!("failed to write password to target: {e}"))
                    })?;
            }
            drop(stdin);
            sess.wait()
        })
    }

    fn hash(&self) -> &str {
        &self.hash
    }

    fn must_execute(&self) -> bool {
        true
    }
}
