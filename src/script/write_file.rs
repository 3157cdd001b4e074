//! File and template transfer steps
//!
//! `:write_file <source> <target> [<owner> <mode>]` copies a local file to a
//! remote path; `:write_template` renders the source against the attribute
//! set first. The chain digest covers target path, ownership and content
//! bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::attrs::Attributes;
use crate::connect::{self, Connection};
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::render;
use crate::script::{chain_hash, Step};

#[derive(Debug)]
pub struct WriteFileStep {
    dir: PathBuf,
    source: String,
    target: String,
    owner: String,
    mode: String,
    render: bool,

    resolved_target: String,
    resolved_owner: String,
    resolved_mode: String,
    content: Vec<u8>,
    hash: String,
}

impl WriteFileStep {
    pub fn plain(dir: &Path, args: &[String]) -> PurserResult<Self> {
        Self::new(dir, args, false)
    }

    pub fn template(dir: &Path, args: &[String]) -> PurserResult<Self> {
        Self::new(dir, args, true)
    }

    fn new(dir: &Path, args: &[String], render: bool) -> PurserResult<Self> {
        if args.len() != 2 && args.len() != 4 {
            return Err(PurserError::directive(
                "write file/template usage \":write_file <source> <target> [<owner> <mode>]\"",
            ));
        }
        Ok(WriteFileStep {
            dir: dir.to_path_buf(),
            source: args[0].clone(),
            target: args[1].clone(),
            owner: args.get(2).cloned().unwrap_or_default(),
            mode: args.get(3).cloned().unwrap_or_default(),
            render,
            resolved_target: String::new(),
            resolved_owner: String::new(),
            resolved_mode: String::new(),
            content: Vec::new(),
            hash: String::new(),
        })
    }

    fn read_source(&self, attrs: &Attributes, source: &str) -> PurserResult<Vec<u8>> {
        let path = if Path::new(source).is_absolute() {
            PathBuf::from(source)
        } else {
            self.dir.join(source)
        };
        if !path.is_file() {
            return Err(PurserError::directive(format!(
                "source file {} does not exist",
                path.display()
            )));
        }
        if self.render {
            Ok(render::render_file(&path, attrs)?.into_bytes())
        } else {
            Ok(std::fs::read(&path)?)
        }
    }
}

impl Step for WriteFileStep {
    fn prepare(&mut self, attrs: &mut Attributes, prev_hash: &str) -> PurserResult<String> {
        let source = render::render_str("write source", &self.source, attrs)?;
        self.resolved_target = render::render_str("write target", &self.target, attrs)?;
        self.resolved_owner = render::render_str("write owner", &self.owner, attrs)?;
        self.resolved_mode = render::render_str("write mode", &self.mode, attrs)?;
        self.content = self.read_source(attrs, &source)?;

        self.hash = chain_hash(
            prev_hash,
            &[
                self.resolved_target.as_bytes(),
                self.resolved_owner.as_bytes(),
                self.resolved_mode.as_bytes(),
                &self.content,
            ],
        );
        Ok(self.hash.clone())
    }

    fn exec(&self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()> {
        let target = &self.resolved_target;
        let mut cmd = format!(
            "{{ dir=$(dirname {target}); test -d ${{dir}} || mkdir -p ${{dir}}; }} && cat - > {target}"
        );
        if !self.resolved_owner.is_empty() && !self.resolved_mode.is_empty() {
            cmd.push_str(&format!(
                " && chown {owner} {target} && chmod {mode} {target}",
                owner = self.resolved_owner,
                mode = self.resolved_mode,
            ));
        }

        logger.printf(format_args!("writing file {target:?}"));
        connect::with_logged_session(conn, logger, |sess| {
            sess.start(&connect::bash_c(&cmd))?;
            let mut stdin = sess.stdin_pipe()?;
            stdin
                .write_all(&self.content)
                .map_err(|e| PurserError::remote(format!("failed to send file to target: {e}")))?;
            drop(stdin);
            sess.wait()
        })
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_arity_is_two_or_four() {
        let dir = tempdir().unwrap();
        assert!(WriteFileStep::plain(dir.path(), &args(&["only"])).is_err());
        assert!(WriteFileStep::plain(dir.path(), &args(&["a", "b", "owner"])).is_err());
        assert!(WriteFileStep::plain(dir.path(), &args(&["a", "b"])).is_ok());
        assert!(WriteFileStep::plain(dir.path(), &args(&["a", "b", "root", "0644"])).is_ok());
    }

    #[test]
    fn test_missing_source_fails_at_prepare() {
        let dir = tempdir().unwrap();
        let mut step = WriteFileStep::plain(dir.path(), &args(&["nope", "/etc/nope"])).unwrap();
        let err = step.prepare(&mut Attributes::new(), "").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_hash_covers_target_owner_mode_and_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("motd"), "welcome\n").unwrap();

        let mut attrs = Attributes::new();
        let mut base = WriteFileStep::plain(dir.path(), &args(&["motd", "/etc/motd"])).unwrap();
        let h0 = base.prepare(&mut attrs, "").unwrap();

        let mut other_target =
            WriteFileStep::plain(dir.path(), &args(&["motd", "/etc/motd2"])).unwrap();
        assert_ne!(h0, other_target.prepare(&mut attrs, "").unwrap());

        let mut with_perms =
            WriteFileStep::plain(dir.path(), &args(&["motd", "/etc/motd", "root", "0644"]))
                .unwrap();
        assert_ne!(h0, with_perms.prepare(&mut attrs, "").unwrap());

        fs::write(dir.path().join("motd"), "changed\n").unwrap();
        let mut changed = WriteFileStep::plain(dir.path(), &args(&["motd", "/etc/motd"])).unwrap();
        assert_ne!(h0, changed.prepare(&mut attrs, "").unwrap());
    }

    #[test]
    fn test_template_source_is_rendered() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("motd.tpl"), "host {{ Hostname }}\n").unwrap();

        let mut attrs: Attributes = [("Hostname".to_string(), "db01".to_string())]
            .into_iter()
            .collect();
        let mut step =
            WriteFileStep::template(dir.path(), &args(&["motd.tpl", "/etc/motd"])).unwrap();
        step.prepare(&mut attrs, "").unwrap();
        assert_eq!(step.content, b"host db01\n");
    }

    #[test]
    fn test_templated_target_is_resolved_at_prepare() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("motd"), "x").unwrap();

        let mut attrs: Attributes = [("Dest".to_string(), "/etc/motd".to_string())]
            .into_iter()
            .collect();
        let mut step =
            WriteFileStep::plain(dir.path(), &args(&["motd", "{{ Dest }}"])).unwrap();
        step.prepare(&mut attrs, "").unwrap();
        assert_eq!(step.resolved_target, "/etc/motd");
    }
}
