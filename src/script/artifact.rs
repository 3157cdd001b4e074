//! Build artifact steps
//!
//! `:jenkins_artifact <host> <job> <artifact> <target> [<owner> <mode>]`
//! resolves the last successful build's artifact URL and folds the build
//! server's content fingerprint into the chain digest, so the step changes
//! whenever upstream produces a new artifact without downloading it locally.

use crate::attrs::Attributes;
use crate::connect::{self, Connection};
use crate::error::{PurserError, PurserResult};
use crate::logger::Logger;
use crate::render;
use crate::script::{chain_hash, Step};

#[derive(Debug)]
pub struct JenkinsArtifactStep {
    host: String,
    job: String,
    artifact: String,
    target: String,
    owner: String,
    mode: String,

    resolved_target: String,
    resolved_owner: String,
    resolved_mode: String,
    url: String,
    hash: String,
}

impl JenkinsArtifactStep {
    pub fn new(args: &[String]) -> PurserResult<Self> {
        if args.len() < 4 || args.len() > 6 {
            return Err(PurserError::directive(
                "jenkins artifact usage \":jenkins_artifact <host> <job> <artifact> <target> [<owner> <mode>]\"",
            ));
        }
        Ok(JenkinsArtifactStep {
            host: args[0].clone(),
            job: args[1].clone(),
            artifact: args[2].clone(),
            target: args[3].clone(),
            owner: args.get(4).cloned().unwrap_or_else(|| "root".to_string()),
            mode: args.get(5).cloned().unwrap_or_else(|| "0644".to_string()),
            resolved_target: String::new(),
            resolved_owner: String::new(),
            resolved_mode: String::new(),
            url: String::new(),
            hash: String::new(),
        })
    }

    fn fetch_fingerprint(&self) -> PurserResult<String> {
        let agent = ureq::Agent::new_with_defaults();
        let mut response = agent
            .get(format!("{}/*fingerprint*/", self.url))
            .call()
            .map_err(|e| PurserError::Artifact {
                message: e.to_string(),
            })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PurserError::Artifact {
                message: e.to_string(),
            })?;

        let fingerprint = body
            .split_once("MD5: ")
            .map(|(_, rest)| rest.split_whitespace().next().unwrap_or_default())
            .unwrap_or_default();
        if fingerprint.is_empty() {
            return Err(PurserError::Artifact {
                message: "failed to read artifact fingerprint".to_string(),
            });
        }
        Ok(fingerprint.to_string())
    }
}

impl Step for JenkinsArtifactStep {
    fn prepare(&mut self, attrs: &mut Attributes, prev_hash: &str) -> PurserResult<String> {
        let host = render::render_str("artifact host", &self.host, attrs)?;
        let job = render::render_str("artifact job", &self.job, attrs)?;
        let artifact = render::render_str("artifact path", &self.artifact, attrs)?;
        self.resolved_target = render::render_str("artifact target", &self.target, attrs)?;
        self.resolved_owner = render::render_str("artifact owner", &self.owner, attrs)?;
        self.resolved_mode = render::render_str("artifact mode", &self.mode, attrs)?;

        self.url = format!("http://{host}/job/{job}/lastSuccessfulBuild/artifact/{artifact}");
        let fingerprint = self.fetch_fingerprint()?;

        self.hash = chain_hash(
            prev_hash,
            &[
                host.as_bytes(),
                job.as_bytes(),
                artifact.as_bytes(),
                fingerprint.as_bytes(),
            ],
        );
        Ok(self.hash.clone())
    }

    fn exec(&self, logger: &Logger, conn: &dyn Connection) -> PurserResult<()> {
        let target = &self.resolved_target;
        let mut cmd = format!(
            "{{ dir=$(dirname {target}); test -d ${{dir}} || mkdir -p ${{dir}}; }} && curl -sSL {url} -o {target}",
            url = self.url,
        );
        if !self.resolved_owner.is_empty() && !self.resolved_mode.is_empty() {
            cmd.push_str(&format!(
                " && chown {owner} {target} && chmod {mode} {target}",
                owner = self.resolved_owner,
                mode = self.resolved_mode,
            ));
        }

        logger.printf(format_args!(
            "downloading file {target:?} from {url:?}",
            url = self.url
        ));
        connect::with_logged_session(conn, logger, |sess| sess.run(&connect::bash_c(&cmd)))
    }

    fn hash(&self) -> &str {
        &self.hash
    }
}
