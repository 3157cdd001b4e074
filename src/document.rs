//! Document loading
//!
//! Turns a parsed document into a [`Resource`], expanding includes and
//! templates. Attribute scopes are copied, never shared: every include and
//! package works on its own merged set, and a visited-path stack guards
//! against include cycles.
//!
//! Scope precedence, strongest to weakest: resource > template >
//! include-site > package. The resource's own top-level attributes are not
//! part of the parse-time scope at all; they are merged over each package's
//! private set at prepare time.

use std::path::{Path, PathBuf};

use crate::attrs::Attributes;
use crate::error::{PurserError, PurserResult};
use crate::package::Package;
use crate::parser::{self, AstChild, AstNode, ScriptNode, SectionKind};
use crate::resource::Resource;
use crate::script::{self, Step, StepContext};

/// Knobs for document loading that do not come from the document itself.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Local credential store consulted by `:inject_passwords`.
    pub credentials_file: PathBuf,
    /// Login user for resources without a `Username` attribute.
    pub default_username: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            credentials_file: PathBuf::from(".passwords"),
            default_username: None,
        }
    }
}

/// Parse the document at `path` and build its resource.
pub fn read_file(path: &Path, opts: &LoadOptions) -> PurserResult<Resource> {
    let node = parser::parse_file(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    resource_from_node(dir, &node, opts)
}

/// Build a resource from document text; includes resolve relative to `dir`.
pub fn read_str(name: &str, input: &str, dir: &Path, opts: &LoadOptions) -> PurserResult<Resource> {
    let node = parser::parse_str(name, input)?;
    resource_from_node(dir, &node, opts)
}

fn resource_from_node(dir: &Path, node: &AstNode, opts: &LoadOptions) -> PurserResult<Resource> {
    match node.kind {
        SectionKind::Resource => {}
        SectionKind::Template => {
            return Err(PurserError::document(
                "can't handle templates directly, use the include mechanism",
            ))
        }
        other => {
            return Err(PurserError::document(format!(
                "unexpected node seen: {other}"
            )))
        }
    }

    let mut res = Resource::new(&node.id, &node.name);
    res.default_username = opts.default_username.clone();

    // packages inherit an empty scope here: the resource's own attributes
    // join in at prepare time
    let scope = Attributes::new();
    let mut visited = Vec::new();

    for child in &node.children {
        match child {
            AstChild::Section(section) if section.kind == SectionKind::Blueprint => {
                res.blueprint = blueprint_text(section)?;
            }
            AstChild::Section(section) => {
                res.packages
                    .extend(handle_section("", dir, &scope, section, opts, &mut visited)?);
            }
            AstChild::Attributes(list) => {
                res.attributes = res.attributes.merge(&Attributes::from_ast(list))?;
            }
            AstChild::Text(_) => {}
            AstChild::Script(_) => {
                return Err(PurserError::document("unexpected script outside a package"))
            }
        }
    }
    Ok(res)
}

fn handle_section(
    parent_id: &str,
    dir: &Path,
    scope: &Attributes,
    node: &AstNode,
    opts: &LoadOptions,
    visited: &mut Vec<PathBuf>,
) -> PurserResult<Vec<Package>> {
    match node.kind {
        SectionKind::Package => Ok(vec![package_from_node(parent_id, dir, scope, node, opts)?]),
        SectionKind::Include => expand_include(parent_id, dir, scope, node, opts, visited),
        other => Err(PurserError::document(format!(
            "unexpected node seen: {other}"
        ))),
    }
}

fn package_from_node(
    parent_id: &str,
    dir: &Path,
    scope: &Attributes,
    node: &AstNode,
    opts: &LoadOptions,
) -> PurserResult<Package> {
    let id = join_id(parent_id, &node.id);
    let ctx = StepContext {
        dir: dir.to_path_buf(),
        credentials: opts.credentials_file.clone(),
    };

    let mut attributes = scope.clone();
    let mut steps: Vec<Box<dyn Step>> = Vec::new();
    for child in &node.children {
        match child {
            AstChild::Attributes(list) => {
                attributes = attributes.merge(&Attributes::from_ast(list))?;
            }
            AstChild::Script(script) => {
                let step_id = format!("{id}_{}", steps.len());
                steps.push(script::new_step(&ctx, &step_id, script)?);
            }
            AstChild::Text(_) => {}
            AstChild::Section(section) => {
                return Err(PurserError::document(format!(
                    "unexpected node seen: {}",
                    section.kind
                )))
            }
        }
    }
    Ok(Package::new(&node.name, &id, attributes, steps))
}

fn expand_include(
    parent_id: &str,
    dir: &Path,
    scope: &Attributes,
    node: &AstNode,
    opts: &LoadOptions,
    visited: &mut Vec<PathBuf>,
) -> PurserResult<Vec<Package>> {
    let filename = dir.join(&node.name);
    if !filename.is_file() {
        return Err(PurserError::document(format!(
            "template {} does not exist",
            node.name
        )));
    }
    let canonical = filename.canonicalize()?;
    if visited.contains(&canonical) {
        return Err(PurserError::document(format!(
            "include cycle detected through {}",
            filename.display()
        )));
    }

    let template = parser::parse_file(&filename)?;
    if template.kind != SectionKind::Template {
        return Err(PurserError::document(format!(
            "expected template node, got {}",
            template.kind
        )));
    }

    // the template's own attributes outrank the include-site ones, so they
    // merge into the inherited scope first
    let mut tscope = scope.clone();
    for child in &template.children {
        if let AstChild::Attributes(list) = child {
            tscope = tscope.merge(&Attributes::from_ast(list))?;
        }
    }
    for child in &node.children {
        match child {
            AstChild::Attributes(list) => {
                tscope = tscope.merge(&Attributes::from_ast(list))?;
            }
            AstChild::Text(_) => {}
            other => {
                return Err(PurserError::document(format!(
                    "unexpected node inside an include: {other:?}"
                )))
            }
        }
    }

    let include_id = join_id(parent_id, &node.id);
    let template_dir = match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => dir.to_path_buf(),
    };

    visited.push(canonical);
    let mut packages = Vec::new();
    for child in &template.children {
        match child {
            AstChild::Section(section) => {
                packages.extend(handle_section(
                    &include_id,
                    &template_dir,
                    &tscope,
                    section,
                    opts,
                    visited,
                )?);
            }
            AstChild::Attributes(_) | AstChild::Text(_) => {}
            AstChild::Script(_) => {
                return Err(PurserError::document("unexpected script outside a package"))
            }
        }
    }
    visited.pop();
    Ok(packages)
}

fn blueprint_text(node: &AstNode) -> PurserResult<Option<String>> {
    let mut text: Option<String> = None;
    for child in &node.children {
        match child {
            AstChild::Script(ScriptNode::Shell(script)) => {
                if text.is_some() {
                    return Err(PurserError::document("only one blueprint script allowed"));
                }
                text = Some(script.clone());
            }
            AstChild::Script(ScriptNode::Directive(_)) => {
                return Err(PurserError::document("expected a literal blueprint script"))
            }
            AstChild::Text(_) => {}
            other => {
                return Err(PurserError::document(format!(
                    "unexpected node inside a blueprint: {other:?}"
                )))
            }
        }
    }
    Ok(text)
}

fn join_id(parent: &str, id: &str) -> String {
    if parent.is_empty() {
        id.to_string()
    } else {
        format!("{parent}.{id}")
    }
}
