//! Typed parse tree for provisioning documents
//!
//! Nodes are built once by the parser and immutable afterwards. `Display`
//! renders the canonical document text, which is what `purser fmt` writes
//! back.

use std::fmt;

/// Section kinds openable with a heading line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Resource,
    Template,
    Package,
    Include,
    Blueprint,
}

impl SectionKind {
    /// Case-insensitive lookup of a heading type.
    pub(crate) fn parse(s: &str) -> Option<SectionKind> {
        match s.to_ascii_lowercase().as_str() {
            "resource" => Some(SectionKind::Resource),
            "template" => Some(SectionKind::Template),
            "package" => Some(SectionKind::Package),
            "include" => Some(SectionKind::Include),
            "blueprint" => Some(SectionKind::Blueprint),
            _ => None,
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SectionKind::Resource => "Resource",
            SectionKind::Template => "Template",
            SectionKind::Package => "Package",
            SectionKind::Include => "Include",
            SectionKind::Blueprint => "Blueprint",
        };
        f.write_str(name)
    }
}

/// One `key: value` pair from an attribute line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// An indented block: literal shell text, or one `:`-prefixed directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptNode {
    Shell(String),
    Directive(String),
}

/// Content below a section heading.
#[derive(Debug, Clone, PartialEq)]
pub enum AstChild {
    Section(AstNode),
    Attributes(Vec<Attribute>),
    Script(ScriptNode),
    /// Free text, ignored by the engine but preserved for round-tripping
    Text(String),
}

/// A section with its heading and ordered contents.
#[derive(Debug, Clone, PartialEq)]
pub struct AstNode {
    pub kind: SectionKind,
    pub name: String,
    pub id: String,
    pub children: Vec<AstChild>,
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SectionKind::Resource | SectionKind::Template => {
                write!(f, "# {}: {} [{}]\n\n", self.kind, self.name, self.id)?;
            }
            _ => {
                write!(f, "\n## {}: {} [{}]\n\n", self.kind, self.name, self.id)?;
            }
        }
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{child}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AstChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstChild::Section(node) => write!(f, "{node}"),
            AstChild::Attributes(attrs) => {
                for attr in attrs {
                    writeln!(f, "> {}: {}", attr.key, attr.value)?;
                }
                Ok(())
            }
            AstChild::Script(ScriptNode::Shell(script)) => {
                for line in script.split('\n') {
                    writeln!(f, "    {line}")?;
                }
                Ok(())
            }
            AstChild::Script(ScriptNode::Directive(command)) => {
                writeln!(f, "    {command}")
            }
            AstChild::Text(text) => f.write_str(text),
        }
    }
}
