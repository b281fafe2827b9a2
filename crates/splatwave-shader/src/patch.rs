//! Anchor-based patching of generated shader source

use std::fmt;

use thiserror::Error;

/// Reasons a shader source cannot be patched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The anchor statement does not occur in the source
    #[error("Anchor not found in shader source: `{anchor}`")]
    AnchorNotFound { anchor: String },

    /// The anchor statement occurs more than once
    #[error("Anchor `{anchor}` occurs {count} times in shader source, expected exactly once")]
    AmbiguousAnchor { anchor: String, count: usize },

    /// The source already carries the patch marker
    #[error("Shader source is already patched (found `{marker}`)")]
    AlreadyApplied { marker: String },

    /// An empty anchor matches everywhere and nowhere
    #[error("Anchor statement is empty")]
    EmptyAnchor,
}

/// GLSL type of a declared uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Sampler2D,
    Float,
    Vec3,
}

impl UniformKind {
    /// GLSL spelling of the type
    pub fn glsl(self) -> &'static str {
        match self {
            Self::Sampler2D => "sampler2D",
            Self::Float => "float",
            Self::Vec3 => "vec3",
        }
    }

    /// Whether the uniform is bound as a texture sampler
    pub fn is_sampler(self) -> bool {
        matches!(self, Self::Sampler2D)
    }
}

/// A top-level `uniform` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
    pub kind: UniformKind,
    pub comment: Option<String>,
}

impl UniformDecl {
    pub fn new(name: impl Into<String>, kind: UniformKind) -> Self {
        Self {
            name: name.into(),
            kind,
            comment: None,
        }
    }

    /// Attach a trailing line comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

impl fmt::Display for UniformDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uniform {} {};", self.kind.glsl(), self.name)?;
        if let Some(comment) = &self.comment {
            write!(f, " // {}", comment)?;
        }
        Ok(())
    }
}

/// A named run of shader statements inserted as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementBlock {
    pub name: String,
    pub statements: Vec<String>,
}

impl StatementBlock {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statements: Vec::new(),
        }
    }

    /// Append a statement to the block
    pub fn statement(mut self, statement: impl Into<String>) -> Self {
        self.statements.push(statement.into());
        self
    }

    /// Render one statement per line with the given indentation
    pub fn render(&self, indent: &str) -> String {
        self.render_with(indent, "\n")
    }

    /// Like [`render`](Self::render), joining lines with `eol`
    pub fn render_with(&self, indent: &str, eol: &str) -> String {
        self.statements
            .iter()
            .map(|s| format!("{}{}", indent, s))
            .collect::<Vec<_>>()
            .join(eol)
    }
}

/// The line terminator used by `source`: `\r\n` if it has any, `\n` otherwise
pub fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") { "\r\n" } else { "\n" }
}

/// Where the anchor statement sits in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSite {
    /// Byte offset of the first character of the anchor
    pub start: usize,
    /// Byte offset just past the anchor
    pub end: usize,
    /// Byte offset of the newline ending the anchor's line (or the source length)
    pub line_end: usize,
    /// Leading whitespace of the anchor's line
    pub indent: String,
}

/// Count non-overlapping occurrences of `anchor` in `source`
pub fn count_anchor(source: &str, anchor: &str) -> usize {
    if anchor.is_empty() {
        return 0;
    }
    source.matches(anchor).count()
}

/// Locate the anchor, requiring exactly one occurrence
pub fn locate_anchor(source: &str, anchor: &str) -> Result<AnchorSite, PatchError> {
    if anchor.is_empty() {
        return Err(PatchError::EmptyAnchor);
    }

    let mut matches = source.match_indices(anchor);
    let Some((start, _)) = matches.next() else {
        return Err(PatchError::AnchorNotFound {
            anchor: anchor.to_string(),
        });
    };

    let extra = matches.count();
    if extra > 0 {
        return Err(PatchError::AmbiguousAnchor {
            anchor: anchor.to_string(),
            count: extra + 1,
        });
    }

    let end = start + anchor.len();
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[end..].find('\n').map_or(source.len(), |i| end + i);
    let indent: String = source[line_start..start]
        .chars()
        .take_while(|c| c.is_whitespace())
        .collect();

    Ok(AnchorSite {
        start,
        end,
        line_end,
        indent,
    })
}

/// Insert `block` directly after the anchor, one statement per line
///
/// Anything sharing the anchor's line follows the block, so it sees the
/// block's effects. Text outside the insertion is preserved byte for byte.
pub fn insert_after_anchor(
    source: &str,
    anchor: &str,
    block: &StatementBlock,
) -> Result<String, PatchError> {
    let site = locate_anchor(source, anchor)?;
    if block.statements.is_empty() {
        return Ok(source.to_string());
    }

    let eol = line_ending(source);
    let rendered = block.render_with(&site.indent, eol);
    let mut result = String::with_capacity(source.len() + rendered.len() + eol.len());
    result.push_str(&source[..site.end]);
    result.push_str(eol);
    result.push_str(&rendered);
    result.push_str(&source[site.end..]);
    Ok(result)
}

/// Place `decls` before any other text, one per line, in order
pub fn prepend_declarations(source: &str, decls: &[UniformDecl]) -> String {
    let eol = line_ending(source);
    let mut result = String::new();
    for decl in decls {
        result.push_str(&decl.to_string());
        result.push_str(eol);
    }
    result.push_str(source);
    result
}

/// A vertex-stage patch: declarations at the top, a statement block after the anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexPatch {
    anchor: String,
    marker: String,
    declarations: Vec<UniformDecl>,
    block: StatementBlock,
}

impl VertexPatch {
    /// Create a patch that inserts `block` after `anchor`
    pub fn new(anchor: impl Into<String>, block: StatementBlock) -> Self {
        Self {
            anchor: anchor.into(),
            marker: String::new(),
            declarations: Vec::new(),
            block,
        }
    }

    /// Declare a uniform. The first declaration also becomes the marker
    /// unless one was set explicitly.
    pub fn with_declaration(mut self, decl: UniformDecl) -> Self {
        if self.marker.is_empty() {
            self.marker.clone_from(&decl.name);
        }
        self.declarations.push(decl);
        self
    }

    /// Override the identifier used to detect an applied patch
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn anchor(&self) -> &str {
        &self.anchor
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn declarations(&self) -> &[UniformDecl] {
        &self.declarations
    }

    pub fn block(&self) -> &StatementBlock {
        &self.block
    }

    /// Names of the declared non-sampler uniforms
    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.declarations
            .iter()
            .filter(|d| !d.kind.is_sampler())
            .map(|d| d.name.as_str())
    }

    /// Names of the declared samplers
    pub fn sampler_names(&self) -> impl Iterator<Item = &str> {
        self.declarations
            .iter()
            .filter(|d| d.kind.is_sampler())
            .map(|d| d.name.as_str())
    }

    /// Whether `source` already carries this patch
    pub fn is_applied(&self, source: &str) -> bool {
        !self.marker.is_empty() && source.contains(&self.marker)
    }

    /// Produce the patched source
    pub fn apply(&self, source: &str) -> Result<String, PatchError> {
        if self.is_applied(source) {
            return Err(PatchError::AlreadyApplied {
                marker: self.marker.clone(),
            });
        }

        let body = insert_after_anchor(source, &self.anchor, &self.block)?;
        Ok(prepend_declarations(&body, &self.declarations))
    }
}
