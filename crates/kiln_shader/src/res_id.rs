//! Shader Identity
//!
//! A shader compile request is identified by an *initializer* string of the
//! form `<path>:<entryPoint>:<shaderModel>`:
//!
//! ```text
//! shaders/basic.psh:MainFunction:ps_5_0
//! shaders/basic.psh:MainFunction:ps_*      // best pixel model available
//! shaders/basic.psh:MainFunction:!ps_5_0   // dynamic linkage enabled
//! shaders/basic.psh                         // main, ps_*
//! C:\shaders\basic.psh:main:vs_5_0         // drive letters are part of the path
//! ```
//!
//! Trailing fields are optional. Fields are split on the last two colons, so
//! colons inside the path survive.

use std::fmt;

use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{Result, ShaderError};

/// Entry point used when the initializer omits one.
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// Shader model used when the initializer omits one.
pub const DEFAULT_SHADER_MODEL: &str = "ps_*";

/// Prefix on a shader model token that requests dynamic linkage.
pub const DYNAMIC_LINKAGE_PREFIX: char = '!';

/// Pipeline stage a shader model compiles for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
    #[default]
    Null,
}

impl ShaderStage {
    /// Derives the stage from a model token such as `vs_5_0` or `!ps_*`.
    #[must_use]
    pub fn from_model(model: &str) -> Self {
        let model = model.strip_prefix(DYNAMIC_LINKAGE_PREFIX).unwrap_or(model);
        let Some(prefix) = model.get(..3) else {
            return Self::Null;
        };
        match prefix.to_ascii_lowercase().as_str() {
            "vs_" => Self::Vertex,
            "ps_" => Self::Pixel,
            "gs_" => Self::Geometry,
            "hs_" => Self::Hull,
            "ds_" => Self::Domain,
            "cs_" => Self::Compute,
            _ => Self::Null,
        }
    }

    /// Wildcard model token for this stage, e.g. `vs_*`.
    #[must_use]
    pub fn wildcard_model(self) -> Option<&'static str> {
        match self {
            Self::Vertex => Some("vs_*"),
            Self::Pixel => Some("ps_*"),
            Self::Geometry => Some("gs_*"),
            Self::Hull => Some("hs_*"),
            Self::Domain => Some("ds_*"),
            Self::Compute => Some("cs_*"),
            Self::Null => None,
        }
    }
}

/// Returns `true` if `model` asks the compiler to pick the concrete version.
#[inline]
#[must_use]
pub fn is_wildcard_model(model: &str) -> bool {
    model.ends_with('*')
}

/// Parsed identity of a shader: file, entry point and shader model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResId {
    pub filename: String,
    pub entry_point: String,
    /// Model token without the dynamic linkage prefix.
    pub shader_model: String,
    pub dynamic_linkage: bool,
}

impl ResId {
    /// Builds an identity from its parts. A leading `!` on `shader_model`
    /// enables dynamic linkage.
    #[must_use]
    pub fn new(filename: &str, entry_point: &str, shader_model: &str) -> Self {
        let (shader_model, dynamic_linkage) = split_linkage(shader_model);
        Self {
            filename: filename.to_string(),
            entry_point: entry_point.to_string(),
            shader_model: shader_model.to_string(),
            dynamic_linkage,
        }
    }

    /// Identity for source text that does not live in a file.
    ///
    /// The file name is synthesized from a hash of the source so the identity
    /// stays stable and reparseable.
    #[must_use]
    pub fn for_memory(source: &str, entry_point: &str, shader_model: &str) -> Self {
        let filename = format!("<memory-{:016x}>", xxh3_64(source.as_bytes()));
        Self::new(&filename, entry_point, shader_model)
    }

    /// Parses an initializer string. Performs no I/O and no model adaptation.
    pub fn parse(initializer: &str) -> Result<Self> {
        let malformed = |reason: &str| ShaderError::MalformedInitializer {
            initializer: initializer.to_string(),
            reason: reason.to_string(),
        };

        let (path, entry, model) = split_initializer(initializer);
        if path.is_empty() {
            return Err(malformed("missing file name"));
        }

        let entry = entry.filter(|e| !e.is_empty()).unwrap_or(DEFAULT_ENTRY_POINT);
        if !is_identifier(entry) {
            return Err(malformed("entry point is not an identifier"));
        }

        let model = model.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_SHADER_MODEL);
        let (bare_model, _) = split_linkage(model);
        if bare_model.is_empty()
            || !bare_model
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '*')
        {
            return Err(malformed("shader model token is not well formed"));
        }

        Ok(Self::new(path, entry, model))
    }

    #[inline]
    #[must_use]
    pub fn stage(&self) -> ShaderStage {
        ShaderStage::from_model(&self.shader_model)
    }

    #[inline]
    #[must_use]
    pub fn has_wildcard_model(&self) -> bool {
        is_wildcard_model(&self.shader_model)
    }

    /// Model token including the dynamic linkage prefix, as written in an
    /// initializer.
    #[must_use]
    pub fn model_token(&self) -> String {
        if self.dynamic_linkage {
            format!("{DYNAMIC_LINKAGE_PREFIX}{}", self.shader_model)
        } else {
            self.shader_model.clone()
        }
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.entry_point, self.model_token())
    }
}

/// Full identity of a compile: the shader plus its defines table.
///
/// Two requests are equivalent iff every field matches. This is the key an
/// owning cache dedups on; the compile registry itself never dedups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileRequest {
    pub res_id: ResId,
    pub defines: String,
}

impl CompileRequest {
    #[must_use]
    pub fn new(res_id: ResId, defines: &str) -> Self {
        Self {
            res_id,
            defines: defines.to_string(),
        }
    }
}

fn split_linkage(model: &str) -> (&str, bool) {
    match model.strip_prefix(DYNAMIC_LINKAGE_PREFIX) {
        Some(rest) => (rest, true),
        None => (model, false),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Byte offset of a drive-letter colon (`C:\` or `C:/`), if any.
fn drive_colon(initializer: &str) -> Option<usize> {
    let bytes = initializer.as_bytes();
    let is_drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\');
    is_drive.then_some(1)
}

fn split_initializer(initializer: &str) -> (&str, Option<&str>, Option<&str>) {
    let drive = drive_colon(initializer);
    let separators: Vec<usize> = initializer
        .match_indices(':')
        .map(|(i, _)| i)
        .filter(|i| Some(*i) != drive)
        .collect();

    match separators.as_slice() {
        [] => (initializer, None, None),
        [only] => (&initializer[..*only], Some(&initializer[only + 1..]), None),
        [.., first, second] => (
            &initializer[..*first],
            Some(&initializer[first + 1..*second]),
            Some(&initializer[second + 1..]),
        ),
    }
}
