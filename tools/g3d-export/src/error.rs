//! Export errors
//!
//! Every failure aborts the whole export; nothing is written until the model is
//! complete, so an error never leaves a partial file behind.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which hard limit a mesh ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    VerticesPerMesh,
    IndicesPerMeshPart,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitKind::VerticesPerMesh => write!(f, "max vertices per mesh"),
            LimitKind::IndicesPerMeshPart => write!(f, "max indices per mesh part"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("mesh '{mesh}' exceeds {limit} ({actual} > {max})")]
    LimitExceeded {
        mesh: String,
        limit: LimitKind,
        actual: usize,
        max: usize,
    },

    #[error(
        "vertex {vertex} of mesh '{mesh}' has no bone weights; \
         assign it to a deforming bone group or disable armature export"
    )]
    MissingWeights { mesh: String, vertex: usize },

    #[error(
        "node part of mesh '{mesh}' needs {actual} bones but max bones per node part is {max}; \
         raise the limit (recommended: bones per vertex x 3)"
    )]
    NodePartBones {
        mesh: String,
        actual: usize,
        max: usize,
    },

    #[error("texture '{texture}' source not found: {path:?}")]
    TextureNotFound { texture: String, path: PathBuf },

    #[error("{kind} '{name}' referenced by '{owner}' does not exist")]
    MissingReference {
        kind: &'static str,
        name: String,
        owner: String,
    },

    #[error("{kind} '{name}' contains itself")]
    Cycle { kind: &'static str, name: String },

    #[error("invalid option {name}: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("failed to parse scene {path:?}")]
    SceneParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse options {path:?}")]
    OptionsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode export summary")]
    Summary(#[source] toml::ser::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExportError {
    pub(crate) fn missing(kind: &'static str, name: &str, owner: &str) -> Self {
        ExportError::MissingReference {
            kind,
            name: name.to_string(),
            owner: owner.to_string(),
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
