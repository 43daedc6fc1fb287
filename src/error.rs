//! Error taxonomy for the compiler pipeline.
//!
//! Every error raised by the loader or the tree builder is fatal and unwinds
//! the whole run. Callers branch on [`ErrorKind`] rather than matching
//! message strings.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompilerError {
    /// Bad protocol list, unresolvable plugin or resolver name, invalid
    /// selector or substitution pattern.
    #[error("{0}")]
    Configuration(String),

    /// Missing or invalid module identifier, reserved element name,
    /// duplicate module id within a file.
    #[error("{0}")]
    Validation(String),

    /// The same canonical path was supplied twice as a top-level entry.
    #[error("duplicate component source file {0}")]
    DuplicateRootSource(String),

    /// An import chain references a file that is currently being loaded.
    #[error(
        "cyclic dependency detected in {declaring} ({} <> {})",
        .path.display(),
        .ancestor.display()
    )]
    CyclicDependency {
        declaring: String,
        path: PathBuf,
        ancestor: PathBuf,
    },

    /// A component source or external trait file resolved to empty contents.
    #[error("empty component file {}", .0.display())]
    EmptyComponentFile(PathBuf),

    /// A module declared a second template that qualifies as its primary.
    #[error("duplicate main template for {id} in {}", .file.display())]
    DuplicatePrimaryTemplate { id: String, file: PathBuf },

    /// An import or external trait file could not be read.
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Discriminant used by callers that need to branch on the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    DuplicateRootSource,
    CyclicDependency,
    EmptyComponentFile,
    DuplicatePrimaryTemplate,
    Io,
}

impl CompilerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompilerError::Configuration(_) => ErrorKind::Configuration,
            CompilerError::Validation(_) => ErrorKind::Validation,
            CompilerError::DuplicateRootSource(_) => ErrorKind::DuplicateRootSource,
            CompilerError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
            CompilerError::EmptyComponentFile(_) => ErrorKind::EmptyComponentFile,
            CompilerError::DuplicatePrimaryTemplate { .. } => ErrorKind::DuplicatePrimaryTemplate,
            CompilerError::Io { .. } => ErrorKind::Io,
        }
    }
}
