//! Scheme-keyed resolution of component source references.
//!
//! Every href resolves through a [`Resolver`] chosen by its scheme prefix
//! (no prefix means the default `file` scheme). A resolver instance is
//! created per file reference and computes the canonical path used as the
//! file's identity, then yields either source text or a nested compiler
//! configuration.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use crate::error::CompilerError;
use crate::options::CompileOptions;
use crate::registry::PluginConfig;
use crate::state::State;

pub const FILE_SCHEME: &str = "file";

/// Outcome of resolving one reference.
#[derive(Debug)]
pub enum Resolved {
    /// Source text to parse as a component document.
    Contents(String),
    /// Compiler configuration: run a nested compilation pass and merge its
    /// outputs instead of loading a file.
    Options(Box<CompileOptions>),
}

/// One reference being resolved: identity first, contents on demand.
pub trait Resolver {
    /// Deterministic absolute path for this reference; the sole identity
    /// key for deduplication and cycle detection.
    fn canonical_path(&self) -> PathBuf;

    fn resolve(&self) -> Result<Resolved, CompilerError>;
}

/// Creates a resolver for an href declared in a file rooted at `base`.
pub type SchemeFactory = Rc<dyn Fn(&str, Option<&Path>) -> Box<dyn Resolver>>;

/// Extract the scheme prefix of an href, when present. Single letters are
/// not schemes so absolute Windows-style paths pass through untouched.
pub fn scheme_of(href: &str) -> Option<&str> {
    let (scheme, _) = href.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if scheme.len() >= 2
        && first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Lexically normalize a path, resolving `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Join an href against the declaring file's directory and normalize.
/// Absolute hrefs pass through; without a base the working directory is
/// assumed, matching top-level entry resolution.
pub fn absolute(href: &str, base: Option<&Path>) -> PathBuf {
    let path = Path::new(href);
    if path.is_absolute() {
        return normalize(path);
    }
    let base = base
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    normalize(&base.join(path))
}

/// Default resolver for the `file` scheme: plain filesystem reads.
pub struct FileResolver {
    href: String,
    base: Option<PathBuf>,
}

impl FileResolver {
    pub fn new(href: &str, base: Option<&Path>) -> FileResolver {
        // strip the optional scheme prefix: file:foo.html, file://foo.html
        let href = href
            .strip_prefix("file:")
            .map(|rest| rest.strip_prefix("//").unwrap_or(rest))
            .unwrap_or(href);
        FileResolver {
            href: href.to_string(),
            base: base.map(Path::to_path_buf),
        }
    }
}

impl Resolver for FileResolver {
    fn canonical_path(&self) -> PathBuf {
        absolute(&self.href, self.base.as_deref())
    }

    fn resolve(&self) -> Result<Resolved, CompilerError> {
        let path = self.canonical_path();
        let contents = fs::read_to_string(&path).map_err(|e| CompilerError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(Resolved::Contents(contents))
    }
}

/// Protocol plugin for the default scheme; registers the [`FileResolver`]
/// factory on the run state.
pub fn file_protocol(state: &mut State, _conf: &PluginConfig) -> Result<(), CompilerError> {
    state.resolvers.insert(
        FILE_SCHEME.to_string(),
        Rc::new(|href, base| Box::new(FileResolver::new(href, base))),
    );
    Ok(())
}
