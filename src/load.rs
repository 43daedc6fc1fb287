//! Dependency loader: depth-first traversal of the component import graph.
//!
//! Traversal state is threaded explicitly through the recursion as a
//! [`LoadState`]: the active ancestor chain for cycle detection, the set of
//! canonical paths already loaded for duplicate suppression, and the set of
//! root source paths already claimed. The walk is strictly sequential —
//! ordering guarantees and the shared bookkeeping depend on it — and a
//! dependency subtree is always complete before its dependent continues
//! with sibling imports, so the flat file list comes out dependency-first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::dom::{self, Document};
use crate::error::CompilerError;
use crate::model::{File, FileId};
use crate::resolver::{scheme_of, Resolved, Resolver, FILE_SCHEME};
use crate::selector::Selector;
use crate::state::State;

/// Mutable traversal bookkeeping for one load invocation. Nested
/// compilation passes build their own, so outer and inner graphs never
/// contaminate each other.
#[derive(Default)]
struct LoadState {
    /// Canonical paths of the ancestors currently being loaded.
    hierarchy: Vec<PathBuf>,
    /// Canonical paths already fully loaded.
    seen_imports: HashSet<PathBuf>,
    /// Canonical paths already claimed as sources.
    seen_sources: HashSet<PathBuf>,
}

/// Load the entry files and their transitive imports into the run state.
pub fn load(state: &mut State, files: &[String]) -> Result<(), CompilerError> {
    if files.is_empty() {
        return Err(CompilerError::Configuration(
            "no input files specified".to_string(),
        ));
    }
    let imports = Selector::parse(&state.options.selectors.imports)
        .map_err(CompilerError::Configuration)?;
    let mut info = LoadState::default();
    sources(state, &mut info, &imports, files, None)
}

/// Resolve and load an ordered list of hrefs declared by `parent`, or the
/// top-level entries when `parent` is `None`.
fn sources(
    state: &mut State,
    info: &mut LoadState,
    imports: &Selector,
    hrefs: &[String],
    parent: Option<FileId>,
) -> Result<(), CompilerError> {
    for href in hrefs {
        if parent.is_none() {
            // each top-level entry starts a fresh ancestor chain
            info.hierarchy.clear();
        }

        let base = parent.and_then(|p| state.files[p].path.parent().map(Path::to_path_buf));
        let resolver = resolver_for(state, href, base.as_deref())?;
        let path = resolver.canonical_path();

        if parent.is_none() && info.seen_sources.contains(&path) {
            return Err(CompilerError::DuplicateRootSource(href.clone()));
        }
        info.seen_sources.insert(path.clone());

        let loaded = load_file(state, info, imports, resolver.as_ref(), href, path, parent)?;
        if parent.is_none() {
            if let Some(id) = loaded {
                state.roots.push(id);
            }
        }
    }
    Ok(())
}

/// Load a single reference. Returns the new file id, or `None` when the
/// reference contributed no file node (duplicate import or nested pass).
fn load_file(
    state: &mut State,
    info: &mut LoadState,
    imports: &Selector,
    resolver: &dyn Resolver,
    href: &str,
    path: PathBuf,
    parent: Option<FileId>,
) -> Result<Option<FileId>, CompilerError> {
    // cyclic dependency: tested before duplicate suppression so users are
    // notified of the cycle rather than silently skipping it
    if let Some(ancestor) = info.hierarchy.iter().find(|p| **p == path) {
        let declaring = parent
            .map(|p| state.files[p].path.display().to_string())
            .unwrap_or_else(|| href.to_string());
        return Err(CompilerError::CyclicDependency {
            declaring,
            path: path.clone(),
            ancestor: ancestor.clone(),
        });
    }

    // duplicate component: do not re-read files that are already loaded
    if info.seen_imports.contains(&path) {
        debug!(path = %path.display(), "duplicate import");
        if let Some(p) = parent {
            state.files[p].duplicates.push(path);
        }
        return Ok(None);
    }
    info.seen_imports.insert(path.clone());

    let contents = match resolver.resolve()? {
        Resolved::Options(options) => {
            // nested compiler pass: run the full pipeline with its own
            // traversal state and fold its outputs into this run
            debug!(href, "nested compiler pass");
            let nested = crate::compiler::compile(*options)?;
            state.merge_outputs(nested);
            return Ok(None);
        }
        Resolved::Contents(contents) => contents,
    };

    if contents.is_empty() {
        return Err(CompilerError::EmptyComponentFile(path));
    }

    trace!(path = %path.display(), "loaded component source");
    let id = state.add_file(File::new(path.clone(), href, contents, parent));
    if let Some(p) = parent {
        // dependencies land ahead of previously linked siblings
        state.files[p].imports.insert(0, id);
    }
    state.result.files.insert(0, id);

    let document = Document::parse(&state.files[id].contents);
    let dependencies: Vec<String> = document
        .select(imports)
        .iter()
        .filter_map(|el| dom::attr(el, "href"))
        .collect();
    state.files[id].document = Some(document);

    if !dependencies.is_empty() {
        info.hierarchy.push(path);
        sources(state, info, imports, &dependencies, Some(id))?;
        info.hierarchy.pop();
    }

    Ok(Some(id))
}

/// Pick the resolver for an href by scheme prefix; hrefs without a scheme
/// use the default `file` scheme.
fn resolver_for(
    state: &State,
    href: &str,
    base: Option<&Path>,
) -> Result<Box<dyn Resolver>, CompilerError> {
    let scheme = scheme_of(href).unwrap_or(FILE_SCHEME);
    let factory = state.resolvers.get(scheme).cloned().ok_or_else(|| {
        CompilerError::Configuration(format!("no resolver registered for scheme '{}'", scheme))
    })?;
    Ok((*factory)(href, base))
}
