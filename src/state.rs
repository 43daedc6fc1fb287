//! Per-run pipeline state: the file tree, module arena, flat discovery
//! lists, registered protocol resolvers and named output buffers.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::model::{File, FileId, Module, ModuleId, Script, Style, Template};
use crate::options::CompileOptions;
use crate::resolver::SchemeFactory;

/// Reference to a trait by its owning module and index within that
/// module's trait list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitRef {
    pub module: ModuleId,
    pub index: usize,
}

/// Flat run-wide lists, in discovery order.
#[derive(Default)]
pub struct ResultLists {
    /// Loaded files, dependency-first.
    pub files: Vec<FileId>,
    pub modules: Vec<ModuleId>,
    pub templates: Vec<TraitRef>,
    pub styles: Vec<TraitRef>,
    pub scripts: Vec<TraitRef>,
}

/// A named output buffer assembled by generator phases. Nested compilation
/// passes merge their buffers into the outer run's matching entries.
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: Vec<String>,
}

impl OutputFile {
    fn new(path: PathBuf) -> OutputFile {
        OutputFile {
            path,
            contents: Vec::new(),
        }
    }

    /// Concatenate the buffered chunks with the configured line separator.
    pub fn concat(&self, eol: &str) -> String {
        self.contents.join(eol)
    }
}

pub struct State {
    pub options: CompileOptions,
    /// File arena; tree shape lives in `File::imports` and `roots`.
    pub files: Vec<File>,
    pub modules: Vec<Module>,
    /// Top-level entry files, in entry order.
    pub roots: Vec<FileId>,
    pub result: ResultLists,
    /// Scheme name to resolver factory, registered by protocol plugins.
    pub resolvers: HashMap<String, SchemeFactory>,
    pub outputs: BTreeMap<PathBuf, OutputFile>,
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("files", &self.files.len())
            .field("modules", &self.modules.len())
            .field("roots", &self.roots)
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl State {
    pub fn new(options: CompileOptions) -> State {
        State {
            options,
            files: Vec::new(),
            modules: Vec::new(),
            roots: Vec::new(),
            result: ResultLists::default(),
            resolvers: HashMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_file(&mut self, file: File) -> FileId {
        self.files.push(file);
        self.files.len() - 1
    }

    pub fn add_module(&mut self, module: Module) -> ModuleId {
        self.modules.push(module);
        self.modules.len() - 1
    }

    pub fn template(&self, r: TraitRef) -> &Template {
        &self.modules[r.module].templates[r.index]
    }

    pub fn style(&self, r: TraitRef) -> &Style {
        &self.modules[r.module].stylesheets[r.index]
    }

    pub fn script(&self, r: TraitRef) -> &Script {
        &self.modules[r.module].scripts[r.index]
    }

    /// Fetch or create the output buffer for `path`.
    pub fn output_file(&mut self, path: &Path) -> &mut OutputFile {
        self.outputs
            .entry(path.to_path_buf())
            .or_insert_with(|| OutputFile::new(path.to_path_buf()))
    }

    /// Merge a nested run's output buffers into this run, nested content
    /// first so dependency-first ordering is preserved in the output.
    pub fn merge_outputs(&mut self, nested: State) {
        for (path, inner) in nested.outputs {
            let outer = self.output_file(&path);
            let mut contents = inner.contents;
            contents.append(&mut outer.contents);
            outer.contents = contents;
        }
    }

    /// Manifest of canonical paths recorded as duplicates, paired with the
    /// file that re-referenced them.
    pub fn duplicates(&self) -> Vec<(PathBuf, PathBuf)> {
        let mut manifest = Vec::new();
        for file in &self.files {
            for dup in &file.duplicates {
                manifest.push((file.path.clone(), dup.clone()));
            }
        }
        manifest
    }

    /// Line separator used for output buffer concatenation.
    pub fn eol(&self) -> &str {
        self.options.eol.as_deref().unwrap_or("\n")
    }
}
