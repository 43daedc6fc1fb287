//! Compiles declarative web component documents — HTML files carrying
//! `<dom-module>` definitions with template, style and script fragments,
//! possibly split across files via import links — into a single resolved,
//! deduplicated, dependency-ordered tree ready for code generation.
//!
//! The pipeline is a short list of phases resolved by name (`sources`,
//! `load`, `parse`, plus downstream `transform`/`generate`/`write`
//! supplied by plugins). Loading walks the import graph depth-first with
//! cycle and duplicate detection, each href resolving through a
//! scheme-keyed resolver; parsing assembles modules, components and their
//! traits with custom-element id validation, template id namespacing and
//! shadow/global style scope classification.
//!
//! ```no_run
//! use plait::{compile, CompileOptions};
//!
//! let mut options = CompileOptions::default();
//! options.files = vec!["components.html".to_string()];
//! let state = compile(options)?;
//! for &id in &state.result.modules {
//!     println!("{}", state.modules[id].id);
//! }
//! # Ok::<(), plait::CompilerError>(())
//! ```

pub mod compiler;
pub mod dom;
pub mod error;
pub mod load;
pub mod model;
pub mod options;
pub mod parse;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod state;

pub use compiler::{compile, GENERATE, LOAD, PARSE, PHASES, SOURCES, TRANSFORM, WRITE};
pub use error::{CompilerError, ErrorKind};
pub use model::{
    Component, File, FileId, Fragment, Module, ModuleId, Script, Style, StyleScope, Template,
    TraitKind,
};
pub use options::{CompileOptions, IdOptions, Selectors, TrimOptions};
pub use registry::{Named, Phase, PluginConfig};
pub use resolver::{Resolved, Resolver};
pub use state::{OutputFile, State, TraitRef};
