//! Entity model for the compiler: files, modules, components and the
//! template/style/script content fragments ("traits") they own.
//!
//! Files and modules live in arenas on the run state and refer to each
//! other by id; a component references its templates and styles by index
//! into the owning module's trait lists rather than owning them itself.

use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::dom::Document;
use crate::error::CompilerError;

pub type FileId = usize;
pub type ModuleId = usize;

/// Custom element names reserved by the host and never usable as module ids.
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

lazy_static! {
    static ref RESERVED: HashSet<&'static str> = RESERVED_NAMES.iter().copied().collect();
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE
// ═══════════════════════════════════════════════════════════════════════════════

/// One resolved source unit in the dependency graph.
///
/// The canonical path is computed once by the resolver that produced the
/// file and is the sole identity key for deduplication and cycle checks.
pub struct File {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// The href string as it appeared in the declaring document.
    pub href: String,
    /// Raw textual contents; never mutated after parse.
    pub contents: String,
    /// Query handle over the parsed markup.
    pub document: Option<Document>,
    pub parent: Option<FileId>,
    /// Child files this file declares as dependencies, dependency-first.
    pub imports: Vec<FileId>,
    /// Modules declared in this file, document order.
    pub modules: Vec<ModuleId>,
    /// Canonical paths this file referenced that were already loaded.
    pub duplicates: Vec<PathBuf>,
}

impl File {
    pub fn new(path: PathBuf, href: &str, contents: String, parent: Option<FileId>) -> File {
        File {
            path,
            href: href.to_string(),
            contents,
            document: None,
            parent,
            imports: Vec::new(),
            modules: Vec::new(),
            duplicates: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE & COMPONENT
// ═══════════════════════════════════════════════════════════════════════════════

/// A named declarative unit inside a file.
pub struct Module {
    /// Validated custom-element name.
    pub id: String,
    pub file: FileId,
    /// Path of the owning file.
    pub path: PathBuf,
    /// Every template trait, document order. The primary (if any) is
    /// referenced by `component`.
    pub templates: Vec<Template>,
    /// Every style trait, document order, regardless of scope.
    pub stylesheets: Vec<Style>,
    /// Indices into `stylesheets` classified as global/module scope.
    pub styles: Vec<usize>,
    pub scripts: Vec<Script>,
    pub component: Option<Component>,
}

impl Module {
    pub fn new(id: String, file: FileId, path: PathBuf) -> Module {
        Module {
            id,
            file,
            path,
            templates: Vec::new(),
            stylesheets: Vec::new(),
            styles: Vec::new(),
            scripts: Vec::new(),
            component: None,
        }
    }
}

/// The compiled unit for a module: one primary template plus the partial
/// templates and shadow-scoped styles that belong with it.
pub struct Component {
    /// Index of the primary template in `module.templates`.
    pub template: usize,
    /// Indices of every non-primary template, document order.
    pub partials: Vec<usize>,
    /// Indices into `module.stylesheets` classified as shadow scope.
    pub styles: Vec<usize>,
}

impl Component {
    pub fn new(template: usize) -> Component {
        Component {
            template,
            partials: Vec::new(),
            styles: Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// The three content fragment kinds a module can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitKind {
    Template,
    Style,
    Script,
}

/// How inline contents are extracted for a trait kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineContents {
    /// Serialized outer markup of the element.
    Markup,
    /// Concatenated text children of the element.
    Text,
}

impl TraitKind {
    /// Attribute carrying the external reference for this kind.
    pub fn external_attr(self) -> &'static str {
        match self {
            TraitKind::Script => "src",
            TraitKind::Template | TraitKind::Style => "href",
        }
    }

    pub fn inline_contents(self) -> InlineContents {
        match self {
            TraitKind::Template => InlineContents::Markup,
            TraitKind::Style | TraitKind::Script => InlineContents::Text,
        }
    }
}

/// Fields shared by every content fragment.
pub struct Fragment {
    /// The declaring element in the source document.
    pub element: Handle,
    pub contents: String,
    pub inline: bool,
    /// Original reference attribute value, for external traits.
    pub href: Option<String>,
    /// Resolved path of the external file, for external traits.
    pub file: Option<PathBuf>,
}

pub struct Template {
    pub fragment: Fragment,
    /// Final id after primary inheritance or partial prefixing.
    pub id: String,
    /// Query handle re-derived from the mutated element.
    pub document: Document,
}

/// Scope classification for a style trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleScope {
    /// Declared inside the primary template subtree.
    Shadow,
    /// Declared at module level.
    Global,
}

pub struct Style {
    pub fragment: Fragment,
    pub scope: StyleScope,
    pub type_hint: Option<String>,
}

impl Style {
    pub fn media_type(&self) -> &str {
        self.type_hint.as_deref().unwrap_or("text/css")
    }

    pub fn is_shadow_scope(&self) -> bool {
        self.scope == StyleScope::Shadow
    }
}

pub struct Script {
    pub fragment: Fragment,
    pub type_hint: Option<String>,
}

impl Script {
    pub fn media_type(&self) -> &str {
        self.type_hint.as_deref().unwrap_or("text/javascript")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ID VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a module id against custom element naming rules.
pub fn validate_id(id: &str, file: &std::path::Path) -> Result<(), CompilerError> {
    if id.is_empty() {
        return Err(CompilerError::Validation(format!(
            "identifier missing for component module in {}",
            file.display()
        )));
    }
    if RESERVED.contains(id) {
        return Err(CompilerError::Validation(format!(
            "{} is a reserved custom element name ({})",
            id,
            file.display()
        )));
    }
    let starts_lower = id.chars().next().map_or(false, |c| c.is_ascii_lowercase());
    if !starts_lower || !id.contains('-') {
        return Err(CompilerError::Validation(format!(
            "invalid custom element name {} in {}",
            id,
            file.display()
        )));
    }
    Ok(())
}
