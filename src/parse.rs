//! Tree builder: turns each loaded file's markup into modules, components
//! and their template/style/script traits.
//!
//! Runs once per file in the dependency-first order the loader produced.
//! Template id assignment is a two-step pattern: first compute every
//! assignment for a module's template elements as a pure function of the
//! discovered ids, then apply the attribute writes and re-serialize, so
//! read/mutate/read interleaving can't reorder badly.

use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::dom::{self, Document};
use crate::error::CompilerError;
use crate::model::{
    validate_id, Component, Fragment, InlineContents, Module, ModuleId, Script, Style, StyleScope,
    Template, TraitKind,
};
use crate::options::{CompileOptions, TrimOptions};
use crate::selector::Selector;
use crate::state::{State, TraitRef};

use markup5ever_rcdom::Handle;

const ID: &str = "id";
const TEMPLATE: &str = "template";

// ═══════════════════════════════════════════════════════════════════════════════
// RUN CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Selectors and post-processing compiled once per run from the options.
#[derive(Debug)]
struct RunSelectors {
    modules: Selector,
    templates: Selector,
    styles: Selector,
    scripts: Selector,
    /// Bare `template` tag selector used to split a template group into
    /// individual template traits.
    template_tag: Selector,
    trim: TrimOptions,
    id_pattern: Option<Regex>,
}

impl RunSelectors {
    fn compile(options: &CompileOptions) -> Result<RunSelectors, CompilerError> {
        let parse = |s: &str| Selector::parse(s).map_err(CompilerError::Configuration);
        let id_pattern = if options.id.replace {
            let re = Regex::new(&options.id.pattern).map_err(|e| {
                CompilerError::Configuration(format!(
                    "invalid id pattern '{}': {}",
                    options.id.pattern, e
                ))
            })?;
            Some(re)
        } else {
            None
        };
        Ok(RunSelectors {
            modules: parse(&options.selectors.modules)?,
            templates: parse(&options.selectors.templates)?,
            styles: parse(&options.selectors.styles)?,
            scripts: parse(&options.selectors.scripts)?,
            template_tag: parse(TEMPLATE)?,
            trim: options.trim.clone(),
            id_pattern,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD
// ═══════════════════════════════════════════════════════════════════════════════

/// Build modules, components and traits for every loaded file.
pub fn build(state: &mut State) -> Result<(), CompilerError> {
    let selectors = RunSelectors::compile(&state.options)?;
    let file_ids = state.result.files.clone();

    for fid in file_ids {
        let Some(document) = state.files[fid].document.clone() else {
            continue;
        };
        let path = state.files[fid].path.clone();

        for el in document.select(&selectors.modules) {
            let id = dom::attr(&el, ID)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    CompilerError::Validation(format!(
                        "identifier missing for component module in {}",
                        path.display()
                    ))
                })?;
            validate_id(&id, &path)?;

            if state.files[fid]
                .modules
                .iter()
                .any(|&m| state.modules[m].id == id)
            {
                return Err(CompilerError::Validation(format!(
                    "duplicate module identifier {} in {}",
                    id,
                    path.display()
                )));
            }

            debug!(module = %id, file = %path.display(), "building module");
            let mid = state.add_module(Module::new(id, fid, path.clone()));
            state.files[fid].modules.push(mid);
            state.result.modules.push(mid);
            read_module(state, mid, &el, &selectors)?;
        }
    }
    Ok(())
}

/// Read one module's element subtree: styles and scripts first, then
/// templates, then style scope classification once the primary template
/// element is known.
fn read_module(
    state: &mut State,
    mid: ModuleId,
    context: &Handle,
    selectors: &RunSelectors,
) -> Result<(), CompilerError> {
    let module_id = state.modules[mid].id.clone();
    let base = state.modules[mid]
        .path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    for el in Document::select_in(context, &selectors.styles) {
        let fragment = read_fragment(&el, TraitKind::Style, &base)
            .map(|f| postprocess(f, &module_id, selectors))?;
        let type_hint = dom::attr(&el, "type");
        let module = &mut state.modules[mid];
        let index = module.stylesheets.len();
        module.stylesheets.push(Style {
            fragment,
            scope: StyleScope::Global,
            type_hint,
        });
        state.result.styles.push(TraitRef { module: mid, index });
    }

    for el in Document::select_in(context, &selectors.scripts) {
        let fragment = read_fragment(&el, TraitKind::Script, &base)
            .map(|f| postprocess(f, &module_id, selectors))?;
        let type_hint = dom::attr(&el, "type");
        let module = &mut state.modules[mid];
        let index = module.scripts.len();
        module.scripts.push(Script { fragment, type_hint });
        state.result.scripts.push(TraitRef { module: mid, index });
    }

    let mut primary_el: Option<Handle> = None;
    for el in Document::select_in(context, &selectors.templates) {
        read_templates(state, mid, &el, &base, &mut primary_el, selectors)?;
    }

    classify_styles(&mut state.modules[mid], primary_el.as_ref());
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

/// One computed template id assignment; step one of the two-step
/// write pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TemplateAssignment {
    id: String,
    primary: bool,
}

/// Compute final ids for a module's template elements. The first template
/// without an id, or whose id equals the module id, inherits the module id
/// and becomes the primary; any other id is prefixed with the module id to
/// stay globally unique.
fn assign_template_ids(
    module_id: &str,
    file: &Path,
    mut has_primary: bool,
    ids: &[Option<String>],
) -> Result<Vec<TemplateAssignment>, CompilerError> {
    let prefix = if module_id.ends_with('-') {
        module_id.to_string()
    } else {
        format!("{}-", module_id)
    };

    let mut assignments = Vec::with_capacity(ids.len());
    for id in ids {
        let is_primary = match id.as_deref() {
            None | Some("") => true,
            Some(existing) => existing == module_id,
        };
        if is_primary {
            if has_primary {
                return Err(CompilerError::DuplicatePrimaryTemplate {
                    id: module_id.to_string(),
                    file: file.to_path_buf(),
                });
            }
            has_primary = true;
            assignments.push(TemplateAssignment {
                id: module_id.to_string(),
                primary: true,
            });
        } else {
            // non-primary ids are always present and non-empty
            let existing = id.as_deref().unwrap_or_default();
            assignments.push(TemplateAssignment {
                id: format!("{}{}", prefix, existing),
                primary: false,
            });
        }
    }
    Ok(assignments)
}

/// Process one template group element: the inline `<template>` itself, or
/// an external reference whose file may hold several `<template>` elements.
/// Each template element becomes its own trait.
fn read_templates(
    state: &mut State,
    mid: ModuleId,
    group: &Handle,
    base: &Path,
    primary_el: &mut Option<Handle>,
    selectors: &RunSelectors,
) -> Result<(), CompilerError> {
    let (module_id, module_path) = {
        let module = &state.modules[mid];
        (module.id.clone(), module.path.clone())
    };

    let href = dom::attr(group, TraitKind::Template.external_attr());
    let (elements, external) = match href {
        None => {
            // the module-level query already yields nested template
            // elements as their own groups
            (vec![group.clone()], None)
        }
        Some(href) => {
            let path = crate::resolver::absolute(&href, Some(base));
            let text = fs::read_to_string(&path).map_err(|e| CompilerError::Io {
                path: path.clone(),
                source: e,
            })?;
            if text.is_empty() {
                return Err(CompilerError::EmptyComponentFile(path));
            }
            let document = Document::parse(&text);
            (document.select(&selectors.template_tag), Some((href, path)))
        }
    };

    // step one: pure id computation over the discovered elements
    let ids: Vec<Option<String>> = elements.iter().map(|el| dom::attr(el, ID)).collect();
    let has_primary = state.modules[mid].component.is_some();
    let assignments = assign_template_ids(&module_id, &module_path, has_primary, &ids)?;

    // step two: write ids back and re-derive contents from the mutated
    // elements
    for (el, assignment) in elements.iter().zip(assignments) {
        dom::set_attr(el, ID, &assignment.id);
        let fragment = Fragment {
            element: el.clone(),
            contents: dom::serialize(el),
            inline: external.is_none(),
            href: external.as_ref().map(|(href, _)| href.clone()),
            file: external.as_ref().map(|(_, path)| path.clone()),
        };
        let fragment = postprocess(fragment, &module_id, selectors);
        let template = Template {
            id: assignment.id.clone(),
            document: Document::parse(&fragment.contents),
            fragment,
        };

        let module = &mut state.modules[mid];
        let index = module.templates.len();
        module.templates.push(template);
        if assignment.primary {
            module.component = Some(Component::new(index));
            *primary_el = Some(el.clone());
        }
        state.result.templates.push(TraitRef { module: mid, index });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Assign each style to exactly one scope: shadow when its element lies
/// inside the primary template subtree, global otherwise. Also fills the
/// component's partial list now that every template is known.
fn classify_styles(module: &mut Module, primary_el: Option<&Handle>) {
    for index in 0..module.stylesheets.len() {
        let shadow = primary_el.map_or(false, |p| {
            dom::contains(p, &module.stylesheets[index].fragment.element)
        });
        if shadow {
            module.stylesheets[index].scope = StyleScope::Shadow;
            if let Some(component) = module.component.as_mut() {
                component.styles.push(index);
            }
        } else {
            module.stylesheets[index].scope = StyleScope::Global;
            module.styles.push(index);
        }
    }

    if let Some(component) = module.component.as_mut() {
        component.partials = (0..module.templates.len())
            .filter(|&i| i != component.template)
            .collect();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAGMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract a style or script fragment: inline element contents, or the
/// decoded text of the referenced external file.
fn read_fragment(el: &Handle, kind: TraitKind, base: &Path) -> Result<Fragment, CompilerError> {
    match dom::attr(el, kind.external_attr()) {
        None => {
            let contents = match kind.inline_contents() {
                InlineContents::Markup => dom::serialize(el),
                InlineContents::Text => dom::text(el),
            };
            Ok(Fragment {
                element: el.clone(),
                contents,
                inline: true,
                href: None,
                file: None,
            })
        }
        Some(href) => {
            let path = crate::resolver::absolute(&href, Some(base));
            let contents = fs::read_to_string(&path).map_err(|e| CompilerError::Io {
                path: path.clone(),
                source: e,
            })?;
            if contents.is_empty() {
                return Err(CompilerError::EmptyComponentFile(path));
            }
            Ok(Fragment {
                element: el.clone(),
                contents,
                inline: false,
                href: Some(href),
                file: Some(path),
            })
        }
    }
}

/// Trim and placeholder substitution, applied before a trait is attached.
fn postprocess(mut fragment: Fragment, module_id: &str, selectors: &RunSelectors) -> Fragment {
    if selectors.trim.inline && fragment.inline {
        fragment.contents = fragment.contents.trim().to_string();
    }
    if let Some(re) = &selectors.id_pattern {
        fragment.contents = re
            .replace_all(&fragment.contents, regex::NoExpand(module_id))
            .into_owned();
    }
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(id: &str, primary: bool) -> TemplateAssignment {
        TemplateAssignment {
            id: id.to_string(),
            primary,
        }
    }

    #[test]
    fn test_assign_unlabeled_template_inherits_module_id() {
        let out = assign_template_ids("x-foo", Path::new("/c.html"), false, &[None]).unwrap();
        assert_eq!(out, vec![assignment("x-foo", true)]);
    }

    #[test]
    fn test_assign_matching_id_is_primary() {
        let out = assign_template_ids(
            "x-foo",
            Path::new("/c.html"),
            false,
            &[Some("x-foo".to_string())],
        )
        .unwrap();
        assert_eq!(out, vec![assignment("x-foo", true)]);
    }

    #[test]
    fn test_assign_partial_is_prefixed() {
        let out = assign_template_ids(
            "x-foo",
            Path::new("/c.html"),
            false,
            &[None, Some("bar".to_string())],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![assignment("x-foo", true), assignment("x-foo-bar", false)]
        );
    }

    #[test]
    fn test_assign_prefix_respects_trailing_separator() {
        let out = assign_template_ids(
            "x-",
            Path::new("/c.html"),
            false,
            &[None, Some("bar".to_string())],
        )
        .unwrap();
        assert_eq!(out[1], assignment("x-bar", false));
    }

    #[test]
    fn test_assign_duplicate_primary_fails() {
        let err =
            assign_template_ids("x-foo", Path::new("/c.html"), false, &[None, None]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DuplicatePrimaryTemplate);

        // a module that already has a component rejects any new primary
        let err = assign_template_ids("x-foo", Path::new("/c.html"), true, &[None]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DuplicatePrimaryTemplate);
    }

    #[test]
    fn test_assign_partials_only_is_fine() {
        let out = assign_template_ids(
            "x-foo",
            Path::new("/c.html"),
            true,
            &[Some("bar".to_string()), Some("baz".to_string())],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| !a.primary));
    }

    #[test]
    fn test_postprocess_substitution_and_trim() {
        let doc = Document::parse("<style>  .{{id}} h1 { }  </style>");
        let el = doc
            .select(&Selector::parse("style").unwrap())
            .into_iter()
            .next()
            .unwrap();

        let mut options = CompileOptions::default();
        options.trim.inline = true;
        options.id.replace = true;
        let selectors = RunSelectors::compile(&options).unwrap();

        let fragment = read_fragment(&el, TraitKind::Style, Path::new("/")).unwrap();
        let fragment = postprocess(fragment, "x-foo", &selectors);
        assert_eq!(fragment.contents, ".x-foo h1 { }");
    }

    #[test]
    fn test_invalid_id_pattern_is_configuration_error() {
        let mut options = CompileOptions::default();
        options.id.replace = true;
        options.id.pattern = "(".to_string();
        let err = RunSelectors::compile(&options).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
