//! Compile options: selector configuration, trait post-processing switches,
//! protocol and plugin wiring, and JSON configuration file merging.
//!
//! Option layering follows the configuration-file convention: computed
//! defaults first, then each file in `rc` in order, then whatever the
//! caller set explicitly on the passed options.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::error::CompilerError;
use crate::registry::{Factory, Named, Phase, PluginConfig};

const DEFAULT_NAME: &str = "components";

/// Selectors identifying the declarative elements the pipeline consumes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub modules: String,
    pub imports: String,
    pub templates: String,
    pub styles: String,
    pub scripts: String,
}

impl Default for Selectors {
    fn default() -> Selectors {
        Selectors {
            modules: "dom-module".to_string(),
            imports: "link[rel=import][href]".to_string(),
            templates: "template, link[rel=template][href]".to_string(),
            styles: "style, link[rel=stylesheet][href]".to_string(),
            scripts: "script".to_string(),
        }
    }
}

/// Whitespace post-processing applied to trait contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrimOptions {
    /// Trim surrounding whitespace from inline trait contents.
    pub inline: bool,
}

/// Placeholder substitution replacing pattern matches with the owning
/// module id in every trait's contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdOptions {
    pub replace: bool,
    /// Regular expression matched against trait contents.
    pub pattern: String,
}

impl Default for IdOptions {
    fn default() -> IdOptions {
        IdOptions {
            replace: false,
            pattern: r"\{\{id\}\}".to_string(),
        }
    }
}

/// Programmatic lookup overrides for named plugins and protocol resolvers.
#[derive(Default, Clone)]
pub struct Conf {
    pub plugins: HashMap<String, Factory<Phase>>,
    pub protocols: HashMap<String, Factory<()>>,
}

/// Options for one compiler run.
#[derive(Clone)]
pub struct CompileOptions {
    /// Component source files to load, in order.
    pub files: Vec<String>,
    /// JSON configuration files merged into these options.
    pub rc: Vec<String>,
    /// Enabled resolver schemes; `file` is always available.
    pub protocols: Vec<String>,
    pub selectors: Selectors,
    pub trim: TrimOptions,
    pub id: IdOptions,
    /// Base name for the output buffers.
    pub name: String,
    /// Output directory used to derive the buffer paths below.
    pub out: Option<PathBuf>,
    pub html: Option<PathBuf>,
    pub css: Option<PathBuf>,
    pub js: Option<PathBuf>,
    /// Line separator for output buffer concatenation.
    pub eol: Option<String>,
    /// Phase list; defaults to the `sources` builtin when unset.
    pub plugins: Option<Vec<Named<Phase>>>,
    /// Phases prepended/appended around the main list.
    pub before: Vec<Named<Phase>>,
    pub after: Vec<Named<Phase>>,
    /// Lookup overrides consulted before builtin plugins.
    pub conf: Conf,
    /// Per-plugin configuration values, keyed by plugin name.
    pub plugin_conf: HashMap<String, PluginConfig>,
}

impl std::fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOptions")
            .field("files", &self.files)
            .field("rc", &self.rc)
            .field("protocols", &self.protocols)
            .field("selectors", &self.selectors)
            .field("trim", &self.trim)
            .field("id", &self.id)
            .field("name", &self.name)
            .field("out", &self.out)
            .field("html", &self.html)
            .field("css", &self.css)
            .field("js", &self.js)
            .field("eol", &self.eol)
            .field("plugins", &self.plugins.as_ref().map(|p| p.len()))
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field(
                "conf.plugins",
                &self.conf.plugins.keys().collect::<Vec<_>>(),
            )
            .field(
                "conf.protocols",
                &self.conf.protocols.keys().collect::<Vec<_>>(),
            )
            .field("plugin_conf", &self.plugin_conf)
            .finish()
    }
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            files: Vec::new(),
            rc: Vec::new(),
            protocols: Vec::new(),
            selectors: Selectors::default(),
            trim: TrimOptions::default(),
            id: IdOptions::default(),
            name: DEFAULT_NAME.to_string(),
            out: None,
            html: None,
            css: None,
            js: None,
            eol: None,
            plugins: None,
            before: Vec::new(),
            after: Vec::new(),
            conf: Conf::default(),
            plugin_conf: HashMap::new(),
        }
    }
}

impl CompileOptions {
    /// Configuration for a named plugin, `null` when none was supplied.
    pub fn plugin_config(&self, name: &str) -> PluginConfig {
        self.plugin_conf
            .get(name)
            .cloned()
            .unwrap_or(PluginConfig::Null)
    }

    /// Build options from a loose JSON value, as produced by a resolver
    /// yielding a nested compiler configuration.
    pub fn from_value(value: serde_json::Value) -> Result<CompileOptions, CompilerError> {
        let cfg: ConfigFile = serde_json::from_value(value)
            .map_err(|e| CompilerError::Configuration(format!("invalid configuration: {}", e)))?;
        let mut options = CompileOptions::default();
        if let Some(files) = &cfg.files {
            options.files = files.clone();
        }
        apply(&mut options, cfg);
        Ok(options)
    }
}

/// The serializable subset of [`CompileOptions`] accepted from
/// configuration files.
#[derive(Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    files: Option<Vec<String>>,
    protocols: Option<Vec<String>>,
    selectors: Option<Selectors>,
    trim: Option<TrimOptions>,
    id: Option<IdOptions>,
    name: Option<String>,
    out: Option<PathBuf>,
    html: Option<PathBuf>,
    css: Option<PathBuf>,
    js: Option<PathBuf>,
    eol: Option<String>,
    plugin_conf: Option<HashMap<String, PluginConfig>>,
}

fn apply(options: &mut CompileOptions, cfg: ConfigFile) {
    if let Some(v) = cfg.protocols {
        options.protocols = v;
    }
    if let Some(v) = cfg.selectors {
        options.selectors = v;
    }
    if let Some(v) = cfg.trim {
        options.trim = v;
    }
    if let Some(v) = cfg.id {
        options.id = v;
    }
    if let Some(v) = cfg.name {
        options.name = v;
    }
    if let Some(v) = cfg.out {
        options.out = Some(v);
    }
    if let Some(v) = cfg.html {
        options.html = Some(v);
    }
    if let Some(v) = cfg.css {
        options.css = Some(v);
    }
    if let Some(v) = cfg.js {
        options.js = Some(v);
    }
    if let Some(v) = cfg.eol {
        options.eol = Some(v);
    }
    if let Some(v) = cfg.plugin_conf {
        options.plugin_conf.extend(v);
    }
}

/// Overlay caller-set fields (anything differing from the defaults) onto
/// the configuration-file base.
fn overlay(base: &mut CompileOptions, passed: &CompileOptions, defaults: &CompileOptions) {
    if passed.protocols != defaults.protocols {
        base.protocols = passed.protocols.clone();
    }
    if passed.selectors != defaults.selectors {
        base.selectors = passed.selectors.clone();
    }
    if passed.trim != defaults.trim {
        base.trim = passed.trim.clone();
    }
    if passed.id != defaults.id {
        base.id = passed.id.clone();
    }
    if passed.name != defaults.name {
        base.name = passed.name.clone();
    }
    if passed.out.is_some() {
        base.out = passed.out.clone();
    }
    if passed.html.is_some() {
        base.html = passed.html.clone();
    }
    if passed.css.is_some() {
        base.css = passed.css.clone();
    }
    if passed.js.is_some() {
        base.js = passed.js.clone();
    }
    if passed.eol.is_some() {
        base.eol = passed.eol.clone();
    }
}

/// Compute the final options for a run: merge configuration files, overlay
/// caller options and derive the output buffer paths.
pub fn finalize(passed: CompileOptions) -> Result<CompileOptions, CompilerError> {
    let defaults = CompileOptions::default();
    let mut options = CompileOptions::default();

    // programmatic fields carry over untouched
    options.plugins = passed.plugins.clone();
    options.before = passed.before.clone();
    options.after = passed.after.clone();
    options.conf = passed.conf.clone();
    options.plugin_conf = passed.plugin_conf.clone();
    options.rc = passed.rc.clone();

    let mut files = passed.files.clone();
    for path in &passed.rc {
        let text = fs::read_to_string(path).map_err(|e| CompilerError::Io {
            path: PathBuf::from(path),
            source: e,
        })?;
        let cfg: ConfigFile = serde_json::from_str(&text).map_err(|e| {
            CompilerError::Configuration(format!("invalid configuration file {}: {}", path, e))
        })?;
        if let Some(extra) = &cfg.files {
            files.extend(extra.clone());
        }
        apply(&mut options, cfg);
    }

    overlay(&mut options, &passed, &defaults);
    options.files = files;

    // derive output buffer paths from the output directory
    if let Some(out) = options.out.clone() {
        if options.html.is_none() {
            options.html = Some(out.join(format!("{}.html", options.name)));
        }
        if options.css.is_none() {
            options.css = Some(out.join(format!("{}.css", options.name)));
        }
        if options.js.is_none() {
            options.js = Some(out.join(format!("{}.js", options.name)));
        }
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_selectors() {
        let options = CompileOptions::default();
        assert_eq!(options.selectors.modules, "dom-module");
        assert_eq!(options.selectors.imports, "link[rel=import][href]");
        assert_eq!(options.name, "components");
    }

    #[test]
    fn test_output_paths_derived_from_out() {
        let mut options = CompileOptions::default();
        options.out = Some(PathBuf::from("target"));
        options.name = "widgets".to_string();
        let options = finalize(options).unwrap();
        assert_eq!(options.html, Some(PathBuf::from("target/widgets.html")));
        assert_eq!(options.css, Some(PathBuf::from("target/widgets.css")));
        assert_eq!(options.js, Some(PathBuf::from("target/widgets.js")));
    }

    #[test]
    fn test_config_file_merge_and_caller_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("options.json");
        let mut f = fs::File::create(&rc).unwrap();
        write!(
            f,
            "{{\"name\": \"widgets\", \"trim\": {{\"inline\": true}}, \
              \"files\": [\"extra.html\"]}}"
        )
        .unwrap();

        let mut passed = CompileOptions::default();
        passed.files = vec!["main.html".to_string()];
        passed.rc = vec![rc.display().to_string()];
        passed.name = "override".to_string();

        let options = finalize(passed).unwrap();
        // caller wins over the config file, config file wins over defaults
        assert_eq!(options.name, "override");
        assert!(options.trim.inline);
        assert_eq!(options.files, vec!["main.html", "extra.html"]);
    }

    #[test]
    fn test_invalid_config_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("broken.json");
        fs::write(&rc, "{not json").unwrap();

        let mut passed = CompileOptions::default();
        passed.rc = vec![rc.display().to_string()];
        let err = finalize(passed).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_from_value() {
        let options = CompileOptions::from_value(serde_json::json!({
            "files": ["a.html"],
            "id": {"replace": true, "pattern": "@@"}
        }))
        .unwrap();
        assert_eq!(options.files, vec!["a.html"]);
        assert!(options.id.replace);
        assert_eq!(options.id.pattern, "@@");
    }
}
