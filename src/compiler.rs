//! Pipeline driver: phase constants, builtin plugins and the `compile`
//! entry point.
//!
//! A run resolves its phase list through the generic registry (explicit
//! closures pass through, lookup overrides shadow builtins), invokes every
//! factory once with the run state and its plugin configuration, and only
//! then executes the phases in order. Resolution failures abort before any
//! phase runs.

use serde_json::Value;
use tracing::info;

use crate::error::CompilerError;
use crate::options::{self, CompileOptions};
use crate::registry::{Named, Phase, PluginConfig, Registry};
use crate::resolver::{file_protocol, FILE_SCHEME};
use crate::state::State;

pub const SOURCES: &str = "sources";
pub const LOAD: &str = "load";
pub const PARSE: &str = "parse";
pub const TRANSFORM: &str = "transform";
pub const GENERATE: &str = "generate";
pub const WRITE: &str = "write";

/// Every phase name the pipeline knows about, in execution order.
/// Builtins exist for the first three; the rest are supplied by
/// downstream plugins through the lookup overrides.
pub const PHASES: [&str; 6] = [SOURCES, LOAD, PARSE, TRANSFORM, GENERATE, WRITE];

const PLUGIN_PREFIX: &str = "plugin-";
const RESOLVER_PREFIX: &str = "resolver-";

/// Compile the configured component sources into a resolved module tree.
pub fn compile(options: CompileOptions) -> Result<State, CompilerError> {
    let options = options::finalize(options)?;
    let mut state = State::new(options);

    let mut refs: Vec<Named<Phase>> = state.options.before.clone();
    match &state.options.plugins {
        Some(plugins) => refs.extend(plugins.clone()),
        None => refs.push(Named::name(SOURCES)),
    }
    refs.extend(state.options.after.clone());

    let registry = phase_registry();
    // resolve every name before anything is invoked or executed
    let resolved = registry.resolve(&refs, &state.options.conf.plugins)?;

    let mut phases = Vec::with_capacity(resolved.len());
    for (name, factory) in resolved {
        let config = state.options.plugin_config(&name);
        phases.push((name, (*factory)(&mut state, &config)?));
    }

    for (name, phase) in &phases {
        info!(phase = %name, "running phase");
        phase(&mut state)?;
    }
    Ok(state)
}

fn phase_registry() -> Registry<Phase> {
    Registry::new(PLUGIN_PREFIX)
        .builtin(SOURCES, sources_plugin)
        .builtin(LOAD, load_plugin)
        .builtin(PARSE, parse_plugin)
}

/// The default phase: load the file tree, then build the module tree.
fn sources_plugin(state: &mut State, config: &PluginConfig) -> Result<Phase, CompilerError> {
    let load = load_plugin(state, config)?;
    let parse = parse_plugin(state, config)?;
    Ok(Box::new(move |state: &mut State| {
        load(state)?;
        parse(state)
    }))
}

/// Validate the protocol list, register a resolver for each enabled scheme
/// and return the load phase.
fn load_plugin(state: &mut State, config: &PluginConfig) -> Result<Phase, CompilerError> {
    let mut protocols = state.options.protocols.clone();
    if protocols.is_empty() {
        protocols = protocols_from_config(config)?;
    }
    // the default scheme is always available
    if !protocols.iter().any(|p| p == FILE_SCHEME) {
        protocols.insert(0, FILE_SCHEME.to_string());
    }

    let registry = Registry::new(RESOLVER_PREFIX).builtin(FILE_SCHEME, file_protocol);
    let refs: Vec<Named<()>> = protocols.iter().map(|p| Named::name(p)).collect();
    let lookup = state.options.conf.protocols.clone();
    let resolved = registry.resolve(&refs, &lookup)?;
    for (name, factory) in resolved {
        let config = state.options.plugin_config(&name);
        (*factory)(state, &config)?;
    }

    Ok(Box::new(|state: &mut State| {
        let files = state.options.files.clone();
        crate::load::load(state, &files)
    }))
}

fn parse_plugin(_state: &mut State, _config: &PluginConfig) -> Result<Phase, CompilerError> {
    Ok(Box::new(|state: &mut State| crate::parse::build(state)))
}

/// Protocol names supplied through the plugin configuration; anything but
/// an array of strings is rejected.
fn protocols_from_config(config: &PluginConfig) -> Result<Vec<String>, CompilerError> {
    match config.get("protocols") {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| CompilerError::Configuration("protocols array expected".into()))
            })
            .collect(),
        Some(_) => Err(CompilerError::Configuration(
            "protocols array expected".into(),
        )),
    }
}
