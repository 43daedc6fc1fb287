//! Generic name-to-factory resolution shared by pipeline phases and
//! protocol resolver plugins.
//!
//! A reference is either an explicit factory or a name. Names resolve with
//! fixed precedence: an entry in the caller's lookup map wins over the
//! builtin registered under the conventional `<prefix><name>` key. Any name
//! that resolves nowhere is a configuration error raised before a single
//! factory is invoked, so a bad pipeline never partially executes.
//!
//! Factories are invoked exactly once per run with the pipeline state and
//! their plugin configuration, and return the closure reused for every
//! input in that run.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::CompilerError;
use crate::state::State;

/// Per-plugin configuration as loose JSON, keyed by plugin name in the
/// compile options.
pub type PluginConfig = serde_json::Value;

/// A plugin factory producing a `T` for the current run.
pub type Factory<T> = Rc<dyn Fn(&mut State, &PluginConfig) -> Result<T, CompilerError>>;

/// An executable pipeline phase.
pub type Phase = Box<dyn Fn(&mut State) -> Result<(), CompilerError>>;

/// One entry in an ordered plugin list: already a factory, or a name to
/// resolve through a [`Registry`].
pub enum Named<T> {
    Fn(Factory<T>),
    Name(String),
}

impl<T> Named<T> {
    pub fn name(name: &str) -> Named<T> {
        Named::Name(name.to_string())
    }

    pub fn factory(
        f: impl Fn(&mut State, &PluginConfig) -> Result<T, CompilerError> + 'static,
    ) -> Named<T> {
        Named::Fn(Rc::new(f))
    }
}

impl<T> Clone for Named<T> {
    fn clone(&self) -> Self {
        match self {
            Named::Fn(f) => Named::Fn(f.clone()),
            Named::Name(n) => Named::Name(n.clone()),
        }
    }
}

/// Builtin factories for one plugin family, keyed `<prefix><name>`.
pub struct Registry<T> {
    prefix: &'static str,
    builtins: HashMap<String, Factory<T>>,
}

impl<T> Registry<T> {
    pub fn new(prefix: &'static str) -> Registry<T> {
        Registry {
            prefix,
            builtins: HashMap::new(),
        }
    }

    pub fn builtin(
        mut self,
        name: &str,
        f: impl Fn(&mut State, &PluginConfig) -> Result<T, CompilerError> + 'static,
    ) -> Registry<T> {
        self.builtins
            .insert(format!("{}{}", self.prefix, name), Rc::new(f));
        self
    }

    /// Resolve an ordered reference list to `(name, factory)` pairs.
    /// Fails on the first unresolvable name, before anything is invoked.
    pub fn resolve(
        &self,
        refs: &[Named<T>],
        lookup: &HashMap<String, Factory<T>>,
    ) -> Result<Vec<(String, Factory<T>)>, CompilerError> {
        refs.iter()
            .map(|entry| match entry {
                Named::Fn(f) => Ok(("<fn>".to_string(), f.clone())),
                Named::Name(name) => {
                    if let Some(f) = lookup.get(name) {
                        return Ok((name.clone(), f.clone()));
                    }
                    let key = format!("{}{}", self.prefix, name);
                    self.builtins
                        .get(&key)
                        .map(|f| (name.clone(), f.clone()))
                        .ok_or_else(|| {
                            CompilerError::Configuration(format!(
                                "unable to resolve {} for '{}'",
                                key, name
                            ))
                        })
                }
            })
            .collect()
    }
}
