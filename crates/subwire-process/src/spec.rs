//! Process specification

use std::collections::HashMap;
use std::path::PathBuf;

/// Specification of a process to launch: executable, ordered arguments,
/// environment overrides, and optional working directory.
///
/// Environment entries supplement the inherited environment and override
/// inherited variables of the same name. The argument list is passed to the
/// OS verbatim; no shell interpretation happens anywhere in this crate.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Executable path or name (resolved against PATH by the OS)
    pub executable: String,
    /// Ordered argument list
    pub args: Vec<String>,
    /// Environment overrides (merged over the inherited environment)
    pub env: HashMap<String, String>,
    /// Working directory (None = inherit)
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    /// Create a spec for the given executable
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: vec![],
            env: HashMap::new(),
            working_dir: None,
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment override
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add several environment overrides
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}
