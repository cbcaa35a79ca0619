//! Template replies.
//!
//! A handler returns a [`Template`] followed by the value to render it with.

use std::fmt;
use std::sync::Arc;

use minijinja::Environment;

/// A named template in a shared environment.
#[derive(Clone)]
pub struct Template {
    env: Arc<Environment<'static>>,
    name: String,
}

impl Template {
    /// Refer to a template already loaded into `env`.
    pub fn new(env: Arc<Environment<'static>>, name: impl Into<String>) -> Self {
        Self {
            env,
            name: name.into(),
        }
    }

    /// Compile a standalone template from source.
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Result<Self, minijinja::Error> {
        let name = name.into();
        let mut env = Environment::new();
        env.add_template_owned(name.clone(), source.into())?;
        Ok(Self::new(Arc::new(env), name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn render(&self, context: minijinja::Value) -> Result<String, minijinja::Error> {
        self.env.get_template(&self.name)?.render(context)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template").field("name", &self.name).finish()
    }
}
