use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tower::BoxError;

use crate::command::{Command, CommandContext, Executable};
use crate::space::Space;

// ─── ExtensionLoadContext ─────────────────────────────────────────────────────

/// Context passed to an extension's `init` hook.
///
/// Provides the extension's settings section and the shared [`Space`].
///
/// # Example
///
/// ```rust,ignore
/// #[derive(serde::Deserialize, Default)]
/// #[serde(default)]
/// struct DiceSettings { sides: u32 }
///
/// Extension::builder("dice")
///     .on_init(|ctx: ExtensionLoadContext| async move {
///         let settings: DiceSettings = ctx.get_settings()?;
///         ctx.space().insert("dice.sides", settings.sides.into());
///         Ok(())
///     })
///     .build()
/// ```
#[derive(Clone, Debug)]
pub struct ExtensionLoadContext {
    handle: String,
    settings: Arc<Value>,
    space: Space,
}

impl ExtensionLoadContext {
    pub(crate) fn new(handle: String, settings: Arc<Value>, space: Space) -> Self {
        Self {
            handle,
            settings,
            space,
        }
    }

    /// Handle of the extension being loaded.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Raw settings section.
    pub fn settings(&self) -> &Value {
        &self.settings
    }

    /// Deserialise the settings section into `T`.
    ///
    /// Use `#[serde(default)]` on the struct to make every field optional.
    pub fn get_settings<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(self.settings.as_ref())
    }

    pub fn space(&self) -> &Space {
        &self.space
    }
}

/// Type of the async `init` hook stored inside an [`Extension`].
pub type InitFn =
    Arc<dyn Fn(ExtensionLoadContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Type of the async `term` hook stored inside an [`Extension`].
pub type TermFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

// ─── Extension ────────────────────────────────────────────────────────────────

/// A live extension bundling commands, executables and lifecycle hooks.
///
/// Create via [`Extension::builder`].
pub struct Extension {
    handle: String,
    info: String,
    needs: Vec<String>,
    commands: Vec<Command>,
    executables: Vec<Executable>,
    init: Option<InitFn>,
    term: Option<TermFn>,
}

impl Extension {
    /// Starts building an extension with the given handle.
    pub fn builder(handle: impl Into<String>) -> ExtensionBuilder {
        ExtensionBuilder {
            extension: Extension {
                handle: handle.into(),
                info: String::new(),
                needs: Vec::new(),
                commands: Vec::new(),
                executables: Vec::new(),
                init: None,
                term: None,
            },
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// One-line description.
    pub fn info(&self) -> &str {
        &self.info
    }

    /// Handles of extensions that must be loaded before this one.
    pub fn needs(&self) -> &[String] {
        &self.needs
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn executables(&self) -> &[Executable] {
        &self.executables
    }

    /// Qualified name of an executable: `<extension>::<name>`.
    pub fn qualify(&self, executable: &str) -> String {
        format!("{}::{}", self.handle, executable)
    }

    /// Runs the `init` hook, if any.
    pub(crate) async fn init(&self, ctx: ExtensionLoadContext) -> Result<(), BoxError> {
        match &self.init {
            Some(f) => f(ctx).await,
            None => Ok(()),
        }
    }

    /// Runs the `term` hook, if any.
    pub(crate) async fn term(&self) {
        if let Some(f) = &self.term {
            f().await;
        }
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("handle", &self.handle)
            .field("needs", &self.needs)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

// ─── ExtensionBuilder ─────────────────────────────────────────────────────────

/// Builder returned by [`Extension::builder`].
pub struct ExtensionBuilder {
    extension: Extension,
}

impl ExtensionBuilder {
    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.extension.info = info.into();
        self
    }

    /// Declares that `handle` must be loaded first.
    pub fn needs(mut self, handle: impl Into<String>) -> Self {
        self.extension.needs.push(handle.into());
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.extension.commands.push(command);
        self
    }

    /// Adds an executable, reachable as `<extension>::<name>`.
    pub fn executable<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.extension
            .executables
            .push(Executable::new(name, handler));
        self
    }

    /// Sets the hook run once when the extension is loaded.
    ///
    /// Returning `Err` marks the extension as failed; its commands are never
    /// registered.
    pub fn on_init<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ExtensionLoadContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let init: InitFn = Arc::new(
            move |ctx: ExtensionLoadContext| -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(hook(ctx))
            },
        );
        self.extension.init = Some(init);
        self
    }

    /// Sets the hook run once when the extension is unloaded.
    pub fn on_term<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let term: TermFn = Arc::new(move || -> BoxFuture<'static, ()> { Box::pin(hook()) });
        self.extension.term = Some(term);
        self
    }

    pub fn build(self) -> Extension {
        self.extension
    }
}
