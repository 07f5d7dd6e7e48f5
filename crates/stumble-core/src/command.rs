//! Commands, command contexts and operator-prefix parsing.
//!
//! A [`Command`] pairs a handle (what users type after the operator) with an
//! async handler. Handlers are stored as boxed tower services so that the
//! manager can clone and call them without holding any lock.
//!
//! ```rust,ignore
//! let ping = Command::new("ping", |ctx: Arc<CommandContext>| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! })
//! .info("Replies with pong")
//! .alias("p");
//! ```

use std::future::Future;
use std::sync::Arc;

use tower::BoxError;
use tower::util::BoxCloneSyncService;

use crate::bot::{Bot, BoxedBot};
use crate::error::SendResult;
use crate::manager::ExtensionManager;
use crate::space::Space;
use crate::user::User;

/// Boxed handler shared by commands and executables.
pub type BoxedCommandService = BoxCloneSyncService<Arc<CommandContext>, (), BoxError>;

/// Wraps an async closure into a [`BoxedCommandService`].
pub(crate) fn boxed_service<F, Fut>(handler: F) -> BoxedCommandService
where
    F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    BoxCloneSyncService::new(tower::service_fn(handler))
}

// ============================================================================
// Invocation parsing
// ============================================================================

/// A chat message that starts with the operator, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// First word after the operator.
    pub handle: String,
    /// Remaining words, re-joined with single spaces.
    pub message: String,
}

/// Splits `message` into a handle and argument text if it starts with
/// `operator`.
///
/// The remainder is split on single spaces, so runs of spaces produce empty
/// pieces that survive the re-join. An empty operator never matches.
pub fn parse_invocation(operator: &str, message: &str) -> Option<Invocation> {
    if operator.is_empty() {
        return None;
    }
    let rest = message.strip_prefix(operator)?;
    let mut pieces = rest.split(' ');
    let handle = pieces.next().unwrap_or_default().to_string();
    let message = pieces.collect::<Vec<_>>().join(" ");
    Some(Invocation { handle, message })
}

// ============================================================================
// CommandData / CommandContext
// ============================================================================

/// The data a command is invoked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandData {
    /// The handle as typed by the user (may be an alias).
    pub handle: String,
    /// The user who sent the command.
    pub user: User,
    /// Argument text following the handle.
    pub message: String,
}

impl CommandData {
    pub fn new(handle: impl Into<String>, user: User, message: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            user,
            message: message.into(),
        }
    }
}

/// Everything a command handler can reach.
pub struct CommandContext {
    data: CommandData,
    bot: BoxedBot,
    manager: Arc<ExtensionManager>,
}

impl CommandContext {
    /// Creates a context for one invocation.
    pub fn new(data: CommandData, bot: BoxedBot, manager: Arc<ExtensionManager>) -> Self {
        Self { data, bot, manager }
    }

    pub fn data(&self) -> &CommandData {
        &self.data
    }

    /// The handle as typed by the user.
    pub fn handle(&self) -> &str {
        &self.data.handle
    }

    pub fn user(&self) -> &User {
        &self.data.user
    }

    /// Argument text following the handle.
    pub fn message(&self) -> &str {
        &self.data.message
    }

    /// Whitespace-separated arguments.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.data.message.split_whitespace()
    }

    pub fn bot(&self) -> &dyn Bot {
        self.bot.as_ref()
    }

    pub fn manager(&self) -> &Arc<ExtensionManager> {
        &self.manager
    }

    pub fn space(&self) -> &Space {
        self.manager.space()
    }

    /// Sends a private reply to the invoking user.
    pub async fn reply(&self, text: &str) -> SendResult<()> {
        self.data.user.send_message(self.bot.as_ref(), text).await
    }
}

// ============================================================================
// Command
// ============================================================================

/// A chat command contributed by an extension.
#[derive(Clone)]
pub struct Command {
    handle: String,
    info: String,
    aliases: Vec<String>,
    requires: Option<String>,
    service: BoxedCommandService,
}

impl Command {
    /// Creates a command from an async handler.
    pub fn new<F, Fut>(handle: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            handle: handle.into(),
            info: String::new(),
            aliases: Vec::new(),
            requires: None,
            service: boxed_service(handler),
        }
    }

    /// Sets the one-line description shown by `help`.
    pub fn info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Adds an alternative handle.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Requires membership in a permission group.
    ///
    /// Only enforced while the permissions extension is loaded.
    pub fn requires(mut self, group: impl Into<String>) -> Self {
        self.requires = Some(group.into());
        self
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn description(&self) -> &str {
        &self.info
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn required_group(&self) -> Option<&str> {
        self.requires.as_deref()
    }

    pub(crate) fn service(&self) -> BoxedCommandService {
        self.service.clone()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("handle", &self.handle)
            .field("aliases", &self.aliases)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Executable
// ============================================================================

/// A named function other code can call through
/// [`ExtensionManager::execute`] as `<extension>::<name>`.
#[derive(Clone)]
pub struct Executable {
    name: String,
    service: BoxedCommandService,
}

impl Executable {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Arc<CommandContext>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            service: boxed_service(handler),
        }
    }

    /// Unqualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn service(&self) -> BoxedCommandService {
        self.service.clone()
    }
}
