//! Extension lifecycle management and command routing.
//!
//! [`ExtensionManager`] is the central owner of all registered extensions. It:
//!
//! - Accepts [`Extension`]s and stores them with an initial state of
//!   [`ExtensionLoadState::Registered`].
//! - Drives the lifecycle (`init` / `term`) in dependency order via
//!   [`start_all`](ExtensionManager::start_all) /
//!   [`stop_all`](ExtensionManager::stop_all). Extensions whose `needs` are not
//!   loaded are marked [`ExtensionLoadState::Failed`] and contribute nothing.
//! - Owns the routing tables: command handles, aliases and qualified
//!   executable names. Only **active** extensions are routed.
//! - Owns the shared [`Space`].
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = Arc::new(ExtensionManager::new(HashMap::new()));
//! manager.use_extension(dice()).await?;
//! manager.start_all().await;
//! // …later…
//! manager.stop_all().await;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio::sync::RwLock as AsyncRwLock;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::command::{BoxedCommandService, CommandContext};
use crate::error::{CoreError, CoreResult};
use crate::extension::{Extension, ExtensionLoadContext};
use crate::space::Space;

// =============================================================================
// Topological sort utility
// =============================================================================

/// Computes the extension load order as **layers** via Kahn's algorithm.
///
/// Each inner `Vec<usize>` holds indices of extensions that may be loaded in
/// parallel. Unload order is the reversed list of layers.
///
/// An edge **A → B** means "B needs A". Needs that name no registered
/// extension add no edge; they are reported when loading.
///
/// # Errors
///
/// Returns `Err(description)` when a dependency cycle is detected.
fn topological_layers(extensions: &[Arc<Extension>]) -> Result<Vec<Vec<usize>>, String> {
    let n = extensions.len();

    let index: HashMap<&str, usize> = extensions
        .iter()
        .enumerate()
        .map(|(i, ext)| (ext.handle(), i))
        .collect();

    let mut in_degree: Vec<usize> = vec![0; n];
    let mut dependents: Vec<Vec<usize>> = vec![vec![]; n];

    for (i, ext) in extensions.iter().enumerate() {
        for need in ext.needs() {
            match index.get(need.as_str()) {
                Some(&provider) if provider != i => {
                    dependents[provider].push(i);
                    in_degree[i] += 1;
                }
                Some(_) => {
                    warn!(
                        extension = %ext.handle(),
                        "Extension needs itself, ignored"
                    );
                }
                None => {}
            }
        }
    }

    let mut layers: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while !current.is_empty() {
        processed += current.len();
        let mut next: Vec<usize> = Vec::new();
        for &i in &current {
            for &j in &dependents[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    next.push(j);
                }
            }
        }
        layers.push(current);
        current = next;
    }

    if processed != n {
        let cycle_nodes: Vec<&str> = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| extensions[i].handle())
            .collect();
        return Err(format!(
            "Extension dependency cycle detected among: {}",
            cycle_nodes.join(", ")
        ));
    }

    Ok(layers)
}

/// Tracks the load state of an extension registered with [`ExtensionManager`].
///
/// ```text
/// use_extension() ──► Registered
///     start_all() ──► Active    (needs met, init succeeded)
///                 ──► Failed    (needs missing or init failed)
///     stop_all()  ──► Registered (Active → Registered after term)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionLoadState {
    Registered,
    Active,
    Failed,
}

/// Public view of a registered extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSummary {
    pub handle: String,
    pub info: String,
    pub state: ExtensionLoadState,
}

/// Public view of a routed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub handle: String,
    pub info: String,
    pub aliases: Vec<String>,
    /// Permission group the command asks for, if any.
    pub requires: Option<String>,
    /// Handle of the extension that contributed the command.
    pub extension: String,
}

// =============================================================================
// Internal tables
// =============================================================================

struct ExtensionEntry {
    extension: Arc<Extension>,
    state: ExtensionLoadState,
    failure: Option<CoreError>,
}

struct CommandRoute {
    info: CommandInfo,
    service: BoxedCommandService,
}

#[derive(Default)]
struct Routes {
    commands: HashMap<String, CommandRoute>,
    aliases: HashMap<String, String>,
    executables: HashMap<String, BoxedCommandService>,
}

impl Routes {
    /// Command handles win over aliases.
    fn resolve(&self, handle: &str) -> Option<&str> {
        if let Some((key, _)) = self.commands.get_key_value(handle) {
            return Some(key.as_str());
        }
        self.aliases
            .get(handle)
            .filter(|target| self.commands.contains_key(target.as_str()))
            .map(String::as_str)
    }

    fn register(&mut self, ext: &Extension) {
        for cmd in ext.commands() {
            let info = CommandInfo {
                handle: cmd.handle().to_string(),
                info: cmd.description().to_string(),
                aliases: cmd.aliases().to_vec(),
                requires: cmd.required_group().map(str::to_string),
                extension: ext.handle().to_string(),
            };
            if let Some(prev) = self.commands.insert(
                cmd.handle().to_string(),
                CommandRoute {
                    info,
                    service: cmd.service(),
                },
            ) {
                warn!(
                    command        = %cmd.handle(),
                    prev_extension = %prev.info.extension,
                    new_extension  = %ext.handle(),
                    "Duplicate command handle, last registration wins"
                );
            }
            for alias in cmd.aliases() {
                if let Some(prev) = self.aliases.insert(alias.clone(), cmd.handle().to_string()) {
                    warn!(
                        alias       = %alias,
                        prev_target = %prev,
                        new_target  = %cmd.handle(),
                        "Duplicate alias, last registration wins"
                    );
                }
            }
        }
        for exe in ext.executables() {
            self.executables.insert(ext.qualify(exe.name()), exe.service());
        }
    }

    fn unregister(&mut self, ext: &Extension) {
        self.commands
            .retain(|_, route| route.info.extension != ext.handle());
        let commands = &self.commands;
        self.aliases
            .retain(|_, target| commands.contains_key(target.as_str()));
        for exe in ext.executables() {
            self.executables.remove(&ext.qualify(exe.name()));
        }
    }
}

// =============================================================================
// ExtensionManager
// =============================================================================

/// Central manager for extension registration, lifecycle and routing.
///
/// # Extension settings
///
/// `settings` maps an extension handle to its JSON settings section. The
/// section is handed to the extension's `init` hook; extensions without a
/// section receive an empty object.
pub struct ExtensionManager {
    extensions: AsyncRwLock<Vec<ExtensionEntry>>,
    routes: RwLock<Routes>,
    settings: HashMap<String, Value>,
    space: Space,
}

impl Default for ExtensionManager {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl ExtensionManager {
    /// Creates a new manager with the given per-extension settings.
    pub fn new(settings: HashMap<String, Value>) -> Self {
        Self {
            extensions: AsyncRwLock::new(Vec::new()),
            routes: RwLock::new(Routes::default()),
            settings,
            space: Space::new(),
        }
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    fn settings_for(&self, handle: &str) -> Value {
        self.settings
            .get(handle)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::default()))
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers an extension.
    ///
    /// The extension is **not** loaded until [`start_all`](Self::start_all)
    /// is called.
    pub async fn use_extension(&self, extension: Extension) -> CoreResult<()> {
        let mut list = self.extensions.write().await;
        if list
            .iter()
            .any(|e| e.extension.handle() == extension.handle())
        {
            return Err(CoreError::DuplicateExtension(
                extension.handle().to_string(),
            ));
        }
        info!(extension = %extension.handle(), "Extension registered");
        list.push(ExtensionEntry {
            extension: Arc::new(extension),
            state: ExtensionLoadState::Registered,
            failure: None,
        });
        Ok(())
    }

    /// Registers several extensions, stopping at the first duplicate.
    pub async fn use_extensions<I>(&self, extensions: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = Extension>,
    {
        for extension in extensions {
            self.use_extension(extension).await?;
        }
        Ok(())
    }

    pub async fn extension_count(&self) -> usize {
        self.extensions.read().await.len()
    }

    /// Returns the load state of the named extension.
    pub async fn extension_state(&self, handle: &str) -> Option<ExtensionLoadState> {
        self.extensions
            .read()
            .await
            .iter()
            .find(|e| e.extension.handle() == handle)
            .map(|e| e.state)
    }

    /// Returns why the named extension failed to load, if it did.
    pub async fn extension_failure(&self, handle: &str) -> Option<CoreError> {
        self.extensions
            .read()
            .await
            .iter()
            .find(|e| e.extension.handle() == handle)
            .and_then(|e| e.failure.clone())
    }

    /// Lists registered extensions in registration order.
    pub async fn extensions(&self) -> Vec<ExtensionSummary> {
        self.extensions
            .read()
            .await
            .iter()
            .map(|e| ExtensionSummary {
                handle: e.extension.handle().to_string(),
                info: e.extension.info().to_string(),
                state: e.state,
            })
            .collect()
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    async fn layers(&self) -> Vec<Vec<usize>> {
        let list = self.extensions.read().await;
        let extensions: Vec<Arc<Extension>> =
            list.iter().map(|e| Arc::clone(&e.extension)).collect();
        match topological_layers(&extensions) {
            Ok(layers) => layers,
            Err(e) => {
                error!("{e}");
                (0..list.len()).map(|i| vec![i]).collect()
            }
        }
    }

    /// Loads all registered extensions in dependency order.
    pub async fn start_all(&self) {
        for layer in self.layers().await {
            // ── 1. Classify: skip non-Registered, check needs ──────────────
            let mut failed: Vec<(usize, CoreError)> = Vec::new();
            let mut to_load: Vec<(usize, Arc<Extension>)> = Vec::new();
            {
                let list = self.extensions.read().await;
                let active: HashSet<&str> = list
                    .iter()
                    .filter(|e| e.state == ExtensionLoadState::Active)
                    .map(|e| e.extension.handle())
                    .collect();
                for &i in &layer {
                    let entry = &list[i];
                    if entry.state != ExtensionLoadState::Registered {
                        continue;
                    }
                    let ext = Arc::clone(&entry.extension);
                    match ext.needs().iter().find(|n| !active.contains(n.as_str())) {
                        Some(missing) => {
                            error!(
                                extension = %ext.handle(),
                                missing_dependency = %missing,
                                "Extension need not satisfied, extension will not be loaded"
                            );
                            failed.push((
                                i,
                                CoreError::MissingDependency {
                                    extension: ext.handle().to_string(),
                                    missing: missing.clone(),
                                },
                            ));
                        }
                        None => to_load.push((i, ext)),
                    }
                }
            }

            // ── 2. Run init hooks across the layer in parallel ─────────────
            let results = future::join_all(to_load.iter().map(|(_, ext)| {
                let ext = Arc::clone(ext);
                let ctx = ExtensionLoadContext::new(
                    ext.handle().to_string(),
                    Arc::new(self.settings_for(ext.handle())),
                    self.space.clone(),
                );
                async move { ext.init(ctx).await }
            }))
            .await;

            // ── 3. Route the successful ones, record the rest ──────────────
            let mut list = self.extensions.write().await;
            for (i, reason) in failed {
                list[i].state = ExtensionLoadState::Failed;
                list[i].failure = Some(reason);
            }
            for ((i, ext), result) in to_load.into_iter().zip(results) {
                match result {
                    Ok(()) => {
                        self.routes.write().register(&ext);
                        list[i].state = ExtensionLoadState::Active;
                        info!(extension = %ext.handle(), "Extension loaded and active");
                    }
                    Err(e) => {
                        error!(
                            extension = %ext.handle(),
                            error = %e,
                            "Extension init failed, extension will not be loaded"
                        );
                        list[i].state = ExtensionLoadState::Failed;
                        list[i].failure = Some(CoreError::InitFailed {
                            extension: ext.handle().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Unloads all **active** extensions in reverse dependency order.
    pub async fn stop_all(&self) {
        let mut layers = self.layers().await;
        layers.reverse();

        for layer in layers {
            let to_unload: Vec<(usize, Arc<Extension>)> = {
                let list = self.extensions.read().await;
                layer
                    .iter()
                    .filter_map(|&i| {
                        let entry = &list[i];
                        (entry.state == ExtensionLoadState::Active)
                            .then(|| (i, Arc::clone(&entry.extension)))
                    })
                    .collect()
            };

            if to_unload.is_empty() {
                continue;
            }

            future::join_all(to_unload.iter().map(|(_, ext)| {
                let ext = Arc::clone(ext);
                async move { ext.term().await }
            }))
            .await;

            let mut list = self.extensions.write().await;
            let mut routes = self.routes.write();
            for (i, ext) in &to_unload {
                routes.unregister(ext);
                list[*i].state = ExtensionLoadState::Registered;
                info!(extension = %ext.handle(), "Extension unloaded");
            }
        }
    }

    // ─── Routing ─────────────────────────────────────────────────────────────

    /// Returns `true` if a command is routed under exactly this handle.
    pub fn has_command(&self, handle: &str) -> bool {
        self.routes.read().commands.contains_key(handle)
    }

    /// Returns `true` if `alias` routes to a command.
    pub fn has_alias(&self, alias: &str) -> bool {
        let routes = self.routes.read();
        routes
            .aliases
            .get(alias)
            .is_some_and(|target| routes.commands.contains_key(target.as_str()))
    }

    pub fn has_executable(&self, name: &str) -> bool {
        self.routes.read().executables.contains_key(name)
    }

    /// Resolves a handle or alias to the canonical command handle.
    pub fn resolve(&self, handle: &str) -> Option<String> {
        self.routes.read().resolve(handle).map(str::to_string)
    }

    /// Describes the command reached by `handle` (handle or alias).
    pub fn command(&self, handle: &str) -> Option<CommandInfo> {
        let routes = self.routes.read();
        let canonical = routes.resolve(handle)?;
        routes.commands.get(canonical).map(|r| r.info.clone())
    }

    /// Lists routed commands sorted by handle.
    pub fn commands(&self) -> Vec<CommandInfo> {
        let mut list: Vec<CommandInfo> = self
            .routes
            .read()
            .commands
            .values()
            .map(|r| r.info.clone())
            .collect();
        list.sort_by(|a, b| a.handle.cmp(&b.handle));
        list
    }

    /// Runs the command reached by `handle` (handle or alias).
    ///
    /// Handler errors are logged, not returned; only a missing route is an
    /// error.
    pub async fn invoke(&self, handle: &str, ctx: Arc<CommandContext>) -> CoreResult<()> {
        let (canonical, service) = {
            let routes = self.routes.read();
            let canonical = routes
                .resolve(handle)
                .ok_or_else(|| CoreError::CommandNotFound(handle.to_string()))?;
            let route = &routes.commands[canonical];
            (canonical.to_string(), route.service.clone())
        };

        debug!(command = %canonical, user = %ctx.user().name, "Invoking command");
        if let Err(e) = service.oneshot(ctx).await {
            error!(command = %canonical, error = %e, "Command handler returned an error");
        }
        Ok(())
    }

    /// Runs the executable registered as `name` (`<extension>::<name>`).
    pub async fn execute(&self, name: &str, ctx: Arc<CommandContext>) -> CoreResult<()> {
        let service = self
            .routes
            .read()
            .executables
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ExecutableNotFound(name.to_string()))?;

        debug!(executable = %name, user = %ctx.user().name, "Executing");
        if let Err(e) = service.oneshot(ctx).await {
            error!(executable = %name, error = %e, "Executable returned an error");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::{Bot, BoxedBot};
    use crate::command::{Command, CommandData};
    use crate::error::SendResult;
    use crate::user::User;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockBot {
        sent: Mutex<Vec<(u32, String)>>,
    }

    #[async_trait]
    impl Bot for MockBot {
        fn id(&self) -> &str {
            "test-bot"
        }

        async fn send_to_user(&self, session: u32, text: &str) -> SendResult<()> {
            self.sent.lock().push((session, text.to_string()));
            Ok(())
        }

        async fn send_to_channel(&self, _channel_id: u32, _text: &str) -> SendResult<()> {
            Ok(())
        }
    }

    fn context(manager: &Arc<ExtensionManager>, bot: BoxedBot, handle: &str) -> Arc<CommandContext> {
        Arc::new(CommandContext::new(
            CommandData::new(handle, User::new(7, "alice"), "a b"),
            bot,
            Arc::clone(manager),
        ))
    }

    fn counting(handle: &str, counter: Arc<AtomicUsize>) -> Extension {
        Extension::builder(handle)
            .command(
                Command::new(format!("{handle}-cmd"), move |_ctx| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .alias(format!("{handle}-alias")),
            )
            .build()
    }

    fn recording(handle: &str, needs: &[&str], log: Arc<Mutex<Vec<String>>>) -> Extension {
        let name = handle.to_string();
        let mut builder = Extension::builder(handle).on_init(move |_ctx| {
            let log = Arc::clone(&log);
            let name = name.clone();
            async move {
                log.lock().push(name);
                Ok(())
            }
        });
        for need in needs {
            builder = builder.needs(*need);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_invoke_by_handle_and_alias() {
        let manager = Arc::new(ExtensionManager::default());
        let counter = Arc::new(AtomicUsize::new(0));
        manager
            .use_extension(counting("dice", Arc::clone(&counter)))
            .await
            .unwrap();
        manager.start_all().await;

        assert!(manager.has_command("dice-cmd"));
        assert!(!manager.has_command("dice-alias"));
        assert!(manager.has_alias("dice-alias"));
        assert_eq!(manager.resolve("dice-alias").as_deref(), Some("dice-cmd"));

        let bot: BoxedBot = Arc::new(MockBot::default());
        manager
            .invoke("dice-cmd", context(&manager, Arc::clone(&bot), "dice-cmd"))
            .await
            .unwrap();
        manager
            .invoke("dice-alias", context(&manager, bot, "dice-alias"))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invoke_unknown_command() {
        let manager = Arc::new(ExtensionManager::default());
        manager.start_all().await;

        let bot: BoxedBot = Arc::new(MockBot::default());
        let err = manager
            .invoke("nope", context(&manager, bot, "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CommandNotFound(h) if h == "nope"));
    }

    #[tokio::test]
    async fn test_commands_not_routed_before_start() {
        let manager = ExtensionManager::default();
        manager
            .use_extension(counting("dice", Arc::new(AtomicUsize::new(0))))
            .await
            .unwrap();

        assert!(!manager.has_command("dice-cmd"));
        assert_eq!(
            manager.extension_state("dice").await,
            Some(ExtensionLoadState::Registered)
        );
    }

    #[tokio::test]
    async fn test_duplicate_extension_rejected() {
        let manager = ExtensionManager::default();
        manager
            .use_extension(Extension::builder("dice").build())
            .await
            .unwrap();
        let err = manager
            .use_extension(Extension::builder("dice").build())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateExtension(h) if h == "dice"));
        assert_eq!(manager.extension_count().await, 1);
    }

    #[tokio::test]
    async fn test_needs_load_first() {
        let manager = ExtensionManager::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager
            .use_extension(recording("child", &["parent"], Arc::clone(&log)))
            .await
            .unwrap();
        manager
            .use_extension(recording("parent", &[], Arc::clone(&log)))
            .await
            .unwrap();
        manager.start_all().await;

        assert_eq!(*log.lock(), vec!["parent", "child"]);
        assert_eq!(
            manager.extension_state("child").await,
            Some(ExtensionLoadState::Active)
        );
    }

    #[tokio::test]
    async fn test_missing_need_fails_extension() {
        let manager = ExtensionManager::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager
            .use_extension(recording("orphan", &["ghost"], Arc::clone(&log)))
            .await
            .unwrap();
        manager.start_all().await;

        assert!(log.lock().is_empty());
        assert_eq!(
            manager.extension_state("orphan").await,
            Some(ExtensionLoadState::Failed)
        );
        assert!(matches!(
            manager.extension_failure("orphan").await,
            Some(CoreError::MissingDependency { missing, .. }) if missing == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_cycle_falls_back_and_fails_unmet() {
        let manager = ExtensionManager::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager
            .use_extension(recording("a", &["b"], Arc::clone(&log)))
            .await
            .unwrap();
        manager
            .use_extension(recording("b", &["a"], Arc::clone(&log)))
            .await
            .unwrap();
        manager.start_all().await;

        assert_eq!(
            manager.extension_state("a").await,
            Some(ExtensionLoadState::Failed)
        );
        assert_eq!(
            manager.extension_state("b").await,
            Some(ExtensionLoadState::Failed)
        );
    }

    #[tokio::test]
    async fn test_init_failure_marks_failed() {
        let manager = ExtensionManager::default();
        let ext = Extension::builder("broken")
            .command(Command::new("broken-cmd", |_ctx| async { Ok(()) }))
            .on_init(|_ctx| async { Err("boom".into()) })
            .build();
        manager.use_extension(ext).await.unwrap();
        manager.start_all().await;

        assert!(!manager.has_command("broken-cmd"));
        assert!(matches!(
            manager.extension_failure("broken").await,
            Some(CoreError::InitFailed { reason, .. }) if reason == "boom"
        ));
    }

    #[tokio::test]
    async fn test_init_receives_settings_and_space() {
        let mut settings = HashMap::new();
        settings.insert("dice".to_string(), json!({ "sides": 20 }));
        let manager = ExtensionManager::new(settings);

        let ext = Extension::builder("dice")
            .on_init(|ctx: ExtensionLoadContext| async move {
                let sides = ctx.settings()["sides"].clone();
                ctx.space().insert("dice.sides", sides);
                Ok(())
            })
            .build();
        manager.use_extension(ext).await.unwrap();
        manager.start_all().await;

        assert_eq!(manager.space().get("dice.sides"), Some(json!(20)));
    }

    #[tokio::test]
    async fn test_execute_qualified_executable() {
        let manager = Arc::new(ExtensionManager::default());
        let ext = Extension::builder("greeter")
            .executable("greet", |ctx: Arc<CommandContext>| async move {
                ctx.reply(&format!("hi {}", ctx.message())).await?;
                Ok(())
            })
            .build();
        manager.use_extension(ext).await.unwrap();
        manager.start_all().await;
        assert!(manager.has_executable("greeter::greet"));

        let bot = Arc::new(MockBot::default());
        manager
            .execute("greeter::greet", context(&manager, bot.clone(), "x"))
            .await
            .unwrap();
        assert_eq!(*bot.sent.lock(), vec![(7, "hi a b".to_string())]);

        let err = manager
            .execute("greeter::nope", context(&manager, bot, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ExecutableNotFound(_)));
    }

    #[tokio::test]
    async fn test_handler_error_is_swallowed() {
        let manager = Arc::new(ExtensionManager::default());
        let ext = Extension::builder("flaky")
            .command(Command::new("fail", |_ctx| async { Err("nope".into()) }))
            .build();
        manager.use_extension(ext).await.unwrap();
        manager.start_all().await;

        let bot: BoxedBot = Arc::new(MockBot::default());
        assert!(manager.invoke("fail", context(&manager, bot, "fail")).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_all_unroutes_and_runs_term() {
        let manager = ExtensionManager::default();
        let terms = Arc::new(AtomicUsize::new(0));
        let t = Arc::clone(&terms);
        let ext = Extension::builder("dice")
            .command(Command::new("roll", |_ctx| async { Ok(()) }).alias("r"))
            .executable("seed", |_ctx| async { Ok(()) })
            .on_term(move || {
                let t = Arc::clone(&t);
                async move {
                    t.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build();
        manager.use_extension(ext).await.unwrap();
        manager.start_all().await;
        assert_eq!(manager.commands().len(), 1);

        manager.stop_all().await;
        assert_eq!(terms.load(Ordering::SeqCst), 1);
        assert!(!manager.has_command("roll"));
        assert!(!manager.has_alias("r"));
        assert!(!manager.has_executable("dice::seed"));
        assert_eq!(
            manager.extension_state("dice").await,
            Some(ExtensionLoadState::Registered)
        );
    }

    #[tokio::test]
    async fn test_duplicate_command_last_wins() {
        let manager = ExtensionManager::default();
        manager
            .use_extension(
                Extension::builder("first")
                    .command(Command::new("roll", |_ctx| async { Ok(()) }))
                    .build(),
            )
            .await
            .unwrap();
        manager
            .use_extension(
                Extension::builder("second")
                    .command(Command::new("roll", |_ctx| async { Ok(()) }))
                    .build(),
            )
            .await
            .unwrap();
        manager.start_all().await;

        assert_eq!(manager.command("roll").unwrap().extension, "second");
    }
}
