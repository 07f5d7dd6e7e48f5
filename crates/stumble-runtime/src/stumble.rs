//! The bot: extension loading, connection handling and command dispatch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stumble_runtime::Stumble;
//!
//! let bot = Stumble::builder()
//!     .config_file("stumble.toml")
//!     .extension(my_extension::DESCRIPTOR)
//!     .build()
//!     .await?;
//!
//! bot.run().await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use stumble_core::{
    BoxedBot, CommandContext, CommandData, ExtensionDescriptor, ExtensionManager, Space, User,
    parse_invocation,
};
use stumble_mumble::{ClientEvent, ConnectOptions, MumbleClient, MumbleError};

use crate::config::{ConfigLoader, StumbleConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::event::StumbleEvent;
use crate::ext::{self, permissions, scripted};
use crate::logging;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

struct StumbleInner {
    config: StumbleConfig,
    manager: Arc<ExtensionManager>,
    /// Connect options including whatever key/cert could be read. Copied
    /// for every connection attempt.
    options: ConnectOptions,
    client: Mutex<Option<MumbleClient>>,
    events: broadcast::Sender<StumbleEvent>,
}

/// A Mumble bot with loaded extensions.
///
/// Cheap to clone; clones share the connection and the extensions.
#[derive(Clone)]
pub struct Stumble {
    inner: Arc<StumbleInner>,
}

impl Stumble {
    pub fn builder() -> StumbleBuilder {
        StumbleBuilder::new()
    }

    pub fn config(&self) -> &StumbleConfig {
        &self.inner.config
    }

    pub fn manager(&self) -> &Arc<ExtensionManager> {
        &self.inner.manager
    }

    /// The key/value space shared by all extensions.
    pub fn space(&self) -> &Space {
        self.inner.manager.space()
    }

    pub fn connect_options(&self) -> &ConnectOptions {
        &self.inner.options
    }

    /// Subscribes to bot events. Only events sent after this call are seen.
    pub fn subscribe(&self) -> broadcast::Receiver<StumbleEvent> {
        self.inner.events.subscribe()
    }

    /// The live client, if connected.
    pub fn client(&self) -> Option<MumbleClient> {
        self.inner.client.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.client.lock().is_some()
    }

    fn emit(&self, event: StumbleEvent) {
        trace!(event = event.name(), "Emitting event");
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Handles one chat message from `user`.
    ///
    /// Emits [`StumbleEvent::Message`], then, if the message starts with the
    /// operator, routes the command. While the permissions extension is
    /// loaded every command goes through its gate. Unknown handles get
    /// `Command [ <handle> ] not found.` as a private reply.
    pub async fn observe(&self, bot: BoxedBot, message: &str, user: User) {
        self.emit(StumbleEvent::Message {
            text: message.to_string(),
            user: user.clone(),
        });

        let Some(operator) = self.inner.config.operator() else {
            return;
        };
        let Some(invocation) = parse_invocation(operator, message) else {
            return;
        };

        let manager = &self.inner.manager;
        let handle = invocation.handle;
        if !manager.has_command(&handle) && !manager.has_alias(&handle) {
            debug!(handle = %handle, user = %user.name, "Unknown command");
            let reply = format!("Command [ {handle} ] not found.");
            if let Err(e) = user.send_message(bot.as_ref(), &reply).await {
                warn!(error = %e, user = %user.name, "Failed to send reply");
            }
            return;
        }

        let data = CommandData::new(handle.clone(), user, invocation.message);
        let ctx = Arc::new(CommandContext::new(data, bot, Arc::clone(manager)));
        let result = if manager.space().has(permissions::SPACE_KEY) {
            manager.execute(permissions::INVOKE, ctx).await
        } else {
            manager.invoke(&handle, ctx).await
        };
        if let Err(e) = result {
            error!(handle = %handle, error = %e, "Dispatch failed");
        }
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// Connects to the configured server and sends the credentials.
    ///
    /// On failure emits `ConnectError` then `Error` and returns the error.
    /// A previous connection is closed first.
    pub async fn connect(&self) -> RuntimeResult<()> {
        let mumble = &self.inner.config.mumble;
        let options = self.inner.options.clone();

        match MumbleClient::connect(&mumble.server, mumble.port, options).await {
            Ok((client, events)) => {
                self.attach(client, events).await;
                Ok(())
            }
            Err(e) => {
                error!(address = %mumble.address(), error = %e, "Connection failed");
                self.emit(StumbleEvent::ConnectError(e.clone()));
                self.emit(StumbleEvent::Error(e.clone()));
                Err(e.into())
            }
        }
    }

    /// Takes over an established connection: authenticates, starts pumping
    /// its events and emits `Connect`.
    pub async fn attach(&self, client: MumbleClient, events: mpsc::Receiver<ClientEvent>) {
        self.disconnect(false);
        *self.inner.client.lock() = Some(client.clone());

        let mumble = &self.inner.config.mumble;
        if let Err(e) = client
            .authenticate(&mumble.username, mumble.password.as_deref(), &mumble.tokens)
            .await
        {
            warn!(error = %e, "Failed to send credentials");
        }

        info!(address = %mumble.address(), username = %mumble.username, "Connected");
        self.emit(StumbleEvent::Connect);

        tokio::spawn(self.clone().pump(client, events));
    }

    /// Forwards client events until the connection ends.
    async fn pump(self, client: MumbleClient, mut events: mpsc::Receiver<ClientEvent>) {
        let bot: BoxedBot = Arc::new(client.clone());
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Ready { session, .. } => {
                    info!(session, "Bot ready");
                    self.emit(StumbleEvent::Ready);
                }
                ClientEvent::Message { text, user } => {
                    self.observe(Arc::clone(&bot), &text, user).await;
                }
                ClientEvent::Rejected { reason } => {
                    self.emit(StumbleEvent::Error(MumbleError::Rejected(reason)));
                }
                ClientEvent::Disconnected { reason } => {
                    if let Some(reason) = &reason {
                        info!(reason = %reason, "Connection closed");
                    }
                    self.release(Some(&client), true);
                    break;
                }
            }
        }
    }

    /// Drops the current client and emits `Disconnect`.
    ///
    /// Unless `evented`, the client is asked to close its connection first.
    /// Returns `false` if there was no client.
    pub fn disconnect(&self, evented: bool) -> bool {
        self.release(None, evented)
    }

    /// Releases the current client, or only `expected` if given.
    fn release(&self, expected: Option<&MumbleClient>, evented: bool) -> bool {
        let client = {
            let mut slot = self.inner.client.lock();
            let current = match (slot.as_ref(), expected) {
                (None, _) => false,
                (Some(current), Some(expected)) => current.same_connection(expected),
                (Some(_), None) => true,
            };
            if !current {
                return false;
            }
            slot.take()
        };
        if let Some(client) = client
            && !evented
        {
            client.disconnect();
        }
        info!("Disconnected");
        self.emit(StumbleEvent::Disconnect);
        true
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Connects and runs until Ctrl+C, SIGTERM or the server drops the
    /// connection.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Like [`run`](Self::run) with a custom shutdown future.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut events = self.subscribe();
        if let Err(e) = self.connect().await {
            self.inner.manager.stop_all().await;
            return Err(e);
        }
        info!("Stumble is running. Press Ctrl+C to stop.");

        let closed = async {
            loop {
                match events.recv().await {
                    Ok(StumbleEvent::Disconnect) | Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Event listener lagged");
                    }
                }
            }
        };

        tokio::select! {
            _ = shutdown => {
                self.disconnect(false);
            }
            _ = closed => {
                warn!("Connection lost, shutting down");
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Disconnects and unloads all extensions.
    pub async fn shutdown(&self) {
        self.disconnect(false);
        self.inner.manager.stop_all().await;
        info!("Stumble stopped");
    }
}

impl std::fmt::Debug for Stumble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stumble")
            .field("address", &self.inner.config.mumble.address())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received Ctrl+C, shutting down");
}

// =============================================================================
// StumbleBuilder
// =============================================================================

/// Builder for [`Stumble`].
pub struct StumbleBuilder {
    config_loader: ConfigLoader,
    config: Option<StumbleConfig>,
    compiled: HashMap<String, ExtensionDescriptor>,
    init_logging: bool,
}

impl Default for StumbleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StumbleBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            compiled: HashMap::new(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses an already loaded configuration instead of the loader.
    pub fn config(mut self, config: StumbleConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Makes a compiled extension available as a user extension.
    ///
    /// It is only loaded if enabled in `[extensions]` under its handle.
    pub fn extension(mut self, descriptor: ExtensionDescriptor) -> Self {
        self.compiled
            .insert(descriptor.handle.to_string(), descriptor);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration, extensions and credential files.
    pub async fn build(self) -> RuntimeResult<Stumble> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let manager = Arc::new(ExtensionManager::new(config.settings.clone()));
        let extensions = config.extensions();
        let selection = ext::select_extensions(&extensions);

        for name in &selection.standards {
            if let Some(descriptor) = ext::standard(name) {
                manager.use_extension(descriptor.instantiate()).await?;
            }
        }

        if selection.loads_users(&extensions) {
            for name in &selection.users {
                let extension = match self.compiled.get(name) {
                    Some(descriptor) => descriptor.instantiate(),
                    None => {
                        let dir = extensions.config.directory.as_deref();
                        let path = dir.and_then(|dir| scripted::find(dir, name)).ok_or_else(|| {
                            RuntimeError::ExtensionNotFound {
                                name: name.clone(),
                                searched: dir
                                    .map(|dir| scripted::candidates(dir, name))
                                    .unwrap_or_default(),
                            }
                        })?;
                        scripted::load(name, &path)?
                    }
                };
                manager.use_extension(extension).await?;
            }
        } else if !selection.users.is_empty() {
            debug!(skipped = ?selection.users, "Only standard extensions are loaded");
        }

        let mut options = config.mumble.connect_options();
        options.key = read_credential("key", config.mumble.key.as_deref()).await;
        options.cert = read_credential("cert", config.mumble.cert.as_deref()).await;

        manager.start_all().await;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Stumble {
            inner: Arc::new(StumbleInner {
                config,
                manager,
                options,
                client: Mutex::new(None),
                events,
            }),
        })
    }
}

/// Reads an optional credential file, warning instead of failing.
async fn read_credential(prop: &str, path: Option<&Path>) -> Option<Vec<u8>> {
    let path = path?;
    let path: PathBuf = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match tokio::fs::read(&path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Credential file unreadable");
            warn!("Could not read [ {prop} ] file. Check your paths.");
            None
        }
    }
}
