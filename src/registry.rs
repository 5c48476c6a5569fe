//! Name registry actor
//!
//! The single piece of state shared across sessions: display name -> sink.
//! One actor task owns the map and processes commands sequentially, so
//! every operation is atomic with respect to every other. Handles talk to
//! it over an mpsc channel and get answers back on oneshot channels.
//!
//! The actor never writes to a connection. Lookups and snapshots hand
//! sinks back to the caller, which delivers outside the actor.

use std::collections::BTreeMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::config::REGISTRY_BUFFER_SIZE;
use crate::error::AppError;
use crate::sink::Sink;
use crate::types::DisplayName;

/// Outcome of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The name was free and now belongs to the caller
    Registered,
    /// Another live session holds the name
    NameTaken,
}

/// Commands sent from handles to the registry actor
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert if the name is free
    Register {
        name: DisplayName,
        sink: Sink,
        reply: oneshot::Sender<Registration>,
    },
    /// Find a directed-message recipient
    Lookup {
        name: String,
        reply: oneshot::Sender<Option<Sink>>,
    },
    /// Drop an entry; replies whether one was present
    Remove {
        name: DisplayName,
        reply: oneshot::Sender<bool>,
    },
    /// Copy all entries for fan-out
    Snapshot {
        reply: oneshot::Sender<Vec<(DisplayName, Sink)>>,
    },
    /// Number of registered names
    Len { reply: oneshot::Sender<usize> },
}

/// The registry actor
///
/// Entries are kept ordered by name so snapshots are deterministic.
pub struct RegistryActor {
    /// Registered sessions: DisplayName -> Sink
    entries: BTreeMap<DisplayName, Sink>,
    /// Command receiver channel
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    /// Create a new actor with the given command receiver
    pub fn new(receiver: mpsc::Receiver<RegistryCommand>) -> Self {
        Self {
            entries: BTreeMap::new(),
            receiver,
        }
    }

    /// Run the registry event loop
    ///
    /// Continuously receives and processes commands until all handles are dropped.
    pub async fn run(mut self) {
        debug!("Registry started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        debug!("Registry shutting down");
    }

    /// Process a single command
    ///
    /// A dropped reply receiver means the caller gave up; the mutation
    /// still stands.
    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { name, sink, reply } => {
                let _ = reply.send(self.handle_register(name, sink));
            }
            RegistryCommand::Lookup { name, reply } => {
                let _ = reply.send(self.entries.get(name.as_str()).cloned());
            }
            RegistryCommand::Remove { name, reply } => {
                let _ = reply.send(self.handle_remove(&name));
            }
            RegistryCommand::Snapshot { reply } => {
                let snapshot = self
                    .entries
                    .iter()
                    .map(|(name, sink)| (name.clone(), sink.clone()))
                    .collect();
                let _ = reply.send(snapshot);
            }
            RegistryCommand::Len { reply } => {
                let _ = reply.send(self.entries.len());
            }
        }
    }

    fn handle_register(&mut self, name: DisplayName, sink: Sink) -> Registration {
        if self.entries.contains_key(&name) {
            debug!("Name '{}' already registered", name);
            return Registration::NameTaken;
        }

        info!("Session {} registered as '{}'", sink.session(), name);
        self.entries.insert(name, sink);
        debug!("Total registered: {}", self.entries.len());
        Registration::Registered
    }

    fn handle_remove(&mut self, name: &DisplayName) -> bool {
        let removed = self.entries.remove(name).is_some();
        if removed {
            info!("'{}' removed from registry", name);
            debug!("Total registered: {}", self.entries.len());
        }
        removed
    }
}

/// Handle to the registry actor
///
/// Cheap to clone; every session and the operator console hold one.
#[derive(Debug, Clone)]
pub struct Registry {
    commands: mpsc::Sender<RegistryCommand>,
}

impl Registry {
    /// Wrap an existing command channel
    pub fn new(commands: mpsc::Sender<RegistryCommand>) -> Self {
        Self { commands }
    }

    /// Start a registry actor on the current runtime and return its handle
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(REGISTRY_BUFFER_SIZE);
        tokio::spawn(RegistryActor::new(cmd_rx).run());
        Self::new(cmd_tx)
    }

    /// Claim `name` for `sink` if nobody holds it
    pub async fn register(&self, name: DisplayName, sink: Sink) -> Result<Registration, AppError> {
        self.request(|reply| RegistryCommand::Register { name, sink, reply })
            .await
    }

    /// Find the sink registered under `name`
    pub async fn lookup(&self, name: &str) -> Result<Option<Sink>, AppError> {
        let name = name.to_string();
        self.request(|reply| RegistryCommand::Lookup { name, reply })
            .await
    }

    /// Drop the entry for `name`
    ///
    /// Idempotent: removing a missing name is a no-op that returns `false`.
    pub async fn remove(&self, name: &DisplayName) -> Result<bool, AppError> {
        let name = name.clone();
        self.request(|reply| RegistryCommand::Remove { name, reply })
            .await
    }

    /// All registered entries at this instant, ordered by name
    pub async fn snapshot(&self) -> Result<Vec<(DisplayName, Sink)>, AppError> {
        self.request(|reply| RegistryCommand::Snapshot { reply }).await
    }

    /// Number of registered sessions
    pub async fn len(&self) -> Result<usize, AppError> {
        self.request(|reply| RegistryCommand::Len { reply }).await
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.len().await? == 0)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, AppError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| AppError::RegistryClosed)?;
        reply_rx.await.map_err(|_| AppError::RegistryClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    fn name(raw: &str) -> DisplayName {
        DisplayName::parse(raw).unwrap()
    }

    fn sink() -> (Sink, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (Sink::new(SessionId::new(), tx), rx)
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = Registry::spawn();
        let (alice, mut alice_rx) = sink();
        let alice_session = alice.session();

        assert_eq!(
            registry.register(name("alice"), alice).await.unwrap(),
            Registration::Registered
        );

        let found = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(found.session(), alice_session);
        found.deliver("ping").await.unwrap();
        assert_eq!(alice_rx.recv().await.as_deref(), Some("ping"));

        assert!(registry.lookup("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let registry = Registry::spawn();
        let (first, _first_rx) = sink();
        let (second, _second_rx) = sink();
        let first_session = first.session();

        registry.register(name("alice"), first).await.unwrap();
        assert_eq!(
            registry.register(name("alice"), second).await.unwrap(),
            Registration::NameTaken
        );

        // The original holder keeps the name
        let holder = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(holder.session(), first_session);
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_single_winner() {
        let registry = Registry::spawn();
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for _ in 0..32 {
            let (s, rx) = sink();
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.register(name("alice"), s).await.unwrap()
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() == Registration::Registered {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = Registry::spawn();
        let (alice, _rx) = sink();
        registry.register(name("alice"), alice).await.unwrap();

        assert!(registry.remove(&name("alice")).await.unwrap());
        assert!(!registry.remove(&name("alice")).await.unwrap());
        assert!(registry.lookup("alice").await.unwrap().is_none());
        assert!(registry.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_name_reusable_after_remove() {
        let registry = Registry::spawn();
        let (first, _first_rx) = sink();
        let (second, _second_rx) = sink();

        registry.register(name("alice"), first).await.unwrap();
        registry.remove(&name("alice")).await.unwrap();

        assert_eq!(
            registry.register(name("alice"), second).await.unwrap(),
            Registration::Registered
        );
    }

    #[tokio::test]
    async fn test_snapshot_matches_registered_names() {
        let registry = Registry::spawn();
        let mut receivers = Vec::new();

        for raw in ["carol", "alice", "bob"] {
            let (s, rx) = sink();
            receivers.push(rx);
            registry.register(name(raw), s).await.unwrap();
        }
        registry.remove(&name("bob")).await.unwrap();

        let names: Vec<String> = registry
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|(n, _)| n.to_string())
            .collect();

        assert_eq!(names, vec!["alice", "carol"]);
        assert_eq!(registry.len().await.unwrap(), names.len());
    }

    #[tokio::test]
    async fn test_closed_registry() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        let registry = Registry::new(cmd_tx);

        assert!(matches!(
            registry.len().await,
            Err(AppError::RegistryClosed)
        ));
    }
}
