//! # Platform Session
//!
//! The handful of remote calls the command layer makes: upserting and deleting
//! command registrations and replying to an interaction.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Shard count of the session
//! - 1.1.0: REST latency check
//! - 1.0.0: Initial session trait

pub mod discord;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::commands::interaction::InteractionEvent;

pub use discord::{CommandRouter, SerenityPlatform};

/// Where a command registration lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandScope {
    Global,
    Guild(u64),
}

impl fmt::Display for CommandScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandScope::Global => f.write_str("global"),
            CommandScope::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

/// Session handle shared by every context of a connection.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create or replace a command; returns the platform-assigned id.
    async fn upsert_command(&self, scope: CommandScope, payload: &serde_json::Value) -> Result<u64>;

    async fn delete_command(&self, scope: CommandScope, command_id: u64) -> Result<()>;

    async fn reply(&self, event: &InteractionEvent, content: &str) -> Result<()>;

    /// Round-trip time of a lightweight REST call.
    async fn rest_ping(&self) -> Result<Duration>;

    /// Number of shards the session is connected with; ids run `0..count`.
    fn shard_count(&self) -> u32;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// In-memory platform that records every call.
    #[derive(Default)]
    pub struct RecordingPlatform {
        next_id: AtomicU64,
        shards: u32,
        upserts: Mutex<Vec<(CommandScope, serde_json::Value, u64)>>,
        deletions: Mutex<Vec<(CommandScope, u64)>>,
        replies: Mutex<Vec<(u64, String)>>,
        failing: Mutex<HashSet<CommandScope>>,
    }

    impl RecordingPlatform {
        pub fn new() -> Self {
            Self {
                next_id: AtomicU64::new(1000),
                shards: 1,
                ..Default::default()
            }
        }

        /// Pretend the session runs `shards` shards.
        pub fn with_shards(mut self, shards: u32) -> Self {
            self.shards = shards;
            self
        }

        /// Make upserts into `scope` fail.
        pub fn fail_on(self, scope: CommandScope) -> Self {
            self.failing.lock().unwrap().insert(scope);
            self
        }

        pub fn upserts(&self) -> Vec<(CommandScope, serde_json::Value, u64)> {
            self.upserts.lock().unwrap().clone()
        }

        pub fn deletions(&self) -> Vec<(CommandScope, u64)> {
            self.deletions.lock().unwrap().clone()
        }

        /// `(interaction id, content)` of every reply.
        pub fn replies(&self) -> Vec<(u64, String)> {
            self.replies.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Platform for RecordingPlatform {
        async fn upsert_command(
            &self,
            scope: CommandScope,
            payload: &serde_json::Value,
        ) -> Result<u64> {
            if self.failing.lock().unwrap().contains(&scope) {
                return Err(anyhow!("upsert rejected in {scope}"));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.upserts.lock().unwrap().push((scope, payload.clone(), id));
            Ok(id)
        }

        async fn delete_command(&self, scope: CommandScope, command_id: u64) -> Result<()> {
            self.deletions.lock().unwrap().push((scope, command_id));
            Ok(())
        }

        async fn reply(&self, event: &InteractionEvent, content: &str) -> Result<()> {
            self.replies
                .lock()
                .unwrap()
                .push((event.interaction_id, content.to_string()));
            Ok(())
        }

        async fn rest_ping(&self) -> Result<Duration> {
            Ok(Duration::from_millis(42))
        }

        fn shard_count(&self) -> u32 {
            self.shards
        }
    }
}
