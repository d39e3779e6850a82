//! # Directory Roster
//!
//! A cached snapshot of the vendor's queue and agent directories, so the
//! presentation layer can accept human names and render human names while
//! every vendor query speaks identifiers. The roster is fetched once,
//! persisted as JSON, and reloaded on later runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSummary {
    pub id: String,
    pub username: String,
}

/// Directory listing calls, separate from the search seam so fakes can
/// implement one without the other.
#[async_trait]
pub trait DirectoryApi: Send + Sync {
    async fn list_queues(&self) -> Result<Vec<QueueSummary>, String>;
    async fn list_agents(&self) -> Result<Vec<AgentSummary>, String>;
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Roster {
    pub queues: Vec<QueueSummary>,
    pub agents: Vec<AgentSummary>,
    /// RFC 3339 fetch time, for staleness reporting only.
    pub fetched_at: String,
}

impl Roster {
    /// Pull a fresh snapshot from the vendor.
    pub async fn fetch(api: &dyn DirectoryApi) -> Result<Roster, String> {
        let queues = api.list_queues().await?;
        let agents = api.list_agents().await?;
        tracing::info!(
            "directory roster fetched: {} queue(s), {} agent(s)",
            queues.len(),
            agents.len()
        );
        Ok(Roster {
            queues,
            agents,
            fetched_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn load(path: &Path) -> Result<Roster, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read roster {}: {}", path.display(), e))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("cannot parse roster {}: {}", path.display(), e))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| format!("cannot serialize roster: {}", e))?;
        std::fs::write(path, raw)
            .map_err(|e| format!("cannot write roster {}: {}", path.display(), e))
    }

    /// Resolve a queue reference to its identifier: exact id match first,
    /// then case-insensitive name match.
    pub fn resolve_queue(&self, reference: &str) -> Option<&str> {
        self.queues
            .iter()
            .find(|q| q.id == reference)
            .or_else(|| {
                self.queues
                    .iter()
                    .find(|q| q.name.eq_ignore_ascii_case(reference))
            })
            .map(|q| q.id.as_str())
    }

    /// Resolve an agent reference to its identifier, id first then username.
    pub fn resolve_agent(&self, reference: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.id == reference)
            .or_else(|| {
                self.agents
                    .iter()
                    .find(|a| a.username.eq_ignore_ascii_case(reference))
            })
            .map(|a| a.id.as_str())
    }

    pub fn queue_name(&self, id: &str) -> Option<&str> {
        self.queues
            .iter()
            .find(|q| q.id == id)
            .map(|q| q.name.as_str())
    }

    pub fn agent_username(&self, id: &str) -> Option<&str> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        Roster {
            queues: vec![QueueSummary {
                id: "q-123".into(),
                name: "Sales".into(),
            }],
            agents: vec![AgentSummary {
                id: "a-456".into(),
                username: "jdoe".into(),
            }],
            fetched_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_resolve_by_id_and_by_name() {
        let r = roster();
        assert_eq!(r.resolve_queue("q-123"), Some("q-123"));
        assert_eq!(r.resolve_queue("sales"), Some("q-123"));
        assert_eq!(r.resolve_queue("Support"), None);
        assert_eq!(r.resolve_agent("JDOE"), Some("a-456"));
    }

    #[test]
    fn test_decoration_lookups() {
        let r = roster();
        assert_eq!(r.queue_name("q-123"), Some("Sales"));
        assert_eq!(r.agent_username("a-456"), Some("jdoe"));
        assert_eq!(r.agent_username("a-999"), None);
    }

    #[test]
    fn test_roster_roundtrips_through_json() {
        let r = roster();
        let raw = serde_json::to_string(&r).unwrap();
        let back: Roster = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.queues, r.queues);
        assert_eq!(back.agents, r.agents);
    }
}
