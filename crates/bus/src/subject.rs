//! Subject grammar for agent-owned routing keys.
//!
//! Every subject an agent touches is derived from a configured prefix `P`
//! and its own agent id `A`:
//!
//! - metrics:   `P.A.sys.{cpu|mem|disk|network|load|uptime}`
//! - info:      `P.A.sys.info`
//! - heartbeat: `P.A.event.heartbeat`
//! - mailbox:   `P.A.mbox` (the agent's only subscription)
//! - results:   `P.A.exec.{type}.{id}.result`
//! - warnings:  `P.A.warn`, errors: `P.A.error`

use crate::error::BusError;

/// Default subject prefix for agent traffic.
pub const DEFAULT_SUBJECT_PREFIX: &str = "wd.a.";

/// Validate an agent id for use as a subject token.
///
/// Ids must be non-empty and contain only `[A-Za-z0-9_-]`. Dots are
/// rejected because they would split the id across subject tokens.
pub fn validate_agent_id(id: &str) -> Result<(), BusError> {
    if id.is_empty() {
        return Err(BusError::Subject("agent id must not be empty".into()));
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(BusError::Subject(format!(
            "agent id contains invalid character '{bad}' (allowed: [A-Za-z0-9_-])"
        )));
    }
    Ok(())
}

/// Builds every subject an agent publishes or subscribes on.
///
/// Constructed once at agent boot; the id is fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct SubjectMap {
    prefix: String,
    agent_id: String,
}

impl SubjectMap {
    /// Create a subject map for the given prefix and agent id.
    ///
    /// The prefix is normalized to end with a single `.` separator.
    pub fn new(prefix: &str, agent_id: &str) -> Result<Self, BusError> {
        validate_agent_id(agent_id)?;
        if prefix.is_empty() {
            return Err(BusError::Subject("subject prefix must not be empty".into()));
        }
        let prefix = if prefix.ends_with('.') {
            prefix.to_string()
        } else {
            format!("{prefix}.")
        };
        Ok(Self {
            prefix,
            agent_id: agent_id.to_string(),
        })
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Root of every subject this agent owns: `P.A`.
    pub fn root(&self) -> String {
        format!("{}{}", self.prefix, self.agent_id)
    }

    /// Metric subject for a family suffix: `P.A.sys.<suffix>`.
    pub fn metric(&self, suffix: &str) -> String {
        format!("{}.sys.{suffix}", self.root())
    }

    /// Identity/inventory report subject: `P.A.sys.info`.
    pub fn info(&self) -> String {
        format!("{}.sys.info", self.root())
    }

    /// Heartbeat event subject: `P.A.event.heartbeat`.
    pub fn heartbeat(&self) -> String {
        format!("{}.event.heartbeat", self.root())
    }

    /// Command mailbox subject: `P.A.mbox`.
    pub fn mailbox(&self) -> String {
        format!("{}.mbox", self.root())
    }

    /// Result subject for a command: `P.A.exec.<type>.<id>.result`.
    pub fn exec_result(&self, command_type: &str, command_id: &str) -> String {
        format!("{}.exec.{command_type}.{command_id}.result", self.root())
    }

    /// Warning diagnostics subject: `P.A.warn`.
    pub fn warn(&self) -> String {
        format!("{}.warn", self.root())
    }

    /// Error diagnostics subject: `P.A.error`.
    pub fn error(&self) -> String {
        format!("{}.error", self.root())
    }

    /// Whether a subject belongs to this agent: it starts with the prefix
    /// and its next token equals the agent id.
    pub fn owns(&self, subject: &str) -> bool {
        match subject.strip_prefix(&self.prefix) {
            Some(rest) => {
                let token = rest.split('.').next().unwrap_or("");
                token == self.agent_id
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_id_charset() {
        assert!(validate_agent_id("agent-1").is_ok());
        assert!(validate_agent_id("host_42").is_ok());
        assert!(validate_agent_id("").is_err());
        assert!(validate_agent_id("a.b").is_err());
        assert!(validate_agent_id("a b").is_err());
        assert!(validate_agent_id("a/b").is_err());
    }

    #[test]
    fn metric_subjects() {
        let map = SubjectMap::new("wd.a.", "agent-1").unwrap();
        assert_eq!(map.metric("cpu"), "wd.a.agent-1.sys.cpu");
        assert_eq!(map.metric("mem"), "wd.a.agent-1.sys.mem");
        assert_eq!(map.info(), "wd.a.agent-1.sys.info");
    }

    #[test]
    fn event_and_mailbox_subjects() {
        let map = SubjectMap::new("wd.a.", "agent-1").unwrap();
        assert_eq!(map.heartbeat(), "wd.a.agent-1.event.heartbeat");
        assert_eq!(map.mailbox(), "wd.a.agent-1.mbox");
        assert_eq!(map.warn(), "wd.a.agent-1.warn");
        assert_eq!(map.error(), "wd.a.agent-1.error");
    }

    #[test]
    fn exec_result_subject() {
        let map = SubjectMap::new("wd.a.", "agent-1").unwrap();
        assert_eq!(
            map.exec_result("shell", "c1"),
            "wd.a.agent-1.exec.shell.c1.result"
        );
    }

    #[test]
    fn prefix_normalized() {
        let map = SubjectMap::new("wd.a", "agent-1").unwrap();
        assert_eq!(map.mailbox(), "wd.a.agent-1.mbox");
    }

    #[test]
    fn ownership_checks_id_token() {
        let map = SubjectMap::new("wd.a.", "agent-1").unwrap();
        assert!(map.owns("wd.a.agent-1.sys.cpu"));
        assert!(map.owns("wd.a.agent-1.mbox"));
        assert!(!map.owns("wd.a.agent-2.sys.cpu"));
        // "agent-10" must not match "agent-1" by prefix.
        assert!(!map.owns("wd.a.agent-10.sys.cpu"));
        assert!(!map.owns("other.prefix.agent-1.sys.cpu"));
    }

    #[test]
    fn rejects_bad_inputs() {
        assert!(SubjectMap::new("", "agent-1").is_err());
        assert!(SubjectMap::new("wd.a.", "agent 1").is_err());
    }
}
