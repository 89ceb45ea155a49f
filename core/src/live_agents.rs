//! Directory of human support agents and resolution of a worker's
//! free-text hand-off answer against it.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const FALLBACK_AGENT_NAME: &str = "your dedicated support agent";

static AGENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z]{4}\d{4}").expect("valid agent id regex"));

static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]{32}").expect("valid channel regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SupportTopic {
    Vmware,
    Mainframe,
    Carbonblack,
    Account,
}

impl SupportTopic {
    pub const ALL: [SupportTopic; 4] = [
        SupportTopic::Vmware,
        SupportTopic::Mainframe,
        SupportTopic::Carbonblack,
        SupportTopic::Account,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SupportTopic::Vmware => "vmware",
            SupportTopic::Mainframe => "mainframe",
            SupportTopic::Carbonblack => "carbonblack",
            SupportTopic::Account => "account",
        }
    }
}

impl fmt::Display for SupportTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown support topic '{0}', expected one of: vmware, mainframe, carbonblack, account")]
pub struct TopicError(pub String);

impl FromStr for SupportTopic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == wanted)
            .ok_or_else(|| TopicError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LiveAgent {
    pub name: String,
    pub id: String,
    pub topic: SupportTopic,
    pub channel: String,
}

/// Hand-off details extracted from a worker's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LiveAgentMatch {
    pub name: String,
    pub id: String,
    pub topic: Option<SupportTopic>,
    pub channel: String,
}

#[derive(Debug, Clone)]
pub struct LiveAgentDirectory {
    agents: Vec<LiveAgent>,
    name_patterns: Vec<Regex>,
}

impl LiveAgentDirectory {
    pub fn new(agents: Vec<LiveAgent>) -> Self {
        let name_patterns = agents
            .iter()
            .filter_map(|agent| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&agent.name))).ok()
            })
            .collect();
        Self {
            agents,
            name_patterns,
        }
    }

    pub fn agents(&self) -> &[LiveAgent] {
        &self.agents
    }

    pub fn find(&self, topic: SupportTopic) -> Option<&LiveAgent> {
        self.agents.iter().find(|agent| agent.topic == topic)
    }

    /// Resolve a worker's hand-off answer to agent details.
    ///
    /// The name is the directory name mentioned earliest in the text (whole
    /// word, any case). Id and channel come from the first token of the right
    /// shape, falling back to the named agent's entry. Returns `None` when
    /// neither a directory name nor an id can be found.
    pub fn resolve_from_text(&self, text: &str) -> Option<LiveAgentMatch> {
        let named = self
            .agents
            .iter()
            .zip(&self.name_patterns)
            .filter_map(|(agent, pattern)| pattern.find(text).map(|m| (m.start(), agent)))
            .min_by_key(|(start, _)| *start)
            .map(|(_, agent)| agent);

        let id = AGENT_ID_RE
            .find(text)
            .map(|m| m.as_str().to_string())
            .or_else(|| named.map(|agent| agent.id.clone()));

        if named.is_none() && id.is_none() {
            tracing::warn!("hand-off answer named no known live agent");
            return None;
        }

        let channel = CHANNEL_RE
            .find(text)
            .map(|m| m.as_str().to_string())
            .or_else(|| named.map(|agent| agent.channel.clone()))
            .unwrap_or_default();

        Some(LiveAgentMatch {
            name: named
                .map(|agent| agent.name.clone())
                .unwrap_or_else(|| FALLBACK_AGENT_NAME.to_string()),
            id: id.unwrap_or_default(),
            topic: named.map(|agent| agent.topic),
            channel,
        })
    }
}

impl Default for LiveAgentDirectory {
    fn default() -> Self {
        let entry = |name: &str, id: &str, topic, channel: &str| LiveAgent {
            name: name.to_string(),
            id: id.to_string(),
            topic,
            channel: channel.to_string(),
        };
        Self::new(vec![
            entry(
                "Joe",
                "ijkl9012",
                SupportTopic::Vmware,
                "49fb123786864b03ae3536764fa01b38",
            ),
            entry(
                "Amr",
                "efgh5678",
                SupportTopic::Mainframe,
                "b820dbf418df4587b47a0995a76ee947",
            ),
            entry(
                "Eva",
                "mnop3456",
                SupportTopic::Carbonblack,
                "d3667e9a8cad467c8dfe10422b55dbbd",
            ),
            entry(
                "Tony",
                "abcd1234",
                SupportTopic::Account,
                "9a342d1189c74cd688b82a103e91bb10",
            ),
        ])
    }
}

/// Prompt that asks a worker to pick a live agent for the conversation so far.
pub fn lookup_prompt(email: &str) -> String {
    format!("live agent chat lookup {email}")
}
