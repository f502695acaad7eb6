use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::graph_utils::graph::{Connection, Frame, GraphStore, Node};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Chat,
    #[default]
    Canvas,
    Calendar,
    Writer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, sent_at: OffsetDateTime) -> Self {
        Self { id: Uuid::now_v7(), role, content: content.into(), sent_at }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end: Option<OffsetDateTime>,
    #[serde(default)]
    pub notes: String,
}

impl CalendarEvent {
    pub fn new(title: impl Into<String>, start: OffsetDateTime, end: Option<OffsetDateTime>) -> Self {
        Self { id: Uuid::now_v7(), title: title.into(), start, end, notes: String::new() }
    }
}

/// Deep copy of everything the time machine preserves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceState {
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub calendar_events: Vec<CalendarEvent>,
    #[serde(default)]
    pub active_project: Option<String>,
    #[serde(default)]
    pub current_view: View,
}

impl WorkspaceState {
    pub fn graph(&self) -> GraphStore {
        GraphStore::from_parts(self.nodes.clone(), self.connections.clone(), self.frames.clone())
    }
}
