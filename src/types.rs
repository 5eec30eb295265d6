use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::NodeId;
use crate::editor::pages::{PageDirection, PageSelector};
use crate::editor::structure::AddPosition;
use crate::editor::{AddMode, EditorPanel, Message, View};

/// Envelope of every editor response: the next view, user messages, payload.
#[derive(Debug, Serialize)]
pub struct EditorResponse<T: Serialize> {
    pub view: View,
    pub messages: Vec<Message>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProcessRequest {
    pub title: String,
    pub ruleset: String,
    /// Type of the logical root; defaults to the first top-level type of the ruleset.
    #[serde(default)]
    pub logical_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSessionRequest {
    pub process_id: i64,
    pub user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelRequest {
    pub panel: EditorPanel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddModeRequest {
    pub mode: AddMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    pub id: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddNodeRequest {
    pub type_name: String,
    pub position: AddPosition,
    #[serde(default)]
    pub first_page: Option<PageSelector>,
    #[serde(default)]
    pub last_page: Option<PageSelector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeTypeRequest {
    pub type_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMetadataRequest {
    pub type_name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMetadataRequest {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignRangeRequest {
    #[serde(default)]
    pub node: Option<NodeId>,
    pub first: PageSelector,
    pub last: PageSelector,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageIdsRequest {
    pub pages: Vec<NodeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovePagesRequest {
    pub pages: Vec<NodeId>,
    pub direction: PageDirection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepresentativeRequest {
    pub page: PageSelector,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PreviewAction {
    Navigate { offset: i64 },
    GoTo { page: usize },
    RotateLeft,
    RotateRight,
    Zoom { percent: u32 },
    Folder { name: Option<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub folder: String,
    #[serde(default)]
    pub insert_after: Option<NodeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub folder: String,
}
