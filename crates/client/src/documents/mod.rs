//! Host document shapes.
//!
//! Documents are constructed transiently from host-provided JSON just
//! before persistence, rewritten in place by the migrator, and handed back.
//! Each kind has a fixed schema of image-bearing fields, rich-text fields,
//! and child collections; everything else the host put in the document is
//! preserved through flattened maps and round-trips untouched.

pub mod migrate;

pub use migrate::ImageMigrator;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of document kinds with image-bearing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Actor,
    Token,
    Item,
    Scene,
    JournalEntry,
    JournalEntryPage,
    Macro,
    Tile,
    RollTable,
    Drawing,
    MeasuredTemplate,
    Note,
    User,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Actor => "Actor",
            DocumentKind::Token => "Token",
            DocumentKind::Item => "Item",
            DocumentKind::Scene => "Scene",
            DocumentKind::JournalEntry => "JournalEntry",
            DocumentKind::JournalEntryPage => "JournalEntryPage",
            DocumentKind::Macro => "Macro",
            DocumentKind::Tile => "Tile",
            DocumentKind::RollTable => "RollTable",
            DocumentKind::Drawing => "Drawing",
            DocumentKind::MeasuredTemplate => "MeasuredTemplate",
            DocumentKind::Note => "Note",
            DocumentKind::User => "User",
        }
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = UnknownDocumentKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Actor" => Ok(DocumentKind::Actor),
            "Token" => Ok(DocumentKind::Token),
            "Item" => Ok(DocumentKind::Item),
            "Scene" => Ok(DocumentKind::Scene),
            "JournalEntry" => Ok(DocumentKind::JournalEntry),
            "JournalEntryPage" => Ok(DocumentKind::JournalEntryPage),
            "Macro" => Ok(DocumentKind::Macro),
            "Tile" => Ok(DocumentKind::Tile),
            "RollTable" => Ok(DocumentKind::RollTable),
            "Drawing" => Ok(DocumentKind::Drawing),
            "MeasuredTemplate" => Ok(DocumentKind::MeasuredTemplate),
            "Note" => Ok(DocumentKind::Note),
            "User" => Ok(DocumentKind::User),
            other => Err(UnknownDocumentKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown document kind: {0}")]
pub struct UnknownDocumentKind(pub String);

/// `{src: "...", ...}` texture object used by tokens and scene backgrounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{value: "..."}` rich-text holder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<RichText>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorSystem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ActorDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSystem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<RichText>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Journal page text: HTML content plus an optional markdown source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(
        default,
        rename = "prototypeToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub prototype_token: Option<TokenDoc>,
    /// Legacy layout; ignored when `prototypeToken` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<ActorSystem>,
    /// Legacy layout; ignored when `system` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ActorSystem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureData>,
    /// Legacy layout; ignored when `texture` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<ItemSystem>,
    /// Legacy layout; ignored when `system` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ItemSystem>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<TextureData>,
    /// Legacy layout; ignored when `background` is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawings: Option<Vec<TextureRefDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<NoteDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<Vec<TextureRefDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<IconDoc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<TokenDoc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Modern journals carry pages; when present, `img`/`content` are not
    /// part of the schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<JournalPageDoc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalPageDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<PageText>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Documents whose only image is a direct `img` field (Macro, Tile,
/// RollTable).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IconDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Documents whose image is a plain `texture` path string (Drawing,
/// MeasuredTemplate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureRefDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A document of a known kind. The kind comes from the host's persistence
/// call, not from the JSON itself.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    Actor(ActorDoc),
    Token(TokenDoc),
    Item(ItemDoc),
    Scene(SceneDoc),
    JournalEntry(JournalEntryDoc),
    JournalEntryPage(JournalPageDoc),
    Macro(IconDoc),
    Tile(IconDoc),
    RollTable(IconDoc),
    Drawing(TextureRefDoc),
    MeasuredTemplate(TextureRefDoc),
    Note(NoteDoc),
    User(UserDoc),
}

impl DocumentNode {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentNode::Actor(_) => DocumentKind::Actor,
            DocumentNode::Token(_) => DocumentKind::Token,
            DocumentNode::Item(_) => DocumentKind::Item,
            DocumentNode::Scene(_) => DocumentKind::Scene,
            DocumentNode::JournalEntry(_) => DocumentKind::JournalEntry,
            DocumentNode::JournalEntryPage(_) => DocumentKind::JournalEntryPage,
            DocumentNode::Macro(_) => DocumentKind::Macro,
            DocumentNode::Tile(_) => DocumentKind::Tile,
            DocumentNode::RollTable(_) => DocumentKind::RollTable,
            DocumentNode::Drawing(_) => DocumentKind::Drawing,
            DocumentNode::MeasuredTemplate(_) => DocumentKind::MeasuredTemplate,
            DocumentNode::Note(_) => DocumentKind::Note,
            DocumentNode::User(_) => DocumentKind::User,
        }
    }

    /// Parse host-provided JSON as the stated kind.
    pub fn from_value(kind: DocumentKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            DocumentKind::Actor => DocumentNode::Actor(serde_json::from_value(value)?),
            DocumentKind::Token => DocumentNode::Token(serde_json::from_value(value)?),
            DocumentKind::Item => DocumentNode::Item(serde_json::from_value(value)?),
            DocumentKind::Scene => DocumentNode::Scene(serde_json::from_value(value)?),
            DocumentKind::JournalEntry => {
                DocumentNode::JournalEntry(serde_json::from_value(value)?)
            }
            DocumentKind::JournalEntryPage => {
                DocumentNode::JournalEntryPage(serde_json::from_value(value)?)
            }
            DocumentKind::Macro => DocumentNode::Macro(serde_json::from_value(value)?),
            DocumentKind::Tile => DocumentNode::Tile(serde_json::from_value(value)?),
            DocumentKind::RollTable => DocumentNode::RollTable(serde_json::from_value(value)?),
            DocumentKind::Drawing => DocumentNode::Drawing(serde_json::from_value(value)?),
            DocumentKind::MeasuredTemplate => {
                DocumentNode::MeasuredTemplate(serde_json::from_value(value)?)
            }
            DocumentKind::Note => DocumentNode::Note(serde_json::from_value(value)?),
            DocumentKind::User => DocumentNode::User(serde_json::from_value(value)?),
        })
    }

    /// Serialize back to host JSON.
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        match self {
            DocumentNode::Actor(doc) => serde_json::to_value(doc),
            DocumentNode::Token(doc) => serde_json::to_value(doc),
            DocumentNode::Item(doc) => serde_json::to_value(doc),
            DocumentNode::Scene(doc) => serde_json::to_value(doc),
            DocumentNode::JournalEntry(doc) => serde_json::to_value(doc),
            DocumentNode::JournalEntryPage(doc) => serde_json::to_value(doc),
            DocumentNode::Macro(doc) => serde_json::to_value(doc),
            DocumentNode::Tile(doc) => serde_json::to_value(doc),
            DocumentNode::RollTable(doc) => serde_json::to_value(doc),
            DocumentNode::Drawing(doc) => serde_json::to_value(doc),
            DocumentNode::MeasuredTemplate(doc) => serde_json::to_value(doc),
            DocumentNode::Note(doc) => serde_json::to_value(doc),
            DocumentNode::User(doc) => serde_json::to_value(doc),
        }
    }
}
