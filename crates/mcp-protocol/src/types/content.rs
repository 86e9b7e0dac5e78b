//! Content blocks: the rich payload carried by tool results, prompts, and
//! sampling messages.

use super::core::{Annotations, Base64String, MimeType, Uri};
use serde::{Deserialize, Serialize};

/// A single piece of content in a message or tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text.
    #[serde(rename = "text")]
    Text(TextContent),
    /// Base64-encoded image.
    #[serde(rename = "image")]
    Image(ImageContent),
    /// Base64-encoded audio.
    #[serde(rename = "audio")]
    Audio(AudioContent),
    /// A reference to a resource without embedding its contents.
    #[serde(rename = "resource_link")]
    ResourceLink(ResourceLink),
    /// A resource embedded inline.
    #[serde(rename = "resource")]
    Resource(EmbeddedResource),
}

/// Plain text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    /// The text itself.
    pub text: String,
    /// Optional presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Base64-encoded image content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    /// Base64-encoded image bytes.
    pub data: Base64String,
    /// MIME type of the image.
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    /// Optional presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Base64-encoded audio content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioContent {
    /// Base64-encoded audio bytes.
    pub data: Base64String,
    /// MIME type of the audio.
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    /// Optional presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// A reference to an external resource, without its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Resource name.
    pub name: String,
    /// Resource URI.
    pub uri: Uri,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the linked resource, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
}

/// A resource embedded directly inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedResource {
    /// The embedded resource's contents.
    pub resource: ResourceContent,
    /// Optional presentation hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

/// Text contents of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResourceContents {
    /// Resource URI.
    pub uri: Uri,
    /// MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// The text itself.
    pub text: String,
}

/// Binary contents of a resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobResourceContents {
    /// Resource URI.
    pub uri: Uri,
    /// MIME type, if known.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    /// Base64-encoded binary payload.
    pub blob: Base64String,
}

/// Either a text or binary resource body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContent {
    /// Text body.
    Text(TextResourceContents),
    /// Binary body.
    Blob(BlobResourceContents),
}
