//! Strongly-typed MCP request/response payloads, grouped by the operation
//! family they belong to. Wire shapes only; no transport or session logic.

pub mod capabilities;
pub mod completion;
pub mod content;
pub mod core;
pub mod elicitation;
pub mod initialize;
pub mod logging;
pub mod progress;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod tools;

pub use capabilities::{
    ClientCapabilities, CompletionCapability, ElicitationCapability, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability,
};
pub use completion::{CompleteRequest, CompleteResult, CompletionArgument, CompletionReference};
pub use content::{
    AudioContent, BlobResourceContents, ContentBlock, EmbeddedResource, ImageContent,
    ResourceContent, ResourceLink, TextContent, TextResourceContents,
};
pub use core::{Annotations, Base64String, Cursor, Implementation, MimeType, Role, Uri};
pub use elicitation::{ElicitAction, ElicitRequest, ElicitResult};
pub use initialize::{InitializeRequest, InitializeResult};
pub use logging::{LogLevel, LoggingMessageNotification, SetLevelRequest};
pub use progress::ProgressNotification;
pub use prompts::{
    GetPromptRequest, GetPromptResult, ListPromptsRequest, ListPromptsResult, Prompt,
    PromptArgument, PromptMessage,
};
pub use resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, Resource,
    ResourceTemplate, ResourceUpdatedNotification, SubscribeRequest,
};
pub use roots::{ListRootsResult, Root};
pub use sampling::{
    CreateMessageRequest, CreateMessageResult, ModelHint, ModelPreferences, SamplingMessage,
};
pub use tools::{
    CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult, Tool, ToolAnnotations,
    ToolInputSchema,
};
