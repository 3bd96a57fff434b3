// Data model shared by providers, the registry and the protocol layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tool a provider exposes, named without the provider prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A single block of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> &str {
        match self {
            Self::Text { text } => text,
        }
    }
}

/// Result of executing a tool.
///
/// `error_message` is present exactly when `success` is false; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    content: Vec<ContentBlock>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl ToolOutcome {
    pub fn success(content: Vec<ContentBlock>) -> Self {
        Self {
            content,
            success: true,
            error_message: None,
        }
    }

    /// Successful outcome holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::success(vec![ContentBlock::text(text)])
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            content: Vec::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    pub fn into_content(self) -> Vec<ContentBlock> {
        self.content
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Provider category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    OpenData,
    CustomApi,
    Database,
    Analytics,
}

impl ProviderCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenData => "open_data",
            Self::CustomApi => "custom_api",
            Self::Database => "database",
            Self::Analytics => "analytics",
        }
    }
}

impl fmt::Display for ProviderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifying metadata, fixed per provider implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub category: ProviderCategory,
    pub version: &'static str,
}
