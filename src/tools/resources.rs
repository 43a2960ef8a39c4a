//! Read-only MCP resources: per-category views over the project's memories.

use rmcp::model::{AnnotateAble, RawResource, Resource, ResourceContents};

use lumencore::memory::types::{Category, Memory};

pub const MIME_TYPE: &str = "text/plain";

/// Most memories a resource read returns.
pub const READ_LIMIT: usize = 50;

struct ResourceDef {
    uri: &'static str,
    name: &'static str,
    description: &'static str,
    category: Option<Category>,
}

const RESOURCES: [ResourceDef; 4] = [
    ResourceDef {
        uri: "memory://decisions",
        name: "Architectural Decisions",
        description: "Browse all architectural decisions",
        category: Some(Category::Decision),
    },
    ResourceDef {
        uri: "memory://patterns",
        name: "Code Patterns",
        description: "Browse code patterns and conventions",
        category: Some(Category::Pattern),
    },
    ResourceDef {
        uri: "memory://concepts",
        name: "Domain Concepts",
        description: "Browse domain concepts and glossary",
        category: Some(Category::Concept),
    },
    ResourceDef {
        uri: "memory://recent",
        name: "Recent Memories",
        description: "Most recently added or updated memories",
        category: None,
    },
];

pub fn list() -> Vec<Resource> {
    RESOURCES
        .iter()
        .map(|def| {
            let mut raw = RawResource::new(def.uri, def.name);
            raw.description = Some(def.description.into());
            raw.mime_type = Some(MIME_TYPE.into());
            raw.no_annotation()
        })
        .collect()
}

/// Category filter behind `uri`. The outer `None` means the uri is unknown;
/// `Some(None)` means every category.
pub fn category_for(uri: &str) -> Option<Option<Category>> {
    RESOURCES
        .iter()
        .find(|def| def.uri == uri)
        .map(|def| def.category)
}

pub fn render(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return "No memories found.".into();
    }
    memories
        .iter()
        .map(|m| {
            let tags = if m.tags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", m.tags.join(", "))
            };
            format!("## {}{}\n{}", m.title, tags, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn unknown(uri: &str) -> String {
    format!("Unknown resource: {uri}")
}

pub fn text_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.into(),
        mime_type: Some(MIME_TYPE.into()),
        text,
        meta: None,
    }
}
