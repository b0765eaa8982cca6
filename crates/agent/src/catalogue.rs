//! Minimal tool catalogue.
//!
//! The planning model sees one `name: description` line per tool and no
//! parameter schemas. It is expected to know how common tools are called;
//! wrong parameter names come back as `{error: ...}` data and are
//! corrected on the next turn.

use leap_core::ToolRegistry;

/// Estimate the token count of `text`.
///
/// This is an approximation (characters ÷ 4, rounded down) used only for
/// reporting. It is never used to decide what to truncate.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// The rendered catalogue, built once per orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalogue {
    text: String,
}

impl Catalogue {
    /// Render the registry in insertion order.
    pub fn render(registry: &ToolRegistry) -> Self {
        let mut text = String::from("Available tools:");
        for tool in registry.iter() {
            text.push_str("\n  ");
            text.push_str(tool.name());
            text.push_str(": ");
            text.push_str(tool.description());
        }
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.text)
    }
}

impl std::fmt::Display for Catalogue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubTool;

    #[test]
    fn estimate_rounds_down() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("hello world"), 2);
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn renders_in_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(StubTool::new("read_file", "Read file contents"))).unwrap();
        registry.register(Box::new(StubTool::new("calculate", "Evaluate math expression"))).unwrap();

        let catalogue = Catalogue::render(&registry);
        assert_eq!(
            catalogue.text(),
            "Available tools:\n  read_file: Read file contents\n  calculate: Evaluate math expression"
        );
        assert_eq!(catalogue.estimated_tokens(), catalogue.text().len() / 4);
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut registry = ToolRegistry::new();
        for name in ["b", "a", "c"] {
            registry.register(Box::new(StubTool::new(name, "x"))).unwrap();
        }
        let first = Catalogue::render(&registry);
        let second = Catalogue::render(&registry);
        assert_eq!(first, second);
        assert!(first.text().find("  b:").unwrap() < first.text().find("  a:").unwrap());
    }

    #[test]
    fn empty_registry_renders_header_only() {
        let catalogue = Catalogue::render(&ToolRegistry::new());
        assert_eq!(catalogue.to_string(), "Available tools:");
    }
}
