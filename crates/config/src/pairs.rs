//! Named main/sub model presets sized for small-VRAM machines.

use serde::Serialize;

/// A planning model paired with an execution/filtering model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelPair {
    pub name: &'static str,
    pub main: &'static str,
    pub sub: &'static str,
    pub description: &'static str,
}

pub const MODEL_PAIRS: &[ModelPair] = &[
    ModelPair {
        name: "4gb",
        main: "qwen3:4b",
        sub: "qwen3:1.7b",
        description: "Best quality for 4GB VRAM (models swap in and out)",
    },
    ModelPair {
        name: "4gb_fast",
        main: "qwen3:4b",
        sub: "functiongemma",
        description: "4GB VRAM with a function-calling sub model",
    },
    ModelPair {
        name: "4gb_light",
        main: "qwen3:1.7b",
        sub: "gemma3:1b",
        description: "Lightest pair, both models fit in 4GB at once",
    },
    ModelPair {
        name: "8gb",
        main: "gemma3:4b",
        sub: "qwen3:1.7b",
        description: "8GB VRAM, both models stay resident",
    },
];

/// Look up a preset by name.
pub fn find_pair(name: &str) -> Option<&'static ModelPair> {
    MODEL_PAIRS.iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_unique_names() {
        let mut names: Vec<_> = MODEL_PAIRS.iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MODEL_PAIRS.len());
    }

    #[test]
    fn find_known_and_unknown() {
        let pair = find_pair("4gb_light").unwrap();
        assert_eq!(pair.main, "qwen3:1.7b");
        assert_eq!(pair.sub, "gemma3:1b");
        assert!(find_pair("16gb").is_none());
    }
}
