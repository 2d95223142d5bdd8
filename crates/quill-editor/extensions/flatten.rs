//! Flattening and ordering of nested extensions

use super::Extension;
use crate::core::{EditorError, ManagerSettings, NameKind, Priority, Result};
use ahash::AHashSet;

/// Extension supplied to a manager
pub(crate) struct Candidate {
    pub extension: Box<dyn Extension>,
    /// Whether `children()` should be taken and flattened
    pub expand: bool,
}

impl Candidate {
    pub fn new(extension: Box<dyn Extension>) -> Self {
        Self {
            extension,
            expand: true,
        }
    }

    /// Candidate whose children were already flattened
    pub fn flat(extension: Box<dyn Extension>) -> Self {
        Self {
            extension,
            expand: false,
        }
    }
}

/// Priority used for ordering: settings override, then the `priority` option,
/// then the extension default
pub(crate) fn effective_priority(extension: &dyn Extension, settings: &ManagerSettings) -> Priority {
    settings
        .priority_of(extension.name())
        .or_else(|| {
            extension
                .options()
                .get_i64("priority")
                .and_then(|value| i32::try_from(value).ok())
                .map(Priority)
        })
        .unwrap_or_else(|| extension.default_priority())
}

/// Flatten the extension tree depth first (parent before children) and sort
/// by descending priority, keeping flatten order for equal priorities
pub(crate) fn flatten(
    candidates: Vec<Candidate>,
    settings: &ManagerSettings,
) -> Result<Vec<(Priority, Box<dyn Extension>)>> {
    let mut flat = Vec::new();
    let mut ancestors = Vec::new();
    for candidate in candidates {
        visit(candidate, &mut ancestors, &mut flat)?;
    }

    let mut seen = AHashSet::new();
    for extension in &flat {
        if !seen.insert(extension.name().to_string()) {
            return Err(EditorError::DuplicateNames {
                kind: NameKind::Extension,
                name: extension.name().to_string(),
            });
        }
    }

    let mut ordered: Vec<(Priority, Box<dyn Extension>)> = flat
        .into_iter()
        .map(|extension| (effective_priority(extension.as_ref(), settings), extension))
        .collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(ordered)
}

fn visit(
    candidate: Candidate,
    ancestors: &mut Vec<String>,
    flat: &mut Vec<Box<dyn Extension>>,
) -> Result<()> {
    let Candidate {
        mut extension,
        expand,
    } = candidate;
    let name = extension.name().to_string();
    if ancestors.contains(&name) {
        return Err(EditorError::CyclicExtension { name });
    }

    let children = if expand {
        extension.children()
    } else {
        Vec::new()
    };
    flat.push(extension);

    ancestors.push(name);
    for child in children {
        visit(Candidate::new(child), ancestors, flat)?;
    }
    ancestors.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::ExtensionOptions;
    use serde_json::json;

    struct Node {
        name: &'static str,
        priority: Priority,
        options: ExtensionOptions,
        children: Vec<Box<dyn Extension>>,
    }

    impl Node {
        fn boxed(name: &'static str, priority: i32) -> Box<dyn Extension> {
            Box::new(Self::new(name, priority))
        }

        fn new(name: &'static str, priority: i32) -> Self {
            Self {
                name,
                priority: Priority(priority),
                options: ExtensionOptions::new(),
                children: Vec::new(),
            }
        }

        fn with_children(mut self, children: Vec<Box<dyn Extension>>) -> Self {
            self.children = children;
            self
        }
    }

    impl Extension for Node {
        fn name(&self) -> &str {
            self.name
        }

        fn default_priority(&self) -> Priority {
            self.priority
        }

        fn options(&self) -> &ExtensionOptions {
            &self.options
        }

        fn children(&mut self) -> Vec<Box<dyn Extension>> {
            std::mem::take(&mut self.children)
        }

        fn clone_with_options(&self, options: ExtensionOptions) -> Box<dyn Extension> {
            Box::new(Self {
                name: self.name,
                priority: self.priority,
                options,
                children: Vec::new(),
            })
        }
    }

    fn names(ordered: &[(Priority, Box<dyn Extension>)]) -> Vec<&str> {
        ordered.iter().map(|(_, ext)| ext.name()).collect()
    }

    #[test]
    fn parents_come_before_children() {
        let parent = Node::new("parent", 100)
            .with_children(vec![Node::boxed("child-a", 100), Node::boxed("child-b", 100)]);
        let ordered = flatten(
            vec![Candidate::new(Box::new(parent)), Candidate::new(Node::boxed("other", 100))],
            &ManagerSettings::default(),
        )
        .unwrap();
        assert_eq!(names(&ordered), vec!["parent", "child-a", "child-b", "other"]);
    }

    #[test]
    fn sorted_by_descending_priority_stably() {
        let ordered = flatten(
            vec![
                Candidate::new(Node::boxed("a", 10)),
                Candidate::new(Node::boxed("b", 5)),
                Candidate::new(Node::boxed("c", 20)),
                Candidate::new(Node::boxed("d", 10)),
            ],
            &ManagerSettings::default(),
        )
        .unwrap();
        assert_eq!(names(&ordered), vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn settings_and_options_override_priority() {
        let mut optioned = Node::new("optioned", 1);
        optioned.options = ExtensionOptions::new().with("priority", json!(50));
        let settings = ManagerSettings::default().with_priority("low", Priority(99));

        let ordered = flatten(
            vec![
                Candidate::new(Box::new(optioned)),
                Candidate::new(Node::boxed("low", 0)),
            ],
            &settings,
        )
        .unwrap();
        assert_eq!(names(&ordered), vec!["low", "optioned"]);
        assert_eq!(ordered[1].0, Priority(50));
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = flatten(
            vec![Candidate::new(Node::boxed("same", 1)), Candidate::new(Node::boxed("same", 2))],
            &ManagerSettings::default(),
        )
        .err()
        .unwrap();
        assert_eq!(
            err,
            EditorError::DuplicateNames {
                kind: NameKind::Extension,
                name: "same".into()
            }
        );
    }

    #[test]
    fn child_named_like_ancestor_is_cycle() {
        let inner = Node::new("mid", 1).with_children(vec![Node::boxed("root", 1)]);
        let root = Node::new("root", 1).with_children(vec![Box::new(inner) as Box<dyn Extension>]);
        let err = flatten(vec![Candidate::new(Box::new(root))], &ManagerSettings::default())
            .err()
            .unwrap();
        assert_eq!(err, EditorError::CyclicExtension { name: "root".into() });
    }

    #[test]
    fn flat_candidates_skip_children() {
        let parent = Node::new("parent", 1).with_children(vec![Node::boxed("child", 1)]);
        let ordered =
            flatten(vec![Candidate::flat(Box::new(parent))], &ManagerSettings::default()).unwrap();
        assert_eq!(names(&ordered), vec!["parent"]);
    }
}
