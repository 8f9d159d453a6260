//! Path-addressed settings nodes.
//!
//! # Responsibilities
//! - Own an ordered tree of named nodes
//! - Keep every node's fully qualified id (fqid) in sync with its position
//! - Resolve dot-separated paths, read and write values
//! - Flatten to and restore from a `fqid -> value` mapping
//!
//! # Design Decisions
//! - Sibling keys are unique; `add_child` rejects duplicates
//! - A missing path is `None` from `resolve`, `NotFound` from `get_value`/`set_value`
//! - Bulk restore (`fill_from_flat`) skips entries it cannot apply

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::settings::error::{SettingsError, SettingsResult};
use crate::settings::widgets::Widget;

/// Reserved key of the tree root. Paths may start with `root.`.
pub const ROOT_NODE_NAME: &str = "root";

/// Path separator used in fqids.
pub const PATH_SEPARATOR: char = '.';

/// A single node of the settings tree.
#[derive(Clone)]
pub struct SettingsNode {
    key: String,
    label: Option<String>,
    value: String,
    is_choice: bool,
    fqid: String,
    children: Vec<SettingsNode>,
    widget: Option<Arc<dyn Widget>>,
}

impl SettingsNode {
    /// Create a detached node. Its fqid is its own key until it is attached.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            fqid: key.clone(),
            key,
            label: None,
            value: String::new(),
            is_choice: false,
            children: Vec::new(),
            widget: None,
        }
    }

    /// Create a tree root.
    pub fn root() -> Self {
        Self::new(ROOT_NODE_NAME)
    }

    /// Set the initial value (builder-style).
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the human readable label (builder-style).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark this node as one alternative under a selector parent (builder-style).
    pub fn as_choice(mut self) -> Self {
        self.is_choice = true;
        self
    }

    /// Attach a widget used to render this node (builder-style).
    pub fn with_widget(mut self, widget: Arc<dyn Widget>) -> Self {
        self.widget = Some(widget);
        self
    }

    /// Attach `child` and return the node for chaining (builder-style).
    pub fn with_child(mut self, child: SettingsNode) -> SettingsResult<Self> {
        self.add_child(child)?;
        Ok(self)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Label if set, otherwise the key.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn fqid(&self) -> &str {
        &self.fqid
    }

    pub fn is_choice(&self) -> bool {
        self.is_choice
    }

    pub fn children(&self) -> &[SettingsNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Children marked as choices.
    pub fn choices(&self) -> impl Iterator<Item = &SettingsNode> {
        self.children.iter().filter(|c| c.is_choice)
    }

    /// A selector is a node with at least one choice child.
    pub fn is_selector(&self) -> bool {
        self.choices().next().is_some()
    }

    pub fn widget(&self) -> Option<&Arc<dyn Widget>> {
        self.widget.as_ref()
    }

    /// Append `child`, recomputing the fqid of its whole subtree.
    ///
    /// Returns a reference to the attached child.
    pub fn add_child(&mut self, mut child: SettingsNode) -> SettingsResult<&mut SettingsNode> {
        if child.key.is_empty() || child.key.contains(PATH_SEPARATOR) {
            return Err(SettingsError::InvalidKey(child.key));
        }
        if self.children.iter().any(|c| c.key == child.key) {
            return Err(SettingsError::DuplicateKey {
                parent: self.fqid.clone(),
                key: child.key,
            });
        }

        child.refresh_fqid(&self.fqid);
        self.children.push(child);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    fn refresh_fqid(&mut self, parent_fqid: &str) {
        self.fqid = format!("{parent_fqid}{PATH_SEPARATOR}{}", self.key);
        let fqid = self.fqid.clone();
        for child in &mut self.children {
            child.refresh_fqid(&fqid);
        }
    }

    /// Resolve `path` relative to this node. A leading `root.` is ignored and
    /// a bare `root` resolves to this node.
    pub fn resolve(&self, path: &str) -> Option<&SettingsNode> {
        let relative = relative_path(path)?;
        if relative.is_empty() {
            return Some(self);
        }
        relative
            .split(PATH_SEPARATOR)
            .try_fold(self, |node, segment| {
                node.children.iter().find(|c| c.key == segment)
            })
    }

    /// Mutable counterpart of [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, path: &str) -> Option<&mut SettingsNode> {
        let relative = relative_path(path)?;
        if relative.is_empty() {
            return Some(self);
        }
        relative
            .split(PATH_SEPARATOR)
            .try_fold(self, |node, segment| {
                node.children.iter_mut().find(|c| c.key == segment)
            })
    }

    /// Value of the node at `path`.
    pub fn get_value(&self, path: &str) -> SettingsResult<&str> {
        self.resolve(path)
            .map(|node| node.value.as_str())
            .ok_or_else(|| SettingsError::NotFound(path.to_string()))
    }

    /// Write the value of the node at `path`.
    ///
    /// A selector only accepts the key of one of its choices. Other nodes
    /// with children hold no value of their own and reject every write.
    pub fn set_value(&mut self, path: &str, value: impl Into<String>) -> SettingsResult<()> {
        let value = value.into();
        let node = self
            .resolve_mut(path)
            .ok_or_else(|| SettingsError::NotFound(path.to_string()))?;

        if node.has_children() && !node.is_selector() {
            return Err(SettingsError::Validation {
                path: node.fqid.clone(),
                reason: "a settings group has no value of its own".to_string(),
            });
        }

        if node.is_selector() && !node.choices().any(|c| c.key == value) {
            return Err(SettingsError::Validation {
                path: node.fqid.clone(),
                reason: format!("'{value}' is not one of its choices"),
            });
        }

        node.value = value;
        Ok(())
    }

    /// Flatten the subtree into `fqid -> value`.
    ///
    /// Leaves contribute their value; selectors also contribute the key of the
    /// active choice under their own fqid.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut flat = BTreeMap::new();
        self.flatten_into(&mut flat);
        flat
    }

    fn flatten_into(&self, flat: &mut BTreeMap<String, String>) {
        if self.children.is_empty() || self.is_selector() {
            flat.insert(self.fqid.clone(), self.value.clone());
        }
        for child in &self.children {
            child.flatten_into(flat);
        }
    }

    /// Restore values from a flat mapping. Returns the number of entries applied.
    ///
    /// Entries that no longer resolve, or that a selector rejects, are skipped.
    pub fn fill_from_flat<'a, I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut applied = 0;
        for (fqid, value) in entries {
            match self.set_value(fqid, value.as_str()) {
                Ok(()) => applied += 1,
                Err(e) => tracing::debug!(fqid = %fqid, error = %e, "Skipping stored setting"),
            }
        }
        applied
    }

    /// Render this node with its widget.
    pub fn render(&self) -> SettingsResult<String> {
        match &self.widget {
            Some(widget) => widget.render(self),
            None => Err(SettingsError::NotRenderable(self.fqid.clone())),
        }
    }

    /// Nested JSON view of the subtree: containers carry their `fqid`,
    /// selectors their `value`, leaves are plain strings.
    pub fn to_nested(&self) -> Value {
        if self.children.is_empty() {
            return Value::String(self.value.clone());
        }

        let mut object = Map::new();
        object.insert("fqid".into(), Value::String(self.fqid.clone()));
        if self.is_selector() {
            object.insert("value".into(), Value::String(self.value.clone()));
        }
        for child in &self.children {
            object.insert(child.key.clone(), child.to_nested());
        }
        Value::Object(object)
    }
}

fn relative_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    match path.strip_prefix(ROOT_NODE_NAME) {
        Some("") => Some(""),
        Some(rest) if rest.starts_with(PATH_SEPARATOR) => {
            Some(&rest[1..]).filter(|r| !r.is_empty())
        }
        _ => Some(path),
    }
}

impl fmt::Debug for SettingsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsNode")
            .field("fqid", &self.fqid)
            .field("value", &self.value)
            .field("is_choice", &self.is_choice)
            .field("widget", &self.widget.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl fmt::Display for SettingsNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport_tree() -> SettingsNode {
        let viewport = SettingsNode::new("viewport")
            .with_label("Viewport")
            .with_child(SettingsNode::new("x1").with_value("0"))
            .and_then(|n| n.with_child(SettingsNode::new("x2").with_value("100")))
            .and_then(|n| n.with_child(SettingsNode::new("y1").with_value("0")))
            .and_then(|n| n.with_child(SettingsNode::new("y2").with_value("50")))
            .unwrap();
        SettingsNode::root().with_child(viewport).unwrap()
    }

    fn controller_tree() -> SettingsNode {
        let keyboard = SettingsNode::new("keyboard")
            .as_choice()
            .with_child(SettingsNode::new("autopilot_button").with_value("a"))
            .unwrap();
        let gamepad = SettingsNode::new("gamepad")
            .as_choice()
            .with_child(SettingsNode::new("device_id").with_value("1"))
            .unwrap();
        let input = SettingsNode::new("input_device")
            .with_value("keyboard")
            .with_child(keyboard)
            .and_then(|n| n.with_child(gamepad))
            .unwrap();
        SettingsNode::root().with_child(input).unwrap()
    }

    fn assert_fqids_resolve(root: &SettingsNode, node: &SettingsNode) {
        let resolved = root.resolve(node.fqid()).expect("fqid must resolve");
        assert!(std::ptr::eq(resolved, node), "{} resolved to another node", node.fqid());
        for child in node.children() {
            assert_fqids_resolve(root, child);
        }
    }

    #[test]
    fn test_fqid_follows_attachment() {
        let root = viewport_tree();
        assert_eq!(root.fqid(), "root");
        assert_eq!(root.resolve("viewport.x1").unwrap().fqid(), "root.viewport.x1");
        assert_fqids_resolve(&root, &root);
    }

    #[test]
    fn test_deferred_attachment_recomputes_subtree() {
        // Built bottom-up: the grandchild's fqid is fixed once the chain is attached.
        let mut element = SettingsNode::new("controller");
        element.add_child(SettingsNode::new("vjoy_device")).unwrap();
        assert_eq!(element.children()[0].fqid(), "controller.vjoy_device");

        let mut root = SettingsNode::root();
        root.add_child(element).unwrap();
        assert_eq!(
            root.resolve("root.controller.vjoy_device").unwrap().fqid(),
            "root.controller.vjoy_device"
        );
        assert_fqids_resolve(&root, &root);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let mut root = viewport_tree();
        let err = root.add_child(SettingsNode::new("viewport")).unwrap_err();
        assert!(matches!(err, SettingsError::DuplicateKey { .. }));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn test_invalid_key_rejected() {
        let mut root = SettingsNode::root();
        assert!(matches!(
            root.add_child(SettingsNode::new("a.b")),
            Err(SettingsError::InvalidKey(_))
        ));
        assert!(matches!(
            root.add_child(SettingsNode::new("")),
            Err(SettingsError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_resolve_paths() {
        let root = viewport_tree();
        assert!(root.resolve("root").is_some_and(|n| n.fqid() == "root"));
        assert!(root.resolve("root.viewport.y2").is_some());
        assert!(root.resolve("viewport.y2").is_some());
        assert!(root.resolve("root.viewport.z").is_none());
        assert!(root.resolve("root.viewport.x1.deeper").is_none());
        assert!(root.resolve("").is_none());
        assert!(root.resolve("root.").is_none());
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut root = viewport_tree();
        root.set_value("root.viewport.x1", "123").unwrap();
        assert_eq!(root.get_value("root.viewport.x1").unwrap(), "123");
        root.set_value("viewport.y2", "").unwrap();
        assert_eq!(root.get_value("root.viewport.y2").unwrap(), "");
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let mut root = viewport_tree();
        assert!(matches!(
            root.get_value("root.viewport.nope"),
            Err(SettingsError::NotFound(_))
        ));
        assert!(matches!(
            root.set_value("root.nope", "1"),
            Err(SettingsError::NotFound(_))
        ));
    }

    #[test]
    fn test_group_rejects_writes() {
        let mut root = viewport_tree();
        for path in ["root", "root.viewport"] {
            assert!(matches!(
                root.set_value(path, "garbage"),
                Err(SettingsError::Validation { .. })
            ));
        }
        assert_eq!(root.get_value("root.viewport").unwrap(), "");

        // A choice with fields of its own is a group too.
        let mut controller = controller_tree();
        assert!(controller.set_value("root.input_device.gamepad", "x").is_err());
        assert!(!root.flatten().contains_key("root.viewport"));
    }

    #[test]
    fn test_flatten_only_leaves() {
        let root = viewport_tree();
        let flat = root.flatten();
        assert_eq!(flat.len(), 4);
        assert_eq!(flat["root.viewport.x2"], "100");
        assert!(!flat.contains_key("root.viewport"));
    }

    #[test]
    fn test_flatten_includes_selector_value() {
        let root = controller_tree();
        let flat = root.flatten();
        assert_eq!(flat["root.input_device"], "keyboard");
        assert_eq!(flat["root.input_device.keyboard.autopilot_button"], "a");
        assert_eq!(flat["root.input_device.gamepad.device_id"], "1");
        assert!(!flat.contains_key("root.input_device.keyboard"));
    }

    #[test]
    fn test_selector_accepts_only_choices() {
        let mut root = controller_tree();
        root.set_value("root.input_device", "gamepad").unwrap();
        assert_eq!(root.get_value("root.input_device").unwrap(), "gamepad");
        assert!(matches!(
            root.set_value("root.input_device", "joystick"),
            Err(SettingsError::Validation { .. })
        ));
        assert_eq!(root.get_value("root.input_device").unwrap(), "gamepad");
    }

    #[test]
    fn test_flatten_fill_is_idempotent() {
        let mut root = controller_tree();
        root.set_value("root.input_device", "gamepad").unwrap();
        let before = root.flatten();
        let applied = root.fill_from_flat(&before);
        assert_eq!(applied, before.len());
        assert_eq!(root.flatten(), before);
    }

    #[test]
    fn test_fill_skips_stale_entries() {
        let mut root = viewport_tree();
        let mut stored = BTreeMap::new();
        stored.insert("root.viewport.x1".to_string(), "7".to_string());
        stored.insert("root.removed_element.gain".to_string(), "3".to_string());
        stored.insert("root.viewport.y2".to_string(), "70".to_string());

        let applied = root.fill_from_flat(&stored);
        assert_eq!(applied, 2);
        assert_eq!(root.get_value("root.viewport.x1").unwrap(), "7");
        assert_eq!(root.get_value("root.viewport.y2").unwrap(), "70");
        assert_eq!(root.get_value("root.viewport.x2").unwrap(), "100");
    }

    #[test]
    fn test_restore_after_local_change() {
        let mut root = viewport_tree();
        let snapshot = root.flatten();
        root.set_value("root.viewport.y2", "999").unwrap();
        root.fill_from_flat(&snapshot);
        assert_eq!(root.get_value("root.viewport.y2").unwrap(), "50");
    }

    #[test]
    fn test_label_falls_back_to_key() {
        let root = viewport_tree();
        assert_eq!(root.resolve("viewport").unwrap().label(), "Viewport");
        assert_eq!(root.resolve("viewport.x1").unwrap().label(), "x1");
    }

    #[test]
    fn test_render_without_widget() {
        let root = viewport_tree();
        let err = root.resolve("viewport.x1").unwrap().render().unwrap_err();
        assert!(matches!(err, SettingsError::NotRenderable(fqid) if fqid == "root.viewport.x1"));
    }

    #[test]
    fn test_nested_view() {
        let root = controller_tree();
        let nested = root.to_nested();
        assert_eq!(nested["fqid"], "root");
        assert_eq!(nested["input_device"]["value"], "keyboard");
        assert_eq!(nested["input_device"]["gamepad"]["device_id"], "1");
    }
}
