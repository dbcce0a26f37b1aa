//! Tree of named progress contexts
//!
//! Contexts live in an arena owned by [`ContextTree`] and refer to each other
//! by [`ContextId`]. A context is entered once and exited once; on exit its
//! recorded status is the worst of its own result and the statuses of the
//! children that already exited.

use chrono::{DateTime, Utc};
use subi_errors::ContextError;
use subi_types::{ContextId, Status};

/// One span in the tree
#[derive(Debug, Clone)]
pub struct ContextNode {
    pub name: String,
    pub description: String,
    pub parent: Option<ContextId>,
    pub children: Vec<ContextId>,
    pub entered_at: Option<DateTime<Utc>>,
    pub exited_at: Option<DateTime<Utc>>,
    pub status: Option<Status>,
}

impl ContextNode {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.entered_at.is_some() && self.exited_at.is_none()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ContextTree {
    nodes: Vec<ContextNode>,
}

impl ContextTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: &str, description: &str, parent: Option<ContextId>) -> ContextId {
        let id = ContextId(self.nodes.len());
        self.nodes.push(ContextNode {
            name: name.to_string(),
            description: description.to_string(),
            parent,
            children: Vec::new(),
            entered_at: None,
            exited_at: None,
            status: None,
        });
        id
    }

    /// Add a context with no parent
    pub fn root(&mut self, name: &str, description: &str) -> ContextId {
        self.push(name, description, None)
    }

    /// Add a context under `parent`
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Unknown` if `parent` is not in this tree.
    pub fn child(
        &mut self,
        parent: ContextId,
        name: &str,
        description: &str,
    ) -> Result<ContextId, ContextError> {
        self.node(parent)?;
        let id = self.push(name, description, Some(parent));
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Mark a context as entered
    ///
    /// # Errors
    ///
    /// Returns an error if the context is unknown or was already entered.
    pub fn enter(&mut self, id: ContextId) -> Result<(), ContextError> {
        let node = self.node_mut(id)?;
        if node.entered_at.is_some() {
            return Err(ContextError::AlreadyEntered {
                name: node.name.clone(),
            });
        }
        node.entered_at = Some(Utc::now());
        Ok(())
    }

    /// Exit a context and return the status recorded for it
    ///
    /// # Errors
    ///
    /// Returns an error if the context is unknown, was never entered, or has
    /// already exited.
    pub fn exit(&mut self, id: ContextId, status: Status) -> Result<Status, ContextError> {
        let node = self.node(id)?;
        if node.entered_at.is_none() {
            return Err(ContextError::NotEntered {
                name: node.name.clone(),
            });
        }
        if node.exited_at.is_some() {
            return Err(ContextError::AlreadyExited {
                name: node.name.clone(),
            });
        }

        let recorded = node
            .children
            .iter()
            .filter_map(|child| self.nodes[child.0].status)
            .fold(status, Status::worst);

        let node = &mut self.nodes[id.0];
        node.exited_at = Some(Utc::now());
        node.status = Some(recorded);
        Ok(recorded)
    }

    /// Look up a context
    ///
    /// # Errors
    ///
    /// Returns `ContextError::Unknown` if `id` is not in this tree.
    pub fn node(&self, id: ContextId) -> Result<&ContextNode, ContextError> {
        self.nodes.get(id.0).ok_or(ContextError::Unknown { id: id.0 })
    }

    fn node_mut(&mut self, id: ContextId) -> Result<&mut ContextNode, ContextError> {
        self.nodes.get_mut(id.0).ok_or(ContextError::Unknown { id: id.0 })
    }

    #[must_use]
    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    #[must_use]
    pub fn is_root(&self, id: ContextId) -> bool {
        self.nodes.get(id.0).is_some_and(|node| node.parent.is_none())
    }

    /// Slash-joined names from the root down to `id`
    #[must_use]
    pub fn full_name(&self, id: ContextId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let Some(node) = self.nodes.get(cid.0) else {
                break;
            };
            names.push(node.name.as_str());
            current = node.parent;
        }
        names.reverse();
        names.join("/")
    }

    /// Contexts entered and not yet exited
    pub fn open(&self) -> impl Iterator<Item = ContextId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_open())
            .map(|(index, _)| ContextId(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
