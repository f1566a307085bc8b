//! Recency List Module
//!
//! Arena-backed doubly linked list ordering entries for LRU eviction.

// == Node Handle ==
/// Stable handle to a node in a [`RecencyList`].
///
/// Handles stay valid until the node is removed; slots are recycled afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug)]
struct Node<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

// == Recency List ==
/// Tracks usage order for LRU eviction.
///
/// Nodes live in a `Vec` and link to each other by index, so the list owns
/// all storage and callers hold plain [`NodeId`] handles:
/// - Front = Most recently promoted
/// - Back = Least recently used
#[derive(Debug)]
pub(crate) struct RecencyList<T> {
    nodes: Vec<Node<T>>,
    /// Recycled slot indices
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    // == Constructor ==
    /// Creates a new empty list.
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Links a value at the front and returns its handle.
    pub(crate) fn push_front(&mut self, value: T) -> NodeId {
        let node = Node {
            value: Some(value),
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.attach_front(idx);
        self.len += 1;
        NodeId(idx)
    }

    // == Move To Front ==
    /// Marks a node as most recently used.
    ///
    /// Stale handles are ignored.
    pub(crate) fn move_to_front(&mut self, id: NodeId) {
        if !self.is_live(id) || self.head == Some(id.0) {
            return;
        }
        self.detach(id.0);
        self.attach_front(id.0);
    }

    // == Remove ==
    /// Unlinks a node and returns its value, or None for a stale handle.
    pub(crate) fn remove(&mut self, id: NodeId) -> Option<T> {
        if !self.is_live(id) {
            return None;
        }
        self.detach(id.0);
        self.len -= 1;
        self.free.push(id.0);
        self.nodes[id.0].value.take()
    }

    // == Back ==
    /// Handle of the least recently used node.
    pub(crate) fn back(&self) -> Option<NodeId> {
        self.tail.map(NodeId)
    }

    /// Value stored at `id`.
    #[cfg(test)]
    pub(crate) fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0).and_then(|node| node.value.as_ref())
    }

    // == Length ==
    /// Returns the number of linked nodes.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates values from most to least recently used.
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let idx = cursor?;
            let node = &self.nodes[idx];
            cursor = node.next;
            node.value.as_ref()
        })
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.0)
            .map(|node| node.value.is_some())
            .unwrap_or(false)
    }

    fn attach_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        match self.head {
            Some(old) => self.nodes[old].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }
}
