use std::collections::HashMap;

use crate::owner::OwnerType;
use crate::pkgver::Pkgver;

/// Identity of a node in the tree. Two `NodeId`s are the same node iff they
/// compare equal; an arena index makes that trivial instead of requiring
/// `Rc`/`Arc` pointer comparisons on a cyclically-referenced tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The root is always at index 0 and is created once by [`Tree::new`].
pub const ROOT: NodeId = NodeId(0);

pub(crate) struct NodeData {
    pub(crate) children: HashMap<String, NodeId>,
    pub(crate) parent: NodeId,
    pub(crate) owners: Vec<(Pkgver, OwnerType)>,
}

impl NodeData {
    fn new(parent: NodeId) -> Self {
        NodeData {
            children: HashMap::new(),
            parent,
            owners: Vec::new(),
        }
    }
}

/// Arena-backed multi-owner path tree. Slots freed by [`Tree::eradicate`]
/// are recycled so a long-running process doesn't grow the arena forever.
pub(crate) struct Tree {
    nodes: Vec<Option<NodeData>>,
    free: Vec<usize>,
}

impl Tree {
    pub(crate) fn new() -> Self {
        let root = NodeData::new(ROOT);
        Tree {
            nodes: vec![Some(root)],
            free: Vec::new(),
        }
    }

    fn get(&self, id: NodeId) -> &NodeData {
        self.nodes[id.0]
            .as_ref()
            .expect("NodeId used after its node was eradicated")
    }

    fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.nodes[id.0]
            .as_mut()
            .expect("NodeId used after its node was eradicated")
    }

    pub(crate) fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).parent
    }

    pub(crate) fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.get(id).children.get(name).copied()
    }

    pub(crate) fn children(&self, id: NodeId) -> impl Iterator<Item = (&str, NodeId)> {
        self.get(id)
            .children
            .iter()
            .map(|(name, child)| (name.as_str(), *child))
    }

    pub(crate) fn owners(&self, id: NodeId) -> &[(Pkgver, OwnerType)] {
        &self.get(id).owners
    }

    pub(crate) fn owner(&self, id: NodeId, pkgver: &Pkgver) -> Option<&OwnerType> {
        self.get(id)
            .owners
            .iter()
            .find(|(pv, _)| pv == pkgver)
            .map(|(_, ty)| ty)
    }

    /// Finds the name under which `parent(id).children` references `id`.
    /// A linear scan is fine: fan-outs are small and this only runs during
    /// display, per the Query Surface design.
    pub(crate) fn name_of(&self, id: NodeId) -> &str {
        if id == ROOT {
            return "";
        }
        let parent = self.get(id).parent;
        self.get(parent)
            .children
            .iter()
            .find(|(_, child)| **child == id)
            .map(|(name, _)| name.as_str())
            .unwrap_or("")
    }

    /// Sets (or overwrites) `pkgver`'s ownership of `id`.
    pub(crate) fn set_owner(&mut self, id: NodeId, pkgver: Pkgver, ty: OwnerType) {
        let owners = &mut self.get_mut(id).owners;
        if let Some(slot) = owners.iter_mut().find(|(pv, _)| *pv == pkgver) {
            slot.1 = ty;
        } else {
            owners.push((pkgver, ty));
        }
    }

    /// Returns the child node named `name` under `parent`, creating an
    /// empty one (with no owners yet) if it doesn't already exist.
    pub(crate) fn get_or_create(&mut self, parent: NodeId, name: &str) -> NodeId {
        if let Some(existing) = self.get(parent).children.get(name) {
            return *existing;
        }
        let id = self.alloc(NodeData::new(parent));
        self.get_mut(parent).children.insert(name.to_string(), id);
        id
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(data);
            NodeId(slot)
        } else {
            self.nodes.push(Some(data));
            NodeId(self.nodes.len() - 1)
        }
    }

    /// Removes `pkgver`'s contribution from `id` and, if `id` was a `Dir`
    /// for `pkgver`, from every descendant it owns. Depth-first post-order:
    /// children are visited (and possibly pruned) before `id`'s own owner
    /// entry is removed, so a child that becomes ownerless is unlinked
    /// before we check whether `id` itself became ownerless.
    pub(crate) fn eradicate(&mut self, id: NodeId, pkgver: &Pkgver) {
        let was_dir = match self.owner(id, pkgver) {
            Some(ty) => ty.is_dir(),
            None => return,
        };
        if was_dir {
            let children: Vec<NodeId> = self.children(id).map(|(_, child)| child).collect();
            for child in children {
                self.eradicate(child, pkgver);
            }
        }
        let owners = &mut self.get_mut(id).owners;
        owners.retain(|(pv, _)| pv != pkgver);
        let now_empty = self.get(id).owners.is_empty();
        if now_empty && id != ROOT {
            let parent = self.get(id).parent;
            let name = self.name_of(id).to_string();
            self.get_mut(parent).children.remove(&name);
            self.nodes[id.0] = None;
            self.free.push(id.0);
        }
    }
}
