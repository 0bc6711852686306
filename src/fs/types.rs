use super::util;

pub type InodeId = u32;
pub type BlockId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InodeKind {
    Directory {
        children: Vec<InodeId>,
    },
    File {
        size: u32,
        blocks: Vec<BlockId>,
    },
}

/// A directory or file node of the tree.
///
/// Nodes keep no reference to their parent. A directory lists its children by
/// id in insertion order, disturbed only by swap-removal on delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub(crate) id: InodeId,
    pub(crate) name: String,
    pub(crate) kind: InodeKind,
}

impl Inode {
    pub(crate) fn directory(id: InodeId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            kind: InodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    pub(crate) fn file(id: InodeId, name: &str, size: u32, blocks: Vec<BlockId>) -> Self {
        debug_assert_eq!(blocks.len(), util::blocks_needed(size));
        Self {
            id,
            name: name.to_owned(),
            kind: InodeKind::File { size, blocks },
        }
    }

    pub fn id(&self) -> InodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &InodeKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    /// Child ids of a directory; always empty for a file.
    pub fn children(&self) -> &[InodeId] {
        match &self.kind {
            InodeKind::Directory { children } => children,
            InodeKind::File { .. } => &[],
        }
    }

    /// Size in bytes of a file; always 0 for a directory.
    pub fn filesize(&self) -> u32 {
        match self.kind {
            InodeKind::File { size, .. } => size,
            InodeKind::Directory { .. } => 0,
        }
    }

    pub fn blocks(&self) -> &[BlockId] {
        match &self.kind {
            InodeKind::File { blocks, .. } => blocks,
            InodeKind::Directory { .. } => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<InodeId>> {
        match &mut self.kind {
            InodeKind::Directory { children } => Some(children),
            InodeKind::File { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_has_no_file_fields() {
        let dir = Inode::directory(3, "etc");
        assert!(dir.is_directory());
        assert_eq!(dir.filesize(), 0);
        assert!(dir.blocks().is_empty());
        assert!(dir.children().is_empty());
    }

    #[test]
    fn file_has_no_children() {
        let file = Inode::file(4, "motd", 4097, vec![7, 8]);
        assert!(!file.is_directory());
        assert_eq!(file.filesize(), 4097);
        assert_eq!(file.blocks(), &[7, 8]);
        assert!(file.children().is_empty());

        let mut file = file;
        assert!(file.children_mut().is_none());
    }
}
