use super::{
    alloc::{BitmapAllocator, BlockAllocator},
    error::{FsError, Result},
    types::{BlockId, Inode, InodeId},
    util, ROOT_NAME,
};
use std::{collections::HashMap, convert::TryFrom};

/// A filesystem session: the inode table, the id counter and the block device.
///
/// Every node is owned by exactly one directory's child list, except the root.
/// Callers name the parent explicitly on every mutation; it is checked again on
/// each call.
#[derive(Debug)]
pub struct FileSystem<A = BitmapAllocator> {
    pub(crate) root: Option<InodeId>,
    pub(crate) inodes: HashMap<InodeId, Inode>,
    pub(crate) next_id: u64,
    pub(crate) allocator: A,
}

impl<A: BlockAllocator> FileSystem<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            root: None,
            inodes: HashMap::new(),
            next_id: 0,
            allocator,
        }
    }

    /// A session holding only an empty root directory.
    pub fn with_root(allocator: A) -> Result<Self> {
        let mut fs = Self::new(allocator);
        fs.create_dir(None, ROOT_NAME)?;
        Ok(fs)
    }

    pub fn root(&self) -> Option<InodeId> {
        self.root
    }

    pub fn inode(&self, id: InodeId) -> Option<&Inode> {
        self.inodes.get(&id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The id the next created node will receive.
    pub fn next_inode_id(&self) -> u64 {
        self.next_id
    }

    pub fn create_file(&mut self, parent: InodeId, name: &str, size: u32) -> Result<InodeId> {
        self.directory(parent)?;
        util::validate_child_name(name)?;
        util::validate_filesize(size)?;
        if self.find_inode_by_name(parent, name).is_some() {
            return Err(FsError::DuplicateName(name.to_owned()));
        }
        let id = self.peek_id()?;

        let wanted = util::blocks_needed(size);
        let mut blocks = Vec::with_capacity(wanted);
        for _ in 0..wanted {
            match self.allocator.allocate_block() {
                Ok(block) => blocks.push(block),
                Err(err) => {
                    self.release_blocks(&blocks);
                    return Err(err);
                }
            }
        }

        self.next_id += 1;
        self.inodes.insert(id, Inode::file(id, name, size, blocks));
        self.attach(parent, id);

        log::debug!("created file {:?} (id {}, {} bytes) under {}", name, id, size, parent);
        Ok(id)
    }

    /// Creates a directory under `parent`, or the root when `parent` is `None`.
    pub fn create_dir(&mut self, parent: Option<InodeId>, name: &str) -> Result<InodeId> {
        let parent = match parent {
            None => {
                if name != ROOT_NAME {
                    return Err(FsError::InvalidParent);
                }
                if self.root.is_some() {
                    return Err(FsError::DuplicateName(name.to_owned()));
                }
                None
            }
            Some(parent) => {
                self.directory(parent)?;
                util::validate_child_name(name)?;
                if self.find_inode_by_name(parent, name).is_some() {
                    return Err(FsError::DuplicateName(name.to_owned()));
                }
                Some(parent)
            }
        };

        let id = self.peek_id()?;
        self.next_id += 1;
        self.inodes.insert(id, Inode::directory(id, name));
        match parent {
            Some(parent) => self.attach(parent, id),
            None => self.root = Some(id),
        }

        log::debug!("created directory {:?} (id {})", name, id);
        Ok(id)
    }

    /// First child of `parent` named `name`. A file parent has no children.
    pub fn find_inode_by_name(&self, parent: InodeId, name: &str) -> Option<InodeId> {
        self.inodes
            .get(&parent)?
            .children()
            .iter()
            .copied()
            .find(|child| self.inodes.get(child).map_or(false, |c| c.name == name))
    }

    /// True when `parent` has a child with the same *name* as `node`.
    ///
    /// The test is by name, so a distinct node that merely shares the name of a
    /// child also reports true.
    pub fn is_node_in_parent(&self, parent: InodeId, node: InodeId) -> bool {
        match self.inodes.get(&node) {
            Some(node) => self.find_inode_by_name(parent, &node.name).is_some(),
            None => false,
        }
    }

    /// Unlinks and releases a file, returning its blocks to the allocator.
    pub fn delete_file(&mut self, parent: InodeId, node: InodeId) -> Result<()> {
        let target = self.inodes.get(&node).ok_or(FsError::NotFound)?;
        if target.is_directory() {
            return Err(FsError::InvalidArgument(format!(
                "{:?} is a directory",
                target.name
            )));
        }
        self.directory(parent)?;
        self.verify_child(parent, node)?;

        self.unlink(parent, node);
        if let Some(inode) = self.inodes.remove(&node) {
            self.release_blocks(inode.blocks());
            log::debug!(
                "deleted file {:?} (id {}), released {} blocks",
                inode.name,
                node,
                inode.blocks().len()
            );
        }

        Ok(())
    }

    /// Unlinks and releases an empty directory. With no parent, only the empty
    /// root may be deleted.
    pub fn delete_dir(&mut self, parent: Option<InodeId>, node: InodeId) -> Result<()> {
        let target = self.inodes.get(&node).ok_or(FsError::NotFound)?;
        if !target.is_directory() {
            return Err(FsError::InvalidArgument(format!(
                "{:?} is not a directory",
                target.name
            )));
        }

        let parent = match parent {
            None => {
                if target.name != ROOT_NAME || self.root != Some(node) {
                    return Err(FsError::InvalidParent);
                }
                if !target.children().is_empty() {
                    return Err(FsError::NonEmptyDirectory(target.name.clone()));
                }
                self.inodes.remove(&node);
                self.root = None;
                log::debug!("deleted root directory (id {})", node);
                return Ok(());
            }
            Some(parent) => parent,
        };

        if !target.children().is_empty() {
            return Err(FsError::NonEmptyDirectory(target.name.clone()));
        }
        self.directory(parent)?;
        self.verify_child(parent, node)?;

        self.unlink(parent, node);
        if let Some(inode) = self.inodes.remove(&node) {
            log::debug!("deleted directory {:?} (id {})", inode.name, node);
        }

        Ok(())
    }

    /// Releases the whole tree, children before their directory. Returns the
    /// number of released nodes; an empty session is left untouched.
    pub fn teardown(&mut self) -> usize {
        let root = match self.root.take() {
            Some(root) => root,
            None => return 0,
        };

        let mut order = Vec::with_capacity(self.inodes.len());
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if let Some(inode) = self.inodes.get(&id) {
                stack.extend(inode.children().iter().copied());
                order.push(id);
            }
        }

        let mut released = 0;
        for id in order.into_iter().rev() {
            if let Some(inode) = self.inodes.remove(&id) {
                self.release_blocks(inode.blocks());
                released += 1;
            }
        }

        log::debug!("tore down {} nodes", released);
        released
    }

    /// Resolves an absolute path such as `/usr/bin` to a node.
    pub fn lookup(&self, path: &str) -> Result<InodeId> {
        let mut current = self.root.ok_or(FsError::NotFound)?;
        for component in util::components(path)? {
            current = self
                .find_inode_by_name(current, component)
                .ok_or(FsError::NotFound)?;
        }

        Ok(current)
    }

    /// Resolves the directory that holds the last component of `path`.
    pub fn lookup_parent<'p>(&self, path: &'p str) -> Result<(InodeId, &'p str)> {
        let mut components = util::components(path)?;
        let leaf = components.pop().ok_or_else(|| {
            FsError::InvalidArgument("the root has no parent".into())
        })?;

        let mut current = self.root.ok_or(FsError::NotFound)?;
        for component in components {
            current = self
                .find_inode_by_name(current, component)
                .ok_or(FsError::NotFound)?;
        }

        Ok((current, leaf))
    }

    fn directory(&self, id: InodeId) -> Result<&Inode> {
        match self.inodes.get(&id) {
            Some(inode) if inode.is_directory() => Ok(inode),
            _ => Err(FsError::InvalidParent),
        }
    }

    // The name lookup must resolve to this very node, so a same-named
    // stranger never gets another node's child unlinked.
    fn verify_child(&self, parent: InodeId, node: InodeId) -> Result<()> {
        let name = &self.inodes.get(&node).ok_or(FsError::NotFound)?.name;
        if self.find_inode_by_name(parent, name) == Some(node) {
            Ok(())
        } else {
            Err(FsError::NotFound)
        }
    }

    fn peek_id(&self) -> Result<InodeId> {
        InodeId::try_from(self.next_id)
            .map_err(|_| FsError::AllocationFailure("inode ids are exhausted".into()))
    }

    pub(crate) fn attach(&mut self, parent: InodeId, child: InodeId) {
        if let Some(children) = self.inodes.get_mut(&parent).and_then(Inode::children_mut) {
            children.push(child);
        }
    }

    // Swap-remove: the last sibling takes the freed slot.
    fn unlink(&mut self, parent: InodeId, node: InodeId) {
        if let Some(children) = self.inodes.get_mut(&parent).and_then(Inode::children_mut) {
            if let Some(index) = children.iter().position(|&c| c == node) {
                children.swap_remove(index);
            }
        }
    }

    fn release_blocks(&mut self, blocks: &[BlockId]) {
        for &block in blocks {
            self.allocator.free_block(block);
        }
    }
}
