use super::{alloc::BlockAllocator, tree::FileSystem, types::InodeKind};
use std::{fmt, io};

impl<A: BlockAllocator> FileSystem<A> {
    /// Prints the tree in pre-order, two spaces of indentation per level.
    pub fn debug_fs<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let root = match self.root {
            Some(root) => root,
            None => return Ok(()),
        };

        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let inode = match self.inodes.get(&id) {
                Some(inode) => inode,
                None => continue,
            };
            for _ in 0..depth {
                out.write_all(b"  ")?;
            }

            match &inode.kind {
                InodeKind::Directory { children } => {
                    writeln!(out, "{} (id {})", inode.name, inode.id)?;
                    stack.extend(children.iter().rev().map(|&child| (child, depth + 1)));
                }
                InodeKind::File { size, blocks } => {
                    write!(out, "{} (id {} size {}b blocks ", inode.name, inode.id, size)?;
                    for block in blocks {
                        write!(out, "{} ", block)?;
                    }
                    writeln!(out, ")")?;
                }
            }
        }

        Ok(())
    }
}

impl<A: BlockAllocator> fmt::Display for FileSystem<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.debug_fs(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}
