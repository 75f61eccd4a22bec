//! The RAM disk filesystem.
//!
//! File data lives in device sectors handed out by a [`BitSet`]; the tree
//! itself is a node table indexed by inode in a slab. The tree is built
//! fresh by every `mount`, so the device acts as scratch storage.

use drivefs_core::{
    BackendOps, BitSet, DirEntry, EntryFlags, EntryName, FsBackend, Handle, Ioctl,
    IoctlReply, OpenMode, VfsError, VfsErrorKind, VfsResult, volume_string,
};
use slab::Slab;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::RamDiskConfig;
use crate::device::{BlockDevice, SECTOR_SIZE};

type Inode = usize;

const ROOT_INODE: Inode = 0;

#[derive(Debug)]
struct FileNode {
    len: u64,
    /// Device sector backing each 512-byte block of the file, in order.
    sectors: SmallVec<[u32; 4]>,
}

#[derive(Debug)]
struct DirectoryNode {
    children: SmallVec<[Inode; 8]>,
}

#[derive(Debug)]
enum NodeKind {
    File(FileNode),
    Directory(DirectoryNode),
}

#[derive(Debug)]
struct Node {
    name: EntryName,
    parent: Inode,
    /// Open file or directory handles on this node.
    open: usize,
    kind: NodeKind,
}

impl Node {
    fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory(_))
    }
}

pub struct RamDiskFs<D: BlockDevice> {
    config: RamDiskConfig,
    device: D,
    mounted: bool,
    storage: Slab<Node>,
    sectors: BitSet,
}

impl<D: BlockDevice> RamDiskFs<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, RamDiskConfig::default())
    }

    pub fn with_config(device: D, config: RamDiskConfig) -> Self {
        Self {
            config,
            device,
            mounted: false,
            storage: Slab::new(),
            sectors: BitSet::new(0),
        }
    }

    pub fn config(&self) -> &RamDiskConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Sectors not yet allocated to any file.
    pub fn free_sectors(&self) -> usize {
        self.sectors.clear_count()
    }

    fn node(&self, inode: Inode, context: &'static str) -> VfsResult<&Node> {
        self.storage
            .get(inode)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))
    }

    fn node_mut(&mut self, inode: Inode, context: &'static str) -> VfsResult<&mut Node> {
        self.storage
            .get_mut(inode)
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))
    }

    fn file(&self, inode: Inode, context: &'static str) -> VfsResult<&FileNode> {
        match &self.node(inode, context)?.kind {
            NodeKind::File(file) => Ok(file),
            NodeKind::Directory(_) => Err(VfsError::new(VfsErrorKind::InvalidArgument, context)),
        }
    }

    fn children(&self, inode: Inode) -> &[Inode] {
        match self.storage.get(inode).map(|node| &node.kind) {
            Some(NodeKind::Directory(dir)) => &dir.children[..],
            _ => &[],
        }
    }

    fn child(&self, parent: Inode, name: &str) -> Option<Inode> {
        self.children(parent).iter().copied().find(|&inode| {
            self.storage
                .get(inode)
                .is_some_and(|node| node.name.eq_ignore_ascii_case(name))
        })
    }

    fn ensure_writable(&self, context: &'static str) -> VfsResult<()> {
        if self.config.read_only {
            Err(VfsError::new(VfsErrorKind::PermissionDenied, context))
        } else {
            Ok(())
        }
    }

    /// Resolve a local path to an inode.
    fn lookup(&self, path: &str, context: &'static str) -> VfsResult<Inode> {
        let mut inode = ROOT_INODE;
        for name in components(path, context)? {
            if !self.node(inode, context)?.is_dir() {
                return Err(VfsError::new(VfsErrorKind::NotFound, context));
            }
            inode = self
                .child(inode, name)
                .ok_or(VfsError::new(VfsErrorKind::NotFound, context))?;
        }
        Ok(inode)
    }

    /// Resolve the parent directory of `path` and return it with the final
    /// component's name.
    fn lookup_parent<'p>(&self, path: &'p str, context: &'static str) -> VfsResult<(Inode, &'p str)> {
        let mut names: SmallVec<[&str; 8]> = components(path, context)?.collect();
        let name = names
            .pop()
            .ok_or(VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        let mut inode = ROOT_INODE;
        for component in names {
            inode = self
                .child(inode, component)
                .filter(|&child| self.storage.get(child).is_some_and(Node::is_dir))
                .ok_or(VfsError::new(VfsErrorKind::NotFound, context))?;
        }
        Ok((inode, name))
    }

    fn insert(&mut self, parent: Inode, name: &str, kind: NodeKind, context: &'static str) -> VfsResult<Inode> {
        if self.storage.len() >= self.config.max_nodes {
            return Err(VfsError::new(VfsErrorKind::OutOfResources, context));
        }
        let mut entry_name = EntryName::new();
        entry_name
            .push_str(name)
            .map_err(|_| VfsError::new(VfsErrorKind::InvalidArgument, context))?;
        let inode = self.storage.insert(Node {
            name: entry_name,
            parent,
            open: 0,
            kind,
        });
        if let Some(NodeKind::Directory(dir)) = self.storage.get_mut(parent).map(|n| &mut n.kind) {
            dir.children.push(inode);
        }
        Ok(inode)
    }

    fn detach(&mut self, inode: Inode) {
        let parent = match self.storage.get(inode) {
            Some(node) => node.parent,
            None => return,
        };
        if let Some(NodeKind::Directory(dir)) = self.storage.get_mut(parent).map(|n| &mut n.kind) {
            dir.children.retain(|child| *child != inode);
        }
    }

    /// Return every sector of a file to the free set and zero its length.
    fn truncate(&mut self, inode: Inode) {
        let Some(Node {
            kind: NodeKind::File(file),
            ..
        }) = self.storage.get_mut(inode)
        else {
            return;
        };
        for sector in file.sectors.drain(..) {
            self.sectors.clear(sector as usize);
        }
        file.len = 0;
    }

    /// Device sector holding file block `block`, allocating zeroed sectors
    /// for it and any gap before it. `None` when the device is full.
    fn block_sector(&mut self, inode: Inode, block: usize, context: &'static str) -> VfsResult<Option<u32>> {
        loop {
            let sectors = &self.file(inode, context)?.sectors;
            if let Some(&sector) = sectors.get(block) {
                return Ok(Some(sector));
            }
            let Some(free) = self.sectors.find_next_clear() else {
                return Ok(None);
            };
            let sector = u32::try_from(free).map_err(|_| VfsError::new(VfsErrorKind::DeviceError, context))?;
            self.device.write_sectors(sector as u64, &[0u8; SECTOR_SIZE])?;
            self.sectors.set(free);
            match &mut self.node_mut(inode, context)?.kind {
                NodeKind::File(file) => file.sectors.push(sector),
                NodeKind::Directory(_) => {
                    return Err(VfsError::new(VfsErrorKind::InvalidArgument, context));
                }
            }
        }
    }

    /// Write as much of `data` as fits in the block containing `at`.
    fn write_block(
        &mut self,
        inode: Inode,
        at: usize,
        data: &[u8],
        context: &'static str,
    ) -> VfsResult<Option<usize>> {
        let (block, offset) = (at / SECTOR_SIZE, at % SECTOR_SIZE);
        let Some(sector) = self.block_sector(inode, block, context)? else {
            return Ok(None);
        };
        let mut sector_buf = [0u8; SECTOR_SIZE];
        let n = (SECTOR_SIZE - offset).min(data.len());
        if n < SECTOR_SIZE {
            self.device.read_sectors(sector as u64, &mut sector_buf)?;
        }
        sector_buf[offset..offset + n].copy_from_slice(&data[..n]);
        self.device.write_sectors(sector as u64, &sector_buf)?;
        Ok(Some(n))
    }

    fn require_mounted(&self, context: &'static str) -> VfsResult<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(VfsError::new(VfsErrorKind::NotReady, context))
        }
    }
}

/// Non-empty components of a local path. `.` and `..` are not supported.
fn components<'p>(
    path: &'p str,
    context: &'static str,
) -> VfsResult<impl Iterator<Item = &'p str>> {
    if path.split('/').any(|c| c == "." || c == "..") {
        return Err(VfsError::new(VfsErrorKind::InvalidArgument, context));
    }
    Ok(path.split('/').filter(|c| !c.is_empty()))
}

fn entry_flags(node: &Node, read_only: bool) -> EntryFlags {
    let mut flags = if node.is_dir() {
        EntryFlags::DIR
    } else {
        EntryFlags::FILE
    };
    flags |= EntryFlags::READ;
    if !read_only {
        flags |= EntryFlags::WRITE;
    }
    flags
}

impl<D: BlockDevice> FsBackend for RamDiskFs<D> {
    fn name(&self) -> &'static str {
        "ramdisk"
    }

    fn supported(&self) -> BackendOps {
        BackendOps::REQUIRED
            | BackendOps::DIRECTORY
            | BackendOps::UNLINK
            | BackendOps::RENAME
            | BackendOps::MKDIR
            | BackendOps::IOCTL
    }

    fn mount(&mut self) -> VfsResult<()> {
        if !self.device.online() {
            return Err(VfsError::new(VfsErrorKind::NotReady, "ramdisk.mount"));
        }
        self.device.init()?;
        let count = usize::try_from(self.device.sector_count())
            .ok()
            .filter(|&count| count > 0 && count <= u32::MAX as usize)
            .ok_or(VfsError::new(VfsErrorKind::DeviceError, "ramdisk.mount"))?;
        if self.config.max_nodes == 0 {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, "ramdisk.mount"));
        }

        self.sectors = BitSet::new(count);
        self.storage = Slab::with_capacity(self.config.max_nodes.min(64));
        self.storage.insert(Node {
            name: EntryName::new(),
            parent: ROOT_INODE,
            open: 0,
            kind: NodeKind::Directory(DirectoryNode {
                children: SmallVec::new(),
            }),
        });
        self.mounted = true;
        debug!(sectors = count, label = %self.config.label, "ramdisk formatted");
        Ok(())
    }

    fn unmount(&mut self) -> VfsResult<()> {
        self.require_mounted("ramdisk.unmount")?;
        self.mounted = false;
        self.storage.clear();
        self.sectors = BitSet::new(0);
        Ok(())
    }

    fn open(&mut self, handle: &mut Handle, path: &str, mode: OpenMode) -> VfsResult<()> {
        const CTX: &str = "ramdisk.open";
        self.require_mounted(CTX)?;
        if mode.intersects(OpenMode::WRITE | OpenMode::CREATE) {
            self.ensure_writable(CTX)?;
        }

        let (parent, name) = self.lookup_parent(path, CTX)?;
        let inode = match self.child(parent, name) {
            Some(inode) => {
                if self.node(inode, CTX)?.is_dir() {
                    return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
                }
                if mode.contains(OpenMode::CREATE) {
                    // other handles would keep cursors past the new end
                    if self.node(inode, CTX)?.open > 0 {
                        return Err(VfsError::new(VfsErrorKind::Busy, CTX));
                    }
                    self.truncate(inode);
                }
                inode
            }
            None if mode.contains(OpenMode::CREATE) => {
                let kind = NodeKind::File(FileNode {
                    len: 0,
                    sectors: SmallVec::new(),
                });
                self.insert(parent, name, kind, CTX)?
            }
            None => return Err(VfsError::new(VfsErrorKind::NotFound, CTX)),
        };

        self.node_mut(inode, CTX)?.open += 1;
        handle.cookie = inode as u64;
        trace!(path, inode, "ramdisk open");
        Ok(())
    }

    fn close(&mut self, handle: &mut Handle) -> VfsResult<()> {
        let node = self.node_mut(handle.cookie as Inode, "ramdisk.close")?;
        node.open = node.open.saturating_sub(1);
        Ok(())
    }

    fn read(&mut self, handle: &Handle, buf: &mut [u8]) -> VfsResult<usize> {
        const CTX: &str = "ramdisk.read";
        let inode = handle.cookie as Inode;
        let file = self.file(inode, CTX)?;
        let len = file.len;
        let pos = handle.cursor();
        if pos >= len {
            return Ok(0);
        }
        let total = buf.len().min(usize::try_from(len - pos).unwrap_or(usize::MAX));

        let mut sector_buf = [0u8; SECTOR_SIZE];
        let mut done = 0;
        while done < total {
            let at = pos as usize + done;
            let (block, offset) = (at / SECTOR_SIZE, at % SECTOR_SIZE);
            let sector = self
                .file(inode, CTX)?
                .sectors
                .get(block)
                .copied()
                .ok_or(VfsError::new(VfsErrorKind::DeviceError, CTX))?;
            self.device.read_sectors(sector as u64, &mut sector_buf)?;
            let n = (SECTOR_SIZE - offset).min(total - done);
            buf[done..done + n].copy_from_slice(&sector_buf[offset..offset + n]);
            done += n;
        }
        Ok(done)
    }

    fn write(&mut self, handle: &Handle, buf: &[u8]) -> VfsResult<usize> {
        const CTX: &str = "ramdisk.write";
        self.ensure_writable(CTX)?;
        let inode = handle.cookie as Inode;
        let pos = handle.cursor() as usize;

        let mut done = 0;
        let mut failure = None;
        while done < buf.len() {
            match self.write_block(inode, pos + done, &buf[done..], CTX) {
                Ok(Some(n)) => done += n,
                Ok(None) => break,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if done > 0 {
            if let NodeKind::File(file) = &mut self.node_mut(inode, CTX)?.kind {
                file.len = file.len.max((pos + done) as u64);
            }
        }
        match failure {
            Some(err) if done == 0 => return Err(err),
            Some(err) => warn!(inode, done, error = %err, "ramdisk write cut short"),
            None if done == 0 => {
                return Err(VfsError::new(VfsErrorKind::OutOfResources, "ramdisk.write.full"));
            }
            None => {}
        }
        Ok(done)
    }

    fn size(&mut self, handle: &Handle) -> VfsResult<u64> {
        Ok(self.file(handle.cookie as Inode, "ramdisk.size")?.len)
    }

    fn unlink(&mut self, path: &str) -> VfsResult<()> {
        const CTX: &str = "ramdisk.unlink";
        self.require_mounted(CTX)?;
        self.ensure_writable(CTX)?;
        let inode = self.lookup(path, CTX)?;
        if inode == ROOT_INODE {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        }
        let node = self.node(inode, CTX)?;
        if node.open > 0 || !self.children(inode).is_empty() {
            return Err(VfsError::new(VfsErrorKind::Busy, CTX));
        }
        self.truncate(inode);
        self.detach(inode);
        self.storage.remove(inode);
        debug!(path, "ramdisk unlink");
        Ok(())
    }

    fn rename(&mut self, old: &str, new: &str) -> VfsResult<()> {
        const CTX: &str = "ramdisk.rename";
        self.require_mounted(CTX)?;
        self.ensure_writable(CTX)?;
        let inode = self.lookup(old, CTX)?;
        if inode == ROOT_INODE {
            return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
        }
        let (parent, name) = self.lookup_parent(new, CTX)?;
        if let Some(existing) = self.child(parent, name) {
            // renaming onto itself only changes the case of the name
            if existing != inode {
                return Err(VfsError::new(VfsErrorKind::Busy, CTX));
            }
        }
        // a directory cannot move below itself
        let mut ancestor = parent;
        while ancestor != ROOT_INODE {
            if ancestor == inode {
                return Err(VfsError::new(VfsErrorKind::InvalidArgument, CTX));
            }
            ancestor = self.node(ancestor, CTX)?.parent;
        }

        let mut entry_name = EntryName::new();
        entry_name
            .push_str(name)
            .map_err(|_| VfsError::new(VfsErrorKind::InvalidArgument, CTX))?;
        self.detach(inode);
        let node = self.node_mut(inode, CTX)?;
        node.name = entry_name;
        node.parent = parent;
        if let NodeKind::Directory(dir) = &mut self.node_mut(parent, CTX)?.kind {
            dir.children.push(inode);
        }
        debug!(old, new, "ramdisk rename");
        Ok(())
    }

    fn mkdir(&mut self, path: &str) -> VfsResult<()> {
        const CTX: &str = "ramdisk.mkdir";
        self.require_mounted(CTX)?;
        self.ensure_writable(CTX)?;
        let (parent, name) = self.lookup_parent(path, CTX)?;
        if self.child(parent, name).is_some() {
            return Err(VfsError::new(VfsErrorKind::Busy, CTX));
        }
        let kind = NodeKind::Directory(DirectoryNode {
            children: SmallVec::new(),
        });
        self.insert(parent, name, kind, CTX)?;
        Ok(())
    }

    fn diropen(&mut self, handle: &mut Handle, path: &str) -> VfsResult<()> {
        const CTX: &str = "ramdisk.diropen";
        self.require_mounted(CTX)?;
        let inode = self.lookup(path, CTX)?;
        let node = self.node_mut(inode, CTX)?;
        if !node.is_dir() {
            return Err(VfsError::new(VfsErrorKind::NotFound, CTX));
        }
        node.open += 1;
        handle.cookie = inode as u64;
        Ok(())
    }

    fn dirclose(&mut self, handle: &mut Handle) -> VfsResult<()> {
        let node = self.node_mut(handle.cookie as Inode, "ramdisk.dirclose")?;
        node.open = node.open.saturating_sub(1);
        Ok(())
    }

    fn dirnext(&mut self, handle: &Handle) -> VfsResult<DirEntry> {
        const CTX: &str = "ramdisk.dirnext";
        let position = usize::try_from(handle.cursor()).unwrap_or(usize::MAX);
        let inode = self
            .children(handle.cookie as Inode)
            .get(position)
            .copied()
            .ok_or(VfsError::new(VfsErrorKind::NotFound, CTX))?;
        let node = self.node(inode, CTX)?;
        DirEntry::new(&node.name, entry_flags(node, self.config.read_only))
    }

    fn ioctl(&mut self, request: Ioctl) -> VfsResult<IoctlReply> {
        Ok(match request {
            Ioctl::VolumeSize => IoctlReply::Size(self.device.sector_count() * SECTOR_SIZE as u64),
            Ioctl::Label => IoctlReply::Label(volume_string(&self.config.label)),
            Ioctl::Serial => IoctlReply::Serial(volume_string(&self.config.serial)),
        })
    }
}

impl<D: BlockDevice> core::fmt::Debug for RamDiskFs<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RamDiskFs")
            .field("config", &self.config)
            .field("mounted", &self.mounted)
            .field("nodes", &self.storage.len())
            .field("sectors", &self.sectors)
            .finish()
    }
}
