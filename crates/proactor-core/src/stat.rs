//! File status record decoded from the kernel `statx` layout.

use crate::flags::{FilePermission, StatMask};

/// File type bits of `st_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Regular,
    Directory,
    Symlink,
    Socket,
    Fifo,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl FileType {
    pub fn from_mode(mode: u32) -> Self {
        match mode & libc::S_IFMT {
            libc::S_IFREG => FileType::Regular,
            libc::S_IFDIR => FileType::Directory,
            libc::S_IFLNK => FileType::Symlink,
            libc::S_IFSOCK => FileType::Socket,
            libc::S_IFIFO => FileType::Fifo,
            libc::S_IFCHR => FileType::CharDevice,
            libc::S_IFBLK => FileType::BlockDevice,
            _ => FileType::Unknown,
        }
    }
}

/// A `statx_timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct StatTime {
    pub seconds: i64,
    pub nanos: u32,
}

impl StatTime {
    pub fn from_native(ts: &libc::statx_timestamp) -> Self {
        Self { seconds: ts.tv_sec, nanos: ts.tv_nsec }
    }
}

/// Result of the stat kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Fields the kernel actually filled in.
    pub mask: StatMask,
    pub block_size: u32,
    pub attributes: u64,
    pub links: u32,
    pub owner: u32,
    pub group: u32,
    pub file_type: FileType,
    pub permissions: FilePermission,
    pub inode: u64,
    pub size: u64,
    pub blocks: u64,
    pub accessed: StatTime,
    pub created: StatTime,
    pub status_changed: StatTime,
    pub modified: StatTime,
    pub device: (u32, u32),
    pub raw_device: (u32, u32),
}

impl FileStat {
    pub fn from_native(raw: &libc::statx) -> Self {
        let mode = u32::from(raw.stx_mode);
        Self {
            mask: StatMask::from_bits_truncate(raw.stx_mask),
            block_size: raw.stx_blksize,
            attributes: raw.stx_attributes,
            links: raw.stx_nlink,
            owner: raw.stx_uid,
            group: raw.stx_gid,
            file_type: FileType::from_mode(mode),
            permissions: FilePermission::from_bits_truncate(mode & 0o7777),
            inode: raw.stx_ino,
            size: raw.stx_size,
            blocks: raw.stx_blocks,
            accessed: StatTime::from_native(&raw.stx_atime),
            created: StatTime::from_native(&raw.stx_btime),
            status_changed: StatTime::from_native(&raw.stx_ctime),
            modified: StatTime::from_native(&raw.stx_mtime),
            device: (raw.stx_dev_major, raw.stx_dev_minor),
            raw_device: (raw.stx_rdev_major, raw.stx_rdev_minor),
        }
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::Regular
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }
}
