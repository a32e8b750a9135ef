//! Native flag sets.
//!
//! Each set is a `bitflags` type whose bits are the kernel constants, so
//! `bits()` is the native mask and `from_bits()` decodes it. None of the
//! named flags overlap, which keeps encode/decode lossless.

use bitflags::bitflags;

bitflags! {
    /// Submission queue entry flags (`IOSQE_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubmitFlags: u8 {
        const FIXED_FILE = 1 << 0;
        const IO_DRAIN = 1 << 1;
        /// The next entry in the queue does not start until this one completes.
        /// Used to chain a timeout guard to its primary operation.
        const IO_LINK = 1 << 2;
        const IO_HARDLINK = 1 << 3;
        const ASYNC = 1 << 4;
        const BUFFER_SELECT = 1 << 5;
        const CQE_SKIP_SUCCESS = 1 << 6;
    }
}

bitflags! {
    /// `open(2)` flags. Absence of both write flags means read-only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OpenFlags: i32 {
        const WRITE_ONLY = libc::O_WRONLY;
        const READ_WRITE = libc::O_RDWR;
        const CREATE = libc::O_CREAT;
        const EXCLUSIVE = libc::O_EXCL;
        const NO_CTTY = libc::O_NOCTTY;
        const TRUNCATE = libc::O_TRUNC;
        const APPEND = libc::O_APPEND;
        const NON_BLOCK = libc::O_NONBLOCK;
        const DSYNC = libc::O_DSYNC;
        const DIRECT = libc::O_DIRECT;
        const DIRECTORY = libc::O_DIRECTORY;
        const NO_FOLLOW = libc::O_NOFOLLOW;
        const NO_ATIME = libc::O_NOATIME;
        const CLOSE_ON_EXEC = libc::O_CLOEXEC;
        const PATH = libc::O_PATH;
    }
}

bitflags! {
    /// File mode bits passed when a file is created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FilePermission: u32 {
        const USER_READ = libc::S_IRUSR;
        const USER_WRITE = libc::S_IWUSR;
        const USER_EXEC = libc::S_IXUSR;
        const GROUP_READ = libc::S_IRGRP;
        const GROUP_WRITE = libc::S_IWGRP;
        const GROUP_EXEC = libc::S_IXGRP;
        const OTHER_READ = libc::S_IROTH;
        const OTHER_WRITE = libc::S_IWOTH;
        const OTHER_EXEC = libc::S_IXOTH;
        const SET_UID = libc::S_ISUID;
        const SET_GID = libc::S_ISGID;
        const STICKY = libc::S_ISVTX;
    }
}

impl FilePermission {
    /// `rw-r--r--`
    pub const DEFAULT_FILE: Self = Self::USER_READ
        .union(Self::USER_WRITE)
        .union(Self::GROUP_READ)
        .union(Self::OTHER_READ);
}

bitflags! {
    /// Flags or-ed into the socket type at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SocketFlag: i32 {
        const NON_BLOCK = libc::SOCK_NONBLOCK;
        const CLOSE_ON_EXEC = libc::SOCK_CLOEXEC;
    }
}

bitflags! {
    /// Boolean socket options switched on after creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SocketOption: u32 {
        const REUSE_ADDRESS = 1 << 0;
        const REUSE_PORT = 1 << 1;
        const KEEP_ALIVE = 1 << 2;
        const NO_DELAY = 1 << 3;
    }
}

impl SocketOption {
    /// `(level, optname)` pairs for every option in the set.
    pub fn native_options(self) -> impl Iterator<Item = (i32, i32)> {
        const NATIVE: [(SocketOption, i32, i32); 4] = [
            (SocketOption::REUSE_ADDRESS, libc::SOL_SOCKET, libc::SO_REUSEADDR),
            (SocketOption::REUSE_PORT, libc::SOL_SOCKET, libc::SO_REUSEPORT),
            (SocketOption::KEEP_ALIVE, libc::SOL_SOCKET, libc::SO_KEEPALIVE),
            (SocketOption::NO_DELAY, libc::IPPROTO_TCP, libc::TCP_NODELAY),
        ];

        NATIVE
            .into_iter()
            .filter(move |(option, _, _)| self.contains(*option))
            .map(|(_, level, name)| (level, name))
    }
}

bitflags! {
    /// `statx(2)` lookup flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatFlags: i32 {
        const EMPTY_PATH = libc::AT_EMPTY_PATH;
        const NO_AUTOMOUNT = libc::AT_NO_AUTOMOUNT;
        const SYMLINK_NOFOLLOW = libc::AT_SYMLINK_NOFOLLOW;
        const FORCE_SYNC = libc::AT_STATX_FORCE_SYNC;
        const DONT_SYNC = libc::AT_STATX_DONT_SYNC;
    }
}

bitflags! {
    /// `statx(2)` field mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatMask: u32 {
        const TYPE = libc::STATX_TYPE;
        const MODE = libc::STATX_MODE;
        const NLINK = libc::STATX_NLINK;
        const UID = libc::STATX_UID;
        const GID = libc::STATX_GID;
        const ATIME = libc::STATX_ATIME;
        const MTIME = libc::STATX_MTIME;
        const CTIME = libc::STATX_CTIME;
        const INO = libc::STATX_INO;
        const SIZE = libc::STATX_SIZE;
        const BLOCKS = libc::STATX_BLOCKS;
        const BTIME = libc::STATX_BTIME;
    }
}

impl StatMask {
    /// Everything `stat(2)` returns.
    pub const BASIC_STATS: Self = Self::from_bits_truncate(libc::STATX_BASIC_STATS);
}

bitflags! {
    /// `splice(2)` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpliceFlags: u32 {
        const MOVE = libc::SPLICE_F_MOVE;
        const NON_BLOCK = libc::SPLICE_F_NONBLOCK;
        const MORE = libc::SPLICE_F_MORE;
        const GIFT = libc::SPLICE_F_GIFT;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitflags::Flags;

    /// Encode every non-empty subset of named flags and decode it back.
    fn assert_round_trip<F>()
    where
        F: Flags + Copy + PartialEq + std::fmt::Debug,
    {
        let named = F::FLAGS;
        assert!(named.len() < 20, "subset walk would be too large");

        for mask in 1u32..(1u32 << named.len()) {
            let mut set = F::empty();
            for (i, flag) in named.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    set.insert(*flag.value());
                }
            }

            let decoded = F::from_bits(set.bits()).expect("named bits must decode");
            assert_eq!(decoded, set);
            assert_eq!(decoded.iter().count(), mask.count_ones() as usize);
        }
    }

    #[test]
    fn test_submit_flags_round_trip() {
        assert_round_trip::<SubmitFlags>();
    }

    #[test]
    fn test_open_flags_round_trip() {
        assert_round_trip::<OpenFlags>();
    }

    #[test]
    fn test_permission_round_trip() {
        assert_round_trip::<FilePermission>();
    }

    #[test]
    fn test_socket_flags_round_trip() {
        assert_round_trip::<SocketFlag>();
        assert_round_trip::<SocketOption>();
    }

    #[test]
    fn test_stat_and_splice_round_trip() {
        assert_round_trip::<StatFlags>();
        assert_round_trip::<StatMask>();
        assert_round_trip::<SpliceFlags>();
    }

    #[test]
    fn test_link_bit_matches_kernel() {
        assert_eq!(SubmitFlags::IO_LINK.bits(), 4);
    }

    #[test]
    fn test_socket_option_mapping() {
        let opts: Vec<_> = (SocketOption::REUSE_ADDRESS | SocketOption::NO_DELAY)
            .native_options()
            .collect();
        assert_eq!(
            opts,
            vec![
                (libc::SOL_SOCKET, libc::SO_REUSEADDR),
                (libc::IPPROTO_TCP, libc::TCP_NODELAY),
            ]
        );
    }

    #[test]
    fn test_default_file_permission() {
        assert_eq!(FilePermission::DEFAULT_FILE.bits(), 0o644);
    }
}
