use proactor_core::error::{Failure, IoResult};
use proactor_core::flags::{SocketFlag, SocketOption};
use proactor_core::handle::{AddressFamily, FileDescriptor, SocketType};
use proactor_core::submission::{Opcode, SubmitRecord};

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketParams {
    pub family: AddressFamily,
    pub socket_type: SocketType,
    pub flags: SocketFlag,
    pub options: SocketOption,
}

impl SocketParams {
    /// A close-on-exec TCP socket with no options.
    pub fn stream(family: AddressFamily) -> Self {
        Self {
            family,
            socket_type: SocketType::Stream,
            flags: SocketFlag::CLOSE_ON_EXEC,
            options: SocketOption::empty(),
        }
    }

    pub fn flags(mut self, flags: SocketFlag) -> Self {
        self.flags = flags;
        self
    }

    pub fn options(mut self, options: SocketOption) -> Self {
        self.options = options;
        self
    }
}

/// Render an `IORING_OP_SOCKET` submission.
pub(crate) fn render_socket(params: &SocketParams, record: &mut SubmitRecord) {
    record.opcode = Opcode::Socket;
    record.fd = params.family.native();
    record.off = (params.socket_type.native() | params.flags.bits()) as u64;
    record.len = 0;
}

/// Apply `options` with `setsockopt`. The first failure wins.
pub(crate) fn apply_options(fd: FileDescriptor, options: SocketOption) -> IoResult<()> {
    let enabled: libc::c_int = 1;
    for (level, name) in options.native_options() {
        // SAFETY: `enabled` outlives the call and has the advertised size.
        let rc = unsafe {
            libc::setsockopt(
                fd.descriptor(),
                level,
                name,
                &enabled as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(Failure::from(nix::errno::Errno::last()));
        }
    }
    Ok(())
}

/// Close a descriptor we created but cannot hand out.
pub(crate) fn discard(fd: FileDescriptor) {
    if fd.is_valid() {
        let _ = nix::unistd::close(fd.descriptor());
    }
}

/// Create a socket and apply its options. Yields the descriptor.
pub struct SocketKind {
    params: Option<SocketParams>,
}

impl ExchangeKind for SocketKind {
    const KIND: OpKind = OpKind::Socket;
    type Params = SocketParams;
    type Output = FileDescriptor;

    fn new() -> Self {
        Self { params: None }
    }

    fn prepare(&mut self, params: SocketParams) -> IoResult<()> {
        self.params = Some(params);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        match &self.params {
            Some(params) => render_socket(params, record),
            None => record.opcode = Opcode::Nop,
        }
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<FileDescriptor> {
        let fd = check(result, |fd| FileDescriptor::new(fd as i32))?;
        let options = self.params.map_or(SocketOption::empty(), |p| p.options);
        apply_options(fd, options).map_err(|failure| {
            discard(fd);
            failure
        })?;
        Ok(fd)
    }

    fn recycle(&mut self) {
        self.params = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut socket = SocketKind::new();
        socket
            .prepare(SocketParams::stream(AddressFamily::Inet6).flags(SocketFlag::NON_BLOCK))
            .unwrap();
        let mut rec = SubmitRecord::default();
        socket.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Socket);
        assert_eq!(rec.fd, libc::AF_INET6);
        assert_eq!(rec.off as i32, libc::SOCK_STREAM | libc::SOCK_NONBLOCK);
    }

    #[test]
    fn test_apply_options_on_real_socket() {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        assert!(fd >= 0);
        let fd = FileDescriptor::new(fd);
        apply_options(fd, SocketOption::REUSE_ADDRESS | SocketOption::NO_DELAY).unwrap();
        discard(fd);

        let err = apply_options(FileDescriptor::INVALID, SocketOption::KEEP_ALIVE).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EBADF));
    }
}
