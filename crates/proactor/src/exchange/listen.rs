use std::net::SocketAddr;

use proactor_core::error::{Failure, IoResult};
use proactor_core::flags::{SocketFlag, SocketOption};
use proactor_core::handle::{AddressFamily, FileDescriptor, ListenContext, SizeT, SocketType};
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_module::offheap::OffHeapSocketAddress;

use super::socket::{apply_options, discard, render_socket, SocketParams};
use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenParams {
    pub address: SocketAddr,
    pub socket_type: SocketType,
    pub flags: SocketFlag,
    pub options: SocketOption,
    pub queue_depth: SizeT,
}

impl ListenParams {
    /// A TCP listener with `SO_REUSEADDR` and a backlog of 128.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            socket_type: SocketType::Stream,
            flags: SocketFlag::CLOSE_ON_EXEC,
            options: SocketOption::REUSE_ADDRESS,
            queue_depth: SizeT(128),
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

    pub fn queue_depth(mut self, depth: SizeT) -> Self {
        self.queue_depth = depth;
        self
    }
}

/// Create a socket through the ring, then bind and listen on it.
///
/// Yields the listening descriptor and the address actually bound, so a
/// port of 0 comes back resolved.
pub struct ListenKind {
    params: Option<ListenParams>,
    scratch: Option<OffHeapSocketAddress>,
}

impl ListenKind {
    fn socket_params(params: &ListenParams) -> SocketParams {
        SocketParams {
            family: AddressFamily::of(&params.address),
            socket_type: params.socket_type,
            flags: params.flags,
            options: params.options,
        }
    }

    fn establish(&mut self, fd: FileDescriptor, params: &ListenParams) -> IoResult<ListenContext> {
        apply_options(fd, params.options)?;

        let scratch = self.scratch.get_or_insert_with(OffHeapSocketAddress::new);
        scratch.assign(&params.address);
        // SAFETY: scratch holds a sockaddr of `length()` bytes.
        let rc = unsafe {
            libc::bind(
                fd.descriptor(),
                scratch.address() as *const libc::sockaddr,
                scratch.length(),
            )
        };
        if rc != 0 {
            return Err(Failure::from(nix::errno::Errno::last()));
        }

        let backlog = params.queue_depth.value().min(i32::MAX as u64) as i32;
        if unsafe { libc::listen(fd.descriptor(), backlog) } != 0 {
            return Err(Failure::from(nix::errno::Errno::last()));
        }

        scratch.reset();
        // SAFETY: both pointers name live fields of scratch, sized by reset().
        let rc = unsafe {
            libc::getsockname(
                fd.descriptor(),
                scratch.address() as *mut libc::sockaddr,
                scratch.length_address() as *mut libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(Failure::from(nix::errno::Errno::last()));
        }

        Ok(ListenContext {
            socket: fd,
            address: scratch.extract().unwrap_or(params.address),
            queue_depth: params.queue_depth,
        })
    }
}

impl ExchangeKind for ListenKind {
    const KIND: OpKind = OpKind::Listen;
    type Params = ListenParams;
    type Output = ListenContext;

    fn new() -> Self {
        Self { params: None, scratch: None }
    }

    fn prepare(&mut self, params: ListenParams) -> IoResult<()> {
        self.params = Some(params);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        match &self.params {
            Some(params) => render_socket(&Self::socket_params(params), record),
            None => record.opcode = Opcode::Nop,
        }
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<ListenContext> {
        let fd = check(result, |fd| FileDescriptor::new(fd as i32))?;
        let Some(params) = self.params else {
            discard(fd);
            return Err(Failure::InvalidInput("listen completed without parameters"));
        };
        self.establish(fd, &params).map_err(|failure| {
            discard(fd);
            failure
        })
    }

    fn recycle(&mut self) {
        self.params = None;
    }

    fn dispose(&mut self) {
        self.params = None;
        self.scratch = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.listen
    }
}
