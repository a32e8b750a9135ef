use proactor_core::error::IoResult;
use proactor_core::flags::SocketFlag;
use proactor_core::handle::{ConnectionContext, FileDescriptor};
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_module::offheap::OffHeapSocketAddress;

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Accept one connection. Yields the new socket and the peer address.
pub struct AcceptKind {
    socket: FileDescriptor,
    flags: SocketFlag,
    peer: Option<OffHeapSocketAddress>,
}

impl ExchangeKind for AcceptKind {
    const KIND: OpKind = OpKind::Accept;
    type Params = (FileDescriptor, SocketFlag);
    type Output = ConnectionContext;

    fn new() -> Self {
        Self {
            socket: FileDescriptor::INVALID,
            flags: SocketFlag::empty(),
            peer: None,
        }
    }

    fn prepare(&mut self, (socket, flags): Self::Params) -> IoResult<()> {
        self.socket = socket;
        self.flags = flags;
        self.peer.get_or_insert_with(OffHeapSocketAddress::new).reset();
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Accept;
        record.fd = self.socket.descriptor();
        if let Some(peer) = &self.peer {
            record.addr = peer.address();
            record.addr2 = peer.length_address();
        }
        record.op_flags = self.flags.bits() as u32;
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<ConnectionContext> {
        let socket = check(result, |fd| FileDescriptor::new(fd as i32))?;
        Ok(ConnectionContext {
            socket,
            peer: self.peer.as_ref().and_then(OffHeapSocketAddress::extract),
        })
    }

    fn recycle(&mut self) {
        self.socket = FileDescriptor::INVALID;
        self.flags = SocketFlag::empty();
    }

    fn dispose(&mut self) {
        self.recycle();
        self.peer = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.accept
    }
}
