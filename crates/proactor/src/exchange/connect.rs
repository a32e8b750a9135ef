use std::net::SocketAddr;

use proactor_core::error::IoResult;
use proactor_core::handle::FileDescriptor;
use proactor_core::submission::{Opcode, SubmitRecord};
use proactor_module::offheap::OffHeapSocketAddress;

use super::{check, ExchangeKind, OpKind};
use crate::factory::ExchangeEntryFactory;
use crate::pool::ObjectPool;

/// Connect a socket. Yields the connected socket.
pub struct ConnectKind {
    socket: FileDescriptor,
    address: Option<OffHeapSocketAddress>,
}

impl ExchangeKind for ConnectKind {
    const KIND: OpKind = OpKind::Connect;
    type Params = (FileDescriptor, SocketAddr);
    type Output = FileDescriptor;

    fn new() -> Self {
        Self {
            socket: FileDescriptor::INVALID,
            address: None,
        }
    }

    fn prepare(&mut self, (socket, address): Self::Params) -> IoResult<()> {
        self.socket = socket;
        self.address
            .get_or_insert_with(OffHeapSocketAddress::new)
            .assign(&address);
        Ok(())
    }

    fn render(&self, record: &mut SubmitRecord) {
        record.opcode = Opcode::Connect;
        record.fd = self.socket.descriptor();
        if let Some(address) = &self.address {
            record.addr = address.address();
            record.off = u64::from(address.length());
        }
    }

    fn translate(&mut self, result: i32, _flags: u32) -> IoResult<FileDescriptor> {
        check(result, |_| self.socket)
    }

    fn recycle(&mut self) {
        self.socket = FileDescriptor::INVALID;
    }

    fn dispose(&mut self) {
        self.recycle();
        self.address = None;
    }

    fn pool(factory: &mut ExchangeEntryFactory) -> &mut ObjectPool<Self> {
        &mut factory.connect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_and_translate() {
        let mut connect = ConnectKind::new();
        connect
            .prepare((FileDescriptor::new(12), "127.0.0.1:9000".parse().unwrap()))
            .unwrap();
        let mut rec = SubmitRecord::default();
        connect.render(&mut rec);
        assert_eq!(rec.opcode, Opcode::Connect);
        assert_eq!(rec.fd, 12);
        assert_eq!(rec.off as usize, std::mem::size_of::<libc::sockaddr_in>());

        assert_eq!(connect.translate(0, 0), Ok(FileDescriptor::new(12)));
        let err = connect.translate(-libc::ECONNREFUSED, 0).unwrap_err();
        assert_eq!(err.errno(), Some(libc::ECONNREFUSED));
    }
}
