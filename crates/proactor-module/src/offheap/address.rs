use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

#[repr(C)]
struct Raw {
    storage: libc::sockaddr_storage,
    length: libc::socklen_t,
}

/// A `sockaddr_storage` plus its `socklen_t`, for connect and accept.
///
/// `assign` encodes a `SocketAddr` for the kernel to read; `extract`
/// decodes whatever the kernel wrote back (accept's peer address).
pub struct OffHeapSocketAddress {
    raw: Box<Raw>,
}

const STORAGE_LEN: libc::socklen_t = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

impl OffHeapSocketAddress {
    pub fn new() -> Self {
        // SAFETY: sockaddr_storage is plain old data; zero is AF_UNSPEC.
        let storage = unsafe { mem::zeroed() };
        Self { raw: Box::new(Raw { storage, length: STORAGE_LEN }) }
    }

    /// Encode `addr`. The length becomes the size of the family's struct.
    pub fn assign(&mut self, addr: &SocketAddr) {
        // SAFETY: zeroed storage is valid before partial overwrite.
        self.raw.storage = unsafe { mem::zeroed() };
        let storage = &mut self.raw.storage as *mut libc::sockaddr_storage;

        self.raw.length = match addr {
            SocketAddr::V4(v4) => {
                // SAFETY: sockaddr_storage is large and aligned enough for any sockaddr.
                let sin = unsafe { &mut *(storage as *mut libc::sockaddr_in) };
                sin.sin_family = libc::AF_INET as libc::sa_family_t;
                sin.sin_port = v4.port().to_be();
                sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t
            }
            SocketAddr::V6(v6) => {
                // SAFETY: as above.
                let sin6 = unsafe { &mut *(storage as *mut libc::sockaddr_in6) };
                sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sin6.sin6_port = v6.port().to_be();
                sin6.sin6_flowinfo = v6.flowinfo();
                sin6.sin6_addr.s6_addr = v6.ip().octets();
                sin6.sin6_scope_id = v6.scope_id();
                mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t
            }
        };
    }

    /// Decode the stored address. `None` for families other than IPv4/IPv6
    /// or a length too short for the family.
    pub fn extract(&self) -> Option<SocketAddr> {
        let storage = &self.raw.storage as *const libc::sockaddr_storage;
        let length = self.raw.length as usize;

        match i32::from(self.raw.storage.ss_family) {
            libc::AF_INET if length >= mem::size_of::<libc::sockaddr_in>() => {
                // SAFETY: family and length checked.
                let sin = unsafe { &*(storage as *const libc::sockaddr_in) };
                let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
                Some(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
            }
            libc::AF_INET6 if length >= mem::size_of::<libc::sockaddr_in6>() => {
                // SAFETY: family and length checked.
                let sin6 = unsafe { &*(storage as *const libc::sockaddr_in6) };
                Some(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                    u16::from_be(sin6.sin6_port),
                    sin6.sin6_flowinfo,
                    sin6.sin6_scope_id,
                )))
            }
            _ => None,
        }
    }

    /// Make the whole storage available for the kernel to write into.
    pub fn reset(&mut self) {
        // SAFETY: zero is a valid sockaddr_storage.
        self.raw.storage = unsafe { mem::zeroed() };
        self.raw.length = STORAGE_LEN;
    }

    #[inline]
    pub fn address(&self) -> u64 {
        &self.raw.storage as *const libc::sockaddr_storage as u64
    }

    /// Address of the `socklen_t`, for accept's in/out length argument.
    #[inline]
    pub fn length_address(&self) -> u64 {
        &self.raw.length as *const libc::socklen_t as u64
    }

    #[inline]
    pub fn length(&self) -> libc::socklen_t {
        self.raw.length
    }
}

impl Default for OffHeapSocketAddress {
    fn default() -> Self {
        Self::new()
    }
}
