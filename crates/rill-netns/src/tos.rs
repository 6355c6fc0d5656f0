//! Type-of-service marking for telemetry sockets.
//!
//! Sets IP_TOS (or IPV6_TCLASS for v6 sockets) at listen or dial time.
//! On platforms without the option this is a no-op for a zero TOS and an
//! error otherwise, so callers that never ask for marking never fail.

use std::io;
use std::net::{TcpListener, TcpStream};

pub fn set_listener_tos(listener: &TcpListener, tos: u8) -> io::Result<()> {
    let ipv6 = listener.local_addr()?.is_ipv6();
    platform::set_tos_impl(platform::fd(listener), ipv6, tos)
}

pub fn set_stream_tos(stream: &TcpStream, tos: u8) -> io::Result<()> {
    let ipv6 = stream.local_addr()?.is_ipv6();
    platform::set_tos_impl(platform::fd(stream), ipv6, tos)
}

#[cfg(unix)]
mod platform {
    use std::io;
    use std::mem;
    use std::os::fd::{AsRawFd, RawFd};

    pub fn fd(socket: &impl AsRawFd) -> RawFd {
        socket.as_raw_fd()
    }

    pub fn set_tos_impl(fd: RawFd, ipv6: bool, tos: u8) -> io::Result<()> {
        let value = libc::c_int::from(tos);
        let (level, option) = if ipv6 {
            (libc::IPPROTO_IPV6, libc::IPV6_TCLASS)
        } else {
            (libc::IPPROTO_IP, libc::IP_TOS)
        };
        let rc = unsafe {
            libc::setsockopt(
                fd,
                level,
                option,
                (&raw const value).cast(),
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;

    pub fn fd<T>(_socket: &T) {}

    pub fn set_tos_impl(_fd: (), _ipv6: bool, tos: u8) -> io::Result<()> {
        if tos != 0 {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "TOS marking is not supported on this platform",
            ));
        }
        Ok(())
    }
}
