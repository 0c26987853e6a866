//! UDP datagram I/O with ECN marking.
//!
//! ECN travels in the TOS (IPv4) or traffic-class (IPv6) byte. Reading
//! it back requires the kernel to surface the byte as a control message,
//! so reception is switched on once per socket; sending echoes the value
//! through the matching socket option before each datagram goes out.

use crate::error::NetError;
use crate::quic::Ecn;
use std::mem;
use std::net::{SocketAddr, UdpSocket};
use std::os::unix::io::AsRawFd as _;
use std::time::Duration;

/// Enable reception of the TOS/TCLASS control message.
pub(crate) fn enable_ecn_rx(socket: &UdpSocket, remote: &SocketAddr) -> Result<(), NetError> {
    let enable: libc::c_int = 1;
    let (level, option) = match remote {
        SocketAddr::V4(_) => (libc::IPPROTO_IP, libc::IP_RECVTOS),
        SocketAddr::V6(_) => (libc::IPPROTO_IPV6, libc::IPV6_RECVTCLASS),
    };
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            option,
            &enable as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        return Err(NetError::Connect);
    }
    Ok(())
}

/// Mark subsequently sent datagrams with `ecn`.
pub(crate) fn set_ecn(socket: &UdpSocket, remote: &SocketAddr, ecn: Ecn) -> Result<(), NetError> {
    let value: libc::c_int = libc::c_int::from(ecn.0);
    let (level, option) = match remote {
        SocketAddr::V4(_) => (libc::IPPROTO_IP, libc::IP_TOS),
        SocketAddr::V6(_) => (libc::IPPROTO_IPV6, libc::IPV6_TCLASS),
    };
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            option,
            &value as *const libc::c_int as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        return Err(NetError::Send);
    }
    Ok(())
}

/// Send one datagram on the connected socket.
pub(crate) fn send_dgram(socket: &UdpSocket, data: &[u8]) -> Result<(), NetError> {
    let mut iov = libc::iovec {
        iov_base: data.as_ptr() as *mut libc::c_void,
        iov_len: data.len(),
    };
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    let sent = unsafe { libc::sendmsg(socket.as_raw_fd(), &msg, 0) };
    if sent < 0 {
        return Err(NetError::Send);
    }
    Ok(())
}

/// Receive one datagram and the ECN marking it arrived with.
pub(crate) fn recv_dgram(socket: &UdpSocket, buf: &mut [u8]) -> Result<(usize, Ecn), NetError> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr() as *mut libc::c_void,
        iov_len: buf.len(),
    };
    let mut control = [0u8; 64];
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = control.len() as _;

    let received = unsafe { libc::recvmsg(socket.as_raw_fd(), &mut msg, 0) };
    if received <= 0 {
        return Err(NetError::Recv);
    }
    Ok((received as usize, ecn_from_cmsgs(&msg)))
}

/// Extract the TOS/TCLASS byte from the received control messages.
fn ecn_from_cmsgs(msg: &libc::msghdr) -> Ecn {
    let mut cmsg = unsafe { libc::CMSG_FIRSTHDR(msg) };
    while !cmsg.is_null() {
        let header = unsafe { &*cmsg };
        let tos = (header.cmsg_level == libc::IPPROTO_IP && header.cmsg_type == libc::IP_TOS)
            || (header.cmsg_level == libc::IPPROTO_IPV6 && header.cmsg_type == libc::IPV6_TCLASS);
        if tos && header.cmsg_len > 0 {
            return Ecn(unsafe { *libc::CMSG_DATA(cmsg) });
        }
        cmsg = unsafe { libc::CMSG_NXTHDR(msg, cmsg) };
    }
    Ecn(0)
}

/// Wait until the socket is readable; `Ok(false)` means the timeout hit.
pub(crate) fn poll_readable(socket: &UdpSocket, timeout: Duration) -> Result<bool, NetError> {
    let mut pfd = libc::pollfd {
        fd: socket.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = ceil_duration_to_millis(timeout).min(i32::MAX as u64) as libc::c_int;
    match unsafe { libc::poll(&mut pfd, 1, millis) } {
        -1 => Err(NetError::Recv),
        0 => Ok(false),
        _ => Ok(true),
    }
}

/// Round a duration up to whole milliseconds.
pub(crate) fn ceil_duration_to_millis(duration: Duration) -> u64 {
    ((duration.as_nanos() + 999_999) / 1_000_000) as u64
}
