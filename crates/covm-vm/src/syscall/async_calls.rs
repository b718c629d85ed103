//! Asynchronous syscalls: `open`/`read`/`write`/`close`/`sleep`/`accept`/
//! `connect`/`send`/`recv`.
//!
//! These run on a worker thread from `crate::io`'s bounce pool, not on the
//! scheduler thread — each one is a real blocking host call. The calling
//! coroutine is parked for the whole duration; see `crate::scheduler`.

use covm_bytecode::value::Value;

/// Run one asynchronous syscall to completion, blocking the calling
/// (worker) thread. Never fails the VM itself — host failures come back as
/// an in-band negative value, exactly like a real syscall's `-errno`.
pub fn run(id: i64, args: &[Value]) -> Vec<Value> {
    match id {
        super::SYS_SLEEP => {
            let ms = arg_int(args, 0).max(0) as u64;
            std::thread::sleep(std::time::Duration::from_millis(ms));
            vec![Value::I32(0)]
        }
        #[cfg(unix)]
        super::SYS_OPEN => {
            let path = arg_str_bytes(args, 0);
            let flags = arg_int(args, 1) as libc::c_int;
            let cpath = std::ffi::CString::new(path).unwrap_or_default();
            let fd = unsafe { libc::open(cpath.as_ptr(), flags, 0o644) };
            vec![Value::I32(fd)]
        }
        #[cfg(unix)]
        super::SYS_READ => {
            let fd = arg_int(args, 0) as libc::c_int;
            let buf_addr = arg_addr(args, 1);
            let count = arg_int(args, 2).max(0) as usize;
            let n = unsafe { libc::read(fd, buf_addr as *mut libc::c_void, count) };
            vec![Value::I32(n as i32)]
        }
        #[cfg(unix)]
        super::SYS_WRITE => {
            let fd = arg_int(args, 0) as libc::c_int;
            let (buf_addr, len) = arg_buf(args, 1, 2);
            let n = unsafe { libc::write(fd, buf_addr as *const libc::c_void, len) };
            vec![Value::I32(n as i32)]
        }
        #[cfg(unix)]
        super::SYS_CLOSE => {
            let fd = arg_int(args, 0) as libc::c_int;
            let rc = unsafe { libc::close(fd) };
            vec![Value::I32(rc)]
        }
        #[cfg(unix)]
        super::SYS_ACCEPT => {
            let fd = arg_int(args, 0) as libc::c_int;
            let conn = unsafe { libc::accept(fd, std::ptr::null_mut(), std::ptr::null_mut()) };
            vec![Value::I32(conn)]
        }
        #[cfg(unix)]
        super::SYS_CONNECT => {
            let fd = arg_int(args, 0) as libc::c_int;
            let ip = arg_ipv4(args, 1);
            let port = arg_int(args, 2) as u16;
            let addr = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: port.to_be(),
                sin_addr: libc::in_addr { s_addr: u32::from_be_bytes(ip).to_be() },
                sin_zero: [0; 8],
            };
            let rc = unsafe {
                libc::connect(
                    fd,
                    &addr as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            };
            vec![Value::I32(rc)]
        }
        #[cfg(unix)]
        super::SYS_SEND => {
            let fd = arg_int(args, 0) as libc::c_int;
            let (buf_addr, len) = arg_buf(args, 1, 2);
            let n = unsafe { libc::send(fd, buf_addr as *const libc::c_void, len, 0) };
            vec![Value::I32(n as i32)]
        }
        #[cfg(unix)]
        super::SYS_RECV => {
            let fd = arg_int(args, 0) as libc::c_int;
            let buf_addr = arg_addr(args, 1);
            let count = arg_int(args, 2).max(0) as usize;
            let n = unsafe { libc::recv(fd, buf_addr as *mut libc::c_void, count, 0) };
            vec![Value::I32(n as i32)]
        }
        #[cfg(not(unix))]
        _ => vec![Value::I32(-1)],
        #[cfg(unix)]
        _ => vec![Value::I32(-1)],
    }
}

fn arg_int(args: &[Value], idx: usize) -> i64 {
    args.get(idx).and_then(Value::as_i64).unwrap_or(-1)
}

#[cfg(unix)]
fn arg_addr(args: &[Value], idx: usize) -> usize {
    match args.get(idx) {
        Some(Value::Ptr(addr)) => *addr,
        Some(Value::Str(r)) => r.addr,
        _ => 0,
    }
}

/// A buffer argument: either a `Ptr` with a separate length argument, or a
/// `Str` that already knows its own length (the length argument, if present
/// and smaller, still wins — callers may want a short write).
#[cfg(unix)]
fn arg_buf(args: &[Value], addr_idx: usize, len_idx: usize) -> (usize, usize) {
    let requested = arg_int(args, len_idx).max(0) as usize;
    match args.get(addr_idx) {
        Some(Value::Str(r)) => (r.addr, requested.min(r.len as usize)),
        Some(Value::Ptr(addr)) => (*addr, requested),
        _ => (0, 0),
    }
}

#[cfg(unix)]
fn arg_str_bytes(args: &[Value], idx: usize) -> Vec<u8> {
    match args.get(idx) {
        Some(Value::Str(r)) => unsafe { r.as_bytes() }.to_vec(),
        _ => Vec::new(),
    }
}

/// Parse a dotted-quad `ip:String` argument into big-endian octets. A
/// malformed or missing address falls back to `0.0.0.0`, which `connect`
/// will simply fail against rather than silently redirecting anywhere.
#[cfg(unix)]
fn arg_ipv4(args: &[Value], idx: usize) -> [u8; 4] {
    let bytes = arg_str_bytes(args, idx);
    let text = std::str::from_utf8(&bytes).unwrap_or("");
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in octets.iter_mut() {
        match parts.next().and_then(|p| p.parse::<u8>().ok()) {
            Some(v) => *octet = v,
            None => return [0, 0, 0, 0],
        }
    }
    if parts.next().is_some() {
        return [0, 0, 0, 0];
    }
    octets
}
