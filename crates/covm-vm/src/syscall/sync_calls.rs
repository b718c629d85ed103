//! Synchronous syscalls: `malloc`/`free`/`printf`/`socket`/`bind`/`listen`/
//! `strlen`. These run to completion on the scheduler's own thread — none of
//! them can block long enough to be worth bouncing to the I/O pool.

use std::io::Write as _;

use covm_bytecode::value::{StrRef, Value};

use super::format;
use crate::error::VmError;
use crate::heap::Heap;

/// Run a synchronous syscall, returning its result value(s).
pub fn dispatch(heap: &mut Heap, id: i64, args: &[Value]) -> Result<Vec<Value>, VmError> {
    match id {
        super::SYS_MALLOC => {
            let size = expect_int(args, 0)?;
            match heap.alloc(size.max(0) as usize) {
                Ok(addr) => Ok(vec![Value::Ptr(addr)]),
                Err(_) => Ok(vec![Value::Ptr(0)]),
            }
        }
        super::SYS_FREE => {
            let addr = expect_ptr(args, 0)?;
            match heap.free(addr) {
                Ok(()) => Ok(vec![Value::I32(0)]),
                Err(_) => Ok(vec![Value::I32(-1)]),
            }
        }
        super::SYS_PRINTF => {
            let fmt = expect_str_bytes(args, 0)?;
            let fmt = String::from_utf8_lossy(&fmt).into_owned();
            let rendered = format::format(&fmt, &args[1..])?;
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(rendered.as_bytes());
            let _ = stdout.flush();
            Ok(vec![Value::I32(rendered.len() as i32)])
        }
        super::SYS_STRLEN => {
            let s = expect_str(args, 0)?;
            Ok(vec![Value::I32(s.len as i32)])
        }
        super::SYS_SOCKET | super::SYS_BIND | super::SYS_LISTEN => host_socket_call(id, args),
        other => Err(VmError::InvalidTag { expected: "sync syscall id", found: int_name(other) }),
    }
}

#[cfg(unix)]
fn host_socket_call(id: i64, args: &[Value]) -> Result<Vec<Value>, VmError> {
    match id {
        super::SYS_SOCKET => {
            let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
            Ok(vec![Value::I32(fd)])
        }
        super::SYS_BIND => {
            let fd = expect_int(args, 0)? as i32;
            let port = expect_int(args, 1)? as u16;
            let addr = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: port.to_be(),
                sin_addr: libc::in_addr { s_addr: 0 },
                sin_zero: [0; 8],
            };
            let rc = unsafe {
                libc::bind(
                    fd,
                    &addr as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            };
            Ok(vec![Value::I32(rc)])
        }
        super::SYS_LISTEN => {
            let fd = expect_int(args, 0)? as i32;
            let backlog = expect_int(args, 1)? as i32;
            let rc = unsafe { libc::listen(fd, backlog) };
            Ok(vec![Value::I32(rc)])
        }
        _ => unreachable!(),
    }
}

#[cfg(not(unix))]
fn host_socket_call(_id: i64, _args: &[Value]) -> Result<Vec<Value>, VmError> {
    Ok(vec![Value::I32(-1)])
}

fn expect_int(args: &[Value], idx: usize) -> Result<i64, VmError> {
    let v = args.get(idx).ok_or(VmError::InvalidTag { expected: "syscall arg", found: "missing" })?;
    v.as_i64().ok_or(VmError::InvalidTag { expected: "integer", found: v.tag_name() })
}

fn expect_ptr(args: &[Value], idx: usize) -> Result<usize, VmError> {
    match args.get(idx) {
        Some(Value::Ptr(addr)) => Ok(*addr),
        Some(other) => Err(VmError::InvalidTag { expected: "ptr", found: other.tag_name() }),
        None => Err(VmError::InvalidTag { expected: "ptr", found: "missing" }),
    }
}

fn expect_str(args: &[Value], idx: usize) -> Result<StrRef, VmError> {
    match args.get(idx) {
        Some(Value::Str(r)) => Ok(*r),
        Some(other) => Err(VmError::InvalidTag { expected: "str", found: other.tag_name() }),
        None => Err(VmError::InvalidTag { expected: "str", found: "missing" }),
    }
}

fn expect_str_bytes(args: &[Value], idx: usize) -> Result<Vec<u8>, VmError> {
    let r = expect_str(args, idx)?;
    Ok(unsafe { r.as_bytes() }.to_vec())
}

fn int_name(_: i64) -> &'static str {
    "unrecognized"
}
