//! The `printf` (syscall id 10) format-string interpreter.
//!
//! A deliberately small printf: `%d`, `%f` (with optional `.N` precision),
//! `%s`, `%p`, plus the `\n`/`\t`/`\\` escapes. An unrecognized `%`
//! specifier is passed through literally rather than consuming an argument
//! or erroring — the same "don't choke on what you don't understand"
//! posture the disassembler takes with unknown opcodes.

use covm_bytecode::value::Value;

use crate::error::VmError;

/// Render `fmt` against `args`, consuming one argument per recognized
/// specifier in order.
pub fn format(fmt: &str, args: &[Value]) -> Result<String, VmError> {
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    let mut arg_iter = args.iter();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('n') => {
                    out.push('\n');
                    chars.next();
                }
                Some('t') => {
                    out.push('\t');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            },
            '%' => {
                let precision = read_precision(&mut chars);
                match chars.peek().copied() {
                    Some('d') => {
                        chars.next();
                        let v = next_int(&mut arg_iter)?;
                        out.push_str(&v.to_string());
                    }
                    Some('f') => {
                        chars.next();
                        let v = next_float(&mut arg_iter)?;
                        match precision {
                            Some(p) => out.push_str(&format!("{:.*}", p, v)),
                            None => out.push_str(&format!("{:.6}", v)),
                        }
                    }
                    Some('s') => {
                        chars.next();
                        let v = next_str(&mut arg_iter)?;
                        out.push_str(&v);
                    }
                    Some('p') => {
                        chars.next();
                        let v = next_ptr(&mut arg_iter)?;
                        out.push_str(&format!("{:#x}", v));
                    }
                    Some('%') => {
                        chars.next();
                        out.push('%');
                    }
                    _ => {
                        out.push('%');
                        if precision.is_some() {
                            // precision digits were consumed speculatively but the
                            // specifier turned out unrecognized; re-emit them verbatim.
                            out.push('.');
                            out.push_str(&precision.unwrap().to_string());
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

fn read_precision(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    if chars.peek() != Some(&'.') {
        return None;
    }
    chars.next();
    let mut digits = String::new();
    while let Some(d) = chars.peek() {
        if d.is_ascii_digit() {
            digits.push(*d);
            chars.next();
        } else {
            break;
        }
    }
    digits.parse().ok()
}

fn next_int<'a>(args: &mut impl Iterator<Item = &'a Value>) -> Result<i64, VmError> {
    let v = args.next().ok_or(VmError::InvalidTag { expected: "printf arg", found: "none" })?;
    v.as_i64().ok_or(VmError::InvalidTag { expected: "integer", found: v.tag_name() })
}

fn next_float<'a>(args: &mut impl Iterator<Item = &'a Value>) -> Result<f64, VmError> {
    let v = args.next().ok_or(VmError::InvalidTag { expected: "printf arg", found: "none" })?;
    v.as_f64().ok_or(VmError::InvalidTag { expected: "float", found: v.tag_name() })
}

fn next_str<'a>(args: &mut impl Iterator<Item = &'a Value>) -> Result<String, VmError> {
    let v = args.next().ok_or(VmError::InvalidTag { expected: "printf arg", found: "none" })?;
    match v {
        Value::Str(r) => Ok(String::from_utf8_lossy(unsafe { r.as_bytes() }).into_owned()),
        other => Err(VmError::InvalidTag { expected: "str", found: other.tag_name() }),
    }
}

fn next_ptr<'a>(args: &mut impl Iterator<Item = &'a Value>) -> Result<usize, VmError> {
    let v = args.next().ok_or(VmError::InvalidTag { expected: "printf arg", found: "none" })?;
    match v {
        Value::Ptr(addr) => Ok(*addr),
        other => Err(VmError::InvalidTag { expected: "ptr", found: other.tag_name() }),
    }
}
