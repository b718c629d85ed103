//! Human-readable bytecode disassembly.

use std::fmt::Write as _;

use rustc_hash::FxHashMap;

use crate::opcode::Opcode;
use crate::program::IrProgram;

/// Render a full disassembly of `program`: a header, the function summary
/// table (sorted by descending entry address, matching declaration-adjacent
/// functions being emitted last-to-first under the generator's layout), and
/// a linear instruction listing with function-entry banners.
pub fn disassemble(program: &IrProgram) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bytecode Size: {} bytes", program.bytecode.len());
    let _ = writeln!(out, "String Pool Size: {} entries", program.string_pool.len());
    let _ = writeln!(out, "Functions:");

    let mut funcs: Vec<_> = program.functions.iter().collect();
    funcs.sort_by(|a, b| b.1.entry_addr.cmp(&a.1.entry_addr));
    for (name, info) in &funcs {
        let _ = writeln!(
            out,
            "  {:<20} @ {:<10} (Params: {:<2}, Slots: {:<2})",
            name, info.entry_addr, info.num_params, info.num_slots
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Bytecode Disassembly:");

    let addr_to_func: FxHashMap<u32, &str> = program
        .functions
        .iter()
        .map(|(name, info)| (info.entry_addr, name.as_str()))
        .collect();

    let code = &program.bytecode;
    let mut ip: usize = 0;
    while ip < code.len() {
        let addr = ip as u32;

        if let Some(name) = addr_to_func.get(&addr) {
            let info = &program.functions[*name];
            let _ = writeln!(
                out,
                "\n<function: {}> (params: {}, slots: {})",
                name, info.num_params, info.num_slots
            );
        }

        let op_byte = code[ip];
        ip += 1;
        let op = match Opcode::from_u8(op_byte) {
            Some(op) => op,
            None => {
                let _ = writeln!(out, "{:>4}: <invalid opcode 0x{:02x}>", addr, op_byte);
                continue;
            }
        };

        let _ = write!(out, "{:>4}: {:<20}", addr, format!("{:?}", op));
        render_operands(&mut out, op, code, &mut ip, program, &addr_to_func);
        let _ = writeln!(out);
    }

    out
}

fn render_operands(
    out: &mut String,
    op: Opcode,
    code: &[u8],
    ip: &mut usize,
    program: &IrProgram,
    addr_to_func: &FxHashMap<u32, &str>,
) {
    match op {
        Opcode::PushI64 => {
            let val = read_i64(code, ip);
            let _ = write!(out, "{}", val);
        }
        Opcode::PushI32 => {
            let val = read_i32(code, ip);
            let _ = write!(out, "{}", val);
        }
        Opcode::PushI16 => {
            let val = read_i16(code, ip);
            let _ = write!(out, "{}", val);
        }
        Opcode::PushI8 => {
            let val = code[*ip] as i8;
            *ip += 1;
            let _ = write!(out, "{}", val);
        }
        Opcode::PushF64 => {
            let val = read_f64(code, ip);
            let _ = write!(out, "{}", val);
        }
        Opcode::PushF32 => {
            let val = read_f32(code, ip);
            let _ = write!(out, "{}", val);
        }
        Opcode::PushStr => {
            let id = read_u32(code, ip);
            print_literal(out, &program.string_pool[id as usize]);
        }
        Opcode::ArrAlloc => {
            let slots = read_u32(code, ip);
            let _ = write!(out, "slots {}", slots);
        }
        Opcode::LoadVar | Opcode::StoreVar => {
            let slot = read_u16(code, ip);
            let size = code[*ip];
            *ip += 1;
            let _ = write!(out, "slot {} size {}", slot, size);
        }
        Opcode::LoadGlobal | Opcode::StoreGlobal => {
            let slot = read_u16(code, ip);
            let size = code[*ip];
            *ip += 1;
            let _ = write!(out, "global_slot {} size {}", slot, size);
        }
        Opcode::LeaStack => {
            let slot = read_u16(code, ip);
            let _ = write!(out, "slot {}", slot);
        }
        Opcode::LeaGlobal => {
            let slot = read_u16(code, ip);
            let _ = write!(out, "global_slot {}", slot);
        }
        Opcode::LoadPtrOffset | Opcode::StorePtrOffset => {
            let offset = read_u32(code, ip);
            let size = code[*ip];
            *ip += 1;
            let _ = write!(out, "offset {} size {}", offset, size);
        }
        Opcode::Syscall => {
            let num_args = code[*ip];
            *ip += 1;
            write_arg_count(out, num_args);
        }
        Opcode::Ret => {
            let size = code[*ip];
            *ip += 1;
            let _ = write!(out, "size {}", size);
        }
        Opcode::Call | Opcode::Spawn => {
            let target = read_u32(code, ip);
            let num_args = code[*ip];
            *ip += 1;
            let _ = write!(out, "addr {} args ", target);
            write_arg_count(out, num_args);
            if let Some(name) = addr_to_func.get(&target) {
                let _ = write!(out, " <{}>", name);
            }
        }
        Opcode::Jmp | Opcode::Jz => {
            let target = read_u32(code, ip);
            let _ = write!(out, "addr {}", target);
        }
        Opcode::Pop
        | Opcode::StrGet
        | Opcode::StrSet
        | Opcode::Yield
        | Opcode::Await
        | Opcode::PushVarargs
        | Opcode::Halt
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Div
        | Opcode::AddF
        | Opcode::SubF
        | Opcode::MulF
        | Opcode::DivF
        | Opcode::Eq
        | Opcode::Le
        | Opcode::Lt
        | Opcode::Gt
        | Opcode::Ge
        | Opcode::EqF
        | Opcode::LeF
        | Opcode::LtF
        | Opcode::GtF
        | Opcode::GeF => {}
    }
}

fn write_arg_count(out: &mut String, num_args: u8) {
    if num_args & 0x80 != 0 {
        let _ = write!(out, "{} (variadic)", num_args & 0x7F);
    } else {
        let _ = write!(out, "{}", num_args);
    }
}

fn print_literal(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('"');
}

fn read_u16(code: &[u8], ip: &mut usize) -> u16 {
    let v = u16::from_le_bytes(code[*ip..*ip + 2].try_into().unwrap());
    *ip += 2;
    v
}

fn read_u32(code: &[u8], ip: &mut usize) -> u32 {
    let v = u32::from_le_bytes(code[*ip..*ip + 4].try_into().unwrap());
    *ip += 4;
    v
}

fn read_i16(code: &[u8], ip: &mut usize) -> i16 {
    let v = i16::from_le_bytes(code[*ip..*ip + 2].try_into().unwrap());
    *ip += 2;
    v
}

fn read_i32(code: &[u8], ip: &mut usize) -> i32 {
    let v = i32::from_le_bytes(code[*ip..*ip + 4].try_into().unwrap());
    *ip += 4;
    v
}

fn read_i64(code: &[u8], ip: &mut usize) -> i64 {
    let v = i64::from_le_bytes(code[*ip..*ip + 8].try_into().unwrap());
    *ip += 8;
    v
}

fn read_f32(code: &[u8], ip: &mut usize) -> f32 {
    let v = f32::from_le_bytes(code[*ip..*ip + 4].try_into().unwrap());
    *ip += 4;
    v
}

fn read_f64(code: &[u8], ip: &mut usize) -> f64 {
    let v = f64::from_le_bytes(code[*ip..*ip + 8].try_into().unwrap());
    *ip += 8;
    v
}
