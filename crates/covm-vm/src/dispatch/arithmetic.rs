//! Integer and float arithmetic/comparison opcodes.
//!
//! Every arm here pops `b` then `a` (the right operand was pushed last) and
//! pushes `a op b`, matching the doc comments on `Opcode`. Comparisons
//! always push an `I32` 0 or 1 regardless of the operand width, per the
//! opcode table; arithmetic results take the wider of the two operand
//! widths (ordinary integer/float promotion), since the bytecode never
//! encodes a result width of its own.

use covm_bytecode::opcode::Opcode;
use covm_bytecode::value::Value;

use super::{StepCtx, StepOutcome};
use crate::error::VmError;

impl<'a> StepCtx<'a> {
    pub(super) fn exec_arithmetic(&mut self, op: Opcode) -> Result<StepOutcome, VmError> {
        use Opcode::*;
        let result = match op {
            Add | Sub | Mul | Div => {
                let b = self.coro.stack.pop()?;
                let a = self.coro.stack.pop()?;
                let (a_i, b_i) = (expect_int(a)?, expect_int(b)?);
                let raw = match op {
                    Add => a_i.wrapping_add(b_i),
                    Sub => a_i.wrapping_sub(b_i),
                    Mul => a_i.wrapping_mul(b_i),
                    Div => {
                        if b_i == 0 {
                            return Err(VmError::DivideByZero);
                        }
                        a_i.wrapping_div(b_i)
                    }
                    _ => unreachable!(),
                };
                widen_int(a, b, raw)
            }
            AddF | SubF | MulF | DivF => {
                let b = self.coro.stack.pop()?;
                let a = self.coro.stack.pop()?;
                let (a_f, b_f) = (expect_float(a)?, expect_float(b)?);
                let raw = match op {
                    AddF => a_f + b_f,
                    SubF => a_f - b_f,
                    MulF => a_f * b_f,
                    DivF => a_f / b_f,
                    _ => unreachable!(),
                };
                widen_float(a, b, raw)
            }
            Eq | Le | Lt | Gt | Ge => {
                let b = self.coro.stack.pop()?;
                let a = self.coro.stack.pop()?;
                let (a_i, b_i) = (expect_int(a)?, expect_int(b)?);
                let cond = match op {
                    Eq => a_i == b_i,
                    Le => a_i <= b_i,
                    Lt => a_i < b_i,
                    Gt => a_i > b_i,
                    Ge => a_i >= b_i,
                    _ => unreachable!(),
                };
                Value::I32(cond as i32)
            }
            EqF | LeF | LtF | GtF | GeF => {
                let b = self.coro.stack.pop()?;
                let a = self.coro.stack.pop()?;
                let (a_f, b_f) = (expect_float(a)?, expect_float(b)?);
                let cond = match op {
                    EqF => a_f == b_f,
                    LeF => a_f <= b_f,
                    LtF => a_f < b_f,
                    GtF => a_f > b_f,
                    GeF => a_f >= b_f,
                    _ => unreachable!(),
                };
                Value::I32(cond as i32)
            }
            _ => unreachable!("not an arithmetic op: {op:?}"),
        };
        self.coro.stack.push(result)?;
        Ok(StepOutcome::Continue)
    }
}

fn expect_int(v: Value) -> Result<i64, VmError> {
    v.as_i64().ok_or(VmError::InvalidTag { expected: "integer", found: v.tag_name() })
}

fn expect_float(v: Value) -> Result<f64, VmError> {
    v.as_f64().ok_or(VmError::InvalidTag { expected: "float", found: v.tag_name() })
}

fn int_rank(v: &Value) -> u8 {
    match v {
        Value::I8(_) => 0,
        Value::I16(_) => 1,
        Value::I32(_) => 2,
        Value::I64(_) => 3,
        _ => 0,
    }
}

fn widen_int(a: Value, b: Value, raw: i64) -> Value {
    if int_rank(&a) >= int_rank(&b) {
        reclothe_int(&a, raw)
    } else {
        reclothe_int(&b, raw)
    }
}

fn reclothe_int(template: &Value, raw: i64) -> Value {
    match template {
        Value::I8(_) => Value::I8(raw as i8),
        Value::I16(_) => Value::I16(raw as i16),
        Value::I32(_) => Value::I32(raw as i32),
        _ => Value::I64(raw),
    }
}

fn widen_float(a: Value, b: Value, raw: f64) -> Value {
    if matches!(a, Value::F64(_)) || matches!(b, Value::F64(_)) {
        Value::F64(raw)
    } else {
        Value::F32(raw as f32)
    }
}
