use covm_bytecode::disassemble;
use covm_bytecode::encoder::{patch_jump, BytecodeWriter};
use covm_bytecode::opcode::Opcode;
use covm_bytecode::program::{FunctionInfo, IrProgram};
use covm_bytecode::verify::verify_program;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn emit_arithmetic_chain(depth: u32) -> Vec<u8> {
    let mut w = BytecodeWriter::new();
    w.emit_push_i32(0);
    for i in 0..depth {
        w.emit_push_i32(i as i32);
        w.emit_add();
    }
    w.emit_ret(1);
    w.into_bytes()
}

fn bench_emit_arithmetic(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit");

    for depth in [16u32, 256, 4096] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("arithmetic_chain", depth), &depth, |b, &depth| {
            b.iter(|| black_box(emit_arithmetic_chain(depth)));
        });
    }

    group.finish();
}

fn emit_loop_with_jump(iterations: u32) -> Vec<u8> {
    let mut w = BytecodeWriter::new();
    w.emit_push_i32(0);
    w.emit_store_var(0, 1);
    let loop_start = w.offset() as u32;
    w.emit_load_var(0, 1);
    w.emit_push_i32(iterations as i32);
    w.emit_lt();
    let exit = w.emit_jump(Opcode::Jz);
    w.emit_load_var(0, 1);
    w.emit_push_i32(1);
    w.emit_add();
    w.emit_store_var(0, 1);
    w.emit_jump(Opcode::Jmp);
    patch_jump(&mut w, exit, w.offset() as u32);
    w.emit_ret(0);
    let bytes = w.into_bytes();
    let _ = loop_start;
    bytes
}

fn bench_emit_control_flow(c: &mut Criterion) {
    c.bench_function("emit_loop_with_jump", |b| {
        b.iter(|| black_box(emit_loop_with_jump(black_box(1000))));
    });
}

fn sample_program() -> IrProgram {
    let mut w = BytecodeWriter::new();
    let entry = w.offset() as u32;
    w.emit_push_i32(2);
    w.emit_push_i32(3);
    w.emit_mul();
    w.emit_ret(1);

    let mut program = IrProgram::new();
    program.bytecode = w.into_bytes();
    program.functions.insert(
        "main".to_string(),
        FunctionInfo {
            entry_addr: entry,
            num_params: 0,
            num_slots: 0,
            is_variadic: false,
        },
    );
    program
}

fn bench_verify(c: &mut Criterion) {
    let program = sample_program();
    c.bench_function("verify_program", |b| {
        b.iter(|| verify_program(black_box(&program)));
    });
}

fn bench_disassemble(c: &mut Criterion) {
    let program = sample_program();
    c.bench_function("disassemble", |b| {
        b.iter(|| disassemble(black_box(&program)));
    });
}

criterion_group!(
    benches,
    bench_emit_arithmetic,
    bench_emit_control_flow,
    bench_verify,
    bench_disassemble
);
criterion_main!(benches);
