//! Source-to-result scenarios: hand-built typed ASTs compiled by
//! `covm-compiler` and executed by this crate's scheduler, checked against
//! the result a source program with that shape is expected to produce.
//!
//! There's no lexer/parser in this workspace to turn source text into these
//! ASTs, so each case builds the tree node-by-node the way a type checker
//! would hand it to the generator.

use covm_bytecode::value::Value;
use covm_bytecode::verify::verify_program;
use covm_compiler::ast::{
    BinaryOp, Block, DataType, Expression, FieldDecl, Function, GlobalDecl, Param, Program,
    Statement, StructDeclaration,
};
use covm_compiler::generate;

fn int(v: i64) -> Expression {
    Expression::IntegerLiteral { value: v, ty: DataType::I32 }
}

fn var(name: &str, ty: DataType) -> Expression {
    Expression::Variable { name: name.to_string(), ty }
}

fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary { op, left: Box::new(left), right: Box::new(right), ty: DataType::I32 }
}

fn run_to_completion(program: &Program) -> Vec<Value> {
    let ir = generate(program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
    covm_vm::run(ir).expect("the program should run to completion")
}

fn main_only(body: Block) -> Program {
    Program {
        structs: vec![],
        globals: vec![],
        functions: vec![Function {
            name: "main".into(),
            struct_name: None,
            params: vec![],
            return_type: DataType::I32,
            body,
            is_variadic: false,
        }],
    }
}

/// Scenario 1 (spec §8): `int main(){ return 2+3*4; }` ⇒ `14`.
#[test]
fn arithmetic_precedence_evaluates_to_fourteen() {
    let program = main_only(Block {
        statements: vec![Statement::Return(bin(
            BinaryOp::Add,
            int(2),
            bin(BinaryOp::Mul, int(3), int(4)),
        ))],
    });

    let result = run_to_completion(&program);
    assert_eq!(result, vec![Value::I32(14)]);
}

/// Scenario 2: `int main(){ int s=0; for(int i=0;i<10;i++) s=s+i; return s; }`
/// ⇒ `45`.
#[test]
fn for_loop_accumulates_triangular_number() {
    let program = main_only(Block {
        statements: vec![
            Statement::VariableDeclaration { name: "s".into(), ty: DataType::I32, init: Some(int(0)) },
            Statement::For {
                init: Some(Box::new(Statement::VariableDeclaration {
                    name: "i".into(),
                    ty: DataType::I32,
                    init: Some(int(0)),
                })),
                condition: Some(bin(BinaryOp::Lt, var("i", DataType::I32), int(10))),
                increment: Some(Expression::Assignment {
                    lvalue: Box::new(var("i", DataType::I32)),
                    value: Box::new(bin(BinaryOp::Add, var("i", DataType::I32), int(1))),
                }),
                body: Block {
                    statements: vec![Statement::Expression(Expression::Assignment {
                        lvalue: Box::new(var("s", DataType::I32)),
                        value: Box::new(bin(BinaryOp::Add, var("s", DataType::I32), var("i", DataType::I32))),
                    })],
                },
            },
            Statement::Return(var("s", DataType::I32)),
        ],
    });

    let result = run_to_completion(&program);
    assert_eq!(result, vec![Value::I32(45)]);
}

/// Scenario 3: recursive `fact(5)` ⇒ `120`, exercising `CALL`/`RET` frame
/// push/pop across five nested activations of the same function.
#[test]
fn recursive_factorial_of_five_is_120() {
    let n_ty = DataType::I32;
    let fact = Function {
        name: "fact".into(),
        struct_name: None,
        params: vec![Param { name: "n".into(), ty: n_ty.clone() }],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                Statement::If {
                    condition: bin(BinaryOp::Le, var("n", n_ty.clone()), int(1)),
                    then_branch: Block { statements: vec![Statement::Return(int(1))] },
                    else_branch: None,
                },
                Statement::Return(bin(
                    BinaryOp::Mul,
                    var("n", n_ty.clone()),
                    Expression::Call {
                        name: "fact".into(),
                        object: None,
                        args: vec![bin(BinaryOp::Sub, var("n", n_ty.clone()), int(1))],
                        ty: DataType::I32,
                    },
                )),
            ],
        },
        is_variadic: false,
    };
    let main = Function {
        name: "main".into(),
        struct_name: None,
        params: vec![],
        return_type: DataType::I32,
        body: Block {
            statements: vec![Statement::Return(Expression::Call {
                name: "fact".into(),
                object: None,
                args: vec![int(5)],
                ty: DataType::I32,
            })],
        },
        is_variadic: false,
    };
    let program = Program { structs: vec![], globals: vec![], functions: vec![fact, main] };

    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
    // `n` plus one temporary for the recursive call's intermediate result is
    // the minimum a correct frame needs.
    assert!(ir.functions["fact"].num_slots >= 1);

    let result = covm_vm::run(ir).expect("the program should run to completion");
    assert_eq!(result, vec![Value::I32(120)]);
}

/// Scenario 4: three coroutines each computing `i*i` for `i` in `{2,3,4}`,
/// awaited in spawn order by `main`. Sum is `4+9+16 = 29`.
#[test]
fn spawned_coroutines_sum_to_twenty_nine() {
    let n_ty = DataType::I32;
    let square = Function {
        name: "square".into(),
        struct_name: None,
        params: vec![Param { name: "n".into(), ty: n_ty.clone() }],
        return_type: DataType::I32,
        body: Block {
            statements: vec![Statement::Return(bin(
                BinaryOp::Mul,
                var("n", n_ty.clone()),
                var("n", n_ty),
            ))],
        },
        is_variadic: false,
    };

    fn spawn_call(arg: i64) -> Expression {
        Expression::Spawn(Box::new(Expression::Call {
            name: "square".into(),
            object: None,
            args: vec![int(arg)],
            ty: DataType::I32,
        }))
    }

    let main = Function {
        name: "main".into(),
        struct_name: None,
        params: vec![],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                Statement::VariableDeclaration { name: "a".into(), ty: DataType::I32, init: Some(spawn_call(2)) },
                Statement::VariableDeclaration { name: "b".into(), ty: DataType::I32, init: Some(spawn_call(3)) },
                Statement::VariableDeclaration { name: "c".into(), ty: DataType::I32, init: Some(spawn_call(4)) },
                Statement::VariableDeclaration {
                    name: "ra".into(),
                    ty: DataType::I32,
                    init: Some(Expression::Await(Box::new(var("a", DataType::I32)))),
                },
                Statement::VariableDeclaration {
                    name: "rb".into(),
                    ty: DataType::I32,
                    init: Some(Expression::Await(Box::new(var("b", DataType::I32)))),
                },
                Statement::VariableDeclaration {
                    name: "rc".into(),
                    ty: DataType::I32,
                    init: Some(Expression::Await(Box::new(var("c", DataType::I32)))),
                },
                Statement::Return(bin(
                    BinaryOp::Add,
                    bin(BinaryOp::Add, var("ra", DataType::I32), var("rb", DataType::I32)),
                    var("rc", DataType::I32),
                )),
            ],
        },
        is_variadic: false,
    };
    let program = Program { structs: vec![], globals: vec![], functions: vec![square, main] };

    let result = run_to_completion(&program);
    assert_eq!(result, vec![Value::I32(29)]);
}

/// Scenario 6: a global `Point`, swapped through a pointer by a method —
/// exercises the L-value resolver's Stack→Heap transition (`p.swap()` LEAs
/// the global receiver; the method's `self.x`/`self.y` go through
/// `LOAD_PTR_OFFSET`/`STORE_PTR_OFFSET`).
#[test]
fn struct_field_swap_through_a_pointer_receiver() {
    let point = StructDeclaration {
        name: "Point".into(),
        fields: vec![
            FieldDecl { name: "x".into(), ty: DataType::I32 },
            FieldDecl { name: "y".into(), ty: DataType::I32 },
        ],
    };
    let self_ty = DataType::Ptr(Box::new(DataType::Struct("Point".into())));
    let self_x = Expression::MemberAccess {
        object: Box::new(var("self", self_ty.clone())),
        member: "x".into(),
        ty: DataType::I32,
    };
    let self_y = Expression::MemberAccess {
        object: Box::new(var("self", self_ty.clone())),
        member: "y".into(),
        ty: DataType::I32,
    };
    let swap = Function {
        name: "swap".into(),
        struct_name: Some("Point".into()),
        params: vec![Param { name: "self".into(), ty: self_ty }],
        return_type: DataType::Void,
        body: Block {
            statements: vec![
                Statement::VariableDeclaration { name: "tmp".into(), ty: DataType::I32, init: Some(self_x.clone()) },
                Statement::Expression(Expression::Assignment {
                    lvalue: Box::new(self_x.clone()),
                    value: Box::new(self_y.clone()),
                }),
                Statement::Expression(Expression::Assignment {
                    lvalue: Box::new(self_y),
                    value: Box::new(var("tmp", DataType::I32)),
                }),
            ],
        },
        is_variadic: false,
    };

    let point_ty = DataType::Struct("Point".into());
    let p_x = Expression::MemberAccess {
        object: Box::new(var("p", point_ty.clone())),
        member: "x".into(),
        ty: DataType::I32,
    };
    let p_y = Expression::MemberAccess {
        object: Box::new(var("p", point_ty.clone())),
        member: "y".into(),
        ty: DataType::I32,
    };
    let main = Function {
        name: "main".into(),
        struct_name: None,
        params: vec![],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                Statement::Expression(Expression::Assignment { lvalue: Box::new(p_x.clone()), value: Box::new(int(10)) }),
                Statement::Expression(Expression::Assignment { lvalue: Box::new(p_y.clone()), value: Box::new(int(20)) }),
                Statement::Expression(Expression::Call {
                    name: "swap".into(),
                    object: Some(Box::new(var("p", point_ty))),
                    args: vec![],
                    ty: DataType::Void,
                }),
                Statement::Return(bin(BinaryOp::Add, bin(BinaryOp::Mul, p_x, int(100)), p_y)),
            ],
        },
        is_variadic: false,
    };

    let program = Program {
        structs: vec![point],
        globals: vec![GlobalDecl { name: "p".into(), ty: DataType::Struct("Point".into()), init: None }],
        functions: vec![swap, main],
    };

    let ir = generate(&program).expect("generation should succeed");
    assert!(ir.functions.contains_key("Point::swap"), "method should be registered under its mangled name");
    verify_program(&ir).expect("generated bytecode should verify");

    let result = covm_vm::run(ir).expect("the program should run to completion");
    // original x=10, y=20; after the swap, x==20 and y==10.
    assert_eq!(result, vec![Value::I32(2010)]);
}

/// Scenario 5 (spec §8): two coroutines each do
/// `syscall(write, fd, "A"|"B", 1); syscall(sleep, 10); syscall(write, fd, "A"|"B", 1)`.
/// A coroutine's own two writes must stay in its own program order, even
/// though the two coroutines interleave across the shared pipe — so the
/// four-byte result may read `AABB` or `ABAB` but never `ABBA`/`BAAB`.
#[cfg(unix)]
#[test]
fn async_io_preserves_per_coroutine_write_order() {
    use covm_compiler::ast::Statement as S;

    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "failed to create the test pipe");
    let (read_fd, write_fd) = (fds[0], fds[1]);

    fn syscall(id: i64, args: Vec<Expression>) -> Expression {
        let mut all = vec![int(id)];
        all.extend(args);
        Expression::Call { name: "syscall".into(), object: None, args: all, ty: DataType::I32 }
    }

    // Both spawned coroutines run this exact body: write "A", sleep 10ms,
    // write "B". Per spec §8 scenario 5, a single coroutine's own two
    // writes must never cross — only `AABB`/`ABAB` are legal four-byte
    // outcomes, never `ABBA`/`BAAB`.
    let fd = var("fd", DataType::I32);
    let writer = Function {
        name: "writer".into(),
        struct_name: None,
        params: vec![Param { name: "fd".into(), ty: DataType::I32 }],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                S::Expression(syscall(2, vec![fd.clone(), Expression::StringLiteral("A".into()), int(1)])),
                S::Expression(syscall(4, vec![int(10)])),
                S::Expression(syscall(2, vec![fd, Expression::StringLiteral("B".into()), int(1)])),
                S::Return(int(0)),
            ],
        },
        is_variadic: false,
    };

    fn spawn_writer(fd: i64) -> Expression {
        Expression::Spawn(Box::new(Expression::Call {
            name: "writer".into(),
            object: None,
            args: vec![int(fd)],
            ty: DataType::I32,
        }))
    }

    let main = Function {
        name: "main".into(),
        struct_name: None,
        params: vec![],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                S::VariableDeclaration {
                    name: "a".into(),
                    ty: DataType::I32,
                    init: Some(spawn_writer(write_fd as i64)),
                },
                S::VariableDeclaration {
                    name: "b".into(),
                    ty: DataType::I32,
                    init: Some(spawn_writer(write_fd as i64)),
                },
                S::Expression(Expression::Await(Box::new(var("a", DataType::I32)))),
                S::Expression(Expression::Await(Box::new(var("b", DataType::I32)))),
                S::Return(int(0)),
            ],
        },
        is_variadic: false,
    };
    let program = Program { structs: vec![], globals: vec![], functions: vec![writer, main] };

    let result = run_to_completion(&program);
    assert_eq!(result, vec![Value::I32(0)]);

    unsafe { libc::close(write_fd) };
    let mut buf = [0u8; 4];
    let mut read_total = 0usize;
    while read_total < buf.len() {
        let n = unsafe {
            libc::read(read_fd, buf[read_total..].as_mut_ptr() as *mut libc::c_void, buf.len() - read_total)
        };
        assert!(n > 0, "expected four bytes total from the two writers");
        read_total += n as usize;
    }
    unsafe { libc::close(read_fd) };

    let output = std::str::from_utf8(&buf).unwrap().to_string();
    assert!(
        output == "AABB" || output == "ABAB",
        "per-coroutine write order was violated (saw {output:?}, e.g. ABBA/BAAB)"
    );
}

/// A local `[i32; 5]` is a single `ARR_ALLOC`'d heap handle, not five
/// inline slots: declaring it, indexing into it to store, reading it back
/// through `arr[i]++`, and summing two elements all have to agree on where
/// that handle lives and how far apart its elements are.
#[test]
fn local_array_index_store_load_and_increment_round_trip() {
    let arr_ty = DataType::Array { inner: Box::new(DataType::I32), len: 5 };

    let index = |i: i64| Expression::Index {
        object: Box::new(var("arr", arr_ty.clone())),
        index: Box::new(int(i)),
        ty: DataType::I32,
    };

    let program = main_only(Block {
        statements: vec![
            Statement::VariableDeclaration { name: "arr".into(), ty: arr_ty.clone(), init: None },
            Statement::Expression(Expression::Assignment {
                lvalue: Box::new(index(2)),
                value: Box::new(int(40)),
            }),
            Statement::Expression(Expression::Assignment {
                lvalue: Box::new(index(3)),
                value: Box::new(int(1)),
            }),
            Statement::Expression(Expression::Increment(Box::new(index(3)))),
            Statement::Return(bin(BinaryOp::Add, index(2), index(3))),
        ],
    });

    let result = run_to_completion(&program);
    assert_eq!(result, vec![Value::I32(42)]);
}
