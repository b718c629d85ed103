//! End-to-end generation tests: hand-built typed ASTs in, a verifiable
//! `IrProgram` out. There's no front end in this crate to parse source text,
//! so each case constructs the AST node-by-node the way a checker would hand
//! it off.

use covm_bytecode::verify::verify_program;
use covm_compiler::ast::{
    BinaryOp, Block, DataType, Expression, FieldDecl, Function, GlobalDecl, Param, Program,
    Statement, StructDeclaration,
};
use covm_compiler::generate;

fn int(v: i64) -> Expression {
    Expression::IntegerLiteral { value: v, ty: DataType::I32 }
}

fn var(name: &str) -> Expression {
    Expression::Variable { name: name.to_string(), ty: DataType::I32 }
}

fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary { op, left: Box::new(left), right: Box::new(right), ty: DataType::I32 }
}

#[test]
fn arithmetic_expression_produces_a_verifiable_program() {
    // return (2 + 3) * 4;
    let body = Block {
        statements: vec![Statement::Return(bin(
            BinaryOp::Mul,
            bin(BinaryOp::Add, int(2), int(3)),
            int(4),
        ))],
    };
    let program = Program {
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
    };

    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
    assert_eq!(ir.functions["main"].num_params, 0);
}

#[test]
fn for_loop_with_break_condition_jumps_backward_to_its_own_start() {
    // for (let i = 0; i < 10; i = i + 1) { }
    // return i;
    let body = Block {
        statements: vec![
            Statement::For {
                init: Some(Box::new(Statement::VariableDeclaration {
                    name: "i".into(),
                    ty: DataType::I32,
                    init: Some(int(0)),
                })),
                condition: Some(bin(BinaryOp::Lt, var("i"), int(10))),
                increment: Some(Expression::Assignment {
                    lvalue: Box::new(var("i")),
                    value: Box::new(bin(BinaryOp::Add, var("i"), int(1))),
                }),
                body: Block { statements: vec![] },
            },
            Statement::Return(var("i")),
        ],
    };
    let program = Program {
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
    };

    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");

    // A JMP whose target precedes its own address is the backward loop edge.
    let has_backward_jump = ir.bytecode.iter().enumerate().any(|(addr, &byte)| {
        if byte != covm_bytecode::opcode::Opcode::Jmp.to_u8() {
            return false;
        }
        let target_bytes: [u8; 4] = match ir.bytecode.get(addr + 1..addr + 5) {
            Some(slice) => slice.try_into().unwrap(),
            None => return false,
        };
        u32::from_le_bytes(target_bytes) < addr as u32
    });
    assert!(has_backward_jump, "for loop should emit a backward JMP to its condition check");
}

#[test]
fn mutual_recursion_patches_both_call_targets_after_both_functions_are_emitted() {
    // fn is_even(n: i32) -> i32 { if (n == 0) { return 1; } return is_odd(n - 1); }
    // fn is_odd(n: i32) -> i32 { if (n == 0) { return 0; } return is_even(n - 1); }
    fn make(name: &str, other: &str) -> Function {
        let body = Block {
            statements: vec![
                Statement::If {
                    condition: bin(BinaryOp::Eq, var("n"), int(0)),
                    then_branch: Block {
                        statements: vec![Statement::Return(int(if name == "is_even" { 1 } else { 0 }))],
                    },
                    else_branch: None,
                },
                Statement::Return(Expression::Call {
                    name: other.to_string(),
                    object: None,
                    args: vec![bin(BinaryOp::Sub, var("n"), int(1))],
                    ty: DataType::I32,
                }),
            ],
        };
        Function {
            name: name.into(),
            struct_name: None,
            params: vec![Param { name: "n".into(), ty: DataType::I32 }],
            return_type: DataType::I32,
            body,
            is_variadic: false,
        }
    }

    let program = Program {
        structs: vec![],
        globals: vec![],
        functions: vec![make("is_even", "is_odd"), make("is_odd", "is_even")],
    };

    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
    assert_eq!(ir.functions.len(), 2);
}

#[test]
fn struct_field_swap_through_a_pointer_verifies() {
    let point = StructDeclaration {
        name: "Point".into(),
        fields: vec![
            FieldDecl { name: "x".into(), ty: DataType::I32 },
            FieldDecl { name: "y".into(), ty: DataType::I32 },
        ],
    };
    let ptr_ty = DataType::Ptr(Box::new(DataType::Struct("Point".into())));
    let p_x = Expression::MemberAccess {
        object: Box::new(Expression::Variable { name: "p".into(), ty: ptr_ty.clone() }),
        member: "x".into(),
        ty: DataType::I32,
    };
    let p_y = Expression::MemberAccess {
        object: Box::new(Expression::Variable { name: "p".into(), ty: ptr_ty.clone() }),
        member: "y".into(),
        ty: DataType::I32,
    };
    let body = Block {
        statements: vec![
            Statement::VariableDeclaration { name: "tmp".into(), ty: DataType::I32, init: Some(p_x.clone()) },
            Statement::Expression(Expression::Assignment {
                lvalue: Box::new(p_x.clone()),
                value: Box::new(p_y.clone()),
            }),
            Statement::Expression(Expression::Assignment {
                lvalue: Box::new(p_y),
                value: Box::new(var("tmp")),
            }),
            Statement::Return(int(0)),
        ],
    };
    let program = Program {
        structs: vec![point],
        globals: vec![],
        functions: vec![Function {
            name: "swap".into(),
            struct_name: None,
            params: vec![Param { name: "p".into(), ty: ptr_ty }],
            return_type: DataType::I32,
            body,
            is_variadic: false,
        }],
    };

    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
}

#[test]
fn global_initializer_must_be_a_compile_time_constant() {
    let program = Program {
        structs: vec![],
        globals: vec![GlobalDecl {
            name: "bad".into(),
            ty: DataType::I32,
            init: Some(Expression::Call {
                name: "compute".into(),
                object: None,
                args: vec![],
                ty: DataType::I32,
            }),
        }],
        functions: vec![Function {
            name: "compute".into(),
            struct_name: None,
            params: vec![],
            return_type: DataType::I32,
            body: Block { statements: vec![Statement::Return(int(0))] },
            is_variadic: false,
        }],
    };

    let err = generate(&program).expect_err("non-literal global initializer should be rejected");
    assert!(matches!(err, covm_compiler::CompileError::UnsupportedFeature { .. }));
}

#[test]
fn method_call_leas_the_receiver_rather_than_loading_it_by_value() {
    let counter = StructDeclaration {
        name: "Counter".into(),
        fields: vec![FieldDecl { name: "count".into(), ty: DataType::I32 }],
    };
    let self_ty = DataType::Ptr(Box::new(DataType::Struct("Counter".into())));
    let bump = Function {
        name: "bump".into(),
        struct_name: Some("Counter".into()),
        params: vec![Param { name: "self".into(), ty: self_ty.clone() }],
        return_type: DataType::Void,
        body: Block {
            statements: vec![Statement::Expression(Expression::Assignment {
                lvalue: Box::new(Expression::MemberAccess {
                    object: Box::new(Expression::Variable { name: "self".into(), ty: self_ty.clone() }),
                    member: "count".into(),
                    ty: DataType::I32,
                }),
                value: Box::new(bin(
                    BinaryOp::Add,
                    Expression::MemberAccess {
                        object: Box::new(Expression::Variable { name: "self".into(), ty: self_ty.clone() }),
                        member: "count".into(),
                        ty: DataType::I32,
                    },
                    int(1),
                )),
            })],
        },
        is_variadic: false,
    };
    let caller = Function {
        name: "main".into(),
        struct_name: None,
        params: vec![Param { name: "c".into(), ty: DataType::Struct("Counter".into()) }],
        return_type: DataType::I32,
        body: Block {
            statements: vec![
                Statement::Expression(Expression::Call {
                    name: "bump".into(),
                    object: Some(Box::new(Expression::Variable {
                        name: "c".into(),
                        ty: DataType::Struct("Counter".into()),
                    })),
                    args: vec![],
                    ty: DataType::Void,
                }),
                Statement::Return(int(0)),
            ],
        },
        is_variadic: false,
    };

    let program = Program { structs: vec![counter], globals: vec![], functions: vec![bump, caller] };
    let ir = generate(&program).expect("generation should succeed");
    verify_program(&ir).expect("generated bytecode should verify");
    assert!(ir.functions.contains_key("Counter::bump"));

    let main_info = ir.functions["main"];
    let main_end = ir.functions.values().map(|f| f.entry_addr).filter(|&a| a > main_info.entry_addr).min();
    let main_slice = match main_end {
        Some(end) => &ir.bytecode[main_info.entry_addr as usize..end as usize],
        None => &ir.bytecode[main_info.entry_addr as usize..],
    };
    assert!(
        main_slice.iter().any(|&b| b == covm_bytecode::opcode::Opcode::LeaStack.to_u8()),
        "method call on a by-value receiver should take its address, not copy it"
    );
}
