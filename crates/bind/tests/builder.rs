use insta::assert_snapshot;
use quill_bind::{
    AsValue, Builder, Context, Error, ErrorKind, FunctionType, InsertPoint, Opcode, StructType,
    Type, Value, ValueKind,
};

fn binary_function(ctx: &Context) -> (quill_bind::Module, quill_bind::Function) {
    let module = ctx.create_module("demo");
    let i32_ty = ctx.int32_type();
    let fn_ty = FunctionType::get(&i32_ty, &[i32_ty.clone(), i32_ty.clone()], false).unwrap();
    let func = module.create_function("add", &fn_ty).unwrap();
    (module, func)
}

#[test]
fn emission_requires_an_insertion_point() {
    let ctx = Context::new();
    let (_module, func) = binary_function(&ctx);
    let a = func.argument(0).unwrap();

    let mut builder = Builder::new(&ctx);
    assert_eq!(builder.insert_point(), &InsertPoint::Unpositioned);
    assert!(builder.insert_block().is_none());

    let err = builder.create_add(&a, &a, "").unwrap_err();
    assert_eq!(err, Error::Unpositioned);
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(builder.create_ret_void().unwrap_err(), Error::Unpositioned);

    let entry = func.create_basic_block("entry").unwrap();
    builder.set_insert_point(&entry).unwrap();
    assert_eq!(builder.insert_block(), Some(entry.clone()));

    builder.clear_insert_point();
    assert!(builder.insert_block().is_none());
}

#[test]
fn terminators_keep_the_cursor() {
    let ctx = Context::new();
    let (_module, func) = binary_function(&ctx);
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    let ret = builder.create_ret(&func.argument(0).unwrap()).unwrap();
    assert_eq!(ret.kind(), ValueKind::Instruction);
    assert_eq!(builder.insert_block(), Some(entry.clone()));

    // Emitting past a terminator is allowed; verification rejects it.
    builder.create_ret_void().unwrap();
    assert_eq!(entry.instructions().unwrap().len(), 2);
}

#[test]
fn add_and_ret() {
    let ctx = Context::new();
    let (module, func) = binary_function(&ctx);
    let a = func.argument(0).unwrap();
    let b = func.argument(1).unwrap();
    assert_eq!(a.set_name("a").unwrap(), "a");
    assert_eq!(b.set_name("b").unwrap(), "b");

    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    let sum = builder.create_add(&a, &b, "sum").unwrap();
    builder.create_ret(&sum).unwrap();

    assert_eq!(sum.name().unwrap(), "sum");
    assert_eq!(sum.ty().unwrap(), ctx.int32_type());
    let inst = sum.as_instruction().unwrap();
    assert_eq!(inst.opcode().unwrap(), Opcode::Add);
    assert_eq!(inst.parent().unwrap(), entry);
    assert!(!inst.is_terminator().unwrap());
    assert!(entry.terminator().unwrap().is_some());

    assert_snapshot!(module.dump(), @r###"
    ; ModuleID = 'demo'
    source_filename = "demo"

    define i32 @add(i32 %a, i32 %b) {
    entry:
      %sum = add i32 %a, %b
      ret i32 %sum
    }
    "###);
}

#[test]
fn operand_types_are_checked_before_emission() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let (i32_ty, i64_ty) = (ctx.int32_type(), ctx.int64_type());
    let fn_ty = FunctionType::get(&ctx.void_type(), &[i32_ty.clone(), i64_ty], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    let (a, b) = (func.argument(0).unwrap(), func.argument(1).unwrap());
    let err = builder.create_mul(&a, &b, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.to_string(), "type mismatch: expected i32, found i64");

    let err = builder.create_cond_br(&a, &entry, &entry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let one = ctx.const_int(&i32_ty, 1).unwrap();
    let cmp = builder.create_icmp_slt(&a, &one, "lt").unwrap();
    assert_eq!(cmp.ty().unwrap(), ctx.int1_type());
    assert_eq!(entry.instructions().unwrap().len(), 1);
}

#[test]
fn branches_need_blocks() {
    let ctx = Context::new();
    let (_module, func) = binary_function(&ctx);
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    let err = builder.create_br(&func.argument(0).unwrap()).unwrap_err();
    assert_eq!(
        err,
        Error::WrongHandleKind {
            expected: "basic block",
            found: "argument"
        }
    );
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(entry.is_empty().unwrap());

    let exit = func.create_basic_block("exit").unwrap();
    let br = builder.create_br(&exit).unwrap();
    assert_eq!(br.as_instruction().unwrap().opcode().unwrap(), Opcode::Br);
}

#[test]
fn operands_of_other_functions_and_contexts_are_rejected() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let i32_ty = ctx.int32_type();
    let fn_ty = FunctionType::get(&i32_ty, &[i32_ty.clone()], false).unwrap();
    let f = module.create_function("f", &fn_ty).unwrap();
    let g = module.create_function("g", &fn_ty).unwrap();
    let entry = f.create_basic_block("entry").unwrap();
    let other_block = g.create_basic_block("entry").unwrap();

    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    let foreign_arg = g.argument(0).unwrap();
    let err = builder.create_ret(&foreign_arg).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperand);
    assert!(builder.create_br(&other_block).is_err());

    let other_ctx = Context::new();
    let foreign_const = other_ctx.const_int(&other_ctx.int32_type(), 1).unwrap();
    let err = builder.create_ret(&foreign_const).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid operand: value belongs to a different context"
    );
    let other_module = other_ctx.create_module("other");
    let other_fn_ty = FunctionType::get(&other_ctx.void_type(), &[], false).unwrap();
    let other_func = other_module.create_function("h", &other_fn_ty).unwrap();
    let other_entry = other_func.create_basic_block("entry").unwrap();
    assert_eq!(
        builder.set_insert_point(&other_entry).unwrap_err(),
        Error::ForeignContext
    );
    assert!(entry.is_empty().unwrap());
}

#[test]
fn calls_check_each_argument() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let (i32_ty, i64_ty) = (ctx.int32_type(), ctx.int64_type());
    let callee_ty = FunctionType::get(&i32_ty, &[i32_ty.clone(), i64_ty.clone()], false).unwrap();
    let callee = module.create_function("callee", &callee_ty).unwrap();
    let caller_ty = FunctionType::get(&i32_ty, &[i32_ty.clone()], false).unwrap();
    let caller = module.create_function("caller", &caller_ty).unwrap();
    let entry = caller.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    let x = caller.argument(0).unwrap().as_value();
    let wide = ctx.const_int(&i64_ty, 7).unwrap().as_value();

    let err = builder
        .create_call(&callee, &[x.clone(), x.clone()], "")
        .unwrap_err();
    assert_eq!(
        err,
        Error::OperandTypeMismatch {
            index: 1,
            expected: "i64".to_string(),
            found: "i32".to_string()
        }
    );

    let other = module.create_function("other", &caller_ty).unwrap();
    let stranger = other.argument(0).unwrap().as_value();
    let err = builder
        .create_call(&callee, &[x.clone(), stranger], "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperand);
    assert!(err.to_string().starts_with("invalid argument at index 1"));

    let err = builder.create_call(&callee, &[x.clone()], "").unwrap_err();
    assert_eq!(err.to_string(), "type mismatch: expected 2 arguments, found 1 arguments");

    let err = builder.create_call(&x, &[], "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(entry.is_empty().unwrap());

    // A value dispatching to a function is a valid callee.
    let callee_value: Value = callee.as_value();
    assert_eq!(callee_value.kind(), ValueKind::Constant);
    let call = builder
        .create_call(&callee_value, &[x, wide], "r")
        .unwrap();
    assert_eq!(call.ty().unwrap(), i32_ty);
    assert_eq!(call.as_instruction().unwrap().opcode().unwrap(), Opcode::Call);
    builder.create_ret(&call).unwrap();
    assert!(module.verify().valid);
}

#[test]
fn memory_operations() {
    let ctx = Context::new();
    let module = ctx.create_module("mem");
    let (i32_ty, i64_ty) = (ctx.int32_type(), ctx.int64_type());
    let pair = StructType::create(&ctx, "pair");
    pair.set_body(&[i32_ty.clone(), i64_ty.clone()], false).unwrap();

    let fn_ty = FunctionType::get(&i64_ty, &[i64_ty.clone()], false).unwrap();
    let func = module.create_function("load_field", &fn_ty).unwrap();
    let x = func.argument(0).unwrap();
    x.set_name("x").unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    let p = builder.create_alloca(pair.as_type(), "p").unwrap();
    let f = builder.create_struct_gep(&pair, &p, 1, "f").unwrap();
    assert_eq!(f.ty().unwrap(), Type::from(i64_ty.pointer_to(0).unwrap()));
    builder.create_store(&x, &f).unwrap();
    let v = builder.create_load(&i64_ty, &f, "v").unwrap();
    builder.create_ret(&v).unwrap();

    assert!(module.verify().valid);
    assert_snapshot!(module.dump(), @r###"
    ; ModuleID = 'mem'
    source_filename = "mem"

    %pair = type { i32, i64 }

    define i64 @load_field(i64 %x) {
    entry:
      %p = alloca %pair
      %f = getelementptr %pair, %pair* %p, i32 0, i32 1
      store i64 %x, i64* %f
      %v = load i64, i64* %f
      ret i64 %v
    }
    "###);
}

#[test]
fn memory_operations_are_validated() {
    let ctx = Context::new();
    let module = ctx.create_module("mem");
    let (i32_ty, i64_ty) = (ctx.int32_type(), ctx.int64_type());
    let pair = StructType::create(&ctx, "pair");
    let fn_ty = FunctionType::get(&ctx.void_type(), &[i64_ty.clone()], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let x = func.argument(0).unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();

    // Opaque structs have no size.
    let err = builder.create_alloca(pair.as_type(), "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(builder.create_alloca(&ctx.void_type(), "").is_err());

    let slot = builder.create_alloca(&i32_ty, "slot").unwrap();
    assert_eq!(
        builder.create_store(&x, &slot).unwrap_err().kind(),
        ErrorKind::Type
    );
    assert_eq!(
        builder.create_load(&i64_ty, &slot, "").unwrap_err().kind(),
        ErrorKind::Type
    );
    assert_eq!(
        builder.create_load(&i32_ty, &x, "").unwrap_err().to_string(),
        "type mismatch: expected pointer type, found i64"
    );

    pair.set_body(&[i32_ty.clone()], false).unwrap();
    let p = builder.create_alloca(pair.as_type(), "p").unwrap();
    let err = builder.create_struct_gep(&pair, &p, 1, "").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert_eq!(
        builder.create_struct_gep(&pair, &slot, 0, "").unwrap_err().kind(),
        ErrorKind::Type
    );

    let arr_ty = ctx.types().array(&i32_ty, 4).unwrap();
    let arr = builder.create_alloca(arr_ty.as_type(), "arr").unwrap();
    let zero = ctx.const_int(&i64_ty, 0).unwrap().as_value();
    let elem = builder
        .create_gep(&arr, &[zero.clone(), x.as_value()], "elem")
        .unwrap();
    assert_eq!(elem.ty().unwrap().dump(), "i32*");

    let err = builder
        .create_gep(&arr, &[zero.clone(), zero.clone(), zero], "")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);

    let err = builder
        .create_gep(&arr, &[slot.clone()], "")
        .unwrap_err();
    assert_eq!(
        err,
        Error::OperandTypeMismatch {
            index: 0,
            expected: "integer type".to_string(),
            found: "i32*".to_string()
        }
    );
    assert_eq!(entry.instructions().unwrap().len(), 4);
}

#[test]
fn phi_incoming_pairs_keep_call_order() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let i32_ty = ctx.int32_type();
    let fn_ty = FunctionType::get(&i32_ty, &[ctx.int1_type(), i32_ty.clone()], false).unwrap();
    let func = module.create_function("select", &fn_ty).unwrap();
    let (cond, x) = (func.argument(0).unwrap(), func.argument(1).unwrap());
    let entry = func.create_basic_block("entry").unwrap();
    let then = func.create_basic_block("then").unwrap();
    let merge = func.create_basic_block("merge").unwrap();

    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    builder.create_cond_br(&cond, &then, &merge).unwrap();
    builder.set_insert_point(&then).unwrap();
    let doubled = builder.create_add(&x, &x, "doubled").unwrap();
    builder.create_br(&merge).unwrap();
    builder.set_insert_point(&merge).unwrap();

    let phi = builder.create_phi(&i32_ty, 2, "r").unwrap();
    assert_eq!(phi.num_incoming().unwrap(), 0);
    phi.add_incoming(&doubled, &then).unwrap();
    let zero = ctx.const_int(&i32_ty, 0).unwrap();
    phi.add_incoming(&zero, &entry).unwrap();
    builder.create_ret(phi.as_instruction()).unwrap();

    assert_eq!(phi.num_incoming().unwrap(), 2);
    assert_eq!(phi.incoming_value(0).unwrap(), doubled);
    assert_eq!(phi.incoming_block(0).unwrap(), then);
    let second = phi.incoming_value(1).unwrap();
    assert_eq!(second.kind(), ValueKind::Constant);
    assert_eq!(second.as_constant().unwrap().int_value(), Some(0));
    assert_eq!(phi.incoming_block(1).unwrap(), entry);
    assert_eq!(
        phi.incoming_value(2).unwrap_err().kind(),
        ErrorKind::Range
    );

    let wide = ctx.const_int(&ctx.int64_type(), 0).unwrap();
    assert!(phi.add_incoming(&wide, &entry).is_err());
    assert_eq!(phi.num_incoming().unwrap(), 2);
    assert!(doubled.as_phi().unwrap().is_none());
    assert!(phi.as_value().as_phi().unwrap().is_some());

    assert!(module.verify().valid, "{:?}", module.verify().error);
    assert_eq!(
        phi.as_instruction().dump().unwrap(),
        "%r = phi i32 [ %doubled, %then ], [ 0, %entry ]"
    );
}

#[test]
fn phi_reserve_is_only_a_hint() {
    let ctx = Context::new();
    let (module, func) = binary_function(&ctx);
    let entry = func.create_basic_block("entry").unwrap();
    let next = func.create_basic_block("next").unwrap();

    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    builder.create_br(&next).unwrap();
    builder.set_insert_point(&next).unwrap();

    let phi = builder.create_phi(&ctx.int32_type(), u32::MAX, "p").unwrap();
    assert_eq!(phi.num_incoming().unwrap(), 0);
    phi.add_incoming(&func.argument(0).unwrap(), &entry).unwrap();
    assert_eq!(phi.num_incoming().unwrap(), 1);
    builder.create_ret(phi.as_instruction()).unwrap();

    assert!(module.verify().valid, "{:?}", module.verify().error);
}

#[test]
fn argument_index_past_the_end_is_a_range_error() {
    let ctx = Context::new();
    let (_module, func) = binary_function(&ctx);
    assert_eq!(func.argument_count().unwrap(), 2);
    assert!(func.argument(1).is_ok());

    let err = func.argument(2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Range);
    assert_eq!(
        err,
        Error::OutOfRange {
            entity: "argument",
            index: 2,
            count: 2,
        }
    );
}
