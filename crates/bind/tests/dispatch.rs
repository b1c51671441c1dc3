use quill_bind::{AsValue, Builder, Context, FunctionType, Unwrapped, ValueKind};

#[test]
fn handles_get_the_most_specific_kind() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let i32_ty = ctx.int32_type();
    let fn_ty = FunctionType::get(&i32_ty, &[i32_ty.clone()], false).unwrap();
    let func = module.create_function("id", &fn_ty).unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let arg = func.argument(0).unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    let sum = builder.create_add(&arg, &arg, "sum").unwrap();
    let ret = builder.create_ret(&sum).unwrap();
    let seven = ctx.const_int(&i32_ty, 7).unwrap();

    assert_eq!(seven.as_value().kind(), ValueKind::Constant);
    assert_eq!(func.as_value().kind(), ValueKind::Constant);
    assert_eq!(sum.kind(), ValueKind::Instruction);
    assert_eq!(ret.kind(), ValueKind::Instruction);
    assert_eq!(entry.as_value().kind(), ValueKind::BasicBlock);
    assert_eq!(arg.as_value().kind(), ValueKind::Argument);

    assert_eq!(seven.dump().unwrap(), "i32 7");
    assert_eq!(sum.dump().unwrap(), "%sum = add i32 %0, %0");
    assert_eq!(arg.dump().unwrap(), "i32 %0");
    assert!(func.as_value().dump().unwrap().ends_with("@id"));
    assert_eq!(entry.as_value().name().unwrap(), "entry");
    assert_eq!(entry.as_value().ty().unwrap(), ctx.types().label());
    assert_eq!(
        func.as_value().as_function(),
        Some(func.clone()),
    );
}

#[test]
fn unwrap_then_wrap_gives_an_equal_handle() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let i64_ty = ctx.int64_type();
    let fn_ty = FunctionType::get(&ctx.void_type(), &[i64_ty.clone()], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    let arg = func.argument(0).unwrap();
    let twice = builder.create_mul(&arg, &arg, "twice").unwrap();
    let one = ctx.const_int(&i64_ty, 1).unwrap();

    let handles = ctx.handles();
    for value in [
        twice,
        arg.as_value(),
        entry.as_value(),
        one.as_value(),
        func.as_value(),
    ] {
        let Unwrapped::Native(native) = handles.unwrap(Some(&value)) else {
            panic!("{value:?} did not unwrap");
        };
        assert_eq!(handles.wrap(Some(native)), Some(value));
    }
}

#[test]
fn missing_and_invalid_handles() {
    let ctx = Context::new();
    let handles = ctx.handles();
    assert_eq!(handles.wrap(None), None);
    assert_eq!(handles.unwrap(None), Unwrapped::Null);

    let other = Context::new();
    let foreign = other.const_int(&other.int32_type(), 1).unwrap().as_value();
    assert_eq!(
        handles.unwrap(Some(&foreign)),
        Unwrapped::Invalid("value belongs to a different context".to_string())
    );

    let module = ctx.create_module("m");
    let fn_ty = FunctionType::get(&ctx.void_type(), &[ctx.int32_type()], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let arg = func.argument(0).unwrap().as_value();
    assert!(matches!(handles.unwrap(Some(&arg)), Unwrapped::Native(_)));

    drop(module);
    assert_eq!(
        handles.unwrap(Some(&arg)),
        Unwrapped::Invalid("value belongs to a module that has been dropped".to_string())
    );
}
