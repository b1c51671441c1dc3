use quill_bind::{AsValue, Builder, Context, Error, ErrorKind, FunctionType};

#[test]
fn dropping_a_module_invalidates_its_handles() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let i32_ty = ctx.int32_type();
    let fn_ty = FunctionType::get(&i32_ty, &[i32_ty.clone()], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let arg = func.argument(0).unwrap();
    let entry = func.create_basic_block("entry").unwrap();
    let mut builder = Builder::new(&ctx);
    builder.set_insert_point(&entry).unwrap();
    let sum = builder.create_add(&arg, &arg, "sum").unwrap();
    let five = ctx.const_int(&i32_ty, 5).unwrap();

    drop(module);

    assert_eq!(func.name().unwrap_err(), Error::StaleHandle);
    assert_eq!(func.name().unwrap_err().kind(), ErrorKind::Usage);
    assert_eq!(arg.ty().unwrap_err(), Error::StaleHandle);
    assert_eq!(entry.instructions().unwrap_err(), Error::StaleHandle);
    assert_eq!(sum.ty().unwrap_err(), Error::StaleHandle);
    assert_eq!(sum.dump().unwrap_err(), Error::StaleHandle);
    assert_eq!(func.create_basic_block("late").unwrap_err(), Error::StaleHandle);

    // The builder still points at the dead block.
    assert_eq!(builder.create_ret_void().unwrap_err(), Error::StaleHandle);
    assert_eq!(
        builder.set_insert_point(&entry).unwrap_err(),
        Error::StaleHandle
    );

    // Constants belong to the context and outlive the module.
    assert_eq!(five.ty().unwrap(), i32_ty);
    assert_eq!(five.int_value(), Some(5));
}

#[test]
fn a_reused_slot_does_not_revive_old_handles() {
    let ctx = Context::new();
    let fn_ty = FunctionType::get(&ctx.void_type(), &[], false).unwrap();

    let first = ctx.create_module("first");
    let old = first.create_function("f", &fn_ty).unwrap();
    drop(first);

    let second = ctx.create_module("second");
    let new = second.create_function("f", &fn_ty).unwrap();
    assert_eq!(new.name().unwrap(), "f");
    assert_eq!(old.name().unwrap_err(), Error::StaleHandle);
    assert_ne!(old, new);
    assert!(second.function("f").is_some());
}

#[test]
fn handles_outlive_their_context_safely() {
    let ctx = Context::new();
    let module = ctx.create_module("m");
    let fn_ty = FunctionType::get(&ctx.void_type(), &[], false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    let value = func.as_value();

    drop(ctx);
    // The module keeps the context alive.
    assert_eq!(func.name().unwrap(), "f");
    assert_eq!(module.context().void_type().dump(), "void");

    drop(module);
    assert_eq!(func.name().unwrap_err(), Error::StaleHandle);
    assert_eq!(value.ty().unwrap_err(), Error::StaleHandle);
}
