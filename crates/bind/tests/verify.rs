use quill_bind::{
    BindConfig, Builder, Context, Function, FunctionType, Module, Type, VerificationLevel,
    VerifierConfig,
};

fn function(ctx: &Context, params: &[Type], ret: &Type) -> (Module, Function) {
    let module = ctx.create_module("test");
    let fn_ty = FunctionType::get(ret, params, false).unwrap();
    let func = module.create_function("f", &fn_ty).unwrap();
    (module, func)
}

fn positioned(ctx: &Context, func: &Function, name: &str) -> Builder {
    let block = func.create_basic_block(name).unwrap();
    let mut builder = Builder::new(ctx);
    builder.set_insert_point(&block).unwrap();
    builder
}

fn expect_invalid(module: &Module, code: &str) -> String {
    let verification = module.verify();
    assert!(!verification.valid);
    let message = verification.error.unwrap();
    assert!(message.contains(code), "expected {code}, got {message}");
    message
}

#[test]
fn well_formed_functions_are_valid() {
    let ctx = Context::new();
    let (module, func) = function(&ctx, &[], &ctx.void_type());
    positioned(&ctx, &func, "entry").create_ret_void().unwrap();
    let verification = module.verify();
    assert!(verification.valid);
    assert_eq!(verification.error, None);

    let i32_ty = ctx.int32_type();
    let (module, func) = function(&ctx, &[i32_ty.clone(), i32_ty.clone()], &i32_ty);
    let builder = positioned(&ctx, &func, "entry");
    let (a, b) = (func.argument(0).unwrap(), func.argument(1).unwrap());
    let sum = builder.create_add(&a, &b, "").unwrap();
    builder.create_ret(&sum).unwrap();

    assert!(module.verify().valid);
    assert!(func.verify().unwrap().valid);
    let text = module.dump();
    assert!(text.contains("add i32"));
    assert!(text.contains("ret i32"));
}

#[test]
fn declarations_are_valid() {
    let ctx = Context::new();
    let (module, func) = function(&ctx, &[ctx.int64_type()], &ctx.void_type());
    assert!(func.is_declaration().unwrap());
    assert!(module.verify().valid);
}

#[test]
fn missing_terminator() {
    let ctx = Context::new();
    let i32_ty = ctx.int32_type();
    let (module, func) = function(&ctx, &[i32_ty.clone()], &ctx.void_type());
    let builder = positioned(&ctx, &func, "entry");
    let a = func.argument(0).unwrap();
    builder.create_add(&a, &a, "").unwrap();

    let message = expect_invalid(&module, "IR0201");
    assert!(message.contains("@f"));
    assert!(!func.verify().unwrap().valid);
}

#[test]
fn return_type_is_left_to_verification() {
    let ctx = Context::new();
    let (module, func) = function(&ctx, &[], &ctx.int32_type());
    positioned(&ctx, &func, "entry").create_ret_void().unwrap();
    expect_invalid(&module, "IR0604");
}

#[test]
fn phi_from_a_block_that_is_not_a_predecessor() {
    let ctx = Context::new();
    let i32_ty = ctx.int32_type();
    let (module, func) = function(&ctx, &[i32_ty.clone()], &i32_ty);
    let a = func.argument(0).unwrap();
    let mut builder = positioned(&ctx, &func, "entry");
    let entry = builder.insert_block().unwrap();
    let merge = func.create_basic_block("merge").unwrap();
    builder.create_br(&merge).unwrap();

    builder.set_insert_point(&merge).unwrap();
    let phi = builder.create_phi(&i32_ty, 2, "x").unwrap();
    phi.add_incoming(&a, &entry).unwrap();
    phi.add_incoming(&a, &merge).unwrap();
    builder.create_ret(&phi).unwrap();

    expect_invalid(&module, "IR0403");
}

#[test]
fn definitions_must_dominate_uses() {
    let ctx = Context::new();
    let i32_ty = ctx.int32_type();
    let (module, func) = function(&ctx, &[ctx.int1_type(), i32_ty.clone()], &i32_ty);
    let (cond, a) = (func.argument(0).unwrap(), func.argument(1).unwrap());
    let mut builder = positioned(&ctx, &func, "entry");
    let then = func.create_basic_block("then").unwrap();
    let merge = func.create_basic_block("merge").unwrap();
    builder.create_cond_br(&cond, &then, &merge).unwrap();

    builder.set_insert_point(&then).unwrap();
    let sum = builder.create_add(&a, &a, "sum").unwrap();
    builder.create_br(&merge).unwrap();
    builder.set_insert_point(&merge).unwrap();
    builder.create_ret(&sum).unwrap();

    expect_invalid(&module, "IR0501");

    // Dominance is only checked at the full level.
    let ctx = Context::with_config(BindConfig {
        verification: VerifierConfig::for_level(VerificationLevel::Standard),
        ..BindConfig::default()
    });
    let (module, func) = function(&ctx, &[ctx.int1_type(), ctx.int32_type()], &ctx.int32_type());
    let (cond, a) = (func.argument(0).unwrap(), func.argument(1).unwrap());
    let mut builder = positioned(&ctx, &func, "entry");
    let then = func.create_basic_block("then").unwrap();
    let merge = func.create_basic_block("merge").unwrap();
    builder.create_cond_br(&cond, &then, &merge).unwrap();
    builder.set_insert_point(&then).unwrap();
    let sum = builder.create_add(&a, &a, "sum").unwrap();
    builder.create_br(&merge).unwrap();
    builder.set_insert_point(&merge).unwrap();
    builder.create_ret(&sum).unwrap();
    assert!(module.verify().valid);
}

#[test]
fn entry_block_cannot_be_branched_to() {
    let ctx = Context::new();
    let (module, func) = function(&ctx, &[], &ctx.void_type());
    let builder = positioned(&ctx, &func, "entry");
    let entry = func.entry_block().unwrap().unwrap();
    builder.create_br(&entry).unwrap();
    expect_invalid(&module, "IR0303");
}

#[test]
fn building_continues_after_a_failed_verification() {
    let ctx = Context::new();
    let (module, func) = function(&ctx, &[], &ctx.void_type());
    let builder = positioned(&ctx, &func, "entry");
    let before = module.dump();

    let report = module.verify_report();
    assert!(report.has_errors());
    assert_eq!(module.dump(), before);

    builder.create_ret_void().unwrap();
    assert!(module.verify().valid);
}
