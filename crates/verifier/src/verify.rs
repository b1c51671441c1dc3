use quill_ir::{module::FuncRef, Module};

use crate::{report::VerificationReport, VerifierConfig};

mod function;

use function::verify_function_in_module;

/// Verifies every function of `module`.
///
/// The module is never mutated. Diagnostics are ordered by function, then by
/// block and instruction order within each function.
pub fn verify_module(module: &Module, cfg: &VerifierConfig) -> VerificationReport {
    let mut report = VerificationReport::default();

    for func_ref in module.iter_functions() {
        let func_report = verify_function_in_module(module, func_ref, cfg);
        report.extend_with_limit(func_report.diagnostics, cfg.max_diagnostics);
        if report.is_full(cfg.max_diagnostics) {
            break;
        }
    }

    report
}

pub fn verify_function(
    module: &Module,
    func_ref: FuncRef,
    cfg: &VerifierConfig,
) -> VerificationReport {
    verify_function_in_module(module, func_ref, cfg)
}

pub fn verify_module_or_panic(module: &Module, cfg: &VerifierConfig) {
    let report = verify_module(module, cfg);
    if report.has_errors() {
        panic!("IR verification failed\n{report}");
    }
}
