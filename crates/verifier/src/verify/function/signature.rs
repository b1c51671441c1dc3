use quill_ir::InstData;

use crate::diagnostic::{Diagnostic, DiagnosticCode, Location};

use super::FunctionVerifier;

impl FunctionVerifier<'_> {
    pub(super) fn check_signature_and_returns(&mut self) {
        let func = self.func;
        let sig = &func.sig;

        let (bad_params, bad_ret) = self.module.ctx.with_ty_store(|s| {
            let bad_params: Vec<_> = sig
                .args()
                .iter()
                .enumerate()
                .filter(|(_, ty)| !s.is_first_class(**ty))
                .map(|(idx, _)| idx)
                .collect();
            let bad_ret = !sig.ret_ty().is_void() && !s.is_first_class(sig.ret_ty());
            (bad_params, bad_ret)
        });
        for idx in bad_params {
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::InvalidSignature,
                    "function parameter type is not first class",
                    Location::Function(self.func_ref),
                )
                .with_note(format!("parameter {idx}")),
            );
        }
        if bad_ret {
            self.emit(Diagnostic::error(
                DiagnosticCode::InvalidSignature,
                "function return type is neither void nor first class",
                Location::Function(self.func_ref),
            ));
        }

        let ret_ty = sig.ret_ty();
        for &block in &self.block_order.clone() {
            for inst in func.layout.iter_inst(block) {
                let InstData::Ret { arg } = func.dfg.inst(inst) else {
                    continue;
                };

                let found = arg.map(|arg| self.value_ty(arg));
                let matches = match found {
                    Some(ty) => ty == ret_ty,
                    None => ret_ty.is_void(),
                };
                if matches {
                    continue;
                }

                let found = found.map_or_else(|| "void".to_string(), |ty| self.display_ty(ty));
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::ReturnTypeMismatch,
                        "returned value does not match the function return type",
                        self.inst_location(inst),
                    )
                    .with_note(format!(
                        "expected {}, found {found}",
                        self.display_ty(ret_ty)
                    )),
                );
            }
        }
    }
}
