use quill_ir::{types::TypeStore, InstData, InstId, Type, Value};

use crate::diagnostic::{Diagnostic, DiagnosticCode};

use super::FunctionVerifier;

/// A type rule violation found while the type store is borrowed.
struct Violation {
    code: DiagnosticCode,
    message: &'static str,
    note: Option<String>,
}

impl Violation {
    fn new(code: DiagnosticCode, message: &'static str) -> Self {
        Self {
            code,
            message,
            note: None,
        }
    }

    fn with_note(mut self, note: String) -> Self {
        self.note = Some(note);
        self
    }
}

impl FunctionVerifier<'_> {
    pub(super) fn check_type_rules(&mut self) {
        let func = self.func;
        let blocks = self.block_order.clone();
        for block in blocks {
            for inst in func.layout.iter_inst(block) {
                let violations = self
                    .module
                    .ctx
                    .with_ty_store(|s| self.inst_violations(s, inst));
                for violation in violations {
                    let mut diag = Diagnostic::error(
                        violation.code,
                        violation.message,
                        self.inst_location(inst),
                    );
                    if let Some(note) = violation.note {
                        diag = diag.with_note(note);
                    }
                    self.emit(diag);
                }
            }
        }
    }

    fn inst_violations(&self, s: &TypeStore, inst: InstId) -> Vec<Violation> {
        let dfg = &self.func.dfg;
        let result_ty = self.inst_result_ty(inst);
        let mut out = Vec::new();
        let mismatch = |expected: Type, found: Type| {
            format!("expected {}, found {}", s.display(expected), s.display(found))
        };

        match dfg.inst(inst) {
            InstData::Binary { lhs, rhs, .. } => {
                let (lhs_ty, rhs_ty) = (dfg.value_ty(*lhs), dfg.value_ty(*rhs));
                if lhs_ty != rhs_ty {
                    out.push(
                        Violation::new(
                            DiagnosticCode::InstOperandTypeMismatch,
                            "binary operands have different types",
                        )
                        .with_note(mismatch(lhs_ty, rhs_ty)),
                    );
                } else if !lhs_ty.is_integral() {
                    out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "integer arithmetic on a non-integer type",
                    ));
                }
                if result_ty != Some(lhs_ty) {
                    out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "arithmetic result type differs from operand type",
                    ));
                }
            }

            InstData::Icmp { lhs, rhs, .. } => {
                let (lhs_ty, rhs_ty) = (dfg.value_ty(*lhs), dfg.value_ty(*rhs));
                if lhs_ty != rhs_ty {
                    out.push(
                        Violation::new(
                            DiagnosticCode::InstOperandTypeMismatch,
                            "compared operands have different types",
                        )
                        .with_note(mismatch(lhs_ty, rhs_ty)),
                    );
                } else if !lhs_ty.is_integral() && !s.is_ptr(lhs_ty) {
                    out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "icmp operands must be integers or pointers",
                    ));
                }
                if result_ty != Some(Type::I1) {
                    out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "icmp must produce i1",
                    ));
                }
            }

            InstData::Alloca { ty } => {
                if !s.is_sized(*ty) {
                    out.push(
                        Violation::new(
                            DiagnosticCode::UnstorableTypeInMemoryOp,
                            "cannot allocate an unsized type",
                        )
                        .with_note(format!("type {}", s.display(*ty))),
                    );
                }
            }

            InstData::Load { ty, ptr } => {
                let ptr_ty = dfg.value_ty(*ptr);
                match s.deref(ptr_ty) {
                    Some(pointee) if pointee == *ty => {}
                    Some(pointee) => out.push(
                        Violation::new(
                            DiagnosticCode::InstOperandTypeMismatch,
                            "loaded type differs from the pointee type",
                        )
                        .with_note(mismatch(*ty, pointee)),
                    ),
                    None => out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "load address is not a pointer",
                    )),
                }
                if !s.is_sized(*ty) {
                    out.push(Violation::new(
                        DiagnosticCode::UnstorableTypeInMemoryOp,
                        "cannot load an unsized type",
                    ));
                }
            }

            InstData::Store { value, ptr } => {
                let value_ty = dfg.value_ty(*value);
                match s.deref(dfg.value_ty(*ptr)) {
                    Some(pointee) if pointee == value_ty => {}
                    Some(pointee) => out.push(
                        Violation::new(
                            DiagnosticCode::InstOperandTypeMismatch,
                            "stored value type differs from the pointee type",
                        )
                        .with_note(mismatch(pointee, value_ty)),
                    ),
                    None => out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "store address is not a pointer",
                    )),
                }
                if !s.is_sized(value_ty) {
                    out.push(Violation::new(
                        DiagnosticCode::UnstorableTypeInMemoryOp,
                        "cannot store an unsized type",
                    ));
                }
            }

            InstData::Gep {
                elem_ty,
                ptr,
                indices,
            } => {
                let Some((pointee, addr_space)) = s.ptr_def(dfg.value_ty(*ptr)) else {
                    out.push(Violation::new(
                        DiagnosticCode::GepTypeComputationFailed,
                        "getelementptr base is not a pointer",
                    ));
                    return out;
                };
                if pointee != *elem_ty {
                    out.push(
                        Violation::new(
                            DiagnosticCode::GepTypeComputationFailed,
                            "getelementptr source type differs from the pointee type",
                        )
                        .with_note(mismatch(*elem_ty, pointee)),
                    );
                }
                if indices.iter().any(|idx| !dfg.value_ty(*idx).is_integral()) {
                    out.push(Violation::new(
                        DiagnosticCode::GepTypeComputationFailed,
                        "getelementptr index is not an integer",
                    ));
                }

                let rest = indices.iter().skip(1).map(|idx| match dfg.value(*idx) {
                    Value::Const { cst, .. } => dfg.ctx.const_data(*cst).as_int(),
                    _ => None,
                });
                match s.indexed_type(*elem_ty, rest) {
                    Some(addressed) => {
                        let expected = s.lookup_ptr(addressed, addr_space);
                        if expected.is_none() || result_ty != expected {
                            out.push(Violation::new(
                                DiagnosticCode::GepTypeComputationFailed,
                                "getelementptr result type differs from the addressed type",
                            ));
                        }
                    }
                    None => out.push(Violation::new(
                        DiagnosticCode::GepTypeComputationFailed,
                        "getelementptr indices do not fit the source type",
                    )),
                }
            }

            InstData::Call { callee, args } => {
                let sig = &self.module.funcs[*callee].sig;
                let params = sig.args();
                let arity_ok = if sig.is_var_arg() {
                    args.len() >= params.len()
                } else {
                    args.len() == params.len()
                };
                if !arity_ok {
                    out.push(
                        Violation::new(
                            DiagnosticCode::CallArityMismatch,
                            "call argument count differs from the callee signature",
                        )
                        .with_note(format!(
                            "expected {} argument(s), found {}",
                            params.len(),
                            args.len()
                        )),
                    );
                }
                for (idx, (arg, param)) in args.iter().zip(params).enumerate() {
                    let arg_ty = dfg.value_ty(*arg);
                    if arg_ty != *param {
                        out.push(
                            Violation::new(
                                DiagnosticCode::CallArgTypeMismatch,
                                "call argument type differs from the parameter type",
                            )
                            .with_note(format!("argument {idx}: {}", mismatch(*param, arg_ty))),
                        );
                    }
                }
                let expected = (!sig.ret_ty().is_void()).then(|| sig.ret_ty());
                if result_ty != expected {
                    out.push(Violation::new(
                        DiagnosticCode::InstOperandTypeMismatch,
                        "call result type differs from the callee return type",
                    ));
                }
            }

            InstData::CondBr { cond, .. } => {
                let cond_ty = dfg.value_ty(*cond);
                if cond_ty != Type::I1 {
                    out.push(
                        Violation::new(
                            DiagnosticCode::InstOperandTypeMismatch,
                            "branch condition must be i1",
                        )
                        .with_note(mismatch(Type::I1, cond_ty)),
                    );
                }
            }

            InstData::Phi { .. } | InstData::Br { .. } | InstData::Ret { .. } => {}
        }

        out
    }
}
