use rustc_hash::FxHashSet;

use crate::diagnostic::{Diagnostic, DiagnosticCode};

use super::FunctionVerifier;

impl FunctionVerifier<'_> {
    pub(super) fn check_phi_rules(&mut self) {
        let func = self.func;
        let entry = func.layout.entry_block();

        let blocks = self.block_order.clone();
        for block in blocks {
            let pred_set: FxHashSet<_> = self.graph.preds_of(block).copied().collect();

            let mut seen_non_phi = false;
            for inst in func.layout.iter_inst(block) {
                let Some(args) = func.dfg.inst(inst).phi_args() else {
                    seen_non_phi = true;
                    continue;
                };

                if seen_non_phi {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::PhiNotAtBlockTop,
                        "phi instruction must appear at the beginning of the block",
                        self.inst_location(inst),
                    ));
                }

                if entry == Some(block) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::PhiInEntryBlock,
                        "entry block must not contain phi instructions",
                        self.inst_location(inst),
                    ));
                }

                let mut seen_incomings = FxHashSet::default();
                let result_ty = self.inst_result_ty(inst);

                for (value, pred_block) in args {
                    if !pred_set.contains(pred_block) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::PhiHasNonPredIncoming,
                                "phi incoming block is not a CFG predecessor",
                                self.inst_location(inst),
                            )
                            .with_note(format!("incoming from {}", self.block_name(*pred_block))),
                        );
                    }

                    if !seen_incomings.insert(*pred_block) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::PhiDuplicateIncomingBlock,
                                "phi contains duplicate incoming block",
                                self.inst_location(inst),
                            )
                            .with_note(format!(
                                "duplicate predecessor {}",
                                self.block_name(*pred_block)
                            )),
                        );
                    }

                    let arg_ty = self.value_ty(*value);
                    if let Some(res_ty) = result_ty {
                        if arg_ty != res_ty {
                            self.emit(
                                Diagnostic::error(
                                    DiagnosticCode::PhiIncomingTypeMismatch,
                                    "phi incoming value type differs from phi result type",
                                    self.inst_location(inst),
                                )
                                .with_note(format!(
                                    "expected {}, found {}",
                                    self.display_ty(res_ty),
                                    self.display_ty(arg_ty)
                                )),
                            );
                        }
                    }
                }

                let covered = seen_incomings
                    .iter()
                    .filter(|block| pred_set.contains(block))
                    .count();
                if covered != pred_set.len() {
                    self.emit(
                        Diagnostic::error(
                            DiagnosticCode::PhiArgCountMismatchPreds,
                            "phi incoming blocks do not cover every predecessor",
                            self.inst_location(inst),
                        )
                        .with_note(format!(
                            "expected {} predecessor(s), found {} of them",
                            pred_set.len(),
                            covered
                        )),
                    );
                }
            }
        }
    }
}
