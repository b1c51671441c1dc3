use quill_ir::{BlockId, InstData, InstId};

use crate::diagnostic::{Diagnostic, DiagnosticCode};

use super::FunctionVerifier;

impl FunctionVerifier<'_> {
    pub(super) fn check_referential_integrity(&mut self) {
        let func = self.func;
        let blocks = self.block_order.clone();
        for block in blocks {
            for inst in func.layout.iter_inst(block) {
                self.check_inst_refs(inst);
            }
        }
    }

    fn check_inst_refs(&mut self, inst: InstId) {
        let func = self.func;
        let data = func.dfg.inst(inst);

        let mut bad_values = Vec::new();
        data.visit_values(|value| {
            if !func.dfg.values.is_valid(value) {
                bad_values.push(value);
            }
        });
        for value in bad_values {
            self.refs_ok = false;
            self.emit(
                Diagnostic::error(
                    DiagnosticCode::InvalidValueRef,
                    "instruction refers to a value that does not exist",
                    self.inst_location(inst),
                )
                .with_note(format!("operand {value}")),
            );
        }

        let mut dests: Vec<BlockId> = data.branch_dests().into_vec();
        if let Some(args) = data.phi_args() {
            dests.extend(args.iter().map(|(_, block)| *block));
        }
        for dest in dests {
            if !func.dfg.has_block(dest) || !func.layout.is_block_inserted(dest) {
                self.refs_ok = false;
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::InvalidBlockRef,
                        "instruction refers to a block that is not in the function",
                        self.inst_location(inst),
                    )
                    .with_note(format!("block {dest}")),
                );
            }
        }

        if let InstData::Call { callee, .. } = data {
            if !self.module.has_func(*callee) {
                self.refs_ok = false;
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::InvalidFuncRef,
                        "call refers to a function that is not in the module",
                        self.inst_location(inst),
                    )
                    .with_note(format!("callee {callee}")),
                );
            }
        }
    }
}
