use crate::diagnostic::{Diagnostic, DiagnosticCode};

use super::FunctionVerifier;

impl FunctionVerifier<'_> {
    pub(super) fn check_block_and_cfg_rules(&mut self) {
        let func = self.func;
        let blocks = self.block_order.clone();

        for &block in &blocks {
            let Some(last) = func.layout.last_inst_of(block) else {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::EmptyBlock,
                        "block has no instructions and therefore no terminator",
                        self.block_location(block),
                    )
                    .with_note(format!("block {}", self.block_name(block))),
                );
                continue;
            };

            if !func.dfg.is_terminator(last) {
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::MissingTerminator,
                        "block does not end with a terminator",
                        self.inst_location(last),
                    )
                    .with_note(format!("block {}", self.block_name(block))),
                );
            }

            for inst in func.layout.iter_inst(block) {
                if inst != last && func.dfg.is_terminator(inst) {
                    self.emit(Diagnostic::error(
                        DiagnosticCode::TerminatorNotLast,
                        "terminator in the middle of a block",
                        self.inst_location(inst),
                    ));
                }
            }
        }

        if let Some(entry) = func.layout.entry_block() {
            if self.graph.pred_num_of(entry) > 0 {
                let preds: Vec<_> = self
                    .graph
                    .preds_of(entry)
                    .map(|pred| self.block_name(*pred))
                    .collect();
                self.emit(
                    Diagnostic::error(
                        DiagnosticCode::BranchToEntryDisallowed,
                        "entry block must not have predecessors",
                        self.block_location(entry),
                    )
                    .with_note(format!("branched to from {}", preds.join(", "))),
                );
            }
        }
    }
}
