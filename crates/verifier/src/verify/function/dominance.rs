use quill_ir::{BlockId, DomTree, InstData, Value, ValueId};

use crate::diagnostic::{Diagnostic, DiagnosticCode};

use super::FunctionVerifier;

impl FunctionVerifier<'_> {
    pub(super) fn check_dominance_rules(&mut self) {
        let func = self.func;
        if self.block_order.is_empty() {
            return;
        }

        let mut domtree = DomTree::new();
        domtree.compute(&self.graph);

        let blocks = self.block_order.clone();
        for block in blocks {
            // Uses in unreachable code are never executed.
            if !domtree.is_reachable(block) {
                continue;
            }

            for inst in func.layout.iter_inst(block) {
                let data = func.dfg.inst(inst);

                if let InstData::Phi { args } = data {
                    for (value, pred) in args {
                        if !domtree.is_reachable(*pred) {
                            continue;
                        }
                        let Some(def_block) = self.def_block(*value) else {
                            continue;
                        };
                        if !domtree.dominates(def_block, *pred) {
                            self.emit(
                                Diagnostic::error(
                                    DiagnosticCode::PhiIncomingNotAvailableOnEdge,
                                    "phi incoming value is not available at the end of its predecessor",
                                    self.inst_location(inst),
                                )
                                .with_note(format!(
                                    "defined in {}, incoming from {}",
                                    self.block_name(def_block),
                                    self.block_name(*pred)
                                )),
                            );
                        }
                    }
                    continue;
                }

                let use_index = self.inst_index_in_block[&inst];
                for value in data.values() {
                    let Some(def_block) = self.def_block(value) else {
                        continue;
                    };
                    let Some(def_inst) = func.dfg.value_inst(value) else {
                        continue;
                    };

                    if def_block == block {
                        let def_index = self.inst_index_in_block[&def_inst];
                        if def_index >= use_index {
                            self.emit(
                                Diagnostic::error(
                                    DiagnosticCode::UseBeforeDefInBlock,
                                    "instruction uses a value before its local definition",
                                    self.inst_location(inst),
                                )
                                .with_note(format!(
                                    "definition at index {def_index}, use at {use_index}"
                                )),
                            );
                        }
                    } else if !domtree.dominates(def_block, block) {
                        self.emit(
                            Diagnostic::error(
                                DiagnosticCode::DefDoesNotDominateUse,
                                "instruction does not dominate all uses",
                                self.inst_location(inst),
                            )
                            .with_note(format!(
                                "defined in {}, used in {}",
                                self.block_name(def_block),
                                self.block_name(block)
                            )),
                        );
                    }
                }
            }
        }
    }

    /// Returns the block defining `value` if it's an instruction result.
    fn def_block(&self, value: ValueId) -> Option<BlockId> {
        match self.func.dfg.value(value) {
            Value::Inst { inst, .. } => self.func.layout.inst_block(*inst),
            _ => None,
        }
    }
}
