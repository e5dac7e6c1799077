//! Control-flow graph and evaluation-stack verification for method bodies.
use std::collections::BTreeMap;

use petgraph::{Direction, graphmap::DiGraphMap};

use crate::{
    modules::body::{InstrId, MethodBody},
    utils::Error,
};

impl MethodBody {
    /// Build the control-flow graph of the body. Nodes are instructions,
    /// edges go to every possible successor (fall-through and branch target).
    pub fn control_flow_graph(&self) -> Result<DiGraphMap<InstrId, ()>, Error> {
        let positions = self.positions();
        let mut graph = DiGraphMap::new();

        for (position, (id, instr)) in self.iter().enumerate() {
            graph.add_node(id);

            if let Some(target) = instr.branch_target() {
                if !positions.contains_key(&target) {
                    return Err(Error::UndefinedBranchTarget { position, target });
                }
                graph.add_edge(id, target, ());
            }

            if instr.falls_through() {
                match self.at(position + 1) {
                    Some(next) => {
                        graph.add_edge(id, next, ());
                    }
                    None => return Err(Error::FallsThroughEnd),
                }
            }
        }

        Ok(graph)
    }

    /// Verify evaluation-stack discipline and return the maximum depth.
    ///
    /// Every reachable instruction must find enough operands, every join
    /// point must be reached with a single depth, and every `ret` must leave
    /// exactly the return value (one slot when `returns_value`, none
    /// otherwise).
    pub fn verify_stack(&self, returns_value: bool) -> Result<usize, Error> {
        let Some(entry) = self.first() else {
            return Err(Error::FallsThroughEnd);
        };

        let graph = self.control_flow_graph()?;
        let positions = self.positions();

        let mut depths = BTreeMap::from([(entry, 0usize)]);
        let mut worklist = vec![entry];
        let mut max_depth = 0;

        while let Some(id) = worklist.pop() {
            let position = positions[&id];
            let instr = self.get(id).ok_or(Error::UnknownInstruction(id))?;
            let before = depths[&id];

            if instr.is_ret() && before != usize::from(returns_value) {
                return Err(Error::UnbalancedReturn {
                    position,
                    expected: usize::from(returns_value),
                    found: before,
                });
            }

            let pops = instr.pops(returns_value);
            if before < pops {
                return Err(Error::StackUnderflow {
                    position,
                    instruction: instr.to_string(),
                    needed: pops,
                    available: before,
                });
            }

            let after = before - pops + instr.pushes();
            max_depth = max_depth.max(before).max(after);

            for successor in graph.neighbors_directed(id, Direction::Outgoing) {
                match depths.get(&successor) {
                    Some(&seen) if seen != after => {
                        return Err(Error::InconsistentStackDepth {
                            position: positions[&successor],
                            first: seen,
                            second: after,
                        });
                    }
                    Some(_) => {}
                    None => {
                        depths.insert(successor, after);
                        worklist.push(successor);
                    }
                }
            }
        }

        Ok(max_depth)
    }

    fn positions(&self) -> BTreeMap<InstrId, usize> {
        self.ids()
            .enumerate()
            .map(|(position, id)| (id, position))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        modules::{body::MethodBody, instructions::Instr},
        utils::Error,
    };

    #[test]
    fn straight_line_body_verifies() {
        let body = MethodBody::from_instrs([Instr::LoadInt(1), Instr::Pop, Instr::Ret]);
        assert_eq!(body.verify_stack(false), Ok(1));
    }

    #[test]
    fn missing_return_value_is_unbalanced() {
        let body = MethodBody::from_instrs([Instr::Ret]);
        assert!(matches!(
            body.verify_stack(true),
            Err(Error::UnbalancedReturn { expected: 1, found: 0, .. })
        ));
    }

    #[test]
    fn join_points_must_agree() {
        // brtrue skips a push, so the join sees depth 0 and depth 1.
        let mut body = MethodBody::new();
        body.push(Instr::LoadInt(0));
        let branch = body.push(Instr::BrTrue(Default::default()));
        body.push(Instr::LoadInt(7));
        let join = body.push(Instr::Ret);
        body.set_branch_target(branch, join).unwrap();

        assert!(matches!(
            body.verify_stack(false),
            Err(Error::InconsistentStackDepth { .. })
        ));
    }

    #[test]
    fn falling_off_the_end_is_rejected() {
        let body = MethodBody::from_instrs([Instr::Nop]);
        assert_eq!(body.verify_stack(false), Err(Error::FallsThroughEnd));
    }
}
