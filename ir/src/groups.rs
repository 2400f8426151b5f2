//! Batch grouping of buffers for pool and arena assignment.

use itertools::Itertools;

use crate::{BufferId, Program};

impl Program {
    /// Group the non-leaf buffers by element type and shape.
    ///
    /// Buffers are stably sorted by `ntype.index`, then by the shape total
    /// order; each maximal run sharing both keys forms one group. The
    /// double stable sort makes group contents and group order
    /// deterministic across runs. Backends use the groups for storage
    /// pooling and fusion decisions.
    pub fn buffer_groups(&self) -> Vec<Vec<BufferId>> {
        let mut ids: Vec<BufferId> =
            self.buffers().filter(|buffer| !buffer.is_leaf()).map(|buffer| buffer.number()).collect();
        ids.sort_by(|&lhs, &rhs| {
            let lhs = self.buffer(lhs);
            let rhs = self.buffer(rhs);
            lhs.ntype().index().cmp(&rhs.ntype().index()).then_with(|| lhs.shape().cmp(rhs.shape()))
        });

        let runs = ids.into_iter().chunk_by(|&id| {
            let buffer = self.buffer(id);
            (buffer.ntype().index(), buffer.shape().clone())
        });
        let mut groups = Vec::new();
        for (_, run) in &runs {
            groups.push(run.collect());
        }
        groups
    }

    /// Visit each buffer group of [`Program::buffer_groups`] in order.
    pub fn for_each_buffer_group(&self, mut visit: impl FnMut(&[BufferId])) {
        for group in self.buffer_groups() {
            visit(&group);
        }
    }
}
