//! Memory-reuse analysis and axis reordering.
//!
//! The analyses estimate, per axis, how many redundant memory touches
//! could be avoided if that axis were the innermost loop. Two loads of a
//! stencil touch nearby elements along an output axis `o` when their
//! offset vectors agree everywhere except at `o`; each such class of `n`
//! loads contributes `n − 1` reusable pairs, attributed to the input axis
//! the stencil reads `o` from.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::transformation::Transformation;
use crate::{BufferId, KernelId, Program};

/// Offsets with one component masked out, the equivalence key for the
/// "differs exactly at `o`" partition.
fn class_key(offsets: &[i64], position: usize) -> SmallVec<[i64; 4]> {
    offsets
        .iter()
        .enumerate()
        .filter_map(|(axis, &offset)| (axis != position).then_some(offset))
        .collect()
}

impl Program {
    /// Per-axis reuse potential of a kernel's iteration space.
    pub fn kernel_reuse_potential(&self, kernel: KernelId) -> Vec<u64> {
        let kernel = self.kernel(kernel);
        let mut result = vec![0u64; kernel.iteration_space().rank()];
        for (_, stencil) in kernel.stencils() {
            let loads = stencil.load_instructions();
            let output_mask = kernel
                .instruction(loads[0])
                .transformation()
                .expect("stencil members are loads")
                .output_mask()
                .to_owned();
            for (position, mask) in output_mask.iter().enumerate() {
                let Some(axis) = *mask else { continue };
                let mut classes: HashMap<SmallVec<[i64; 4]>, u64> = HashMap::new();
                for &load in loads {
                    *classes.entry(class_key(kernel.load_offsets(load), position)).or_default() += 1;
                }
                result[axis] += classes.values().map(|&n| n - 1).sum::<u64>();
            }
        }
        result
    }

    /// Per-axis reuse potential of a buffer's shape, weighted by the trip
    /// counts of the reading kernels.
    ///
    /// Iterates the buffer's readers and, per reader, the stencils
    /// recorded for this buffer (see DESIGN.md on the reader/writer
    /// naming mismatch in the original).
    pub fn buffer_reuse_potential(&self, buffer: BufferId) -> Vec<u64> {
        let mut result = vec![0u64; self.buffer(buffer).shape().rank()];
        let readers: Vec<KernelId> = self.buffer(buffer).reader_kernels().collect();
        for kernel in readers {
            let kernel = self.kernel(kernel);
            for stencil in kernel.stencils_for(buffer) {
                let loads = stencil.load_instructions();
                let output_mask = kernel
                    .instruction(loads[0])
                    .transformation()
                    .expect("stencil members are loads")
                    .output_mask()
                    .to_owned();
                for (position, mask) in output_mask.iter().enumerate() {
                    let Some(axis) = *mask else { continue };
                    let trip_count = kernel.iteration_space().range(axis).size();
                    let mut classes: HashMap<SmallVec<[i64; 4]>, u64> = HashMap::new();
                    for &load in loads {
                        *classes.entry(class_key(kernel.load_offsets(load), position)).or_default() += 1;
                    }
                    result[position] += classes.values().map(|&n| (n - 1) * trip_count).sum::<u64>();
                }
            }
        }
        result
    }
}

/// Axis reordering that moves high-reuse axes innermost.
///
/// The output mask is the stable ascending sort of the axes by their
/// potential, so ties keep their original order; all other fields are
/// defaults. Apply it with `transform_kernel` or `transform_buffer`.
pub fn reuse_optimizing_transformation(potential: &[u64]) -> Transformation {
    let mut axes: Vec<usize> = (0..potential.len()).collect();
    axes.sort_by_key(|&axis| potential[axis]);
    Transformation::permutation(&axes)
}
