//! Semantics-preserving rewrites of kernels and buffers.
//!
//! Both passes apply an affine map while keeping the mapping from
//! iteration points to physical buffer elements intact: transforming a
//! buffer composes the map onto the *output* side of every load and store
//! that references it (the transformation already points from iteration
//! to buffer, and the buffer has moved), while transforming a kernel
//! composes the *inverse* onto the input side of every iterating
//! instruction (so that `t⁻¹ ∘ t` cancels against the reindexed iteration
//! space). Either rewrite may shift load offsets, so stencil centers are
//! recomputed afterwards.
//!
//! Both passes stage their compositions before committing anything: a
//! failing composition leaves the program untouched.

use tracing::debug;

use crate::error::Result;
use crate::transformation::Transformation;
use crate::{BufferId, InstId, KernelId, Program};

impl Program {
    /// Replace the buffer's shape by its image under `transformation` and
    /// retarget every load and store referencing it.
    pub fn transform_buffer(&mut self, buffer: BufferId, transformation: &Transformation) -> Result<()> {
        let new_shape = transformation.apply_to_shape(self.buffer(buffer).shape())?;

        // Snapshot the referencing instructions, then stage the rewrites.
        let references: Vec<(KernelId, InstId)> = {
            let b = self.buffer(buffer);
            b.load_instructions().chain(b.store_instructions()).collect()
        };
        let mut staged: Vec<(KernelId, InstId, Transformation)> = Vec::with_capacity(references.len());
        for (kernel, instruction) in references {
            let recorded = self
                .kernel(kernel)
                .instruction(instruction)
                .transformation()
                .expect("reader and writer tables only hold iterating instructions");
            staged.push((kernel, instruction, transformation.compose(recorded)?));
        }

        debug!(buffer = %buffer, %transformation, references = staged.len(), "transforming buffer");
        self.buffer_mut(buffer).set_shape(new_shape);
        let mut touched_kernels: Vec<KernelId> = Vec::new();
        for (kernel, instruction, composed) in staged {
            let slot = self
                .kernel_mut(kernel)
                .instruction_mut(instruction)
                .transformation_mut()
                .expect("reader and writer tables only hold iterating instructions");
            *slot = composed;
            if !touched_kernels.contains(&kernel) {
                touched_kernels.push(kernel);
            }
        }
        // The rewrite may have shifted load offsets.
        for kernel in touched_kernels {
            self.kernel_mut(kernel).recompute_stencil_centers_for(buffer);
        }
        Ok(())
    }

    /// Reindex the kernel's iteration space by `transformation`.
    ///
    /// The identity map skips the iteration-space update but still
    /// recomputes stencil centers, which makes the pass idempotent.
    pub fn transform_kernel(&mut self, kernel: KernelId, transformation: &Transformation) -> Result<()> {
        if !transformation.is_identity() {
            let new_space = transformation.apply_to_shape(self.kernel(kernel).iteration_space())?;
            let inverse = transformation.invert()?;

            let mut staged: Vec<(InstId, Transformation)> = Vec::new();
            for (id, instruction) in self.kernel(kernel).instructions() {
                if let Some(recorded) = instruction.transformation() {
                    staged.push((id, recorded.compose(&inverse)?));
                }
            }

            debug!(kernel = %kernel, %transformation, instructions = staged.len(), "transforming kernel");
            let k = self.kernel_mut(kernel);
            k.set_iteration_space(new_space);
            for (id, composed) in staged {
                let slot =
                    k.instruction_mut(id).transformation_mut().expect("staged rewrites target iterating instructions");
                *slot = composed;
            }
        }
        self.kernel_mut(kernel).recompute_stencil_centers();
        Ok(())
    }
}
