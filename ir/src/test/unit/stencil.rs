//! Stencil grouping tests.

use lazir_ntype::NType;

use crate::program::Program;
use crate::test::helpers::{linked_task, shifted, stencil_program};
use crate::transformation::Transformation;
use crate::{STENCIL_MAX_RADIUS, shape};

#[test]
fn test_three_point_stencil_collapses_into_one() {
    let stencil = stencil_program(&[-1, 0, 1], 100);
    let kernel = stencil.program.kernel(stencil.kernel);
    let stencils = kernel.stencils_for(stencil.source);
    assert_eq!(stencils.len(), 1);
    assert_eq!(stencils[0].center(), &[0]);
    assert_eq!(stencils[0].load_instructions(), stencil.loads.as_slice());
    stencil.program.validate().unwrap();
}

#[test]
fn test_identical_loads_share_a_stencil() {
    let stencil = stencil_program(&[4, 4], 100);
    let stencils = stencil.program.kernel(stencil.kernel).stencils_for(stencil.source);
    assert_eq!(stencils.len(), 1);
    assert_eq!(stencils[0].load_instructions().len(), 2);
    assert_eq!(stencils[0].center(), &[4]);
}

#[test]
fn test_reinsertion_does_not_move_the_center() {
    let mut stencil = stencil_program(&[-1, 0, 1], 100);
    let before = stencil.program.kernel(stencil.kernel).stencils_for(stencil.source).to_vec();
    // Re-inserting an existing access pattern joins the stencil it came
    // from; the floored mean over the duplicated offsets is unchanged.
    stencil.program.add_load(stencil.kernel, stencil.source, shifted(1, vec![0])).unwrap();
    let after = stencil.program.kernel(stencil.kernel).stencils_for(stencil.source);
    assert_eq!(after.len(), before.len());
    assert_eq!(after[0].center(), before[0].center());
    assert_eq!(after[0].load_instructions().len(), before[0].load_instructions().len() + 1);
}

#[test]
fn test_radius_boundary_is_exact() {
    // Unit steps: two offsets 14 apart center at 7, both exactly on the
    // radius; 15 apart pushes one side past it.
    let accepted = stencil_program(&[0, 14], 100);
    let stencils = accepted.program.kernel(accepted.kernel).stencils_for(accepted.source);
    assert_eq!(stencils.len(), 1);
    assert_eq!(stencils[0].center(), &[7]);

    let rejected = stencil_program(&[0, 15], 100);
    let stencils = rejected.program.kernel(rejected.kernel).stencils_for(rejected.source);
    assert_eq!(stencils.len(), 2);
    assert_eq!(stencils[0].center(), &[0]);
    assert_eq!(stencils[1].center(), &[15]);
    rejected.program.validate().unwrap();
}

#[test]
fn test_radius_scales_with_buffer_step() {
    // Buffer ranges step by 4, so the radius bound is 28.
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let source = program.create_buffer(task, shape![(0, 4, 100)], NType::Float64, 1);
    let kernel = program.create_kernel(task, shape![100]);
    program.add_load(kernel, source, shifted(1, vec![0])).unwrap();
    program.add_load(kernel, source, shifted(1, vec![4 * STENCIL_MAX_RADIUS * 2])).unwrap();
    assert_eq!(program.kernel(kernel).stencils_for(source).len(), 1);

    program.add_load(kernel, source, shifted(1, vec![200])).unwrap();
    assert_eq!(program.kernel(kernel).stencils_for(source).len(), 2);
}

#[test]
fn test_access_patterns_do_not_mix() {
    let mut program = Program::new();
    let task = linked_task(&mut program);
    let source = program.create_buffer(task, shape![100], NType::Float64, 1);
    let kernel = program.create_kernel(task, shape![100]);
    program.add_load(kernel, source, Transformation::identity(1)).unwrap();
    // Same offsets, different scaling: a different access pattern.
    let strided =
        Transformation::affine().input_rank(1).output_rank(1).scalings(vec![2]).call().unwrap();
    program.add_load(kernel, source, strided).unwrap();
    assert_eq!(program.kernel(kernel).stencils_for(source).len(), 2);
}

#[test]
fn test_first_matching_stencil_wins() {
    // Two far-apart stencils; a load near the first joins the first even
    // though both share the access pattern.
    let stencil = stencil_program(&[0, 60], 100);
    let mut program = stencil.program;
    program.add_load(stencil.kernel, stencil.source, shifted(1, vec![1])).unwrap();
    let stencils = program.kernel(stencil.kernel).stencils_for(stencil.source);
    assert_eq!(stencils.len(), 2);
    assert_eq!(stencils[0].load_instructions().len(), 2);
    assert_eq!(stencils[1].load_instructions().len(), 1);
}

#[test]
fn test_loads_are_recorded_in_reader_tables() {
    let stencil = stencil_program(&[-1, 0, 1], 100);
    let readers: Vec<_> = stencil.program.buffer(stencil.source).readers().collect();
    assert_eq!(readers.len(), 1);
    let (kernel, loads) = readers[0];
    assert_eq!(kernel, stencil.kernel);
    assert_eq!(loads, stencil.loads.as_slice());
}
