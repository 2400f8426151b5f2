//! Property suites for the transformation algebra, stencil grouping, and
//! the element-type promotion lattice.


use proptest::prelude::*;

use crate::range::Range;
use crate::shape::Shape;
use crate::test::helpers::stencil_program;
use crate::transformation::Transformation;

/// Shifted permutations: the invertible fragment of the algebra that
/// kernel reordering actually uses.
fn shifted_permutations(rank: usize) -> impl Strategy<Value = Transformation> {
    (Just((0..rank).collect::<Vec<usize>>()).prop_shuffle(), proptest::collection::vec(-16i64..16, rank)).prop_map(
        |(axes, offsets)| {
            Transformation::permutation(&axes)
                .compose(
                    &Transformation::affine()
                        .input_rank(axes.len())
                        .output_rank(axes.len())
                        .offsets(offsets)
                        .call()
                        .unwrap(),
                )
                .unwrap()
        },
    )
}

fn small_shapes(rank: usize) -> impl Strategy<Value = Shape> {
    proptest::collection::vec((-4i64..4, 1i64..4, 1u64..5), rank)
        .prop_map(|ranges| ranges.into_iter().map(|(start, step, size)| Range::new(start, step, size).unwrap()).collect())
}

/// All points of a small shape.
fn points(shape: &Shape) -> Vec<Vec<i64>> {
    let mut points = vec![Vec::new()];
    for range in shape.ranges() {
        let values: Vec<i64> = (0..range.size() as i64).map(|k| range.start() + k * range.step()).collect();
        points = points
            .into_iter()
            .flat_map(|point| {
                values.iter().map(move |&value| {
                    let mut extended = point.clone();
                    extended.push(value);
                    extended
                })
            })
            .collect();
    }
    points
}

proptest! {
    #[test]
    fn invert_is_an_involution(t in shifted_permutations(3)) {
        let inverse = t.invert().unwrap();
        prop_assert_eq!(inverse.invert().unwrap(), t);
    }

    #[test]
    fn inverse_undoes_application(t in shifted_permutations(3), point in proptest::collection::vec(-20i64..20, 3)) {
        let inverse = t.invert().unwrap();
        let image = t.apply_to_index(&point).unwrap();
        prop_assert_eq!(inverse.apply_to_index(&image).unwrap().to_vec(), point);
    }

    #[test]
    fn compose_is_associative(
        a in shifted_permutations(3),
        b in shifted_permutations(3),
        c in shifted_permutations(3),
    ) {
        let left = a.compose(&b).unwrap().compose(&c).unwrap();
        let right = a.compose(&b.compose(&c).unwrap()).unwrap();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn compose_agrees_with_pointwise_application(
        a in shifted_permutations(3),
        b in shifted_permutations(3),
        point in proptest::collection::vec(-20i64..20, 3),
    ) {
        let composed = a.compose(&b).unwrap();
        let stepwise = a.apply_to_index(&b.apply_to_index(&point).unwrap()).unwrap();
        prop_assert_eq!(composed.apply_to_index(&point).unwrap(), stepwise);
    }

    #[test]
    fn shape_images_contain_point_images(t in shifted_permutations(3), shape in small_shapes(3)) {
        let image = t.apply_to_shape(&shape).unwrap();
        for point in points(&shape) {
            let mapped = t.apply_to_index(&point).unwrap();
            for (axis, range) in image.ranges().iter().enumerate() {
                prop_assert!(range.contains(mapped[axis]));
            }
        }
        prop_assert_eq!(image.size(), shape.size());
    }

    #[test]
    fn transform_kernel_roundtrips(t in shifted_permutations(1), offsets in proptest::collection::vec(-3i64..4, 1..5)) {
        let mut stencil = stencil_program(&offsets, 100);
        let before = crate::debug::dump_program(&stencil.program);
        stencil.program.transform_kernel(stencil.kernel, &t).unwrap();
        stencil.program.transform_kernel(stencil.kernel, &t.invert().unwrap()).unwrap();
        prop_assert_eq!(crate::debug::dump_program(&stencil.program), before);
    }

    #[test]
    fn reinserting_a_load_is_idempotent_on_structure(offset in -7i64..8) {
        let mut stencil = stencil_program(&[offset], 100);
        let centers_before: Vec<Vec<i64>> = stencil
            .program
            .kernel(stencil.kernel)
            .stencils_for(stencil.source)
            .iter()
            .map(|s| s.center().to_vec())
            .collect();
        stencil.program.add_load(stencil.kernel, stencil.source, crate::test::helpers::shifted(1, vec![offset])).unwrap();
        let kernel = stencil.program.kernel(stencil.kernel);
        prop_assert_eq!(kernel.stencils_for(stencil.source).len(), centers_before.len());
        let centers_after: Vec<Vec<i64>> = kernel.stencils_for(stencil.source).iter().map(|s| s.center().to_vec()).collect();
        prop_assert_eq!(centers_after, centers_before);
    }
}
