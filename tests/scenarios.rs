use approx::assert_relative_eq;
use dect_explorer::{
    DectError, Geometry, HistogramBuilder, Processor, Region, RegionLabeler, RegionTable,
    VolumeSample,
};

const A_VALUES: [f32; 8] = [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0];
const B_VALUES: [f32; 8] = [80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0, 10.0];

fn cube(values: &[f32]) -> VolumeSample<f32> {
    VolumeSample::from_shape_vec(
        (2, 2, 2),
        values.to_vec(),
        Geometry::new((0.7, 0.7, 2.5), (-100.0, -120.0, 35.0)),
    )
    .expect("2x2x2 volume")
}

#[test]
fn small_cube_histogram_conserves_counts() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);

    let (histogram, image) = HistogramBuilder::new(4).build(&a, &b).unwrap();

    assert_eq!(histogram.total(), 8);
    assert_eq!(image.dim(), (4, 4));
    for ((row, col), &cell) in image.data.indexed_iter() {
        let count = histogram.counts()[[col, row]];
        if count > 0 {
            assert!(cell > 0.0);
            assert_relative_eq!(cell, (count as f32).ln_1p(), max_relative = 1e-6);
        } else {
            assert_eq!(cell, 0.0);
        }
    }
    // A and B are anti-correlated, so mass sits on the anti-diagonal.
    assert_eq!(histogram.counts()[[0, 3]], 2);
    assert_eq!(histogram.counts()[[3, 0]], 2);
    assert_eq!(histogram.counts()[[0, 0]], 0);
}

#[test]
fn reversed_b_histogram_is_an_anti_diagonal() {
    let reversed: Vec<f32> = A_VALUES.iter().rev().copied().collect();
    let a = cube(&A_VALUES);
    let b = cube(&reversed);

    let (histogram, image) = HistogramBuilder::new(4).build(&a, &b).unwrap();

    assert_eq!(histogram.total(), 8);
    assert_eq!(histogram.edges_a(), histogram.edges_b());
    for ((a_bin, b_bin), &count) in histogram.counts().indexed_iter() {
        let expected = if a_bin + b_bin == 3 { 2 } else { 0 };
        assert_eq!(count, expected, "cell ({a_bin}, {b_bin})");
        let cell = image.data[[b_bin, a_bin]];
        assert_eq!(cell > 0.0, count > 0);
    }
    assert_relative_eq!(image.max(), 3.0_f32.ln(), max_relative = 1e-6);
}

#[test]
fn small_cube_histogram_geometry() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);
    let (_, image) = HistogramBuilder::new(4).build(&a, &b).unwrap();

    assert_relative_eq!(image.geometry.spacing.0, 17.5);
    assert_relative_eq!(image.geometry.spacing.1, 17.5);
    assert_relative_eq!(image.geometry.spacing.2, 10.0);
    assert_eq!(image.geometry.origin, (0.0, 10.0, 0.0));
    assert_eq!(image.value_at(2, 1), (35.0, 27.5));
}

#[test]
fn single_region_picks_one_voxel() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);

    let labels = RegionLabeler::default()
        .label(&a, &b, &[Region::new(10.0, 70.0)], 5.0)
        .unwrap();

    assert_eq!(
        labels.data.iter().copied().collect::<Vec<_>>(),
        vec![0, 1, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(labels.geometry, a.geometry);
}

#[test]
fn identical_regions_resolve_to_the_later_one() {
    let a = cube(&A_VALUES);
    let b = cube(&A_VALUES);

    let regions = [Region::new(5.0, 5.0), Region::new(5.0, 5.0)];
    let labels = RegionLabeler::default()
        .label(&a, &b, &regions, 10.0)
        .unwrap();

    assert_eq!(
        labels.data.iter().copied().collect::<Vec<_>>(),
        vec![2, 2, 0, 0, 0, 0, 0, 0]
    );
    assert!(labels.data.iter().all(|&label| label != 1));
}

#[test]
fn unmatched_voxels_stay_background() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);
    let labels = RegionLabeler::default()
        .label(&a, &b, &[Region::new(1000.0, 1000.0)], 50.0)
        .unwrap();
    assert_eq!(labels.label_counts(1), vec![8, 0]);
}

#[test]
fn mismatched_shapes_fail_both_operations() {
    let a = cube(&A_VALUES);
    let b = VolumeSample::from_shape_vec((1, 2, 4), B_VALUES.to_vec(), Geometry::default())
        .unwrap();

    let expected = DectError::ShapeMismatch {
        a: (2, 2, 2),
        b: (1, 2, 4),
    };
    assert_eq!(HistogramBuilder::new(4).build(&a, &b).unwrap_err(), expected);
    assert_eq!(
        RegionLabeler::default()
            .label(&a, &b, &[Region::new(0.0, 0.0)], 1.0)
            .unwrap_err(),
        expected
    );
}

#[test]
fn repeated_calls_are_identical() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);
    let regions = [Region::new(30.0, 50.0), Region::new(40.0, 40.0)];

    for processor in [Processor::Serial, Processor::Parallel] {
        let builder = HistogramBuilder::new(5).with_processor(processor);
        assert_eq!(builder.build(&a, &b).unwrap(), builder.build(&a, &b).unwrap());

        let labeler = RegionLabeler::new(processor);
        let first = labeler.label(&a, &b, &regions, 10.0).unwrap();
        let second = labeler.label(&a, &b, &regions, 10.0).unwrap();
        assert_eq!(first.data, second.data);
    }
}

#[test]
fn picked_histogram_pixels_drive_labeling() {
    let a = cube(&A_VALUES);
    let b = cube(&B_VALUES);
    let (_, image) = HistogramBuilder::new(7).build(&a, &b).unwrap();

    // Bin widths are exactly 10, so pixel (col, row) reads back as (10*col, 10 + 10*row).
    let mut table = RegionTable::new();
    table.push_pixel(&image, 3, 4);
    assert_eq!(table.as_slice(), &[Region::new(30.0, 50.0)]);

    let labels = RegionLabeler::default()
        .label(&a, &b, table.as_slice(), 0.0)
        .unwrap();
    assert_eq!(labels.label_counts(1), vec![7, 1]);
    assert_eq!(labels.data[[0, 1, 1]], 1);
}
