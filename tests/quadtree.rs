use proptest::prelude::*;

use runviz::Quadtree;
use runviz::quadtree::Extent;

fn points() -> impl Strategy<Value = Vec<[f64; 2]>> {
    prop::collection::vec(
        prop_oneof![
            (-500.0..500.0f64, -500.0..500.0f64).prop_map(|(x, y)| [x, y]),
            // Small integer grid so coincident points show up regularly.
            (-4i32..4, -4i32..4).prop_map(|(x, y)| [f64::from(x), f64::from(y)]),
        ],
        0..120,
    )
}

fn sorted(mut points: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    points
}

proptest! {
    #[test]
    fn cover_never_shrinks(points in points()) {
        let mut tree = Quadtree::<[f64; 2]>::new();
        let mut previous: Option<Extent> = None;
        for point in points {
            tree.add(point);
            let extent = tree.extent().unwrap();
            prop_assert!(extent.x0 <= point[0] && point[0] <= extent.x1);
            prop_assert!(extent.y0 <= point[1] && point[1] <= extent.y1);
            prop_assert_eq!(extent.x1 - extent.x0, extent.y1 - extent.y0);
            if let Some(before) = previous {
                prop_assert!(extent.x0 <= before.x0 && extent.y0 <= before.y0);
                prop_assert!(extent.x1 >= before.x1 && extent.y1 >= before.y1);
            }
            previous = Some(extent);
        }
    }

    #[test]
    fn every_added_point_is_reachable(points in points()) {
        let tree = Quadtree::from_points(points.clone());
        prop_assert_eq!(tree.size(), points.len());
        let data = tree.data().into_iter().copied().collect::<Vec<_>>();
        prop_assert_eq!(sorted(data), sorted(points));
    }

    #[test]
    fn add_then_remove_restores_the_data(points in points(), extra in (-600.0..600.0f64, -600.0..600.0f64)) {
        let mut tree = Quadtree::from_points(points.clone());
        let before = sorted(tree.data().into_iter().copied().collect());

        let extra = [extra.0, extra.1];
        tree.add(extra);
        prop_assert!(tree.remove(&extra));

        let after = sorted(tree.data().into_iter().copied().collect());
        prop_assert_eq!(before, after);
    }

    #[test]
    fn find_agrees_with_brute_force(
        points in points(),
        probe in (-700.0..700.0f64, -700.0..700.0f64),
        radius in prop::option::of(1.0..400.0f64),
    ) {
        let tree = Quadtree::from_points(points.clone());
        let (x, y) = probe;
        let distance = |p: &[f64; 2]| ((p[0] - x).powi(2) + (p[1] - y).powi(2)).sqrt();

        let expected = points
            .iter()
            .map(distance)
            .filter(|&d| radius.is_none_or(|r| d < r))
            .min_by(f64::total_cmp);
        let found = tree.find(x, y, radius).map(distance);

        match (expected, found) {
            (None, None) => {}
            (Some(expected), Some(found)) => prop_assert!((expected - found).abs() < 1e-9),
            (expected, found) => prop_assert!(false, "expected {:?}, found {:?}", expected, found),
        }
    }
}

#[test]
fn removing_everything_empties_the_tree() {
    let points = vec![[0.0, 0.0], [0.0, 0.0], [3.0, 4.0], [-250.0, 90.5]];
    let mut tree = Quadtree::from_points(points.clone());
    tree.remove_all(&points);
    assert_eq!(tree.size(), 0);
    assert!(tree.find(0.0, 0.0, None).is_none());
}
