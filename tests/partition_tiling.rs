use halo_heat::DebugInvariants;
use halo_heat::algs::partition::{PartitionMap, split_axis};
use halo_heat::heat_error::HeatSimError;
use proptest::prelude::*;

proptest! {
    #[test]
    fn blocks_tile_the_field_exactly_once(
        w in 1usize..48,
        h in 1usize..48,
        dimx in 1usize..7,
        dimy in 1usize..7,
    ) {
        prop_assume!(w >= dimx && h >= dimy);
        let map = PartitionMap::new(w, h, dimx, dimy).unwrap();
        prop_assert!(map.validate_invariants().is_ok());
        prop_assert_eq!(map.len(), dimx * dimy);

        let mut hits = vec![0u8; w * h];
        for (_, b) in map.iter() {
            prop_assert!(b.width >= 1 && b.height >= 1);
            for y in b.y..b.y + b.height {
                for x in b.x..b.x + b.width {
                    hits[y * w + x] += 1;
                }
            }
        }
        prop_assert!(hits.iter().all(|&n| n == 1));
    }

    #[test]
    fn block_sizes_differ_by_at_most_one(n in 1usize..500, parts in 1usize..32) {
        prop_assume!(n >= parts);
        let pieces = split_axis(n, parts);
        let lens: Vec<_> = pieces.iter().map(|&(_, len)| len).collect();
        let min = *lens.iter().min().unwrap();
        let max = *lens.iter().max().unwrap();
        prop_assert!(max - min <= 1);
        prop_assert_eq!(lens.iter().sum::<usize>(), n);
        // larger pieces come first
        prop_assert!(lens.windows(2).all(|p| p[0] >= p[1]));
    }
}

#[test]
fn remainder_goes_to_leading_blocks() {
    assert_eq!(split_axis(10, 3), vec![(0, 4), (4, 3), (7, 3)]);
    let map = PartitionMap::new(10, 7, 3, 2).unwrap();
    let b = map.block(1, 1).unwrap();
    assert_eq!((b.x, b.y, b.width, b.height), (4, 4, 3, 3));
}

#[test]
fn blocks_are_stored_in_rank_order() {
    let map = PartitionMap::new(6, 6, 3, 2).unwrap();
    let coords: Vec<_> = map.iter().map(|(c, _)| c).collect();
    assert_eq!(coords, vec![[0, 0], [0, 1], [1, 0], [1, 1], [2, 0], [2, 1]]);
}

#[test]
fn axis_shorter_than_mesh_is_rejected() {
    assert!(matches!(
        PartitionMap::new(2, 8, 3, 1),
        Err(HeatSimError::Undersized { axis: "x", len: 2, parts: 3 })
    ));
    assert!(matches!(
        PartitionMap::new(8, 1, 1, 2),
        Err(HeatSimError::Undersized { axis: "y", .. })
    ));
}
