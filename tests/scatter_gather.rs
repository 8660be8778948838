use halo_heat::algs::communicator::{Communicator, LocalComm};
use halo_heat::algs::distribute::{Coordinator, Role, gather_field, scatter_field};
use halo_heat::data::grid::GridBuffer;
use halo_heat::heat_error::HeatSimError;
use halo_heat::topology::cart::CartTopology;

mod util;

fn role(coord: Option<&mut Coordinator>) -> Role<'_> {
    match coord {
        Some(co) => Role::Coordinator(co),
        None => Role::Participant { coordinator: 0 },
    }
}

/// Scatter `global` from rank 0 over `dims`, apply `f` to every block, then
/// gather. Returns each rank's scattered block and rank 0's final field.
fn scatter_map_gather<F>(global: &GridBuffer, dims: [usize; 2], f: F) -> (Vec<GridBuffer>, GridBuffer)
where
    F: Fn(usize, &mut GridBuffer) + Sync,
{
    let out = util::run_ranks(dims[0] * dims[1], |c: &LocalComm| {
        let topo = CartTopology::new(c.size(), dims[0], dims[1], c.rank()).unwrap();
        let mut coord = (c.rank() == 0).then(|| Coordinator::new(0, global.clone(), dims).unwrap());
        let block = scatter_field(c, &topo, role(coord.as_mut())).unwrap();
        let mut work = block.with_padding(1).unwrap();
        f(c.rank(), &mut work);
        gather_field(c, &topo, role(coord.as_mut()), &work).unwrap();
        (block, coord.map(Coordinator::into_global))
    });
    let mut blocks = Vec::new();
    let mut gathered = None;
    for (block, global) in out {
        blocks.push(block);
        if global.is_some() {
            gathered = global;
        }
    }
    (blocks, gathered.unwrap())
}

#[test]
fn round_trip_is_bit_identical() {
    for dims in [[1, 1], [2, 2], [3, 1], [1, 4], [3, 2]] {
        let global = util::noise(7, 9, 11);
        let (blocks, back) = scatter_map_gather(&global, dims, |_, _| {});
        assert_eq!(back, global, "mesh {dims:?}");
        let cells: usize = blocks.iter().map(|b| b.len()).sum();
        assert_eq!(cells, global.len());
        assert!(blocks.iter().all(|b| b.padding() == 0));
    }
}

#[test]
fn each_rank_gets_its_own_rectangle() {
    let global = util::ramp(5, 4);
    let (blocks, _) = scatter_map_gather(&global, [2, 2], |_, _| {});
    // rank 1 is mesh (0, 1): columns 0..3, rows 2..4
    assert_eq!(blocks[1].shape(), (3, 2));
    assert_eq!(blocks[1].row(0), &[10.0, 11.0, 12.0]);
    // rank 2 is mesh (1, 0): columns 3..5, rows 0..2
    assert_eq!(blocks[2].row(1), &[8.0, 9.0]);
}

#[test]
fn gathered_blocks_land_where_they_came_from() {
    let global = GridBuffer::new(6, 4, 0).unwrap();
    let (_, back) = scatter_map_gather(&global, [3, 2], |rank, g| {
        for y in 0..g.height() {
            g.row_mut(y).fill(rank as f64);
        }
    });
    // rank = bx * 2 + by, blocks are 2x2
    for y in 0..4 {
        for x in 0..6 {
            assert_eq!(back.get(x, y), ((x / 2) * 2 + y / 2) as f64, "({x}, {y})");
        }
    }
}

#[test]
fn field_smaller_than_mesh_is_rejected_up_front() {
    let global = GridBuffer::new(2, 5, 0).unwrap();
    assert!(matches!(
        Coordinator::new(0, global, [3, 1]),
        Err(HeatSimError::Undersized { axis: "x", .. })
    ));
}
