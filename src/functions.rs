//! Collection of simplified mpi routines over distributed arrays
use mpi::collective::Root;
use mpi::datatype::PartitionMut;
use mpi::traits::{Communicator, CommunicatorCollectives, Equivalence};
use mpi::Count;
use ndarray::{ArrayD, IxDyn};
use num_traits::Zero;

use crate::array::PencilArray;
use crate::error::Result;
use crate::layout::{block_len, c_strides, copy_blocked};
use crate::pencil::Pencil;
use crate::topology::CartesianTopology;
use crate::transpose::pack_into;

/// Broadcast scalar value from root to all processes
pub fn broadcast_scalar<T: Zero + Equivalence>(topology: &CartesianTopology, data: &mut T) {
    let root_process = topology.comm().process_at_rank(0);
    root_process.broadcast_into(data);
}

/// Gather the distributed array on every rank.
///
/// Returns the full global array in logical order (extra dimensions
/// trailing). Collective over the topology's communicator; the result is
/// identical on all ranks.
pub fn all_gather<T>(array: &PencilArray<T>) -> Result<ArrayD<T>>
where
    T: Equivalence + Copy + Zero,
{
    let pencil = array.pencil();
    let comm = pencil.topology().comm();
    let sendbuf = pack_local(array);
    let (counts, displs, total) = rank_counts(pencil, array.extra_dims());

    let mut recv = vec![T::zero(); total];
    {
        let mut partition = PartitionMut::new(&mut recv[..], &counts[..], &displs[..]);
        comm.all_gather_varcount_into(&sendbuf[..], &mut partition);
    }
    Ok(assemble(pencil, array.extra_dims(), &recv, &displs))
}

/// Gather the distributed array on the root rank.
///
/// Rank 0 receives `Some(global)`; every other rank receives `None`.
/// Collective over the topology's communicator.
pub fn gather_root<T>(array: &PencilArray<T>) -> Result<Option<ArrayD<T>>>
where
    T: Equivalence + Copy + Zero,
{
    let pencil = array.pencil();
    let comm = pencil.topology().comm();
    let sendbuf = pack_local(array);
    let root_process = comm.process_at_rank(0);

    if comm.rank() == 0 {
        let (counts, displs, total) = rank_counts(pencil, array.extra_dims());
        let mut recv = vec![T::zero(); total];
        {
            let mut partition = PartitionMut::new(&mut recv[..], &counts[..], &displs[..]);
            root_process.gather_varcount_into_root(&sendbuf[..], &mut partition);
        }
        Ok(Some(assemble(pencil, array.extra_dims(), &recv, &displs)))
    } else {
        root_process.gather_varcount_into(&sendbuf[..]);
        Ok(None)
    }
}

/// Local block packed contiguously in logical axis order
fn pack_local<T: Copy + Zero>(array: &PencilArray<T>) -> Vec<T> {
    let local = array.local_ranges_ext();
    let order: Vec<usize> = (0..local.len()).collect();
    let mut out = vec![T::zero(); block_len(&local)];
    pack_into(array, &local, &order, &mut out);
    out
}

/// Per-rank element counts and displacements of the gathered buffer
fn rank_counts(pencil: &Pencil, extra: &[usize]) -> (Vec<Count>, Vec<Count>, usize) {
    let topo = pencil.topology();
    let nprocs = topo.num_processes();
    let mut counts = Vec::with_capacity(nprocs);
    let mut displs = Vec::with_capacity(nprocs);
    let mut acc = 0_usize;
    for rank in 0..nprocs {
        let blk = rank_block(pencil, rank, extra);
        displs.push(acc as Count);
        let len = block_len(&blk);
        counts.push(len as Count);
        acc += len;
    }
    (counts, displs, acc)
}

/// Extended logical ranges owned by `rank`
fn rank_block(pencil: &Pencil, rank: usize, extra: &[usize]) -> Vec<std::ops::Range<usize>> {
    let coords = pencil.topology().coords_of(rank);
    let mut blk: Vec<std::ops::Range<usize>> = (0..pencil.ndim())
        .map(|a| pencil.remote_range(a, &coords))
        .collect();
    blk.extend(extra.iter().map(|&e| 0..e));
    blk
}

/// Place every rank's logical-order chunk into the global array
fn assemble<T: Copy + Zero>(
    pencil: &Pencil,
    extra: &[usize],
    recv: &[T],
    displs: &[Count],
) -> ArrayD<T> {
    let mut gshape = pencil.global_size().to_vec();
    gshape.extend_from_slice(extra);
    let gstrides = c_strides(&gshape);
    let mut global = vec![T::zero(); gshape.iter().product()];

    for rank in 0..pencil.topology().num_processes() {
        let blk = rank_block(pencil, rank, extra);
        let dims: Vec<usize> = blk.iter().map(|r| r.len()).collect();
        let offset: usize = blk
            .iter()
            .zip(&gstrides)
            .map(|(r, s)| r.start * s)
            .sum();
        copy_blocked(
            recv,
            displs[rank] as usize,
            &c_strides(&dims),
            &mut global,
            offset,
            &gstrides,
            &dims,
        );
    }
    ArrayD::from_shape_vec(IxDyn(&gshape), global)
        .expect("assembled buffer matches the global shape")
}
