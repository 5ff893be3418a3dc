//! Redistribution of arrays between pencils that differ in one
//! decomposed axis
//!
//! The exchange is an all-to-all confined to the sub-communicator of the
//! grid axis whose decomposed dimension changes: within that group every
//! process owns a share of the same slab of the global array, so each peer
//! pair only trades the intersection of their local blocks. Packing and
//! unpacking run through contiguous scratch buffers whose in-buffer axis
//! order can follow the destination's memory layout, making the receiving
//! side a straight copy.
use std::ops::Range;

use log::{debug, trace};
use mpi::datatype::{Partition, PartitionMut};
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator, CommunicatorCollectives, Destination, Equivalence, Source};
use mpi::Count;
use num_traits::Zero;

use crate::array::PencilArray;
use crate::error::{PencilError, Result};
use crate::layout::{block_len, block_offset, c_strides, copy_blocked, intersect};

/// How the all-to-all exchange is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransposeMethod {
    /// Phased point-to-point exchange: in phase `k` each rank trades with
    /// partner `r ^ k` (power-of-two groups) or `(r + k) % p` / `(r - k) % p`
    #[default]
    PairwiseExchange,
    /// One `MPI_Alltoallv` over the exchange sub-communicator
    Alltoallv,
}

/// Whether packing may reorder block axes into the destination's memory
/// order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermuteDims {
    /// Pack in destination memory order so unpacking is contiguous
    #[default]
    Auto,
    /// Keep source memory order; the receiver permutes while unpacking
    Never,
}

/// Where the contiguous exchange buffers come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferStrategy {
    /// Borrow the scratch owned by the source (send) and destination
    /// (receive) pencils, growing it on demand
    #[default]
    ReusePencil,
    /// Allocate fresh buffers for this call only
    PerCall,
}

/// Configuration of a transposition. The defaults match
/// [`transpose`]; every rank must pass identical options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransposeOptions {
    /// Exchange schedule
    pub method: TransposeMethod,
    /// In-buffer axis order policy
    pub permute_dims: PermuteDims,
    /// Scratch buffer policy
    pub buffer_strategy: BufferStrategy,
}

/// Redistribute `src` into `dst` with default options.
///
/// The two pencils must share one topology and differ in at most one
/// decomposed-axis position; global shape and extra dimensions must match.
/// Collective over the topology's communicator.
pub fn transpose<T>(src: &PencilArray<T>, dst: &mut PencilArray<T>) -> Result<()>
where
    T: Equivalence + Copy + Zero,
{
    transpose_with(src, dst, &TransposeOptions::default())
}

/// Redistribute `src` into `dst` with explicit options.
///
/// On failure the destination contents are undefined.
pub fn transpose_with<T>(
    src: &PencilArray<T>,
    dst: &mut PencilArray<T>,
    options: &TransposeOptions,
) -> Result<()>
where
    T: Equivalence + Copy + Zero,
{
    let sp = src.pencil();
    let dp = dst.pencil();
    if !std::ptr::eq(sp.topology(), dp.topology()) {
        return Err(PencilError::IncompatibleTransposition {
            reason: "pencils do not share a topology".into(),
        });
    }
    if sp.global_size() != dp.global_size() {
        return Err(PencilError::IncompatibleTransposition {
            reason: format!(
                "global shapes differ: {:?} vs {:?}",
                sp.global_size(),
                dp.global_size()
            ),
        });
    }
    if src.extra_dims() != dst.extra_dims() {
        return Err(PencilError::IncompatibleTransposition {
            reason: format!(
                "extra dimensions differ: {:?} vs {:?}",
                src.extra_dims(),
                dst.extra_dims()
            ),
        });
    }

    match find_exchange_axis(sp.decomp_dims(), dp.decomp_dims())? {
        None => {
            // identical decomposition; at most the memory layout changes
            let block = dst.local_ranges_ext();
            copy_block(src, dst, &block);
            Ok(())
        }
        Some(g) if sp.topology().size(g) == 1 => {
            let block = dst.local_ranges_ext();
            copy_block(src, dst, &block);
            Ok(())
        }
        Some(g) => exchange(src, dst, g, options),
    }
}

/// The single grid axis on which the two decompositions differ.
///
/// `Ok(None)` means the decompositions are identical; more than one
/// differing position is rejected before any communication.
fn find_exchange_axis(src: &[usize], dst: &[usize]) -> Result<Option<usize>> {
    if src.len() != dst.len() {
        return Err(PencilError::IncompatibleTransposition {
            reason: "pencils decompose a different number of axes".into(),
        });
    }
    let mut differing = src
        .iter()
        .zip(dst)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(g, _)| g);
    match (differing.next(), differing.next()) {
        (Some(g), None) => Ok(Some(g)),
        (None, _) => Ok(None),
        (Some(_), Some(_)) => Err(PencilError::IncompatibleTransposition {
            reason: "decomposed dimensions differ on more than one grid axis".into(),
        }),
    }
}

fn exchange<T>(
    src: &PencilArray<T>,
    dst: &mut PencilArray<T>,
    g: usize,
    options: &TransposeOptions,
) -> Result<()>
where
    T: Equivalence + Copy + Zero,
{
    let sp = src.pencil();
    let dp = dst.pencil();
    let topo = sp.topology();
    let sub = topo.subcomm(g);
    let p = topo.size(g);
    let r = topo.coords()[g];
    let n = sp.ndim();
    let extra = src.extra_dims();

    // Per-peer block extents in extended logical coordinates. The send
    // block to peer q and q's receive block from us describe the same set,
    // so both sides agree on every buffer layout derived from them.
    let mut peer_coords = topo.coords().to_vec();
    let mut send_blocks = Vec::with_capacity(p);
    let mut recv_blocks = Vec::with_capacity(p);
    for q in 0..p {
        peer_coords[g] = q;
        let mut sblk: Vec<Range<usize>> = (0..n)
            .map(|a| intersect(&sp.local_range(a), &dp.remote_range(a, &peer_coords)))
            .collect();
        sblk.extend(extra.iter().map(|&e| 0..e));
        send_blocks.push(sblk);
        let mut rblk: Vec<Range<usize>> = (0..n)
            .map(|a| intersect(&dp.local_range(a), &sp.remote_range(a, &peer_coords)))
            .collect();
        rblk.extend(extra.iter().map(|&e| 0..e));
        recv_blocks.push(rblk);
    }

    let send_counts: Vec<usize> = (0..p)
        .map(|q| if q == r { 0 } else { block_len(&send_blocks[q]) })
        .collect();
    let recv_counts: Vec<usize> = (0..p)
        .map(|q| if q == r { 0 } else { block_len(&recv_blocks[q]) })
        .collect();
    let send_displs = prefix_sums(&send_counts);
    let recv_displs = prefix_sums(&recv_counts);
    let total_send = send_displs[p];
    let total_recv = recv_displs[p];

    // in-buffer axis order, derived identically on both ends of each pair
    let order = match options.permute_dims {
        PermuteDims::Auto => dst.mem_axis_order(),
        PermuteDims::Never => src.mem_axis_order(),
    };

    debug!(
        "transpose on grid axis {}: subgroup size {}, sub-rank {}, sending {} and receiving {} elements",
        g, p, r, total_send, total_recv
    );

    if options.buffer_strategy == BufferStrategy::ReusePencil {
        let mut send_guard = sp.send_scratch();
        let mut recv_guard = dp.recv_scratch();
        if let (Some(sbuf), Some(rbuf)) = (
            send_guard.typed_mut::<T>(total_send),
            recv_guard.typed_mut::<T>(total_recv),
        ) {
            return run_exchange(
                src, dst, sub, p, r, &send_blocks, &recv_blocks, &send_counts, &recv_counts,
                &send_displs, &recv_displs, &order, options.method, sbuf, rbuf,
            );
        }
        trace!("pencil scratch unsuitable for this element type, allocating per call");
    }
    let mut sbuf = vec![T::zero(); total_send];
    let mut rbuf = vec![T::zero(); total_recv];
    run_exchange(
        src, dst, sub, p, r, &send_blocks, &recv_blocks, &send_counts, &recv_counts,
        &send_displs, &recv_displs, &order, options.method, &mut sbuf, &mut rbuf,
    )
}

#[allow(clippy::too_many_arguments)]
fn run_exchange<T>(
    src: &PencilArray<T>,
    dst: &mut PencilArray<T>,
    sub: &SimpleCommunicator,
    p: usize,
    r: usize,
    send_blocks: &[Vec<Range<usize>>],
    recv_blocks: &[Vec<Range<usize>>],
    send_counts: &[usize],
    recv_counts: &[usize],
    send_displs: &[usize],
    recv_displs: &[usize],
    order: &[usize],
    method: TransposeMethod,
    sbuf: &mut [T],
    rbuf: &mut [T],
) -> Result<()>
where
    T: Equivalence + Copy,
{
    // pack every outgoing block before any traffic
    for q in 0..p {
        if send_counts[q] > 0 {
            let seg = &mut sbuf[send_displs[q]..send_displs[q] + send_counts[q]];
            pack_into(src, &send_blocks[q], order, seg);
        }
    }

    // the self block never crosses the network; copying it here lets it
    // proceed alongside the exchange phases
    copy_block(src, dst, &send_blocks[r]);

    match method {
        TransposeMethod::PairwiseExchange => {
            for k in 1..p {
                let (to, from) = if p.is_power_of_two() {
                    (r ^ k, r ^ k)
                } else {
                    ((r + k) % p, (r + p - k) % p)
                };
                let sc = send_counts[to];
                let rc = recv_counts[from];
                let rseg = recv_displs[from]..recv_displs[from] + rc;
                mpi::request::scope(|scope| {
                    let rreq = if rc > 0 {
                        Some(sub.process_at_rank(from as i32).immediate_receive_into_with_tag(
                            scope,
                            &mut rbuf[rseg.clone()],
                            k as i32,
                        ))
                    } else {
                        None
                    };
                    let sreq = if sc > 0 {
                        Some(sub.process_at_rank(to as i32).immediate_send_with_tag(
                            scope,
                            &sbuf[send_displs[to]..send_displs[to] + sc],
                            k as i32,
                        ))
                    } else {
                        None
                    };
                    if let Some(req) = sreq {
                        req.wait_without_status();
                    }
                    if let Some(req) = rreq {
                        let status = req.wait();
                        let got = status.count(T::equivalent_datatype()) as usize;
                        if got != rc {
                            return Err(PencilError::TransportFailure {
                                peer: from as i32,
                                reason: format!("expected {} elements, received {}", rc, got),
                            });
                        }
                    }
                    Ok(())
                })?;
                if rc > 0 {
                    unpack_from(&rbuf[rseg], recv_blocks[from].as_slice(), order, dst);
                }
                trace!("phase {}: sent {} to {}, received {} from {}", k, sc, to, rc, from);
            }
        }
        TransposeMethod::Alltoallv => {
            let sc: Vec<Count> = send_counts.iter().map(|&c| c as Count).collect();
            let sd: Vec<Count> = send_displs[..p].iter().map(|&d| d as Count).collect();
            let rc: Vec<Count> = recv_counts.iter().map(|&c| c as Count).collect();
            let rd: Vec<Count> = recv_displs[..p].iter().map(|&d| d as Count).collect();
            let send_part = Partition::new(&sbuf[..], &sc[..], &sd[..]);
            let mut recv_part = PartitionMut::new(&mut rbuf[..], &rc[..], &rd[..]);
            sub.all_to_all_varcount_into(&send_part, &mut recv_part);
            for q in 0..p {
                if recv_counts[q] > 0 {
                    let seg = &rbuf[recv_displs[q]..recv_displs[q] + recv_counts[q]];
                    unpack_from(seg, recv_blocks[q].as_slice(), order, dst);
                }
            }
        }
    }
    Ok(())
}

/// Copy a logical block out of the source storage into a contiguous
/// buffer whose axes follow `order` (slowest to fastest)
pub(crate) fn pack_into<T: Copy>(src: &PencilArray<T>, block: &[Range<usize>], order: &[usize], out: &mut [T]) {
    let strides = src.strides_ext();
    let local = src.local_ranges_ext();
    let offset = block_offset(block, &local, &strides);
    let dims: Vec<usize> = order.iter().map(|&a| block[a].len()).collect();
    let src_strides: Vec<usize> = order.iter().map(|&a| strides[a]).collect();
    let out_strides = c_strides(&dims);
    copy_blocked(src.as_slice(), offset, &src_strides, out, 0, &out_strides, &dims);
}

/// Scatter a contiguous buffer in `order` layout into the destination's
/// local storage
fn unpack_from<T: Copy>(
    buf: &[T],
    block: &[Range<usize>],
    order: &[usize],
    dst: &mut PencilArray<T>,
) {
    let strides = dst.strides_ext();
    let local = dst.local_ranges_ext();
    let offset = block_offset(block, &local, &strides);
    let dims: Vec<usize> = order.iter().map(|&a| block[a].len()).collect();
    let dst_strides: Vec<usize> = order.iter().map(|&a| strides[a]).collect();
    let buf_strides = c_strides(&dims);
    copy_blocked(buf, 0, &buf_strides, dst.as_slice_mut(), offset, &dst_strides, &dims);
}

/// Copy a logical block directly between two local storages, reordering
/// between their memory layouts; iteration follows the destination layout
fn copy_block<T: Copy>(src: &PencilArray<T>, dst: &mut PencilArray<T>, block: &[Range<usize>]) {
    let sstrides = src.strides_ext();
    let dstrides = dst.strides_ext();
    let soffset = block_offset(block, &src.local_ranges_ext(), &sstrides);
    let doffset = block_offset(block, &dst.local_ranges_ext(), &dstrides);
    let order = dst.mem_axis_order();
    let dims: Vec<usize> = order.iter().map(|&a| block[a].len()).collect();
    let ss: Vec<usize> = order.iter().map(|&a| sstrides[a]).collect();
    let ds: Vec<usize> = order.iter().map(|&a| dstrides[a]).collect();
    copy_blocked(src.as_slice(), soffset, &ss, dst.as_slice_mut(), doffset, &ds, &dims);
}

fn prefix_sums(counts: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(counts.len() + 1);
    let mut acc = 0;
    out.push(0);
    for &c in counts {
        acc += c;
        out.push(acc);
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exchange_axis_detection() {
        assert_eq!(find_exchange_axis(&[1, 2], &[0, 2]).unwrap(), Some(0));
        assert_eq!(find_exchange_axis(&[1, 2], &[1, 0]).unwrap(), Some(1));
        assert_eq!(find_exchange_axis(&[1, 2], &[1, 2]).unwrap(), None);
        assert_eq!(find_exchange_axis(&[0], &[1]).unwrap(), Some(0));
    }

    #[test]
    fn rejects_double_exchange() {
        assert!(matches!(
            find_exchange_axis(&[0, 1], &[1, 2]),
            Err(PencilError::IncompatibleTransposition { .. })
        ));
        assert!(find_exchange_axis(&[0, 1], &[0]).is_err());
    }

    #[test]
    fn prefix_sums_with_terminator() {
        assert_eq!(prefix_sums(&[3, 0, 2]), vec![0, 3, 3, 5]);
        assert_eq!(prefix_sums(&[]), vec![0]);
    }

    #[test]
    fn default_options() {
        let o = TransposeOptions::default();
        assert_eq!(o.method, TransposeMethod::PairwiseExchange);
        assert_eq!(o.permute_dims, PermuteDims::Auto);
        assert_eq!(o.buffer_strategy, BufferStrategy::ReusePencil);
    }
}
