//! The collective-communication substrate shared by every search component.
//!
//! Components never query a process-wide rank or size. They receive a
//! [`GroupContext`] once and a [`Collective`] to exchange data through, and the
//! same code runs over MPI ([`Communicator`](crate::Communicator), feature
//! `mpi`) or over an in-process thread group ([`LocalComm`](crate::LocalComm)).

use crate::datatype::MpiDatatype;
use crate::error::{Error, Result};

/// Rank and size of the calling process within its worker group.
///
/// Validated once at startup and passed by value into each component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupContext {
    rank: i32,
    size: i32,
}

impl GroupContext {
    /// Rank that loads the input, sets up distribution and owns the results.
    pub const COORDINATOR: i32 = 0;

    /// Build a context, rejecting `size < 1` and ranks outside `0..size`.
    pub fn new(rank: i32, size: i32) -> Result<Self> {
        if size < 1 {
            return Err(Error::InvalidGroupSize(i64::from(size)));
        }
        if !(0..size).contains(&rank) {
            return Err(Error::InvalidRank(rank));
        }
        Ok(GroupContext { rank, size })
    }

    /// Rank of this process.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Number of processes in the group.
    pub fn size(&self) -> i32 {
        self.size
    }

    /// `true` on rank 0.
    pub fn is_coordinator(&self) -> bool {
        self.rank == Self::COORDINATOR
    }
}

/// Blocking, group-wide collective operations.
///
/// Every rank must call the same collectives in the same order. Each call
/// returns only once the whole group has entered it, so a rank never sees a
/// partially-arrived exchange.
///
/// Buffers follow MPI conventions: arguments marked "significant at root" may
/// be empty on the other ranks.
pub trait Collective {
    /// Rank of the calling process.
    fn rank(&self) -> i32;

    /// Number of processes in the group.
    fn size(&self) -> i32;

    /// Validated [`GroupContext`] for this process.
    fn context(&self) -> Result<GroupContext> {
        GroupContext::new(self.rank(), self.size())
    }

    /// Block until every rank has entered the barrier.
    fn barrier(&self) -> Result<()>;

    /// Broadcast `data` from `root`; every rank passes a buffer of the same length.
    fn broadcast<T: MpiDatatype>(&self, data: &mut [T], root: i32) -> Result<()>;

    /// Scatter equal blocks of `send` (significant at root, `recv.len() * size`
    /// elements) so that rank `r` receives block `r` into `recv`.
    fn scatter<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()>;

    /// Gather equal blocks into `recv` (significant at root, `send.len() * size`
    /// elements) in rank order.
    fn gather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()>;

    /// Gather equal blocks into `recv` (`send.len() * size` elements) on every rank.
    fn allgather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T]) -> Result<()>;

    /// Variable-count gather: rank `r`'s `send` lands at
    /// `recv[displs[r]..displs[r] + recvcounts[r]]` on the root.
    ///
    /// `recvcounts`, `displs` and `recv` are significant at root only.
    fn gatherv<T: MpiDatatype>(
        &self,
        send: &[T],
        recv: &mut [T],
        recvcounts: &[i32],
        displs: &[i32],
        root: i32,
    ) -> Result<()>;
}

// ============================================================================
// Argument validation shared by the backends
// ============================================================================

pub(crate) fn check_root(root: i32, size: i32) -> Result<()> {
    if (0..size).contains(&root) {
        Ok(())
    } else {
        Err(Error::InvalidRank(root))
    }
}

pub(crate) fn check_scatter(send_len: usize, recv_len: usize, size: i32) -> Result<()> {
    let expected = recv_len * size as usize;
    if send_len != expected {
        return Err(Error::InvalidBuffer(format!(
            "scatter send buffer has {send_len} elements, expected {expected}"
        )));
    }
    Ok(())
}

pub(crate) fn check_gather(send_len: usize, recv_len: usize, size: i32) -> Result<()> {
    let expected = send_len * size as usize;
    if recv_len != expected {
        return Err(Error::InvalidBuffer(format!(
            "gather receive buffer has {recv_len} elements, expected {expected}"
        )));
    }
    Ok(())
}

/// Root-side checks for `gatherv`: shape of the layout arrays, every block
/// inside the receive buffer, and the root's own contribution matching its count.
pub(crate) fn check_gatherv(
    send_len: usize,
    recv_len: usize,
    recvcounts: &[i32],
    displs: &[i32],
    rank: i32,
    size: i32,
) -> Result<()> {
    let size = size as usize;
    if recvcounts.len() != size || displs.len() != size {
        return Err(Error::InvalidBuffer(format!(
            "gatherv needs {size} counts and displacements, got {} and {}",
            recvcounts.len(),
            displs.len()
        )));
    }
    for (&count, &displ) in recvcounts.iter().zip(displs) {
        if count < 0 {
            return Err(Error::InvalidCount(i64::from(count)));
        }
        if displ < 0 {
            return Err(Error::InvalidCount(i64::from(displ)));
        }
        let end = displ as usize + count as usize;
        if end > recv_len {
            return Err(Error::InvalidBuffer(format!(
                "gatherv block ending at {end} exceeds receive buffer of {recv_len}"
            )));
        }
    }
    let own = recvcounts[rank as usize] as usize;
    if send_len != own {
        return Err(Error::InvalidBuffer(format!(
            "root contributes {send_len} elements but its count is {own}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_rejects_bad_shapes() {
        assert!(matches!(
            GroupContext::new(0, 0),
            Err(Error::InvalidGroupSize(0))
        ));
        assert!(matches!(GroupContext::new(4, 4), Err(Error::InvalidRank(4))));
        assert!(matches!(
            GroupContext::new(-1, 4),
            Err(Error::InvalidRank(-1))
        ));
        let ctx = GroupContext::new(3, 4).unwrap();
        assert_eq!((ctx.rank(), ctx.size()), (3, 4));
        assert!(!ctx.is_coordinator());
        assert!(GroupContext::new(0, 1).unwrap().is_coordinator());
    }

    #[test]
    fn scatter_and_gather_shapes() {
        assert!(check_scatter(12, 3, 4).is_ok());
        assert!(check_scatter(11, 3, 4).is_err());
        assert!(check_gather(2, 8, 4).is_ok());
        assert!(check_gather(2, 7, 4).is_err());
        assert!(check_root(3, 4).is_ok());
        assert!(check_root(4, 4).is_err());
    }

    #[test]
    fn gatherv_layout_checks() {
        // rank 0 of 3 sends 2, peers send 0 and 4
        assert!(check_gatherv(2, 6, &[2, 0, 4], &[0, 2, 2], 0, 3).is_ok());
        // block past the end
        assert!(check_gatherv(2, 5, &[2, 0, 4], &[0, 2, 2], 0, 3).is_err());
        // wrong arity
        assert!(check_gatherv(2, 6, &[2, 4], &[0, 2], 0, 3).is_err());
        // negative count
        assert!(matches!(
            check_gatherv(2, 6, &[2, -1, 4], &[0, 2, 2], 0, 3),
            Err(Error::InvalidCount(-1))
        ));
        // root's own contribution disagrees with its count
        assert!(check_gatherv(3, 6, &[2, 0, 4], &[0, 2, 2], 0, 3).is_err());
    }
}
