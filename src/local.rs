//! In-process worker group: one thread per rank.
//!
//! [`LocalGroup`] runs the same rank-parameterised closure on `size` scoped
//! threads, each holding a [`LocalComm`] that implements [`Collective`]. Every
//! collective is a single round over a shared slot table:
//!
//! 1. contributing ranks deposit a copy of their buffer in their own slot,
//! 2. rendezvous,
//! 3. ranks that receive data copy it out of the peers' slots,
//! 4. rendezvous, then each rank clears its own slot.
//!
//! A rank whose closure returns `Err` or panics aborts the group, and every
//! peer blocked in a collective returns [`Error::Aborted`] instead of waiting
//! forever.
//!
//! # Example
//!
//! ```
//! use ferrogrep::{Collective, LocalGroup};
//!
//! let group = LocalGroup::new(4).unwrap();
//! let sums = group.run(|comm| {
//!     let mut all = vec![0u64; 4];
//!     comm.allgather(&[comm.rank() as u64], &mut all)?;
//!     Ok(all.iter().sum::<u64>())
//! });
//! for sum in sums {
//!     assert_eq!(sum.unwrap(), 6);
//! }
//! ```

use std::any::Any;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::collective::{check_gather, check_gatherv, check_root, check_scatter, Collective};
use crate::datatype::MpiDatatype;
use crate::error::{Error, Result};

type Slot = Option<Box<dyn Any + Send>>;

/// Generation-counting barrier that can be torn down.
struct Rendezvous {
    size: usize,
    state: Mutex<RendezvousState>,
    cvar: Condvar,
}

#[derive(Default)]
struct RendezvousState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

impl Rendezvous {
    fn new(size: usize) -> Self {
        Rendezvous {
            size,
            state: Mutex::new(RendezvousState::default()),
            cvar: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(Error::Aborted);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.size {
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.aborted {
            self.cvar.wait(&mut state);
        }
        if state.generation == generation {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        self.state.lock().aborted = true;
        self.cvar.notify_all();
    }
}

struct Shared {
    rendezvous: Rendezvous,
    slots: Mutex<Vec<Slot>>,
}

impl Shared {
    fn new(size: usize) -> Self {
        Shared {
            rendezvous: Rendezvous::new(size),
            slots: Mutex::new((0..size).map(|_| None).collect()),
        }
    }
}

/// Aborts the group if the owning rank unwinds.
struct AbortOnPanic(Arc<Shared>);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.rendezvous.abort();
        }
    }
}

/// A fixed-size group of in-process ranks.
#[derive(Debug, Clone, Copy)]
pub struct LocalGroup {
    size: usize,
}

impl LocalGroup {
    /// Create a group of `size` ranks.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 || i32::try_from(size).is_err() {
            return Err(Error::InvalidGroupSize(size as i64));
        }
        Ok(LocalGroup { size })
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` once per rank, each on its own thread, and return the results in
    /// rank order.
    pub fn run<F, T>(&self, f: F) -> Vec<Result<T>>
    where
        F: Fn(LocalComm) -> Result<T> + Sync,
        T: Send,
    {
        let shared = Arc::new(Shared::new(self.size));
        let size = self.size as i32;
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = LocalComm {
                        rank,
                        size,
                        shared: Arc::clone(&shared),
                    };
                    let group = Arc::clone(&shared);
                    let spawned = thread::Builder::new()
                        .name(format!("ferrogrep-rank-{rank}"))
                        .spawn_scoped(scope, move || {
                            let _guard = AbortOnPanic(Arc::clone(&group));
                            let outcome = f(comm);
                            if outcome.is_err() {
                                group.rendezvous.abort();
                            }
                            outcome
                        });
                    if spawned.is_err() {
                        shared.rendezvous.abort();
                    }
                    spawned
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Internal(format!("rank {rank} panicked")))),
                    Err(e) => Err(Error::Internal(format!("failed to spawn rank {rank}: {e}"))),
                })
                .collect()
        })
    }
}

/// One rank's handle on a [`LocalGroup`].
pub struct LocalComm {
    rank: i32,
    size: i32,
    shared: Arc<Shared>,
}

impl LocalComm {
    fn slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.shared.slots.lock()
    }

    /// One deposit/consume exchange. The second rendezvous is reached even when
    /// `consume` fails, so a local argument error never desynchronises peers.
    fn round<T, R>(
        &self,
        contribution: Option<Vec<T>>,
        consume: impl FnOnce(&[Slot]) -> Result<R>,
    ) -> Result<R>
    where
        T: MpiDatatype,
    {
        if let Some(data) = contribution {
            self.slots()[self.rank as usize] = Some(Box::new(data));
        }
        self.shared.rendezvous.wait()?;
        let outcome = consume(&self.slots());
        self.shared.rendezvous.wait()?;
        self.slots()[self.rank as usize] = None;
        outcome
    }
}

fn peer<T: MpiDatatype>(slots: &[Slot], rank: usize) -> Result<&[T]> {
    slots[rank]
        .as_ref()
        .and_then(|slot| slot.downcast_ref::<Vec<T>>())
        .map(Vec::as_slice)
        .ok_or_else(|| Error::Internal(format!("rank {rank} left no matching contribution")))
}

impl Collective for LocalComm {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        self.size
    }

    fn barrier(&self) -> Result<()> {
        self.shared.rendezvous.wait()
    }

    fn broadcast<T: MpiDatatype>(&self, data: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size)?;
        let contribution = (self.rank == root).then(|| data.to_vec());
        self.round(contribution, |slots| {
            if self.rank != root {
                let src = peer::<T>(slots, root as usize)?;
                if src.len() != data.len() {
                    return Err(Error::InvalidBuffer(format!(
                        "broadcast of {} elements into buffer of {}",
                        src.len(),
                        data.len()
                    )));
                }
                data.copy_from_slice(src);
            }
            Ok(())
        })
    }

    fn scatter<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size)?;
        let contribution = if self.rank == root {
            check_scatter(send.len(), recv.len(), self.size)?;
            Some(send.to_vec())
        } else {
            None
        };
        self.round(contribution, |slots| {
            let src = peer::<T>(slots, root as usize)?;
            let start = self.rank as usize * recv.len();
            let block = src.get(start..start + recv.len()).ok_or_else(|| {
                Error::InvalidBuffer(format!(
                    "scatter block {start}..{} beyond root buffer of {}",
                    start + recv.len(),
                    src.len()
                ))
            })?;
            recv.copy_from_slice(block);
            Ok(())
        })
    }

    fn gather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size)?;
        if self.rank == root {
            check_gather(send.len(), recv.len(), self.size)?;
        }
        self.round(Some(send.to_vec()), |slots| {
            if self.rank == root {
                copy_equal_blocks(slots, recv, send.len())?;
            }
            Ok(())
        })
    }

    fn allgather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        check_gather(send.len(), recv.len(), self.size)?;
        self.round(Some(send.to_vec()), |slots| {
            copy_equal_blocks(slots, recv, send.len())
        })
    }

    fn gatherv<T: MpiDatatype>(
        &self,
        send: &[T],
        recv: &mut [T],
        recvcounts: &[i32],
        displs: &[i32],
        root: i32,
    ) -> Result<()> {
        check_root(root, self.size)?;
        if self.rank == root {
            check_gatherv(send.len(), recv.len(), recvcounts, displs, self.rank, self.size)?;
        }
        self.round(Some(send.to_vec()), |slots| {
            if self.rank != root {
                return Ok(());
            }
            for (rank, (&count, &displ)) in recvcounts.iter().zip(displs).enumerate() {
                let src = peer::<T>(slots, rank)?;
                if src.len() != count as usize {
                    return Err(Error::InvalidBuffer(format!(
                        "rank {rank} sent {} elements, root expected {count}",
                        src.len()
                    )));
                }
                let start = displ as usize;
                recv[start..start + src.len()].copy_from_slice(src);
            }
            Ok(())
        })
    }
}

fn copy_equal_blocks<T: MpiDatatype>(slots: &[Slot], recv: &mut [T], block: usize) -> Result<()> {
    for rank in 0..slots.len() {
        let src = peer::<T>(slots, rank)?;
        if src.len() != block {
            return Err(Error::InvalidBuffer(format!(
                "rank {rank} sent {} elements, expected {block}",
                src.len()
            )));
        }
        recv[rank * block..(rank + 1) * block].copy_from_slice(src);
    }
    Ok(())
}
