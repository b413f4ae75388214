//! [`Collective`] over an MPI communicator.

use std::ffi::c_void;
use std::marker::PhantomData;

use crate::collective::{check_gather, check_gatherv, check_root, check_scatter, Collective};
use crate::datatype::MpiDatatype;
use crate::error::{Error, Result};
use crate::ffi;

/// An MPI communicator.
///
/// Obtained from [`Mpi::world`](crate::Mpi::world). Buffer shapes are checked
/// on the Rust side before any call reaches MPI.
///
/// # Example
///
/// ```no_run
/// use ferrogrep::{Collective, Mpi};
///
/// let mpi = Mpi::init().unwrap();
/// let world = mpi.world();
///
/// println!("I am rank {} of {}", world.rank(), world.size());
/// ```
pub struct Communicator {
    handle: i32,
    // MPI calls stay on the initialising thread
    _marker: PhantomData<*mut ()>,
}

impl Communicator {
    /// Get a handle to MPI_COMM_WORLD.
    pub(crate) fn world() -> Self {
        Communicator {
            handle: unsafe { ffi::ferrogrep_comm_world() },
            _marker: PhantomData,
        }
    }

    /// Terminate every process of the job with `errorcode`.
    ///
    /// A rank that fails after distribution has started calls this so its
    /// peers do not block forever in the next collective.
    pub fn abort(&self, errorcode: i32) -> ! {
        unsafe {
            ffi::ferrogrep_abort(self.handle, errorcode);
        }
        std::process::abort()
    }
}

impl Collective for Communicator {
    fn rank(&self) -> i32 {
        let mut rank: i32 = 0;
        unsafe { ffi::ferrogrep_comm_rank(self.handle, &mut rank) };
        rank
    }

    fn size(&self) -> i32 {
        let mut size: i32 = 0;
        unsafe { ffi::ferrogrep_comm_size(self.handle, &mut size) };
        size
    }

    fn barrier(&self) -> Result<()> {
        let ret = unsafe { ffi::ferrogrep_barrier(self.handle) };
        Error::check(ret)
    }

    fn broadcast<T: MpiDatatype>(&self, data: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size())?;
        let ret = unsafe {
            ffi::ferrogrep_bcast(
                data.as_mut_ptr().cast::<c_void>(),
                data.len() as i64,
                T::TAG as i32,
                root,
                self.handle,
            )
        };
        Error::check(ret)
    }

    fn scatter<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size())?;
        if self.rank() == root {
            check_scatter(send.len(), recv.len(), self.size())?;
        }
        let ret = unsafe {
            ffi::ferrogrep_scatter(
                send.as_ptr().cast::<c_void>(),
                recv.len() as i64,
                recv.as_mut_ptr().cast::<c_void>(),
                recv.len() as i64,
                T::TAG as i32,
                root,
                self.handle,
            )
        };
        Error::check(ret)
    }

    fn gather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T], root: i32) -> Result<()> {
        check_root(root, self.size())?;
        if self.rank() == root {
            check_gather(send.len(), recv.len(), self.size())?;
        }
        let ret = unsafe {
            ffi::ferrogrep_gather(
                send.as_ptr().cast::<c_void>(),
                send.len() as i64,
                recv.as_mut_ptr().cast::<c_void>(),
                send.len() as i64,
                T::TAG as i32,
                root,
                self.handle,
            )
        };
        Error::check(ret)
    }

    fn allgather<T: MpiDatatype>(&self, send: &[T], recv: &mut [T]) -> Result<()> {
        check_gather(send.len(), recv.len(), self.size())?;
        let ret = unsafe {
            ffi::ferrogrep_allgather(
                send.as_ptr().cast::<c_void>(),
                send.len() as i64,
                recv.as_mut_ptr().cast::<c_void>(),
                send.len() as i64,
                T::TAG as i32,
                self.handle,
            )
        };
        Error::check(ret)
    }

    fn gatherv<T: MpiDatatype>(
        &self,
        send: &[T],
        recv: &mut [T],
        recvcounts: &[i32],
        displs: &[i32],
        root: i32,
    ) -> Result<()> {
        check_root(root, self.size())?;
        if self.rank() == root {
            check_gatherv(send.len(), recv.len(), recvcounts, displs, root, self.size())?;
        }
        let ret = unsafe {
            ffi::ferrogrep_gatherv(
                send.as_ptr().cast::<c_void>(),
                send.len() as i64,
                recv.as_mut_ptr().cast::<c_void>(),
                recvcounts.as_ptr(),
                displs.as_ptr(),
                T::TAG as i32,
                root,
                self.handle,
            )
        };
        Error::check(ret)
    }
}
