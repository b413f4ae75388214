//! Process-wide MPI session.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::ffi;

/// MPI can be initialised at most once per process, finalised or not.
static SESSION_OPEN: AtomicBool = AtomicBool::new(false);

/// An initialised MPI library. Finalises MPI when dropped.
///
/// # Example
///
/// ```no_run
/// use ferrogrep::{grep, GrepConfig, Mpi};
///
/// let mpi = Mpi::init().expect("MPI init");
/// let world = mpi.world();
/// let results = grep::run(&world, &GrepConfig::new("input.txt", "needle")).unwrap();
/// ```
pub struct Mpi {
    // MPI calls stay on the initialising thread
    _not_send: PhantomData<*const ()>,
}

impl Mpi {
    /// Initialise MPI. Every process of the job calls this once.
    pub fn init() -> Result<Self> {
        if SESSION_OPEN.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyInitialized);
        }
        let ret = unsafe { ffi::ferrogrep_init() };
        if let Err(e) = Error::check(ret) {
            SESSION_OPEN.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(Mpi {
            _not_send: PhantomData,
        })
    }

    /// `MPI_COMM_WORLD`.
    pub fn world(&self) -> Communicator {
        Communicator::world()
    }

    /// Wall-clock seconds from `MPI_Wtime`, comparable across calls on one rank.
    pub fn wtime(&self) -> f64 {
        unsafe { ffi::ferrogrep_wtime() }
    }

    /// Library identification from `MPI_Get_library_version`.
    pub fn version(&self) -> Result<String> {
        let mut buf = [0u8; 512];
        let mut len: i32 = 0;
        Error::check(unsafe { ffi::ferrogrep_get_version(buf.as_mut_ptr().cast(), &mut len) })?;
        let len = (len.max(0) as usize).min(buf.len());
        Ok(String::from_utf8_lossy(&buf[..len]).trim_end().to_string())
    }
}

impl Drop for Mpi {
    fn drop(&mut self) {
        unsafe {
            ffi::ferrogrep_finalize();
        }
    }
}
