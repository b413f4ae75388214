//! Raw FFI bindings to the C shim in `csrc/ferrogrep.c`.
//!
//! These are low-level unsafe functions. Use [`Mpi`](crate::Mpi) and
//! [`Communicator`](crate::Communicator) instead.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_double, c_int, c_void};

pub type int32_t = i32;
pub type int64_t = i64;

extern "C" {
    // ============================================================
    // Initialization and Finalization
    // ============================================================

    pub fn ferrogrep_init() -> c_int;
    pub fn ferrogrep_finalize() -> c_int;

    // ============================================================
    // Communicator Queries
    // ============================================================

    pub fn ferrogrep_comm_world() -> int32_t;
    pub fn ferrogrep_comm_rank(comm: int32_t, rank: *mut int32_t) -> c_int;
    pub fn ferrogrep_comm_size(comm: int32_t, size: *mut int32_t) -> c_int;
    pub fn ferrogrep_barrier(comm: int32_t) -> c_int;
    pub fn ferrogrep_abort(comm: int32_t, errorcode: int32_t) -> c_int;

    // ============================================================
    // Collectives
    // ============================================================

    pub fn ferrogrep_bcast(
        buf: *mut c_void,
        count: int64_t,
        datatype_tag: int32_t,
        root: int32_t,
        comm: int32_t,
    ) -> c_int;

    pub fn ferrogrep_scatter(
        sendbuf: *const c_void,
        sendcount: int64_t,
        recvbuf: *mut c_void,
        recvcount: int64_t,
        datatype_tag: int32_t,
        root: int32_t,
        comm: int32_t,
    ) -> c_int;

    pub fn ferrogrep_gather(
        sendbuf: *const c_void,
        sendcount: int64_t,
        recvbuf: *mut c_void,
        recvcount: int64_t,
        datatype_tag: int32_t,
        root: int32_t,
        comm: int32_t,
    ) -> c_int;

    pub fn ferrogrep_allgather(
        sendbuf: *const c_void,
        sendcount: int64_t,
        recvbuf: *mut c_void,
        recvcount: int64_t,
        datatype_tag: int32_t,
        comm: int32_t,
    ) -> c_int;

    pub fn ferrogrep_gatherv(
        sendbuf: *const c_void,
        sendcount: int64_t,
        recvbuf: *mut c_void,
        recvcounts: *const int32_t,
        displs: *const int32_t,
        datatype_tag: int32_t,
        root: int32_t,
        comm: int32_t,
    ) -> c_int;

    // ============================================================
    // Utility Functions
    // ============================================================

    pub fn ferrogrep_error_string(code: c_int, message: *mut c_char, len: *mut int32_t) -> c_int;
    pub fn ferrogrep_get_version(version: *mut c_char, len: *mut int32_t) -> c_int;
    pub fn ferrogrep_wtime() -> c_double;
}
