//! Transport datatype trait and type tag mapping.
//!
//! [`MpiDatatype`] is a sealed trait that maps the Rust primitives the search
//! protocol moves between ranks to the datatype tags understood by the C shim.
//!
//! # Supported Types
//!
//! | Rust Type | MPI Equivalent  | Tag Value | Used for                      |
//! |-----------|-----------------|-----------|-------------------------------|
//! | `u8`      | `MPI_UINT8_T`   | 0         | pattern bytes, text records   |
//! | `u64`     | `MPI_UINT64_T`  | 1         | headers, line numbers, counts |

mod sealed {
    pub trait Sealed {}
}

/// Tag values matching the C-side `FERROGREP_*` defines.
///
/// These discriminants must stay in sync with `csrc/ferrogrep.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DatatypeTag {
    /// 8-bit unsigned integer (`MPI_UINT8_T`)
    U8 = 0,
    /// 64-bit unsigned integer (`MPI_UINT64_T`)
    U64 = 1,
}

/// Trait for types that can travel through a [`Collective`](crate::Collective).
///
/// This is a **sealed trait**; it cannot be implemented outside this crate.
pub trait MpiDatatype: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    /// The datatype tag used for FFI dispatch to the C layer.
    const TAG: DatatypeTag;
}

macro_rules! impl_mpi_datatype {
    ($ty:ty, $tag:expr) => {
        impl sealed::Sealed for $ty {}
        impl MpiDatatype for $ty {
            const TAG: DatatypeTag = $tag;
        }
    };
}

impl_mpi_datatype!(u8, DatatypeTag::U8);
impl_mpi_datatype!(u64, DatatypeTag::U64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datatype_tags_match_c_defines() {
        assert_eq!(u8::TAG as i32, 0); // FERROGREP_U8
        assert_eq!(u64::TAG as i32, 1); // FERROGREP_U64
    }

    #[test]
    fn protocol_types_are_transportable() {
        fn assert_mpi_datatype<T: MpiDatatype>() {}
        // records and line numbers
        assert_mpi_datatype::<u8>();
        assert_mpi_datatype::<u64>();
    }
}
