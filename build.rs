//! Build script for ferrogrep
//!
//! Only does work when the `mpi` feature is enabled: locates an MPI
//! installation, compiles the C layer in `csrc/` against it and links
//! libmpi.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHIM_SOURCE: &str = "csrc/ferrogrep.c";
const SHIM_HEADER: &str = "csrc/ferrogrep.h";

fn main() {
    println!("cargo:rerun-if-changed={SHIM_SOURCE}");
    println!("cargo:rerun-if-changed={SHIM_HEADER}");
    for var in ["MPI_PKG_CONFIG", "MPICC", "CRAY_MPICH_DIR"] {
        println!("cargo:rerun-if-env-changed={var}");
    }

    // The in-process backend needs no native code
    if env::var_os("CARGO_FEATURE_MPI").is_none() {
        return;
    }

    let toolchain = locate_mpi().unwrap_or_else(|| {
        panic!(
            "the `mpi` feature needs an MPI installation (MPICH or OpenMPI). Either:\n\
             - set MPI_PKG_CONFIG to its pkg-config name (e.g. 'mpich')\n\
             - put 'mpicc' on PATH or point MPICC at it\n\
             - set CRAY_MPICH_DIR on Cray systems\n\
             or build without `--features mpi` to use the in-process backend only"
        )
    });
    eprintln!("ferrogrep: using MPI from {}", toolchain.origin);

    let mut build = cc::Build::new();
    build
        .file(SHIM_SOURCE)
        .include("csrc")
        .includes(&toolchain.include_paths)
        .warnings(true)
        .extra_warnings(true);
    if env::var("PROFILE").unwrap_or_default() == "release" {
        build.opt_level(3);
    }
    build.compile("ferrogrep");

    for path in &toolchain.link_paths {
        println!("cargo:rustc-link-search=native={}", path.display());
        // RPATH so the binary finds the same libmpi at runtime
        println!("cargo:rustc-link-arg=-Wl,-rpath,{}", path.display());
    }
    for lib in &toolchain.libs {
        println!("cargo:rustc-link-lib={lib}");
    }
}

/// Compiler and linker flags for one MPI installation.
struct MpiToolchain {
    origin: String,
    include_paths: Vec<PathBuf>,
    link_paths: Vec<PathBuf>,
    libs: Vec<String>,
}

impl MpiToolchain {
    fn under_prefix(origin: String, prefix: &Path) -> Self {
        MpiToolchain {
            origin,
            include_paths: vec![prefix.join("include")],
            link_paths: vec![prefix.join("lib")],
            libs: vec!["mpi".to_string()],
        }
    }
}

/// Probe, in order: `MPI_PKG_CONFIG`, well-known pkg-config names,
/// `mpicc -show`, a Cray environment, then common install prefixes.
fn locate_mpi() -> Option<MpiToolchain> {
    if let Ok(name) = env::var("MPI_PKG_CONFIG") {
        if let Some(found) = from_pkg_config(&name) {
            return Some(found);
        }
    }

    if let Some(found) = ["mpich", "ompi", "mpi"].iter().find_map(|name| from_pkg_config(name)) {
        return Some(found);
    }

    if let Some(found) = from_mpicc() {
        return Some(found);
    }

    if let Ok(dir) = env::var("CRAY_MPICH_DIR") {
        return Some(MpiToolchain::under_prefix(format!("CRAY_MPICH_DIR={dir}"), Path::new(&dir)));
    }

    ["/usr", "/usr/local", "/opt/mpich", "/opt/openmpi"]
        .iter()
        .map(Path::new)
        .find(|prefix| prefix.join("include").join("mpi.h").exists())
        .map(|prefix| MpiToolchain::under_prefix(prefix.display().to_string(), prefix))
}

fn from_pkg_config(name: &str) -> Option<MpiToolchain> {
    let lib = pkg_config::Config::new()
        .cargo_metadata(false)
        .probe(name)
        .ok()?;
    Some(MpiToolchain {
        origin: format!("pkg-config {name} {}", lib.version),
        include_paths: lib.include_paths,
        link_paths: lib.link_paths,
        libs: lib.libs,
    })
}

fn from_mpicc() -> Option<MpiToolchain> {
    let mpicc = env::var("MPICC").unwrap_or_else(|_| "mpicc".to_string());
    let output = Command::new(&mpicc).arg("-show").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let mut toolchain = MpiToolchain {
        origin: format!("{mpicc} -show"),
        include_paths: Vec::new(),
        link_paths: Vec::new(),
        libs: Vec::new(),
    };
    for flag in String::from_utf8_lossy(&output.stdout).split_whitespace() {
        if let Some(path) = flag.strip_prefix("-I") {
            toolchain.include_paths.push(PathBuf::from(path));
        } else if let Some(path) = flag.strip_prefix("-L") {
            toolchain.link_paths.push(PathBuf::from(path));
        } else if let Some(lib) = flag.strip_prefix("-l") {
            toolchain.libs.push(lib.to_string());
        }
    }
    if toolchain.libs.is_empty() {
        toolchain.libs.push("mpi".to_string());
    }
    Some(toolchain)
}
