//! Keyword and name-collision checkers for the native wrapper targets.
//!
//! A [`NameClashChecker`] decides whether a proposed identifier is usable in
//! generated code and, when it is not, proposes the next free one. The
//! wrapper engine consults the checker of its [`Target`] every time it
//! allocates a name.

mod cuda;
mod fortran;

use std::collections::BTreeSet;

use shimgen_types::Target;

pub use cuda::CudaNameClashChecker;
pub use fortran::FortranNameClashChecker;

/// Checks and proposes identifiers for one target language.
pub trait NameClashChecker: Sync {
    /// Identifiers reserved by the language or its runtime support library.
    fn keywords(&self) -> &'static [&'static str];

    /// Whether two spellings denote the same identifier.
    fn same_name(&self, a: &str, b: &str) -> bool {
        a == b
    }

    fn is_reserved(&self, name: &str) -> bool {
        self.keywords().iter().any(|k| self.same_name(k, name))
    }

    /// True if `name` is reserved or already one of `symbols`.
    fn has_clash(&self, name: &str, symbols: &BTreeSet<String>) -> bool {
        self.is_reserved(name) || symbols.iter().any(|s| self.same_name(s, name))
    }

    /// Rewrite a candidate into a spelling that is valid in the language,
    /// before collisions are considered.
    fn legalize(&self, candidate: &str) -> String {
        if candidate.starts_with('_') {
            format!("private{candidate}")
        } else {
            candidate.to_string()
        }
    }

    /// A name derived from `candidate` that clashes with neither the
    /// keywords nor `symbols`.
    fn collision_free_name(&self, candidate: &str, symbols: &BTreeSet<String>) -> String {
        let name = self.legalize(candidate);
        if !self.has_clash(&name, symbols) {
            return name;
        }
        incremented_name(&name, 1, |n| self.has_clash(n, symbols))
    }
}

/// First `{prefix}_{counter:04}` (counting up from `start`) that `taken`
/// rejects.
pub fn incremented_name(prefix: &str, start: usize, taken: impl Fn(&str) -> bool) -> String {
    let mut counter = start;
    loop {
        let name = format!("{prefix}_{counter:04}");
        if !taken(&name) {
            return name;
        }
        counter += 1;
    }
}

static FORTRAN: FortranNameClashChecker = FortranNameClashChecker;
static CUDA: CudaNameClashChecker = CudaNameClashChecker;

/// The checker used for generated code of `target`.
pub fn checker_for(target: Target) -> &'static dyn NameClashChecker {
    match target {
        Target::Fortran => &FORTRAN,
        Target::Cuda => &CUDA,
    }
}
