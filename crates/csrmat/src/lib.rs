pub mod csr;
pub mod ops;

pub use csr::CsrMatrix;
