mod fs;
mod json;

pub(crate) use fs::*;
pub(crate) use json::*;
