//! Job lifecycle: one scene in, one artifact (or failure) and one notification out.

pub(crate) mod pool;
pub(crate) mod runner;
