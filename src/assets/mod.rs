pub(crate) mod fetch;
pub(crate) mod probe;
pub(crate) mod text;
