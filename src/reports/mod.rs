pub mod builds;
pub mod changesets;
