//! SeaORM entity definitions for the repowatch schema.

pub mod commit;
pub mod prelude;
pub mod repository;
