mod aggregate;
mod author;
mod country;
mod load;
mod record;
mod stats;

pub use aggregate::{Dataset, Edge, Node};
pub use author::{AuthorDirectory, AuthorProfile, AuthorSummary};
pub use country::{CountryGraph, CountryNames};
pub use load::{DataSource, load_dataset};
pub use stats::{StatsCache, StatsKey, collaborators};

#[cfg(test)]
pub(crate) use aggregate::fixtures;
