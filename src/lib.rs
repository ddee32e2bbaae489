//! Geomatch resolves free-text venue and team locations into normalized
//! place records by generating search queries, scoring provider candidates
//! against known facts and arbitrating the best match.

pub mod location;
pub mod server;
