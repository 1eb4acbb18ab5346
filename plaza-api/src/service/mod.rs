//! The operations behind the HTTP routes.
//!
//! Every operation that acts on behalf of a user takes that user's id as an
//! explicit parameter; nothing here looks up an ambient "current user".

pub mod content;
pub mod graph;
pub mod identity;
