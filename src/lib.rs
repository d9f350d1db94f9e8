//! Gridghost adds ghost layers to block-structured adaptive mesh refinement
//! (AMR) hierarchies, and fills them with data from neighboring blocks. Blocks
//! are uniform rectilinear grids placed at different refinement levels in the
//! style of Berger-Oliger AMR, and may be distributed over a group of
//! processes which exchange messages through an injected communicator.
//!
//! The work is done in stages, which `pipeline::GhostLayerFilter` composes:
//! `extrude` enlarges every block above the coarsest level and marks its
//! ghost cells, `connectivity` finds donor candidates for each block from the
//! box layout, and `exchange` copies data from the real cell containing each
//! ghost cell's centroid, never using a level finer than the ghost cell's
//! own. `ownership` assigns each shared boundary node to a single block.

pub mod amr_box;
pub mod connectivity;
pub mod error;
pub mod exchange;
pub mod extrude;
pub mod grid;
pub mod hierarchy;
pub mod index_space;
pub mod message;
pub mod ownership;
pub mod pipeline;

pub use error::Error;
pub use exchange::{ExchangeReport, Exchanged};
pub use hierarchy::{AmrHierarchy, BlockKey};
pub use pipeline::GhostLayerFilter;
