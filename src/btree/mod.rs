//! B+tree storage engine.
//!
//! Every node occupies exactly one page and refers to other nodes by page
//! number only; the [`Pager`](crate::pager::Pager) resolves those numbers to
//! buffers.
//!
//! ## Page Format
//!
//! ```text
//! Leaf:     [type|is_root|parent][num_cells|next_leaf][key|row]*
//! Internal: [type|is_root|parent][num_keys|right_child][child|key]*
//! ```
//!
//! ## Tree Shape
//!
//! - Leaf cells are sorted by key; leaves are chained left to right through
//!   `next_leaf` for ordered scans
//! - Each internal key is the largest key in the child to its left; the
//!   right child holds everything greater
//! - The root is always page 0

pub mod cursor;
#[allow(missing_docs)]
pub mod layout;
pub mod node;
pub mod tree;

pub use cursor::{Cursor, Scan};
pub use layout::{LEAF_NODE_MAX_CELLS, PAGE_SIZE};
pub use node::{InternalNode, LeafNode, NodeType};
pub use tree::BTree;
