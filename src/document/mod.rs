//! Document walker: turns nested JSON reports into graph nodes and edges.
//!
//! ```text
//! file.json                      category  (level 3, カテゴリ名)
//! └── "document"                 category  (level 2, 文書名)   document scope
//!     └── "item"                 category  (level 1, 項目名)   item scope
//!         ├── "sub item"         category  (level 0, 項目名)
//!         └── "text。text。"      sentences -> entity / predicate nodes
//! ```
//!
//! Entering a first-level item finalizes the previous one (ordering and
//! relation discovery). The end of a document finalizes the pending item and
//! clusters the whole document for equivalence.

mod builder;

pub use builder::{DocumentBuilder, DocumentReport, ItemReport};
