//! Order book reconstruction module.
//!
//! Three views of one book, kept consistent by [`BookReconstructor`]:
//!
//! - [`OrderStore`]: id -> order, the owner of every live order
//! - [`LevelIndex`]: (side, price) -> ids, a non-owning back-reference
//! - [`TopOfBookCache`]: derived best `depth` levels per side

pub mod corrector;
pub mod level_index;
mod multi_product;
pub mod order_store;
pub mod reconstructor;
pub mod top_of_book;

pub use corrector::{Correction, CrossedBookCorrector, PurgedLevel};
pub use level_index::{LevelIndex, LevelRemoval};
pub use multi_product::{MultiProductBook, MultiProductStats};
pub use order_store::OrderStore;
pub use reconstructor::{BookConfig, BookReconstructor, BookStats, ProcessOutcome};
pub use top_of_book::{TopOfBookCache, DEFAULT_DEPTH};
