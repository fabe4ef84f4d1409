pub mod template;
pub mod tx_builder;

pub use template::{Pooled, Reset, TemplatePool};
pub use tx_builder::{CoinsAction, TxBuilder, TxKind};
