pub mod align;
pub mod allele;
pub mod cigar;
pub mod error;
pub mod normalize;
pub(crate) mod parser;
pub mod reader;
pub mod record;
pub mod repeat;
pub mod types;

pub use allele::{Decomposer, VariantAllele};
pub use cigar::EditScript;
pub use error::{Error, Result};
pub use normalize::{Normalizer, ReferenceSource};
pub use reader::VcfRecords;
pub use record::multiallelic::{merge_multiallelic, split_multiallelic};
pub use record::{Record, Variant};
