mod variant;

pub mod multiallelic;

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use strum::{Display, EnumString};

use crate::error::MalformedRecordError;
use crate::parser;
pub use crate::types::TypedVec;
pub use variant::{is_symbolic, Qual, Variant};

pub trait Record {
    fn chrom(&self) -> &str;

    fn pos(&self) -> u64;

    fn id(&self) -> &[String];

    fn ref_allele(&self) -> &str;

    fn alt_alleles(&self) -> &[String];

    fn qual(&self) -> Option<f32>;

    fn filters(&self) -> Vec<&str>;

    fn info(&self, tag: &str) -> Option<TypedVec>;

    fn format(&self, tag: &str) -> Option<Vec<TypedVec>>;

    fn genotypes(&self) -> Vec<Option<Genotype>>;

    fn has_flag(&self, tag: &str) -> bool;
}

/// Phased or unphased alleles, represented as indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenotypeAllele {
    Unphased(i32),
    Phased(i32),
    UnphasedMissing,
    PhasedMissing,
}

impl GenotypeAllele {
    pub fn new(index: Option<i32>, phased: bool) -> Self {
        match (index, phased) {
            (Some(i), false) => GenotypeAllele::Unphased(i),
            (Some(i), true) => GenotypeAllele::Phased(i),
            (None, false) => GenotypeAllele::UnphasedMissing,
            (None, true) => GenotypeAllele::PhasedMissing,
        }
    }

    /// Get the index into the list of alleles.
    pub fn index(self) -> Option<u32> {
        match self {
            GenotypeAllele::Unphased(i) | GenotypeAllele::Phased(i) => Some(i as u32),
            GenotypeAllele::UnphasedMissing | GenotypeAllele::PhasedMissing => None,
        }
    }

    pub fn is_phased(self) -> bool {
        matches!(
            self,
            GenotypeAllele::Phased(_) | GenotypeAllele::PhasedMissing
        )
    }

    /// Same phase, different (or no) index.
    pub fn with_index(self, index: Option<u32>) -> Self {
        GenotypeAllele::new(index.map(|i| i as i32), self.is_phased())
    }
}

/// A parsed `GT` value such as `0/1`, `1|0` or `./.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Genotype(Vec<GenotypeAllele>);

impl Genotype {
    pub fn new(alleles: Vec<GenotypeAllele>) -> Self {
        Genotype(alleles)
    }

    pub fn alleles(&self) -> &[GenotypeAllele] {
        &self.0
    }

    pub fn ploidy(&self) -> usize {
        self.0.len()
    }

    pub fn is_missing(&self) -> bool {
        self.0.iter().all(|a| a.index().is_none())
    }

    /// Rewrite every allele index through `f`; phasing is kept.
    pub fn remap<F>(&self, f: F) -> Genotype
    where
        F: Fn(u32) -> Option<u32>,
    {
        Genotype(
            self.0
                .iter()
                .map(|a| a.with_index(a.index().and_then(&f)))
                .collect(),
        )
    }
}

impl FromStr for Genotype {
    type Err = MalformedRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::genotype(s)
            .map(|(_, alleles)| Genotype(alleles))
            .map_err(|_| MalformedRecordError::new("GT", format!("invalid genotype `{}`", s)))
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, allele) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(if allele.is_phased() { "|" } else { "/" })?;
            }
            match allele.index() {
                Some(index) => write!(f, "{}", index)?,
                None => f.write_str(".")?,
            }
        }
        Ok(())
    }
}

/// The FILTER column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Filter {
    Missing,
    Pass,
    Failed(Vec<String>),
}

impl Filter {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Filter::Missing => vec![],
            Filter::Pass => vec!["PASS"],
            Filter::Failed(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

impl FromStr for Filter {
    type Err = MalformedRecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "." => Ok(Filter::Missing),
            "PASS" => Ok(Filter::Pass),
            "" => Err(MalformedRecordError::new("FILTER", "empty FILTER")),
            _ => Ok(Filter::Failed(s.split(';').map(str::to_owned).collect())),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Missing => f.write_str("."),
            Filter::Pass => f.write_str("PASS"),
            Filter::Failed(ids) => f.write_str(&ids.iter().join(";")),
        }
    }
}

/// Allele classes present in a record, serialized as the INFO flags the
/// `classify` command writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display)]
pub enum AlleleClass {
    #[strum(serialize = "SNP")]
    Snp,
    #[strum(serialize = "TS")]
    Transition,
    #[strum(serialize = "TV")]
    Transversion,
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
    #[strum(serialize = "MNP")]
    Mnp,
    #[strum(serialize = "COMPLEX")]
    Complex,
}

impl AlleleClass {
    pub fn description(self) -> &'static str {
        match self {
            AlleleClass::Snp => "SNP allele",
            AlleleClass::Transition => "transition SNP",
            AlleleClass::Transversion => "transversion SNP",
            AlleleClass::Insertion => "insertion allele",
            AlleleClass::Deletion => "deletion allele",
            AlleleClass::Mnp => "MNP allele",
            AlleleClass::Complex => "complex allele",
        }
    }
}
