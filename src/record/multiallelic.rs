//! Splitting multi-ALT records into one record per ALT, and merging records
//! at the same site back into one.
//!
//! Allele-indexed values follow the declared `Number`: `A` lists have one
//! entry per ALT, `R` lists one per allele including REF, and `G` lists one
//! per unordered genotype, in the order VCF defines for them
//! (`index(a_1 <= ... <= a_P) = sum over m of C(a_m + m - 1, m)`).

use std::cmp::Ordering;

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;

use super::{Filter, Genotype, GenotypeAllele, Variant};
use crate::error::IncompatibleMergeError;
use crate::types::{InfoNumber, GENOTYPE_KEY, MISSING_VALUE};

const MAX_PLOIDY: usize = 8;

fn binomial(n: usize, k: usize) -> usize {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
}

/// Position of a genotype (allele indices in ascending order) in a `G` list.
pub fn genotype_index(sorted_alleles: &[usize]) -> usize {
    sorted_alleles
        .iter()
        .enumerate()
        .map(|(m, &a)| binomial(a + m, m + 1))
        .sum()
}

/// Number of entries in a `G` list.
pub fn genotype_count(n_alleles: usize, ploidy: usize) -> usize {
    binomial(n_alleles + ploidy - 1, ploidy)
}

fn infer_ploidy(n_alleles: usize, len: usize) -> Option<usize> {
    (1..=MAX_PLOIDY).find(|&p| genotype_count(n_alleles, p) == len)
}

/// All genotypes over `n_alleles` alleles in `G` order.
fn genotypes(n_alleles: usize, ploidy: usize) -> Vec<Vec<usize>> {
    let mut all = (0..ploidy)
        .map(|_| 0..n_alleles)
        .multi_cartesian_product()
        .filter(|g| g.windows(2).all(|w| w[0] <= w[1]))
        .collect_vec();
    all.sort_by_key(|g| genotype_index(g));
    all
}

fn is_missing(values: &[String]) -> bool {
    values.len() == 1 && values[0] == MISSING_VALUE
}

/// Values of a per-allele list after keeping only the ALTs in `keep`.
fn project_values(number: InfoNumber, values: &[String], keep: &[usize], n_alt: usize) -> Vec<String> {
    if values.is_empty() || is_missing(values) {
        return values.to_vec();
    }
    match number {
        InfoNumber::AlternateAlleles if values.len() == n_alt => {
            keep.iter().map(|&k| values[k].clone()).collect()
        }
        InfoNumber::Alleles if values.len() == n_alt + 1 => std::iter::once(values[0].clone())
            .chain(keep.iter().map(|&k| values[k + 1].clone()))
            .collect(),
        InfoNumber::Genotypes => match infer_ploidy(n_alt + 1, values.len()) {
            Some(ploidy) => {
                let alleles = std::iter::once(0).chain(keep.iter().map(|&k| k + 1)).collect_vec();
                genotypes(alleles.len(), ploidy)
                    .into_iter()
                    .map(|g| {
                        let old = g.iter().map(|&a| alleles[a]).sorted().collect_vec();
                        values[genotype_index(&old)].clone()
                    })
                    .collect()
            }
            None => vec![MISSING_VALUE.to_owned()],
        },
        _ => values.to_vec(),
    }
}

impl Variant {
    /// A copy restricted to the ALTs at the given indices, in that order.
    /// Genotype calls of dropped ALTs become missing.
    pub fn project(&self, keep: &[usize]) -> Variant {
        let n_alt = self.alt_alleles.len();
        let mut old_to_new = vec![None; n_alt + 1];
        old_to_new[0] = Some(0);
        for (j, &k) in keep.iter().enumerate() {
            old_to_new[k + 1] = Some(j as u32 + 1);
        }

        let mut projected = self.clone();
        projected.alt_alleles = keep.iter().map(|&k| self.alt_alleles[k].clone()).collect();
        for (key, values) in projected.info.iter_mut() {
            *values = project_values(self.header.info_number(key), values, keep, n_alt);
        }
        for sample in projected.samples.values_mut() {
            for (key, values) in sample.iter_mut() {
                if key == GENOTYPE_KEY {
                    if let Some(gt) = values.first().and_then(|v| v.parse::<Genotype>().ok()) {
                        let gt = gt.remap(|i| old_to_new.get(i as usize).copied().flatten());
                        *values = vec![gt.to_string()];
                    }
                } else {
                    *values = project_values(self.header.format_number(key), values, keep, n_alt);
                }
            }
        }
        projected
    }

    /// Drop one ALT. Returns `false` if `alt` is not among the ALTs.
    pub fn remove_alt(&mut self, alt: &str) -> bool {
        match self.alt_alleles.iter().position(|a| a == alt) {
            Some(index) => {
                let keep = (0..self.alt_alleles.len()).filter(|&i| i != index).collect_vec();
                *self = self.project(&keep);
                true
            }
            None => false,
        }
    }
}

/// One record per ALT, in ALT order. In the record for ALT `i`, genotype calls
/// of every other ALT become missing: `1/2` turns into `1/.` and `./1`.
pub fn split_multiallelic(variant: &Variant) -> Vec<Variant> {
    if variant.alt_alleles.len() <= 1 {
        return vec![variant.clone()];
    }
    (0..variant.alt_alleles.len())
        .map(|i| variant.project(&[i]))
        .collect()
}

/// Values of one key contributed by several records, merged into the allele
/// space of the merged record. `maps[r][a]` is the merged index of allele `a`
/// of record `r`.
fn merge_values(
    number: InfoNumber,
    n_alt: usize,
    contributions: &[(usize, &[String])],
    maps: &[Vec<usize>],
) -> Vec<String> {
    let first_values = match contributions.first() {
        Some(&(_, values)) => values,
        None => return vec![MISSING_VALUE.to_owned()],
    };
    let per_allele = |offset: usize, len: usize| {
        let mut slots: Vec<Option<String>> = vec![None; len];
        for &(r, values) in contributions {
            let alleles = &maps[r][offset..];
            if values.len() != alleles.len() {
                continue;
            }
            for (value, &a) in values.iter().zip(alleles) {
                let slot = &mut slots[a - offset];
                if slot.is_none() && value != MISSING_VALUE {
                    *slot = Some(value.clone());
                }
            }
        }
        if slots.iter().all(Option::is_none) {
            vec![MISSING_VALUE.to_owned()]
        } else {
            slots
                .into_iter()
                .map(|s| s.unwrap_or_else(|| MISSING_VALUE.to_owned()))
                .collect()
        }
    };
    match number {
        _ if first_values.is_empty() => vec![],
        InfoNumber::AlternateAlleles => per_allele(1, n_alt),
        InfoNumber::Alleles => per_allele(0, n_alt + 1),
        InfoNumber::Genotypes => merge_genotype_values(n_alt + 1, contributions, maps),
        _ => first_values.to_vec(),
    }
}

/// A merged `G` entry takes its value from the first record carrying all of
/// the genotype's alleles; genotypes mixing ALTs of different records are
/// missing.
fn merge_genotype_values(
    n_alleles: usize,
    contributions: &[(usize, &[String])],
    maps: &[Vec<usize>],
) -> Vec<String> {
    let ploidies = contributions
        .iter()
        .map(|&(r, values)| infer_ploidy(maps[r].len(), values.len()))
        .collect_vec();
    let ploidy = match ploidies.iter().flatten().next() {
        Some(&p) => p,
        None => return vec![MISSING_VALUE.to_owned()],
    };
    genotypes(n_alleles, ploidy)
        .into_iter()
        .map(|g| {
            contributions
                .iter()
                .zip(&ploidies)
                .filter(|(_, p)| **p == Some(ploidy))
                .find_map(|(&(r, values), _)| {
                    let local = g
                        .iter()
                        .map(|a| maps[r].iter().position(|m| m == a))
                        .collect::<Option<Vec<_>>>()?;
                    Some(values[genotype_index(&local.into_iter().sorted().collect_vec())].clone())
                })
                .unwrap_or_else(|| MISSING_VALUE.to_owned())
        })
        .collect()
}

/// Per call slot: the first non-reference call wins, then a reference call,
/// then missing.
fn merge_genotypes(genotypes: &[Genotype]) -> Option<Genotype> {
    let ploidy = genotypes.iter().map(Genotype::ploidy).max()?;
    let alleles = (0..ploidy)
        .map(|slot| {
            let calls = || genotypes.iter().filter_map(move |g| g.alleles().get(slot).copied());
            calls()
                .find(|a| matches!(a.index(), Some(i) if i > 0))
                .or_else(|| calls().find(|a| a.index() == Some(0)))
                .or_else(|| calls().next())
                .unwrap_or(GenotypeAllele::UnphasedMissing)
        })
        .collect();
    Some(Genotype::new(alleles))
}

fn merge_filters<'a>(filters: impl Iterator<Item = &'a Filter>) -> Filter {
    let mut failed: Vec<String> = Vec::new();
    let mut passed = false;
    for filter in filters {
        match filter {
            Filter::Pass => passed = true,
            Filter::Failed(ids) => {
                for id in ids {
                    if !failed.contains(id) {
                        failed.push(id.clone());
                    }
                }
            }
            Filter::Missing => {}
        }
    }
    if !failed.is_empty() {
        Filter::Failed(failed)
    } else if passed {
        Filter::Pass
    } else {
        Filter::Missing
    }
}

/// Merge records of one site into a single multi-ALT record. ALTs keep their
/// first-seen order and are de-duplicated; genotypes, allele-indexed INFO and
/// FORMAT values are re-indexed accordingly. QUAL is the maximum, IDs are the
/// union and fixed-size values come from the first record that has them.
pub fn merge_multiallelic(variants: &[Variant]) -> Result<Variant, IncompatibleMergeError> {
    let first = variants.first().ok_or(IncompatibleMergeError::Empty)?;
    for other in &variants[1..] {
        if other.chrom != first.chrom || other.pos != first.pos {
            return Err(IncompatibleMergeError::Position {
                chrom: first.chrom.clone(),
                pos: first.pos,
                other_chrom: other.chrom.clone(),
                other_pos: other.pos,
            });
        }
        if other.ref_allele != first.ref_allele {
            return Err(IncompatibleMergeError::Ref {
                chrom: first.chrom.clone(),
                pos: first.pos,
                expected: first.ref_allele.clone(),
                found: other.ref_allele.clone(),
            });
        }
    }

    let mut alts: Vec<String> = Vec::new();
    let maps = variants
        .iter()
        .map(|v| {
            std::iter::once(0)
                .chain(v.alt_alleles.iter().map(|alt| {
                    match alts.iter().position(|a| a == alt) {
                        Some(i) => i + 1,
                        None => {
                            alts.push(alt.clone());
                            alts.len()
                        }
                    }
                }))
                .collect_vec()
        })
        .collect_vec();
    let n_alt = alts.len();
    debug!(
        "merging {} records at {}:{} into {} ALTs",
        variants.len(),
        first.chrom,
        first.pos,
        n_alt
    );

    let header = first.header.clone();
    let mut merged = first.clone();
    merged.alt_alleles = alts;
    merged.id = variants.iter().flat_map(|v| v.id.iter().cloned()).unique().collect();
    merged.qual = variants
        .iter()
        .filter_map(|v| v.qual.as_ref())
        .max_by(|a, b| a.value().partial_cmp(&b.value()).unwrap_or(Ordering::Equal))
        .cloned();
    merged.filter = merge_filters(variants.iter().map(|v| &v.filter));

    let info_keys = variants
        .iter()
        .flat_map(|v| v.info.keys().cloned())
        .unique()
        .collect_vec();
    merged.info = info_keys
        .into_iter()
        .map(|key| {
            let contributions = variants
                .iter()
                .enumerate()
                .filter_map(|(r, v)| v.info.get(&key).map(|values| (r, values.as_slice())))
                .collect_vec();
            let values = merge_values(header.info_number(&key), n_alt, &contributions, &maps);
            (key, values)
        })
        .collect();

    let mut format = variants
        .iter()
        .flat_map(|v| v.format.iter().cloned())
        .unique()
        .collect_vec();
    if let Some(gt) = format.iter().position(|k| k == GENOTYPE_KEY) {
        let key = format.remove(gt);
        format.insert(0, key);
    }

    let mut samples = IndexMap::with_capacity(first.samples.len());
    for name in first.samples.keys() {
        let mut sample = IndexMap::new();
        for key in &format {
            if key == GENOTYPE_KEY {
                let calls = variants
                    .iter()
                    .zip(&maps)
                    .filter_map(|(v, map)| {
                        v.genotype(name)
                            .map(|gt| gt.remap(|i| map.get(i as usize).map(|&m| m as u32)))
                    })
                    .collect_vec();
                if let Some(gt) = merge_genotypes(&calls) {
                    sample.insert(key.clone(), vec![gt.to_string()]);
                }
                continue;
            }
            let contributions = variants
                .iter()
                .enumerate()
                .filter_map(|(r, v)| {
                    v.samples
                        .get(name)
                        .and_then(|s| s.get(key))
                        .map(|values| (r, values.as_slice()))
                })
                .collect_vec();
            if contributions.is_empty() {
                continue;
            }
            let values = merge_values(header.format_number(key), n_alt, &contributions, &maps);
            sample.insert(key.clone(), values);
        }
        samples.insert(name.clone(), sample);
    }
    merged.format = format;
    merged.samples = samples;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::record::Record;
    use crate::types::Header;

    const HEADER: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Likelihoods\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3";

    fn parse(line: &str) -> Variant {
        Variant::parse(line, &Arc::new(Header::from_text(HEADER).unwrap())).unwrap()
    }

    #[test]
    fn test_genotype_index() {
        assert_eq!(genotype_index(&[0, 0]), 0);
        assert_eq!(genotype_index(&[0, 1]), 1);
        assert_eq!(genotype_index(&[1, 1]), 2);
        assert_eq!(genotype_index(&[0, 2]), 3);
        assert_eq!(genotype_index(&[1, 2]), 4);
        assert_eq!(genotype_index(&[2, 2]), 5);
        assert_eq!(genotype_index(&[2]), 2);
        assert_eq!(genotype_count(3, 2), 6);
        assert_eq!(genotype_count(2, 3), 4);
        assert_eq!(genotypes(2, 3).len(), 4);
    }

    #[test]
    fn test_split_genotypes_become_missing() {
        let variant = parse("1\t10\t.\tA\tT,G\t.\t.\t.\tGT\t1/2\t0|2\t1/1");
        let split = split_multiallelic(&variant);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].alt_alleles(), &["T".to_string()]);
        assert_eq!(split[1].alt_alleles(), &["G".to_string()]);
        let gts = |v: &Variant| {
            v.genotypes()
                .into_iter()
                .map(|g| g.unwrap().to_string())
                .collect_vec()
        };
        assert_eq!(gts(&split[0]), vec!["1/.", "0|.", "1/1"]);
        assert_eq!(gts(&split[1]), vec!["./1", "0|1", "./."]);
    }

    #[test]
    fn test_split_projects_per_allele_values() {
        let variant = parse(
            "1\t10\trs1\tA\tT,G\t50\tPASS\tDP=9;AF=0.25,0.5;AD=3,4,5\tGT:GQ:PL\t1/2:20:0,1,2,3,4,5\t0/0\t.",
        );
        let split = split_multiallelic(&variant);
        assert_eq!(
            split[0].to_text(),
            "1\t10\trs1\tA\tT\t50\tPASS\tDP=9;AF=0.25;AD=3,4\tGT:GQ:PL\t1/.:20:0,1,2\t0/0\t."
        );
        assert_eq!(
            split[1].to_text(),
            "1\t10\trs1\tA\tG\t50\tPASS\tDP=9;AF=0.5;AD=3,5\tGT:GQ:PL\t./1:20:0,3,5\t0/0\t."
        );
    }

    #[test]
    fn test_remove_alt() {
        let mut variant = parse("1\t10\t.\tA\tT,G,C\t.\t.\tAF=0.1,0.2,0.3\tGT\t1/3\t2/3\t0/1");
        assert!(variant.remove_alt("G"));
        assert!(!variant.remove_alt("G"));
        assert_eq!(
            variant.to_text(),
            "1\t10\t.\tA\tT,C\t.\t.\tAF=0.1,0.3\tGT\t1/2\t./2\t0/1"
        );
    }

    #[test]
    fn test_split_single_alt_is_identity() {
        let variant = parse("1\t10\t.\tA\tT\t.\t.\t.\tGT\t0/1\t1/1\t0/0");
        assert_eq!(split_multiallelic(&variant), vec![variant]);
    }

    #[test]
    fn test_merge_inverts_split() {
        let variant = parse(
            "1\t10\trs1\tA\tT,G\t50\tPASS\tDP=9;AF=0.25,0.5;AD=3,4,5\tGT:GQ\t1/2:20\t0|2:30\t./.:.",
        );
        let merged = merge_multiallelic(&split_multiallelic(&variant)).unwrap();
        assert_eq!(merged, variant);
    }

    #[test]
    fn test_merge_deduplicates_and_combines() {
        let a = parse("1\t10\trs1\tA\tT\t20\tPASS\tAF=0.1\tGT:PL\t0/1:0,1,2\t0/0:0,3,6\t1/1:9,9,0");
        let b = parse("1\t10\trs2\tA\tG\t40\tq10\tAF=0.2\tGT:PL\t0/1:0,5,9\t0/1:0,1,2\t0/0:0,7,7");
        let c = parse("1\t10\trs1\tA\tT\t.\t.\tAF=0.3\tGT\t1/1\t0/0\t1/1");
        let merged = merge_multiallelic(&[a, b, c]).unwrap();
        assert_eq!(
            merged.to_text(),
            "1\t10\trs1;rs2\tA\tT,G\t40\tq10\tAF=0.1,0.2\tGT:PL\t1/1:0,1,2,5,.,9\t0/2:0,3,6,1,.,2\t1/1:9,9,0,7,.,7"
        );
    }

    #[test]
    fn test_merge_rejects_incompatible() {
        let a = parse("1\t10\t.\tA\tT\t.\t.\t.\tGT\t0/1\t0/0\t0/0");
        let b = parse("1\t11\t.\tA\tG\t.\t.\t.\tGT\t0/1\t0/0\t0/0");
        let c = parse("1\t10\t.\tAC\tG\t.\t.\t.\tGT\t0/1\t0/0\t0/0");
        assert!(matches!(
            merge_multiallelic(&[a.clone(), b]),
            Err(IncompatibleMergeError::Position { other_pos: 11, .. })
        ));
        assert!(matches!(
            merge_multiallelic(&[a, c]),
            Err(IncompatibleMergeError::Ref { .. })
        ));
        assert_eq!(merge_multiallelic(&[]), Err(IncompatibleMergeError::Empty));
    }
}
