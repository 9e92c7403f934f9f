use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use itertools::Itertools;

use super::{AlleleClass, Filter, Genotype, Record, TypedVec};
use crate::allele::{AlleleKind, Decomposer};
use crate::error::{Error, MalformedRecordError};
use crate::types::{Header, InfoNumber, InfoType, GENOTYPE_KEY, MISSING_VALUE};

const FIXED_COLUMNS: usize = 8;

/// QUAL as a number plus the text it was parsed from, so that `1e1` or `30.0`
/// are written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Qual {
    value: f32,
    text: String,
}

impl Qual {
    pub fn new(value: f32) -> Self {
        Qual {
            value,
            text: format!("{}", value),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// One VCF data line.
///
/// INFO and FORMAT values are kept as text split on `,`; flags map to an empty
/// list. Each sample holds only the FORMAT keys it actually carries, so a
/// column shortened to `0/1` stays shortened when written back.
#[derive(Debug, Clone)]
pub struct Variant {
    pub(crate) chrom: String,
    pub(crate) pos: u64,
    pub(crate) id: Vec<String>,
    pub(crate) ref_allele: String,
    pub(crate) alt_alleles: Vec<String>,
    pub(crate) qual: Option<Qual>,
    pub(crate) filter: Filter,
    pub(crate) info: IndexMap<String, Vec<String>>,
    pub(crate) format: Vec<String>,
    pub(crate) samples: IndexMap<String, IndexMap<String, Vec<String>>>,
    pub(crate) header: Arc<Header>,
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.chrom == other.chrom
            && self.pos == other.pos
            && self.id == other.id
            && self.ref_allele == other.ref_allele
            && self.alt_alleles == other.alt_alleles
            && self.qual == other.qual
            && self.filter == other.filter
            && self.info == other.info
            && self.format == other.format
            && self.samples == other.samples
    }
}

/// Alleles the decomposer cannot align: `<DEL>`, breakends, `*`, `.`.
pub fn is_symbolic(allele: &str) -> bool {
    allele.starts_with('<')
        || allele.contains('[')
        || allele.contains(']')
        || allele == "*"
        || allele == MISSING_VALUE
        || allele.ends_with('.')
        || allele.starts_with('.')
}

fn split_values(text: &str) -> Vec<String> {
    text.split(',').map(str::to_owned).collect()
}

fn check_typed(
    column: &str,
    key: &str,
    kind: InfoType,
    values: &[String],
) -> Result<(), MalformedRecordError> {
    for value in values.iter().filter(|v| *v != MISSING_VALUE) {
        let ok = match kind {
            InfoType::Integer => value.parse::<i32>().is_ok(),
            InfoType::Float => value.parse::<f32>().is_ok(),
            InfoType::Character => value.chars().count() == 1,
            InfoType::Flag | InfoType::String => true,
        };
        if !ok {
            return Err(MalformedRecordError::new(
                column,
                format!("`{}` is not a valid {} value for {}", value, kind, key),
            ));
        }
    }
    Ok(())
}

fn check_arity(
    column: &str,
    key: &str,
    number: InfoNumber,
    n_alt: usize,
    values: &[String],
) -> Result<(), MalformedRecordError> {
    if values.len() == 1 && values[0] == MISSING_VALUE {
        return Ok(());
    }
    match number.expected_len(n_alt) {
        // Number=0 is a flag, checked elsewhere
        Some(0) | None => Ok(()),
        Some(n) if n == values.len() => Ok(()),
        Some(n) => Err(MalformedRecordError::new(
            column,
            format!(
                "{} has {} values, Number={} requires {}",
                key,
                values.len(),
                number,
                n
            ),
        )),
    }
}

impl Variant {
    /// Parse one tab-separated data line against `header`.
    pub fn parse(line: &str, header: &Arc<Header>) -> Result<Variant, MalformedRecordError> {
        let line = crate::parser::strip_line_ending(line);
        let fields = line.split('\t').collect_vec();
        let n_samples = header.samples().len();
        let expected_ok = if n_samples == 0 {
            fields.len() == FIXED_COLUMNS || fields.len() == FIXED_COLUMNS + 1
        } else {
            fields.len() == FIXED_COLUMNS + 1 + n_samples
        };
        if !expected_ok {
            return Err(MalformedRecordError::new(
                "line",
                format!(
                    "expected {} columns, found {}",
                    if n_samples == 0 {
                        FIXED_COLUMNS
                    } else {
                        FIXED_COLUMNS + 1 + n_samples
                    },
                    fields.len()
                ),
            ));
        }

        let chrom = fields[0];
        if chrom.is_empty() {
            return Err(MalformedRecordError::new("CHROM", "empty CHROM"));
        }
        let pos = fields[1]
            .parse::<u64>()
            .ok()
            .filter(|&p| p >= 1)
            .ok_or_else(|| {
                MalformedRecordError::new("POS", format!("`{}` is not a position >= 1", fields[1]))
            })?;
        Variant::parse_columns(&fields, chrom, pos, header).map_err(|e| e.at(chrom, pos))
    }

    /// Columns from ID onwards, once CHROM and POS are known.
    fn parse_columns(
        fields: &[&str],
        chrom: &str,
        pos: u64,
        header: &Arc<Header>,
    ) -> Result<Variant, MalformedRecordError> {
        let n_samples = header.samples().len();
        let id = if fields[2] == MISSING_VALUE {
            vec![]
        } else {
            fields[2].split(';').map(str::to_owned).collect()
        };
        let ref_allele = fields[3];
        if ref_allele.is_empty() || ref_allele == MISSING_VALUE {
            return Err(MalformedRecordError::new("REF", "missing REF"));
        }
        let alt_alleles = if fields[4] == MISSING_VALUE {
            vec![]
        } else {
            fields[4].split(',').map(str::to_owned).collect_vec()
        };
        let mut seen = HashSet::new();
        for alt in &alt_alleles {
            if alt.is_empty() {
                return Err(MalformedRecordError::new("ALT", "empty ALT allele"));
            }
            if alt == ref_allele {
                return Err(MalformedRecordError::new(
                    "ALT",
                    format!("ALT `{}` equals REF", alt),
                ));
            }
            if !seen.insert(alt.as_str()) {
                return Err(MalformedRecordError::new(
                    "ALT",
                    format!("duplicate ALT `{}`", alt),
                ));
            }
        }
        let n_alt = alt_alleles.len();

        let qual = match fields[5] {
            MISSING_VALUE => None,
            text => Some(Qual {
                value: text.parse().map_err(|_| {
                    MalformedRecordError::new("QUAL", format!("`{}` is not a number", text))
                })?,
                text: text.to_owned(),
            }),
        };
        let filter = fields[6].parse::<Filter>()?;

        let mut info = IndexMap::new();
        if fields[7] != MISSING_VALUE {
            for entry in fields[7].split(';') {
                let (key, values) = match entry.split_once('=') {
                    Some((key, value)) => (key, split_values(value)),
                    None => (entry, vec![]),
                };
                if key.is_empty() {
                    return Err(MalformedRecordError::new("INFO", "empty INFO key"));
                }
                check_typed("INFO", key, header.info_type(key), &values)?;
                if !values.is_empty() {
                    check_arity("INFO", key, header.info_number(key), n_alt, &values)?;
                }
                if info.insert(key.to_owned(), values).is_some() {
                    return Err(MalformedRecordError::new(
                        "INFO",
                        format!("duplicate INFO key {}", key),
                    ));
                }
            }
        }

        let format = match fields.get(FIXED_COLUMNS) {
            Some(keys) => keys.split(':').map(str::to_owned).collect_vec(),
            None => vec![],
        };
        if format.iter().duplicates().next().is_some() {
            return Err(MalformedRecordError::new("FORMAT", "duplicate FORMAT key"));
        }
        let mut samples = IndexMap::with_capacity(n_samples);
        for (name, column) in header
            .samples()
            .iter()
            .zip(fields.iter().skip(FIXED_COLUMNS + 1))
        {
            let values = column.split(':').collect_vec();
            if values.len() > format.len() {
                return Err(MalformedRecordError::new(
                    name.as_str(),
                    format!(
                        "{} values for {} FORMAT keys",
                        values.len(),
                        format.len()
                    ),
                ));
            }
            let mut sample = IndexMap::with_capacity(values.len());
            for (key, value) in format.iter().zip(values) {
                if key == GENOTYPE_KEY {
                    let gt: Genotype = value.parse().map_err(|_| {
                        MalformedRecordError::new(
                            name.as_str(),
                            format!("invalid genotype `{}`", value),
                        )
                    })?;
                    if let Some(i) = gt.alleles().iter().filter_map(|a| a.index()).max() {
                        if i as usize > n_alt {
                            return Err(MalformedRecordError::new(
                                name.as_str(),
                                format!("genotype `{}` refers to allele {} of {}", value, i, n_alt),
                            ));
                        }
                    }
                    sample.insert(key.clone(), vec![value.to_owned()]);
                    continue;
                }
                let values = split_values(value);
                check_typed(name, key, header.format_type(key), &values)?;
                check_arity(name, key, header.format_number(key), n_alt, &values)?;
                sample.insert(key.clone(), values);
            }
            samples.insert(name.clone(), sample);
        }

        Ok(Variant {
            chrom: chrom.to_owned(),
            pos,
            id,
            ref_allele: ref_allele.to_owned(),
            alt_alleles,
            qual,
            filter,
            info,
            format,
            samples,
            header: header.clone(),
        })
    }

    /// A sites-only record with no INFO, for building records in code.
    pub fn new(
        header: Arc<Header>,
        chrom: &str,
        pos: u64,
        ref_allele: &str,
        alt_alleles: &[&str],
    ) -> Variant {
        let samples = header
            .samples()
            .iter()
            .map(|s| (s.clone(), IndexMap::new()))
            .collect();
        Variant {
            chrom: chrom.to_owned(),
            pos,
            id: vec![],
            ref_allele: ref_allele.to_owned(),
            alt_alleles: alt_alleles.iter().map(|a| a.to_string()).collect(),
            qual: None,
            filter: Filter::Missing,
            info: IndexMap::new(),
            format: vec![],
            samples,
            header,
        }
    }

    /// The record as a tab-separated line, without a line ending.
    pub fn to_text(&self) -> String {
        let mut columns = vec![
            self.chrom.clone(),
            self.pos.to_string(),
            if self.id.is_empty() {
                MISSING_VALUE.to_owned()
            } else {
                self.id.join(";")
            },
            self.ref_allele.clone(),
            if self.alt_alleles.is_empty() {
                MISSING_VALUE.to_owned()
            } else {
                self.alt_alleles.join(",")
            },
            self.qual
                .as_ref()
                .map(|q| q.text.clone())
                .unwrap_or_else(|| MISSING_VALUE.to_owned()),
            self.filter.to_string(),
            self.info_text(),
        ];
        if !self.format.is_empty() {
            columns.push(self.format.join(":"));
            for sample in self.samples.values() {
                columns.push(self.sample_text(sample));
            }
        }
        columns.join("\t")
    }

    fn info_text(&self) -> String {
        if self.info.is_empty() {
            return MISSING_VALUE.to_owned();
        }
        self.info
            .iter()
            .map(|(key, values)| {
                if values.is_empty() {
                    key.clone()
                } else {
                    format!("{}={}", key, values.join(","))
                }
            })
            .join(";")
    }

    fn sample_text(&self, sample: &IndexMap<String, Vec<String>>) -> String {
        let present = self
            .format
            .iter()
            .rposition(|key| sample.contains_key(key))
            .map_or(0, |i| i + 1);
        if present == 0 {
            return MISSING_VALUE.to_owned();
        }
        self.format[..present]
            .iter()
            .map(|key| match sample.get(key) {
                Some(values) => values.join(","),
                None => MISSING_VALUE.to_owned(),
            })
            .join(":")
    }

    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    pub fn set_header(&mut self, header: Arc<Header>) {
        self.header = header;
    }

    pub fn set_chrom(&mut self, chrom: &str) {
        self.chrom = chrom.to_owned();
    }

    pub fn set_pos(&mut self, pos: u64) {
        self.pos = pos;
    }

    pub fn set_id(&mut self, id: Vec<String>) {
        self.id = id;
    }

    pub fn set_ref_allele(&mut self, ref_allele: &str) {
        self.ref_allele = ref_allele.to_owned();
    }

    /// Replace the ALT strings in place. Allele order, and with it every
    /// genotype index, is unaffected.
    pub fn set_alt_alleles(&mut self, alt_alleles: Vec<String>) {
        self.alt_alleles = alt_alleles;
    }

    pub fn set_qual(&mut self, qual: Option<f32>) {
        self.qual = qual.map(Qual::new);
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Raw INFO values; a flag has an empty list.
    pub fn info_values(&self, key: &str) -> Option<&[String]> {
        self.info.get(key).map(Vec::as_slice)
    }

    pub fn info_keys(&self) -> impl Iterator<Item = &str> {
        self.info.keys().map(String::as_str)
    }

    pub fn set_info(&mut self, key: &str, values: Vec<String>) {
        self.info.insert(key.to_owned(), values);
    }

    pub fn set_flag(&mut self, key: &str) {
        self.info.insert(key.to_owned(), vec![]);
    }

    pub fn remove_info(&mut self, key: &str) -> Option<Vec<String>> {
        self.info.shift_remove(key)
    }

    pub fn format_keys(&self) -> &[String] {
        &self.format
    }

    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.samples.keys().map(String::as_str)
    }

    /// Raw FORMAT values of one sample.
    pub fn sample_values(&self, sample: &str, key: &str) -> Option<&[String]> {
        self.samples
            .get(sample)
            .and_then(|s| s.get(key))
            .map(Vec::as_slice)
    }

    /// Set a FORMAT value of one sample, declaring `key` in FORMAT if needed.
    /// Returns `false` if the sample does not exist.
    pub fn set_sample_values(&mut self, sample: &str, key: &str, values: Vec<String>) -> bool {
        match self.samples.get_mut(sample) {
            Some(s) => {
                s.insert(key.to_owned(), values);
                if !self.format.iter().any(|k| k == key) {
                    if key == GENOTYPE_KEY {
                        self.format.insert(0, key.to_owned());
                    } else {
                        self.format.push(key.to_owned());
                    }
                }
                true
            }
            None => false,
        }
    }

    pub fn genotype(&self, sample: &str) -> Option<Genotype> {
        self.sample_values(sample, GENOTYPE_KEY)
            .and_then(|v| v.first())
            .and_then(|gt| gt.parse().ok())
    }

    pub fn set_genotype(&mut self, sample: &str, genotype: &Genotype) -> bool {
        self.set_sample_values(sample, GENOTYPE_KEY, vec![genotype.to_string()])
    }

    /// REF followed by the ALTs.
    pub fn alleles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.ref_allele.as_str()).chain(self.alt_alleles.iter().map(String::as_str))
    }

    pub fn has_symbolic_alt(&self) -> bool {
        self.alt_alleles.iter().any(|a| is_symbolic(a))
    }

    /// Allele classes among the literal ALTs.
    pub fn classify(&self) -> BTreeSet<AlleleClass> {
        let mut classes = BTreeSet::new();
        let reference = self.ref_allele.to_ascii_uppercase();
        for alt in self.alt_alleles.iter().filter(|a| !is_symbolic(a)) {
            let alt = alt.to_ascii_uppercase();
            let (r, a) = (reference.len(), alt.len());
            if r == 1 && a == 1 {
                classes.insert(AlleleClass::Snp);
                classes.insert(if is_transition(&reference, &alt) {
                    AlleleClass::Transition
                } else {
                    AlleleClass::Transversion
                });
            } else if r == a {
                classes.insert(AlleleClass::Mnp);
            } else {
                classes.insert(if r < a {
                    AlleleClass::Insertion
                } else {
                    AlleleClass::Deletion
                });
                let (short, long) = if r < a { (&reference, &alt) } else { (&alt, &reference) };
                if !long.starts_with(short.as_str()) && !long.ends_with(short.as_str()) {
                    classes.insert(AlleleClass::Complex);
                }
            }
        }
        classes
    }

    /// Shrink a single-ALT record whose REF/ALT differ in exactly one place to
    /// just that difference. Pure insertions and deletions keep the preceding
    /// base as anchor. Returns whether the record changed.
    pub fn clean_complex(&mut self, decomposer: &Decomposer) -> Result<bool, Error> {
        if self.alt_alleles.len() != 1 || self.has_symbolic_alt() {
            return Ok(false);
        }
        let alleles = decomposer
            .decompose(
                self.ref_allele.as_bytes(),
                self.alt_alleles[0].as_bytes(),
                self.pos,
            )
            .map_err(|e| Error::at_variant(&self.chrom, self.pos, e))?
            .collect_vec();
        let mut edits = alleles.iter().filter(|a| a.kind() != AlleleKind::Identity);
        let edit = match (edits.next(), edits.next()) {
            (Some(edit), None) => edit,
            _ => return Ok(false),
        };
        let offset = (edit.position - self.pos) as usize;
        let (start, reference, alternate) = if edit.reference.is_empty() || edit.alternate.is_empty() {
            if offset == 0 {
                return Ok(false);
            }
            let anchor = match self.ref_allele.get(offset - 1..offset) {
                Some(anchor) => anchor,
                None => return Ok(false),
            };
            (
                offset - 1,
                format!("{}{}", anchor, edit.reference),
                format!("{}{}", anchor, edit.alternate),
            )
        } else {
            (offset, edit.reference.clone(), edit.alternate.clone())
        };
        if reference == self.ref_allele {
            return Ok(false);
        }
        self.pos += start as u64;
        self.ref_allele = reference;
        self.alt_alleles = vec![alternate];
        Ok(true)
    }
}

fn is_transition(reference: &str, alt: &str) -> bool {
    matches!(
        (reference, alt),
        ("A", "G") | ("G", "A") | ("C", "T") | ("T", "C")
    )
}

impl Record for Variant {
    fn chrom(&self) -> &str {
        &self.chrom
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn id(&self) -> &[String] {
        &self.id
    }

    fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    fn alt_alleles(&self) -> &[String] {
        &self.alt_alleles
    }

    fn qual(&self) -> Option<f32> {
        self.qual.as_ref().map(Qual::value)
    }

    fn filters(&self) -> Vec<&str> {
        self.filter.ids()
    }

    fn info(&self, tag: &str) -> Option<TypedVec> {
        self.info.get(tag).map(|values| {
            if values.is_empty() {
                TypedVec::Flag
            } else {
                TypedVec::from_values(self.header.info_type(tag), values)
            }
        })
    }

    /// One entry per sample; samples without the key yield `TypedVec::Missing`.
    fn format(&self, tag: &str) -> Option<Vec<TypedVec>> {
        if !self.format.iter().any(|k| k == tag) {
            return None;
        }
        let kind = self.header.format_type(tag);
        Some(
            self.samples
                .values()
                .map(|sample| match sample.get(tag) {
                    Some(values) => TypedVec::from_values(kind, values),
                    None => TypedVec::Missing,
                })
                .collect(),
        )
    }

    fn genotypes(&self) -> Vec<Option<Genotype>> {
        self.samples
            .keys()
            .map(|sample| self.genotype(sample))
            .collect()
    }

    fn has_flag(&self, tag: &str) -> bool {
        self.info.get(tag).map_or(false, Vec::is_empty)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total depth\">
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele frequency\">
##INFO=<ID=AD,Number=R,Type=Integer,Description=\"Allelic depths\">
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=GQ,Number=1,Type=Integer,Description=\"Genotype quality\">
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Likelihoods\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2";

    fn header() -> Arc<Header> {
        Arc::new(Header::from_text(HEADER).unwrap())
    }

    #[test]
    fn test_round_trip() {
        let header = header();
        for line in [
            "1\t100\trs1;rs2\tA\tT,G\t1e1\tPASS\tDP=10;AF=0.1,0.2;DB\tGT:GQ:PL\t0/1:30:0,1,2,3,4,5\t1|2",
            "1\t100\t.\tA\t.\t.\t.\t.\tGT\t./.\t.",
            "chr2\t5\t.\tACG\tA\t30.00\tq10;s50\tAD=1,2;X=\tGT:GQ\t0/1:.\t0/0",
        ] {
            let variant = Variant::parse(line, &header).unwrap();
            assert_eq!(variant.to_text(), line);
        }
    }

    #[test]
    fn test_accessors() {
        let line =
            "1\t100\trs1\tA\tT,G\t50\tPASS\tDP=10;AF=0.1,.;DB\tGT:GQ:PL\t0/1:30:0,1,2,3,4,5\t1|2";
        let variant = Variant::parse(line, &header()).unwrap();
        assert_eq!(variant.chrom(), "1");
        assert_eq!(variant.pos(), 100);
        assert_eq!(variant.alt_alleles(), &["T".to_string(), "G".to_string()]);
        assert_eq!(variant.qual(), Some(50.0));
        assert_eq!(variant.filters(), vec!["PASS"]);
        assert_eq!(
            variant.info("DP").unwrap().integer(),
            Some(&[Some(10)][..])
        );
        assert_eq!(
            variant.info("AF").unwrap().float(),
            Some(&[Some(0.1), None][..])
        );
        assert!(variant.has_flag("DB"));
        assert!(!variant.has_flag("DP"));
        let gq = variant.format("GQ").unwrap();
        assert_eq!(gq[0].integer(), Some(&[Some(30)][..]));
        assert_eq!(gq[1], TypedVec::Missing);
        let gts = variant.genotypes();
        assert_eq!(gts[1].as_ref().unwrap().to_string(), "1|2");
    }

    #[test]
    fn test_malformed_columns() {
        let header = header();
        let err = Variant::parse("1\t100\t.\tA\tT\t.\t.\t.", &header).unwrap_err();
        assert_eq!(err.column, "line");
        let err = Variant::parse("1\t0\t.\tA\tT\t.\t.\t.\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "POS");
        let err = Variant::parse("1\t1\t.\tA\tT\tx\t.\t.\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "QUAL");
        let err = Variant::parse("1\t1\t.\tA\tT\t.\t.\tDP=x\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "INFO");
        let err = Variant::parse("1\t1\t.\tA\tT\t.\t.\tAF=0.1,0.2\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "INFO");
        let err = Variant::parse("1\t1\t.\tA\tA\t.\t.\t.\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "ALT");
        let err = Variant::parse("1\t1\t.\tA\tT,T\t.\t.\t.\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "ALT");
        let err = Variant::parse("1\t1\t.\tA\tT\t.\t.\t.\tGT:GQ\t0/2\t0", &header).unwrap_err();
        assert_eq!(err.column, "S1");
        let err = Variant::parse("1\t1\t.\tA\tT\t.\t.\t.\tGT:GQ\t0/1:x\t0", &header).unwrap_err();
        assert_eq!(err.column, "S1");
        let err = Variant::parse("1\t1\t.\tA\tT\t.\t.\tDP=1;DP=2\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.column, "INFO");
    }

    #[test]
    fn test_errors_after_pos_carry_location() {
        let header = header();
        let err = Variant::parse("1\t0\t.\tA\tT\t.\t.\t.\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.location, None);
        let err = Variant::parse("2\t57\t.\tA\tT\t.\t.\tDP=x\tGT\t0\t0", &header).unwrap_err();
        assert_eq!(err.location, Some(("2".to_string(), 57)));
        assert!(err.to_string().contains("2:57"));
        let err = Variant::parse("2\t58\t.\tA\tT\t.\t.\t.\tGT\t0/3\t0", &header).unwrap_err();
        assert_eq!(err.column, "S1");
        assert_eq!(err.location, Some(("2".to_string(), 58)));
    }

    #[test]
    fn test_setters_fill_missing_sample_keys() {
        let mut variant =
            Variant::parse("1\t100\t.\tA\tT\t.\t.\t.\tGT:GQ:PL\t0/1\t1/1:20", &header()).unwrap();
        assert!(variant.set_sample_values("S1", "PL", vec!["0".into(), "1".into(), "2".into()]));
        assert!(!variant.set_sample_values("S3", "GQ", vec![]));
        variant.set_info("DP", vec!["7".into()]);
        variant.set_flag("DB");
        variant.set_qual(Some(12.5));
        assert_eq!(
            variant.to_text(),
            "1\t100\t.\tA\tT\t12.5\t.\tDP=7;DB\tGT:GQ:PL\t0/1:.:0,1,2\t1/1:20"
        );
    }

    #[test]
    fn test_symbolic() {
        assert!(is_symbolic("<DEL>"));
        assert!(is_symbolic("A[chr2:100["));
        assert!(is_symbolic("*"));
        assert!(is_symbolic(".A"));
        assert!(!is_symbolic("ACGT"));
    }

    #[test]
    fn test_classify() {
        let header = Arc::new(Header::new());
        let variant = Variant::new(header.clone(), "1", 10, "A", &["G", "C", "AT"]);
        let classes = variant.classify().into_iter().collect_vec();
        assert_eq!(
            classes,
            vec![
                AlleleClass::Snp,
                AlleleClass::Transition,
                AlleleClass::Transversion,
                AlleleClass::Insertion
            ]
        );
        let variant = Variant::new(header, "1", 10, "ACG", &["TT", "TCA"]);
        let classes = variant.classify().into_iter().collect_vec();
        assert_eq!(
            classes,
            vec![AlleleClass::Deletion, AlleleClass::Mnp, AlleleClass::Complex]
        );
    }

    #[test]
    fn test_clean_complex() {
        let header = Arc::new(Header::new());
        let decomposer = Decomposer::default();

        let mut variant = Variant::new(header.clone(), "1", 10, "ACGTA", &["ACTTA"]);
        assert!(variant.clean_complex(&decomposer).unwrap());
        assert_eq!((variant.pos, variant.ref_allele.as_str()), (12, "G"));
        assert_eq!(variant.alt_alleles, vec!["T"]);

        let mut variant = Variant::new(header.clone(), "1", 10, "GATTACA", &["GACA"]);
        assert!(variant.clean_complex(&decomposer).unwrap());
        assert_eq!((variant.pos, variant.ref_allele.as_str()), (11, "ATTA"));
        assert_eq!(variant.alt_alleles, vec!["A"]);

        let mut variant = Variant::new(header, "1", 10, "ACGTA", &["TCGTT"]);
        assert!(!variant.clean_complex(&decomposer).unwrap());
    }
}
