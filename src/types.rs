use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use getset::Getters;
use indexmap::IndexMap;
use itertools::Itertools;
use multimap::MultiMap;
use strum::{Display, EnumString};

use crate::error::MalformedHeaderError;
use crate::parser;

pub(crate) const MISSING_VALUE: &str = ".";
pub(crate) const GENOTYPE_KEY: &str = "GT";

pub type Sample = String;
pub type HeaderKey<'a> = &'a str;

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Header {
    pub(crate) meta: MultiMap<String, HeaderValue>,
    pub(crate) info: IndexMap<String, HeaderInfo>,
    pub(crate) format: IndexMap<String, HeaderFormat>,
    pub(crate) contigs: IndexMap<String, HeaderContig>,
    pub(crate) filters: IndexMap<String, HeaderFilter>,
    pub(crate) samples: Vec<Sample>,
    // `##` lines in input order, kept verbatim for serialization
    lines: Vec<String>,
}

#[derive(Debug, Clone, Eq, PartialEq, Copy, EnumString, Display)]
pub enum InfoType {
    Integer,
    Float,
    Flag,
    Character,
    String,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum InfoNumber {
    Count(usize),
    Alleles,
    AlternateAlleles,
    Genotypes,
    Unknown,
}

impl fmt::Display for InfoNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoNumber::Count(n) => write!(f, "{}", n),
            InfoNumber::Alleles => write!(f, "R"),
            InfoNumber::AlternateAlleles => write!(f, "A"),
            InfoNumber::Genotypes => write!(f, "G"),
            InfoNumber::Unknown => write!(f, "."),
        }
    }
}

impl InfoNumber {
    /// Number of values expected for a record with `n_alt` alternate alleles,
    /// if that number does not depend on ploidy.
    pub fn expected_len(self, n_alt: usize) -> Option<usize> {
        match self {
            InfoNumber::Count(n) => Some(n),
            InfoNumber::AlternateAlleles => Some(n_alt),
            InfoNumber::Alleles => Some(n_alt + 1),
            InfoNumber::Genotypes | InfoNumber::Unknown => None,
        }
    }

    /// Whether the value list is indexed by allele or genotype, i.e. has to be
    /// rewritten when alleles are removed or merged.
    pub fn is_per_allele(self) -> bool {
        matches!(
            self,
            InfoNumber::Alleles | InfoNumber::AlternateAlleles | InfoNumber::Genotypes
        )
    }
}

#[derive(Debug, Clone)]
pub enum HeaderValue {
    String(String),
    Info(HeaderInfo),
    Filter(HeaderFilter),
    Format(HeaderFormat),
    Contig(HeaderContig),
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderInfo {
    pub(crate) id: String,
    number: InfoNumber,
    kind: InfoType,
    description: String,
    // may be empty
    source: String,
    // may be empty
    version: String,
    additional: HashMap<String, String>,
}

impl HeaderInfo {
    pub fn new(id: &str, number: InfoNumber, kind: InfoType, description: &str) -> Self {
        HeaderInfo {
            id: id.into(),
            number,
            kind,
            description: description.into(),
            source: String::new(),
            version: String::new(),
            additional: HashMap::new(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "##INFO=<ID={},Number={},Type={},Description=\"{}\">",
            self.id, self.number, self.kind, self.description
        )
    }
}

fn mandatory<'a>(
    h: &mut HashMap<&'a str, &'a str>,
    key: &str,
) -> Result<&'a str, MalformedHeaderError> {
    h.remove(key)
        .ok_or_else(|| MalformedHeaderError::new("", format!("{} is mandatory", key)))
}

fn number_and_type<'a>(
    h: &mut HashMap<&'a str, &'a str>,
) -> Result<(InfoNumber, InfoType), MalformedHeaderError> {
    let number = mandatory(h, "Number")?;
    let number = parser::info_number(number)
        .map_err(|_| MalformedHeaderError::new("", format!("unknown Number `{}`", number)))?;
    let kind = mandatory(h, "Type")?;
    let kind = InfoType::from_str(kind)
        .map_err(|_| MalformedHeaderError::new("", format!("unknown Type `{}`", kind)))?;
    Ok((number, kind))
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderInfo {
    type Error = MalformedHeaderError;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        let id = mandatory(&mut h, "ID")?.into();
        let (number, kind) = number_and_type(&mut h)?;
        Ok(HeaderInfo {
            id,
            number,
            kind,
            // Description is mandatory per VCFv4.3 but frequently missing in the wild
            description: h.remove("Description").unwrap_or("").into(),
            source: h.remove("Source").unwrap_or("").into(),
            version: h.remove("Version").unwrap_or("").into(),
            additional: h.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderFormat {
    pub(crate) id: String,
    number: InfoNumber,
    kind: InfoType,
    description: String,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderFormat {
    type Error = MalformedHeaderError;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        let id = mandatory(&mut h, "ID")?.into();
        let (number, kind) = number_and_type(&mut h)?;
        Ok(HeaderFormat {
            id,
            number,
            kind,
            description: h.remove("Description").unwrap_or("").into(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderContig {
    pub(crate) id: String,
    length: Option<u64>,
    additional: HashMap<String, String>,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderContig {
    type Error = MalformedHeaderError;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        Ok(HeaderContig {
            id: mandatory(&mut h, "ID")?.into(),
            length: h.remove("length").and_then(|s| s.parse().ok()),
            additional: h.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        })
    }
}

#[derive(Debug, Getters, Clone)]
#[getset(get = "pub")]
pub struct HeaderFilter {
    pub(crate) id: String,
    description: String,
}

impl<'a> TryFrom<Vec<(&'a str, &'a str)>> for HeaderFilter {
    type Error = MalformedHeaderError;

    fn try_from(data: Vec<(&'a str, &'a str)>) -> Result<Self, Self::Error> {
        let mut h: HashMap<_, _> = data.into_iter().collect();
        Ok(HeaderFilter {
            id: mandatory(&mut h, "ID")?.into(),
            description: h.remove("Description").unwrap_or("").into(),
        })
    }
}

const FIXED_COLUMNS: [&str; 8] = ["#CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO"];

impl Header {
    /// An empty header without samples.
    pub fn new() -> Self {
        Header {
            meta: MultiMap::new(),
            info: IndexMap::new(),
            format: IndexMap::new(),
            contigs: IndexMap::new(),
            filters: IndexMap::new(),
            samples: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Parse the `##` meta lines and the `#CHROM` column line of a VCF.
    pub fn from_text(text: &str) -> Result<Self, MalformedHeaderError> {
        let mut header = Header::new();
        for line in text.lines().map(|l| l.trim_end_matches('\r')) {
            if line.is_empty() {
                continue;
            }
            if line.starts_with("##") {
                header.push_meta_line(line)?;
            } else if line.starts_with('#') {
                header.set_columns(line)?;
            } else {
                return Err(MalformedHeaderError::new(line, "expected a `#` header line"));
            }
        }
        Ok(header)
    }

    pub(crate) fn push_meta_line(&mut self, line: &str) -> Result<(), MalformedHeaderError> {
        let (key, value) =
            parser::header_entry(line).map_err(|e| MalformedHeaderError { line: line.into(), ..e })?;
        match &value {
            HeaderValue::Info(info) => {
                self.info.insert(info.id.clone(), info.clone());
            }
            HeaderValue::Format(format) => {
                self.format.insert(format.id.clone(), format.clone());
            }
            HeaderValue::Contig(contig) => {
                self.contigs.insert(contig.id.clone(), contig.clone());
            }
            HeaderValue::Filter(filter) => {
                self.filters.insert(filter.id.clone(), filter.clone());
            }
            HeaderValue::String(_) => {}
        }
        self.meta.insert(key, value);
        self.lines.push(line.to_owned());
        Ok(())
    }

    pub(crate) fn set_columns(&mut self, line: &str) -> Result<(), MalformedHeaderError> {
        let columns = line.split('\t').collect_vec();
        if columns.len() < FIXED_COLUMNS.len() || columns[..FIXED_COLUMNS.len()] != FIXED_COLUMNS {
            return Err(MalformedHeaderError::new(
                line,
                "column line must start with the eight fixed VCF columns",
            ));
        }
        let samples = columns.iter().skip(FIXED_COLUMNS.len() + 1).copied();
        let mut seen = HashSet::new();
        self.samples.clear();
        for sample in samples {
            if !seen.insert(sample) {
                return Err(MalformedHeaderError::new(
                    line,
                    format!("duplicate sample name `{}`", sample),
                ));
            }
            self.samples.push(sample.to_owned());
        }
        Ok(())
    }

    /// Declare an INFO key, replacing an existing declaration of the same ID.
    pub fn add_info(&mut self, info: HeaderInfo) {
        let line = info.to_line();
        if let Some(old) = self.info.get(&info.id) {
            let old_prefix = format!("##INFO=<ID={},", old.id);
            self.lines.retain(|l| !l.starts_with(&old_prefix));
        }
        self.info.insert(info.id.clone(), info.clone());
        self.meta.insert("INFO".into(), HeaderValue::Info(info));
        self.lines.push(line);
    }

    pub fn info_number(&self, key: &str) -> InfoNumber {
        self.info
            .get(key)
            .map(|i| *i.number())
            .unwrap_or(InfoNumber::Unknown)
    }

    pub fn info_type(&self, key: &str) -> InfoType {
        self.info
            .get(key)
            .map(|i| *i.kind())
            .unwrap_or(InfoType::String)
    }

    pub fn format_number(&self, key: &str) -> InfoNumber {
        if key == GENOTYPE_KEY {
            return InfoNumber::Count(1);
        }
        self.format
            .get(key)
            .map(|f| *f.number())
            .unwrap_or(InfoNumber::Unknown)
    }

    pub fn format_type(&self, key: &str) -> InfoType {
        if key == GENOTYPE_KEY {
            return InfoType::String;
        }
        self.format
            .get(key)
            .map(|f| *f.kind())
            .unwrap_or(InfoType::String)
    }

    /// Header text as it would appear in a VCF file, without a trailing newline.
    pub fn to_text(&self) -> String {
        let columns = FIXED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(if self.samples.is_empty() {
                None
            } else {
                Some("FORMAT".to_string())
            })
            .chain(self.samples.iter().cloned())
            .join("\t");
        self.lines.iter().chain(std::iter::once(&columns)).join("\n")
    }
}

impl Default for Header {
    fn default() -> Self {
        Header::new()
    }
}

/// A value list converted according to its declared type.
/// Missing entries (`.`) are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedVec {
    Missing,
    Flag,
    Integer(Vec<Option<i32>>),
    Float(Vec<Option<f32>>),
    Character(Vec<Option<char>>),
    String(Vec<String>),
}

impl TypedVec {
    pub(crate) fn from_values(kind: InfoType, values: &[String]) -> Self {
        fn typed<T: FromStr>(values: &[String]) -> Vec<Option<T>> {
            values
                .iter()
                .map(|v| {
                    if v == MISSING_VALUE {
                        None
                    } else {
                        v.parse().ok()
                    }
                })
                .collect()
        }
        if values.len() == 1 && values[0] == MISSING_VALUE && kind != InfoType::String {
            return TypedVec::Missing;
        }
        match kind {
            InfoType::Flag => TypedVec::Flag,
            InfoType::Integer => TypedVec::Integer(typed(values)),
            InfoType::Float => TypedVec::Float(typed(values)),
            InfoType::Character => TypedVec::Character(typed(values)),
            InfoType::String => TypedVec::String(values.to_vec()),
        }
    }

    pub fn integer(&self) -> Option<&[Option<i32>]> {
        match self {
            TypedVec::Integer(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<&[Option<f32>]> {
        match self {
            TypedVec::Float(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&[String]> {
        match self {
            TypedVec::String(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn flag(&self) -> bool {
        // a flag is present iff its key is present; any value is tolerated
        true
    }
}
