use std::convert::TryFrom;

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag};
use nom::character::complete::{anychar, char, digit1, one_of};
use nom::combinator::{all_consuming, map, map_res, recognize, rest};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair};
use nom::IResult;

use crate::error::MalformedHeaderError;
use crate::record::GenotypeAllele;
use crate::types::{
    HeaderContig, HeaderFilter, HeaderFormat, HeaderInfo, HeaderValue, InfoNumber,
};

fn parse_usize(input: &str) -> Result<usize, std::num::ParseIntError> {
    input.parse()
}

fn number(input: &str) -> IResult<&str, InfoNumber> {
    alt((
        map(map_res(digit1, parse_usize), InfoNumber::Count),
        map(one_of("ARG."), |c| match c {
            'A' => InfoNumber::AlternateAlleles,
            'R' => InfoNumber::Alleles,
            'G' => InfoNumber::Genotypes,
            _ => InfoNumber::Unknown,
        }),
    ))(input)
}

pub(crate) fn info_number(input: &str) -> Result<InfoNumber, nom::Err<nom::error::Error<&str>>> {
    all_consuming(number)(input).map(|(_, n)| n)
}

fn string(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0(alt((
            recognize(pair(char('\\'), anychar)),
            is_not("\\\""),
        )))),
        char('"'),
    )(input)
}

fn keys_and_values(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    fn key_value(input: &str) -> IResult<&str, (&str, &str)> {
        separated_pair(is_not("<,=>"), char('='), alt((string, is_not(",>"))))(input)
    }
    separated_list0(char(','), key_value)(input)
}

fn structured(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    all_consuming(delimited(char('<'), keys_and_values, char('>')))(input)
}

fn header_line(input: &str) -> IResult<&str, (&str, &str)> {
    preceded(tag("##"), separated_pair(is_not("="), char('='), rest))(input)
}

/// Split a `##KEY=VALUE` meta line and type the value for the keys the record
/// model depends on. Unknown keys are kept as plain strings.
pub(crate) fn header_entry(line: &str) -> Result<(String, HeaderValue), MalformedHeaderError> {
    let (_, (key, value)) = header_line(line)
        .map_err(|_| MalformedHeaderError::new(line, "expected `##KEY=VALUE`"))?;
    let fields = || {
        structured(value)
            .map(|(_, data)| data)
            .map_err(|_| MalformedHeaderError::new(line, "expected `<key=value,...>`"))
    };
    let value = match key {
        "INFO" => HeaderValue::Info(HeaderInfo::try_from(fields()?)?),
        "FORMAT" => HeaderValue::Format(HeaderFormat::try_from(fields()?)?),
        "FILTER" => HeaderValue::Filter(HeaderFilter::try_from(fields()?)?),
        "contig" => HeaderValue::Contig(HeaderContig::try_from(fields()?)?),
        _ => HeaderValue::String(value.to_owned()),
    };
    Ok((key.to_owned(), value))
}

/// One `<len><op>` run of a compact CIGAR.
pub(crate) fn cigar_run(input: &str) -> IResult<&str, (u32, char)> {
    pair(map_res(digit1, str::parse::<u32>), one_of("MIDX"))(input)
}

fn allele_index(input: &str) -> IResult<&str, Option<i32>> {
    alt((
        map(char('.'), |_| None),
        map(map_res(digit1, str::parse::<i32>), Some),
    ))(input)
}

fn phased_allele(input: &str) -> IResult<&str, GenotypeAllele> {
    map(pair(one_of("/|"), allele_index), |(sep, index)| {
        GenotypeAllele::new(index, sep == '|')
    })(input)
}

/// `0/1`, `1|0`, `./.`, `2` ...
pub(crate) fn genotype(input: &str) -> IResult<&str, Vec<GenotypeAllele>> {
    let (input, first) = allele_index(input)?;
    let (input, rest) = all_consuming(many0(phased_allele))(input)?;
    let mut alleles = Vec::with_capacity(rest.len() + 1);
    alleles.push(GenotypeAllele::new(first, false));
    alleles.extend(rest);
    Ok((input, alleles))
}

/// Optional trailing `\r` as produced by files written on Windows.
pub(crate) fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_number() {
        assert_eq!(info_number("3").unwrap(), InfoNumber::Count(3));
        assert_eq!(info_number("A").unwrap(), InfoNumber::AlternateAlleles);
        assert_eq!(info_number("R").unwrap(), InfoNumber::Alleles);
        assert_eq!(info_number("G").unwrap(), InfoNumber::Genotypes);
        assert_eq!(info_number(".").unwrap(), InfoNumber::Unknown);
        assert!(info_number("AB").is_err());
    }

    #[test]
    fn test_quoted_description_with_commas_and_escapes() {
        let (_, data) = structured(
            r#"<ID=AF,Number=A,Type=Float,Description="Frequency, \"estimated\"">"#,
        )
        .unwrap();
        assert_eq!(data[3], ("Description", r#"Frequency, \"estimated\""#));
    }

    #[test]
    fn test_empty_description() {
        let (_, data) = structured(r#"<ID=X,Description="">"#).unwrap();
        assert_eq!(data[1], ("Description", ""));
    }

    #[test]
    fn test_header_entry_kinds() {
        let (key, value) = header_entry("##fileformat=VCFv4.3").unwrap();
        assert_eq!(key, "fileformat");
        assert!(matches!(value, HeaderValue::String(s) if s == "VCFv4.3"));

        let (key, value) = header_entry("##contig=<ID=chr2,length=100>").unwrap();
        assert_eq!(key, "contig");
        assert!(matches!(value, HeaderValue::Contig(c) if c.id == "chr2"));

        assert!(header_entry("##INFO=<ID=DP,Type=Integer>").is_err());
        assert!(header_entry("#CHROM").is_err());
    }

    #[test]
    fn test_genotype() {
        let (_, gt) = genotype("0|1").unwrap();
        assert_eq!(
            gt,
            vec![GenotypeAllele::Unphased(0), GenotypeAllele::Phased(1)]
        );
        let (_, gt) = genotype("./.").unwrap();
        assert_eq!(
            gt,
            vec![
                GenotypeAllele::UnphasedMissing,
                GenotypeAllele::UnphasedMissing
            ]
        );
        let (_, gt) = genotype("2").unwrap();
        assert_eq!(gt, vec![GenotypeAllele::Unphased(2)]);
        assert!(genotype("0/x").is_err());
        assert!(genotype("").is_err());
    }
}
