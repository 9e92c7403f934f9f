use std::io::{self, BufReader, BufWriter, Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bio::io::fasta;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use rust_vcfnorm::align::{Scoring, DEFAULT_WAVEFRONT_THRESHOLD};
use rust_vcfnorm::allele::{DecomposeConfig, Decomposer};
use rust_vcfnorm::cigar::EditScript;
use rust_vcfnorm::record::multiallelic::{merge_multiallelic, split_multiallelic};
use rust_vcfnorm::record::{is_symbolic, AlleleClass, Record, Variant};
use rust_vcfnorm::types::{HeaderInfo, InfoNumber, InfoType};
use rust_vcfnorm::{Error, Normalizer, VcfRecords};

type Records = VcfRecords<BufReader<Box<dyn Read>>>;

/// Options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// Input VCF, optionally gzipped; `-` reads standard input.
    #[clap(default_value = "-")]
    input: String,

    /// Abort on the first record that cannot be processed instead of skipping it.
    #[clap(long, action)]
    strict: bool,

    /// Score of a matching base.
    #[clap(long = "match", default_value_t = Scoring::default().match_score())]
    match_score: i32,

    /// Penalty of a mismatching base.
    #[clap(long, default_value_t = Scoring::default().mismatch())]
    mismatch: i32,

    /// Penalty for opening a gap.
    #[clap(long, default_value_t = Scoring::default().gap_open())]
    gap_open: i32,

    /// Penalty for each base of a gap.
    #[clap(long, default_value_t = Scoring::default().gap_extend())]
    gap_extend: i32,

    /// Alleles at least this long are aligned with the wavefront backend.
    #[clap(long, default_value_t = DEFAULT_WAVEFRONT_THRESHOLD)]
    wavefront_threshold: usize,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, default_value = "4")]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = warn, 2 = info, 3 = debug)
    #[clap(short, long, default_value = "1")]
    verbose: u8,
}

/// Canonicalize and reshape the records of a VCF.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
struct Args {
    #[clap(flatten)]
    common: CommonOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Left-align and trim every record
    Normalize {
        /// FASTA of the reference the VCF was called against, used to slide
        /// indels beyond the REF allele.
        #[clap(short = 'r', long)]
        reference: Option<PathBuf>,

        /// Records handed to the thread pool at a time.
        #[clap(long, default_value_t = 1000)]
        chunk_size: usize,
    },
    /// Split multi-ALT records into one record per ALT
    Breakmulti,
    /// Merge consecutive records sharing CHROM, POS and REF
    Createmulti,
    /// Print the primitive edits and CIGAR of every ALT
    Decompose,
    /// Flag each record with the classes of its ALTs
    Classify,
    /// Shrink single-edit records to the edit
    Cleancomplex,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let common = &args.common;
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Warn,
            2 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();
    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()?;

    let scoring = Scoring::new(
        common.match_score,
        common.mismatch,
        common.gap_open,
        common.gap_extend,
    );
    scoring.validate()?;
    let decomposer = Decomposer::new(
        DecomposeConfig::default()
            .with_scoring(scoring)
            .with_wavefront_threshold(common.wavefront_threshold),
    );
    let records = open(&common.input)?;
    let mut out = BufWriter::new(io::stdout().lock());

    match &args.command {
        Command::Normalize {
            reference,
            chunk_size,
        } => {
            let fasta = reference.as_deref().map(read_fasta).transpose()?;
            let mut normalizer = Normalizer::new(decomposer);
            if let Some(fasta) = &fasta {
                normalizer = normalizer.with_reference(fasta);
            }
            normalize(records, &normalizer, (*chunk_size).max(1), common.strict, &mut out)?
        }
        Command::Breakmulti => {
            writeln!(out, "{}", records.header().to_text())?;
            for result in records {
                if let Some(variant) = accept(result, common.strict)? {
                    for split in split_multiallelic(&variant) {
                        writeln!(out, "{}", split)?;
                    }
                }
            }
        }
        Command::Createmulti => create_multi(records, common.strict, &mut out)?,
        Command::Decompose => {
            writeln!(out, "#CHROM\tPOS\tREF\tALT\tCIGAR\tEDITS")?;
            for result in records {
                let variant = match accept(result, common.strict)? {
                    Some(variant) => variant,
                    None => continue,
                };
                let decomposed = match decomposer.decompose_variant(&variant) {
                    Ok(decomposed) => decomposed,
                    Err(e) => {
                        skip(e, common.strict)?;
                        continue;
                    }
                };
                for (alt, alleles) in decomposed {
                    let cigar = if is_symbolic(&alt) {
                        ".".to_owned()
                    } else {
                        EditScript::from_variant_alleles(&alleles, true).to_compact(true)
                    };
                    let edits = alleles
                        .iter()
                        .filter(|a| !a.is_identity())
                        .map(|a| format!("{}:{}>{}", a.position, a.reference, a.alternate))
                        .join(",");
                    writeln!(
                        out,
                        "{}\t{}\t{}\t{}\t{}\t{}",
                        variant.chrom(),
                        variant.pos(),
                        variant.ref_allele(),
                        alt,
                        cigar,
                        if edits.is_empty() { "." } else { edits.as_str() }
                    )?;
                }
            }
        }
        Command::Classify => {
            let mut header = records.header().clone();
            for class in [
                AlleleClass::Snp,
                AlleleClass::Transition,
                AlleleClass::Transversion,
                AlleleClass::Insertion,
                AlleleClass::Deletion,
                AlleleClass::Mnp,
                AlleleClass::Complex,
            ] {
                header.add_info(HeaderInfo::new(
                    &class.to_string(),
                    InfoNumber::Count(0),
                    InfoType::Flag,
                    &format!("The record contains a {}", class.description()),
                ));
            }
            let header = Arc::new(header);
            writeln!(out, "{}", header.to_text())?;
            for result in records {
                if let Some(mut variant) = accept(result, common.strict)? {
                    variant.set_header(header.clone());
                    for class in variant.classify() {
                        variant.set_flag(&class.to_string());
                    }
                    writeln!(out, "{}", variant)?;
                }
            }
        }
        Command::Cleancomplex => {
            writeln!(out, "{}", records.header().to_text())?;
            for result in records {
                if let Some(mut variant) = accept(result, common.strict)? {
                    if let Err(e) = variant.clean_complex(&decomposer) {
                        skip(e, common.strict)?;
                    }
                    writeln!(out, "{}", variant)?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn open(input: &str) -> Result<Records> {
    if input == "-" {
        let (reader, _format) = niffler::get_reader(Box::new(io::stdin()))?;
        VcfRecords::new(BufReader::new(reader))
    } else {
        VcfRecords::from_path(input).with_context(|| format!("reading {}", input))
    }
}

/// Pass a record through, or skip it with a warning unless `strict`.
fn accept<T>(result: Result<T, Error>, strict: bool) -> Result<Option<T>> {
    match result {
        Ok(variant) => Ok(Some(variant)),
        Err(e) => skip(e, strict).map(|_| None),
    }
}

fn skip(error: Error, strict: bool) -> Result<()> {
    if strict {
        return Err(error.into());
    }
    warn!("skipping record: {}", error);
    Ok(())
}

fn normalize<W: Write>(
    records: Records,
    normalizer: &Normalizer,
    chunk_size: usize,
    strict: bool,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "{}", records.header().to_text())?;
    let (mut written, mut unchanged) = (0usize, 0usize);
    for chunk in &records.chunks(chunk_size) {
        let chunk = chunk.collect_vec();
        let normalized = chunk
            .into_par_iter()
            .map(|result| {
                result.map(|variant| {
                    let normalized = normalizer.normalize(&variant);
                    (variant, normalized)
                })
            })
            .collect::<Vec<_>>();
        for result in normalized {
            let (original, normalized) = match accept(result, strict)? {
                Some(pair) => pair,
                None => continue,
            };
            match normalized {
                Ok(variant) => writeln!(out, "{}", variant)?,
                Err(e) => {
                    if strict {
                        return Err(e.into());
                    }
                    warn!("writing record unchanged: {}", e);
                    writeln!(out, "{}", original)?;
                    unchanged += 1;
                }
            }
            written += 1;
        }
    }
    info!("wrote {} records, {} left unnormalized", written, unchanged);
    Ok(())
}

fn create_multi<W: Write>(records: Records, strict: bool, out: &mut W) -> Result<()> {
    writeln!(out, "{}", records.header().to_text())?;
    let mut group: Vec<Variant> = Vec::new();
    let flush = |group: &mut Vec<Variant>, out: &mut W| -> Result<()> {
        if group.is_empty() {
            return Ok(());
        }
        match merge_multiallelic(group) {
            Ok(merged) => writeln!(out, "{}", merged)?,
            Err(e) => {
                let first = &group[0];
                skip(Error::at_variant(first.chrom(), first.pos(), e), strict)?;
            }
        }
        group.clear();
        Ok(())
    };
    for result in records {
        let variant = match accept(result, strict)? {
            Some(variant) => variant,
            None => continue,
        };
        let same_site = group.first().map_or(false, |first| {
            first.chrom() == variant.chrom()
                && first.pos() == variant.pos()
                && first.ref_allele() == variant.ref_allele()
        });
        if !same_site {
            flush(&mut group, &mut *out)?;
        }
        group.push(variant);
    }
    flush(&mut group, out)
}

/// Whole contigs of a (optionally gzipped) FASTA file, keyed by record id.
fn read_fasta(path: &Path) -> Result<IndexMap<String, Vec<u8>>> {
    let (reader, _format) =
        niffler::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let contigs = fasta::Reader::new(reader)
        .records()
        .map(|record| -> Result<(String, Vec<u8>)> {
            let record = record.with_context(|| format!("parsing {}", path.display()))?;
            Ok((record.id().to_owned(), record.seq().to_vec()))
        })
        .collect::<Result<IndexMap<_, _>>>()?;
    debug!("loaded {} contigs from {}", contigs.len(), path.display());
    Ok(contigs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const VCF: &str = "##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chr1\t3\t.\tAAC\tAC\t.\t.\t.
chr1\t5\t.\tC\tG\t.\t.\t.
";

    fn records(text: &'static str) -> Records {
        let reader: Box<dyn Read> = Box::new(Cursor::new(text.as_bytes()));
        VcfRecords::new(BufReader::new(reader)).unwrap()
    }

    #[test]
    fn test_normalize_keeps_records_it_cannot_rewrite() {
        let mut contigs = IndexMap::new();
        contigs.insert("chr1".to_string(), b"AAAACGT".to_vec());
        let normalizer = Normalizer::default().with_reference(&contigs);

        let mut out = Vec::new();
        normalize(records(VCF), &normalizer, 10, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let data = text.lines().filter(|l| !l.starts_with('#')).collect_vec();
        assert_eq!(
            data,
            vec!["chr1\t3\t.\tAAC\tAC\t.\t.\t.", "chr1\t5\t.\tC\tG\t.\t.\t."]
        );

        let mut out = Vec::new();
        assert!(normalize(records(VCF), &normalizer, 10, true, &mut out).is_err());
    }

    #[test]
    fn test_read_fasta() {
        let dir = std::env::temp_dir().join(format!("vcfnorm-fasta-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ref.fa");
        std::fs::write(&path, ">chr1 first contig\nACGT\nAC\n>chr2\nTTTT\n").unwrap();
        let contigs = read_fasta(&path).unwrap();
        assert_eq!(contigs.keys().collect_vec(), vec!["chr1", "chr2"]);
        assert_eq!(contigs["chr1"], b"ACGTAC".to_vec());
        assert_eq!(contigs["chr2"], b"TTTT".to_vec());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
