use std::fs;
use std::sync::Arc;

use itertools::Itertools;

use rust_vcfnorm::allele::{AlleleKind, DecomposeConfig};
use rust_vcfnorm::cigar::EditScript;
use rust_vcfnorm::record::Record;
use rust_vcfnorm::types::Header;
use rust_vcfnorm::{
    merge_multiallelic, split_multiallelic, Decomposer, Normalizer, Variant, VcfRecords,
};

const EXAMPLE: &str = "resources/example.vcf";

const SEQUENCES: [&str; 12] = [
    "A",
    "AC",
    "CAAAT",
    "CAAAAT",
    "GATTACA",
    "GACA",
    "ACGTACGT",
    "TTTTTTTT",
    "GCACACAT",
    "GCACAT",
    "ACGGTTCAGGA",
    "acgtN",
];

fn example_variants() -> Vec<Variant> {
    VcfRecords::from_path(EXAMPLE)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn parsed_lines_are_written_back_unchanged() {
    let text = fs::read_to_string(EXAMPLE).unwrap();
    let (header_lines, data_lines): (Vec<&str>, Vec<&str>) =
        text.lines().partition(|l| l.starts_with('#'));
    let header = Arc::new(Header::from_text(&header_lines.join("\n")).unwrap());
    assert_eq!(header.to_text(), header_lines.join("\n"));
    for line in data_lines {
        assert_eq!(Variant::parse(line, &header).unwrap().to_text(), line);
    }
}

#[test]
fn decomposition_reconstructs_both_alleles() {
    let decomposer = Decomposer::default();
    for (reference, alternate) in SEQUENCES.iter().cartesian_product(SEQUENCES.iter()) {
        let alleles = decomposer
            .decompose(reference.as_bytes(), alternate.as_bytes(), 1000)
            .unwrap()
            .collect_vec();
        assert_eq!(
            alleles.iter().map(|a| a.reference.as_str()).join(""),
            *reference
        );
        assert_eq!(
            alleles.iter().map(|a| a.alternate.as_str()).join(""),
            *alternate
        );
        let mut position = 1000;
        for allele in &alleles {
            assert_eq!(allele.position, position);
            position += allele.reference.len() as u64;
        }

        let script = EditScript::from_variant_alleles(&alleles, true);
        assert_eq!(script.reference_span(), reference.len() as u64);
        assert_eq!(script.alt_span(), alternate.len() as u64);
    }
}

#[test]
fn normalization_is_idempotent() {
    let normalizer = Normalizer::default();
    let header = Arc::new(Header::new());
    let mut variants = example_variants();
    for (reference, alternates) in [
        ("CAAAT", vec!["CAAAAT", "CAAT"]),
        ("GCACACAT", vec!["GCACAT"]),
        ("GCACAT", vec!["GCACACAT", "GCAGAT"]),
        ("TTTTTTTT", vec!["TTTTTT"]),
        ("ACGTACGT", vec!["ACGT", "ACGTTACGT"]),
        ("GATTACA", vec!["GACA", "GATCACA"]),
    ] {
        variants.push(Variant::new(header.clone(), "2", 10, reference, &alternates));
    }
    for variant in variants {
        let once = normalizer.normalize(&variant).unwrap();
        let twice = normalizer.normalize(&once).unwrap();
        assert_eq!(once, twice, "normalizing {} is not idempotent", variant);
    }
}

#[test]
fn backends_agree_on_normalized_records() {
    let local = Normalizer::default();
    let wavefront =
        Normalizer::new(Decomposer::new(DecomposeConfig::default().with_wavefront_threshold(1)));
    let header = Arc::new(Header::new());
    for (reference, alternates) in [
        ("CAAAT", vec!["CAAAAT", "CAAT"]),
        ("GCACACAT", vec!["GCACAT"]),
        ("TTTTTTTT", vec!["TTTTTT"]),
        ("GATTACA", vec!["GACA"]),
        ("ACGTACGT", vec!["ACGT"]),
    ] {
        let variant = Variant::new(header.clone(), "2", 10, reference, &alternates);
        assert_eq!(
            local.normalize(&variant).unwrap(),
            wavefront.normalize(&variant).unwrap(),
            "backends disagree on {}",
            variant
        );
    }
}

#[test]
fn insertion_is_anchored_at_the_start_of_the_run() {
    let decomposer = Decomposer::default();
    let edits = decomposer
        .decompose(b"CAAAT", b"CAAAAT", 100)
        .unwrap()
        .filter(|a| !a.is_identity())
        .collect_vec();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].kind(), AlleleKind::Insertion);
    assert_eq!((edits[0].position, edits[0].alternate.as_str()), (101, "A"));

    let variant = Variant::new(Arc::new(Header::new()), "1", 100, "CAAAT", &["CAAAAT"]);
    let normalized = Normalizer::default().normalize(&variant).unwrap();
    assert_eq!(normalized.pos(), 100);
    assert_eq!(normalized.ref_allele(), "C");
    assert_eq!(normalized.alt_alleles(), &["CA".to_string()]);
}

#[test]
fn deletion_scenario_keeps_flanks() {
    let alleles = Decomposer::default()
        .decompose(b"GATTACA", b"GACA", 50)
        .unwrap()
        .map(|a| (a.position, a.reference, a.alternate))
        .collect_vec();
    assert_eq!(
        alleles,
        vec![
            (50, "GA".to_string(), "GA".to_string()),
            (52, "TTA".to_string(), String::new()),
            (55, "CA".to_string(), "CA".to_string()),
        ]
    );
}

#[test]
fn merge_inverts_split() {
    for variant in example_variants() {
        let split = split_multiallelic(&variant);
        assert_eq!(split.len(), variant.alt_alleles().len().max(1));
        assert!(split.iter().all(|v| v.alt_alleles().len() <= 1));
        let merged = merge_multiallelic(&split).unwrap();
        assert_eq!(merged, variant);
    }
}

#[test]
fn split_marks_other_alleles_missing() {
    let variant = example_variants()
        .into_iter()
        .find(|v| v.pos() == 25)
        .unwrap();
    let split = split_multiallelic(&variant);
    assert_eq!(split[0].genotype("HG001").unwrap().to_string(), "1/.");
    assert_eq!(split[1].genotype("HG001").unwrap().to_string(), "./1");
    assert_eq!(split[0].sample_values("HG001", "AD").unwrap(), &["2", "5"]);
    assert_eq!(split[1].sample_values("HG001", "AD").unwrap(), &["2", "6"]);
    assert_eq!(split[1].genotype("HG003").unwrap().to_string(), "1/1");
}
