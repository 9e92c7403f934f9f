use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::Error;
use crate::record::Variant;
use crate::types::Header;

/// Records of a VCF stream, after its header has been read.
///
/// Every data line yields its own `Result`; a malformed line is reported with
/// its 1-based line number and iteration carries on with the next one.
pub struct VcfRecords<R: BufRead> {
    header: Arc<Header>,
    line_buf: String,
    line_number: usize,
    inner: R,
}

impl<R: BufRead> VcfRecords<R> {
    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    /// The shared header handed to every parsed record.
    pub fn shared_header(&self) -> &Arc<Header> {
        &self.header
    }
}

impl VcfRecords<BufReader<Box<dyn Read>>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let (reader, format) = niffler::from_path(path)?;
        debug!("reading VCF with compression {:?}", format);
        Self::new(BufReader::new(reader))
    }
}

impl<R: BufRead> VcfRecords<R> {
    pub fn new(mut reader: R) -> anyhow::Result<Self> {
        let mut header = Header::new();
        let mut line = String::new();
        let mut line_number = 0;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                anyhow::bail!("VCF ended before the #CHROM header line");
            }
            line_number += 1;
            let text = crate::parser::strip_line_ending(&line);
            if text.starts_with("##") {
                header
                    .push_meta_line(text)
                    .map_err(|e| Error::at_line(line_number, e))?;
            } else if text.starts_with('#') {
                header
                    .set_columns(text)
                    .map_err(|e| Error::at_line(line_number, e))?;
                break;
            } else {
                anyhow::bail!("line {}: expected a header line, found `{}`", line_number, text);
            }
        }
        debug!(
            "read header with {} INFO keys and {} samples",
            header.info().len(),
            header.samples().len()
        );

        Ok(Self {
            header: Arc::new(header),
            line_buf: line,
            line_number,
            inner: reader,
        })
    }
}

impl<R: BufRead> Iterator for VcfRecords<R> {
    type Item = Result<Variant, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_buf.clear();
            match self.inner.read_line(&mut self.line_buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(Error::at_line(self.line_number + 1, e))),
            }
            self.line_number += 1;
            if crate::parser::strip_line_ending(&self.line_buf).is_empty() {
                continue;
            }
            return Some(
                Variant::parse(&self.line_buf, &self.header)
                    .map_err(|e| Error::at_line(self.line_number, e)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    const VCF: &str = "##fileformat=VCFv4.2
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1
1\t10\t.\tA\tT\t.\tPASS\tDP=3\tGT\t0/1
1\tx\t.\tA\tT\t.\tPASS\t.\tGT\t0/1

1\t30\t.\tC\tG,T\t.\t.\t.\tGT\t1/2
";

    #[test]
    fn test_bad_line_does_not_stop_iteration() {
        let records = VcfRecords::new(VCF.as_bytes()).unwrap();
        assert_eq!(records.header().samples(), &vec!["S1".to_string()]);
        let results = records.collect::<Vec<_>>();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().pos(), 10);
        match &results[1] {
            Err(Error::AtLine { line, .. }) => assert_eq!(*line, 5),
            other => panic!("expected a line error, got {:?}", other),
        }
        assert_eq!(results[2].as_ref().unwrap().alt_alleles().len(), 2);
    }

    #[test]
    fn test_bad_line_reports_chrom_and_pos() {
        let vcf = VCF.replace("DP=3", "DP=three");
        let results = VcfRecords::new(vcf.as_bytes()).unwrap().collect::<Vec<_>>();
        let message = results[0].as_ref().unwrap_err().to_string();
        assert!(message.starts_with("line 4: "), "{}", message);
        assert!(message.contains("1:10"), "{}", message);
        assert!(message.contains("DP"), "{}", message);
    }

    #[test]
    fn test_missing_column_line() {
        assert!(VcfRecords::new("##fileformat=VCFv4.2\n".as_bytes()).is_err());
        assert!(VcfRecords::new("1\t10\t.\tA\tT\t.\t.\t.\n".as_bytes()).is_err());
    }
}
