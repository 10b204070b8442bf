use crate::domain::distribution::{Complexity, DistributionResult, FeePolicy};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// One input row: a project total and, optionally, its complexity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteRow {
    pub total_amount: Decimal,
    #[serde(default, deserialize_with = "complexity_or_default")]
    pub complexity: Complexity,
}

fn complexity_or_default<'de, D>(deserializer: D) -> std::result::Result<Complexity, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Complexity::default()),
        Some(value) => value.parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub total_amount: Decimal,
    pub complexity: String,
    pub platform_fee: Decimal,
    pub holdback_amount: Decimal,
    pub contractor_amount: Decimal,
}

impl Quote {
    pub fn new(row: &QuoteRow, split: &DistributionResult) -> Self {
        Self {
            total_amount: row.total_amount.normalize(),
            complexity: row.complexity.to_string(),
            platform_fee: split.platform_fee,
            holdback_amount: split.holdback_amount,
            contractor_amount: split.contractor_amount,
        }
    }
}

/// Reads quote requests from a CSV source.
///
/// Whitespace is trimmed and rows may omit the complexity column.
pub struct QuoteReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> QuoteReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a bad row yields an `Err` and the stream goes on.
    pub fn rows(self) -> impl Iterator<Item = Result<QuoteRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PaymentError::from))
    }
}

pub struct QuoteWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> QuoteWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, quote: &Quote) -> Result<()> {
        self.writer.serialize(quote)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Quotes every readable row of `source` into `sink`, returning how many rows
/// were written. Unreadable rows are logged and skipped.
pub fn quote_all<R: Read, W: Write>(policy: &FeePolicy, source: R, sink: W) -> Result<usize> {
    let mut writer = QuoteWriter::new(sink);
    let mut written = 0;
    for row in QuoteReader::new(source).rows() {
        match row {
            Ok(row) => {
                let split = policy.calculate(row.total_amount, row.complexity);
                writer.write(&Quote::new(&row, &split))?;
                written += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Error reading payment row"),
        }
    }
    writer.finish()?;
    Ok(written)
}
