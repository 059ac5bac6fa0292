//! Precalculated, parameterised event responses
//!
//! Re-building splines for every event is expensive when the same sample is
//! re-weighted many times. Instead, the responses of each splineable parameter
//! can be compressed once into the coefficients of a [PolyResponse] and stored
//! in a table with one row per event unit:
//!
//! ```text
//! nids, id_1, ..., id_n, c_1_0, ..., c_1_order, ..., c_n_0, ..., c_n_order
//! ```

use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::error::SystToolsError;
use crate::header::ParamId;
use crate::interpreter::poly::PolyResponse;
use crate::interpreter::HeaderMap;
use crate::response::{scrub_unity_event_unit_response, EventUnitResponse};

/// The parameterised response of one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamPolyResponses {
    pub pid: ParamId,
    pub resp: PolyResponse,
}

/// Fits and writes event unit responses, one row per call to
/// [PrecalculatedResponseWriter::add_event_responses]
pub struct PrecalculatedResponseWriter<W: io::Write> {
    writer: csv::Writer<W>,
    headers: HeaderMap,
    order: usize,
}

impl PrecalculatedResponseWriter<std::fs::File> {
    pub fn to_path(
        path: impl AsRef<Path>,
        headers: HeaderMap,
        order: usize,
    ) -> Result<Self, SystToolsError> {
        let writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        Ok(Self {
            writer,
            headers,
            order,
        })
    }
}

impl<W: io::Write> PrecalculatedResponseWriter<W> {
    pub fn new(writer: W, headers: HeaderMap, order: usize) -> Self {
        Self {
            writer: WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(writer),
            headers,
            order,
        }
    }

    /// Fit and write the responses of one event unit
    ///
    /// Entries that are entirely unity are dropped first. Every remaining
    /// entry must belong to a known parameter; entries of non-splineable
    /// parameters are skipped.
    pub fn add_event_responses(&mut self, mut unit: EventUnitResponse) -> Result<(), SystToolsError> {
        scrub_unity_event_unit_response(&mut unit);

        let mut ids = Vec::with_capacity(unit.len());
        let mut coefficients = Vec::with_capacity(unit.len() * (self.order + 1));
        for resp in &unit {
            let hdr = match self.headers.get(&resp.pid) {
                Some(ph) => &ph.header,
                None => return Err(SystToolsError::ParameterIdNotHandled(resp.pid)),
            };
            if !hdr.is_splineable {
                tracing::debug!(
                    "Not precalculating responses of non-splineable parameter {}",
                    hdr.pretty_name
                );
                continue;
            }
            let n = resp.responses.len().min(hdr.n_variations());
            let poly = PolyResponse::fit(&hdr.param_variations[..n], &resp.responses[..n], self.order)?;
            ids.push(resp.pid);
            coefficients.extend_from_slice(poly.coefficients());
        }

        let mut record = Vec::with_capacity(1 + ids.len() + coefficients.len());
        record.push(ids.len().to_string());
        record.extend(ids.iter().map(|id| id.to_string()));
        record.extend(coefficients.iter().map(|c| c.to_string()));
        self.writer.write_record(&record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SystToolsError> {
        self.writer
            .flush()
            .map_err(|e| SystToolsError::Csv(e.to_string()))
    }

    pub fn into_inner(self) -> Result<W, SystToolsError> {
        self.writer
            .into_inner()
            .map_err(|e| SystToolsError::Csv(e.to_string()))
    }
}

/// Reads a table written by [PrecalculatedResponseWriter]
#[derive(Debug, Clone)]
pub struct PrecalculatedResponseReader {
    order: usize,
    rows: Vec<Vec<ParamPolyResponses>>,
}

fn parse_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    row: usize,
) -> Result<T, SystToolsError> {
    let field = record.get(idx).ok_or_else(|| {
        SystToolsError::Csv(format!("row {} is missing field {}", row, idx))
    })?;
    field.trim().parse::<T>().map_err(|_| {
        SystToolsError::Csv(format!(
            "row {}: failed to parse field {} (\"{}\")",
            row, idx, field
        ))
    })
}

impl PrecalculatedResponseReader {
    pub fn from_path(path: impl AsRef<Path>, order: usize) -> Result<Self, SystToolsError> {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;
        Self::read(reader, order)
    }

    pub fn from_reader<R: io::Read>(reader: R, order: usize) -> Result<Self, SystToolsError> {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        Self::read(reader, order)
    }

    fn read<R: io::Read>(mut reader: csv::Reader<R>, order: usize) -> Result<Self, SystToolsError> {
        let n_coeffs = order + 1;
        let mut rows = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let nids: usize = parse_field(&record, 0, row)?;
            let expected = nids
                .checked_mul(1 + n_coeffs)
                .and_then(|n| n.checked_add(1))
                .ok_or_else(|| {
                    SystToolsError::Csv(format!("row {} declares {} parameters", row, nids))
                })?;
            if record.len() != expected {
                return Err(SystToolsError::Csv(format!(
                    "row {} has {} fields, expected {} for {} parameters of order {}",
                    row,
                    record.len(),
                    expected,
                    nids,
                    order
                )));
            }
            let mut responses = Vec::with_capacity(nids);
            for p in 0..nids {
                let pid: ParamId = parse_field(&record, 1 + p, row)?;
                let start = 1 + nids + p * n_coeffs;
                let coefficients = (start..start + n_coeffs)
                    .map(|idx| parse_field::<f64>(&record, idx, row))
                    .collect::<Result<Vec<_>, _>>()?;
                responses.push(ParamPolyResponses {
                    pid,
                    resp: PolyResponse::new(coefficients),
                });
            }
            rows.push(responses);
        }
        Ok(Self { order, rows })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn entries(&self) -> usize {
        self.rows.len()
    }

    /// The parameterised responses of entry `entry`
    pub fn event_response(&self, entry: usize) -> Result<&[ParamPolyResponses], SystToolsError> {
        self.rows
            .get(entry)
            .map(Vec::as_slice)
            .ok_or(SystToolsError::EntryOverflow {
                entry,
                entries: self.rows.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ParamHeader;
    use crate::interpreter::ProviderHeader;
    use crate::response::ParamResponses;
    use approx::assert_relative_eq;

    fn headers() -> HeaderMap {
        let spline = ParamHeader {
            is_splineable: true,
            param_variations: vec![-1.0, 0.0, 1.0],
            ..ParamHeader::new("xsec", 0)
        };
        let multisim = ParamHeader {
            is_randomly_thrown: true,
            param_variations: vec![0.3, 0.7],
            ..ParamHeader::new("flux", 1)
        };
        [spline, multisim]
            .into_iter()
            .map(|header| {
                (
                    header.syst_param_id.unwrap(),
                    ProviderHeader {
                        provider_name: "test".to_string(),
                        header,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_write_then_read() {
        let mut writer = PrecalculatedResponseWriter::new(Vec::new(), headers(), 2);
        writer
            .add_event_responses(vec![
                ParamResponses::new(0, vec![0.5, 1.0, 2.0]),
                ParamResponses::new(1, vec![0.9, 1.1]),
            ])
            .unwrap();
        writer
            .add_event_responses(vec![ParamResponses::new(0, vec![1.0, 1.0, 1.0])])
            .unwrap();
        let bytes = writer.into_inner().unwrap();

        let reader = PrecalculatedResponseReader::from_reader(bytes.as_slice(), 2).unwrap();
        assert_eq!(reader.entries(), 2);

        let first = reader.event_response(0).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].pid, 0);
        assert_relative_eq!(first[0].resp.eval(-1.0), 0.5, epsilon = 1e-9);
        assert_relative_eq!(first[0].resp.eval(1.0), 2.0, epsilon = 1e-9);

        // Unity responses are scrubbed
        assert!(reader.event_response(1).unwrap().is_empty());

        assert!(matches!(
            reader.event_response(2),
            Err(SystToolsError::EntryOverflow { entry: 2, entries: 2 })
        ));
    }

    #[test]
    fn test_unknown_parameter() {
        let mut writer = PrecalculatedResponseWriter::new(Vec::new(), headers(), 1);
        assert!(matches!(
            writer.add_event_responses(vec![ParamResponses::new(9, vec![0.5])]),
            Err(SystToolsError::ParameterIdNotHandled(9))
        ));
    }

    #[test]
    fn test_malformed_row() {
        let data = "1,0,1.0\n";
        assert!(matches!(
            PrecalculatedResponseReader::from_reader(data.as_bytes(), 2),
            Err(SystToolsError::Csv(_))
        ));
    }

    #[test]
    fn test_corrupt_parameter_count() {
        let data = format!("{},0,1.0\n", usize::MAX);
        assert!(matches!(
            PrecalculatedResponseReader::from_reader(data.as_bytes(), 2),
            Err(SystToolsError::Csv(_))
        ));
    }
}
