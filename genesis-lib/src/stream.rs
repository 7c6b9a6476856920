use crate::{Error, Section};
use serde::de::{self, DeserializeOwned, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserializer;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use std::ops::ControlFlow;
use std::path::Path;

const STOPPED: &str = "extraction stopped by the record consumer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extraction {
    /// Number of records handed to the consumer
    pub records: usize,
    /// Whether the section path exists in the document at all
    pub section_found: bool,
}

/// Incremental reader over a genesis export.
///
/// Only the records of the requested section are decoded, one at a time;
/// everything else in the document is skipped without being buffered, so
/// exports much larger than the available memory can be processed.
/// Streaming consumes the reader: a section can be read only once.
pub struct GenesisReader<R> {
    reader: R,
}

impl GenesisReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> GenesisReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Same as [`GenesisReader::stream_section`], addressing the section by
    /// its key (e.g. `staked_amounts`). Unknown keys fail before anything is read.
    pub fn stream_named_section<T, F>(self, key: &str, consumer: F) -> Result<Extraction, Error>
    where
        T: DeserializeOwned + fmt::Debug,
        F: FnMut(usize, T) -> ControlFlow<()>,
    {
        let section = key.parse::<Section>()?;
        self.stream_section(section, consumer)
    }

    /// Feed every record of `section` to `consumer` together with its index,
    /// in document order. The consumer can stop the extraction early by
    /// returning [`ControlFlow::Break`].
    pub fn stream_section<T, F>(self, section: Section, consumer: F) -> Result<Extraction, Error>
    where
        T: DeserializeOwned + fmt::Debug,
        F: FnMut(usize, T) -> ControlFlow<()>,
    {
        let mut sink = Sink {
            consumer,
            records: 0,
            found: false,
            stopped: false,
            _record: PhantomData,
        };
        let mut deserializer = serde_json::Deserializer::from_reader(self.reader);
        let seed = PathSeed {
            path: section.path(),
            sink: &mut sink,
        };

        match seed.deserialize(&mut deserializer) {
            Ok(()) => deserializer
                .end()
                .map_err(|source| Error::Json { section, source })?,
            Err(_) if sink.stopped => {}
            // a data error once inside the array means the record itself did
            // not match the expected shape
            Err(source) if sink.found && source.is_data() => {
                return Err(Error::MalformedRecord {
                    section,
                    index: sink.records,
                    source,
                })
            }
            Err(source) => return Err(Error::Json { section, source }),
        }

        if !sink.found {
            tracing::warn!(%section, "section not found in genesis export");
        }
        tracing::debug!(%section, records = sink.records, "section streamed");

        Ok(Extraction {
            records: sink.records,
            section_found: sink.found,
        })
    }
}

struct Sink<T, F> {
    consumer: F,
    records: usize,
    found: bool,
    stopped: bool,
    _record: PhantomData<fn() -> T>,
}

/// Walks down `path`, one object key per level, and streams the array found
/// at its end. A `null` anywhere along the way counts as a missing section.
struct PathSeed<'a, T, F> {
    path: &'static [&'static str],
    sink: &'a mut Sink<T, F>,
}

impl<'de, 'a, T, F> DeserializeSeed<'de> for PathSeed<'a, T, F>
where
    T: DeserializeOwned + fmt::Debug,
    F: FnMut(usize, T) -> ControlFlow<()>,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.path.split_first() {
            Some((&field, rest)) => deserializer.deserialize_option(FieldVisitor {
                field,
                rest,
                sink: self.sink,
            }),
            None => deserializer.deserialize_option(RecordsVisitor { sink: self.sink }),
        }
    }
}

struct FieldVisitor<'a, T, F> {
    field: &'static str,
    rest: &'static [&'static str],
    sink: &'a mut Sink<T, F>,
}

impl<'de, 'a, T, F> Visitor<'de> for FieldVisitor<'a, T, F>
where
    T: DeserializeOwned + fmt::Debug,
    F: FnMut(usize, T) -> ControlFlow<()>,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "an object with a `{}` field", self.field)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(())
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let FieldVisitor { field, rest, sink } = self;
        while let Some(key) = map.next_key::<String>()? {
            if key == field {
                map.next_value_seed(PathSeed {
                    path: rest,
                    sink: &mut *sink,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct RecordsVisitor<'a, T, F> {
    sink: &'a mut Sink<T, F>,
}

impl<'de, 'a, T, F> Visitor<'de> for RecordsVisitor<'a, T, F>
where
    T: DeserializeOwned + fmt::Debug,
    F: FnMut(usize, T) -> ControlFlow<()>,
{
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of records")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(())
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let sink = self.sink;
        sink.found = true;
        while let Some(record) = seq.next_element::<T>()? {
            let index = sink.records;
            sink.records += 1;
            tracing::trace!(index, ?record, "streamed record");
            if (sink.consumer)(index, record).is_break() {
                sink.stopped = true;
                return Err(de::Error::custom(STOPPED));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::genesis_export;
    use crate::DelegationRecord;
    use rust_decimal_macros::dec;
    use serde_json::Value;
    use test_strategy::proptest;

    const EXPORT: &str = r#"{
        "genesis_time": "2022-08-29T00:00:00Z",
        "app_state": {
            "bank": {
                "balances": [
                    {"address": "canto1a", "coins": [{"denom": "acanto", "amount": "5"}]},
                    {"address": "canto1b", "coins": []}
                ],
                "supply": [{"denom": "acanto", "amount": "1000000000000000000000000000"}]
            },
            "staking": {
                "params": {"bond_denom": "acanto", "max_validators": 100},
                "validators": [{"operator_address": "cantovaloper1v", "jailed": false}],
                "delegations": [
                    {"delegator_address": "canto1a", "validator_address": "cantovaloper1v", "shares": "10.000000000000000000"},
                    {"delegator_address": "canto1b", "validator_address": "cantovaloper1w", "shares": "20.000000000000000000"},
                    {"delegator_address": "canto1c", "validator_address": "cantovaloper1v", "shares": "30.000000000000000000"}
                ]
            }
        },
        "chain_id": "canto_7700-1"
    }"#;

    fn collect<T: DeserializeOwned + fmt::Debug>(
        export: &str,
        section: Section,
    ) -> (Extraction, Vec<(usize, T)>) {
        let mut records = Vec::new();
        let extraction = GenesisReader::new(export.as_bytes())
            .stream_section(section, |index, record: T| {
                records.push((index, record));
                ControlFlow::Continue(())
            })
            .unwrap();
        (extraction, records)
    }

    #[test]
    fn streams_delegations_in_document_order() {
        let (extraction, records) = collect::<DelegationRecord>(EXPORT, Section::StakedAmounts);
        assert_eq!(
            extraction,
            Extraction {
                records: 3,
                section_found: true
            }
        );
        let summary = records
            .iter()
            .map(|(i, r)| (*i, r.delegator_address.as_str(), r.shares))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (0, "canto1a", dec!(10)),
                (1, "canto1b", dec!(20)),
                (2, "canto1c", dec!(30))
            ]
        );
    }

    #[test]
    fn streams_reserved_sections_as_values() {
        let (_, balances) = collect::<Value>(EXPORT, Section::AccountBalances);
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[1].1["address"], "canto1b");

        let (_, supply) = collect::<Value>(EXPORT, Section::TotalSupply);
        assert_eq!(supply.len(), 1);
        assert_eq!(supply[0].1["amount"], "1000000000000000000000000000");

        let (_, validators) = collect::<Value>(EXPORT, Section::ValidatorsInfo);
        assert_eq!(validators[0].1["operator_address"], "cantovaloper1v");
    }

    #[test]
    fn unknown_section_yields_no_records() {
        let mut calls = 0;
        let result = GenesisReader::new(EXPORT.as_bytes()).stream_named_section(
            "staked_amount",
            |_, _: Value| {
                calls += 1;
                ControlFlow::Continue(())
            },
        );
        assert!(matches!(result, Err(Error::UnknownSection(key)) if key == "staked_amount"));
        assert_eq!(calls, 0);
    }

    #[test]
    fn missing_section_is_empty() {
        let (extraction, records) =
            collect::<Value>(r#"{"app_state": {"staking": {}}}"#, Section::StakedAmounts);
        assert_eq!(extraction.records, 0);
        assert!(!extraction.section_found);
        assert!(records.is_empty());
    }

    #[test]
    fn null_along_the_path_is_a_missing_section() {
        for export in [
            r#"{"app_state": {"staking": null, "bank": {"supply": []}}}"#,
            r#"{"app_state": {"staking": {"delegations": null}}}"#,
            r#"null"#,
        ] {
            let (extraction, records) = collect::<Value>(export, Section::StakedAmounts);
            assert!(!extraction.section_found, "{}", export);
            assert!(records.is_empty());
        }
    }

    #[test]
    fn malformed_record_reports_its_index() {
        let export = r#"{"app_state": {"staking": {"delegations": [
            {"delegator_address": "canto1a", "validator_address": "cantovaloper1v", "shares": "1"},
            {"delegator_address": "canto1b", "validator_address": "cantovaloper1v"}
        ]}}}"#;
        let result = GenesisReader::new(export.as_bytes()).stream_section(
            Section::StakedAmounts,
            |_, _: DelegationRecord| ControlFlow::Continue(()),
        );
        assert!(matches!(
            result,
            Err(Error::MalformedRecord { index: 1, .. })
        ));
    }

    #[test]
    fn section_of_the_wrong_type_is_an_error() {
        let result = GenesisReader::new(r#"{"app_state": {"staking": {"delegations": {}}}}"#.as_bytes())
            .stream_section(Section::StakedAmounts, |_, _: Value| ControlFlow::Continue(()));
        assert!(matches!(result, Err(Error::Json { .. })));
    }

    #[test]
    fn truncated_document_is_an_error() {
        let truncated = &EXPORT[..EXPORT.len() / 2];
        let result = GenesisReader::new(truncated.as_bytes())
            .stream_section(Section::StakedAmounts, |_, _: Value| ControlFlow::Continue(()));
        assert!(result.is_err());
    }

    #[test]
    fn consumer_can_stop_early() {
        let mut seen = Vec::new();
        let extraction = GenesisReader::new(EXPORT.as_bytes())
            .stream_section(Section::StakedAmounts, |index, _: Value| {
                seen.push(index);
                if index == 1 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(extraction.records, 2);
    }

    #[proptest]
    fn every_delegation_is_streamed(delegations: Vec<DelegationRecord>) {
        let export = genesis_export(&delegations);
        let (extraction, records) = collect::<DelegationRecord>(&export, Section::StakedAmounts);
        assert_eq!(extraction.records, delegations.len());
        assert!(records.iter().enumerate().all(|(i, (index, _))| i == *index));
        assert_eq!(
            records.into_iter().map(|(_, r)| r).collect::<Vec<_>>(),
            delegations
        );
    }
}
