//! Record reader/writer sessions.
//!
//! A session analyzes its record schema once (and, for reading, resolves the
//! model creator once). Row conversion afterwards only reads that state, so a
//! session can be shared across threads.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::analyzer::{Analysis, AttributeAnalyzer, AttributeBinding};
use crate::converter::{ReadConverterRouter, WriteConverterRouter};
use crate::creator::{ResolvedCreator, resolve_creator};
use crate::handler::TypeHandlerRegistry;
use crate::schema::RecordSchema;
use crate::spec::{EnumDirection, MappingError, Result, SpecMappingOptions};
use crate::tabular::{RowSink, SpecCell, SpecRowScope};
use crate::value::{Scope, Value};

/// Summary of one [`RecordWriter::write_rows`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecWriteReport {
    /// Data rows written (header excluded).
    pub n_rows: usize,
    /// Cells left blank.
    pub n_cells_blank: usize,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecWriteReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Writer

/// Write session: records of type `R` into cell text.
pub struct RecordWriter<R> {
    schema: Arc<RecordSchema<R>>,
    bindings: Vec<AttributeBinding<R>>,
    router: WriteConverterRouter,
    if_needs_scope: bool,
}

impl<R> RecordWriter<R> {
    /// Analyze `schema` for writing.
    pub fn new(
        schema: Arc<RecordSchema<R>>,
        registry: &TypeHandlerRegistry,
        options: &SpecMappingOptions,
    ) -> Result<Self> {
        options.sequence_codec.validate()?;
        let analyzer = AttributeAnalyzer::new(registry, options);
        let bindings = analyzer.analyze_all(&schema, EnumDirection::Write)?;
        let if_needs_scope = bindings.iter().any(|b| b.analysis.uses_expression());
        Ok(Self {
            schema,
            bindings,
            router: WriteConverterRouter::new(options),
            if_needs_scope,
        })
    }

    /// Schema of this session.
    pub fn schema(&self) -> &RecordSchema<R> {
        &self.schema
    }

    /// Column headers in attribute order.
    pub fn headers(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|b| b.analysis.header.clone())
            .collect()
    }

    /// Per-attribute analyses in attribute order.
    pub fn analyses(&self) -> impl Iterator<Item = &Analysis> {
        self.bindings.iter().map(|b| &b.analysis)
    }

    fn extract(binding: &AttributeBinding<R>, record: &R) -> Result<Value> {
        match &binding.getter {
            Some(getter) => Ok(getter(record)),
            None => Err(MappingError::Invariant(format!(
                "write binding of `{}` has no getter",
                binding.analysis.descriptor.name
            ))),
        }
    }

    /// Convert one record into cells, in header order.
    pub fn convert_row(&self, record: &R) -> Result<Vec<SpecCell>> {
        let l_values = self
            .bindings
            .iter()
            .map(|binding| Self::extract(binding, record))
            .collect::<Result<Vec<_>>>()?;

        let scope: Scope = if self.if_needs_scope {
            self.bindings
                .iter()
                .zip(&l_values)
                .map(|(b, v)| (b.analysis.descriptor.name.clone(), v.clone()))
                .collect()
        } else {
            Scope::new()
        };

        let mut l_cells = Vec::with_capacity(self.bindings.len());
        for (binding, value) in self.bindings.iter().zip(&l_values) {
            let analysis = &binding.analysis;
            let text = self.router.convert(value, &scope, analysis)?;
            l_cells.push(SpecCell {
                attribute: analysis.descriptor.name.clone(),
                header: analysis.header.clone(),
                text,
            });
        }
        tracing::trace!(
            record_type = %self.schema.type_name(),
            n_cells = l_cells.len(),
            "converted record"
        );
        Ok(l_cells)
    }

    /// Write a header row and then one row per record into `sink`.
    pub fn write_rows<'a, I, S>(&self, records: I, sink: &mut S) -> Result<SpecWriteReport>
    where
        I: IntoIterator<Item = &'a R>,
        R: 'a,
        S: RowSink + ?Sized,
    {
        let mut report = SpecWriteReport::default();
        sink.write_header(&self.headers())
            .map_err(MappingError::Tabular)?;

        for record in records {
            let l_cells = self.convert_row(record)?;
            report.n_cells_blank += l_cells.iter().filter(|c| c.text.is_none()).count();
            sink.write_row(&l_cells).map_err(MappingError::Tabular)?;
            report.n_rows += 1;
        }

        for binding in &self.bindings {
            if binding.analysis.uses_handler() && binding.analysis.handler.is_none() {
                report.warn(format!(
                    "attribute `{}` has no type handler; its column was left blank",
                    binding.analysis.descriptor.name
                ));
            }
        }
        tracing::debug!(
            record_type = %self.schema.type_name(),
            n_rows = report.n_rows,
            n_cells_blank = report.n_cells_blank,
            "wrote records"
        );
        Ok(report)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Reader

/// Read session: cell text into records of type `R`.
pub struct RecordReader<R> {
    schema: Arc<RecordSchema<R>>,
    bindings: Vec<AttributeBinding<R>>,
    creator: ResolvedCreator<R>,
    router: ReadConverterRouter,
}

impl<R> RecordReader<R> {
    /// Analyze `schema` for reading and resolve its creator.
    ///
    /// Every attribute must either feed a creator parameter or have a setter.
    pub fn new(
        schema: Arc<RecordSchema<R>>,
        registry: &TypeHandlerRegistry,
        options: &SpecMappingOptions,
    ) -> Result<Self> {
        options.sequence_codec.validate()?;
        let analyzer = AttributeAnalyzer::new(registry, options);
        let bindings = analyzer.analyze_all(&schema, EnumDirection::Read)?;
        let creator = resolve_creator(&schema)?;

        for (n_idx, binding) in bindings.iter().enumerate() {
            if !creator.is_bound(n_idx) && !binding.has_setter() {
                return Err(MappingError::configuration(format!(
                    "Attribute `{}` of `{}` is neither a creator parameter nor assignable.",
                    binding.analysis.descriptor.name,
                    schema.type_name()
                )));
            }
        }

        Ok(Self {
            schema,
            bindings,
            creator,
            router: ReadConverterRouter::new(options),
        })
    }

    /// Schema of this session.
    pub fn schema(&self) -> &RecordSchema<R> {
        &self.schema
    }

    /// Resolved model creator.
    pub fn creator(&self) -> &ResolvedCreator<R> {
        &self.creator
    }

    /// Column headers in attribute order.
    pub fn headers(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|b| b.analysis.header.clone())
            .collect()
    }

    /// Per-attribute analyses in attribute order.
    pub fn analyses(&self) -> impl Iterator<Item = &Analysis> {
        self.bindings.iter().map(|b| &b.analysis)
    }

    /// Re-key a header-keyed row to attribute names.
    ///
    /// Columns matching no header are dropped; missing columns read as blank.
    pub fn scope_from_headers(&self, row: &SpecRowScope) -> SpecRowScope {
        let dict_by_header: BTreeMap<&str, &str> = self
            .bindings
            .iter()
            .map(|b| (b.analysis.header.as_str(), b.analysis.descriptor.name.as_str()))
            .collect();
        row.iter()
            .filter_map(|(header, text)| {
                dict_by_header
                    .get(header.as_str())
                    .map(|name| ((*name).to_string(), text.clone()))
            })
            .collect()
    }

    /// Convert one attribute-keyed row into a record.
    pub fn convert_row(&self, row: &SpecRowScope) -> Result<R> {
        let l_values = self
            .bindings
            .iter()
            .map(|binding| self.router.convert(row, &binding.analysis))
            .collect::<Result<Vec<_>>>()?;

        let mut record = self.creator.create(&l_values).map_err(|message| {
            MappingError::Conversion {
                attribute: self.creator.name().to_string(),
                type_name: self.schema.type_name().to_string(),
                raw: String::new(),
                message,
            }
        })?;

        for (n_idx, (binding, value)) in self.bindings.iter().zip(l_values).enumerate() {
            if self.creator.is_bound(n_idx) {
                continue;
            }
            let Some(setter) = &binding.setter else {
                continue;
            };
            let c_raw = row
                .get(&binding.analysis.descriptor.name)
                .cloned()
                .unwrap_or_default();
            setter(&mut record, value).map_err(|message| {
                MappingError::conversion(&binding.analysis.descriptor, c_raw, message)
            })?;
        }
        tracing::trace!(record_type = %self.schema.type_name(), "converted row");
        Ok(record)
    }

    /// Convert rows in parallel; results keep input order.
    pub fn convert_rows_par(&self, rows: &[SpecRowScope]) -> Vec<Result<R>>
    where
        R: Send,
    {
        rows.par_iter().map(|row| self.convert_row(row)).collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
