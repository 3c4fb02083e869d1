//! Full-text index over the descriptive columns of the asset registry.
//!
//! The index is built in memory from the registry frame and answers a query with
//! the set of matching asset ids, which the predicate layer turns into an id
//! membership filter. Every query term must match (in any indexed field).

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

pub use error::IndexError;
use error::Result;
use itertools::izip;
use polars::prelude::{DataFrame, DataType, LazyFrame, col};
use tantivy::{
    Index, IndexWriter, TantivyDocument,
    collector::DocSetCollector,
    query::QueryParser,
    schema::{
        FAST, Field, INDEXED, IndexRecordOption, STORED, Schema, SchemaBuilder, TextFieldIndexing,
        TextOptions, Value,
    },
};
use tracing::{debug, info, instrument, trace, warn};

use bikewatch_data::columns;

/// Smallest writer budget tantivy accepts for a single indexing thread.
pub const MIN_MEMORY_BUDGET: usize = 15_000_000;

/// How a dataset is laid out in a tantivy index.
pub trait IndexDefinition: std::fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Name of the `u64` field holding the row id.
    fn id_field(&self) -> &'static str;

    /// Columns selected from the source frame for indexing.
    fn columns_for_indexing(&self) -> Vec<&'static str>;

    /// Add one document per row of `data` to `writer`.
    fn index_data(&self, writer: &mut IndexWriter, data: DataFrame, schema: &Schema) -> Result<()>;

    /// Fields a query is matched against.
    fn default_query_fields(&self, schema: &Schema) -> Result<Vec<Field>>;
}

/// Asset registry layout: manufacturer name, frame model and description.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetIndexDef;

impl IndexDefinition for AssetIndexDef {
    fn name(&self) -> &'static str {
        "asset_search"
    }

    fn schema(&self) -> Schema {
        let mut schema_builder = SchemaBuilder::new();
        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer("default")
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        schema_builder.add_u64_field(columns::ID, STORED | INDEXED | FAST);
        for column in columns::TEXT_COLUMNS {
            schema_builder.add_text_field(column, text_options.clone());
        }
        schema_builder.build()
    }

    fn id_field(&self) -> &'static str {
        columns::ID
    }

    fn columns_for_indexing(&self) -> Vec<&'static str> {
        let mut selected = vec![columns::ID];
        selected.extend(columns::TEXT_COLUMNS);
        selected
    }

    fn index_data(&self, writer: &mut IndexWriter, df: DataFrame, schema: &Schema) -> Result<()> {
        let id_series = df.column(columns::ID)?.cast(&DataType::UInt64)?;
        let id_series = id_series.u64()?;
        let manufacturer_series = df.column(columns::MANUFACTURER_NAME)?.str()?;
        let model_series = df.column(columns::FRAME_MODEL)?.str()?;
        let description_series = df.column(columns::DESCRIPTION)?.str()?;

        let f_id = schema.get_field(columns::ID)?;
        let f_manufacturer = schema.get_field(columns::MANUFACTURER_NAME)?;
        let f_model = schema.get_field(columns::FRAME_MODEL)?;
        let f_description = schema.get_field(columns::DESCRIPTION)?;

        for (id, manufacturer, model, description) in izip!(
            id_series,
            manufacturer_series,
            model_series,
            description_series
        ) {
            let Some(id) = id else { continue };
            let mut doc = TantivyDocument::default();
            doc.add_u64(f_id, id);
            if let Some(val) = manufacturer {
                doc.add_text(f_manufacturer, val);
            }
            if let Some(val) = model {
                doc.add_text(f_model, val);
            }
            if let Some(val) = description {
                doc.add_text(f_description, val);
            }
            writer.add_document(doc)?;
        }
        Ok(())
    }

    fn default_query_fields(&self, schema: &Schema) -> Result<Vec<Field>> {
        Ok(columns::TEXT_COLUMNS
            .iter()
            .map(|column| schema.get_field(column))
            .collect::<tantivy::Result<Vec<_>>>()?)
    }
}

/// In-memory full-text index answering queries with id sets.
#[derive(Debug, Clone)]
pub struct FTSIndex<D: IndexDefinition> {
    index: Index,
    definition: D,
    /// Non-blank queries answered, shared between clones.
    queries: Arc<AtomicU64>,
}

impl<D: IndexDefinition> FTSIndex<D> {
    #[instrument(name = "Create Index", skip(definition, data), fields(index_name = definition.name()))]
    pub fn new(definition: D, data: LazyFrame, memory_budget: usize) -> Result<Self> {
        let schema = definition.schema();
        let index = Index::create_in_ram(schema.clone());

        let data_for_indexing = data
            .select(
                definition
                    .columns_for_indexing()
                    .into_iter()
                    .map(col)
                    .collect::<Vec<_>>(),
            )
            .collect()?;

        if data_for_indexing.is_empty() {
            warn!(
                index = definition.name(),
                "No data to index. Index will be empty."
            );
        } else {
            info!(
                index = definition.name(),
                num_rows = data_for_indexing.height(),
                "Populating index"
            );
            let mut index_writer: IndexWriter =
                index.writer_with_num_threads(1, memory_budget.max(MIN_MEMORY_BUDGET))?;
            definition.index_data(&mut index_writer, data_for_indexing, &schema)?;
            index_writer.commit()?;
            info!(index = definition.name(), "Index creation complete");
        }

        Ok(Self {
            index,
            definition,
            queries: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn num_docs(&self) -> Result<u64> {
        Ok(self.index.reader()?.searcher().num_docs())
    }

    #[must_use]
    pub fn queries_served(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Ids of every document matching all terms of `query_str`. Syntax errors
    /// are tolerated; a blank query matches nothing.
    #[instrument(name = "Search Text Index", skip(self), level = "debug", fields(index_name = self.definition.name()))]
    pub fn matching_ids(&self, query_str: &str) -> Result<Vec<u64>> {
        let query_str = query_str.trim();
        if query_str.is_empty() {
            return Ok(Vec::new());
        }
        self.queries.fetch_add(1, Ordering::Relaxed);

        let schema = self.index.schema();
        let id_field = schema.get_field(self.definition.id_field())?;

        let mut query_parser =
            QueryParser::for_index(&self.index, self.definition.default_query_fields(&schema)?);
        query_parser.set_conjunction_by_default();
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if errors.is_empty() {
            trace!(?query, "Query parsed");
        } else {
            warn!(?errors, "Query parsing errors occurred");
        }

        let searcher = self.index.reader()?.searcher();
        let doc_addresses = searcher.search(&*query, &DocSetCollector)?;

        let ids = doc_addresses
            .into_iter()
            .map(|doc_address| -> Result<u64> {
                let doc = searcher.doc::<TantivyDocument>(doc_address)?;
                let id = doc
                    .get_first(id_field)
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| anyhow::anyhow!("Document without an id: {doc:?}"))?;
                Ok(id)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(num_results = ids.len(), "Text index search complete");
        Ok(ids)
    }
}

/// The index every [`crate::BikeSearcher`] builds over its registry.
pub type AssetIndex = FTSIndex<AssetIndexDef>;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("DataFrame error: {0}")]
        DataFrame(#[from] polars::prelude::PolarsError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }
    pub type Result<T> = std::result::Result<T, IndexError>;
}
