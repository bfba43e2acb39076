use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use eyre::Context;
use store_dao::{QueryGenerator, QueryKind};
use store_dao_schema::SchemaMetadata;
use tracing::info;

/// Print the SQL generated for an entity
#[derive(Parser, Debug)]
pub struct PrintQueries {
    /// Schema JSON, as written by `generate-schema`.
    #[arg(short, long, default_value = "store_dao/schema.json")]
    schema: PathBuf,

    /// The entity whose statements to print.
    #[arg(short, long)]
    entity: String,

    /// Field to filter by in the find-by-parameters query. May be repeated.
    #[arg(short, long = "filter", value_name = "FIELD")]
    filters: Vec<String>,
}

impl PrintQueries {
    pub fn run(&self) -> eyre::Result<()> {
        let schema = SchemaMetadata::load(&self.schema)
            .with_context(|| format!("Failed to load schema from {}", self.schema.display()))?;

        let generator = QueryGenerator::new(Arc::new(schema));

        for kind in QueryKind::ALL {
            let query = if kind == QueryKind::FindByParameters {
                generator.find_by_parameters_query(&self.entity, &self.filters)
            } else {
                generator.query_for(kind, &self.entity)
            }
            .with_context(|| format!("Failed to generate {kind} query"))?;

            info!("{kind}: {query}");
        }

        Ok(())
    }
}
