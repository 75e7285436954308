use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::DescriptorStore;
use crate::domain::{
    AccessRule, DomainError, HardFilters, PolicyLanguage, SensitivityClass, SourceDescriptor,
};

const DESCRIPTOR_COLUMNS: &str = "urn, display_name, description, endpoint, geography, \
    sensitivity_class, owner_group, rule_language, rule_text, attributes, acls, \
    CAST(embedding AS VARCHAR)";

/// DuckDB-backed descriptor store. One row per urn; the embedding lives in a
/// fixed-width `FLOAT[n]` column sized when the database is created.
pub struct DuckdbDescriptorStore {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
}

impl DuckdbDescriptorStore {
    pub fn new(path: &Path, dimensions: usize) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize(&conn, dimensions)?;
        info!("Opened descriptor store at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    pub fn in_memory(dimensions: usize) -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize(&conn, dimensions)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn initialize(conn: &Connection, dimensions: usize) -> Result<(), DomainError> {
        if dimensions == 0 {
            return Err(DomainError::invalid_input(
                "Embedding dimensions must be positive",
            ));
        }

        let create_tables = format!(
            "\
            CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sources (
                urn TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                description TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                geography TEXT NOT NULL,
                sensitivity_class TEXT NOT NULL,
                owner_group TEXT NOT NULL,
                rule_language TEXT NOT NULL,
                rule_text TEXT NOT NULL,
                attributes TEXT NOT NULL,
                acls TEXT NOT NULL,
                embedding FLOAT[{}] NOT NULL,
                updated_at BIGINT NOT NULL
            );
            ",
            dimensions
        );
        conn.execute_batch(&create_tables).map_err(|e| {
            DomainError::storage(format!("Failed to initialize DuckDB tables: {}", e))
        })?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .ok();

        match stored {
            Some(value) if value != dimensions.to_string() => {
                return Err(DomainError::storage(format!(
                    "Descriptor store was created with {} dimensions, embedding model produces {}",
                    value, dimensions
                )));
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO store_meta (key, value) VALUES ('dimensions', ?)",
                    params![dimensions.to_string()],
                )
                .map_err(|e| {
                    DomainError::storage(format!("Failed to record store dimensions: {}", e))
                })?;
            }
        }

        debug!("Descriptor tables ready ({} dimensions)", dimensions);
        Ok(())
    }

    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            if !v.is_finite() {
                return Err(DomainError::invalid_input("Embedding contains non-finite values"));
            }
            s.push_str(&format!("{}", v));
        }
        s.push(']');
        s.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(s)
    }

    fn where_clause(filters: &HardFilters) -> String {
        let mut clauses: Vec<String> = Vec::new();
        if let Some(geography) = filters.geography() {
            clauses.push(format!("geography = {}", quote(geography)));
        }
        if let Some(owner) = filters.owner_group() {
            clauses.push(format!("owner_group = {}", quote(owner)));
        }
        if filters.sensitivity_classes().is_some()
            || !filters.excluded_sensitivity_classes().is_empty()
        {
            let permitted = filters.permitted_sensitivity_classes();
            if permitted.is_empty() {
                clauses.push("FALSE".to_string());
            } else {
                let quoted = permitted
                    .iter()
                    .map(|c| quote(c.as_str()))
                    .collect::<Vec<_>>()
                    .join(",");
                clauses.push(format!("sensitivity_class IN ({})", quoted));
            }
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn read_descriptor(row: &Row<'_>) -> Result<SourceDescriptor, DomainError> {
    let column = |index: usize, name: &str| -> Result<String, DomainError> {
        row.get::<_, String>(index)
            .map_err(|e| DomainError::storage(format!("Failed to read {}: {}", name, e)))
    };

    let sensitivity: SensitivityClass = column(5, "sensitivity_class")?
        .parse()
        .map_err(|e: DomainError| DomainError::storage(e.to_string()))?;
    let language = match column(7, "rule_language")?.as_str() {
        "attribute" => PolicyLanguage::Attribute,
        _ => PolicyLanguage::Rego,
    };
    let attributes: BTreeMap<String, Value> = serde_json::from_str(&column(9, "attributes")?)
        .map_err(|e| DomainError::storage(format!("Corrupt attributes column: {}", e)))?;
    let acls: Vec<String> = serde_json::from_str(&column(10, "acls")?)
        .map_err(|e| DomainError::storage(format!("Corrupt acls column: {}", e)))?;
    let embedding: Vec<f32> = serde_json::from_str(&column(11, "embedding")?)
        .map_err(|e| DomainError::storage(format!("Corrupt embedding column: {}", e)))?;

    let mut descriptor = SourceDescriptor::new(
        column(0, "urn")?,
        column(1, "display_name")?,
        column(2, "description")?,
        column(3, "endpoint")?,
        column(4, "geography")?,
        sensitivity,
        column(6, "owner_group")?,
        AccessRule::new(language, column(8, "rule_text")?),
    )
    .with_acls(acls)
    .with_embedding(embedding);
    for (key, value) in attributes {
        descriptor = descriptor.with_attribute(key, value);
    }
    Ok(descriptor)
}

#[async_trait]
impl DescriptorStore for DuckdbDescriptorStore {
    async fn upsert(&self, descriptor: &SourceDescriptor) -> Result<(), DomainError> {
        let array_lit = self.vector_to_array_literal(descriptor.embedding())?;
        let attributes = serde_json::to_string(descriptor.attributes())
            .map_err(|e| DomainError::internal(format!("Failed to encode attributes: {}", e)))?;
        let acls = serde_json::to_string(descriptor.acls())
            .map_err(|e| DomainError::internal(format!("Failed to encode acls: {}", e)))?;

        // FLOAT[n] values cannot be bound as parameters, so the vector is inlined.
        let sql = format!(
            "INSERT OR REPLACE INTO sources \
            (urn, display_name, description, endpoint, geography, sensitivity_class, owner_group, \
            rule_language, rule_text, attributes, acls, embedding, updated_at) \
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {}, ?)",
            array_lit
        );

        let conn = self.conn.lock().await;
        conn.execute(
            &sql,
            params![
                descriptor.urn(),
                descriptor.display_name(),
                descriptor.description(),
                descriptor.endpoint(),
                descriptor.geography(),
                descriptor.sensitivity_class().as_str(),
                descriptor.owner_group(),
                descriptor.access_rule().language().as_str(),
                descriptor.access_rule().text(),
                attributes,
                acls,
                chrono::Utc::now().timestamp(),
            ],
        )
        .map_err(|e| {
            DomainError::storage(format!("Failed to upsert source {}: {}", descriptor.urn(), e))
        })?;

        debug!("Upserted source {} into DuckDB", descriptor.urn());
        Ok(())
    }

    async fn delete(&self, urn: &str) -> Result<bool, DomainError> {
        let conn = self.conn.lock().await;
        let deleted = conn
            .execute("DELETE FROM sources WHERE urn = ?", params![urn])
            .map_err(|e| DomainError::storage(format!("Failed to delete source: {}", e)))?;
        Ok(deleted > 0)
    }

    async fn get(&self, urn: &str) -> Result<Option<SourceDescriptor>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sources WHERE urn = ?",
                DESCRIPTOR_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare lookup: {}", e)))?;
        let mut rows = stmt
            .query(params![urn])
            .map_err(|e| DomainError::storage(format!("Failed to look up source: {}", e)))?;

        match rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            Some(row) => Ok(Some(read_descriptor(row)?)),
            None => Ok(None),
        }
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filters: &HardFilters,
        limit: usize,
    ) -> Result<Vec<(SourceDescriptor, f32)>, DomainError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let array_lit = self.vector_to_array_literal(query_vector)?;
        let sql = format!(
            "SELECT {columns}, \
                CAST(1.0 - array_cosine_similarity(embedding, {array_lit}) AS FLOAT) AS distance \
            FROM sources{where_clause} \
            ORDER BY distance ASC NULLS LAST, urn ASC \
            LIMIT ?",
            columns = DESCRIPTOR_COLUMNS,
            array_lit = array_lit,
            where_clause = Self::where_clause(filters),
        );

        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
        let mut rows = stmt
            .query(params![limit as i64])
            .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            let distance: Option<f32> = row
                .get(12)
                .map_err(|e| DomainError::storage(format!("Failed to read distance: {}", e)))?;
            results.push((read_descriptor(row)?, distance.unwrap_or(f32::NAN)));
        }
        Ok(results)
    }

    async fn list(&self) -> Result<Vec<SourceDescriptor>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM sources ORDER BY urn",
                DESCRIPTOR_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare listing: {}", e)))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DomainError::storage(format!("Failed to list sources: {}", e)))?;

        let mut descriptors = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
        {
            descriptors.push(read_descriptor(row)?);
        }
        Ok(descriptors)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to count sources: {}", e)))?;
        Ok(count as u64)
    }
}
