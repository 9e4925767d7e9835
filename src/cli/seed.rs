//! Sample data loader used by the `bootcamp-seed` binary.
//!
//! Records are written straight through the repository so the fixture ids
//! (and the references between users, bootcamps and courses) are kept as-is.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::collections::{CollectionSpec, BOOTCAMPS, COURSES, REVIEWS, USERS};
use crate::database::{DatabaseManager, Repository};
use crate::observer::implementations::slugify;
use crate::services::AverageCostService;

/// Read a JSON array of records
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let Value::Array(items) = value else {
        anyhow::bail!("{} must contain a JSON array", path.display());
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!("{} entry {} is not an object", path.display(), i),
        })
        .collect()
}

/// Fill in what the pipeline would normally derive
pub fn prepare(collection: &CollectionSpec, mut record: Map<String, Value>) -> anyhow::Result<Map<String, Value>> {
    if collection.name == USERS.name {
        if let Some(plain) = record.get("password").and_then(Value::as_str) {
            let hash = hash_password(plain)?;
            record.insert("password".to_string(), Value::String(hash));
        }
    }
    if collection.name == BOOTCAMPS.name {
        if let Some(name) = record.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            record.insert("slug".to_string(), Value::String(slug));
        }
        // Always derived from courses
        record.remove("averageCost");
    }
    Ok(record)
}

async fn connect() -> anyhow::Result<Repository> {
    let pool = DatabaseManager::connect_lazy(&config::config().database).context("database configuration")?;
    DatabaseManager::migrate(&pool).await.context("applying migrations")?;
    Ok(Repository::new(pool))
}

pub async fn import(data_dir: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let repository = connect().await?;
    let mut counts = Map::new();

    for (collection, file) in [(&USERS, "users.json"), (&BOOTCAMPS, "bootcamps.json"), (&COURSES, "courses.json")] {
        let path = data_dir.join(file);
        if !path.exists() {
            tracing::warn!("{} not found, skipping {}", path.display(), collection.name);
            continue;
        }
        let records = load_records(&path)?;
        let total = records.len();
        for record in records {
            let record = prepare(collection, record)?;
            repository
                .insert(collection, &record)
                .await
                .with_context(|| format!("inserting into {}", collection.name))?;
        }
        tracing::info!("Imported {} {}", total, collection.name);
        counts.insert(collection.name.to_string(), json!(total));
    }

    // Every bootcamp, including those without courses, gets a settled average
    let average_cost = AverageCostService::postgres(repository.pool().clone());
    let bootcamps: BTreeSet<Uuid> = sqlx::query_scalar::<_, Uuid>("SELECT id FROM bootcamps")
        .fetch_all(repository.pool())
        .await?
        .into_iter()
        .collect();
    for id in &bootcamps {
        average_cost.recompute(*id).await?;
    }

    output_success(&output_format, "Data was imported", Some(Value::Object(counts)))
}

pub async fn destroy(output_format: OutputFormat) -> anyhow::Result<()> {
    let repository = connect().await?;
    let mut counts = Map::new();

    // Children first, although the foreign keys cascade anyway
    for collection in [&REVIEWS, &COURSES, &BOOTCAMPS, &USERS] {
        let removed = repository.delete_all(collection).await?;
        counts.insert(collection.name.to_string(), json!(removed));
    }

    output_success(&output_format, "Data destroyed", Some(Value::Object(counts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn bootcamps_get_a_slug_and_no_stored_average() {
        let record = prepare(&BOOTCAMPS, object(json!({ "name": "Devworks Bootcamp", "averageCost": 1 }))).unwrap();
        assert_eq!(record["slug"], json!("devworks-bootcamp"));
        assert!(!record.contains_key("averageCost"));
    }

    #[test]
    fn user_passwords_are_hashed() {
        let record = prepare(&USERS, object(json!({ "password": "123456" }))).unwrap();
        let hash = record["password"].as_str().unwrap();
        assert!(verify_password("123456", hash));
    }

    #[test]
    fn bundled_data_files_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        for file in ["users.json", "bootcamps.json", "courses.json"] {
            let records = load_records(&dir.join(file)).unwrap();
            assert!(!records.is_empty(), "{} is empty", file);
        }
    }

    #[test]
    fn bundled_records_only_use_known_fields() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        for (collection, file) in [(&USERS, "users.json"), (&BOOTCAMPS, "bootcamps.json"), (&COURSES, "courses.json")] {
            for record in load_records(&dir.join(file)).unwrap() {
                for key in record.keys() {
                    assert!(collection.has_field(key), "{} has unknown field {}", file, key);
                }
            }
        }
    }
}
