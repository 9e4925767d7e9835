// Ring 4: Enrichment - derive the bootcamp slug from its name
use async_trait::async_trait;
use serde_json::Value;

use crate::database::collections::BOOTCAMPS;
use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::observer::traits::{Observer, ObserverRing, Operation, SyncObserver};

/// "ModernTech Bootcamp!" -> "moderntech-bootcamp"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

pub struct SlugGenerator;

impl Observer for SlugGenerator {
    fn name(&self) -> &'static str {
        "SlugGenerator"
    }

    fn ring(&self) -> ObserverRing {
        ObserverRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_schema(&self, collection: &str) -> bool {
        collection == BOOTCAMPS.name
    }
}

#[async_trait]
impl SyncObserver for SlugGenerator {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError> {
        if let Some(name) = ctx.changes.get("name").and_then(Value::as_str) {
            let slug = slugify(name);
            ctx.assigned.insert("slug".to_string(), Value::String(slug));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slugs_are_lowercase_and_dashed() {
        assert_eq!(slugify("Devworks Bootcamp"), "devworks-bootcamp");
        assert_eq!(slugify("  ModernTech -- Bootcamp! "), "moderntech-bootcamp");
        assert_eq!(slugify("Codemasters"), "codemasters");
        assert_eq!(slugify("!!!"), "");
    }

    #[tokio::test]
    async fn renaming_refreshes_the_slug() {
        let mut ctx = ObserverContext::update(&BOOTCAMPS, uuid::Uuid::new_v4(), Default::default());
        ctx.changes.insert("name".into(), json!("Codemasters Academy"));
        SlugGenerator.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.assigned["slug"], json!("codemasters-academy"));
    }

    #[tokio::test]
    async fn unrelated_update_leaves_slug_alone() {
        let mut ctx = ObserverContext::update(&BOOTCAMPS, uuid::Uuid::new_v4(), Default::default());
        ctx.changes.insert("housing".into(), json!(true));
        SlugGenerator.execute(&mut ctx).await.unwrap();
        assert!(!ctx.assigned.contains_key("slug"));
    }
}
