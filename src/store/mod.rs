pub mod seed;

use std::collections::HashMap;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::domain::models::{AnalysisResult, Company, ProjectDelay, User};

/// Bumped whenever a new collection is added; migrations only ever create
/// what is missing, existing collections are never dropped.
pub const SCHEMA_VERSION: i64 = 4;

const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// The named collections of the store. Each one is a single table of
/// key → JSON value pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Collection {
    Projects,
    Users,
    Companies,
    Analyses,
    DismissedDuplicates,
    Settings,
}

impl Collection {
    pub const ALL: [Self; 6] = [
        Self::Projects,
        Self::Users,
        Self::Companies,
        Self::Analyses,
        Self::DismissedDuplicates,
        Self::Settings,
    ];

    fn table(self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Users => "users",
            Self::Companies => "companies",
            Self::Analyses => "company_analyses",
            Self::DismissedDuplicates => "dismissed_duplicates",
            Self::Settings => "settings",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("falha ao abrir o banco de dados: {0}")]
    Open(#[source] sqlx::Error),
    #[error("falha ao buscar dados de {collection}: {source}")]
    Read {
        collection: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("falha ao salvar item em {collection}: {source}")]
    Write {
        collection: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("registro inválido em {collection}: {source}")]
    Decode {
        collection: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Local single-file store. Every operation is one transaction scoped to one
/// collection; the store is the sole source of truth for the application.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Open)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Open)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for collection in Collection::ALL {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
                collection.table()
            );
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|source| StoreError::Write {
                    collection: collection.table(),
                    source,
                })?;
        }
        let current: Option<i64> = self.get_setting(SCHEMA_VERSION_KEY).await?;
        if current.unwrap_or(0) < SCHEMA_VERSION {
            self.put_setting(SCHEMA_VERSION_KEY, &SCHEMA_VERSION).await?;
        }
        Ok(())
    }

    pub async fn get_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
    ) -> Result<Vec<T>, StoreError> {
        let sql = format!("SELECT value FROM {} ORDER BY key", collection.table());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| StoreError::Read {
                collection: collection.table(),
                source,
            })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.try_get("value").map_err(|source| StoreError::Read {
                collection: collection.table(),
                source,
            })?;
            out.push(
                serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                    collection: collection.table(),
                    source,
                })?,
            );
        }
        Ok(out)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", collection.table());
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|source| StoreError::Read {
                collection: collection.table(),
                source,
            })?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("value").map_err(|source| StoreError::Read {
            collection: collection.table(),
            source,
        })?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                collection: collection.table(),
                source,
            })
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Decode {
            collection: collection.table(),
            source,
        })?;
        let sql = format!(
            "INSERT INTO {} (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            collection.table()
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(raw)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Write {
                collection: collection.table(),
                source,
            })?;
        Ok(())
    }

    /// Deleting an absent key is a no-op.
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table());
        sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|source| StoreError::Write {
                collection: collection.table(),
                source,
            })?;
        Ok(())
    }

    /// Removes several keys in one transaction; either all go or none do.
    pub async fn delete_many(
        &self,
        collection: Collection,
        keys: &[String],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| StoreError::Write {
                collection: collection.table(),
                source,
            })?;
        let sql = format!("DELETE FROM {} WHERE key = ?1", collection.table());
        for key in keys {
            sqlx::query(&sql)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(|source| StoreError::Write {
                    collection: collection.table(),
                    source,
                })?;
        }
        tx.commit().await.map_err(|source| StoreError::Write {
            collection: collection.table(),
            source,
        })
    }

    pub async fn keys(&self, collection: Collection) -> Result<Vec<String>, StoreError> {
        let sql = format!("SELECT key FROM {} ORDER BY key", collection.table());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| StoreError::Read {
                collection: collection.table(),
                source,
            })?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.try_get("key").map_err(|source| StoreError::Read {
                collection: collection.table(),
                source,
            })?);
        }
        Ok(out)
    }

    // ---------- Projects ----------

    pub async fn all_projects(&self) -> Result<Vec<ProjectDelay>, StoreError> {
        self.get_all(Collection::Projects).await
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<ProjectDelay>, StoreError> {
        self.get(Collection::Projects, id).await
    }

    pub async fn put_project(&self, project: &ProjectDelay) -> Result<(), StoreError> {
        self.put(Collection::Projects, &project.id, project).await
    }

    pub async fn remove_projects(&self, ids: &[String]) -> Result<(), StoreError> {
        self.delete_many(Collection::Projects, ids).await
    }

    // ---------- Users ----------

    pub async fn all_users(&self) -> Result<Vec<User>, StoreError> {
        self.get_all(Collection::Users).await
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.get(Collection::Users, email).await
    }

    pub async fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.put(Collection::Users, &user.email, user).await
    }

    // ---------- Companies ----------

    pub async fn all_companies(&self) -> Result<Vec<Company>, StoreError> {
        self.get_all(Collection::Companies).await
    }

    /// Creates the company record the first time a name is seen.
    pub async fn ensure_company(&self, name: &str) -> Result<(), StoreError> {
        let existing: Option<Company> = self.get(Collection::Companies, name).await?;
        if existing.is_none() {
            let company = Company {
                name: name.to_string(),
            };
            self.put(Collection::Companies, name, &company).await?;
        }
        Ok(())
    }

    // ---------- Company analyses ----------

    pub async fn all_analyses(&self) -> Result<HashMap<String, AnalysisResult>, StoreError> {
        let table = Collection::Analyses.table();
        let sql = format!("SELECT key, value FROM {table} ORDER BY key");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|source| StoreError::Read {
                collection: table,
                source,
            })?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key").map_err(|source| StoreError::Read {
                collection: table,
                source,
            })?;
            let raw: String = row.try_get("value").map_err(|source| StoreError::Read {
                collection: table,
                source,
            })?;
            let analysis =
                serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                    collection: table,
                    source,
                })?;
            out.insert(key, analysis);
        }
        Ok(out)
    }

    pub async fn put_analysis(
        &self,
        company_name: &str,
        analysis: &AnalysisResult,
    ) -> Result<(), StoreError> {
        self.put(Collection::Analyses, company_name, analysis).await
    }

    // ---------- Dismissed duplicate markers ----------

    pub async fn dismissed_duplicates(&self) -> Result<Vec<String>, StoreError> {
        self.keys(Collection::DismissedDuplicates).await
    }

    /// Dismissal is permanent and keyed by normalized link, not by the member
    /// ids that happened to form the group.
    pub async fn put_dismissed_duplicate(&self, group_key: &str) -> Result<(), StoreError> {
        self.put(Collection::DismissedDuplicates, group_key, &true)
            .await
    }

    // ---------- Settings ----------

    pub async fn get_setting<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        self.get(Collection::Settings, key).await
    }

    pub async fn put_setting<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        self.put(Collection::Settings, key, value).await
    }

    pub async fn remove_setting(&self, key: &str) -> Result<(), StoreError> {
        self.delete(Collection::Settings, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SubmissionStatus;
    use chrono::NaiveDate;

    fn sample_project(id: &str) -> ProjectDelay {
        ProjectDelay {
            id: id.to_string(),
            company_name: "Relógios Geniais".to_string(),
            project_name: "Relógio Tempo Certo".to_string(),
            crowdfunding_link: "https://example.com/relogio".to_string(),
            promised_date: NaiveDate::from_ymd_opt(2015, 5, 30).expect("valid date"),
            actual_date: Some(NaiveDate::from_ymd_opt(2015, 7, 20).expect("valid date")),
            status: SubmissionStatus::Approved,
            rating: 4.5,
            comment: Some("Atrasou um pouco, mas o produto é ótimo!".to_string()),
            submitter_email: "usuario@email.com".to_string(),
            company_reply: Some("Obrigado pelo relato.".to_string()),
            user_rebuttal: None,
            rejection_reason: None,
            would_buy_again: Some(true),
        }
    }

    #[tokio::test]
    async fn test_schema_version_is_tracked() {
        let store = Store::open_in_memory().await.expect("opens");
        let version: Option<i64> = store
            .get_setting(SCHEMA_VERSION_KEY)
            .await
            .expect("readable");
        assert_eq!(version, Some(SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_project_round_trip_is_lossless() {
        let store = Store::open_in_memory().await.expect("opens");
        let project = sample_project("1717171717171");
        store.put_project(&project).await.expect("writes");

        let all = store.all_projects().await.expect("reads");
        assert_eq!(all, vec![project.clone()]);

        let by_id = store
            .get_project(&project.id)
            .await
            .expect("reads")
            .expect("present");
        assert_eq!(by_id, project);
    }

    #[tokio::test]
    async fn test_put_overwrites_by_key() {
        let store = Store::open_in_memory().await.expect("opens");
        let mut project = sample_project("1");
        store.put_project(&project).await.expect("writes");

        project.status = SubmissionStatus::Rejected;
        project.rejection_reason = Some("Link inválido.".to_string());
        store.put_project(&project).await.expect("writes");

        let all = store.all_projects().await.expect("reads");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, SubmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_remove_projects_deletes_all_given_keys() {
        let store = Store::open_in_memory().await.expect("opens");
        for id in ["1", "2", "3"] {
            store.put_project(&sample_project(id)).await.expect("writes");
        }
        store
            .remove_projects(&["1".to_string(), "3".to_string()])
            .await
            .expect("deletes");

        let remaining = store.all_projects().await.expect("reads");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "2");
    }

    #[tokio::test]
    async fn test_removing_absent_setting_is_a_noop() {
        let store = Store::open_in_memory().await.expect("opens");
        store.remove_setting("apiKey").await.expect("no-op delete");

        store.put_setting("theme", "dark").await.expect("writes");
        store.remove_setting("theme").await.expect("deletes");
        let theme: Option<String> = store.get_setting("theme").await.expect("reads");
        assert!(theme.is_none());
    }

    #[tokio::test]
    async fn test_analyses_are_keyed_by_company() {
        let store = Store::open_in_memory().await.expect("opens");
        let analysis = AnalysisResult {
            text: "Entrega pontual na maioria dos projetos.".to_string(),
            is_error: false,
        };
        store
            .put_analysis("Relógios Geniais", &analysis)
            .await
            .expect("writes");

        let all = store.all_analyses().await.expect("reads");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("Relógios Geniais"), Some(&analysis));
    }

    #[tokio::test]
    async fn test_dismissed_duplicates_store_keys_only() {
        let store = Store::open_in_memory().await.expect("opens");
        store
            .put_dismissed_duplicate("x.com/a")
            .await
            .expect("writes");
        store
            .put_dismissed_duplicate("x.com/a")
            .await
            .expect("idempotent");

        let keys = store.dismissed_duplicates().await.expect("reads");
        assert_eq!(keys, vec!["x.com/a".to_string()]);
    }

    #[tokio::test]
    async fn test_ensure_company_creates_once() {
        let store = Store::open_in_memory().await.expect("opens");
        store.ensure_company("Cooler & Cia").await.expect("creates");
        store.ensure_company("Cooler & Cia").await.expect("no-op");

        let companies = store.all_companies().await.expect("reads");
        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].name, "Cooler & Cia");
    }

    #[tokio::test]
    async fn test_seed_runs_once_and_only_on_fully_empty_store() {
        let store = Store::open_in_memory().await.expect("opens");
        seed::seed_demo_data(&store).await.expect("seeds");

        let projects = store.all_projects().await.expect("reads");
        let users = store.all_users().await.expect("reads");
        assert_eq!(projects.len(), 8);
        assert_eq!(users.len(), 9);

        // Running again must not duplicate anything.
        seed::seed_demo_data(&store).await.expect("no-op");
        assert_eq!(store.all_projects().await.expect("reads").len(), 8);
        assert_eq!(store.all_users().await.expect("reads").len(), 9);
    }

    #[tokio::test]
    async fn test_seed_skips_partially_empty_store() {
        let store = Store::open_in_memory().await.expect("opens");
        store.put_project(&sample_project("42")).await.expect("writes");

        // Users are empty but projects are not: no seeding happens.
        seed::seed_demo_data(&store).await.expect("skips");
        assert_eq!(store.all_projects().await.expect("reads").len(), 1);
        assert!(store.all_users().await.expect("reads").is_empty());
    }
}
