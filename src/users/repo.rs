use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Database, PgPool, Postgres, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{
    filters::{ListQuery, SortColumn},
    model::{NewUser, User, UserChanges},
    search::{push_search_filter, SearchStrategy},
};
use crate::db::Engine;

const USER_COLUMNS: &str =
    "id, name, email, email_verified_at, is_admin, password_hash, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already taken")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence port for users, one implementation per engine.
#[async_trait]
pub trait UserStore: Send + Sync {
    fn engine(&self) -> Engine;

    fn search_strategy_name(&self) -> &'static str;

    /// Rows matching the search filter, before pagination.
    async fn count(&self, query: &ListQuery) -> Result<u64, StoreError>;

    /// One filtered, ordered page of rows.
    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<User>, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Whether `email` belongs to a user other than `except`.
    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool, StoreError>;

    async fn create(&self, new: &NewUser) -> Result<User, StoreError>;

    async fn update(&self, id: Uuid, changes: &UserChanges)
        -> Result<Option<User>, StoreError>;

    /// Returns false when no row had that id.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

fn select_users() -> String {
    format!("SELECT {USER_COLUMNS} FROM users")
}

/// ` ORDER BY <column> <direction>`, with `id` as the tie-breaker.
pub(crate) fn push_ordering<DB: Database>(qb: &mut QueryBuilder<'_, DB>, query: &ListQuery) {
    qb.push(" ORDER BY ")
        .push(query.sort_by.as_sql())
        .push(" ")
        .push(query.sort_direction.as_sql());
    if query.sort_by != SortColumn::Id {
        qb.push(", id ASC");
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
        _ => StoreError::Database(e),
    }
}

/// Stamps out a `UserStore` for one sqlx driver. The SQL is shared; only the
/// pool type, placeholder syntax (via `QueryBuilder`) and search operator differ.
macro_rules! sql_user_store {
    ($(#[$meta:meta])* $store:ident, $db:ty, $pool:ty, $engine:expr) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $store {
            pool: $pool,
            search: Arc<dyn SearchStrategy>,
        }

        impl $store {
            pub fn new(pool: $pool) -> Self {
                Self {
                    pool,
                    search: $engine.search_strategy(),
                }
            }
        }

        #[async_trait]
        impl UserStore for $store {
            fn engine(&self) -> Engine {
                $engine
            }

            fn search_strategy_name(&self) -> &'static str {
                self.search.name()
            }

            async fn count(&self, query: &ListQuery) -> Result<u64, StoreError> {
                let mut qb = QueryBuilder::<$db>::new("SELECT COUNT(*) FROM users");
                push_search_filter(&mut qb, self.search.as_ref(), query.search.as_deref());
                let (total,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
                Ok(u64::try_from(total).unwrap_or(0))
            }

            async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<User>, StoreError> {
                let mut qb = QueryBuilder::<$db>::new(select_users());
                push_search_filter(&mut qb, self.search.as_ref(), query.search.as_deref());
                push_ordering(&mut qb, query);
                qb.push(" LIMIT ")
                    .push_bind(to_i64(query.per_page))
                    .push(" OFFSET ")
                    .push_bind(to_i64(query.offset()));
                tracing::debug!(sql = qb.sql(), "users page query");
                let users = qb.build_query_as::<User>().fetch_all(&self.pool).await?;
                Ok(users)
            }

            async fn find(&self, id: Uuid) -> Result<Option<User>, StoreError> {
                let mut qb = QueryBuilder::<$db>::new(select_users());
                qb.push(" WHERE id = ").push_bind(id);
                let user = qb.build_query_as::<User>().fetch_optional(&self.pool).await?;
                Ok(user)
            }

            async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
                let mut qb = QueryBuilder::<$db>::new(select_users());
                qb.push(" WHERE email = ").push_bind(email.to_string());
                let user = qb.build_query_as::<User>().fetch_optional(&self.pool).await?;
                Ok(user)
            }

            async fn email_taken(
                &self,
                email: &str,
                except: Option<Uuid>,
            ) -> Result<bool, StoreError> {
                let mut qb = QueryBuilder::<$db>::new("SELECT COUNT(*) FROM users WHERE email = ");
                qb.push_bind(email.to_string());
                if let Some(id) = except {
                    qb.push(" AND id <> ").push_bind(id);
                }
                let (n,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
                Ok(n > 0)
            }

            async fn create(&self, new: &NewUser) -> Result<User, StoreError> {
                let mut qb = QueryBuilder::<$db>::new(
                    "INSERT INTO users \
                     (id, name, email, password_hash, is_admin, created_at, updated_at) VALUES (",
                );
                let mut values = qb.separated(", ");
                values.push_bind(new.id);
                values.push_bind(new.name.clone());
                values.push_bind(new.email.clone());
                values.push_bind(new.password_hash.clone());
                values.push_bind(new.is_admin);
                values.push_bind(new.created_at);
                values.push_bind(new.created_at);
                qb.push(format!(") RETURNING {USER_COLUMNS}"));

                qb.build_query_as::<User>()
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_write_error)
            }

            async fn update(
                &self,
                id: Uuid,
                changes: &UserChanges,
            ) -> Result<Option<User>, StoreError> {
                let mut qb = QueryBuilder::<$db>::new("UPDATE users SET name = ");
                qb.push_bind(changes.name.clone())
                    .push(", email = ")
                    .push_bind(changes.email.clone())
                    .push(", updated_at = ")
                    .push_bind(time::OffsetDateTime::now_utc())
                    .push(" WHERE id = ")
                    .push_bind(id)
                    .push(format!(" RETURNING {USER_COLUMNS}"));

                qb.build_query_as::<User>()
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_write_error)
            }

            async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
                let mut qb = QueryBuilder::<$db>::new("DELETE FROM users WHERE id = ");
                qb.push_bind(id);
                let result = qb.build().execute(&self.pool).await?;
                Ok(result.rows_affected() > 0)
            }
        }
    };
}

sql_user_store!(
    /// PostgreSQL store; searches with `ILIKE`.
    PgUserStore,
    Postgres,
    PgPool,
    Engine::Postgres
);

sql_user_store!(
    /// SQLite store; searches with plain `LIKE`.
    SqliteUserStore,
    Sqlite,
    SqlitePool,
    Engine::Sqlite
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ListingConfig;
    use crate::db::sqlite_in_memory;
    use crate::users::filters::RawFilters;
    use time::{Duration, OffsetDateTime};

    async fn store() -> SqliteUserStore {
        SqliteUserStore::new(sqlite_in_memory().await.expect("in-memory sqlite"))
    }

    fn new_user(name: &str, email: &str, age_days: i64) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            password_hash: "hash".into(),
            is_admin: false,
            created_at: OffsetDateTime::now_utc() - Duration::days(age_days),
        }
    }

    fn query(raw: RawFilters) -> ListQuery {
        ListQuery::from_raw(&raw, &ListingConfig::default())
    }

    fn names(users: &[User]) -> Vec<&str> {
        users.iter().map(|u| u.name.as_str()).collect()
    }

    #[test]
    fn ordering_uses_id_as_tie_breaker() {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1");
        push_ordering(
            &mut qb,
            &query(RawFilters {
                sort_by: Some("name".into()),
                sort_direction: Some("asc".into()),
                ..Default::default()
            }),
        );
        assert_eq!(qb.sql(), "SELECT 1 ORDER BY name ASC, id ASC");

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT 1");
        push_ordering(
            &mut qb,
            &query(RawFilters {
                sort_by: Some("id".into()),
                ..Default::default()
            }),
        );
        assert_eq!(qb.sql(), "SELECT 1 ORDER BY id DESC");
    }

    #[test]
    fn injected_sort_column_never_reaches_order_clause() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1");
        push_ordering(
            &mut qb,
            &query(RawFilters {
                sort_by: Some("malicious_column; DROP TABLE users;".into()),
                sort_direction: Some("asc; DELETE FROM users".into()),
                ..Default::default()
            }),
        );
        assert_eq!(qb.sql(), "SELECT 1 ORDER BY created_at DESC, id ASC");
    }

    #[tokio::test]
    async fn create_and_find_roundtrip() {
        let store = store().await;
        let created = store
            .create(&new_user("Test User", "test@example.com", 0))
            .await
            .unwrap();
        assert!(!created.is_admin);
        assert!(created.email_verified_at.is_none());

        let found = store.find(created.id).await.unwrap().unwrap();
        assert_eq!(found.email, "test@example.com");
        let by_email = store.find_by_email("test@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
        assert!(store.find(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let store = store().await;
        store
            .create(&new_user("A", "existing@example.com", 0))
            .await
            .unwrap();
        let err = store
            .create(&new_user("B", "existing@example.com", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn email_taken_ignores_the_excepted_user() {
        let store = store().await;
        let user = store
            .create(&new_user("A", "a@example.com", 0))
            .await
            .unwrap();
        assert!(store.email_taken("a@example.com", None).await.unwrap());
        assert!(!store
            .email_taken("a@example.com", Some(user.id))
            .await
            .unwrap());
        assert!(!store.email_taken("b@example.com", None).await.unwrap());
    }

    #[tokio::test]
    async fn search_matches_name_substring() {
        let store = store().await;
        for name in ["John Doe", "Jane Smith", "John Johnson"] {
            let email = format!("{}@test.com", name.replace(' ', ".").to_lowercase());
            store.create(&new_user(name, &email, 0)).await.unwrap();
        }

        let q = query(RawFilters {
            search: Some("John".into()),
            ..Default::default()
        });
        assert_eq!(store.count(&q).await.unwrap(), 2);
        let mut found = names(&store.fetch_page(&q).await.unwrap())
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        found.sort();
        assert_eq!(found, vec!["John Doe", "John Johnson"]);
    }

    #[tokio::test]
    async fn search_matches_email_and_returns_each_row_once() {
        let store = store().await;
        store
            .create(&new_user("john", "john@example.com", 0))
            .await
            .unwrap();
        store
            .create(&new_user("Jane", "jane@example.com", 0))
            .await
            .unwrap();
        store
            .create(&new_user("Bob", "bob@test.com", 0))
            .await
            .unwrap();

        let q = query(RawFilters {
            search: Some("example".into()),
            ..Default::default()
        });
        assert_eq!(store.count(&q).await.unwrap(), 2);

        // matches both name and email, still counted once
        let q = query(RawFilters {
            search: Some("john".into()),
            ..Default::default()
        });
        assert_eq!(store.count(&q).await.unwrap(), 1);
        assert_eq!(store.fetch_page(&q).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sorts_by_name_in_both_directions() {
        let store = store().await;
        for (i, name) in ["Charlie", "Alice", "Bob"].iter().enumerate() {
            store
                .create(&new_user(name, &format!("u{i}@example.com"), 0))
                .await
                .unwrap();
        }

        let asc = query(RawFilters {
            sort_by: Some("name".into()),
            sort_direction: Some("asc".into()),
            ..Default::default()
        });
        assert_eq!(
            names(&store.fetch_page(&asc).await.unwrap()),
            vec!["Alice", "Bob", "Charlie"]
        );

        let desc = query(RawFilters {
            sort_by: Some("name".into()),
            sort_direction: Some("desc".into()),
            ..Default::default()
        });
        assert_eq!(
            names(&store.fetch_page(&desc).await.unwrap()),
            vec!["Charlie", "Bob", "Alice"]
        );
    }

    #[tokio::test]
    async fn sorts_by_email() {
        let store = store().await;
        for email in [
            "charlie@example.com",
            "alice@example.com",
            "bob@example.com",
        ] {
            store.create(&new_user("X", email, 0)).await.unwrap();
        }
        let q = query(RawFilters {
            sort_by: Some("email".into()),
            sort_direction: Some("asc".into()),
            ..Default::default()
        });
        let emails: Vec<String> = store
            .fetch_page(&q)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(
            emails,
            vec![
                "alice@example.com",
                "bob@example.com",
                "charlie@example.com"
            ]
        );
    }

    #[tokio::test]
    async fn default_order_is_newest_first() {
        let store = store().await;
        store
            .create(&new_user("Oldest", "old@example.com", 2))
            .await
            .unwrap();
        store
            .create(&new_user("Middle", "mid@example.com", 1))
            .await
            .unwrap();
        store
            .create(&new_user("Newest", "new@example.com", 0))
            .await
            .unwrap();

        let users = store.fetch_page(&query(RawFilters::default())).await.unwrap();
        assert_eq!(names(&users), vec!["Newest", "Middle", "Oldest"]);
    }

    #[tokio::test]
    async fn injected_sort_still_lists_everything() {
        let store = store().await;
        for i in 0..3 {
            store
                .create(&new_user("U", &format!("u{i}@example.com"), i))
                .await
                .unwrap();
        }
        let q = query(RawFilters {
            sort_by: Some("malicious_column; DROP TABLE users;".into()),
            sort_direction: Some("invalid".into()),
            ..Default::default()
        });
        assert_eq!(store.count(&q).await.unwrap(), 3);
        assert_eq!(store.fetch_page(&q).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn pages_are_sliced_by_per_page_and_page() {
        let store = store().await;
        for i in 0..25 {
            store
                .create(&new_user(&format!("User {i:02}"), &format!("u{i}@example.com"), 0))
                .await
                .unwrap();
        }
        let page = |n: u32| {
            query(RawFilters {
                sort_by: Some("name".into()),
                sort_direction: Some("asc".into()),
                per_page: Some("10".into()),
                page: Some(n.to_string()),
                ..Default::default()
            })
        };

        assert_eq!(store.count(&page(1)).await.unwrap(), 25);
        let first = store.fetch_page(&page(1)).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0].name, "User 00");
        let third = store.fetch_page(&page(3)).await.unwrap();
        assert_eq!(names(&third).first(), Some(&"User 20"));
        assert_eq!(third.len(), 5);
        assert!(store.fetch_page(&page(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_changes_profile_and_touches_timestamp() {
        let store = store().await;
        let user = store
            .create(&new_user("Old Name", "old@example.com", 3))
            .await
            .unwrap();

        let updated = store
            .update(
                user.id,
                &UserChanges {
                    name: "New Name".into(),
                    email: "new@example.com".into(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, user.id);
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.email, "new@example.com");
        assert!(updated.updated_at > user.updated_at);
        assert_eq!(updated.created_at, user.created_at);

        let missing = store
            .update(
                Uuid::new_v4(),
                &UserChanges {
                    name: "x".into(),
                    email: "x@example.com".into(),
                },
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn update_to_taken_email_is_reported() {
        let store = store().await;
        store
            .create(&new_user("A", "a@example.com", 0))
            .await
            .unwrap();
        let b = store
            .create(&new_user("B", "b@example.com", 0))
            .await
            .unwrap();
        let err = store
            .update(
                b.id,
                &UserChanges {
                    name: "B".into(),
                    email: "a@example.com".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn delete_removes_row_once() {
        let store = store().await;
        let user = store
            .create(&new_user("A", "a@example.com", 0))
            .await
            .unwrap();
        assert!(store.delete(user.id).await.unwrap());
        assert!(!store.delete(user.id).await.unwrap());
        assert!(store.find(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_store_reports_generic_search() {
        let store = store().await;
        assert_eq!(store.engine(), Engine::Sqlite);
        assert_eq!(store.search_strategy_name(), "generic");
    }
}
