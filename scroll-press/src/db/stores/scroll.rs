// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryInto;

use chrono::{DateTime, Utc};
use sqlx::{query, query_as};

use crate::db::errors::ScrollStorageError;
use crate::db::models::ScrollRow;
use crate::db::{is_unique_violation, to_db_timestamp, SqlStore};
use crate::scrolls::{DoiStatus, NewScroll, Scroll, ScrollId, ScrollStatus};

/// Columns selected whenever a full scroll row is loaded.
const SCROLL_COLUMNS: &str = "
    id,
    user_id,
    subject_id,
    title,
    authors,
    abstract,
    keywords,
    html_content,
    original_filename,
    file_size,
    license,
    status,
    content_hash,
    url_hash,
    doi,
    doi_status,
    doi_minted_at,
    zenodo_deposit_id,
    created_at,
    updated_at,
    published_at
";

fn into_scroll(row: ScrollRow) -> Result<Scroll, ScrollStorageError> {
    row.try_into().map_err(ScrollStorageError::InvalidColumn)
}

/// Methods to interact with the `scrolls` table in the database.
impl SqlStore {
    /// Inserts a new scroll draft.
    ///
    /// Byte-identical content is rejected as [`ScrollStorageError::DuplicateContent`]: once by
    /// the lookup ahead of the insertion and once more by the unique constraint, which catches
    /// the race of two concurrent identical uploads. Neither path bubbles up as a plain
    /// database error.
    pub async fn insert_draft(&self, draft: &NewScroll) -> Result<Scroll, ScrollStorageError> {
        if self
            .get_scroll_by_content_hash(&draft.content_hash)
            .await?
            .is_some()
        {
            return Err(ScrollStorageError::DuplicateContent);
        }

        let id = ScrollId::new();
        let now = to_db_timestamp(&Utc::now());
        let keywords = serde_json::to_string(&draft.keywords)
            .map_err(|err| ScrollStorageError::InvalidColumn(err.to_string()))?;

        let result = query(
            "
            INSERT INTO
                scrolls (
                    id,
                    user_id,
                    subject_id,
                    title,
                    authors,
                    abstract,
                    keywords,
                    html_content,
                    original_filename,
                    file_size,
                    license,
                    status,
                    content_hash,
                    url_hash,
                    created_at,
                    updated_at
                )
            VALUES
                ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ",
        )
        .bind(id.as_str())
        .bind(draft.user_id.as_str())
        .bind(draft.subject_id.as_str())
        .bind(&draft.title)
        .bind(&draft.authors)
        .bind(&draft.abstract_text)
        .bind(&keywords)
        .bind(&draft.html_content)
        .bind(&draft.original_filename)
        .bind(draft.file_size)
        .bind(draft.license.as_str())
        .bind(ScrollStatus::Draft.as_str())
        .bind(&draft.content_hash)
        .bind(&draft.url_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => (),
            Err(err) if is_unique_violation(&err) => {
                // Lost the race against a concurrent upload of the same content or prefix
                return if self
                    .get_scroll_by_content_hash(&draft.content_hash)
                    .await?
                    .is_some()
                {
                    Err(ScrollStorageError::DuplicateContent)
                } else {
                    Err(ScrollStorageError::UrlHashTaken(draft.url_hash.clone()))
                };
            }
            Err(err) => return Err(ScrollStorageError::TransactionFailed(err.to_string())),
        }

        self.get_scroll(&id)
            .await?
            .ok_or_else(|| ScrollStorageError::InsertionFailed(id.to_string()))
    }

    /// Returns a scroll by its internal id, regardless of status.
    pub async fn get_scroll(&self, id: &ScrollId) -> Result<Option<Scroll>, ScrollStorageError> {
        let row = query_as::<_, ScrollRow>(&format!(
            "SELECT {} FROM scrolls WHERE id = $1",
            SCROLL_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_scroll).transpose()
    }

    /// Returns the scroll claiming the given url hash, regardless of status.
    ///
    /// Used during identity assignment to detect prefix collisions.
    pub async fn get_scroll_by_url_hash(
        &self,
        url_hash: &str,
    ) -> Result<Option<Scroll>, ScrollStorageError> {
        let row = query_as::<_, ScrollRow>(&format!(
            "SELECT {} FROM scrolls WHERE url_hash = $1",
            SCROLL_COLUMNS
        ))
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_scroll).transpose()
    }

    /// Returns a published scroll by its public url hash.
    pub async fn get_published_scroll(
        &self,
        url_hash: &str,
    ) -> Result<Option<Scroll>, ScrollStorageError> {
        let row = query_as::<_, ScrollRow>(&format!(
            "SELECT {} FROM scrolls WHERE url_hash = $1 AND status = $2",
            SCROLL_COLUMNS
        ))
        .bind(url_hash)
        .bind(ScrollStatus::Published.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_scroll).transpose()
    }

    /// Returns the scroll with the given full content hash, if any.
    pub async fn get_scroll_by_content_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<Scroll>, ScrollStorageError> {
        let row = query_as::<_, ScrollRow>(&format!(
            "SELECT {} FROM scrolls WHERE content_hash = $1",
            SCROLL_COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_scroll).transpose()
    }

    /// Marks a draft as published.
    pub async fn publish_scroll(
        &self,
        id: &ScrollId,
        published_at: DateTime<Utc>,
    ) -> Result<(), ScrollStorageError> {
        let now = to_db_timestamp(&Utc::now());

        query(
            "
            UPDATE
                scrolls
            SET
                status = $1,
                published_at = $2,
                updated_at = $3
            WHERE
                id = $4
            ",
        )
        .bind(ScrollStatus::Published.as_str())
        .bind(to_db_timestamp(&published_at))
        .bind(&now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Marks a draft as discarded and releases its content identity.
    ///
    /// The row stays around as an audit trail but its hashes are freed so corrected content can
    /// be resubmitted under a fresh identity. The old preview URL stops resolving.
    pub async fn discard_scroll(&self, id: &ScrollId) -> Result<(), ScrollStorageError> {
        let now = to_db_timestamp(&Utc::now());

        query(
            "
            UPDATE
                scrolls
            SET
                status = $1,
                content_hash = NULL,
                url_hash = NULL,
                updated_at = $2
            WHERE
                id = $3
            ",
        )
        .bind(ScrollStatus::Discarded.as_str())
        .bind(&now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Records that DOI registration for this scroll has been triggered.
    pub async fn set_doi_pending(&self, id: &ScrollId) -> Result<(), ScrollStorageError> {
        self.update_doi_columns(id, DoiStatus::Pending, None, None, None)
            .await
    }

    /// Records the pre-reserved DOI and deposit id while registration is still in flight.
    ///
    /// Persisting the reservation before the registrar publish step means a crash in between
    /// can be reconciled later instead of silently dropping a registrar-side deposit.
    pub async fn set_doi_reserved(
        &self,
        id: &ScrollId,
        doi: &str,
        deposit_id: i64,
    ) -> Result<(), ScrollStorageError> {
        let now = to_db_timestamp(&Utc::now());

        query(
            "
            UPDATE
                scrolls
            SET
                doi = $1,
                zenodo_deposit_id = $2,
                updated_at = $3
            WHERE
                id = $4
            ",
        )
        .bind(doi)
        .bind(deposit_id)
        .bind(&now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Records a successfully minted DOI. Terminal state.
    pub async fn set_doi_minted(
        &self,
        id: &ScrollId,
        doi: &str,
        minted_at: DateTime<Utc>,
    ) -> Result<(), ScrollStorageError> {
        self.update_doi_columns(id, DoiStatus::Minted, Some(doi), Some(minted_at), None)
            .await
    }

    /// Records a failed DOI registration. Terminal state, no automatic retry.
    pub async fn set_doi_failed(&self, id: &ScrollId) -> Result<(), ScrollStorageError> {
        self.update_doi_columns(id, DoiStatus::Failed, None, None, None)
            .await
    }

    async fn update_doi_columns(
        &self,
        id: &ScrollId,
        status: DoiStatus,
        doi: Option<&str>,
        minted_at: Option<DateTime<Utc>>,
        deposit_id: Option<i64>,
    ) -> Result<(), ScrollStorageError> {
        let now = to_db_timestamp(&Utc::now());

        query(
            "
            UPDATE
                scrolls
            SET
                doi_status = $1,
                doi = COALESCE($2, doi),
                doi_minted_at = COALESCE($3, doi_minted_at),
                zenodo_deposit_id = COALESCE($4, zenodo_deposit_id),
                updated_at = $5
            WHERE
                id = $6
            ",
        )
        .bind(status.as_str())
        .bind(doi)
        .bind(minted_at.map(|value| to_db_timestamp(&value)))
        .bind(deposit_id)
        .bind(&now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        Ok(())
    }

    /// Returns ids of all scrolls whose DOI registration is still pending.
    ///
    /// The DOI service re-queues these when it starts, picking up work which got interrupted by
    /// a crash between registrar call and local write.
    pub async fn get_scrolls_with_pending_doi(
        &self,
    ) -> Result<Vec<ScrollId>, ScrollStorageError> {
        let rows = query_as::<_, (String,)>(
            "SELECT id FROM scrolls WHERE doi_status = $1 ORDER BY updated_at",
        )
        .bind(DoiStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| ScrollId::from(id)).collect())
    }

    /// Lists published scrolls, newest first, optionally filtered by subject name and a search
    /// term matched against title, authors and abstract.
    pub async fn list_published_scrolls(
        &self,
        subject: Option<&str>,
        search: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Scroll>, ScrollStorageError> {
        let mut sql = format!(
            "
            SELECT
                {}
            FROM
                scrolls
            WHERE
                status = $1
            ",
            SCROLL_COLUMNS
        );

        let mut bind_index = 2;
        if subject.is_some() {
            sql.push_str(&format!(
                "AND subject_id IN (SELECT id FROM subjects WHERE name = ${}) ",
                bind_index
            ));
            bind_index += 1;
        }
        if search.is_some() {
            sql.push_str(&format!(
                "AND (LOWER(title) LIKE ${index} OR LOWER(authors) LIKE ${index} OR LOWER(abstract) LIKE ${index}) ",
                index = bind_index
            ));
            bind_index += 1;
        }
        sql.push_str(&format!("ORDER BY published_at DESC LIMIT ${}", bind_index));

        let mut statement =
            query_as::<_, ScrollRow>(&sql).bind(ScrollStatus::Published.as_str());
        if let Some(subject) = subject {
            statement = statement.bind(subject.to_string());
        }
        if let Some(search) = search {
            statement = statement.bind(format!("%{}%", search.to_lowercase()));
        }
        statement = statement.bind(limit);

        let rows = statement
            .fetch_all(&self.pool)
            .await
            .map_err(|err| ScrollStorageError::TransactionFailed(err.to_string()))?;

        rows.into_iter().map(into_scroll).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::db::errors::ScrollStorageError;
    use crate::scrolls::{DoiStatus, License, ScrollStatus};
    use crate::test_utils::{add_subject, add_user, test_draft, test_runner, TestPress};

    #[test]
    fn duplicate_content_is_rejected() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "writer@example.org", "secret", "Writer").await;
            let subject = add_subject(store, "Mathematics").await;

            let draft = test_draft(&user, &subject, "<html><body>Proof</body></html>");
            store.insert_draft(&draft).await.unwrap();

            // A second byte-identical upload carries the same content hash
            let duplicate = test_draft(&user, &subject, "<html><body>Proof</body></html>");
            let result = store.insert_draft(&duplicate).await;

            assert!(matches!(result, Err(ScrollStorageError::DuplicateContent)));
        });
    }

    #[test]
    fn duplicate_content_is_rejected_across_users() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let alice = add_user(store, "alice@example.org", "secret", "Alice").await;
            let bob = add_user(store, "bob@example.org", "secret", "Bob").await;
            let subject = add_subject(store, "Biology").await;

            store
                .insert_draft(&test_draft(&alice, &subject, "<html><body>Cells</body></html>"))
                .await
                .unwrap();

            let result = store
                .insert_draft(&test_draft(&bob, &subject, "<html><body>Cells</body></html>"))
                .await;

            assert!(matches!(result, Err(ScrollStorageError::DuplicateContent)));
        });
    }

    #[test]
    fn hash_lengths_match_their_contracts() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "len@example.org", "secret", "Len").await;
            let subject = add_subject(store, "Chemistry").await;

            let scroll = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Bonds</body></html>"))
                .await
                .unwrap();

            assert_eq!(scroll.content_hash.as_ref().unwrap().len(), 64);
            let url_hash = scroll.url_hash.as_ref().unwrap();
            assert!(url_hash.len() >= 12 && url_hash.len() <= 20);
        });
    }

    #[test]
    fn publish_and_discard_lifecycle() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "cycle@example.org", "secret", "Cycle").await;
            let subject = add_subject(store, "Physics").await;

            let scroll = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Waves</body></html>"))
                .await
                .unwrap();
            assert_eq!(scroll.status, ScrollStatus::Draft);
            let url_hash = scroll.url_hash.clone().unwrap();

            // Publish makes the scroll reachable under its permanent url
            store.publish_scroll(&scroll.id, Utc::now()).await.unwrap();
            let published = store.get_published_scroll(&url_hash).await.unwrap().unwrap();
            assert_eq!(published.status, ScrollStatus::Published);
            assert!(published.published_at.is_some());

            // Discarding releases the identity, the old url stops resolving
            store.discard_scroll(&scroll.id).await.unwrap();
            assert!(store.get_published_scroll(&url_hash).await.unwrap().is_none());

            let discarded = store.get_scroll(&scroll.id).await.unwrap().unwrap();
            assert_eq!(discarded.status, ScrollStatus::Discarded);
            assert_eq!(discarded.content_hash, None);
            assert_eq!(discarded.url_hash, None);

            // The same content can now be resubmitted under a fresh identity
            let again = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Waves</body></html>"))
                .await
                .unwrap();
            assert_ne!(again.id, scroll.id);
        });
    }

    #[test]
    fn doi_state_machine_columns() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "doi@example.org", "secret", "Doi").await;
            let subject = add_subject(store, "Astronomy").await;

            let scroll = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Stars</body></html>"))
                .await
                .unwrap();
            assert_eq!(scroll.doi_status, None);

            store.set_doi_pending(&scroll.id).await.unwrap();
            let pending = store.get_scroll(&scroll.id).await.unwrap().unwrap();
            assert_eq!(pending.doi_status, Some(DoiStatus::Pending));
            assert_eq!(
                store.get_scrolls_with_pending_doi().await.unwrap(),
                vec![scroll.id.clone()]
            );

            store
                .set_doi_minted(&scroll.id, "10.5281/zenodo.1234567", Utc::now())
                .await
                .unwrap();
            let minted = store.get_scroll(&scroll.id).await.unwrap().unwrap();

            // minted implies doi and doi_minted_at are populated
            assert_eq!(minted.doi_status, Some(DoiStatus::Minted));
            assert_eq!(minted.doi.as_deref(), Some("10.5281/zenodo.1234567"));
            assert!(minted.doi_minted_at.is_some());
            assert!(store.get_scrolls_with_pending_doi().await.unwrap().is_empty());
        });
    }

    #[test]
    fn doi_reservation_survives_until_minted() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "reserve@example.org", "secret", "Reserve").await;
            let subject = add_subject(store, "Geology").await;

            let scroll = store
                .insert_draft(&test_draft(&user, &subject, "<html><body>Rocks</body></html>"))
                .await
                .unwrap();

            store.set_doi_pending(&scroll.id).await.unwrap();
            store
                .set_doi_reserved(&scroll.id, "10.5072/zenodo.42", 42)
                .await
                .unwrap();

            let reserved = store.get_scroll(&scroll.id).await.unwrap().unwrap();
            assert_eq!(reserved.doi_status, Some(DoiStatus::Pending));
            assert_eq!(reserved.zenodo_deposit_id, Some(42));
            assert_eq!(reserved.doi.as_deref(), Some("10.5072/zenodo.42"));
        });
    }

    #[test]
    fn listing_filters_by_subject_and_search() {
        test_runner(|press: TestPress| async move {
            let store = &press.context.store;
            let user = add_user(store, "list@example.org", "secret", "List").await;
            let physics = add_subject(store, "Physics").await;
            let biology = add_subject(store, "Biology").await;

            let mut wave_draft =
                test_draft(&user, &physics, "<html><body>Wave mechanics</body></html>");
            wave_draft.title = "On Wave Mechanics".into();
            let waves = store.insert_draft(&wave_draft).await.unwrap();

            let mut cell_draft =
                test_draft(&user, &biology, "<html><body>Cell division</body></html>");
            cell_draft.title = "Cell Division".into();
            let cells = store.insert_draft(&cell_draft).await.unwrap();

            store.publish_scroll(&waves.id, Utc::now()).await.unwrap();
            store.publish_scroll(&cells.id, Utc::now()).await.unwrap();

            let all = store.list_published_scrolls(None, None, 20).await.unwrap();
            assert_eq!(all.len(), 2);

            let physics_only = store
                .list_published_scrolls(Some("Physics"), None, 20)
                .await
                .unwrap();
            assert_eq!(physics_only.len(), 1);
            assert_eq!(physics_only[0].title, "On Wave Mechanics");

            let searched = store
                .list_published_scrolls(None, Some("cell"), 20)
                .await
                .unwrap();
            assert_eq!(searched.len(), 1);
            assert_eq!(searched[0].title, "Cell Division");

            // Drafts never show up in public listings
            let mut draft = test_draft(&user, &physics, "<html><body>Secret draft</body></html>");
            draft.title = "Unpublished".into();
            draft.license = License::AllRightsReserved;
            store.insert_draft(&draft).await.unwrap();
            let still_two = store.list_published_scrolls(None, None, 20).await.unwrap();
            assert_eq!(still_two.len(), 2);
        });
    }
}
