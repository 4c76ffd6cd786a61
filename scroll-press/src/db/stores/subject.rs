// SPDX-License-Identifier: AGPL-3.0-or-later

use std::convert::TryInto;

use chrono::Utc;
use sqlx::{query, query_as};

use crate::db::errors::SubjectStorageError;
use crate::db::models::SubjectRow;
use crate::db::{is_unique_violation, to_db_timestamp, SqlStore};
use crate::scrolls::{Subject, SubjectId};

const SUBJECT_COLUMNS: &str = "id, name, description, created_at";

fn into_subject(row: SubjectRow) -> Result<Subject, SubjectStorageError> {
    row.try_into().map_err(SubjectStorageError::InvalidColumn)
}

/// Methods to interact with the `subjects` table in the database.
impl SqlStore {
    /// Inserts a new subject category.
    pub async fn insert_subject(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Subject, SubjectStorageError> {
        let id = SubjectId::new();

        let result = query(
            "
            INSERT INTO
                subjects (
                    id,
                    name,
                    description,
                    created_at
                )
            VALUES
                ($1, $2, $3, $4)
            ",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(description)
        .bind(to_db_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => (),
            Err(err) if is_unique_violation(&err) => {
                return Err(SubjectStorageError::DuplicateName(name.to_string()))
            }
            Err(err) => return Err(SubjectStorageError::TransactionFailed(err.to_string())),
        }

        self.get_subject(&id)
            .await?
            .ok_or_else(|| SubjectStorageError::TransactionFailed("subject insert lost".into()))
    }

    /// Returns a subject by id.
    pub async fn get_subject(
        &self,
        id: &SubjectId,
    ) -> Result<Option<Subject>, SubjectStorageError> {
        let row = query_as::<_, SubjectRow>(&format!(
            "SELECT {} FROM subjects WHERE id = $1",
            SUBJECT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| SubjectStorageError::TransactionFailed(err.to_string()))?;

        row.map(into_subject).transpose()
    }

    /// Returns all subjects ordered by name, for form dropdowns and browsing.
    pub async fn get_subjects(&self) -> Result<Vec<Subject>, SubjectStorageError> {
        let rows = query_as::<_, SubjectRow>(&format!(
            "SELECT {} FROM subjects ORDER BY name",
            SUBJECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| SubjectStorageError::TransactionFailed(err.to_string()))?;

        rows.into_iter().map(into_subject).collect()
    }
}
