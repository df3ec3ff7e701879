//! Student repository.

use std::sync::Arc;

use crate::entities::{student, Student};
use super::request::escape_like;
use docreq_common::{AppError, AppResult};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};

/// Student repository for database operations.
#[derive(Clone)]
pub struct StudentRepository {
    db: Arc<DatabaseConnection>,
}

impl StudentRepository {
    /// Create a new student repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get a student by ID.
    pub async fn get_by_id(&self, id: i64) -> AppResult<student::Model> {
        Student::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Student {id} not found")))
    }

    /// Get students by IDs.
    pub async fn find_by_ids(&self, ids: &[i64]) -> AppResult<Vec<student::Model>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        Student::find()
            .filter(student::Column::Id.is_in(ids.iter().copied()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a student by API token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<student::Model>> {
        Student::find()
            .filter(student::Column::ApiToken.eq(token))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a page of students, newest first, optionally narrowed by a
    /// case-insensitive search on student number, name or email.
    pub async fn search(
        &self,
        term: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<student::Model>> {
        apply_search(Student::find(), term)
            .order_by_desc(student::Column::CreatedAt)
            .order_by_desc(student::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count students matching the search term.
    pub async fn count(&self, term: Option<&str>) -> AppResult<u64> {
        apply_search(Student::find(), term)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a student.
    pub async fn update(&self, model: student::ActiveModel) -> AppResult<student::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

fn apply_search(query: Select<Student>, term: Option<&str>) -> Select<Student> {
    let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
        return query;
    };

    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
    let condition = [
        student::Column::StudentNumber,
        student::Column::FirstName,
        student::Column::LastName,
        student::Column::Email,
    ]
    .into_iter()
    .fold(Condition::any(), |any, column| {
        any.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()))
    });

    query.filter(condition)
}
