//! Staff management of student records.

use docreq_common::{AppError, AppResult};
use docreq_db::{
    entities::student,
    repositories::{RequestRepository, StudentRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::access::{Actor, ActorKind, ensure_kind};
use super::presentation::{RequestView, StudentView};
use super::processing::ProcessingCalendar;

/// Student listing parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStudentsQuery {
    /// Substring of student number, name or email.
    pub search: Option<String>,
    /// 1-indexed.
    pub page: Option<u64>,
}

/// One page of students.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPage {
    pub items: Vec<StudentView>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}

/// A student with every request they have made, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetail {
    pub student: StudentView,
    pub requests: Vec<RequestView>,
}

/// Profile fields staff may correct.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentInput {
    #[validate(length(min = 1, max = 128))]
    pub first_name: String,
    #[validate(length(min = 1, max = 128))]
    pub last_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(length(max = 128))]
    pub faculty: Option<String>,
    #[validate(length(max = 128))]
    pub major: Option<String>,
    #[validate(length(max = 1000))]
    pub address: Option<String>,
}

/// Service for student records.
#[derive(Clone)]
pub struct StudentService {
    student_repo: StudentRepository,
    request_repo: RequestRepository,
    calendar: ProcessingCalendar,
    page_size: u64,
}

impl StudentService {
    #[must_use]
    pub fn new(student_repo: StudentRepository, request_repo: RequestRepository) -> Self {
        Self {
            student_repo,
            request_repo,
            calendar: ProcessingCalendar::default(),
            page_size: 20,
        }
    }

    /// Use the given calendar for request views and the given page size.
    #[must_use]
    pub fn with_calendar(mut self, calendar: ProcessingCalendar, page_size: u64) -> Self {
        self.calendar = calendar;
        self.page_size = page_size.max(1);
        self
    }

    /// Search students, newest first.
    pub async fn list(&self, actor: &Actor, query: ListStudentsQuery) -> AppResult<StudentPage> {
        ensure_kind(actor, ActorKind::Staff)?;

        let term = query.search.as_deref();
        let page = query.page.unwrap_or(1).max(1);
        let total = self.student_repo.count(term).await?;
        let students = self
            .student_repo
            .search(term, self.page_size, (page - 1) * self.page_size)
            .await?;

        Ok(StudentPage {
            items: students.into_iter().map(StudentView::from).collect(),
            total,
            page,
            page_size: self.page_size,
            total_pages: total.div_ceil(self.page_size),
        })
    }

    /// A student and their request history.
    pub async fn detail(&self, actor: &Actor, student_id: i64) -> AppResult<StudentDetail> {
        ensure_kind(actor, ActorKind::Staff)?;

        let student = self.student_repo.get_by_id(student_id).await?;
        let requests = self.request_repo.find_by_student(student.id).await?;

        Ok(StudentDetail {
            student: student.into(),
            requests: requests
                .into_iter()
                .map(|r| RequestView::new(r, &self.calendar))
                .collect(),
        })
    }

    /// Correct a student's profile.
    pub async fn update(
        &self,
        actor: &Actor,
        student_id: i64,
        input: UpdateStudentInput,
    ) -> AppResult<StudentView> {
        ensure_kind(actor, ActorKind::Staff)?;
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let required = |value: String, name: &str| {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(AppError::Validation(format!("{name} is required")))
            } else {
                Ok(value)
            }
        };
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let first_name = required(input.first_name, "first name")?;
        let last_name = required(input.last_name, "last name")?;
        let phone = required(input.phone, "phone")?;

        let student = self.student_repo.get_by_id(student_id).await?;
        let mut model: student::ActiveModel = student.into();
        model.first_name = Set(first_name);
        model.last_name = Set(last_name);
        model.email = Set(input.email.trim().to_ascii_lowercase());
        model.phone = Set(Some(phone));
        model.faculty = Set(optional(input.faculty));
        model.major = Set(optional(input.major));
        model.address = Set(optional(input.address));

        let updated = self.student_repo.update(model).await?;
        tracing::info!(student_id, actor_id = actor.id, "Student profile updated");

        Ok(updated.into())
    }
}
