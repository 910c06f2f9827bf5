//! Role profile persistence operations.
//!
//! Operates on the `students`, `teachers` and `volunteers` tables. Writes are
//! upserts keyed by id; the `email` unique constraint still applies and
//! surfaces as SQLSTATE 23505.

use chrono::{DateTime, NaiveDate, Utc};
use edu_core::Email;
use sqlx::PgExecutor;
use uuid::Uuid;

use super::decode_error;
use crate::records::{StaffStatus, StudentRecord, StudentStatus, TeacherRecord, VolunteerRecord};

// -- Students -----------------------------------------------------------------

/// Insert or replace a student profile.
pub async fn upsert_student<'e>(
    exec: impl PgExecutor<'e>,
    record: &StudentRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO students (id, first_name, last_name, email, phone, address,
         date_of_birth, enrollment_date, status, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
           first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
           email = EXCLUDED.email, phone = EXCLUDED.phone, address = EXCLUDED.address,
           date_of_birth = EXCLUDED.date_of_birth, enrollment_date = EXCLUDED.enrollment_date,
           status = EXCLUDED.status, notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(record.email.as_str())
    .bind(&record.phone)
    .bind(&record.address)
    .bind(record.date_of_birth)
    .bind(record.enrollment_date)
    .bind(record.status.as_str())
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_student<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all student profiles on startup.
pub async fn load_students<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<StudentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StudentRow>(
        "SELECT id, first_name, last_name, email, phone, address, date_of_birth,
         enrollment_date, status, notes, created_at, updated_at
         FROM students ORDER BY created_at",
    )
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(StudentRow::into_record).collect()
}

fn parse_student_status(s: &str) -> StudentStatus {
    match s {
        "Inactive" => StudentStatus::Inactive,
        "Graduated" => StudentStatus::Graduated,
        "On Leave" => StudentStatus::OnLeave,
        _ => StudentStatus::Active,
    }
}

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    date_of_birth: Option<NaiveDate>,
    enrollment_date: DateTime<Utc>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StudentRow {
    fn into_record(self) -> Result<StudentRecord, sqlx::Error> {
        Ok(StudentRecord {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: Email::parse(&self.email).map_err(decode_error)?,
            phone: self.phone,
            address: self.address,
            date_of_birth: self.date_of_birth,
            enrollment_date: self.enrollment_date,
            status: parse_student_status(&self.status),
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -- Teachers -----------------------------------------------------------------

/// Insert or replace a teacher profile.
pub async fn upsert_teacher<'e>(
    exec: impl PgExecutor<'e>,
    record: &TeacherRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO teachers (id, first_name, last_name, email, phone, specialization,
         hire_date, status, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET
           first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
           email = EXCLUDED.email, phone = EXCLUDED.phone,
           specialization = EXCLUDED.specialization, hire_date = EXCLUDED.hire_date,
           status = EXCLUDED.status, notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(record.email.as_str())
    .bind(&record.phone)
    .bind(&record.specialization)
    .bind(record.hire_date)
    .bind(record.status.as_str())
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

pub async fn delete_teacher<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM teachers WHERE id = $1")
        .bind(id)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all teacher profiles on startup.
pub async fn load_teachers<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<TeacherRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TeacherRow>(
        "SELECT id, first_name, last_name, email, phone, specialization,
         hire_date, status, notes, created_at, updated_at
         FROM teachers ORDER BY created_at",
    )
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(TeacherRow::into_record).collect()
}

fn parse_staff_status(s: &str) -> StaffStatus {
    match s {
        "Inactive" => StaffStatus::Inactive,
        "On Leave" => StaffStatus::OnLeave,
        _ => StaffStatus::Active,
    }
}

#[derive(sqlx::FromRow)]
struct TeacherRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    specialization: Option<String>,
    hire_date: DateTime<Utc>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TeacherRow {
    fn into_record(self) -> Result<TeacherRecord, sqlx::Error> {
        Ok(TeacherRecord {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: Email::parse(&self.email).map_err(decode_error)?,
            phone: self.phone,
            specialization: self.specialization,
            hire_date: self.hire_date,
            status: parse_staff_status(&self.status),
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -- Volunteers ---------------------------------------------------------------

/// Insert or replace a volunteer profile.
pub async fn upsert_volunteer<'e>(
    exec: impl PgExecutor<'e>,
    record: &VolunteerRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO volunteers (id, first_name, last_name, email, phone, status,
         notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
           email = EXCLUDED.email, phone = EXCLUDED.phone, status = EXCLUDED.status,
           notes = EXCLUDED.notes, updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(record.email.as_str())
    .bind(&record.phone)
    .bind(record.status.as_str())
    .bind(&record.notes)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(exec)
    .await?;

    Ok(())
}

/// Load all volunteer profiles on startup.
pub async fn load_volunteers<'e>(
    exec: impl PgExecutor<'e>,
) -> Result<Vec<VolunteerRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, VolunteerRow>(
        "SELECT id, first_name, last_name, email, phone, status, notes,
         created_at, updated_at
         FROM volunteers ORDER BY created_at",
    )
    .fetch_all(exec)
    .await?;

    rows.into_iter().map(VolunteerRow::into_record).collect()
}

#[derive(sqlx::FromRow)]
struct VolunteerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VolunteerRow {
    fn into_record(self) -> Result<VolunteerRecord, sqlx::Error> {
        Ok(VolunteerRecord {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: Email::parse(&self.email).map_err(decode_error)?,
            phone: self.phone,
            status: parse_staff_status(&self.status),
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsers_accept_stored_forms() {
        for status in [
            StudentStatus::Active,
            StudentStatus::Inactive,
            StudentStatus::Graduated,
            StudentStatus::OnLeave,
        ] {
            assert_eq!(parse_student_status(status.as_str()), status);
        }
        for status in [StaffStatus::Active, StaffStatus::Inactive, StaffStatus::OnLeave] {
            assert_eq!(parse_staff_status(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_falls_back_to_active() {
        assert_eq!(parse_student_status("Expelled"), StudentStatus::Active);
        assert_eq!(parse_staff_status(""), StaffStatus::Active);
    }

    #[test]
    fn teacher_row_normalizes_email() {
        let now = Utc::now();
        let record = TeacherRow {
            id: Uuid::new_v4(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: " Ada@School.org ".into(),
            phone: None,
            specialization: Some("Mathematics".into()),
            hire_date: now,
            status: "On Leave".into(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
        .into_record()
        .unwrap();
        assert_eq!(record.email.as_str(), "ada@school.org");
        assert_eq!(record.status, StaffStatus::OnLeave);
    }
}
