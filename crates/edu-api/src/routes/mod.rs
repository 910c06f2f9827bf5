//! # API Route Modules
//!
//! - `auth`: registration and login (public), `/me` and password change
//!   (authenticated).
//! - `students`, `teachers`: role profile CRUD, written through to Postgres
//!   when configured.
//! - `groups`: groups and their student/teacher membership rows.
//! - `modules`: the learning-module catalogue that lessons, assignments
//!   and progress rows reference.
//! - `lessons`: scheduled lessons per group and teacher.
//! - `assignments`: assignments, submissions and grading. Mutations are
//!   restricted to the owning teacher or an admin.
//! - `attendance`: per-lesson attendance, including bulk recording for a
//!   whole group.
//! - `progress`: per-module student progress and assessment scores.
//!
//! Every protected router declares its role sets as `&[Role]` constants and
//! checks them first in each handler.

pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod groups;
pub mod lessons;
pub mod modules;
pub mod progress;
pub mod students;
pub mod teachers;
