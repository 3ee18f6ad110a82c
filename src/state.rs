// src/state.rs

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{config::Config, exam::service::ExamService};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    /// Live assessment sessions and their store.
    pub exams: ExamService,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ExamService {
    fn from_ref(state: &AppState) -> Self {
        state.exams.clone()
    }
}
