mod account;
mod dashboard;
mod helpers;
mod meal;
mod plan;
mod profile;
mod progress;
mod settings;
mod summary;
mod workout;

use std::sync::Arc;

use stride_core::app::AppState;
use stride_core::auth::AuthService;
use stride_core::db::Database;

pub(crate) use account::{cmd_login, cmd_logout, cmd_reset_password, cmd_signup, cmd_whoami};
pub(crate) use dashboard::cmd_dashboard;
pub(crate) use meal::{cmd_meal_delete, cmd_meal_list, cmd_meal_log, cmd_meal_show, cmd_meal_update};
pub(crate) use plan::{
    PlanArgs, cmd_plan_activate, cmd_plan_create, cmd_plan_delete, cmd_plan_list, cmd_plan_show,
};
pub(crate) use profile::{ProfileArgs, cmd_profile_show, cmd_profile_update};
pub(crate) use progress::{ProgressArgs, cmd_progress_add, cmd_progress_list};
pub(crate) use settings::{
    cmd_settings_notifications, cmd_settings_reset, cmd_settings_show, cmd_settings_theme,
    cmd_settings_units,
};
pub(crate) use summary::cmd_summary;
pub(crate) use workout::{
    WorkoutArgs, cmd_workout_add, cmd_workout_complete, cmd_workout_delete, cmd_workout_list,
    cmd_workout_show, cmd_workout_update,
};

/// Everything a command runs against. `db` is always the local database,
/// which keeps the session and settings even when documents are remote.
pub(crate) struct Client {
    pub app: AppState,
    pub auth: AuthService,
    pub db: Arc<Database>,
}

impl Client {
    pub(crate) fn uid(&self) -> anyhow::Result<String> {
        Ok(self.auth.require_uid()?)
    }
}
