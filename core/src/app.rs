//! The application state handed to the presentation layer.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use tracing::info;

use crate::error::Result;
use crate::models::{Meal, ProgressEntry, UserProfile, Workout};
use crate::nutrition::DailySummary;
use crate::settings::Settings;
use crate::slices::{Nutrition, Plans, ProfileSlice, ProgressLog, Workouts};
use crate::store::DocumentStore;
use crate::theme::{ColorScheme, ThemeResolver};

/// Every slice, built around one shared document store.
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    pub profile: ProfileSlice,
    pub workouts: Workouts,
    pub nutrition: Nutrition,
    pub plans: Plans,
    pub progress: ProgressLog,
    pub theme: ThemeResolver,
    settings: Mutex<Settings>,
}

/// Outcome of each dashboard load. One failing slice does not hide the
/// others.
#[derive(Debug)]
pub struct Dashboard {
    pub profile: Result<UserProfile>,
    pub workouts: Result<Vec<Workout>>,
    pub meals: Result<Vec<Meal>>,
    pub summary: Option<DailySummary>,
    pub progress: Result<Vec<ProgressEntry>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_settings(store, Settings::default(), ColorScheme::Light)
    }

    pub fn with_settings(store: Arc<dyn DocumentStore>, settings: Settings, system: ColorScheme) -> Self {
        Self {
            profile: ProfileSlice::new(Arc::clone(&store)),
            workouts: Workouts::new(Arc::clone(&store)),
            nutrition: Nutrition::new(Arc::clone(&store)),
            plans: Plans::new(Arc::clone(&store)),
            progress: ProgressLog::new(Arc::clone(&store)),
            theme: ThemeResolver::new(settings.theme, system),
            settings: Mutex::new(settings),
            store,
        }
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a settings action. The theme resolver follows the new theme
    /// preference. Returns the updated settings for the caller to persist.
    pub fn update_settings(&self, action: impl FnOnce(&mut Settings)) -> Settings {
        let updated = {
            let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
            action(&mut settings);
            *settings
        };
        self.theme.set_preference(updated.theme);
        updated
    }

    /// Flip the shown scheme and record it as the theme setting.
    pub fn toggle_theme(&self) -> Settings {
        let next = self.theme.toggle();
        let mut settings = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        settings.set_theme(next);
        *settings
    }

    /// Load profile, workouts, the day's meals and progress concurrently.
    pub async fn load_dashboard(&self, uid: &str, today: NaiveDate) -> Dashboard {
        let (profile, workouts, meals, progress) = tokio::join!(
            self.profile.fetch(uid),
            self.workouts.fetch_all(uid, ()),
            self.nutrition.fetch_day(uid, today),
            self.progress.fetch_all(uid),
        );
        info!(
            uid,
            %today,
            profile = profile.is_ok(),
            workouts = workouts.is_ok(),
            meals = meals.is_ok(),
            progress = progress.is_ok(),
            "Dashboard loaded"
        );
        Dashboard {
            profile,
            workouts,
            summary: self.nutrition.daily_summary(),
            meals,
            progress,
        }
    }

    /// Drop everything cached for the signed-in user.
    pub fn sign_out_reset(&self) {
        self.profile.reset();
        self.workouts.reset();
        self.nutrition.reset();
        self.plans.reset();
        self.progress.reset();
        info!("Cached user data cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::RequestStatus;
    use crate::db::Database;
    use crate::models::{Exercise, NewWorkout};
    use crate::store;
    use crate::theme::ThemePreference;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn app() -> AppState {
        AppState::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_dashboard_reports_each_slice() {
        let app = app();
        let workout = NewWorkout {
            user_id: "u1".to_string(),
            title: "Intervals".to_string(),
            description: None,
            exercises: vec![Exercise::new("Sprint", 8, 1, 0.0)],
            duration: 25,
            calories_burned: None,
            date: day("2024-06-15"),
            completed: true,
        };
        app.workouts.create(&workout).await.unwrap();

        let dash = app.load_dashboard("u1", day("2024-06-15")).await;
        // No profile document was written.
        assert!(dash.profile.unwrap_err().is_not_found());
        assert_eq!(dash.workouts.unwrap().len(), 1);
        assert!(dash.meals.unwrap().is_empty());
        assert_eq!(dash.summary.unwrap().meal_count, 0);
        assert!(dash.progress.unwrap().is_empty());

        assert_eq!(app.profile.status(), RequestStatus::Rejected);
        assert_eq!(app.workouts.status(), RequestStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_dashboard_with_profile() {
        let app = app();
        let profile = UserProfile::new_account("u1", "a@b.co", "Ada");
        app.store()
            .set(store::USERS, "u1", serde_json::to_value(&profile).unwrap())
            .await
            .unwrap();
        let dash = app.load_dashboard("u1", day("2024-06-15")).await;
        assert_eq!(dash.profile.unwrap().display_name, "Ada");
        assert_eq!(app.profile.profile().unwrap().uid, "u1");
    }

    #[tokio::test]
    async fn test_sign_out_reset_drops_cached_data() {
        let app = app();
        let profile = UserProfile::new_account("u1", "a@b.co", "Ada");
        app.store()
            .set(store::USERS, "u1", serde_json::to_value(&profile).unwrap())
            .await
            .unwrap();
        let workout = NewWorkout {
            user_id: "u1".to_string(),
            title: "Intervals".to_string(),
            description: None,
            exercises: Vec::new(),
            duration: 25,
            calories_burned: None,
            date: day("2024-06-15"),
            completed: false,
        };
        app.workouts.create(&workout).await.unwrap();
        app.load_dashboard("u1", day("2024-06-15")).await;
        assert_eq!(app.workouts.items().len(), 1);
        assert!(app.nutrition.daily_summary().is_some());
        assert_eq!(app.progress.snapshot().status(), RequestStatus::Fulfilled);

        app.sign_out_reset();
        assert!(app.profile.profile().is_none());
        assert_eq!(app.profile.status(), RequestStatus::Idle);
        assert!(app.workouts.items().is_empty());
        assert!(app.workouts.current().is_none());
        assert_eq!(app.workouts.status(), RequestStatus::Idle);
        assert!(app.nutrition.items().is_empty());
        assert!(app.nutrition.daily_summary().is_none());
        assert!(app.plans.items().is_empty());
        assert!(app.progress.snapshot().items().is_empty());
        assert_eq!(app.progress.snapshot().status(), RequestStatus::Idle);
    }

    #[test]
    fn test_settings_feed_theme() {
        let app = AppState::with_settings(
            Arc::new(Database::open_in_memory().unwrap()),
            Settings::default(),
            ColorScheme::Dark,
        );
        assert_eq!(app.theme.scheme(), ColorScheme::Dark);

        let settings = app.update_settings(|s| s.set_theme(ThemePreference::Light));
        assert_eq!(settings.theme, ThemePreference::Light);
        assert_eq!(app.theme.scheme(), ColorScheme::Light);

        let settings = app.toggle_theme();
        assert_eq!(settings.theme, ThemePreference::Dark);
        assert_eq!(app.settings().theme, ThemePreference::Dark);

        let settings = app.update_settings(Settings::reset);
        assert_eq!(settings, Settings::default());
        assert_eq!(app.theme.scheme(), ColorScheme::Dark);
    }
}
